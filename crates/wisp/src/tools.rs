//! Capabilities the model can invoke, and the registry that dispatches them
pub mod approval;
pub mod base;
pub mod read_file;
pub mod registry;
pub mod schema;
pub mod shell;
pub mod write_file;

pub use approval::{AutoApprove, DenyAll, ToolApprover};
pub use base::{Tool, ToolConfirmation, ToolInvocation, ToolKind, ToolResult, ToolSchema};
pub use registry::{default_registry, ToolRegistry};
