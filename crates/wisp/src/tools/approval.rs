use async_trait::async_trait;
use tracing::debug;

use super::base::ToolConfirmation;

/// Decides whether a mutating tool call may run
#[async_trait]
pub trait ToolApprover: Send + Sync {
    async fn approve(&self, confirmation: &ToolConfirmation) -> bool;
}

/// Approves every request
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ToolApprover for AutoApprove {
    async fn approve(&self, confirmation: &ToolConfirmation) -> bool {
        debug!(tool = %confirmation.tool_name, "auto-approving tool call");
        true
    }
}

/// Declines every request
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

#[async_trait]
impl ToolApprover for DenyAll {
    async fn approve(&self, confirmation: &ToolConfirmation) -> bool {
        debug!(tool = %confirmation.tool_name, "declining tool call");
        false
    }
}
