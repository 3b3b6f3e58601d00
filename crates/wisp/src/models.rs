//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - the conversation log kept by the context manager, one `Message` per turn
//! - openai chat completion messages/tools, sent from the agent to the LLM
//!
//! We always keep the internal structs and convert at the edge with the
//! to/from helpers, so that the agent loop never manipulates raw json.
pub mod message;
pub mod role;
pub mod tool;
