use serde_json::Value;

use crate::errors::ContextError;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::ToolCall;
use crate::token_counter::TokenCounter;

/// The ordered conversation log for a single agent run.
///
/// Messages are append-only. The system prompt is held separately so that it is
/// always emitted first and never mutated. The log grows without bound; callers
/// that need a bounded history have to evict externally.
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    system_prompt: Option<String>,
    messages: Vec<Message>,
    token_counter: TokenCounter,
}

impl ContextManager {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            messages: Vec::new(),
            token_counter: TokenCounter::new(),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn add_user_message<S: Into<String>>(&mut self, text: S) {
        let text = text.into();
        let count = self.token_counter.count_tokens(&text);
        self.messages.push(Message::user(text).with_token_count(count));
    }

    pub fn add_assistant_message(&mut self, text: Option<String>, tool_calls: Vec<ToolCall>) {
        let count = self
            .token_counter
            .count_tokens(text.as_deref().unwrap_or_default());
        self.messages
            .push(Message::assistant(text, tool_calls).with_token_count(count));
    }

    /// Append the answer to a tool call.
    ///
    /// The id must appear in the tool call list of an earlier assistant message.
    pub fn add_tool_message<I: Into<String>, S: Into<String>>(
        &mut self,
        tool_call_id: I,
        text: S,
    ) -> Result<(), ContextError> {
        let tool_call_id = tool_call_id.into();
        let requested = self
            .messages
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .flat_map(|message| message.tool_calls())
            .any(|call| call.id == tool_call_id);
        if !requested {
            return Err(ContextError::UnknownToolCall(tool_call_id));
        }

        let text = text.into();
        let count = self.token_counter.count_tokens(&text);
        self.messages
            .push(Message::tool(tool_call_id, text).with_token_count(count));
        Ok(())
    }

    /// Messages appended so far, excluding the system prompt
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The full conversation in chat completion wire format, system prompt first
    pub fn get_messages(&self) -> Vec<Value> {
        self.system_prompt
            .iter()
            .map(|prompt| Message::system(prompt.as_str()).to_openai_spec())
            .chain(self.messages.iter().map(Message::to_openai_spec))
            .collect()
    }

    /// Estimated tokens across the system prompt and every appended message
    pub fn total_tokens(&self) -> usize {
        let system = self
            .system_prompt
            .as_deref()
            .map(|prompt| self.token_counter.count_tokens(prompt))
            .unwrap_or(0);
        system
            + self
                .messages
                .iter()
                .filter_map(|message| message.token_count)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_prompt_comes_first() {
        let mut context = ContextManager::new(Some("You are helpful.".to_string()));
        context.add_user_message("Hi");
        context.add_assistant_message(Some("Hello!".to_string()), vec![]);

        let messages = context.get_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            json!({"role": "system", "content": "You are helpful."})
        );
        assert_eq!(messages[1], json!({"role": "user", "content": "Hi"}));
        assert_eq!(messages[2], json!({"role": "assistant", "content": "Hello!"}));
    }

    #[test]
    fn test_no_system_prompt() {
        let mut context = ContextManager::new(None);
        context.add_user_message("Hi");
        let messages = context.get_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_tool_round_trip() {
        let mut context = ContextManager::new(None);
        context.add_user_message("Read a.txt");
        context.add_assistant_message(
            None,
            vec![ToolCall::new("call_1", "read_file", r#"{"path":"a.txt"}"#)],
        );
        context.add_tool_message("call_1", "contents").unwrap();

        let messages = context.get_messages();
        assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(messages[2]["content"], "contents");
    }

    #[test]
    fn test_tool_message_requires_known_call() {
        let mut context = ContextManager::new(None);
        context.add_user_message("Hi");
        let result = context.add_tool_message("call_404", "nope");
        assert_eq!(
            result,
            Err(ContextError::UnknownToolCall("call_404".to_string()))
        );
        assert_eq!(context.messages().len(), 1);
    }

    #[test]
    fn test_token_counts_are_recorded() {
        let mut context = ContextManager::new(Some("abcdefgh".to_string()));
        context.add_user_message("abcdefghabcdefgh");
        assert_eq!(context.messages()[0].token_count, Some(4));
        assert_eq!(context.total_tokens(), 6);
    }
}
