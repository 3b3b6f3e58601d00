/// Rough token estimate used to annotate conversation turns.
///
/// Counts are advisory only; nothing trims the context based on them.
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: usize,
}

const DEFAULT_CHARS_PER_TOKEN: usize = 4;

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        TokenCounter {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }

    /// Estimate the number of tokens in `text`, never less than one
    pub fn count_tokens(&self, text: &str) -> usize {
        (text.chars().count() / self.chars_per_token).max(1)
    }
}
