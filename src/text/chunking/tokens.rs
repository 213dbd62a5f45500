//! Token counting: the sizing oracle behind every strategy decision

use super::error::{ChunkingError, Result};
use tiktoken_rs::CoreBPE;

/// Pure, deterministic text -> token count estimate.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Name of the encoding, recorded in logs
    fn encoding_name(&self) -> &'static str;

    /// Cost of the line break that joins two packed units in plain text
    fn separator_tokens(&self) -> usize {
        self.count("\n")
    }
}

/// `cl100k_base` BPE, the encoding used by the GPT-3.5/GPT-4 family
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ChunkingError::token_counter(format!("cannot load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    fn encoding_name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// Character estimate, roughly 4 characters per token
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn encoding_name(&self) -> &'static str {
        "chars/4"
    }
}

/// One token per whitespace-delimited word
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn encoding_name(&self) -> &'static str {
        "words"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiktoken_counter() {
        let counter = TiktokenCounter::new().unwrap();
        assert_eq!(counter.count(""), 0);
        let short = counter.count("Hello world.");
        assert!(short > 0 && short <= 4);
        // deterministic and monotone for appended text
        assert_eq!(counter.count("Hello world."), short);
        assert!(counter.count("Hello world. Hello again, world.") > short);
        assert_eq!(counter.encoding_name(), "cl100k_base");
    }

    #[test]
    fn test_heuristic_counter() {
        let counter = HeuristicCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
        // characters, not bytes
        assert_eq!(counter.count("これはテ"), 1);
    }

    #[test]
    fn test_word_counter() {
        let counter = WordCounter;
        assert_eq!(counter.count("  one two\tthree\n"), 3);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn test_separator_tokens() {
        let tiktoken = TiktokenCounter::new().unwrap();
        assert_eq!(tiktoken.separator_tokens(), 1);
        let (a, b) = ("The first paragraph ends here.", "Then the second one starts.");
        let joined = tiktoken.count(&format!("{a}\n{b}"));
        assert!(joined <= tiktoken.count(a) + tiktoken.separator_tokens() + tiktoken.count(b));
        assert_eq!(WordCounter.separator_tokens(), 0);
        assert_eq!(HeuristicCounter.separator_tokens(), 1);
    }
}
