pub mod chunking;
pub mod markup;

use std::collections::{HashMap, HashSet};

/// Rule-based sentence splitter for mixed latin / CJK prose.
pub struct SentenceSplitter {
    stop_chars: HashSet<char>,
    latin_stop_chars: HashSet<char>,
    closers: HashSet<char>,
    parentheses: HashMap<char, char>,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl SentenceSplitter {
    // brackets that keep enclosed dialogue in one sentence
    pub const PARENTHESES: [(char, char); 3] = [('「', '」'), ('『', '』'), ('【', '】')];

    // full-width terminators end a sentence wherever they appear
    pub const STOP_CHARS: [char; 5] = ['。', '．', '！', '？', '\n'];

    // '.' only ends a sentence before whitespace so "3.14" and "a.b.c" stay whole
    pub const LATIN_STOP_CHARS: [char; 3] = ['.', '!', '?'];

    // trailing quotes / brackets belong to the sentence they close
    pub const CLOSERS: [char; 8] = ['"', '\'', ')', ']', '”', '’', '」', '』'];

    pub fn new(
        stop_chars: Option<HashSet<char>>,
        latin_stop_chars: Option<HashSet<char>>,
        parentheses: Option<HashMap<char, char>>,
    ) -> Self {
        SentenceSplitter {
            stop_chars: stop_chars.unwrap_or(Self::STOP_CHARS.iter().cloned().collect()),
            latin_stop_chars: latin_stop_chars
                .unwrap_or(Self::LATIN_STOP_CHARS.iter().cloned().collect()),
            closers: Self::CLOSERS.iter().cloned().collect(),
            parentheses: parentheses.unwrap_or(Self::PARENTHESES.iter().cloned().collect()),
        }
    }

    fn is_terminator(&self, c: char) -> bool {
        self.stop_chars.contains(&c) || self.latin_stop_chars.contains(&c)
    }

    fn is_boundary(&self, chars: &[char], pos: usize) -> bool {
        let c = chars[pos];
        if self.stop_chars.contains(&c) {
            return true;
        }
        if !self.latin_stop_chars.contains(&c) {
            return false;
        }
        let mut next = pos + 1;
        while next < chars.len()
            && (self.closers.contains(&chars[next]) || self.latin_stop_chars.contains(&chars[next]))
        {
            next += 1;
        }
        next == chars.len() || chars[next].is_whitespace()
    }

    /// Split text into trimmed, non-empty sentences in source order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut sentences: Vec<String> = vec![];
        let mut buf = String::new();
        let mut waiting_stack: Vec<char> = vec![];

        let mut pos = 0;
        while pos < chars.len() {
            let c = chars[pos];
            buf.push(c);

            if let Some(close) = self.parentheses.get(&c) {
                waiting_stack.push(*close);
            } else if waiting_stack.last() == Some(&c) {
                waiting_stack.pop();
            } else if c == '\n' {
                // an unbalanced bracket never spans a hard line break
                waiting_stack.clear();
                Self::push_sentence(&mut sentences, &mut buf);
            } else if waiting_stack.is_empty() && self.is_boundary(&chars, pos) {
                while pos + 1 < chars.len()
                    && (self.closers.contains(&chars[pos + 1])
                        || self.is_terminator(chars[pos + 1]))
                    && chars[pos + 1] != '\n'
                {
                    pos += 1;
                    buf.push(chars[pos]);
                }
                Self::push_sentence(&mut sentences, &mut buf);
            }
            pos += 1;
        }
        Self::push_sentence(&mut sentences, &mut buf);
        sentences
    }

    fn push_sentence(sentences: &mut Vec<String>, buf: &mut String) {
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
        buf.clear();
    }

    /// True when the unit ends with a sentence terminator (ignoring closing quotes).
    pub fn ends_sentence(&self, unit: &str) -> bool {
        unit.trim_end()
            .trim_end_matches(|c: char| self.closers.contains(&c))
            .chars()
            .last()
            .is_some_and(|c| self.is_terminator(c))
    }
}

/// Whitespace-delimited words of `text`; never splits inside a word.
pub fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// The last `count` words of `text`, joined by single spaces.
pub fn last_words(text: &str, count: usize) -> String {
    let words = split_words(text);
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}
