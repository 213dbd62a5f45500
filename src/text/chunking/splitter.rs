//! Greedy token-budgeted packing and the oversized-block fallback chain

use super::tokens::TokenCounter;
use super::types::{Block, ChunkType};
use crate::text::markup::wrap_paragraph;
use crate::text::{SentenceSplitter, split_words};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

/// A pure splitter: `None` when the text has no boundary at this granularity
pub type SplitFn = fn(&str) -> Option<Vec<String>>;

/// Fallback levels tried in order for a block larger than the budget
pub static FALLBACK_CHAIN: [(ChunkType, SplitFn); 2] = [
    (ChunkType::SentenceBasedSplit, split_sentences),
    (ChunkType::WordBasedSplit, split_at_words),
];

static SENTENCE_SPLITTER: Lazy<SentenceSplitter> = Lazy::new(SentenceSplitter::default);

pub fn split_sentences(text: &str) -> Option<Vec<String>> {
    let sentences = SENTENCE_SPLITTER.split(text);
    (sentences.len() > 1).then_some(sentences)
}

pub fn split_at_words(text: &str) -> Option<Vec<String>> {
    let words = split_words(text);
    (words.len() > 1).then(|| words.into_iter().map(str::to_string).collect())
}

/// Smallest piece a strategy moves between chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Source markup; `None` for text fragments, which are re-wrapped on output
    pub markup: Option<String>,
    pub text: String,
    pub tokens: usize,
    pub kind: ChunkType,
    /// Whether the unit may be repeated at the start of the next group
    pub carry: bool,
}

impl Unit {
    pub fn from_block(block: &Block, counter: &dyn TokenCounter) -> Self {
        Self {
            markup: Some(block.html.clone()),
            text: block.text.clone(),
            tokens: counter.count(&block.text),
            kind: ChunkType::MergedBlocks,
            carry: true,
        }
    }

    pub fn fragment(text: String, tokens: usize, kind: ChunkType) -> Self {
        Self {
            markup: None,
            text,
            tokens,
            kind,
            carry: true,
        }
    }

    /// Keep this unit out of overlap tails (section headings).
    pub fn pinned(mut self) -> Self {
        self.carry = false;
        self
    }
}

// forced splits outrank whole-block packing when labelling a group
fn severity(kind: &ChunkType) -> u8 {
    match kind {
        ChunkType::CompleteSection | ChunkType::MergedBlocks | ChunkType::Window => 0,
        ChunkType::SentenceBasedSplit => 1,
        ChunkType::WordBasedSplit => 2,
        ChunkType::Oversized => 3,
    }
}

/// Units forming one chunk; the first `overlap` units repeat the previous group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub units: Vec<Unit>,
    pub overlap: usize,
}

impl Group {
    fn seeded(tail: Vec<Unit>) -> Self {
        Self {
            overlap: tail.len(),
            units: tail,
        }
    }

    pub fn tokens(&self) -> usize {
        self.units.iter().map(|u| u.tokens).sum()
    }

    /// Unit counts plus one separator per join
    pub fn joined_tokens(&self, separator: usize) -> usize {
        self.tokens() + separator * self.units.len().saturating_sub(1)
    }

    /// Joined size after adding one more unit of `tokens`
    pub fn tokens_with(&self, tokens: usize, separator: usize) -> usize {
        if self.units.is_empty() {
            tokens
        } else {
            self.joined_tokens(separator) + separator + tokens
        }
    }

    /// Units added to this group rather than carried over
    pub fn fresh(&self) -> &[Unit] {
        &self.units[self.overlap..]
    }

    pub fn fresh_tokens(&self) -> usize {
        self.fresh().iter().map(|u| u.tokens).sum()
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.fresh()
            .iter()
            .map(|u| &u.kind)
            .max_by_key(|k| severity(k))
            .cloned()
            .unwrap_or(ChunkType::MergedBlocks)
    }

    /// Block markup verbatim; consecutive text fragments share one paragraph.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        let mut run: Vec<&str> = Vec::new();
        for unit in &self.units {
            match &unit.markup {
                Some(markup) => {
                    flush_run(&mut out, &mut run);
                    out.push_str(markup);
                }
                None => run.push(&unit.text),
            }
        }
        flush_run(&mut out, &mut run);
        out
    }
}

fn flush_run(out: &mut String, run: &mut Vec<&str>) {
    if !run.is_empty() {
        out.push_str(&wrap_paragraph(&run.join(" "), None));
        run.clear();
    }
}

/// Limits for [`pack`]
#[derive(Debug, Clone, Copy)]
pub struct PackLimits {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_units: usize,
    pub max_units: usize,
    /// Tokens charged for each join between units
    pub separator_tokens: usize,
}

impl PackLimits {
    pub fn tokens(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            min_units: 1,
            max_units: usize::MAX,
            separator_tokens: 0,
        }
    }

    pub fn with_separator(mut self, separator_tokens: usize) -> Self {
        self.separator_tokens = separator_tokens;
        self
    }
}

/// Trailing carry units whose summed tokens fit `overlap_tokens`, always
/// strictly fewer than the whole group.
pub fn overlap_tail(units: &[Unit], overlap_tokens: usize) -> Vec<Unit> {
    if overlap_tokens == 0 || units.len() < 2 {
        return Vec::new();
    }
    let mut budget = overlap_tokens;
    let mut taken = 0;
    for unit in units.iter().rev().take(units.len() - 1) {
        if !unit.carry || unit.tokens > budget {
            break;
        }
        budget -= unit.tokens;
        taken += 1;
    }
    units[units.len() - taken..].to_vec()
}

/// Greedily pack units in order under the token and unit-count limits.
///
/// A group closes when the next unit would exceed `max_tokens` or the group
/// already holds `max_units` units (overlap included), but never before it
/// holds `min_units` fresh units. The next group is seeded with the overlap
/// tail of the closed one, trimmed from the front until the incoming unit
/// fits the token budget and `min_units` fresh units fit the unit cap.
pub fn pack(units: Vec<Unit>, limits: &PackLimits) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current = Group::default();

    for unit in units {
        let fresh = current.fresh().len();
        let over_tokens =
            current.tokens_with(unit.tokens, limits.separator_tokens) > limits.max_tokens;
        let over_count = current.units.len() >= limits.max_units;
        if fresh > 0 && fresh >= limits.min_units && (over_tokens || over_count) {
            let tail = overlap_tail(&current.units, limits.overlap_tokens);
            groups.push(std::mem::take(&mut current));
            current = Group::seeded(tail);
            while current.overlap > 0
                && (current.tokens_with(unit.tokens, limits.separator_tokens) > limits.max_tokens
                    || current.units.len() + limits.min_units.max(1) > limits.max_units)
            {
                current.units.remove(0);
                current.overlap -= 1;
            }
        }
        current.units.push(unit);
    }
    if !current.fresh().is_empty() {
        groups.push(current);
    }
    debug!("Packed units into {} groups", groups.len());
    groups
}

/// Grow a final group below `min_tokens` with trailing units of the group
/// before it, keeping the final group (joins included) within `max_tokens`.
///
/// A moved unit that was already repeated as overlap simply stops counting
/// as overlap, so both groups stay consistent.
pub fn rebalance_tail(groups: &mut [Group], min_tokens: usize, limits: &PackLimits) {
    let [.., prev, last] = groups else {
        return;
    };
    while last.fresh_tokens() < min_tokens && prev.fresh().len() > 1 {
        let Some(unit) = prev.units.last() else {
            break;
        };
        if !unit.carry {
            break;
        }
        if last.overlap > 0 {
            last.overlap -= 1;
        } else if last.tokens_with(unit.tokens, limits.separator_tokens) <= limits.max_tokens {
            last.units.insert(0, unit.clone());
        } else {
            break;
        }
        prev.units.pop();
    }
}

/// Break `text` into fragments of at most `max_tokens` using `chain` in order.
///
/// Only pieces still over budget descend to the next level. A piece with no
/// boundary at any remaining level is kept whole as `Oversized`.
pub fn split_oversized(
    text: &str,
    max_tokens: usize,
    counter: &dyn TokenCounter,
    chain: &[(ChunkType, SplitFn)],
) -> Vec<Unit> {
    for (level, (kind, split)) in chain.iter().enumerate() {
        let Some(parts) = split(text) else {
            continue;
        };
        let mut fragments = Vec::with_capacity(parts.len());
        for part in parts {
            let tokens = counter.count(&part);
            if tokens > max_tokens {
                fragments.extend(split_oversized(&part, max_tokens, counter, &chain[level + 1..]));
            } else {
                fragments.push(Unit::fragment(part, tokens, kind.clone()));
            }
        }
        return fragments;
    }
    let tokens = counter.count(text);
    warn!(
        "Unsplittable unit of {} tokens exceeds budget of {}",
        tokens, max_tokens
    );
    vec![Unit::fragment(text.to_string(), tokens, ChunkType::Oversized)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunking::tokens::WordCounter;
    use crate::text::chunking::types::{BlockType, SourceMeta};

    fn block_unit(text: &str) -> Unit {
        let block = Block::new(
            BlockType::Paragraph,
            0,
            text.to_string(),
            format!("<p>{text}</p>"),
            SourceMeta::default(),
        );
        Unit::from_block(&block, &WordCounter)
    }

    fn texts(group: &Group) -> Vec<&str> {
        group.units.iter().map(|u| u.text.as_str()).collect()
    }

    #[test]
    fn test_split_functions() {
        assert_eq!(
            split_sentences("One two. Three four."),
            Some(vec!["One two.".to_string(), "Three four.".to_string()])
        );
        assert_eq!(split_sentences("no terminal punctuation here"), None);
        assert_eq!(
            split_at_words("a b"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(split_at_words("single"), None);
    }

    #[test]
    fn test_pack_by_tokens() {
        let units = vec![block_unit("a b c"), block_unit("d e"), block_unit("f g h i")];
        let groups = pack(units, &PackLimits::tokens(5, 0));
        assert_eq!(groups.len(), 2);
        assert_eq!(texts(&groups[0]), vec!["a b c", "d e"]);
        assert_eq!(texts(&groups[1]), vec!["f g h i"]);
        assert_eq!(groups[0].markup(), "<p>a b c</p><p>d e</p>");
        assert_eq!(groups[0].chunk_type(), ChunkType::MergedBlocks);
    }

    #[test]
    fn test_pack_with_overlap_tail() {
        let units = vec![
            block_unit("a b c"),
            block_unit("d"),
            block_unit("e f g"),
            block_unit("h"),
        ];
        let groups = pack(units, &PackLimits::tokens(5, 2));
        assert_eq!(texts(&groups[0]), vec!["a b c", "d"]);
        // "d" (1 token) carries into the next group
        assert_eq!(texts(&groups[1]), vec!["d", "e f g", "h"]);
        assert_eq!(groups[1].overlap, 1);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_overlap_trimmed_to_fit_next_unit() {
        let units = vec![block_unit("a"), block_unit("b"), block_unit("c d e f")];
        let groups = pack(units, &PackLimits::tokens(4, 3));
        assert_eq!(texts(&groups[0]), vec!["a", "b"]);
        // the tail "b" would push "c d e f" over budget, so it is dropped
        assert_eq!(texts(&groups[1]), vec!["c d e f"]);
        assert_eq!(groups[1].overlap, 0);
    }

    #[test]
    fn test_overlap_tail_rules() {
        let units = vec![block_unit("a").pinned(), block_unit("b"), block_unit("c")];
        assert_eq!(overlap_tail(&units, 10).len(), 2);
        assert!(overlap_tail(&units, 0).is_empty());
        assert!(overlap_tail(&units[..1], 10).is_empty());
        let units = vec![block_unit("a"), block_unit("b c d"), block_unit("e")];
        // stops at the first unit that does not fit
        assert_eq!(overlap_tail(&units, 3).len(), 1);
    }

    #[test]
    fn test_pack_unit_count_limits() {
        let units: Vec<Unit> = ["a", "b", "c", "d", "e"].iter().map(|t| block_unit(t)).collect();
        let limits = PackLimits {
            max_tokens: 100,
            overlap_tokens: 0,
            min_units: 1,
            max_units: 2,
            separator_tokens: 0,
        };
        let groups = pack(units.clone(), &limits);
        assert_eq!(groups.iter().map(|g| g.units.len()).collect::<Vec<_>>(), vec![2, 2, 1]);

        // min_units keeps a group open past the token budget
        let limits = PackLimits {
            max_tokens: 1,
            overlap_tokens: 0,
            min_units: 3,
            max_units: 10,
            separator_tokens: 0,
        };
        let groups = pack(units, &limits);
        assert_eq!(groups.iter().map(|g| g.units.len()).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn test_unit_cap_counts_overlap() {
        let units: Vec<Unit> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|t| block_unit(t))
            .collect();
        let limits = PackLimits {
            max_tokens: 100,
            overlap_tokens: 5,
            min_units: 1,
            max_units: 2,
            separator_tokens: 0,
        };
        let groups = pack(units.clone(), &limits);
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|g| g.units.len() <= 2));
        assert_eq!(texts(&groups[1]), vec!["b", "c"]);
        assert_eq!(groups[1].overlap, 1);
        assert_eq!(texts(&groups[4]), vec!["e", "f"]);

        // a cap of one leaves no room for overlap
        let limits = PackLimits { max_units: 1, ..limits };
        let groups = pack(units, &limits);
        assert_eq!(groups.len(), 6);
        assert!(groups.iter().all(|g| g.units.len() == 1 && g.overlap == 0));
    }

    #[test]
    fn test_pack_charges_separators() {
        let units = vec![block_unit("a"), block_unit("b"), block_unit("c")];
        let groups = pack(units.clone(), &PackLimits::tokens(4, 0));
        assert_eq!(groups.len(), 1);
        let limits = PackLimits::tokens(4, 0).with_separator(1);
        let groups = pack(units, &limits);
        assert_eq!(texts(&groups[0]), vec!["a", "b"]);
        assert_eq!(groups[0].joined_tokens(1), 3);
        assert_eq!(texts(&groups[1]), vec!["c"]);
    }

    #[test]
    fn test_rebalance_small_tail() {
        let units = vec![block_unit("a b c"), block_unit("d e"), block_unit("f")];
        let mut groups = pack(units, &PackLimits::tokens(5, 0));
        assert_eq!(groups.len(), 2);
        rebalance_tail(&mut groups, 3, &PackLimits::tokens(5, 0));
        assert_eq!(texts(&groups[0]), vec!["a b c"]);
        assert_eq!(texts(&groups[1]), vec!["d e", "f"]);

        // an overlapped unit turns fresh instead of being duplicated
        let units = vec![block_unit("a b c"), block_unit("d"), block_unit("e f g h")];
        let mut groups = pack(units, &PackLimits::tokens(5, 1));
        assert_eq!(texts(&groups[1]), vec!["d", "e f g h"]);
        assert_eq!(groups[1].overlap, 1);
        rebalance_tail(&mut groups, 10, &PackLimits::tokens(5, 1));
        assert_eq!(texts(&groups[0]), vec!["a b c"]);
        assert_eq!(texts(&groups[1]), vec!["d", "e f g h"]);
        assert_eq!(groups[1].overlap, 0);
    }

    #[test]
    fn test_split_oversized_descends_only_when_needed() {
        let text = "Short one. This sentence has far too many words to fit.";
        let fragments = split_oversized(text, 4, &WordCounter, &FALLBACK_CHAIN);
        assert_eq!(fragments[0].text, "Short one.");
        assert_eq!(fragments[0].kind, ChunkType::SentenceBasedSplit);
        assert!(fragments[1..].iter().all(|f| f.kind == ChunkType::WordBasedSplit));
        assert!(fragments.iter().all(|f| f.tokens <= 4));
        let rejoined = fragments.iter().map(|f| f.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_split_oversized_sentence_only_chain() {
        let fragments = split_oversized(
            "no boundary in this text at all",
            2,
            &WordCounter,
            &FALLBACK_CHAIN[..1],
        );
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].kind, ChunkType::Oversized);
        assert_eq!(fragments[0].tokens, 7);
    }

    #[test]
    fn test_fragment_groups_render_as_paragraph() {
        let units = split_oversized("Alpha beta. Gamma delta.", 2, &WordCounter, &FALLBACK_CHAIN);
        let groups = pack(units, &PackLimits::tokens(4, 0));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].markup(), "<p>Alpha beta. Gamma delta.</p>");
        assert_eq!(groups[0].chunk_type(), ChunkType::SentenceBasedSplit);
    }
}
