use crate::config::SegmentBudget;
use crate::markup::{Attribution, RawSegment};
use serde::{Deserialize, Serialize};

const TERMINALS: [char; 7] = ['.', '!', '?', '…', '。', '！', '？'];
const CLOSERS: [char; 9] = ['"', '\'', '”', '’', '」', '』', ')', '）', '»'];

/// Sort key of a chunk: the parent segment's order, then the part within it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkKey {
    pub order: u64,
    pub part: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub key: ChunkKey,
    pub text: String,
    pub attribution: Attribution,
}

pub fn segment_all(segments: Vec<RawSegment>, budget: &SegmentBudget) -> Vec<Chunk> {
    segments
        .into_iter()
        .flat_map(|raw| segment(raw, budget))
        .collect()
}

pub fn segment(raw: RawSegment, budget: &SegmentBudget) -> Vec<Chunk> {
    let RawSegment {
        order,
        text,
        attribution,
    } = raw;

    if text.chars().count() <= budget.max_chars {
        return vec![Chunk {
            key: ChunkKey { order, part: 0 },
            text,
            attribution,
        }];
    }

    let pieces = pack(&text, budget);
    if pieces.len() > 1 {
        tracing::debug!(order, chunks = pieces.len(), "split long segment");
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(part, text)| {
            if text.chars().count() > budget.max_chars {
                tracing::warn!(
                    order,
                    part,
                    max_chars = budget.max_chars,
                    "sentence exceeds segment budget; keeping it whole"
                );
            }
            Chunk {
                key: ChunkKey {
                    order,
                    part: u32::try_from(part).unwrap_or(u32::MAX),
                },
                text,
                attribution: attribution.clone(),
            }
        })
        .collect()
}

/// Splits after each run of sentence-terminal punctuation (plus any closing
/// quotes or brackets). Whitespace stays at the start of the next sentence,
/// and a fragment without words joins the sentence before it.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;

    for (i, c) in text.char_indices() {
        if TERMINALS.contains(&c) {
            after_terminal = true;
        } else if after_terminal && !CLOSERS.contains(&c) {
            close_sentence(&mut bounds, text, start, i);
            start = i;
            after_terminal = false;
        }
    }
    if start < text.len() {
        close_sentence(&mut bounds, text, start, text.len());
    }
    bounds.into_iter().map(|(from, to)| &text[from..to]).collect()
}

fn close_sentence(bounds: &mut Vec<(usize, usize)>, text: &str, start: usize, end: usize) {
    match bounds.last_mut() {
        Some(last) if !has_words(&text[start..end]) => last.1 = end,
        _ => bounds.push((start, end)),
    }
}

fn has_words(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// The last `n` characters of `text`.
fn tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    match text.char_indices().nth(count - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

struct Buffer {
    text: String,
    chars: usize,
    /// Whether anything besides the overlap seed was added.
    fresh: bool,
}

impl Buffer {
    fn seeded(seed: &str) -> Self {
        Self {
            text: seed.to_owned(),
            chars: seed.chars().count(),
            fresh: false,
        }
    }

    fn push(&mut self, sentence: &str, chars: usize) {
        self.text.push_str(sentence);
        self.chars += chars;
        self.fresh |= has_words(sentence);
    }
}

fn pack(text: &str, budget: &SegmentBudget) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut buffer = Buffer::seeded("");

    for sentence in split_sentences(text) {
        let chars = sentence.chars().count();

        if buffer.fresh && buffer.chars + chars > budget.max_chars {
            let closed = buffer.text.trim().to_owned();
            let seed = tail(&closed, budget.overlap_chars).trim_start().to_owned();
            chunks.push(closed);

            let seed_fits = seed.chars().count() + chars <= budget.max_chars;
            buffer = Buffer::seeded(if seed_fits { &seed } else { "" });
        }

        buffer.push(sentence, chars);
    }

    let rest = buffer.text.trim();
    if !rest.is_empty() && (buffer.fresh || chunks.is_empty()) {
        chunks.push(rest.to_owned());
    }

    chunks
}
