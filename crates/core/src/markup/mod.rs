mod bracket;
mod cast;

use crate::character::{Registry, NARRATOR_ID};
use crate::emotion::{CanonicalEmotion, FULL_INTENSITY};
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 50;

/// Who says a span of text, and how.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attribution {
    pub speaker: String,
    pub emotion: CanonicalEmotion,
    pub alpha: f32,
    pub is_dialogue: bool,
    pub emotion_text: Option<String>,
}

impl Attribution {
    pub fn plain_narration() -> Self {
        Self {
            speaker: NARRATOR_ID.to_owned(),
            emotion: CanonicalEmotion::Calm,
            alpha: 0.0,
            is_dialogue: false,
            emotion_text: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawSegment {
    /// Position in the document. Strictly increasing across one parse.
    pub order: u64,
    pub text: String,
    pub attribution: Attribution,
}

/// Defaults for text that precedes the first bracket tag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BracketDefaults {
    pub speaker: String,
    pub emotion: CanonicalEmotion,
    pub alpha: f32,
}

impl Default for BracketDefaults {
    fn default() -> Self {
        Self {
            speaker: NARRATOR_ID.to_owned(),
            emotion: CanonicalEmotion::Calm,
            alpha: FULL_INTENSITY,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum Grammar {
    /// `{[jake]:[happy:0.8]}Hi there!`, one speaker per tag.
    #[default]
    Cast,
    /// `[sad:0.4]text`, one speaker whose mood changes at each tag.
    Bracket(BracketDefaults),
}

pub fn parse(grammar: &Grammar, text: &str, registry: &Registry) -> Vec<RawSegment> {
    let segments = match grammar {
        Grammar::Cast => cast::parse(text, registry),
        Grammar::Bracket(defaults) => bracket::parse(text, defaults),
    };

    for segment in &segments {
        tracing::debug!(
            order = segment.order,
            speaker = %segment.attribution.speaker,
            emotion = %segment.attribution.emotion,
            alpha = segment.attribution.alpha,
            dialogue = segment.attribution.is_dialogue,
            emotion_text = segment.attribution.emotion_text.as_deref().unwrap_or(""),
            "parsed: {}",
            preview(&segment.text)
        );
    }

    segments
}

/// The first few characters of `text`, for log lines.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
