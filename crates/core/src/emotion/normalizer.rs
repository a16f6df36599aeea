use crate::emotion::{CanonicalEmotion, TagValue};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Alpha used when a tag carries no intensity, or one that cannot be read.
pub const FULL_INTENSITY: f32 = 1.0;

/// Alpha used when a tag describes its emotion in words instead of a number.
pub const DESCRIPTIVE_ALPHA: f32 = 0.8;

static SYNONYMS: Lazy<HashMap<&'static str, CanonicalEmotion>> = Lazy::new(|| {
    use CanonicalEmotion::*;

    [
        ("happy", Happy),
        ("happiness", Happy),
        ("joy", Happy),
        ("excited", Happy),
        ("content", Happy),
        ("sad", Sad),
        ("sadness", Sad),
        ("longing", Sad),
        ("yearning", Sad),
        ("melancholy", Melancholic),
        ("melancholic", Melancholic),
        ("depressed", Melancholic),
        ("nostalgic", Melancholic),
        ("angry", Angry),
        ("anger", Angry),
        ("rage", Angry),
        ("fury", Angry),
        ("furious", Angry),
        ("outraged", Angry),
        ("determined", Angry),
        ("resolved", Angry),
        ("courageous", Angry),
        ("afraid", Afraid),
        ("fear", Afraid),
        ("scared", Afraid),
        ("terrified", Afraid),
        ("alarmed", Afraid),
        ("disgusted", Disgusted),
        ("disgust", Disgusted),
        ("revolted", Disgusted),
        ("surprised", Surprised),
        ("surprise", Surprised),
        ("amazed", Surprised),
        ("shocked", Surprised),
        ("calm", Calm),
        ("neutral", Calm),
        ("normal", Calm),
        ("peaceful", Calm),
        ("thoughtful", Calm),
        ("wise", Calm),
        ("serene", Calm),
        ("reverent", Calm),
        ("respectful", Calm),
        ("高兴", Happy),
        ("快乐", Happy),
        ("愤怒", Angry),
        ("生气", Angry),
        ("悲伤", Sad),
        ("难过", Sad),
        ("恐惧", Afraid),
        ("害怕", Afraid),
        ("反感", Disgusted),
        ("厌恶", Disgusted),
        ("低落", Melancholic),
        ("忧郁", Melancholic),
        ("惊讶", Surprised),
        ("吃惊", Surprised),
        ("自然", Calm),
        ("平静", Calm),
    ]
    .into_iter()
    .collect()
});

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalized {
    pub emotion: CanonicalEmotion,
    pub alpha: f32,
}

/// Maps a free-text emotion token onto the canonical set. Unknown tokens are
/// calm.
pub fn canonicalize(token: &str) -> CanonicalEmotion {
    let key = token.trim().to_lowercase();
    SYNONYMS
        .get(key.as_str())
        .copied()
        .unwrap_or(CanonicalEmotion::Calm)
}

pub fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        FULL_INTENSITY
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

/// Reads a numeric intensity literal. Garbage degrades to full intensity.
pub fn parse_intensity(raw: &str) -> f32 {
    raw.trim()
        .parse::<f32>()
        .map(clamp_alpha)
        .unwrap_or(FULL_INTENSITY)
}

pub fn normalize(
    token: Option<&str>,
    value: Option<&TagValue>,
    default: CanonicalEmotion,
) -> Normalized {
    let emotion = match token {
        Some(t) if !t.trim().is_empty() => canonicalize(t),
        _ => default,
    };

    let alpha = match value {
        None => FULL_INTENSITY,
        Some(TagValue::Intensity(v)) => clamp_alpha(*v),
        Some(TagValue::Descriptive(_)) => DESCRIPTIVE_ALPHA,
    };

    Normalized { emotion, alpha }
}
