use crate::emotion::{normalize, parse_intensity, CanonicalEmotion, TagValue};
use crate::markup::{Attribution, BracketDefaults, RawSegment};
use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").expect("valid regex"));

struct Mood {
    emotion: CanonicalEmotion,
    alpha: f32,
}

pub(crate) fn parse(text: &str, defaults: &BracketDefaults) -> Vec<RawSegment> {
    let mut segments = Vec::new();
    let mut mood = Mood {
        emotion: defaults.emotion,
        alpha: defaults.alpha,
    };
    let mut cursor = 0;

    for caps in TAG.captures_iter(text) {
        let (Some(tag), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_span(&mut segments, &text[cursor..tag.start()], &mood, defaults);
        mood = read_tag(body.as_str(), defaults.emotion);
        cursor = tag.end();
    }
    push_span(&mut segments, &text[cursor..], &mood, defaults);

    segments
}

/// `happy`, `happy:0.7`, `Happy : 2` (clamped), `happy:lots` (full intensity).
fn read_tag(body: &str, default: CanonicalEmotion) -> Mood {
    let body = body.trim().to_lowercase();
    let (token, raw_value) = match body.split_once(':') {
        Some((token, value)) => (token, Some(value)),
        None => (body.as_str(), None),
    };
    let value = raw_value.map(|raw| TagValue::Intensity(parse_intensity(raw)));
    let normalized = normalize(Some(token), value.as_ref(), default);
    Mood {
        emotion: normalized.emotion,
        alpha: normalized.alpha,
    }
}

fn push_span(segments: &mut Vec<RawSegment>, span: &str, mood: &Mood, defaults: &BracketDefaults) {
    let text = span.trim();
    if text.is_empty() {
        return;
    }
    segments.push(RawSegment {
        order: segments.len() as u64,
        text: text.to_owned(),
        attribution: Attribution {
            speaker: defaults.speaker.clone(),
            emotion: mood.emotion,
            alpha: mood.alpha,
            is_dialogue: false,
            emotion_text: None,
        },
    });
}
