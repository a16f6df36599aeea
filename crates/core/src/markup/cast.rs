use crate::character::{Registry, NARRATOR_ID};
use crate::emotion::{normalize, CanonicalEmotion, TagValue};
use crate::markup::{Attribution, RawSegment};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `{[character]:[emotion:value]}` where value is a float or free text.
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\[(?P<id>\w+)\]:\[(?P<emotion>\w+):(?P<value>[^\]]+)\]\}")
        .expect("valid regex")
});

pub(crate) fn parse(text: &str, registry: &Registry) -> Vec<RawSegment> {
    let mut segments = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        parse_line(line, registry, &mut segments);
    }
    segments
}

fn parse_line(line: &str, registry: &Registry, segments: &mut Vec<RawSegment>) {
    let tags: Vec<Captures<'_>> = TAG.captures_iter(line).collect();

    let first_tag_start = tags
        .first()
        .and_then(|caps| caps.get(0))
        .map_or(line.len(), |m| m.start());
    push(segments, &line[..first_tag_start], Attribution::plain_narration());

    for (i, caps) in tags.iter().enumerate() {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let content_end = tags
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(line.len(), |m| m.start());
        let content = &line[tag.end()..content_end];
        if content.trim().is_empty() {
            continue;
        }
        push(segments, content, attribute(caps, registry));
    }
}

fn attribute(caps: &Captures<'_>, registry: &Registry) -> Attribution {
    let id = &caps["id"];
    let token = &caps["emotion"];
    let value = TagValue::classify(&caps["value"]);
    let normalized = normalize(Some(token), Some(&value), CanonicalEmotion::Calm);

    let emotion_text = match &value {
        TagValue::Descriptive(description) => Some(format!("{token}: {description}")),
        TagValue::Intensity(_) => None,
    };

    let known = registry.contains(id);
    if !known {
        tracing::debug!(character = id, "unknown character; reading line as narration");
    }

    Attribution {
        speaker: (if known { id } else { NARRATOR_ID }).to_owned(),
        emotion: normalized.emotion,
        alpha: normalized.alpha,
        is_dialogue: known && id != NARRATOR_ID,
        emotion_text,
    }
}

fn push(segments: &mut Vec<RawSegment>, span: &str, attribution: Attribution) {
    let text = span.trim();
    if text.is_empty() {
        return;
    }
    segments.push(RawSegment {
        order: segments.len() as u64,
        text: text.to_owned(),
        attribution,
    });
}
