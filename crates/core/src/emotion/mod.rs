mod normalizer;
mod policy;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use normalizer::{
    canonicalize, clamp_alpha, normalize, parse_intensity, Normalized, DESCRIPTIVE_ALPHA,
    FULL_INTENSITY,
};
pub use policy::{adjust_alpha, SpeedHint, DIALOGUE_GAIN, DISABLE_THRESHOLD, NARRATION_GAIN};

/// The closed set of emotions the synthesis model understands.
///
/// Declaration order is the component order of [`EmotionVector`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalEmotion {
    Happy,
    Angry,
    Sad,
    Afraid,
    Disgusted,
    Melancholic,
    Surprised,
    #[default]
    Calm,
}

impl CanonicalEmotion {
    pub const ALL: [CanonicalEmotion; 8] = [
        CanonicalEmotion::Happy,
        CanonicalEmotion::Angry,
        CanonicalEmotion::Sad,
        CanonicalEmotion::Afraid,
        CanonicalEmotion::Disgusted,
        CanonicalEmotion::Melancholic,
        CanonicalEmotion::Surprised,
        CanonicalEmotion::Calm,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CanonicalEmotion::Happy => "happy",
            CanonicalEmotion::Angry => "angry",
            CanonicalEmotion::Sad => "sad",
            CanonicalEmotion::Afraid => "afraid",
            CanonicalEmotion::Disgusted => "disgusted",
            CanonicalEmotion::Melancholic => "melancholic",
            CanonicalEmotion::Surprised => "surprised",
            CanonicalEmotion::Calm => "calm",
        }
    }
}

impl fmt::Display for CanonicalEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown emotion `{0}`")]
pub struct UnknownEmotion(pub String);

/// Strict: only the canonical names. Use [`canonicalize`] for free-form
/// tokens.
impl FromStr for CanonicalEmotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CanonicalEmotion::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| UnknownEmotion(s.to_owned()))
    }
}

/// One weight per [`CanonicalEmotion`], in declaration order.
///
/// At most one component is non-zero. The all-zero vector means emotion
/// conditioning is switched off.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmotionVector(pub [f32; 8]);

impl EmotionVector {
    pub const DISABLED: Self = Self([0.0; 8]);

    pub fn new(emotion: CanonicalEmotion, alpha: f32) -> Self {
        let alpha = clamp_alpha(alpha);
        if alpha <= 0.0 {
            return Self::DISABLED;
        }
        let mut weights = [0.0; 8];
        weights[emotion.index()] = alpha;
        Self(weights)
    }

    pub fn is_disabled(&self) -> bool {
        self.0.iter().all(|w| *w == 0.0)
    }

    pub fn components(&self) -> &[f32; 8] {
        &self.0
    }

    pub fn dominant(&self) -> Option<CanonicalEmotion> {
        CanonicalEmotion::ALL
            .into_iter()
            .find(|emotion| self.0[emotion.index()] != 0.0)
    }
}

/// The value slot of an emotion tag, resolved once at parse time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum TagValue {
    Intensity(f32),
    Descriptive(String),
}

impl TagValue {
    /// Anything that parses as a float is an intensity; everything else is a
    /// free-text description of the emotion.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f32>() {
            Ok(value) => TagValue::Intensity(value),
            Err(_) => TagValue::Descriptive(trimmed.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_accepts_only_canonical_names() {
        assert_eq!(" Sad ".parse::<CanonicalEmotion>(), Ok(CanonicalEmotion::Sad));
        assert_eq!(
            "joyful".parse::<CanonicalEmotion>(),
            Err(UnknownEmotion("joyful".to_owned()))
        );
        for emotion in CanonicalEmotion::ALL {
            assert_eq!(emotion.to_string().parse::<CanonicalEmotion>(), Ok(emotion));
        }
    }

    #[test]
    fn vector_is_one_hot_in_declaration_order() {
        let v = EmotionVector::new(CanonicalEmotion::Afraid, 0.5);
        assert_eq!(v.components(), &[0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(v.dominant(), Some(CanonicalEmotion::Afraid));

        let calm = EmotionVector::new(CanonicalEmotion::Calm, 1.0);
        assert_eq!(calm.components()[7], 1.0);
    }

    #[test]
    fn zero_alpha_disables_vector() {
        let v = EmotionVector::new(CanonicalEmotion::Happy, 0.0);
        assert!(v.is_disabled());
        assert_eq!(v, EmotionVector::DISABLED);
        assert_eq!(v.dominant(), None);
    }

    #[test]
    fn classify_splits_numbers_from_descriptions() {
        assert_eq!(TagValue::classify(" 0.8 "), TagValue::Intensity(0.8));
        assert_eq!(
            TagValue::classify("very enthusiastic"),
            TagValue::Descriptive("very enthusiastic".to_owned())
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&CanonicalEmotion::Melancholic).unwrap();
        assert_eq!(json, "\"melancholic\"");
        assert_eq!(CanonicalEmotion::Surprised.to_string(), "surprised");
    }
}
