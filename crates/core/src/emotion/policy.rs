use serde::{Deserialize, Serialize};

/// Intensities at or below this value switch emotion conditioning off.
pub const DISABLE_THRESHOLD: f32 = 0.1;
pub const DIALOGUE_GAIN: f32 = 1.2;
pub const NARRATION_GAIN: f32 = 0.8;

const FAST_SPEECH_RATE: f32 = 1.3;

/// The intensity handed to the synthesizer for a chunk. The stored alpha is
/// left untouched.
pub fn adjust_alpha(alpha: f32, is_dialogue: bool) -> f32 {
    if alpha <= DISABLE_THRESHOLD {
        0.0
    } else if is_dialogue {
        (alpha * DIALOGUE_GAIN).min(1.0)
    } else {
        alpha * NARRATION_GAIN
    }
}

/// Coarse speed switch understood by the synthesis model.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeedHint {
    #[default]
    Normal,
    Fast,
}

impl SpeedHint {
    pub fn from_rate(speech_rate: f32) -> Self {
        if speech_rate >= FAST_SPEECH_RATE {
            SpeedHint::Fast
        } else {
            SpeedHint::Normal
        }
    }
}
