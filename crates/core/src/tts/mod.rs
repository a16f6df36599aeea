mod piper;
mod tone;

use crate::emotion::{CanonicalEmotion, EmotionVector, SpeedHint};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use piper::PiperTtsClient;
pub use tone::ToneTtsClient;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceId(pub String);

/// How the synthesizer should colour a line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EmotionControl {
    /// Plain voice cloning, no emotional conditioning.
    Neutral,
    Vector(EmotionVector),
    /// Free-text description, e.g. `"excited: very enthusiastic"`.
    Description(String),
}

impl EmotionControl {
    pub fn for_line(emotion: CanonicalEmotion, alpha: f32, description: Option<&str>) -> Self {
        if alpha <= 0.0 {
            return EmotionControl::Neutral;
        }
        match description {
            Some(text) => EmotionControl::Description(text.to_owned()),
            None => EmotionControl::Vector(EmotionVector::new(emotion, alpha)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Option<VoiceId>,
    pub emotion: EmotionControl,
    pub alpha: f32,
    pub speed: SpeedHint,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

impl TtsAudio {
    pub fn duration(&self) -> Duration {
        let frames = self.pcm_i16.len() as u64 / u64::from(self.channels.max(1));
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate_hz.max(1)))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("synthesis failed: {0}")]
    Failed(String),
    #[error("synthesis timed out after {0:?}")]
    TimedOut(Duration),
    #[error("synthesis cancelled")]
    Cancelled,
    #[error("synthesizer produced no audio")]
    EmptyAudio,
}

pub trait TtsClient: Send + Sync {
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>>;
}
