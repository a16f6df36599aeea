use crate::emotion::{CanonicalEmotion, SpeedHint};
use crate::tts::{EmotionControl, SynthesisRequest, TtsAudio, TtsClient, TtsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::f32::consts::PI;

const TONE_SAMPLE_RATE: u32 = 24_000;
const BASE_FREQ_HZ: f32 = 220.0;
const MS_PER_CHAR: usize = 60;
const MIN_DURATION_MS: usize = 300;

/// Deterministic stand-in synthesizer: one sine tone per line, shaped by the
/// request's pitch, speed, volume and emotion. Used for dry runs and tests.
#[derive(Clone, Debug, Default)]
pub struct ToneTtsClient;

impl ToneTtsClient {
    pub fn new() -> Self {
        Self
    }
}

impl TtsClient for ToneTtsClient {
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let chars = request.text.chars().count();
            if chars == 0 {
                return Err(TtsError::EmptyAudio);
            }

            let mut duration_ms = (chars * MS_PER_CHAR).max(MIN_DURATION_MS);
            if request.speed == SpeedHint::Fast {
                duration_ms = duration_ms * 4 / 5;
            }

            // Emotional lines drift away from the base pitch by up to a fifth.
            let emotion_shift = match &request.emotion {
                EmotionControl::Neutral => 0.0,
                EmotionControl::Description(_) => request.alpha * 0.25,
                EmotionControl::Vector(v) => match v.dominant() {
                    Some(CanonicalEmotion::Sad | CanonicalEmotion::Melancholic) => {
                        -request.alpha * 0.2
                    }
                    Some(CanonicalEmotion::Calm) | None => 0.0,
                    Some(_) => request.alpha * 0.5,
                },
            };
            let freq = BASE_FREQ_HZ * request.pitch.abs().max(0.1) * (1.0 + emotion_shift);
            let amplitude = 0.3 * request.volume.clamp(0.0, 1.0);

            let samples = duration_ms * TONE_SAMPLE_RATE as usize / 1000;
            let pcm_i16 = (0..samples)
                .map(|i| {
                    let t = i as f32 / TONE_SAMPLE_RATE as f32;
                    let value = amplitude * (2.0 * PI * freq * t).sin();
                    (value * f32::from(i16::MAX)) as i16
                })
                .collect();

            Ok(TtsAudio {
                sample_rate_hz: TONE_SAMPLE_RATE,
                channels: 1,
                pcm_i16,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, speed: SpeedHint) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_owned(),
            voice: None,
            emotion: EmotionControl::Neutral,
            alpha: 0.0,
            speed,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    #[tokio::test]
    async fn longer_text_gives_longer_audio() {
        let client = ToneTtsClient::new();
        let short = client.synthesize(request("Hi.", SpeedHint::Normal)).await.unwrap();
        let long = client
            .synthesize(request("A considerably longer line of text.", SpeedHint::Normal))
            .await
            .unwrap();
        assert_eq!(short.sample_rate_hz, TONE_SAMPLE_RATE);
        assert!(long.pcm_i16.len() > short.pcm_i16.len());
    }

    #[tokio::test]
    async fn fast_speech_is_shorter() {
        let client = ToneTtsClient::new();
        let text = "The same sentence, twice over.";
        let normal = client.synthesize(request(text, SpeedHint::Normal)).await.unwrap();
        let fast = client.synthesize(request(text, SpeedHint::Fast)).await.unwrap();
        assert!(fast.pcm_i16.len() < normal.pcm_i16.len());
    }

    #[tokio::test]
    async fn empty_text_is_an_error() {
        let client = ToneTtsClient::new();
        let result = client.synthesize(request("", SpeedHint::Normal)).await;
        assert!(matches!(result, Err(TtsError::EmptyAudio)));
    }
}
