use crate::emotion::SpeedHint;
use crate::tts::{EmotionControl, SynthesisRequest, TtsAudio, TtsClient, TtsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Raw piper output carries no rate. Used when the model's `.onnx.json`
/// sidecar is missing or does not name one.
const PIPER_SAMPLE_RATE: u32 = 22050;
const PIPER_CHANNELS: u16 = 1;
const WAV_HEADER_BYTES: usize = 44;
const FAST_LENGTH_SCALE: f32 = 0.8;
const LOG_TARGET: &str = "tts::piper";

/// Runs the `piper` binary once per line. The line's voice reference is the
/// path of the piper voice model to load.
#[derive(Clone, Debug)]
pub struct PiperTtsClient {
    piper_binary: PathBuf,
    default_model: Option<PathBuf>,
}

impl PiperTtsClient {
    #[must_use]
    pub fn new(piper_binary: PathBuf, default_model: Option<PathBuf>) -> Self {
        Self {
            piper_binary,
            default_model,
        }
    }

    fn model_for(&self, request: &SynthesisRequest) -> Result<PathBuf, TtsError> {
        request
            .voice
            .as_ref()
            .map(|v| PathBuf::from(&v.0))
            .or_else(|| self.default_model.clone())
            .ok_or_else(|| TtsError::Failed("no piper voice model for this line".into()))
    }
}

#[derive(Deserialize)]
struct ModelConfig {
    audio: Option<ModelAudio>,
}

#[derive(Deserialize)]
struct ModelAudio {
    sample_rate: Option<u32>,
}

/// Reads `audio.sample_rate` from the `<model>.json` file piper ships next to
/// each voice model.
fn model_sample_rate(model: &Path) -> u32 {
    let mut sidecar = model.as_os_str().to_owned();
    sidecar.push(".json");

    let rate = std::fs::read_to_string(&sidecar)
        .ok()
        .and_then(|raw| serde_json::from_str::<ModelConfig>(&raw).ok())
        .and_then(|config| config.audio)
        .and_then(|audio| audio.sample_rate)
        .filter(|&rate| rate > 0);

    match rate {
        Some(rate) => rate,
        None => {
            tracing::debug!(
                target: LOG_TARGET,
                model = %model.display(),
                "no sample rate in model config; assuming {PIPER_SAMPLE_RATE} Hz"
            );
            PIPER_SAMPLE_RATE
        }
    }
}

fn length_scale(speed: SpeedHint) -> f32 {
    match speed {
        SpeedHint::Normal => 1.0,
        SpeedHint::Fast => FAST_LENGTH_SCALE,
    }
}

fn apply_volume(pcm: &mut [i16], volume: f32) {
    if (volume - 1.0).abs() < f32::EPSILON {
        return;
    }
    let gain = volume.max(0.0);
    for sample in pcm.iter_mut() {
        let scaled = f32::from(*sample) * gain;
        *sample = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
    }
}

impl TtsClient for PiperTtsClient {
    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        let piper_binary = self.piper_binary.clone();
        let model = self.model_for(&request);

        async move {
            let model_path = model?;
            let sample_rate_hz = model_sample_rate(&model_path);
            if !matches!(request.emotion, EmotionControl::Neutral) {
                tracing::debug!(
                    target: LOG_TARGET,
                    "piper has no emotion conditioning; speaking line neutrally"
                );
            }

            let mut child = Command::new(&piper_binary)
                .arg("--model")
                .arg(&model_path)
                .arg("--length_scale")
                .arg(length_scale(request.speed).to_string())
                .arg("--output_raw")
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    let path = piper_binary.display();
                    TtsError::Failed(format!("failed to spawn piper at {path}: {e}"))
                })?;

            {
                let stdin = child
                    .stdin
                    .as_mut()
                    .ok_or_else(|| TtsError::Failed("failed to open piper stdin".into()))?;
                stdin
                    .write_all(request.text.as_bytes())
                    .await
                    .map_err(|e| TtsError::Failed(format!("piper stdin write failed: {e}")))?;
            }
            child.stdin.take();

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| TtsError::Failed(format!("piper process failed: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let status = output.status;
                return Err(TtsError::Failed(format!(
                    "piper exited with {status}: {stderr}"
                )));
            }

            let raw_pcm = &output.stdout;
            let pcm_bytes = if raw_pcm.len() > WAV_HEADER_BYTES && &raw_pcm[..4] == b"RIFF" {
                &raw_pcm[WAV_HEADER_BYTES..]
            } else {
                raw_pcm.as_slice()
            };

            let mut pcm_i16: Vec<i16> = pcm_bytes
                .chunks_exact(2)
                .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
                .collect();

            if pcm_i16.is_empty() {
                return Err(TtsError::EmptyAudio);
            }
            apply_volume(&mut pcm_i16, request.volume);

            Ok(TtsAudio {
                sample_rate_hz,
                channels: PIPER_CHANNELS,
                pcm_i16,
            })
        }
        .boxed()
    }
}
