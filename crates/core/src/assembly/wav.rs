use crate::assembly::{concat_with_pauses, AssemblyError, AudioAssembler};
use crate::config::PauseDuration;
use crate::tts::TtsAudio;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "assembly::wav";

/// Writes the assembled track as 16-bit PCM WAV.
#[derive(Clone, Debug)]
pub struct WavFileAssembler {
    path: PathBuf,
}

impl WavFileAssembler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_wav(path: &Path, audio: &TtsAudio) -> Result<(), hound::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &audio.pcm_i16 {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

impl AudioAssembler for WavFileAssembler {
    fn assemble(
        &self,
        clips: Vec<TtsAudio>,
        pause: PauseDuration,
    ) -> BoxFuture<'_, Result<TtsAudio, AssemblyError>> {
        async move {
            let audio = concat_with_pauses(&clips, pause)?;
            let path = self.path.clone();

            let written = tokio::task::spawn_blocking(move || {
                let result = write_wav(&path, &audio);
                (audio, path, result)
            })
            .await
            .map_err(|e| AssemblyError::Write {
                path: self.path.clone(),
                details: format!("writer task failed: {e}"),
            })?;

            let (audio, path, result) = written;
            result.map_err(|e| AssemblyError::Write {
                path: path.clone(),
                details: e.to_string(),
            })?;

            tracing::info!(
                target: LOG_TARGET,
                path = %path.display(),
                clips = clips.len(),
                duration_ms = audio.duration().as_millis() as u64,
                "wrote assembled audio"
            );
            Ok(audio)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_a_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("story.wav");
        let assembler = WavFileAssembler::new(&path);

        let clips = vec![
            TtsAudio {
                sample_rate_hz: 24_000,
                channels: 1,
                pcm_i16: vec![100; 240],
            },
            TtsAudio {
                sample_rate_hz: 24_000,
                channels: 1,
                pcm_i16: vec![-100; 240],
            },
        ];
        let audio = assembler
            .assemble(clips, PauseDuration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(audio.pcm_i16.len(), 240 + 2_400 + 240);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, audio.pcm_i16);
    }

    #[tokio::test]
    async fn nothing_is_written_for_mismatched_clips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        let assembler = WavFileAssembler::new(&path);

        let clips = vec![
            TtsAudio {
                sample_rate_hz: 24_000,
                channels: 1,
                pcm_i16: vec![0; 10],
            },
            TtsAudio {
                sample_rate_hz: 16_000,
                channels: 1,
                pcm_i16: vec![0; 10],
            },
        ];
        let err = assembler
            .assemble(clips, PauseDuration::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::SampleRateMismatch { .. }));
        assert!(!path.exists());
    }
}
