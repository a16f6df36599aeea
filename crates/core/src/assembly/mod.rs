//! Joining synthesized clips into one track.

mod memory;
mod wav;

use crate::config::PauseDuration;
use crate::tts::TtsAudio;
use futures::future::BoxFuture;
use std::path::PathBuf;

pub use memory::MemoryAssembler;
pub use wav::WavFileAssembler;

#[derive(thiserror::Error, Debug)]
pub enum AssemblyError {
    #[error("no clips to assemble")]
    NoClips,

    #[error("clip {index} is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },

    #[error("clip {index} has {found} channel(s), expected {expected}")]
    ChannelMismatch {
        index: usize,
        expected: u16,
        found: u16,
    },

    #[error("failed to write {path}: {details}")]
    Write { path: PathBuf, details: String },
}

pub trait AudioAssembler: Send + Sync {
    /// Clips arrive in playback order.
    fn assemble(
        &self,
        clips: Vec<TtsAudio>,
        pause: PauseDuration,
    ) -> BoxFuture<'_, Result<TtsAudio, AssemblyError>>;
}

/// Concatenates clips with `pause` of silence between neighbours. Every clip
/// must share the first clip's sample rate and channel count.
pub fn concat_with_pauses(
    clips: &[TtsAudio],
    pause: PauseDuration,
) -> Result<TtsAudio, AssemblyError> {
    let first = clips.first().ok_or(AssemblyError::NoClips)?;
    let sample_rate_hz = first.sample_rate_hz;
    let channels = first.channels;

    for (index, clip) in clips.iter().enumerate().skip(1) {
        if clip.sample_rate_hz != sample_rate_hz {
            return Err(AssemblyError::SampleRateMismatch {
                index,
                expected: sample_rate_hz,
                found: clip.sample_rate_hz,
            });
        }
        if clip.channels != channels {
            return Err(AssemblyError::ChannelMismatch {
                index,
                expected: channels,
                found: clip.channels,
            });
        }
    }

    let gap = pause
        .samples_for_sample_rate(sample_rate_hz)
        .saturating_mul(usize::from(channels.max(1)));
    let total = clips.iter().map(|c| c.pcm_i16.len()).sum::<usize>()
        + gap.saturating_mul(clips.len() - 1);

    let mut pcm_i16 = Vec::with_capacity(total);
    for (index, clip) in clips.iter().enumerate() {
        if index > 0 {
            pcm_i16.resize(pcm_i16.len() + gap, 0);
        }
        pcm_i16.extend_from_slice(&clip.pcm_i16);
    }

    Ok(TtsAudio {
        sample_rate_hz,
        channels,
        pcm_i16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(sample_rate_hz: u32, channels: u16, pcm_i16: Vec<i16>) -> TtsAudio {
        TtsAudio {
            sample_rate_hz,
            channels,
            pcm_i16,
        }
    }

    #[test]
    fn inserts_silence_between_clips_only() {
        let out = concat_with_pauses(
            &[clip(1_000, 1, vec![1, 1]), clip(1_000, 1, vec![2]), clip(1_000, 1, vec![3])],
            PauseDuration::from_millis(3),
        )
        .unwrap();
        assert_eq!(out.pcm_i16, vec![1, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        assert_eq!(out.sample_rate_hz, 1_000);
    }

    #[test]
    fn pause_covers_every_channel() {
        let out = concat_with_pauses(
            &[clip(1_000, 2, vec![1, 1]), clip(1_000, 2, vec![2, 2])],
            PauseDuration::from_millis(1),
        )
        .unwrap();
        assert_eq!(out.pcm_i16, vec![1, 1, 0, 0, 2, 2]);
    }

    #[test]
    fn single_clip_is_returned_as_is() {
        let only = clip(24_000, 1, vec![5, 6, 7]);
        let out = concat_with_pauses(&[only.clone()], PauseDuration::default()).unwrap();
        assert_eq!(out, only);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            concat_with_pauses(&[], PauseDuration::default()),
            Err(AssemblyError::NoClips)
        ));
    }

    #[test]
    fn mixed_sample_rates_are_rejected() {
        let err = concat_with_pauses(
            &[clip(24_000, 1, vec![0]), clip(22_050, 1, vec![0])],
            PauseDuration::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::SampleRateMismatch {
                index: 1,
                expected: 24_000,
                found: 22_050
            }
        ));
    }

    #[test]
    fn mixed_channel_counts_are_rejected() {
        let err = concat_with_pauses(
            &[clip(24_000, 1, vec![0]), clip(24_000, 2, vec![0, 0])],
            PauseDuration::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::ChannelMismatch { index: 1, .. }));
    }
}
