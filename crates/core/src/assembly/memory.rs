use crate::assembly::{concat_with_pauses, AssemblyError, AudioAssembler};
use crate::config::PauseDuration;
use crate::tts::TtsAudio;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Assembles in memory and writes nothing.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssembler;

impl MemoryAssembler {
    pub fn new() -> Self {
        Self
    }
}

impl AudioAssembler for MemoryAssembler {
    fn assemble(
        &self,
        clips: Vec<TtsAudio>,
        pause: PauseDuration,
    ) -> BoxFuture<'_, Result<TtsAudio, AssemblyError>> {
        async move { concat_with_pauses(&clips, pause) }.boxed()
    }
}
