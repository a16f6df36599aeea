use crate::{
    assembly::{AssemblyError, AudioAssembler},
    character::{Registry, SharedRegistry},
    config::{Concurrency, ConfigError, PauseDuration, SegmentBudget},
    emotion::{adjust_alpha, SpeedHint},
    markup::{self, preview, Grammar},
    script::ScriptInput,
    segment::{segment_all, Chunk, ChunkKey},
    tts::{EmotionControl, SynthesisRequest, TtsAudio, TtsClient, TtsError},
};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LOG_TARGET: &str = "pipeline";

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("character configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no audio produced ({attempted} chunk(s) attempted)")]
    NoAudioProduced { attempted: usize },
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Parsing,
    Segmenting,
    Dispatching,
    Done,
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub grammar: Grammar,
    pub budget: SegmentBudget,
    pub pause: PauseDuration,
    pub concurrency: Concurrency,
    /// Upper bound for a single synthesis call. `None` waits indefinitely.
    pub synthesis_timeout: Option<Duration>,
}

/// A chunk together with the request that will voice it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlannedChunk {
    pub chunk: Chunk,
    pub request: SynthesisRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedChunk {
    pub key: ChunkKey,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub audio: TtsAudio,
    pub synthesized: Vec<ChunkKey>,
    pub skipped: Vec<SkippedChunk>,
}

pub struct Pipeline<Ts, As> {
    pub tts: Ts,
    pub assembler: As,
    pub registry: SharedRegistry,
    pub config: PipelineConfig,
}

impl<Ts, As> Pipeline<Ts, As>
where
    Ts: TtsClient,
    As: AudioAssembler,
{
    /// Parses and segments `script` and builds every synthesis request,
    /// without calling the synthesizer.
    pub fn plan(&self, script: &ScriptInput) -> Result<Vec<PlannedChunk>, PipelineError> {
        enter(PipelineStage::Parsing);
        if let Some(embedded) = &script.embedded_characters {
            let registry = Registry::from_json_value(embedded.clone())?;
            tracing::info!(
                target: LOG_TARGET,
                characters = registry.len(),
                "installing embedded character configuration"
            );
            self.registry.replace(registry);
        }
        let registry = self.registry.snapshot();
        let segments = markup::parse(&self.config.grammar, &script.text, &registry);

        enter(PipelineStage::Segmenting);
        let chunks = segment_all(segments, &self.config.budget);
        tracing::info!(target: LOG_TARGET, chunks = chunks.len(), "script planned");

        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let request = request_for(&chunk, &registry);
                PlannedChunk { chunk, request }
            })
            .collect())
    }

    pub async fn run(&self, script: &ScriptInput) -> Result<RunSummary, PipelineError> {
        let result = self.run_stages(script).await;
        match &result {
            Ok(summary) => tracing::info!(
                target: LOG_TARGET,
                stage = ?PipelineStage::Done,
                synthesized = summary.synthesized.len(),
                skipped = summary.skipped.len(),
                duration_ms = summary.audio.duration().as_millis() as u64,
                "pipeline finished"
            ),
            Err(e) => tracing::error!(
                target: LOG_TARGET,
                stage = ?PipelineStage::Failed,
                error = %e,
                "pipeline failed"
            ),
        }
        result
    }

    async fn run_stages(&self, script: &ScriptInput) -> Result<RunSummary, PipelineError> {
        let planned = self.plan(script)?;
        let attempted = planned.len();

        enter(PipelineStage::Dispatching);
        let (clips, skipped) = self.dispatch(planned).await;
        if clips.is_empty() {
            return Err(PipelineError::NoAudioProduced { attempted });
        }

        let (synthesized, clips): (Vec<ChunkKey>, Vec<TtsAudio>) = clips.into_iter().unzip();
        let audio = self.assembler.assemble(clips, self.config.pause).await?;

        Ok(RunSummary {
            audio,
            synthesized,
            skipped,
        })
    }

    /// Synthesizes every chunk, at most `concurrency` at a time. Successes
    /// come back in `(order, part)` order regardless of completion order.
    async fn dispatch(
        &self,
        planned: Vec<PlannedChunk>,
    ) -> (Vec<(ChunkKey, TtsAudio)>, Vec<SkippedChunk>) {
        let mut outcomes: Vec<(ChunkKey, String, Result<TtsAudio, TtsError>)> =
            stream::iter(planned)
                .map(|PlannedChunk { chunk, request }| async move {
                    let outcome = self.synthesize(request).await;
                    (chunk.key, preview(&chunk.text), outcome)
                })
                .buffer_unordered(self.config.concurrency.get())
                .collect()
                .await;
        outcomes.sort_by_key(|(key, ..)| *key);

        let mut clips = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (key, text, outcome) in outcomes {
            match outcome {
                Ok(audio) => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        order = key.order,
                        part = key.part,
                        duration_ms = audio.duration().as_millis() as u64,
                        "chunk synthesized"
                    );
                    clips.push((key, audio));
                }
                Err(e) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        order = key.order,
                        part = key.part,
                        error = %e,
                        "synthesis failed, skipping chunk: {text}"
                    );
                    skipped.push(SkippedChunk {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (clips, skipped)
    }

    async fn synthesize(&self, request: SynthesisRequest) -> Result<TtsAudio, TtsError> {
        match self.config.synthesis_timeout {
            Some(limit) => tokio::time::timeout(limit, self.tts.synthesize(request))
                .await
                .unwrap_or_else(|_| Err(TtsError::TimedOut(limit))),
            None => self.tts.synthesize(request).await,
        }
    }
}

fn enter(stage: PipelineStage) {
    tracing::info!(target: LOG_TARGET, stage = ?stage, "pipeline stage");
}

fn request_for(chunk: &Chunk, registry: &Registry) -> SynthesisRequest {
    let attribution = &chunk.attribution;
    let profile = registry.resolve_or_narrator(&attribution.speaker);
    let alpha = adjust_alpha(attribution.alpha, attribution.is_dialogue);

    SynthesisRequest {
        text: chunk.text.clone(),
        voice: profile.voice.clone(),
        emotion: EmotionControl::for_line(
            attribution.emotion,
            alpha,
            attribution.emotion_text.as_deref(),
        ),
        alpha,
        speed: SpeedHint::from_rate(profile.speech_rate),
        pitch: profile.pitch,
        volume: profile.volume,
    }
}
