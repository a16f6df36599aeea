#![deny(warnings)]

use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use scriptvoice_core::assembly::WavFileAssembler;
use scriptvoice_core::character::{Registry, SharedRegistry};
use scriptvoice_core::config::{
    resolve_character_config, resolve_string_with_default, Concurrency, ConfigError, Env,
    PauseDuration, SegmentBudget, StdEnv, DEFAULT_CHARACTER_CONFIG, DEFAULT_CONCURRENCY,
    DEFAULT_OVERLAP_CHARS, DEFAULT_PAUSE_MS, DEFAULT_PIPER_BINARY, DEFAULT_SEGMENT_CHARS,
    ENV_PIPER_BINARY,
};
use scriptvoice_core::emotion::{clamp_alpha, CanonicalEmotion, FULL_INTENSITY};
use scriptvoice_core::markup::{BracketDefaults, Grammar};
use scriptvoice_core::pipeline::{Pipeline, PipelineConfig};
use scriptvoice_core::script::{select_character_source, CharacterSource, ScriptInput};
use scriptvoice_core::tts::{PiperTtsClient, ToneTtsClient, TtsClient, VoiceId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum GrammarArg {
    /// `{[id]:[emotion:value]}text`, one speaker per tag.
    Cast,
    /// `[emotion:0.7]text`, one speaker throughout.
    Bracket,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Piper,
    /// Sine tones instead of speech. Needs no models.
    Tone,
}

#[derive(Parser, Debug)]
#[command(name = "scriptvoice")]
#[command(about = "Multi-character emotional narration from tagged scripts")]
#[command(group(
    ArgGroup::new("script")
        .required(true)
        .multiple(false)
        .args(["text", "input"])
))]
struct Args {
    /// Script text given inline.
    #[arg(long)]
    text: Option<String>,

    /// Script file. `.json` files are read as `{"output": {...}}` envelopes.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Character configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = GrammarArg::Cast)]
    grammar: GrammarArg,

    /// Voice for untagged or narrator lines. With the bracket grammar it
    /// replaces any configured narrator.
    #[arg(long)]
    voice: Option<String>,

    /// Emotion before the first tag (bracket grammar).
    #[arg(long, default_value = "calm")]
    default_emotion: String,

    /// Intensity before the first tag (bracket grammar), clamped to [0, 1].
    #[arg(long, default_value_t = FULL_INTENSITY)]
    default_alpha: f32,

    #[arg(long, default_value = "output.wav")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SEGMENT_CHARS)]
    segment_chars: usize,

    #[arg(long, default_value_t = DEFAULT_OVERLAP_CHARS)]
    overlap_chars: usize,

    #[arg(long, default_value_t = DEFAULT_PAUSE_MS)]
    pause_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-chunk synthesis timeout.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = BackendArg::Piper)]
    backend: BackendArg,

    #[arg(long)]
    piper_binary: Option<String>,

    /// Print the planned chunks as JSON and exit without synthesizing.
    #[arg(long, default_value_t = false)]
    parse_only: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug)]
struct RunConfig {
    script: ScriptInput,
    registry: Registry,
    pipeline: PipelineConfig,
    backend: BackendArg,
    piper_binary: PathBuf,
    voice: Option<VoiceId>,
    output: PathBuf,
    parse_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env, Path::exists)?;

    tracing::info!(
        characters = cfg.registry.len(),
        segment_chars = cfg.pipeline.budget.max_chars,
        overlap_chars = cfg.pipeline.budget.overlap_chars,
        concurrency = cfg.pipeline.concurrency.get(),
        "config loaded"
    );

    match cfg.backend {
        BackendArg::Piper => {
            let tts = PiperTtsClient::new(
                cfg.piper_binary.clone(),
                cfg.voice.as_ref().map(|v| PathBuf::from(&v.0)),
            );
            execute(tts, cfg).await
        }
        BackendArg::Tone => execute(ToneTtsClient::new(), cfg).await,
    }
}

async fn execute<Ts: TtsClient>(tts: Ts, cfg: RunConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline {
        tts,
        assembler: WavFileAssembler::new(&cfg.output),
        registry: SharedRegistry::new(cfg.registry),
        config: cfg.pipeline,
    };

    if cfg.parse_only {
        let planned = pipeline.plan(&cfg.script)?;
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    let summary = pipeline.run(&cfg.script).await?;
    tracing::info!(
        output = %cfg.output.display(),
        synthesized = summary.synthesized.len(),
        skipped = summary.skipped.len(),
        "done"
    );
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(
    args: Args,
    env: &impl Env,
    default_exists: impl Fn(&Path) -> bool,
) -> anyhow::Result<RunConfig> {
    let mut script = match (args.text, args.input) {
        (Some(text), None) => ScriptInput::from_text(text),
        (None, Some(path)) => ScriptInput::from_file(&path)
            .with_context(|| format!("failed to load script {}", path.display()))?,
        _ => anyhow::bail!("exactly one of --text or --input must be provided"),
    };

    let budget = SegmentBudget::new(args.segment_chars, args.overlap_chars)?;
    let concurrency = Concurrency::new(args.concurrency)?;
    let voice = args.voice.map(VoiceId);

    let grammar = match args.grammar {
        GrammarArg::Cast => Grammar::Cast,
        GrammarArg::Bracket => Grammar::Bracket(BracketDefaults {
            emotion: args.default_emotion.parse::<CanonicalEmotion>()?,
            alpha: clamp_alpha(args.default_alpha),
            ..BracketDefaults::default()
        }),
    };

    let configured = resolve_character_config(args.config, env, default_exists);
    let registry = match (&grammar, &voice) {
        // Bracket scripts speak with the narrator only, so an explicit voice wins.
        (Grammar::Bracket(_), Some(voice)) => {
            if script.embedded_characters.take().is_some() {
                tracing::info!("--voice given; ignoring the script's embedded characters");
            }
            Registry::single_voice(Some(voice.clone()))
        }
        _ => match select_character_source(configured, &script) {
            // Swapped in by the pipeline before parsing.
            CharacterSource::Embedded => Registry::single_voice(voice.clone()),
            CharacterSource::File(path) => Registry::load(&path)
                .with_context(|| format!("failed to load characters from {}", path.display()))?,
            CharacterSource::Missing if grammar == Grammar::Cast => {
                return Err(ConfigError::NotFound {
                    path: PathBuf::from(DEFAULT_CHARACTER_CONFIG),
                    reason: "no character configuration provided and default config not found"
                        .into(),
                }
                .into());
            }
            CharacterSource::Missing => Registry::single_voice(voice.clone()),
        },
    };

    let pipeline = PipelineConfig {
        grammar,
        budget,
        pause: PauseDuration::from_millis(args.pause_ms),
        concurrency,
        synthesis_timeout: args.timeout_secs.map(Duration::from_secs),
    };

    let piper_binary = PathBuf::from(resolve_string_with_default(
        args.piper_binary,
        ENV_PIPER_BINARY,
        env,
        DEFAULT_PIPER_BINARY,
    ));

    Ok(RunConfig {
        script,
        registry,
        pipeline,
        backend: args.backend,
        piper_binary,
        voice,
        output: args.output,
        parse_only: args.parse_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptvoice_core::assembly::MemoryAssembler;
    use scriptvoice_core::config::{MapEnv, ENV_CHARACTER_CONFIG};

    const BUNDLED_CONFIG: &str =
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/character_config.json");

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("scriptvoice").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn text_and_input_are_mutually_exclusive() {
        let err = Args::try_parse_from(["scriptvoice", "--text", "hi", "--input", "a.txt"]);
        assert!(err.is_err());
        assert!(Args::try_parse_from(["scriptvoice"]).is_err());
    }

    #[test]
    fn defaults_match_library_constants() {
        let cfg = build_config(
            parse(&["--text", "Hello.", "--grammar", "bracket"]),
            &MapEnv::default(),
            |_| false,
        )
        .unwrap();
        assert_eq!(cfg.pipeline.budget, SegmentBudget::default());
        assert_eq!(cfg.pipeline.pause, PauseDuration::default());
        assert_eq!(cfg.pipeline.concurrency.get(), 1);
        assert_eq!(cfg.pipeline.synthesis_timeout, None);
        assert_eq!(cfg.piper_binary, PathBuf::from(DEFAULT_PIPER_BINARY));
        assert_eq!(cfg.backend, BackendArg::Piper);
        assert_eq!(cfg.registry.len(), 1);
        match cfg.pipeline.grammar {
            Grammar::Bracket(defaults) => assert_eq!(defaults.alpha, FULL_INTENSITY),
            other => panic!("unexpected grammar {other:?}"),
        }
    }

    #[test]
    fn cast_grammar_without_configuration_is_fatal() {
        let err = build_config(parse(&["--text", "x"]), &MapEnv::default(), |_| false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound { path, .. }) if path == Path::new(DEFAULT_CHARACTER_CONFIG)
        ));

        // The single-speaker grammar still falls back to a narrator-only cast.
        let cfg = build_config(
            parse(&["--text", "x", "--grammar", "bracket"]),
            &MapEnv::default(),
            |_| false,
        )
        .unwrap();
        assert_eq!(cfg.registry.len(), 1);
    }

    #[tokio::test]
    async fn bracket_voice_overrides_configured_narrator() {
        let env = MapEnv::default().with_var(ENV_CHARACTER_CONFIG, BUNDLED_CONFIG);
        let cfg = build_config(
            parse(&["--text", "[sad]Rain.", "--grammar", "bracket", "--voice", "mine.onnx"]),
            &env,
            |_| false,
        )
        .unwrap();
        let mine = Some(VoiceId("mine.onnx".into()));
        assert_eq!(cfg.registry.narrator().voice, mine);

        let pipeline = Pipeline {
            tts: ToneTtsClient::new(),
            assembler: MemoryAssembler::new(),
            registry: SharedRegistry::new(cfg.registry),
            config: cfg.pipeline,
        };
        let planned = pipeline.plan(&cfg.script).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].request.voice, mine);
    }

    #[test]
    fn bracket_without_voice_keeps_the_configured_narrator() {
        let env = MapEnv::default().with_var(ENV_CHARACTER_CONFIG, BUNDLED_CONFIG);
        let cfg = build_config(
            parse(&["--text", "[sad]Rain.", "--grammar", "bracket"]),
            &env,
            |_| false,
        )
        .unwrap();
        assert_eq!(
            cfg.registry.narrator().voice,
            Some(VoiceId("voices/narrator.onnx".into()))
        );
    }

    #[test]
    fn default_alpha_feeds_the_bracket_defaults() {
        let alpha_for = |value: &str| {
            let cfg = build_config(
                parse(&["--text", "x", "--grammar", "bracket", "--default-alpha", value]),
                &MapEnv::default(),
                |_| false,
            )
            .unwrap();
            match cfg.pipeline.grammar {
                Grammar::Bracket(defaults) => defaults.alpha,
                other => panic!("unexpected grammar {other:?}"),
            }
        };
        assert_eq!(alpha_for("0.4"), 0.4);
        assert_eq!(alpha_for("1.7"), 1.0);
    }

    #[test]
    fn overlap_must_fit_the_segment_budget() {
        let err = build_config(
            parse(&["--text", "x", "--segment-chars", "10", "--overlap-chars", "10"]),
            &MapEnv::default(),
            |_| false,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::OverlapTooLarge {
                overlap: 10,
                max: 10
            })
        );
    }

    #[test]
    fn missing_character_file_is_fatal() {
        let env = MapEnv::default().with_var(ENV_CHARACTER_CONFIG, "/no/such/cast.json");
        assert!(build_config(parse(&["--text", "x"]), &env, |_| false).is_err());
    }

    #[test]
    fn bracket_grammar_takes_the_default_emotion() {
        let cfg = build_config(
            parse(&["--text", "x", "--grammar", "bracket", "--default-emotion", "sad"]),
            &MapEnv::default(),
            |_| false,
        )
        .unwrap();
        match cfg.pipeline.grammar {
            Grammar::Bracket(defaults) => assert_eq!(defaults.emotion, CanonicalEmotion::Sad),
            other => panic!("unexpected grammar {other:?}"),
        }

        assert!(build_config(
            parse(&["--text", "x", "--grammar", "bracket", "--default-emotion", "giddy"]),
            &MapEnv::default(),
            |_| false,
        )
        .is_err());
    }

    #[test]
    fn piper_binary_comes_from_env_when_flag_missing() {
        let env = MapEnv::default().with_var(ENV_PIPER_BINARY, "/opt/piper/piper");
        let cfg = build_config(
            parse(&["--text", "x", "--grammar", "bracket", "--backend", "tone"]),
            &env,
            |_| false,
        )
        .unwrap();
        assert_eq!(cfg.piper_binary, PathBuf::from("/opt/piper/piper"));
        assert_eq!(cfg.backend, BackendArg::Tone);
    }
}
