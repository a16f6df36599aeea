//! Script input: raw tagged text, or a JSON envelope produced by an upstream
//! text generator.
//!
//! ```json
//! {"output": {"script_content": "{[jake]:[happy:0.8]}Hi!", "character_config": {"characters": {}}}}
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid script envelope: {0}")]
    InvalidEnvelope(String),
    #[error("script envelope is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptInput {
    pub text: String,
    /// Character configuration shipped with the script. Replaces any
    /// configured registry for this run.
    pub embedded_characters: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Envelope {
    output: Option<EnvelopeOutput>,
}

#[derive(Deserialize)]
struct EnvelopeOutput {
    script_content: Option<String>,
    character_config: Option<serde_json::Value>,
}

impl ScriptInput {
    pub fn from_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            embedded_characters: None,
        }
    }

    pub fn from_envelope_str(raw: &str) -> Result<Self, ScriptError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| ScriptError::InvalidEnvelope(e.to_string()))?;
        let output = envelope.output.ok_or(ScriptError::MissingField("output"))?;
        let text = output
            .script_content
            .ok_or(ScriptError::MissingField("output.script_content"))?;
        Ok(Self {
            text,
            embedded_characters: output.character_config.filter(|v| !v.is_null()),
        })
    }

    /// `.json` files are read as envelopes; anything else is raw script text.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_envelope_str(&raw)
        } else {
            Ok(Self::from_text(raw))
        }
    }
}

/// Where a run's character registry comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum CharacterSource {
    Embedded,
    File(PathBuf),
    Missing,
}

/// An embedded configuration always wins over a configured path.
pub fn select_character_source(
    configured: Option<PathBuf>,
    script: &ScriptInput,
) -> CharacterSource {
    match (script.embedded_characters.is_some(), configured) {
        (true, Some(path)) => {
            tracing::warn!(
                path = %path.display(),
                "script embeds a character configuration; ignoring configured file"
            );
            CharacterSource::Embedded
        }
        (true, None) => CharacterSource::Embedded,
        (false, Some(path)) => CharacterSource::File(path),
        (false, None) => CharacterSource::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ENVELOPE: &str = r#"{
        "output": {
            "character_config": {
                "characters": {
                    "sarah": {"name": "Science Reporter", "voice_file": "sarah.wav"}
                }
            },
            "script_content": "{[sarah]:[excited:0.8]}Breaking news!"
        }
    }"#;

    #[test]
    fn envelope_yields_script_and_embedded_config() {
        let script = ScriptInput::from_envelope_str(ENVELOPE).unwrap();
        assert_eq!(script.text, "{[sarah]:[excited:0.8]}Breaking news!");
        let embedded = script.embedded_characters.unwrap();
        assert!(embedded["characters"]["sarah"].is_object());
    }

    #[test]
    fn envelope_without_output_is_rejected() {
        let err = ScriptInput::from_envelope_str(r#"{"script_content": "x"}"#).unwrap_err();
        assert!(matches!(err, ScriptError::MissingField("output")));
    }

    #[test]
    fn envelope_without_script_is_rejected() {
        let err = ScriptInput::from_envelope_str(r#"{"output": {}}"#).unwrap_err();
        assert!(matches!(err, ScriptError::MissingField("output.script_content")));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            ScriptInput::from_envelope_str("{oops"),
            Err(ScriptError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn from_file_switches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("job.json");
        std::fs::File::create(&json_path)
            .unwrap()
            .write_all(ENVELOPE.as_bytes())
            .unwrap();
        let script = ScriptInput::from_file(&json_path).unwrap();
        assert!(script.embedded_characters.is_some());

        let txt_path = dir.path().join("story.txt");
        std::fs::write(&txt_path, "[happy]Plain text.").unwrap();
        let script = ScriptInput::from_file(&txt_path).unwrap();
        assert_eq!(script, ScriptInput::from_text("[happy]Plain text."));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ScriptInput::from_file("/no/such/script.txt").unwrap_err();
        assert!(matches!(err, ScriptError::Read { .. }));
    }

    #[test]
    fn embedded_config_overrides_configured_path() {
        let script = ScriptInput::from_envelope_str(ENVELOPE).unwrap();
        assert_eq!(
            select_character_source(Some(PathBuf::from("cast.json")), &script),
            CharacterSource::Embedded
        );

        let plain = ScriptInput::from_text("hello");
        assert_eq!(
            select_character_source(Some(PathBuf::from("cast.json")), &plain),
            CharacterSource::File(PathBuf::from("cast.json"))
        );
        assert_eq!(select_character_source(None, &plain), CharacterSource::Missing);
    }
}
