//! Character voice profiles.

use crate::config::ConfigError;
use crate::emotion::{canonicalize, CanonicalEmotion};
use crate::tts::VoiceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

pub const NARRATOR_ID: &str = "narrator";

const NARRATOR_DISPLAY_NAME: &str = "Narrator";
const NARRATOR_INTENSITY: f32 = 0.3;
const ENTRY_INTENSITY: f32 = 0.5;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CharacterProfile {
    pub id: String,
    pub display_name: String,
    /// `None` leaves the choice of voice to the synthesizer.
    pub voice: Option<VoiceId>,
    pub pitch: f32,
    pub speech_rate: f32,
    pub volume: f32,
    pub default_emotion: CanonicalEmotion,
    pub default_intensity: f32,
    pub description: String,
}

/// On-disk shape of the character configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterDocument {
    #[serde(default)]
    pub characters: BTreeMap<String, CharacterEntry>,
    #[serde(default)]
    pub narration_settings: Option<SpeakerSettings>,
    #[serde(default)]
    pub dialogue_settings: Option<SpeakerSettings>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CharacterEntry {
    pub name: String,
    pub voice_file: String,
    #[serde(default)]
    pub default_emotion: Option<String>,
    #[serde(default = "entry_intensity")]
    pub emotion_intensity: f32,
    #[serde(default = "unit_multiplier")]
    pub speech_rate: f32,
    #[serde(default = "unit_multiplier")]
    pub pitch: f32,
    #[serde(default = "unit_multiplier")]
    pub volume: f32,
    #[serde(default)]
    pub description: String,
}

/// Defaults shared by every narration or dialogue line.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeakerSettings {
    #[serde(default)]
    pub default_emotion: Option<String>,
    #[serde(default)]
    pub emotion_intensity: Option<f32>,
    #[serde(default)]
    pub speech_rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
    /// Seconds of silence after a line.
    #[serde(default)]
    pub pause_duration: Option<f32>,
}

fn entry_intensity() -> f32 {
    ENTRY_INTENSITY
}

fn unit_multiplier() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    narrator: CharacterProfile,
    characters: BTreeMap<String, CharacterProfile>,
    narration_settings: SpeakerSettings,
    dialogue_settings: SpeakerSettings,
}

impl Registry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::NotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let registry = Self::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            characters = registry.characters.len(),
            "character registry loaded"
        );
        Ok(registry)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let document: CharacterDocument =
            serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        Self::from_document(document)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let document: CharacterDocument =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        Self::from_document(document)
    }

    pub fn from_document(document: CharacterDocument) -> Result<Self, ConfigError> {
        let narration_settings = document.narration_settings.unwrap_or_default();
        let dialogue_settings = document.dialogue_settings.unwrap_or_default();

        let mut characters = BTreeMap::new();
        for (id, entry) in document.characters {
            let profile = profile_from_entry(&id, entry)?;
            characters.insert(id, profile);
        }

        let narrator = match characters.remove(NARRATOR_ID) {
            Some(profile) => profile,
            None => {
                tracing::debug!("no narrator configured; using built-in narrator profile");
                synthesized_narrator(&narration_settings, None)
            }
        };

        Ok(Self {
            narrator,
            characters,
            narration_settings,
            dialogue_settings,
        })
    }

    /// A registry with nothing but a narrator speaking in `voice`.
    pub fn single_voice(voice: Option<VoiceId>) -> Self {
        let narration_settings = SpeakerSettings::default();
        Self {
            narrator: synthesized_narrator(&narration_settings, voice),
            characters: BTreeMap::new(),
            narration_settings,
            dialogue_settings: SpeakerSettings::default(),
        }
    }

    pub fn resolve(&self, id: &str) -> Option<&CharacterProfile> {
        if id == NARRATOR_ID {
            Some(&self.narrator)
        } else {
            self.characters.get(id)
        }
    }

    pub fn resolve_or_narrator(&self, id: &str) -> &CharacterProfile {
        self.resolve(id).unwrap_or(&self.narrator)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resolve(id).is_some()
    }

    pub fn narrator(&self) -> &CharacterProfile {
        &self.narrator
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(NARRATOR_ID).chain(self.characters.keys().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.characters.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn narration_settings(&self) -> &SpeakerSettings {
        &self.narration_settings
    }

    pub fn dialogue_settings(&self) -> &SpeakerSettings {
        &self.dialogue_settings
    }
}

fn profile_from_entry(id: &str, entry: CharacterEntry) -> Result<CharacterProfile, ConfigError> {
    let voice = entry.voice_file.trim();
    if voice.is_empty() {
        return Err(ConfigError::Malformed(format!(
            "character `{id}` has an empty voice_file"
        )));
    }
    if !(0.0..=1.0).contains(&entry.emotion_intensity) {
        return Err(ConfigError::Malformed(format!(
            "character `{id}` has emotion_intensity {} outside [0, 1]",
            entry.emotion_intensity
        )));
    }

    Ok(CharacterProfile {
        id: id.to_owned(),
        display_name: entry.name,
        voice: Some(VoiceId(voice.to_owned())),
        pitch: entry.pitch,
        speech_rate: entry.speech_rate,
        volume: entry.volume,
        default_emotion: entry
            .default_emotion
            .as_deref()
            .map(canonicalize)
            .unwrap_or_default(),
        default_intensity: entry.emotion_intensity,
        description: entry.description,
    })
}

fn synthesized_narrator(settings: &SpeakerSettings, voice: Option<VoiceId>) -> CharacterProfile {
    CharacterProfile {
        id: NARRATOR_ID.to_owned(),
        display_name: NARRATOR_DISPLAY_NAME.to_owned(),
        voice,
        pitch: settings.pitch.unwrap_or(1.0),
        speech_rate: settings.speech_rate.unwrap_or(1.0),
        volume: settings.volume.unwrap_or(1.0),
        default_emotion: settings
            .default_emotion
            .as_deref()
            .map(canonicalize)
            .unwrap_or_default(),
        default_intensity: settings
            .emotion_intensity
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(NARRATOR_INTENSITY),
        description: String::new(),
    }
}

/// The registry in force for new runs. Cloning shares the slot.
#[derive(Clone, Debug)]
pub struct SharedRegistry {
    current: Arc<RwLock<Arc<Registry>>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn snapshot(&self) -> Arc<Registry> {
        let guard = match self.current.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("registry lock was poisoned; recovering and continuing");
                poisoned.into_inner()
            }
        };
        Arc::clone(&guard)
    }

    /// Installs `registry` and returns the one it replaced.
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let mut guard = match self.current.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("registry lock was poisoned; recovering and continuing");
                poisoned.into_inner()
            }
        };
        std::mem::replace(&mut *guard, Arc::new(registry))
    }
}
