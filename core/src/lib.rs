pub mod deck;
pub mod editor;
pub mod error;
pub mod session;
pub mod shuffle;
pub mod speech;
pub mod text_tools;

use serde::{Deserialize, Serialize};

pub use deck::{parse_deck, parse_topics, parse_word_pairs, ResourceSource, TopicRegistry};
pub use editor::{DeckEditor, Side};
pub use error::{EditorError, LoadError, PlaybackError};
pub use session::{LoadOutcome, LoadTicket, Phase, SessionController, SessionView};
pub use shuffle::{shuffle, shuffled};
pub use speech::{Pronounce, SpeechEngine, SpeechPlayer, Utterance, Voice, VoicePreference};

/// One flashcard: German source text and its Ukrainian translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub de: String,
    pub uk: String,
}

impl WordPair {
    pub fn new(de: impl Into<String>, uk: impl Into<String>) -> Self {
        Self {
            de: de.into(),
            uk: uk.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.de.trim().is_empty() || self.uk.trim().is_empty()
    }
}

/// Entry of `topics.json`. `count` is a cached card count and may drift from
/// the deck it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    pub id: String,
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory or `http(s)://` URL that topic `file` references resolve against.
    pub root: String,
    pub topics: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub command: String,
    pub locale: String,
    pub preferred_provider: Option<String>,
    pub rate: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub export_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            topics: "data/topics.json".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_speech_command().to_string(),
            locale: "de-DE".to_string(),
            preferred_provider: Some("Google".to_string()),
            rate: 0.9,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

pub fn default_speech_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}
