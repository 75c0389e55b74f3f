use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::SpeechConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Locale tag applied even when no matching voice exists.
    pub lang: String,
    pub voice: Option<Voice>,
    pub rate: f32,
}

/// Platform voice synthesis.
pub trait SpeechEngine {
    fn voices(&self) -> Vec<Voice>;
    fn cancel(&mut self);
    fn speak(&mut self, utterance: &Utterance) -> Result<(), PlaybackError>;
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn voices(&self) -> Vec<Voice> {
        (**self).voices()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), PlaybackError> {
        (**self).speak(utterance)
    }
}

/// What the session controller needs from audio: fire and forget.
pub trait Pronounce {
    fn pronounce(&mut self, text: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoicePreference {
    pub locale: String,
    pub provider: Option<String>,
    pub rate: f32,
}

impl VoicePreference {
    pub fn language_code(&self) -> &str {
        self.locale.split(['-', '_']).next().unwrap_or(&self.locale)
    }
}

impl From<&SpeechConfig> for VoicePreference {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            provider: config
                .preferred_provider
                .clone()
                .filter(|name| !name.trim().is_empty()),
            rate: config.rate,
        }
    }
}

impl Default for VoicePreference {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

/// Picks a voice for the preferred locale: provider-named voice of the right
/// language first, then an exact locale match, then any voice of the language.
pub fn select_voice<'a>(voices: &'a [Voice], prefs: &VoicePreference) -> Option<&'a Voice> {
    let locale = normalize_tag(&prefs.locale);
    let language = normalize_tag(prefs.language_code());
    let speaks_language = |voice: &Voice| normalize_tag(&voice.lang).starts_with(&language);

    if let Some(provider) = &prefs.provider {
        let provider = provider.to_ascii_lowercase();
        let preferred = voices
            .iter()
            .find(|voice| voice.name.to_ascii_lowercase().contains(&provider) && speaks_language(voice));
        if preferred.is_some() {
            return preferred;
        }
    }

    voices
        .iter()
        .find(|voice| normalize_tag(&voice.lang) == locale)
        .or_else(|| voices.iter().find(|voice| speaks_language(voice)))
}

pub struct SpeechPlayer<E> {
    engine: E,
    prefs: VoicePreference,
    voice: Option<Voice>,
}

impl<E: SpeechEngine> SpeechPlayer<E> {
    pub fn new(engine: E, prefs: VoicePreference) -> Self {
        let mut player = Self {
            engine,
            prefs,
            voice: None,
        };
        player.refresh_voices();
        player
    }

    pub fn refresh_voices(&mut self) {
        let voices = self.engine.voices();
        self.voice = select_voice(&voices, &self.prefs).cloned();
        match &self.voice {
            Some(voice) => info!(voice = %voice.name, lang = %voice.lang, "selected voice"),
            None => warn!(locale = %self.prefs.locale, "no matching voice, using platform default"),
        }
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn speak(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.engine.cancel();

        let mut utterance = Utterance {
            text: text.to_string(),
            lang: self.prefs.locale.clone(),
            voice: self.voice.clone(),
            rate: self.prefs.rate,
        };
        let err = match self.engine.speak(&utterance) {
            Ok(()) => return,
            Err(err) => err,
        };
        if err.is_benign() {
            debug!(error = %err, "playback superseded");
            return;
        }

        warn!(error = %err, "playback failed, retrying with default voice");
        utterance.voice = None;
        if let Err(err) = self.engine.speak(&utterance) {
            debug!(error = %err, "fallback playback failed");
        }
    }
}

impl<E: SpeechEngine> Pronounce for SpeechPlayer<E> {
    fn pronounce(&mut self, text: &str) {
        self.speak(text);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn voice(name: &str, lang: &str) -> Voice {
        Voice {
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        voices: Vec<Voice>,
        failures: VecDeque<PlaybackError>,
        spoken: Vec<Utterance>,
        cancels: usize,
    }

    impl SpeechEngine for FakeEngine {
        fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }

        fn speak(&mut self, utterance: &Utterance) -> Result<(), PlaybackError> {
            self.spoken.push(utterance.clone());
            match self.failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn provider_voice_wins_over_exact_locale() {
        let voices = vec![
            voice("Anna", "de-DE"),
            voice("Google Deutsch", "de-DE"),
            voice("Google US English", "en-US"),
        ];
        let picked = select_voice(&voices, &VoicePreference::default());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Google Deutsch"));
    }

    #[test]
    fn provider_voice_must_speak_the_language() {
        let voices = vec![voice("Google US English", "en-US"), voice("Anna", "de_DE")];
        let picked = select_voice(&voices, &VoicePreference::default());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Anna"));
    }

    #[test]
    fn exact_locale_beats_language_prefix() {
        let voices = vec![voice("Swiss", "de-CH"), voice("Yannick", "de-DE")];
        let prefs = VoicePreference {
            provider: None,
            ..VoicePreference::default()
        };
        let picked = select_voice(&voices, &prefs);
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Yannick"));
    }

    #[test]
    fn falls_back_to_language_prefix_then_nothing() {
        let voices = vec![voice("Swiss", "de-CH"), voice("Alex", "en-US")];
        let picked = select_voice(&voices, &VoicePreference::default());
        assert_eq!(picked.map(|v| v.name.as_str()), Some("Swiss"));

        let english_only = vec![voice("Alex", "en-US")];
        assert!(select_voice(&english_only, &VoicePreference::default()).is_none());
    }

    #[test]
    fn speak_cancels_before_every_request() {
        let engine = FakeEngine {
            voices: vec![voice("Anna", "de-DE")],
            ..FakeEngine::default()
        };
        let mut player = SpeechPlayer::new(engine, VoicePreference::default());
        player.speak("Apfel");
        player.speak("Brot");
        assert_eq!(player.engine().cancels, 2);
        assert_eq!(player.engine().spoken.len(), 2);
        assert_eq!(player.engine().spoken[1].text, "Brot");
        assert_eq!(player.engine().spoken[1].lang, "de-DE");
        assert_eq!(player.engine().spoken[1].voice.as_ref().map(|v| v.name.as_str()), Some("Anna"));
    }

    #[test]
    fn blank_text_is_ignored() {
        let mut player = SpeechPlayer::new(FakeEngine::default(), VoicePreference::default());
        player.speak("   ");
        assert!(player.engine().spoken.is_empty());
        assert_eq!(player.engine().cancels, 0);
    }

    #[test]
    fn benign_failures_are_not_retried() {
        let engine = FakeEngine {
            voices: vec![voice("Anna", "de-DE")],
            failures: VecDeque::from([PlaybackError::Interrupted]),
            ..FakeEngine::default()
        };
        let mut player = SpeechPlayer::new(engine, VoicePreference::default());
        player.speak("Apfel");
        assert_eq!(player.engine().spoken.len(), 1);

        player.engine_mut().failures.push_back(PlaybackError::Canceled);
        player.speak("Brot");
        assert_eq!(player.engine().spoken.len(), 2);
    }

    #[test]
    fn other_failures_retry_once_with_default_voice() {
        let engine = FakeEngine {
            voices: vec![voice("Anna", "de-DE")],
            failures: VecDeque::from([
                PlaybackError::Failed("synthesis".to_string()),
                PlaybackError::Failed("again".to_string()),
            ]),
            ..FakeEngine::default()
        };
        let mut player = SpeechPlayer::new(engine, VoicePreference::default());
        player.speak("Apfel");

        let spoken = &player.engine().spoken;
        assert_eq!(spoken.len(), 2);
        assert!(spoken[0].voice.is_some());
        assert!(spoken[1].voice.is_none());
        assert_eq!(spoken[1].lang, "de-DE");
    }

    #[test]
    fn without_a_voice_the_locale_tag_is_still_applied() {
        let engine = FakeEngine {
            voices: vec![voice("Alex", "en-US")],
            ..FakeEngine::default()
        };
        let mut player = SpeechPlayer::new(engine, VoicePreference::default());
        assert!(player.voice().is_none());
        player.pronounce("Guten Morgen");
        let spoken = &player.engine().spoken[0];
        assert!(spoken.voice.is_none());
        assert_eq!(spoken.lang, "de-DE");
        assert!((spoken.rate - 0.9).abs() < f32::EPSILON);
    }
}
