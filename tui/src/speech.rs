use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use karten_core::{PlaybackError, SpeechEngine, Utterance, Voice};
use tracing::{debug, warn};

const BASE_WORDS_PER_MINUTE: f32 = 175.0;
/// How long `speak` watches a fresh child for an immediate failure, such as
/// an unknown voice.
const EARLY_EXIT_MS: u64 = 150;
const POLL_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Synth {
    Espeak,
    Say,
}

/// Speaks through an external synthesizer (`espeak-ng`/`espeak`, or macOS
/// `say`). Playback runs in a child process that `cancel` kills.
pub struct CommandEngine {
    program: String,
    synth: Synth,
    child: Option<Child>,
}

impl CommandEngine {
    pub fn new(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program);
        let synth = if name == "say" { Synth::Say } else { Synth::Espeak };
        Self {
            program: program.to_string(),
            synth,
            child: None,
        }
    }

    fn spawn_error(&self, err: io::Error) -> PlaybackError {
        if err.kind() == io::ErrorKind::NotFound {
            PlaybackError::Unavailable(format!("{} is not installed", self.program))
        } else {
            PlaybackError::Failed(err.to_string())
        }
    }
}

fn exit_result(program: &str, status: ExitStatus) -> Result<(), PlaybackError> {
    if status.success() {
        Ok(())
    } else {
        Err(PlaybackError::Failed(format!("{program} exited with {status}")))
    }
}

/// Ends a playback child. One still running is killed and counts as
/// canceled; one that already exited reports how it ended.
fn stop_child(program: &str, child: &mut Child) -> Result<(), PlaybackError> {
    match child.try_wait() {
        Ok(Some(status)) => exit_result(program, status),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(PlaybackError::Canceled)
        }
        Err(err) => Err(PlaybackError::Failed(err.to_string())),
    }
}

fn words_per_minute(rate: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * rate.clamp(0.1, 4.0)).round() as u32
}

impl SpeechEngine for CommandEngine {
    fn voices(&self) -> Vec<Voice> {
        let output = match self.synth {
            Synth::Espeak => Command::new(&self.program).arg("--voices").output(),
            Synth::Say => Command::new(&self.program).args(["-v", "?"]).output(),
        };
        match output {
            Ok(output) if output.status.success() => {
                let listing = String::from_utf8_lossy(&output.stdout);
                match self.synth {
                    Synth::Espeak => parse_espeak_voices(&listing),
                    Synth::Say => parse_say_voices(&listing),
                }
            }
            Ok(output) => {
                warn!(program = %self.program, status = %output.status, "voice listing failed");
                Vec::new()
            }
            Err(err) => {
                warn!(program = %self.program, error = %err, "speech synthesizer unavailable");
                Vec::new()
            }
        }
    }

    fn cancel(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match stop_child(&self.program, &mut child) {
            Ok(()) => {}
            Err(PlaybackError::Canceled) => debug!("stopped previous utterance"),
            Err(err) => warn!(program = %self.program, error = %err, "previous utterance failed"),
        }
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), PlaybackError> {
        let mut command = Command::new(&self.program);
        let wpm = words_per_minute(utterance.rate).to_string();
        match self.synth {
            Synth::Espeak => {
                // espeak selects voices by language, e.g. `de`
                let voice = utterance
                    .voice
                    .as_ref()
                    .map(|voice| voice.lang.clone())
                    .unwrap_or_else(|| espeak_language(&utterance.lang));
                command.arg("-v").arg(voice).arg("-s").arg(wpm);
            }
            Synth::Say => {
                if let Some(voice) = &utterance.voice {
                    command.arg("-v").arg(&voice.name);
                }
                command.arg("-r").arg(wpm);
            }
        }
        command
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|err| self.spawn_error(err))?;
        let deadline = Instant::now() + Duration::from_millis(EARLY_EXIT_MS);
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) => return exit_result(&self.program, status),
                Ok(None) => thread::sleep(Duration::from_millis(POLL_MS)),
                Err(err) => return Err(PlaybackError::Failed(err.to_string())),
            }
        }
        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Used when speech is switched off in the config.
pub struct MuteEngine;

impl SpeechEngine for MuteEngine {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn cancel(&mut self) {}

    fn speak(&mut self, _utterance: &Utterance) -> Result<(), PlaybackError> {
        Ok(())
    }
}

fn espeak_language(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

/// Parses `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
pub fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _priority = fields.next()?;
            let lang = fields.next()?;
            let _age_gender = fields.next()?;
            let name = fields.next()?;
            Some(Voice {
                name: name.to_string(),
                lang: lang.to_string(),
            })
        })
        .collect()
}

/// Parses `say -v ?`: `Name   de_DE    # sample sentence`. Names may
/// contain spaces.
pub fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim();
            let (name, lang) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Voice {
                name: name.to_string(),
                lang: lang.to_string(),
            })
        })
        .collect()
}
