use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};

use crate::log_debug;

const ENABLE_LOGS: bool = true;

pub const VOICE_ALERT_TEXT: &str = "Human detected";

/// Speaks through the platform's text-to-speech command. A new utterance
/// cancels the one still playing.
#[derive(Default)]
pub struct SpeechSynth {
    current: Mutex<Option<Child>>,
}

impl SpeechSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(&self, text: &str) -> Result<(), String> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut previous) = current.take() {
            // Already exited is fine.
            let _ = previous.kill();
            let _ = previous.wait();
        }

        let mut last_err = String::from("no speech command for this platform");
        for (program, args) in speech_commands(text) {
            match Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                Ok(child) => {
                    log_debug!("speaking via {program}");
                    *current = Some(child);
                    return Ok(());
                }
                Err(e) => last_err = format!("{program}: {e}"),
            }
        }
        Err(format!("Failed to start speech synthesis ({last_err})"))
    }
}

impl Drop for SpeechSynth {
    fn drop(&mut self) {
        let current = self.current.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut child) = current.take() {
            let _ = child.kill();
        }
    }
}

/// Candidate commands in preference order.
fn speech_commands(text: &str) -> Vec<(&'static str, Vec<String>)> {
    if cfg!(target_os = "macos") {
        vec![("say", vec![text.to_string()])]
    } else if cfg!(target_os = "windows") {
        let escaped = text.replace('\'', "''");
        vec![(
            "powershell",
            vec![
                "-NoProfile".into(),
                "-Command".into(),
                format!(
                    "Add-Type -AssemblyName System.Speech; \
                     (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{escaped}')"
                ),
            ],
        )]
    } else {
        vec![
            ("spd-say", vec!["--wait".into(), text.to_string()]),
            ("espeak-ng", vec![text.to_string()]),
            ("espeak", vec![text.to_string()]),
        ]
    }
}
