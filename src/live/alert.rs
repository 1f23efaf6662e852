use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Alert profile chosen in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlertSound {
    /// Short 880 Hz tone.
    Beep,
    /// Sawtooth sweep for a few seconds.
    #[default]
    Siren,
    /// Spoken "Human detected".
    #[serde(rename = "Voice Alert", alias = "VoiceAlert")]
    VoiceAlert,
}

/// Output device for presence alerts. `play` must return without waiting for
/// the sound to finish.
pub trait AlertPlayer: Send + Sync {
    fn play(&self, sound: AlertSound) -> Result<(), String>;
}

/// Rising-edge detector over consecutive human counts.
#[derive(Debug, Clone, Default)]
pub struct AlertTrigger {
    previous_count: u32,
}

impl AlertTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next applied count. Returns `true` only on `0 -> n > 0`.
    pub fn observe(&mut self, count: u32) -> bool {
        let rising = self.previous_count == 0 && count > 0;
        self.previous_count = count;
        rising
    }

    pub fn previous_count(&self) -> u32 {
        self.previous_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRaised {
    pub sound: AlertSound,
    pub human_count: u32,
    pub raised_at: DateTime<Utc>,
}

/// Plays the alert, swallowing device errors.
pub fn raise(player: &dyn AlertPlayer, sound: AlertSound, human_count: u32) -> AlertRaised {
    if let Err(err) = player.play(sound) {
        log_warn!("alert playback failed ({sound:?}): {err}");
    }
    AlertRaised {
        sound,
        human_count,
        raised_at: Utc::now(),
    }
}
