use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries kept in the on-screen command log.
pub const COMMAND_LOG_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    #[default]
    Stop,
}

impl DriveCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            DriveCommand::Forward => "FORWARD",
            DriveCommand::Backward => "BACKWARD",
            DriveCommand::Left => "LEFT",
            DriveCommand::Right => "RIGHT",
            DriveCommand::Stop => "STOP",
        }
    }
}

/// Steering keys. Everything else is ignored while drive mode is engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveKey {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Space,
}

impl DriveKey {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_dom_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(DriveKey::ArrowUp),
            "ArrowDown" => Some(DriveKey::ArrowDown),
            "ArrowLeft" => Some(DriveKey::ArrowLeft),
            "ArrowRight" => Some(DriveKey::ArrowRight),
            " " | "Space" | "Spacebar" => Some(DriveKey::Space),
            _ => None,
        }
    }

    pub fn command(self) -> DriveCommand {
        match self {
            DriveKey::ArrowUp => DriveCommand::Forward,
            DriveKey::ArrowDown => DriveCommand::Backward,
            DriveKey::ArrowLeft => DriveCommand::Left,
            DriveKey::ArrowRight => DriveCommand::Right,
            DriveKey::Space => DriveCommand::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogEntry {
    pub command: DriveCommand,
    pub issued_at: DateTime<Utc>,
}

/// Newest-first ring of dispatched commands.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: VecDeque<CommandLogEntry>,
}

impl CommandLog {
    pub fn push(&mut self, command: DriveCommand, issued_at: DateTime<Utc>) {
        self.entries.push_front(CommandLogEntry { command, issued_at });
        self.entries.truncate(COMMAND_LOG_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<CommandLogEntry> {
        self.entries.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveView {
    pub engaged: bool,
    pub active_command: DriveCommand,
    pub log: Vec<CommandLogEntry>,
}

/// Keyboard edge tracking plus the last dispatched command.
///
/// Only decides what to send; the dispatcher owns the network side.
#[derive(Debug, Clone, Default)]
pub struct DriveState {
    engaged: bool,
    active: DriveCommand,
    log: CommandLog,
    held: HashSet<DriveKey>,
}

impl DriveState {
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn active(&self) -> DriveCommand {
        self.active
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Returns `true` when the flag changed. Leaving drive mode forgets held keys.
    pub fn set_engaged(&mut self, engaged: bool) -> bool {
        if self.engaged == engaged {
            return false;
        }
        self.engaged = engaged;
        if !engaged {
            self.held.clear();
        }
        true
    }

    /// Command for a key-down edge. Auto-repeat and already-held keys yield
    /// nothing.
    pub fn key_down(&mut self, key: DriveKey, repeat: bool) -> Option<DriveCommand> {
        if !self.engaged {
            return None;
        }
        if !self.held.insert(key) || repeat {
            return None;
        }
        Some(key.command())
    }

    /// Releasing any steering key stops the rover.
    pub fn key_up(&mut self, key: DriveKey) -> Option<DriveCommand> {
        if !self.engaged {
            return None;
        }
        self.held.remove(&key);
        Some(DriveCommand::Stop)
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }

    /// Records a dispatch. Runs before the request is posted.
    pub fn record(&mut self, command: DriveCommand, issued_at: DateTime<Utc>) {
        self.active = command;
        self.log.push(command, issued_at);
    }

    pub fn view(&self) -> DriveView {
        DriveView {
            engaged: self.engaged,
            active_command: self.active,
            log: self.log.entries(),
        }
    }
}
