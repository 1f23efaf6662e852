pub mod siren;
pub mod speech;
pub mod tone;

#[cfg(feature = "audio")]
use siren::SirenSweep;
use speech::{SpeechSynth, VOICE_ALERT_TEXT};
#[cfg(feature = "audio")]
use tone::Beep;

use crate::live::{AlertPlayer, AlertSound};

#[cfg(feature = "audio")]
pub use engine::AudioEngineHandle;

/// Production [`AlertPlayer`]: tones through the audio engine thread,
/// the voice profile through system speech.
pub struct AudioAlertPlayer {
    #[cfg(feature = "audio")]
    engine: AudioEngineHandle,
    speech: SpeechSynth,
}

impl AudioAlertPlayer {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "audio")]
            engine: AudioEngineHandle::new(),
            speech: SpeechSynth::new(),
        }
    }
}

impl Default for AudioAlertPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertPlayer for AudioAlertPlayer {
    fn play(&self, sound: AlertSound) -> Result<(), String> {
        match sound {
            AlertSound::VoiceAlert => self.speech.say(VOICE_ALERT_TEXT),
            AlertSound::Beep => self.play_tone(Tone::Beep),
            AlertSound::Siren => self.play_tone(Tone::Siren),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Beep,
    Siren,
}

impl AudioAlertPlayer {
    #[cfg(feature = "audio")]
    fn play_tone(&self, tone: Tone) -> Result<(), String> {
        self.engine.play(tone)
    }

    #[cfg(not(feature = "audio"))]
    fn play_tone(&self, tone: Tone) -> Result<(), String> {
        Err(format!("audio output not compiled in; dropped {tone:?}"))
    }
}

#[cfg(feature = "audio")]
mod engine {
    use super::{Beep, SirenSweep, Tone};

    use rodio::{OutputStream, OutputStreamHandle, Sink};
    use std::sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    enum AudioCommand {
        Play(Tone),
    }

    /// Owns the output stream on a dedicated thread; rodio streams are not `Send`.
    pub struct AudioEngineHandle {
        tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    }

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
            let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AudioCommand>();

            thread::Builder::new()
                .name("alert-audio".to_string())
                .spawn(move || {
                    let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                    let mut sink: Option<Sink> = None;

                    fn ensure_output(
                        output: &mut Option<(OutputStream, OutputStreamHandle)>,
                    ) -> Result<&OutputStreamHandle, String> {
                        if output.is_none() {
                            let pair = OutputStream::try_default().map_err(|e| {
                                format!("Failed to create audio output stream: {}", e)
                            })?;
                            *output = Some(pair);
                        }
                        output
                            .as_ref()
                            .map(|(_, handle)| handle)
                            .ok_or_else(|| "audio output unavailable".to_string())
                    }

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::Play(tone) => {
                                // A new alert cuts off the previous one.
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                let handle = match ensure_output(&mut output) {
                                    Ok(handle) => handle,
                                    Err(e) => {
                                        log::warn!("{}", e);
                                        continue;
                                    }
                                };
                                match Sink::try_new(handle) {
                                    Ok(new_sink) => {
                                        match tone {
                                            Tone::Beep => new_sink.append(Beep::new()),
                                            Tone::Siren => new_sink.append(SirenSweep::new()),
                                        }
                                        sink = Some(new_sink);
                                    }
                                    Err(e) => {
                                        log::warn!("Failed to create audio sink: {}", e);
                                        output = None;
                                    }
                                }
                            }
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            *guard = Some(tx.clone());
            Ok(tx)
        }

        pub(super) fn play(&self, tone: Tone) -> Result<(), String> {
            let tx = self.ensure_thread()?;
            tx.send(AudioCommand::Play(tone)).map_err(|e| e.to_string())
        }
    }

    impl Default for AudioEngineHandle {
        fn default() -> Self {
            Self::new()
        }
    }
}
