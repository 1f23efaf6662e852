#[cfg(feature = "audio")]
use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44100;

pub(crate) fn samples_for(duration: Duration) -> usize {
    (duration.as_millis() as usize * SAMPLE_RATE as usize) / 1000
}

/// Short sine ping used by the `Beep` alert.
pub struct Beep {
    freq: f32,
    gain: f32,
    sample_rate: u32,
    num_sample: usize,
    total_samples: usize,
}

impl Beep {
    pub fn new() -> Self {
        Self::with_duration(Duration::from_millis(220))
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            freq: 880.0,
            gain: 0.15,
            sample_rate: SAMPLE_RATE,
            num_sample: 0,
            total_samples: samples_for(duration),
        }
    }
}

impl Default for Beep {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Beep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / self.sample_rate as f32;
        self.num_sample += 1;
        Some((2.0 * PI * self.freq * t).sin() * self.gain)
    }
}

#[cfg(feature = "audio")]
impl Source for Beep {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / self.sample_rate as f32,
        ))
    }
}
