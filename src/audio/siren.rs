#[cfg(feature = "audio")]
use rodio::Source;
use std::time::Duration;

use super::tone::{samples_for, SAMPLE_RATE};

const START_HZ: f32 = 440.0;
const LOW_HZ: f32 = 350.0;
const HIGH_HZ: f32 = 1200.0;
const STEP_HZ: f32 = 120.0;
const STEP_EVERY: Duration = Duration::from_millis(100);

/// Sawtooth that climbs to 1200 Hz and falls back to 350 Hz in fixed steps.
pub struct SirenSweep {
    freq: f32,
    rising: bool,
    phase: f32,
    gain: f32,
    sample_rate: u32,
    num_sample: usize,
    step_samples: usize,
    total_samples: usize,
}

impl SirenSweep {
    pub fn new() -> Self {
        Self::with_duration(Duration::from_millis(2500))
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            freq: START_HZ,
            rising: true,
            phase: 0.0,
            gain: 0.05,
            sample_rate: SAMPLE_RATE,
            num_sample: 0,
            step_samples: samples_for(STEP_EVERY),
            total_samples: samples_for(duration),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }

    fn step(&mut self) {
        if self.rising {
            self.freq = (self.freq + STEP_HZ).min(HIGH_HZ);
            if self.freq >= HIGH_HZ {
                self.rising = false;
            }
        } else {
            self.freq = (self.freq - STEP_HZ).max(LOW_HZ);
            if self.freq <= LOW_HZ {
                self.rising = true;
            }
        }
    }
}

impl Default for SirenSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for SirenSweep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        if self.num_sample > 0 && self.num_sample % self.step_samples == 0 {
            self.step();
        }
        self.num_sample += 1;

        let sample = 2.0 * self.phase - 1.0;
        self.phase = (self.phase + self.freq / self.sample_rate as f32).fract();
        Some(sample * self.gain)
    }
}

#[cfg(feature = "audio")]
impl Source for SirenSweep {
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
