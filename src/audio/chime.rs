use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;

/// Two-note reminder chime that repeats until the sink is stopped.
/// Each cycle plays a high then a low decaying tone followed by silence.
pub struct Chime {
    notes: [f32; 2],
    note_samples: usize,
    cycle_samples: usize,
    position: usize,
}

impl Chime {
    pub fn new() -> Self {
        let note_samples = (SAMPLE_RATE as f32 * 0.35) as usize;
        Self {
            notes: [880.0, 660.0],
            note_samples,
            // Two notes plus a one-second gap.
            cycle_samples: note_samples * 2 + SAMPLE_RATE as usize,
            position: 0,
        }
    }

    pub fn cycle_len(&self) -> Duration {
        Duration::from_secs_f32(self.cycle_samples as f32 / SAMPLE_RATE as f32)
    }
}

impl Default for Chime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.position % self.cycle_samples;
        self.position = self.position.wrapping_add(1);

        let note = offset / self.note_samples;
        let Some(freq) = self.notes.get(note) else {
            return Some(0.0);
        };

        let within = (offset % self.note_samples) as f32 / SAMPLE_RATE as f32;
        let envelope = (-within * 6.0).exp();
        Some((2.0 * PI * freq * within).sin() * envelope * 0.25)
    }
}

#[cfg(feature = "audio")]
impl rodio::Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
