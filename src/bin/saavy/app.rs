//! Offline rendering of a single preset hit

use saavy_fm::{
    envelope::Triggerable,
    graph::{Graph, GraphProcessor},
    voices::{Bell, BellConfig, Cymbal, CymbalConfig, Glass, GlassConfig},
    MAX_BLOCK_SIZE,
};

/// Points per second in the envelope trace
const ENVELOPE_RATE: f64 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    Bell,
    Cymbal,
    Glass,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Bell => "bell",
            Preset::Cymbal => "cymbal",
            Preset::Glass => "glass",
        }
    }
}

/// A rendered hit: the audio and the amplitude envelope that shaped it
pub struct Rendering {
    pub preset: Preset,
    pub inharmonicity: f32,
    pub samples: Vec<f32>,
    /// (seconds, value)
    pub envelope: Vec<(f64, f64)>,
}

/// Renders presets into memory
pub struct Audition {
    sample_rate: f32,
    seconds: f64,
}

impl Audition {
    pub fn new(sample_rate: f32, seconds: f64) -> Self {
        Self {
            sample_rate,
            seconds,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Build the preset in a fresh graph, strike it at time zero, and
    /// render `seconds` of output.
    pub fn render(&self, preset: Preset, inharmonicity: f32) -> saavy_fm::Result<Rendering> {
        let (mut graph, mut processor) = Graph::new(self.sample_rate)?;
        let destination = graph.destination();
        let note = self.seconds * 0.5;

        let envelope = match preset {
            Preset::Bell => {
                let mut bell = Bell::new(&mut graph, &BellConfig::classic())?;
                graph.connect(&bell, destination)?;
                bell.trigger_attack_release(note, Some(0.0), None)?;
                self.trace(|t| bell.envelope().value_at(t))?
            }
            Preset::Cymbal => {
                let mut cymbal = Cymbal::new(
                    &mut graph,
                    &CymbalConfig {
                        inharmonicity,
                        ..CymbalConfig::classic()
                    },
                )?;
                graph.connect(&cymbal, destination)?;
                cymbal.trigger_attack(Some(0.0))?;
                self.trace(|t| cymbal.body().envelope().value_at(t))?
            }
            Preset::Glass => {
                let mut glass = Glass::new(&mut graph, &GlassConfig::classic())?;
                graph.connect(&glass, destination)?;
                glass.trigger_attack_release(note, Some(0.0), None)?;
                let first = |glass: &Glass, t| match glass.amplitude_envelope(0) {
                    Some(envelope) => envelope.value_at(t),
                    None => Ok(0.0),
                };
                self.trace(|t| first(&glass, t))?
            }
        };

        Ok(Rendering {
            preset,
            inharmonicity,
            samples: self.run(&mut processor),
            envelope,
        })
    }

    fn trace(
        &self,
        mut value_at: impl FnMut(f64) -> saavy_fm::Result<f32>,
    ) -> saavy_fm::Result<Vec<(f64, f64)>> {
        let points = (self.seconds * ENVELOPE_RATE) as usize;
        (0..=points)
            .map(|i| {
                let t = i as f64 / ENVELOPE_RATE;
                value_at(t).map(|v| (t, v as f64))
            })
            .collect()
    }

    fn run(&self, processor: &mut GraphProcessor) -> Vec<f32> {
        let total = (self.seconds * self.sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; total];
        for block in samples.chunks_mut(MAX_BLOCK_SIZE) {
            processor.process(block);
        }
        samples
    }
}

