//! TUI module for saavy
//!
//! Plays back a rendered hit against the wall clock and visualizes it.

mod envelope;
mod transport;
mod waveform;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use std::time::{Duration, Instant};

use super::app::{Audition, Preset, Rendering};

use envelope::render_envelope;
use transport::{render_transport, AudioStats};
use waveform::render_waveform;

/// Audio visualization window size
const VIS_BUFFER_SIZE: usize = 1024;

/// Inharmonicity step for the cymbal keys
const INHARMONICITY_STEP: f32 = 0.1;

/// UI application state
pub struct UiApp {
    audition: Audition,
    rendering: Rendering,
    /// When playback of the current rendering started
    started: Instant,
    /// Last render error, shown in the help bar
    error: Option<String>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(audition: Audition, rendering: Rendering) -> Self {
        Self {
            audition,
            rendering,
            started: Instant::now(),
            error: None,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;

            // Handle keyboard input (non-blocking, ~60fps)
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        let Rendering {
            preset,
            inharmonicity,
            ..
        } = self.rendering;
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('1') => self.rerender(Preset::Bell, inharmonicity),
            KeyCode::Char('2') => self.rerender(Preset::Cymbal, inharmonicity),
            KeyCode::Char('3') => self.rerender(Preset::Glass, inharmonicity),
            KeyCode::Char(' ') => self.started = Instant::now(),
            KeyCode::Char('i') => {
                self.rerender(preset, (inharmonicity + INHARMONICITY_STEP).min(1.0))
            }
            KeyCode::Char('I') => {
                self.rerender(preset, (inharmonicity - INHARMONICITY_STEP).max(0.0))
            }
            _ => {}
        }
    }

    fn rerender(&mut self, preset: Preset, inharmonicity: f32) {
        match self.audition.render(preset, inharmonicity) {
            Ok(rendering) => {
                self.rendering = rendering;
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        self.started = Instant::now();
    }

    /// Playback position in seconds, clamped to the rendering
    fn position(&self) -> f64 {
        self.started
            .elapsed()
            .as_secs_f64()
            .min(self.audition.seconds())
    }

    /// The window of samples leading up to the playhead
    fn window(&self) -> &[f32] {
        let samples = &self.rendering.samples;
        let head = (self.position() * self.audition.sample_rate() as f64) as usize;
        let end = head.clamp(VIS_BUFFER_SIZE.min(samples.len()), samples.len());
        &samples[end.saturating_sub(VIS_BUFFER_SIZE)..end]
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: transport, envelope, waveform, help
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(6),    // Envelope
                Constraint::Length(8), // Waveform
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let window = self.window();
        render_transport(
            frame,
            chunks[0],
            &self.rendering,
            self.audition.sample_rate(),
            &AudioStats::from_buffer(window),
        );
        render_envelope(
            frame,
            chunks[1],
            &self.rendering.envelope,
            self.position(),
            self.audition.seconds(),
        );
        render_waveform(frame, chunks[2], window);

        let help = match &self.error {
            Some(err) => Paragraph::new(format!(" {err}")).style(Style::default().fg(Color::Red)),
            None => Paragraph::new(
                " [Q] Quit  [1] Bell  [2] Cymbal  [3] Glass  [Space] Replay  [i/I] Inharmonicity ±",
            )
            .style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(help, chunks[3]);
    }
}
