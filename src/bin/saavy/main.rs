//! saavy - Terminal audition of the FM presets
//!
//! Run with: cargo run
//!
//! Renders a preset offline, then scrubs through the result in real time
//! while charting its envelope and waveform.

mod app;
mod ui;

use app::{Audition, Preset};
use ui::UiApp;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    // The terminal belongs to the UI; only warnings make it to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let audition = Audition::new(24_000.0, 2.0);
    let rendering = audition.render(Preset::Bell, 0.0)?;

    let mut terminal = ratatui::init();
    let result = UiApp::new(audition, rendering).run(&mut terminal);
    ratatui::restore();
    result
}
