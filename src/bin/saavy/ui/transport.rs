//! Transport bar widget - shows the preset, its settings, and audio stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{Preset, Rendering};

/// Audio statistics for display
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    /// Compute audio stats from a buffer
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

/// Render the transport bar
pub fn render_transport(
    frame: &mut Frame,
    area: Rect,
    rendering: &Rendering,
    sample_rate: f32,
    audio_stats: &AudioStats,
) {
    let block = Block::default()
        .title(" saavy ")
        .borders(Borders::ALL);

    let mut spans = vec![Span::styled(
        format!(" {}  ", rendering.preset.name()),
        Style::default().fg(Color::Cyan),
    )];
    if rendering.preset == Preset::Cymbal {
        spans.push(Span::styled(
            format!("Inharmonicity: {:.1}  ", rendering.inharmonicity),
            Style::default().fg(Color::White),
        ));
    }
    spans.extend([
        Span::styled(
            format!("{:.1}kHz  ", sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", audio_stats.peak, audio_stats.rms),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
