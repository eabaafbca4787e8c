//! Waveform oscilloscope widget

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Render the samples just behind the playhead, scaled to their own peak
/// so quiet tails stay visible
pub fn render_waveform(frame: &mut Frame, area: Rect, window: &[f32]) {
    let peak = window.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    let scale = if peak > 0.0 { 1.0 / peak as f64 } else { 1.0 };

    let block = Block::default()
        .title(format!(" Waveform (×{scale:.0}) "))
        .borders(Borders::ALL);

    let data: Vec<(f64, f64)> = window
        .iter()
        .enumerate()
        .map(|(i, &sample)| (i as f64 / window.len() as f64, sample as f64 * scale))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-1.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
