//! Envelope trace with a playhead

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Render the amplitude envelope over the whole rendering
pub fn render_envelope(
    frame: &mut Frame,
    area: Rect,
    envelope: &[(f64, f64)],
    position: f64,
    seconds: f64,
) {
    let block = Block::default()
        .title(" Envelope ")
        .borders(Borders::ALL);

    let playhead = [(position, 0.0), (position, 1.0)];

    let trace = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(envelope);
    let head = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Yellow))
        .data(&playhead);

    let chart = Chart::new(vec![trace, head])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, seconds])
                .labels(["0s".to_string(), format!("{seconds:.1}s")])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
