use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Transport};
use rusttuiamp::control::StageState;

const GAUGE_WIDTH: usize = 20;

// ── Top-level routing ─────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // title bar
            Constraint::Min(12),    // pedalboard
            Constraint::Length(4),  // status
            Constraint::Length(5),  // help
        ])
        .split(area);

    draw_title(f, chunks[0], app);
    draw_board(f, chunks[1], app);
    draw_status(f, chunks[2], app);
    draw_help(f, chunks[3]);
}

// ── Title bar ─────────────────────────────────────────────────────────────────

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let (transport, color) = match app.transport() {
        Transport::Idle       => ("■ IDLE", Color::DarkGray),
        Transport::Playing    => ("▶ PLAYING", Color::Green),
        Transport::Monitoring => ("● MONITORING", Color::Red),
    };
    let text = format!(
        "  RustTuiAmp  ─  {}  ─  {:.0} Hz  ─  Space: toggle  t: tap  p/m/s: play/monitor/stop",
        transport, app.sample_rate()
    );
    f.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

// ── Pedalboard ────────────────────────────────────────────────────────────────

fn draw_board(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Signal chain ─ [↑↓] Stage  [←→] Param  [+/-] Adjust ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, view) in app.snapshot().stages().iter().enumerate() {
        let selected = i == app.stage;
        lines.push(stage_header(view, selected));
        for (pi, p) in view.params.iter().enumerate() {
            lines.push(param_line(p, selected && pi == app.param));
        }
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn stage_header(view: &StageState, selected: bool) -> Line<'static> {
    let (led, led_color) = if view.active {
        ("●", Color::Green)
    } else if view.enabled {
        ("◐", Color::Yellow)
    } else {
        ("○", Color::DarkGray)
    };
    let name_style = if selected {
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let mut spans = vec![
        Span::styled(format!(" {} ", led), Style::default().fg(led_color)),
        Span::styled(format!("{:<14}", view.id.label()), name_style),
    ];
    if view.id.is_external() {
        let loaded = view.processor.clone().unwrap_or_else(|| "─ empty ─".to_string());
        spans.push(Span::styled(format!("  {}", loaded), Style::default().fg(Color::DarkGray)));
    }
    if view.faults > 0 {
        spans.push(Span::styled(format!("  ⚠ {} failed block(s)", view.faults), Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

fn param_line(p: &rusttuiamp::ParameterValue, selected: bool) -> Line<'static> {
    let filled = (p.fraction() * GAUGE_WIDTH as f32).round() as usize;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(GAUGE_WIDTH - filled));
    let label_style = if selected {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(vec![
        Span::raw("      "),
        Span::styled(format!("{:<12}", p.label), label_style),
        Span::styled(bar, Style::default().fg(if selected { Color::Yellow } else { Color::Blue })),
        Span::styled(format!(" {:>8.4}", p.value), Style::default().fg(Color::Cyan)),
        Span::styled(format!("  [{} ─ {}]", p.min, p.max), Style::default().fg(Color::DarkGray)),
    ])
}

// ── Status ────────────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let model = match &app.model_info {
        Some(info) => format!(
            "Model: {} v{} ({} layers, {} weights)",
            info.architecture.as_deref().unwrap_or("?"),
            info.version.as_deref().unwrap_or("?"),
            info.num_layers,
            info.num_weights
        ),
        None => "Model: none".to_string(),
    };
    let lines = vec![
        Line::from(Span::styled(app.status_msg.clone(), Style::default().fg(Color::Yellow))),
        Line::from(Span::styled(model, Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(" Status ").borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        area,
    );
}

// ── Help ──────────────────────────────────────────────────────────────────────

fn draw_help(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let txt = |t: &'static str| Span::styled(t, Style::default().fg(Color::Gray));
    let lines = vec![
        Line::from(vec![key("↑↓"), txt(" stage  "), key("←→"), txt(" parameter  "),
                        key("+ -"), txt(" adjust  "), key("Space"), txt(" on/off  "),
                        key("r"), txt(" reset stage")]),
        Line::from(vec![key("t"), txt(" tap tempo  "), key("p"), txt(" play file  "),
                        key("m"), txt(" monitor input  "), key("s"), txt(" stop  "),
                        key("Esc"), txt(" quit")]),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title(" Keys ").borders(Borders::ALL)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusttuiamp::StageId;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn empty_slot_header_uses_box_rule() {
        let state = StageState {
            id: StageId::Amp,
            enabled: true,
            active: false,
            processor: None,
            params: Vec::new(),
            faults: 3,
        };
        let header = text(&stage_header(&state, false));
        assert!(header.contains("─ empty ─"), "{}", header);
        assert!(header.contains("3 failed block(s)"));
        assert!(!header.contains('—'));
    }

    #[test]
    fn gauge_range_uses_box_rule() {
        let p = rusttuiamp::ParameterValue { name: "mix", label: "Mix", value: 0.5, min: 0.0, max: 1.0 };
        let line = text(&param_line(&p, true));
        assert!(line.contains("[0 ─ 1]"), "{}", line);
        assert!(!line.contains('–') && !line.contains('—'));
    }
}
