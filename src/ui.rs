//! Terminal view of the overlay as the host would composite it: bar width
//! from the crop filter, brightness from the opacity filter.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::host::Host;
use crate::overlay::{AnimKind, HotkeyAction, FILTER_CROP, FILTER_OPACITY};

pub fn draw(f: &mut Frame, app: &App) {
    let [bar_area, status_area, help_area] = Layout::vertical([
        Constraint::Length(5),
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .areas(f.area());

    draw_bar(f, app, bar_area);
    draw_status(f, app, status_area);
    draw_help(f, app, help_area);
}

/// What the host is currently showing: visible fraction and opacity, read
/// back from the filters rather than from controller state.
fn composited(app: &App) -> (f64, f64) {
    let source = app.controller.render().source_name();
    let width = app.controller.render().cached_width();
    if width == 0 {
        return (0.0, 0.0);
    }
    let crop_right = app
        .host
        .filter_settings(&source, FILTER_CROP)
        .and_then(|s| s.right)
        .unwrap_or(width as i64);
    let opacity = app
        .host
        .filter_settings(&source, FILTER_OPACITY)
        .and_then(|s| s.opacity)
        .unwrap_or(0.0);
    let visible = 1.0 - (crop_right as f64 / width as f64).clamp(0.0, 1.0);
    (visible, opacity / 100.0)
}

fn draw_bar(f: &mut Frame, app: &App, area: Rect) {
    let (visible, opacity) = composited(app);

    // Fade dims the fill toward the background.
    let level = (opacity * 255.0).round() as u8;
    let fill = Color::Rgb(0, level.max(30), level / 2);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" overlay preview "),
        )
        .gauge_style(Style::default().fg(fill).bg(Color::Black))
        .ratio(visible)
        .label(format!(
            "{:>3.0}% visible · opacity {:>3.0}%",
            visible * 100.0,
            opacity * 100.0
        ));
    f.render_widget(gauge, area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let st = app.controller.snapshot();
    let max = app.controller.max_levels();

    let anim = match app.controller.active_kind() {
        Some(AnimKind::Resize) => "resizing",
        Some(AnimKind::Reset) => "resetting",
        Some(AnimKind::FadeOut) => "fading out",
        Some(AnimKind::Sustain) => "sustained",
        None => "idle",
    };

    let mut flags = Vec::new();
    if st.sustained {
        flags.push("sustained");
    }
    if st.fading {
        flags.push("fading");
    }
    let flags = if flags.is_empty() {
        String::from("-")
    } else {
        flags.join(", ")
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("level "),
            Span::styled(
                format!("{:.2}", st.value),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" / {max}   target {}", st.target)),
        ]),
        Line::from(format!("animation: {anim}   flags: {flags}")),
        Line::from(format!(
            "source: {} ({}px)",
            app.controller.render().source_name(),
            app.controller.render().cached_width()
        )),
    ];
    if let Some(action) = app.last_action {
        lines.push(Line::from(Span::styled(
            action.label(),
            Style::default().fg(Color::Cyan),
        )));
    }

    let block = Block::default().borders(Borders::ALL).title(" state ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_help(f: &mut Frame, app: &App, area: Rect) {
    let sustain_hint = if app.release_edges { "hold" } else { "toggle" };
    let mut spans = Vec::new();
    for action in HotkeyAction::ALL {
        let name = match action {
            HotkeyAction::Increase => "increase".to_string(),
            HotkeyAction::Decrease => "decrease".to_string(),
            HotkeyAction::Sustain => format!("sustain ({sustain_hint})"),
            HotkeyAction::Reset => "reset".to_string(),
        };
        spans.push(Span::styled(
            format!(" {} ", app.key_for(action)),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {name}  ")));
    }
    spans.push(Span::styled(
        format!(" {} ", app.quit_key()),
        Style::default()
            .fg(Color::Black)
            .bg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::raw(" quit"));

    let block = Block::default().borders(Borders::ALL).title(" keys ");
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
