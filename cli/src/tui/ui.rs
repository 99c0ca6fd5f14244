//! TUI rendering.

use podfwd_core::forward::tcp_candidates;
use podfwd_core::{ForwardSnapshot, SessionState};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use super::app::{App, FlashLevel, FormField, Modal, SelectionForm, View};
use podfwd_core::ports::ConfirmDialog;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    let forwards = app.forwards();

    draw_header(f, app, forwards.len(), chunks[0]);
    match app.view {
        View::Pods => draw_pods(f, app, chunks[1]),
        View::Forwards => draw_forwards(f, app, &forwards, chunks[1]),
    }
    draw_footer(f, app, chunks[2]);

    match &app.modal {
        Some(Modal::Selection(form)) => draw_selection(f, form),
        Some(Modal::Confirm(dialog)) => draw_confirm(f, dialog),
        None => {}
    }
}

fn draw_header(f: &mut Frame, app: &App, forward_count: usize, area: Rect) {
    let loading = if app.is_loading() { " | loading…" } else { "" };
    let title = format!(
        "podfwd | ns: {} | {} pods | {} forwards{}",
        app.namespace,
        app.pods.len(),
        forward_count,
        loading
    );

    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).bold())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).bold()));
    Row::new(cells).height(1).bottom_margin(1)
}

fn selected_style(is_selected: bool) -> Style {
    if is_selected {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    } else {
        Style::default()
    }
}

fn draw_pods(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.pods.iter().enumerate().map(|(i, pod)| {
        let phase_color = match pod.phase.as_str() {
            "Running" => Color::Green,
            "Pending" => Color::Yellow,
            "Failed" => Color::Red,
            _ => Color::DarkGray,
        };

        let ports = tcp_candidates(&pod.ports)
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let cells = vec![
            Cell::from(truncate(&pod.path.name, 40)),
            Cell::from(pod.phase.clone()).style(Style::default().fg(phase_color)),
            Cell::from(truncate(&ports, 50)),
            Cell::from(if app.is_forwarded(&pod.path) { "●" } else { " " })
                .style(Style::default().fg(Color::Cyan)),
        ];

        Row::new(cells).style(selected_style(i == app.selected))
    });

    let widths = [
        Constraint::Length(40),
        Constraint::Length(10),
        Constraint::Min(20),
        Constraint::Length(3),
    ];

    let table = Table::new(rows, widths)
        .header(header_row(&["NAME", "STATUS", "PORTS", "PF"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Pods "),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD));

    let mut state = TableState::default();
    state.select(Some(app.selected));

    f.render_stateful_widget(table, area, &mut state);
}

fn draw_forwards(f: &mut Frame, app: &App, forwards: &[ForwardSnapshot], area: Rect) {
    let rows = forwards.iter().enumerate().map(|(i, fwd)| {
        let state_color = match fwd.state {
            SessionState::Active => Color::Green,
            SessionState::Starting => Color::Yellow,
            SessionState::Terminating | SessionState::Terminated => Color::DarkGray,
        };

        let cells = vec![
            Cell::from(truncate(&fwd.pod, 40)),
            Cell::from(truncate(&fwd.container, 15)),
            Cell::from(truncate(&fwd.address, 15)),
            Cell::from(fwd.ports.clone()),
            Cell::from(fwd.state.to_string()).style(Style::default().fg(state_color)),
            Cell::from(format_age(fwd.age_secs)),
        ];

        Row::new(cells).style(selected_style(i == app.forward_selected))
    });

    let widths = [
        Constraint::Length(40),
        Constraint::Length(15),
        Constraint::Length(15),
        Constraint::Min(12),
        Constraint::Length(12),
        Constraint::Length(8),
    ];

    let table = Table::new(rows, widths)
        .header(header_row(&["POD", "CONTAINER", "ADDRESS", "PORTS", "STATE", "AGE"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Port-Forwards "),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD));

    let mut state = TableState::default();
    state.select(Some(app.forward_selected));

    f.render_stateful_widget(table, area, &mut state);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints = app
        .keys
        .hints()
        .iter()
        .map(|(key, label)| format!("{}: {}", key, label))
        .collect::<Vec<_>>()
        .join(" | ");
    let help = format!("{} | j/k: navigate | Tab: switch view | q: quit", hints);

    let (text, color) = match app.flash() {
        Some(flash) => {
            let color = match flash.level {
                FlashLevel::Info => Color::Green,
                FlashLevel::Error => Color::Red,
            };
            (format!("{} | {}", flash.text, help), color)
        }
        None => (help, Color::DarkGray),
    };

    let footer = Paragraph::new(text).style(Style::default().fg(color)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(footer, area);
}

fn draw_selection(f: &mut Frame, form: &SelectionForm) {
    let height = form.dialog.candidates.len() as u16 + 9;
    let area = centered(f.area(), 60, height);

    let focused = |field: FormField| {
        if form.field == field {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default()
        }
    };

    let mut lines = vec![Line::styled("Container ports:", focused(FormField::Ports))];
    for (i, (candidate, checked)) in form
        .dialog
        .candidates
        .iter()
        .zip(&form.checked)
        .enumerate()
    {
        let mark = if *checked { "[x]" } else { "[ ]" };
        let style = if i == form.cursor && form.field == FormField::Ports {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else {
            Style::default()
        };
        lines.push(Line::styled(format!("  {} {}", mark, candidate), style));
    }

    let local_ports = if form.local_ports.is_empty() {
        "(same as container)".to_string()
    } else {
        form.local_ports.clone()
    };
    lines.push(Line::default());
    lines.push(Line::styled(
        format!("Local ports: {}", local_ports),
        focused(FormField::LocalPorts),
    ));
    lines.push(Line::styled(
        format!("Address:     {}", form.address),
        focused(FormField::Address),
    ));
    if let Some(error) = &form.error {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    lines.push(Line::styled(
        "Space: toggle | Tab: next field | Enter: OK | Esc: cancel",
        Style::default().fg(Color::DarkGray),
    ));

    let dialog = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" PortForward {} ", form.dialog.pod)),
    );

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_confirm<A>(f: &mut Frame, dialog: &ConfirmDialog<A>) {
    let height = dialog.message.lines().count() as u16 + 4;
    let area = centered(f.area(), 60, height);

    let mut lines: Vec<Line> = dialog.message.lines().map(Line::from).collect();
    lines.push(Line::styled(
        "y: yes | n: no",
        Style::default().fg(Color::DarkGray),
    ));

    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(format!(" {} ", dialog.title)),
    );

    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}

/// Rectangle of at most `width` x `height` centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn format_age(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m{}s", s / 60, s % 60),
        s => format!("{}h{}m", s / 3600, (s % 3600) / 60),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}
