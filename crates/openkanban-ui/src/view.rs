use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use openkanban_core::{AgentStatus, Ticket, TicketStatus};

use crate::{FormField, Mode, Model, MIN_COLUMN_WIDTH};

const SPINNER_FRAMES: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];
const SIDEBAR_WIDTH: u16 = 24;

struct Palette {
    primary: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    info: Color,
}

const PALETTE: Palette = Palette {
    primary: Color::Cyan,
    muted: Color::DarkGray,
    success: Color::Green,
    warning: Color::Yellow,
    error: Color::Red,
    info: Color::Blue,
};

/// Renders the model. Reads only; identical models produce identical
/// frames.
pub fn view(model: &Model, frame: &mut Frame) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }

    if model.mode == Mode::AgentView {
        render_agent_view(model, frame, area);
        return;
    }

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(2),
    ])
    .areas(area);

    render_header(model, frame, header_area);

    let board_area = if model.show_sidebar && main_area.width > SIDEBAR_WIDTH + MIN_COLUMN_WIDTH {
        let [sidebar_area, board_area] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
                .areas(main_area);
        render_sidebar(model, frame, sidebar_area);
        board_area
    } else {
        main_area
    };
    render_board(model, frame, board_area);
    render_status_bar(model, frame, status_area);

    match model.mode {
        Mode::Help => render_help(frame, area),
        Mode::Confirm => render_confirm(model, frame, area),
        Mode::CreateTicket | Mode::EditTicket => render_ticket_form(model, frame, area),
        Mode::Settings => render_settings(model, frame, area),
        Mode::CreateProject => render_project_form(model, frame, area),
        Mode::Spawning => render_spawning(model, frame, area),
        Mode::ShuttingDown => render_shutting_down(model, frame, area),
        _ => {}
    }
}

fn render_header(model: &Model, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " OpenKanban ",
            Style::default()
                .fg(PALETTE.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} tickets", model.board.len()),
            Style::default().fg(PALETTE.muted),
        ),
    ];
    if model.filter.is_active() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("filter: {}", model.filter.input),
            Style::default().fg(PALETTE.warning),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_sidebar(model: &Model, frame: &mut Frame, area: Rect) {
    let mut lines = Vec::new();
    for project in model.registry.projects() {
        let count = model
            .board
            .tickets()
            .filter(|ticket| ticket.project_id == project.id)
            .count();
        let style = if model.active_project.as_ref() == Some(&project.id) {
            Style::default().fg(PALETTE.primary)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{} ({count})", project.name),
            style,
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No projects (P)",
            Style::default().fg(PALETTE.muted),
        )));
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title("projects").borders(Borders::ALL)),
        area,
    );
}

fn render_board(model: &Model, frame: &mut Frame, area: Rect) {
    let columns = model.board.columns();
    if columns.is_empty() {
        return;
    }

    let visible = model.visible_column_count();
    let first = model.scroll_offset.min(columns.len().saturating_sub(1));
    let last = (first + visible).min(columns.len());
    let shown = &columns[first..last];

    let constraints: Vec<Constraint> = shown
        .iter()
        .map(|_| Constraint::Ratio(1, shown.len() as u32))
        .collect();
    let slots = Layout::horizontal(constraints).split(area);

    for (index, column) in shown.iter().enumerate() {
        let column_index = first + index;
        let is_active = column_index == model.active_column;
        render_column(model, frame, slots[index], column_index, is_active);
    }

    let (clipped_left, clipped_right) = model.columns_clipped();
    if clipped_left {
        render_edge_indicator(frame, area, true);
    }
    if clipped_right {
        render_edge_indicator(frame, area, false);
    }
}

fn render_column(model: &Model, frame: &mut Frame, area: Rect, column_index: usize, active: bool) {
    let column = &model.board.columns()[column_index];
    let tickets = model.visible_tickets(column.status);

    let border_style = if active {
        Style::default().fg(column_color(column.status))
    } else {
        Style::default().fg(PALETTE.muted)
    };
    let title = format!(" {} ({}) ", column.title, tickets.len());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    for (index, ticket) in tickets.iter().enumerate() {
        let selected = active && index == model.active_ticket;
        lines.extend(ticket_card_lines(model, ticket, selected, inner.width));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn ticket_card_lines(
    model: &Model,
    ticket: &Ticket,
    selected: bool,
    width: u16,
) -> Vec<Line<'static>> {
    let marker = if selected { "▎" } else { " " };
    let title_style = if selected {
        Style::default()
            .fg(PALETTE.primary)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let title = truncate(&ticket.title, width.saturating_sub(3) as usize);

    let mut badge_spans = vec![
        Span::raw("  "),
        Span::styled(
            format!("P{}", ticket.priority),
            Style::default().fg(priority_color(ticket.priority)),
        ),
    ];
    if let Some(glyph) = agent_glyph(ticket.agent_status, model.animation_frame) {
        badge_spans.push(Span::raw(" "));
        badge_spans.push(Span::styled(
            glyph,
            Style::default().fg(agent_color(ticket.agent_status)),
        ));
        badge_spans.push(Span::styled(
            format!(" {}", ticket.agent_status.label()),
            Style::default().fg(PALETTE.muted),
        ));
    }
    if !ticket.blocked_by.is_empty() {
        badge_spans.push(Span::styled(
            format!("  ⛓{}", ticket.blocked_by.len()),
            Style::default().fg(PALETTE.warning),
        ));
    }
    if !ticket.labels.is_empty() {
        let labels = ticket.labels.iter().cloned().collect::<Vec<_>>().join(",");
        badge_spans.push(Span::styled(
            format!("  [{}]", truncate(&labels, 18)),
            Style::default().fg(PALETTE.info),
        ));
    }

    vec![
        Line::from(vec![
            Span::styled(marker.to_owned(), title_style),
            Span::styled(title, title_style),
        ]),
        Line::from(badge_spans),
        Line::default(),
    ]
}

fn render_edge_indicator(frame: &mut Frame, area: Rect, left: bool) {
    let x = if left {
        area.x
    } else {
        area.x + area.width.saturating_sub(1)
    };
    let indicator_area = Rect {
        x,
        y: area.y + area.height / 2,
        width: 1,
        height: 1,
    };
    let glyph = if left { "◀" } else { "▶" };
    frame.render_widget(
        Paragraph::new(Span::styled(
            glyph,
            Style::default()
                .fg(PALETTE.warning)
                .add_modifier(Modifier::BOLD),
        )),
        indicator_area,
    );
}

fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let [hint_area, note_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

    let hint = match model.mode {
        Mode::Filter => format!("/{}", model.filter.input),
        Mode::Command => format!(":{}", model.command_input),
        _ => {
            "h/l columns  j/k tickets  Space move  s spawn  S stop  Enter attach  / filter  ? help"
                .to_owned()
        }
    };
    let mode_span = Span::styled(
        format!(" {} ", model.mode.label()),
        Style::default()
            .fg(Color::Black)
            .bg(mode_color(model.mode))
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            mode_span,
            Span::raw(" "),
            Span::styled(hint, Style::default().fg(PALETTE.muted)),
        ])),
        hint_area,
    );

    if let Some(notification) = &model.notification {
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" {notification}"),
                Style::default().fg(PALETTE.warning),
            )),
            note_area,
        );
    }
}

fn render_agent_view(model: &Model, frame: &mut Frame, area: Rect) {
    let [header_area, pane_area, hint_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let ticket = model
        .focused_ticket
        .as_ref()
        .and_then(|id| model.board.ticket(id));
    let pane = model
        .focused_ticket
        .as_ref()
        .and_then(|id| model.panes.get(id));

    let mut spans = vec![Span::styled("Board → ", Style::default().fg(PALETTE.muted))];
    if let Some(ticket) = ticket {
        spans.push(Span::styled(
            ticket.title.clone(),
            Style::default()
                .fg(PALETTE.primary)
                .add_modifier(Modifier::BOLD),
        ));
        if !ticket.agent_type.is_empty() {
            spans.push(Span::styled(
                format!("  {}", ticket.agent_type),
                Style::default().fg(PALETTE.info),
            ));
        }
        if let Some(project) = model.project_for_ticket(ticket) {
            spans.push(Span::styled(
                format!("  @{}", project.name),
                Style::default().fg(PALETTE.muted),
            ));
        }
        if let Some(spawned_at) = ticket.agent_spawned_at {
            if let Ok(elapsed) = spawned_at.elapsed() {
                spans.push(Span::styled(
                    format!("  ⏱ {}", format_duration(elapsed.as_secs())),
                    Style::default().fg(PALETTE.muted),
                ));
            }
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), header_area);

    match pane.map(|pane| pane.snapshot()) {
        Some(Ok(snapshot)) => {
            let lines: Vec<Line> = snapshot.lines.iter().map(|row| Line::raw(row.clone())).collect();
            frame.render_widget(Paragraph::new(lines), pane_area);
        }
        Some(Err(_)) | None => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "No pane attached.",
                    Style::default().fg(PALETTE.muted),
                )),
                pane_area,
            );
        }
    }

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Esc", Style::default().fg(PALETTE.info)),
            Span::styled("/", Style::default().fg(PALETTE.muted)),
            Span::styled("Ctrl+g", Style::default().fg(PALETTE.info)),
            Span::styled(" back to board", Style::default().fg(PALETTE.muted)),
        ])),
        hint_area,
    );
}

fn render_help(frame: &mut Frame, area: Rect) {
    let lines = vec![
        help_line("h/l, j/k", "navigate columns and tickets"),
        help_line("g/G", "first / last ticket"),
        help_line("n / e / d", "new, edit, delete ticket"),
        help_line("Space / -", "move ticket forward / back"),
        help_line("s / S", "spawn / stop agent"),
        help_line("Enter", "attach to agent"),
        help_line("/", "filter (@project and title terms)"),
        help_line(":", "command line (:q, :w)"),
        help_line("O", "settings"),
        help_line("[", "toggle project sidebar"),
        help_line("P", "register project"),
        help_line("q", "quit"),
    ];
    let dialog = centered_rect(area, 48, lines.len() as u16 + 2);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.info)),
        ),
        dialog,
    );
}

fn help_line(keys: &str, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {keys:<12}"), Style::default().fg(PALETTE.info)),
        Span::raw(action.to_owned()),
    ])
}

fn render_confirm(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, _)) = &model.confirm else {
        return;
    };
    let width = (message.len() as u16 + 6).clamp(30, area.width);
    let dialog = centered_rect(area, width, 5);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(vec![
            Line::raw(message.clone()),
            Line::default(),
            Line::from(Span::styled(
                "y: confirm    n: cancel",
                Style::default().fg(PALETTE.muted),
            )),
        ])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.warning)),
        ),
        dialog,
    );
}

fn render_spawning(model: &Model, frame: &mut Frame, area: Rect) {
    let agent = model
        .spawning
        .as_ref()
        .map(|state| state.agent.clone())
        .unwrap_or_else(|| "agent".to_owned());
    let spinner = SPINNER_FRAMES[model.animation_frame % SPINNER_FRAMES.len()];
    let dialog = centered_rect(area, 36, 5);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{spinner} Starting {agent}"),
                Style::default()
                    .fg(PALETTE.success)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(
                "[Esc] Cancel",
                Style::default().fg(PALETTE.muted),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.success)),
        ),
        dialog,
    );
}

fn render_shutting_down(model: &Model, frame: &mut Frame, area: Rect) {
    let spinner = SPINNER_FRAMES[model.animation_frame % SPINNER_FRAMES.len()];
    let remaining = model.pending_closes.len();
    let dialog = centered_rect(area, 36, 5);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{spinner} Shutting Down"),
                Style::default()
                    .fg(PALETTE.warning)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::raw(format!("Stopping {remaining} agent(s)...")),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.warning)),
        ),
        dialog,
    );
}

fn render_settings(model: &Model, frame: &mut Frame, area: Rect) {
    let config = &model.config;
    let lines = vec![
        setting_line("theme", &config.theme),
        setting_line(
            "poll interval",
            &format!("{}s", config.poll_interval_secs()),
        ),
        setting_line("default agent", &config.default_agent),
        setting_line("branch prefix", &config.branch_prefix),
        setting_line("session prefix", &config.session_prefix),
        setting_line(
            "remove worktree on delete",
            &config.remove_worktree_on_delete.to_string(),
        ),
        Line::default(),
        Line::from(Span::styled(
            " p: register project    Esc: close",
            Style::default().fg(PALETTE.muted),
        )),
    ];
    let dialog = centered_rect(area, 48, lines.len() as u16 + 2);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Settings ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.info)),
        ),
        dialog,
    );
}

fn setting_line(name: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!(" {name:<26}"),
            Style::default().fg(PALETTE.muted),
        ),
        Span::raw(value.to_owned()),
    ])
}

fn render_ticket_form(model: &Model, frame: &mut Frame, area: Rect) {
    let Some(form) = &model.form else {
        return;
    };
    let title = if form.editing.is_some() {
        " Edit Ticket "
    } else {
        " New Ticket "
    };

    let mut lines = Vec::new();
    let fields: Vec<(FormField, String)> = vec![
        (FormField::Title, form.title.clone()),
        (FormField::Description, form.description.clone()),
        (FormField::Priority, format!("P{}", form.priority)),
        (
            FormField::Agent,
            form.selected_agent().unwrap_or("-").to_owned(),
        ),
        (
            FormField::Branch,
            if form.branch_locked {
                format!("{} (locked)", form.branch)
            } else {
                form.branch.clone()
            },
        ),
        (FormField::Labels, form.labels.clone()),
        (FormField::BlockedBy, form.blocked_by.clone()),
    ];
    for (field, value) in fields {
        let focused = form.focus == field;
        let cursor = if focused { "█" } else { "" };
        let name_style = if focused {
            Style::default()
                .fg(PALETTE.primary)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(PALETTE.muted)
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<12}", field.label()), name_style),
            Span::raw(value),
            Span::styled(cursor.to_owned(), Style::default().fg(PALETTE.primary)),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        " Tab: next field    Enter: save    Esc: cancel",
        Style::default().fg(PALETTE.muted),
    )));

    let dialog = centered_rect(area, 56, lines.len() as u16 + 2);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.primary)),
        ),
        dialog,
    );
}

fn render_project_form(model: &Model, frame: &mut Frame, area: Rect) {
    let Some(form) = &model.project_form else {
        return;
    };
    let name_cursor = if form.editing_path { "" } else { "█" };
    let path_cursor = if form.editing_path { "█" } else { "" };
    let lines = vec![
        Line::from(vec![
            Span::styled(" Name  ", Style::default().fg(PALETTE.muted)),
            Span::raw(form.name.clone()),
            Span::styled(name_cursor, Style::default().fg(PALETTE.primary)),
        ]),
        Line::from(vec![
            Span::styled(" Repo  ", Style::default().fg(PALETTE.muted)),
            Span::raw(form.repo_path.clone()),
            Span::styled(path_cursor, Style::default().fg(PALETTE.primary)),
        ]),
        Line::default(),
        Line::from(Span::styled(
            " Tab: switch    Enter: save    Esc: cancel",
            Style::default().fg(PALETTE.muted),
        )),
    ];
    let dialog = centered_rect(area, 56, 6);
    frame.render_widget(Clear, dialog);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Register Project ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.primary)),
        ),
        dialog,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

fn column_color(status: TicketStatus) -> Color {
    match status {
        TicketStatus::Backlog => PALETTE.info,
        TicketStatus::InProgress => PALETTE.warning,
        TicketStatus::Done => PALETTE.success,
    }
}

fn priority_color(priority: u8) -> Color {
    match priority {
        1 => PALETTE.error,
        2 => PALETTE.warning,
        3 => PALETTE.info,
        _ => PALETTE.muted,
    }
}

fn agent_color(status: AgentStatus) -> Color {
    match status {
        AgentStatus::None => PALETTE.muted,
        AgentStatus::Idle => PALETTE.info,
        AgentStatus::Working => PALETTE.success,
        AgentStatus::Waiting => PALETTE.warning,
        AgentStatus::Completed => PALETTE.success,
        AgentStatus::Error => PALETTE.error,
    }
}

fn agent_glyph(status: AgentStatus, frame: usize) -> Option<String> {
    match status {
        AgentStatus::None => None,
        AgentStatus::Idle => Some("○".to_owned()),
        AgentStatus::Working => {
            Some(SPINNER_FRAMES[frame % SPINNER_FRAMES.len()].to_owned())
        }
        AgentStatus::Waiting => Some("?".to_owned()),
        AgentStatus::Completed => Some("✓".to_owned()),
        AgentStatus::Error => Some("✗".to_owned()),
    }
}
