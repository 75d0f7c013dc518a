use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, InputMode, Screen};
use crate::model::{Region, RenderedTable};
use crate::session::GateState;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    match app.screen() {
        Screen::Upload => render_upload(frame, root[1], app),
        Screen::Dashboard => render_dashboard(frame, root[1], app),
        Screen::Events => render_events(frame, root[1], app),
        Screen::PodDetail => render_pod_detail(frame, root[1], app),
    }
    render_footer(frame, root[2], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut left = Vec::new();
    push_powerline_segment(&mut left, " 󱃾 kubedeck ", Color::White, PL_A, PL_B);
    let version = app.cluster_version().unwrap_or("-");
    push_powerline_segment(
        &mut left,
        format!(" Version: {version} "),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut left,
        format!(" ns:{} ", truncate(app.namespace(), 24)),
        Color::White,
        PL_C,
        PL_D,
    );
    push_powerline_segment(
        &mut left,
        format!(" {} ", screen_label(app.screen())),
        Color::White,
        PL_D,
        BG,
    );

    let (gate_label, gate_bg) = match app.gate_state() {
        GateState::Locked => (" 󰌾 locked ", WARN),
        GateState::Unlocked => (" 󰌿 unlocked ", ACCENT),
    };
    let mut right = Vec::new();
    push_powerline_segment_rtl(&mut right, gate_label, Color::Black, gate_bg, BG);

    let right_width = spans_width(&right) as u16;
    if right_width >= area.width {
        frame.render_widget(
            Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right)).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn render_upload(frame: &mut Frame, area: Rect, app: &App) {
    let panel_area = centered_rect(64, 40, area);
    let mut lines = vec![
        Line::from(Span::styled(
            "Upload a kubeconfig file to load cluster views",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    if app.mode() == InputMode::Path {
        lines.push(Line::from(vec![
            Span::styled("path> ", Style::default().fg(MUTED)),
            Span::styled(
                format!("{}▏", app.input()),
                Style::default().fg(Color::White),
            ),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to upload, Esc to cancel",
            Style::default().fg(MUTED),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Press u to choose a file, q to quit",
            Style::default().fg(MUTED),
        )));
    }

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Kubeconfig")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        );
    frame.render_widget(panel, panel_area);
}

fn render_dashboard(frame: &mut Frame, area: Rect, app: &App) {
    let mut regions = vec![Region::Nodes];
    if app.pods_visible() {
        regions.push(Region::Pods);
    }
    if app.volumes_visible() {
        regions.push(Region::PersistentVolumes);
    }

    let mut constraints = vec![Constraint::Length(3)];
    constraints.extend(regions.iter().map(|_| Constraint::Min(4)));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_namespace_bar(frame, chunks[0], app);
    for (region, chunk) in regions.iter().zip(chunks.iter().skip(1)) {
        let view = match region {
            Region::Pods => app.pods(),
            Region::PersistentVolumes => app.volumes(),
            _ => app.nodes(),
        };
        render_table(
            frame,
            *chunk,
            TablePanel {
                title: panel_title(app, *region, &view.table, ""),
                table: &view.table,
                selected: view.selected(),
                focused: app.focus() == *region,
                error: app.region_error(*region),
            },
        );
    }
}

fn render_namespace_bar(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled("Namespaces: ", Style::default().fg(MUTED))];
    if app.namespaces().is_empty() {
        spans.push(Span::styled(
            app.namespace().to_string(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ));
    }
    for namespace in app.namespaces() {
        let style = if namespace == app.namespace() {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!(" {namespace} "), style));
        spans.push(Span::raw(" "));
    }
    if let Some(error) = app.region_error(Region::Namespaces) {
        spans.push(Span::styled(
            format!(" 󰅚 {}", truncate(error, 48)),
            Style::default().fg(ERROR),
        ));
    }

    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(MUTED))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(bar, area);
}

fn render_events(frame: &mut Frame, area: Rect, app: &App) {
    let events = app.events();
    let suffix = match events.state().direction() {
        Some(_) => format!(" {} {}", events.column(), events.indicator()),
        None => String::new(),
    };
    render_table(
        frame,
        area,
        TablePanel {
            title: panel_title(app, Region::Events, events.table(), &suffix),
            table: events.table(),
            selected: app.events_selected(),
            focused: true,
            error: app.region_error(Region::Events),
        },
    );
}

fn render_pod_detail(frame: &mut Frame, area: Rect, app: &App) {
    let title = match (app.pod_detail(), app.detail_target()) {
        (Some(description), _) => description.title(),
        (None, Some(pod)) => format!("Pod Description for pod: {}", pod.name),
        (None, None) => "Pod Description".to_string(),
    };

    let text = match (app.pod_detail(), app.region_error(Region::PodDetail)) {
        (None, Some(error)) => {
            Text::from(Span::styled(error.to_string(), Style::default().fg(ERROR)))
        }
        (Some(description), _) => {
            let mut lines = Vec::new();
            for (heading, table) in &description.sections {
                lines.push(Line::from(Span::styled(
                    heading.clone(),
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                )));
                lines.extend(section_lines(table));
                lines.push(Line::from(""));
            }
            Text::from(lines)
        }
        (None, None) => Text::from(Span::styled("Loading…", Style::default().fg(MUTED))),
    };

    let panel = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll(), 0))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(panel, area);
}

/// Key-value sections read as `key: value`; record sections keep a header line.
fn section_lines(table: &RenderedTable) -> Vec<Line<'static>> {
    if table.is_key_value() {
        return table
            .rows
            .iter()
            .map(|row| {
                let key = row.cells.first().cloned().unwrap_or_default();
                let value = row.cells.get(1).cloned().unwrap_or_default();
                Line::from(vec![
                    Span::styled(format!("  {key}: "), Style::default().fg(MUTED)),
                    Span::raw(value),
                ])
            })
            .collect();
    }

    let mut lines = vec![Line::from(Span::styled(
        format!("  {}", table.headers.join(" │ ")),
        Style::default().fg(MUTED).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(
        table
            .rows
            .iter()
            .map(|row| Line::from(format!("  {}", row.cells.join(" │ ")))),
    );
    lines
}

struct TablePanel<'a> {
    title: String,
    table: &'a RenderedTable,
    selected: Option<usize>,
    focused: bool,
    error: Option<&'a str>,
}

fn render_table(frame: &mut Frame, area: Rect, panel: TablePanel<'_>) {
    let border = if panel.focused { ACCENT } else { MUTED };
    let block = Block::default()
        .title(panel.title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL));

    if panel.table.headers.is_empty() {
        let (message, color) = match panel.error {
            Some(error) => (error.to_string(), ERROR),
            None => ("No data".to_string(), MUTED),
        };
        frame.render_widget(
            Paragraph::new(message)
                .wrap(Wrap { trim: false })
                .style(Style::default().fg(color))
                .block(block),
            area,
        );
        return;
    }

    let header_row = Row::new(panel.table.headers.iter().map(|header| {
        Cell::from(header.clone()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = panel.table.rows.iter().map(|row| {
        Row::new(
            row.cells
                .iter()
                .map(|cell| Cell::from(cell.clone()).style(Style::default().fg(Color::White))),
        )
    });

    let table = Table::new(rows, column_constraints(panel.table.headers.len()))
        .header(header_row)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(if panel.focused { panel.selected } else { None });
    frame.render_stateful_widget(table, area, &mut state);
}

fn panel_title(app: &App, region: Region, table: &RenderedTable, suffix: &str) -> String {
    let mut title = format!("{} ({}){suffix}", region.title(), table.len());
    if region == Region::Pods {
        title = format!("{} in {} ({}){suffix}", region.title(), app.namespace(), table.len());
    }
    if let Some(refreshed) = app.last_refresh(region) {
        title.push_str(&format!("  {refreshed}"));
    }
    if app.region_error(region).is_some() && !table.headers.is_empty() {
        title.push_str("  stale");
    }
    title
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (mode_label, mode_bg) = match app.mode() {
        InputMode::Normal => (" 󰘳 nrm ", PL_A),
        InputMode::Path => (" 󰈔 path ", PL_C),
    };
    let pending = app.pending_confirmation_prompt();
    let status_text = match (app.mode(), pending) {
        (_, Some(prompt)) => prompt.to_string(),
        (InputMode::Path, None) => format!("path> {}", app.input()),
        (InputMode::Normal, None) => app.status().to_string(),
    };
    let (status_fg, status_bg) = if pending.is_some() {
        (Color::Black, WARN)
    } else {
        (Color::White, PL_B)
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, mode_label, Color::White, mode_bg, status_bg);
    let width_hint = area.width.saturating_sub(16).max(24) as usize;
    push_powerline_segment(
        &mut spans,
        format!(
            " {} {} ",
            footer_status_icon(&status_text),
            truncate(&status_text, width_hint)
        ),
        status_fg,
        status_bg,
        BG,
    );
    spans.push(Span::styled(" ? help", Style::default().fg(MUTED).bg(BG)));

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = ["failed", "error", "refused", "timed out", "denied"]
        .iter()
        .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "kubedeck help  screen:{}  ns:{}",
            screen_label(app.screen()),
            app.namespace()
        )),
        Line::from(""),
    ];
    lines.extend(help_lines(app.screen()).into_iter().map(Line::from));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn help_lines(screen: Screen) -> Vec<&'static str> {
    let mut lines = vec![
        "q / Ctrl-c   quit",
        "?            toggle help",
        "u            upload kubeconfig file",
    ];
    match screen {
        Screen::Upload => {}
        Screen::Dashboard => lines.extend([
            "j/k ↑/↓      move selection",
            "Tab          cycle focused table",
            "p            show/hide pods",
            "v            show/hide persistent volumes",
            "n / N        next / previous namespace",
            "Enter        describe selected pod",
            "R            restart selected pod",
            "Z            scale selected pod to 0",
            "e            events",
            "r            refresh",
        ]),
        Screen::Events => lines.extend([
            "j/k ↑/↓      move selection",
            "s            sort by timestamp",
            "r            refresh events",
            "h / Esc      back to dashboard",
        ]),
        Screen::PodDetail => lines.extend([
            "j/k ↑/↓      scroll",
            "R            restart pod",
            "Z            scale pod to 0",
            "r            refresh description",
            "h / Esc      back to dashboard",
        ]),
    }
    lines
}

fn screen_label(screen: Screen) -> &'static str {
    match screen {
        Screen::Upload => "upload",
        Screen::Dashboard => "dashboard",
        Screen::Events => "events",
        Screen::PodDetail => "pod",
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    if columns == 0 {
        return vec![Constraint::Percentage(100)];
    }

    let width = (100 / columns as u16).max(1);
    (0..columns)
        .map(|_| Constraint::Percentage(width))
        .collect()
}
