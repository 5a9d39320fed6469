use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::agent::{ChatRole, ChatTurn};
use crate::app::{App, WAITING_STATUS};

mod theme;
use theme::*;

const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 12;

fn cell_width(text: &str) -> u16 {
    UnicodeWidthStr::width(text).min(u16::MAX as usize) as u16
}

/// Draws the whole screen. Output depends only on `app`, so drawing the
/// same state twice produces the same frame.
pub fn render(f: &mut Frame<'_>, app: &App) {
    let size = f.size();
    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
        let block = Paragraph::new(format!(
            "Terminal too small, resize to at least {MIN_WIDTH}x{MIN_HEIGHT}."
        ))
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .block(Block::default().title(app.title.as_str()).borders(Borders::ALL))
        .style(Style::default().fg(FG_PRIMARY).bg(BG_PRIMARY));
        f.render_widget(block, size);
        return;
    }

    let base = Block::default().style(Style::default().bg(BG_PRIMARY));
    f.render_widget(base, size);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(size);

    render_title_bar(f, app, vertical[0]);
    render_history(f, app, vertical[1]);
    render_input(f, app, vertical[2]);
    render_status_bar(f, app, vertical[3]);
}

fn render_title_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let title = Paragraph::new(Line::from(Span::styled(
        format!(" {}", app.title),
        Style::default().fg(BAR_TEXT).add_modifier(Modifier::BOLD),
    )))
    .style(Style::default().bg(BAR_BG));
    f.render_widget(title, area);
}

fn render_history(f: &mut Frame<'_>, app: &App, area: Rect) {
    let history_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_IDLE))
        .title(Span::styled("Conversation", Style::default().fg(FG_PRIMARY)))
        .style(Style::default().bg(BG_PANEL));

    let wrap_width = history_block.inner(area).width.max(1) as usize;
    let turns = app.session.turns();

    if turns.is_empty() {
        let hint = Paragraph::new(Span::styled(
            "Ask a question about your cloud resources to get started.",
            Style::default().fg(FG_DIM),
        ))
        .wrap(Wrap { trim: true })
        .block(history_block);
        f.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem> = turns
        .iter()
        .map(|turn| turn_item(turn, wrap_width))
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.session.selected_index()));

    let list = List::new(items)
        .block(history_block)
        .style(Style::default().bg(BG_PANEL))
        .highlight_style(Style::default().bg(SELECTION_BG));

    f.render_stateful_widget(list, area, &mut state);
}

fn turn_item(turn: &ChatTurn, wrap_width: usize) -> ListItem<'static> {
    let (label_color, body_color) = match (turn.role(), turn.failed()) {
        (_, true) => (FAILED, FAILED),
        (ChatRole::User, false) => (USER_LABEL, Color::White),
        (ChatRole::Assistant, false) => (ASSISTANT_LABEL, FG_PRIMARY),
    };
    let label = if turn.failed() {
        format!("{} (error)", turn.role().label())
    } else {
        turn.role().label().to_string()
    };

    let mut lines = vec![Line::from(Span::styled(
        label,
        Style::default().fg(label_color).add_modifier(Modifier::BOLD),
    ))];
    let body_style = Style::default().fg(body_color);
    if turn.content().is_empty() {
        push_wrapped_line(&mut lines, "", body_style, wrap_width);
    } else {
        for line in turn.content().lines() {
            push_wrapped_line(&mut lines, line, body_style, wrap_width);
        }
    }
    ListItem::new(lines)
}

fn render_input(f: &mut Frame<'_>, app: &App, area: Rect) {
    let border = if app.session.is_sending() {
        BORDER_IDLE
    } else {
        BORDER_FOCUS
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            "Message (Enter to send / Shift+Enter for a new line)",
            Style::default().fg(FG_PRIMARY),
        ))
        .style(Style::default().bg(BG_PANEL));

    let input_inner = input_block.inner(area);
    let input_lines: Vec<Line> = if app.composer.is_empty() {
        vec![Line::from(Span::styled(
            "Type a message for the assistant…",
            Style::default().fg(FG_DIM),
        ))]
    } else {
        app.composer
            .buffer()
            .split('\n')
            .map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(FG_PRIMARY),
                ))
            })
            .collect()
    };

    let input_paragraph = Paragraph::new(input_lines)
        .block(input_block)
        .style(Style::default().bg(BG_PANEL))
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(input_paragraph, area);

    let width = input_inner.width.max(1) as usize;
    let (cursor_col, cursor_row) = app.composer.cursor_display_position(width);
    let cursor_x = input_inner
        .x
        .saturating_add(cursor_col.min(width.saturating_sub(1) as u16));
    let cursor_y = input_inner
        .y
        .saturating_add(cursor_row.min(input_inner.height.saturating_sub(1)));
    f.set_cursor(cursor_x, cursor_y);
}

fn push_wrapped_line(lines: &mut Vec<Line<'static>>, text: &str, style: Style, width: usize) {
    for segment in wrap_to_width(text, width) {
        lines.push(Line::from(Span::styled(segment, style)));
    }
}

fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
        if current_width + ch_width > width && !current.is_empty() {
            result.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    result.push(current);
    result
}

fn render_status_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let busy = app.session.is_sending();
    let bar_bg = if busy { BAR_BUSY_BG } else { BAR_BG };
    let style = Style::default().fg(BAR_TEXT).bg(bar_bg);

    let message = if busy {
        WAITING_STATUS
    } else {
        app.status_message.as_str()
    };
    let right = format!(
        "[{}] [TURNS:{}]",
        app.backend_name(),
        app.session.turns().len()
    );

    f.render_widget(Clear, area);
    let right_width = cell_width(&right).min(area.width);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right_width)])
        .split(area);

    f.render_widget(
        Paragraph::new(Line::from(Span::styled(format!(" {message}"), style))).style(style),
        columns[0],
    );
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(right, style)))
            .style(style)
            .alignment(Alignment::Right),
        columns[1],
    );
}
