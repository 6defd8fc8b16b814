use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::view::{FormField, NoteList, Screen};
use crate::app::{Modal, Pane, UiModel};
use crate::config::palette;

const ACCENT: Color = Color::Cyan;
/// Columns reserved for form labels; carets are placed after it.
const LABEL_WIDTH: u16 = 10;

pub fn draw_app(frame: &mut Frame, model: &UiModel, list_state: &mut ListState) {
    match model.screen {
        Screen::Loading => {
            let area = centered_rect(40, 20, frame.size());
            frame.render_widget(
                Paragraph::new(model.messages.loading())
                    .block(Block::default().borders(Borders::ALL)),
                area,
            );
        }
        Screen::Login => draw_login(frame, model),
        Screen::App { account } => draw_workspace(frame, model, account, list_state),
    }
    if let Some(modal) = model.modal {
        draw_modal(frame, model, modal);
    }
}

fn focus_style(active: bool) -> Style {
    if active {
        Style::default().fg(ACCENT)
    } else {
        Style::default()
    }
}

/// Screen width of the first `column` graphemes of `text`.
fn caret_offset(text: &str, column: usize) -> u16 {
    text.graphemes(true)
        .take(column)
        .map(UnicodeWidthStr::width)
        .sum::<usize>() as u16
}

fn field_line<'a>(label: &'a str, value: String, active: bool) -> Line<'a> {
    let label_style = if active {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(vec![
        Span::styled(
            format!("{label:<width$}", width = LABEL_WIDTH as usize),
            label_style,
        ),
        Span::raw(value),
    ])
}

fn draw_login(frame: &mut Frame, model: &UiModel) {
    let area = centered_rect(60, 50, frame.size());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" tagnotes ")
        .border_style(Style::default().fg(ACCENT));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let masked: String = "•".repeat(model.login.password.graphemes(true).count());
    let mut lines = vec![
        field_line(
            model.messages.field_label(FormField::Email),
            model.login.email.clone(),
            model.field == FormField::Email,
        ),
        field_line(
            model.messages.field_label(FormField::Password),
            masked.clone(),
            model.field == FormField::Password,
        ),
        Line::default(),
    ];
    if let Some(error) = &model.login.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        model.messages.login_keys(),
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    let (row, offset) = match model.field {
        FormField::Password => (1, caret_offset(&masked, model.caret_column)),
        _ => (0, caret_offset(&model.login.email, model.caret_column)),
    };
    frame.set_cursor(inner.x + LABEL_WIDTH + offset, inner.y + row);
}

fn draw_workspace(frame: &mut Frame, model: &UiModel, account: &str, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Line::from(vec![
        Span::styled(
            " tagnotes ",
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(account.to_string(), Style::default().fg(Color::Gray)),
        Span::raw("  │  "),
        Span::styled(
            model.view.filter_menu.label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);
    frame.render_widget(Paragraph::new(header), vertical[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(vertical[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(columns[0]);

    draw_compose(frame, model, left[0]);
    draw_tag_panel(frame, model, left[1]);
    draw_notes(frame, model, columns[1], list_state);
    frame.render_widget(Paragraph::new(build_status_line(model)), vertical[2]);
}

fn draw_compose(frame: &mut Frame, model: &UiModel, area: Rect) {
    let active = model.pane == Pane::Compose;
    let commit = if model.view.editing_note {
        model.messages.save()
    } else {
        model.messages.add()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} [{commit}] ", model.messages.note_heading()))
        .border_style(focus_style(active));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let draft = &model.state.note_draft;
    let select = &model.view.tag_select;
    let tag_value = match (&select.selected, &select.placeholder) {
        (Some(name), _) => format!("‹ {name} ›"),
        (None, Some(placeholder)) => placeholder.clone(),
        (None, None) => String::new(),
    };
    let tag_color = select
        .selected
        .as_ref()
        .and_then(|name| select.options.iter().find(|option| &option.name == name))
        .map(|option| palette::to_color(&option.color))
        .unwrap_or(Color::DarkGray);
    let lines = vec![
        field_line(
            model.messages.field_label(FormField::NoteTitle),
            draft.title.clone(),
            active && model.field == FormField::NoteTitle,
        ),
        field_line(
            model.messages.field_label(FormField::NoteText),
            draft.text.clone(),
            active && model.field == FormField::NoteText,
        ),
        Line::from(vec![
            Span::styled(
                format!(
                    "{:<width$}",
                    model.messages.field_label(FormField::NoteTag),
                    width = LABEL_WIDTH as usize
                ),
                if active && model.field == FormField::NoteTag {
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                },
            ),
            Span::styled(tag_value, Style::default().fg(tag_color)),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    if active {
        let (row, text) = match model.field {
            FormField::NoteTitle => (0, draft.title.as_str()),
            FormField::NoteText => (1, draft.text.as_str()),
            _ => return,
        };
        frame.set_cursor(
            inner.x + LABEL_WIDTH + caret_offset(text, model.caret_column),
            inner.y + row,
        );
    }
}

fn draw_tag_panel(frame: &mut Frame, model: &UiModel, area: Rect) {
    let active = matches!(model.pane, Pane::TagList | Pane::TagForm);
    let arrow = if model.view.tag_panel_expanded {
        "▾"
    } else {
        "▸"
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            " {arrow} {} ({}) ",
            model.messages.tags_heading(),
            model.view.manageable_tags.len()
        ))
        .border_style(focus_style(active));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if !model.view.tag_panel_expanded {
        frame.render_widget(
            Paragraph::new(Span::styled(
                model.messages.tag_panel_hint(),
                Style::default().fg(Color::DarkGray),
            )),
            inner,
        );
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(inner);

    let items: Vec<ListItem> = model
        .view
        .manageable_tags
        .iter()
        .map(|tag| {
            let mut spans = vec![
                Span::styled("● ", Style::default().fg(palette::to_color(&tag.color))),
                Span::raw(tag.name.clone()),
            ];
            if tag.editing {
                spans.push(Span::styled(
                    " ✎",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let mut tag_state = ListState::default();
    if model.pane == Pane::TagList && !items.is_empty() {
        tag_state.select(Some(model.tag_cursor));
    }
    let list = List::new(items).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_stateful_widget(list, sections[0], &mut tag_state);

    let form_active = model.pane == Pane::TagForm;
    let draft = &model.state.tag_draft;
    let commit = if model.view.editing_tag {
        model.messages.save()
    } else {
        model.messages.add()
    };
    let form = vec![
        Line::from(Span::styled(
            format!("─ [{commit}] "),
            Style::default().fg(Color::Gray),
        )),
        field_line(
            model.messages.field_label(FormField::TagName),
            draft.name.clone(),
            form_active && model.field == FormField::TagName,
        ),
        Line::from(vec![
            Span::styled(
                format!(
                    "{:<width$}",
                    model.messages.field_label(FormField::TagColor),
                    width = LABEL_WIDTH as usize
                ),
                if form_active && model.field == FormField::TagColor {
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                },
            ),
            Span::raw(draft.color.clone()),
            Span::raw(" "),
            Span::styled("■", Style::default().fg(palette::to_color(&draft.color))),
        ]),
    ];
    frame.render_widget(Paragraph::new(form), sections[1]);

    if form_active {
        let (row, text) = match model.field {
            FormField::TagName => (1, draft.name.as_str()),
            FormField::TagColor => (2, draft.color.as_str()),
            _ => return,
        };
        frame.set_cursor(
            sections[1].x + LABEL_WIDTH + caret_offset(text, model.caret_column),
            sections[1].y + row,
        );
    }
}

fn draw_notes(frame: &mut Frame, model: &UiModel, area: Rect, list_state: &mut ListState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", model.messages.notes_heading()))
        .border_style(focus_style(model.pane == Pane::Notes));

    let cards = match &model.view.notes {
        NoteList::Cards(cards) => cards,
        NoteList::Empty(message) => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let empty = Paragraph::new(Span::styled(
                message.clone(),
                Style::default().fg(palette::to_color(palette::FALLBACK_COLOR)),
            ))
            .alignment(ratatui::layout::Alignment::Center);
            frame.render_widget(empty, inner);
            return;
        }
    };

    let items: Vec<ListItem> = cards
        .iter()
        .map(|card| {
            let color = palette::to_color(&card.color);
            let bar = Span::styled("▌ ", Style::default().fg(color));
            let mut title = vec![bar.clone()];
            if card.editing {
                title.push(Span::styled(
                    "✎ ",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            title.push(Span::styled(
                card.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            title.push(Span::raw("  "));
            title.push(Span::styled(
                format!(" {} ", card.tag_name),
                Style::default().fg(Color::Black).bg(color),
            ));
            let mut lines = vec![Line::from(title)];
            for text_line in card.text.lines() {
                lines.push(Line::from(vec![bar.clone(), Span::raw(text_line.to_string())]));
            }
            lines.push(Line::from(vec![
                bar,
                Span::styled(card.created_label.clone(), Style::default().fg(Color::Gray)),
            ]));
            lines.push(Line::default());
            ListItem::new(Text::from(lines))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Rgb(40, 40, 40)));
    frame.render_stateful_widget(list, area, list_state);
}

fn build_status_line(model: &UiModel) -> Text<'static> {
    let help = match model.pane {
        Pane::Notes => model.messages.notes_keys(),
        Pane::Compose => model.messages.compose_keys(),
        Pane::TagList => model.messages.tag_list_keys(),
        Pane::TagForm => model.messages.tag_form_keys(),
    };
    let mut lines = Vec::with_capacity(2);
    lines.push(Line::from(Span::styled(
        model.status.unwrap_or_default().to_string(),
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn draw_modal(frame: &mut Frame, model: &UiModel, modal: &Modal) {
    let area = centered_rect(50, 25, frame.size());
    frame.render_widget(Clear, area);
    let (message, buttons, border) = match modal {
        Modal::Alert(message) => (
            message.as_str(),
            format!("[Enter] {}", model.messages.ok()),
            Color::Yellow,
        ),
        Modal::Confirm { message, .. } => (
            message.as_str(),
            format!(
                "[y] {}   [n] {}",
                model.messages.agree(),
                model.messages.cancel()
            ),
            Color::Red,
        ),
    };
    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled(
            buttons,
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ]);
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}
