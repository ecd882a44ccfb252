use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, ChatRole, InputMode, StatusLevel};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, stats_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_stats_strip(app, frame, stats_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.confirm_clear {
        render_clear_confirmation(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status_color = match app.status_level {
        StatusLevel::Ready => Color::Green,
        StatusLevel::Loading => Color::Yellow,
        StatusLevel::Error => Color::Red,
    };

    let title = Line::from(vec![
        Span::styled(" RAG Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let status = Line::from(vec![
        Span::styled("● ", Style::default().fg(status_color)),
        Span::styled(app.status_text.as_str(), Style::default().fg(status_color)),
        Span::raw(" "),
    ])
    .right_aligned();

    let background = Style::default().bg(Color::DarkGray);
    frame.render_widget(Paragraph::new(title).style(background), area);
    frame.render_widget(Paragraph::new(status).style(background), area);
}

fn render_stats_strip(app: &App, frame: &mut Frame, area: Rect) {
    let strip = match &app.stats {
        Some(stats) => Line::from(vec![
            Span::styled(" Documents: ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.documents.to_string()),
            Span::styled("  Model: ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.embedding_model.as_str()),
            Span::styled("  Dimensions: ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.embedding_dimensions.to_string()),
        ]),
        None => Line::from(Span::styled(
            " Could not connect to API",
            Style::default().fg(Color::Yellow),
        )),
    };

    frame.render_widget(Paragraph::new(strip), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Record inner dimensions for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(
            " Chat  [rerank: {}] [memory: {}] ",
            on_off(app.use_rerank),
            on_off(app.use_memory)
        ));

    let mut lines: Vec<Line> = Vec::new();

    for msg in &app.messages {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "Assistant:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
            }
            ChatRole::Error => {
                lines.push(Line::from(Span::styled(
                    "Error:",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
            }
        }

        // Content is rendered literally, one text line per embedded newline
        let content_style = match msg.role {
            ChatRole::Error => Style::default().fg(Color::Red),
            _ => Style::default(),
        };
        for line in msg.content.lines() {
            lines.push(Line::from(Span::styled(line.to_string(), content_style)));
        }
        lines.push(Line::default());
    }

    if app.loading {
        lines.push(Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (border_color, title) = if app.loading {
        (Color::DarkGray, " Sending... ")
    } else if app.input_mode == InputMode::Editing {
        (Color::Yellow, " Ask (Enter to send) ")
    } else {
        (Color::DarkGray, " Ask (i to edit) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the inner width
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing && !app.loading {
        frame.set_cursor_position((
            area.x + 1 + (app.cursor.saturating_sub(scroll_offset)) as u16,
            area.y + 1,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.confirm_clear {
        vec![
            Span::styled(" y ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" keep ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" keys ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" i ", key_style),
                Span::styled(" edit ", label_style),
                Span::styled(" r ", key_style),
                Span::styled(" rerank ", label_style),
                Span::styled(" m ", key_style),
                Span::styled(" memory ", label_style),
                Span::styled(" c ", key_style),
                Span::styled(" clear ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_clear_confirmation(frame: &mut Frame, area: Rect) {
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 4.min(area.height.saturating_sub(2));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear chat ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to clear the chat?"),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red).bold()),
            Span::raw("es / "),
            Span::styled("n", Style::default().fg(Color::Green).bold()),
            Span::raw("o"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block).centered(), popup_area);
}
