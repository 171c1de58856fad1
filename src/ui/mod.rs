use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, DetailOverlay, OverlayState, TagFilterOverlay};
use crate::config::themes::Palette;
use crate::engine::{ItemKind, RenderCoordinator};

pub mod canvas;

pub use canvas::{TerminalSink, TimelineCanvas};

const DETAIL_WIDTH: u16 = 56;

/// Screen regions shared by drawing and pointer hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regions {
    pub frame: Rect,
    pub timeline: Rect,
    /// Inside the timeline border; one column per pixel unit.
    pub canvas: Rect,
    pub status: Rect,
}

pub fn regions(area: Rect) -> Regions {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let timeline = vertical[0];
    Regions {
        frame: area,
        timeline,
        canvas: Block::default().borders(Borders::ALL).inner(timeline),
        status: vertical[1],
    }
}

pub fn draw_app(
    frame: &mut Frame,
    state: &AppState,
    engine: &RenderCoordinator<TerminalSink>,
    palette: Palette,
) {
    let regions = regions(frame.size());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {} ", state.title),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(palette.axis));
    frame.render_widget(block, regions.timeline);
    frame.render_widget(TimelineCanvas::new(engine, palette), regions.canvas);

    let status = build_status_line(state, engine, palette);
    let status_paragraph = Paragraph::new(status)
        .style(Style::default().bg(palette.status_bg).fg(palette.status_fg));
    frame.render_widget(status_paragraph, regions.status);

    render_overlay(frame, state, engine, palette);
}

fn build_status_line(
    state: &AppState,
    engine: &RenderCoordinator<TerminalSink>,
    palette: Palette,
) -> Text<'static> {
    let sink = engine.sink();
    let granularity = sink
        .granularity()
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".into());
    let filter = &engine.view().filter;

    let mut spans = vec![
        Span::styled(
            format!(" zoom {:.3} px/day ", engine.zoom()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("({granularity})")),
        Span::raw(format!(" | {}/{} items", sink.visible(), engine.items().len())),
        Span::raw(format!(
            " | tags {}/{}",
            filter.active_count(),
            engine.catalog().len()
        )),
    ];
    if let Some(item) = engine.selected() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            item.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    if engine.is_animating() {
        spans.push(Span::raw(" | zooming"));
    }
    match &state.status_message {
        Some(message) => {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                message.clone(),
                Style::default().add_modifier(Modifier::ITALIC),
            ));
        }
        None => spans.push(Span::styled(
            " | f filter • +/- zoom • Tab select • Enter details • q quit",
            Style::default().fg(palette.status_fg),
        )),
    }
    Text::from(Line::from(spans))
}

fn render_overlay(
    frame: &mut Frame,
    state: &AppState,
    engine: &RenderCoordinator<TerminalSink>,
    palette: Palette,
) {
    match state.overlay() {
        Some(OverlayState::TagFilter(overlay)) => render_tag_filter(frame, overlay, engine, palette),
        Some(OverlayState::Detail(overlay)) => render_detail(frame, overlay, engine, palette),
        None => {}
    }
}

fn render_tag_filter(
    frame: &mut Frame,
    overlay: &TagFilterOverlay,
    engine: &RenderCoordinator<TerminalSink>,
    palette: Palette,
) {
    let area = centered_rect(50, 60, frame.size());
    frame.render_widget(Clear, area);

    let filter = &engine.view().filter;
    let name_room = (area.width as usize).saturating_sub(14);
    let items: Vec<ListItem> = engine
        .catalog()
        .iter()
        .map(|tag| {
            let mark = if filter.is_active(&tag.name) { "[x]" } else { "[ ]" };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{mark} ")),
                Span::styled(
                    truncate_to_width(&tag.name, name_room),
                    Style::default().fg(Color::Rgb(tag.color.r, tag.color.g, tag.color.b)),
                ),
                Span::styled(format!(" ({})", tag.count), Style::default().fg(palette.muted)),
            ]))
        })
        .collect();

    let empty = items.is_empty();
    let list = List::new(items)
        .block(
            Block::default()
                .title("Tags • space toggle • a all • n none • Esc close")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(
            Style::default()
                .fg(palette.selection)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");
    let mut list_state = ListState::default().with_selected((!empty).then_some(overlay.cursor));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_detail(
    frame: &mut Frame,
    overlay: &DetailOverlay,
    engine: &RenderCoordinator<TerminalSink>,
    palette: Palette,
) {
    let Some(item) = engine.item(&overlay.item) else {
        return;
    };
    let screen = frame.size();
    let width = DETAIL_WIDTH.min(screen.width);
    let inner_width = width.saturating_sub(2).max(1) as usize;

    let label = Style::default().fg(palette.muted);
    let kind = match item.kind {
        ItemKind::Event => "event",
        ItemKind::Period => "period",
    };
    let end = match (&item.raw_end, item.open_ended) {
        (_, true) => "ongoing".to_string(),
        (Some(end), false) => end.clone(),
        (None, false) => "-".to_string(),
    };
    let tags = if item.tags.is_empty() {
        "(none)".to_string()
    } else {
        item.tags.join(", ")
    };

    let mut lines = vec![
        Line::from(vec![Span::styled("Type   ", label), Span::raw(kind)]),
        Line::from(vec![Span::styled("Start  ", label), Span::raw(item.raw_start.clone())]),
    ];
    if item.kind == ItemKind::Period {
        lines.push(Line::from(vec![Span::styled("End    ", label), Span::raw(end)]));
    }
    lines.push(Line::from(vec![Span::styled("Tags   ", label), Span::raw(tags)]));
    let mut height = lines.len() as u16 + 2;
    if let Some(description) = item.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(description.to_string()));
        height = height.saturating_add(1 + wrapped_rows(description, inner_width));
    }

    let area = popup_rect(screen, overlay.anchor, width, height);
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    truncate_to_width(&item.title, inner_width),
                    Style::default().add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

/// Rows `text` needs when wrapped at `width` columns; a rough estimate
/// that ignores word boundaries.
fn wrapped_rows(text: &str, width: usize) -> u16 {
    let width = width.max(1);
    let rows: usize = text
        .lines()
        .map(|line| UnicodeWidthStr::width(line).max(1).div_ceil(width))
        .sum();
    rows.clamp(1, u16::MAX as usize) as u16
}

/// Places a `width` x `height` popup next to `anchor`: above it when there
/// is room, otherwise below, always inside `screen`. Without an anchor the
/// popup is centered.
pub fn popup_rect(screen: Rect, anchor: Option<(u16, u16)>, width: u16, height: u16) -> Rect {
    let width = width.min(screen.width);
    let height = height.min(screen.height);
    let max_x = screen.right() - width;
    let max_y = screen.bottom() - height;
    match anchor {
        None => Rect::new(
            screen.x + (screen.width - width) / 2,
            screen.y + (screen.height - height) / 2,
            width,
            height,
        ),
        Some((col, row)) => {
            let x = col.saturating_sub(width / 2).clamp(screen.x, max_x);
            let y = if row.saturating_sub(screen.y) >= height {
                row - height
            } else {
                row.saturating_add(1)
            };
            Rect::new(x, y.clamp(screen.y, max_y), width, height)
        }
    }
}

/// Cuts `text` to at most `max` columns, ending with `…` when shortened.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if used + glyph_width > max - 1 {
            break;
        }
        out.push_str(grapheme);
        used += glyph_width;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
