use indexmap::IndexMap;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthStr;

use super::truncate_to_width;
use crate::config::themes::Palette;
use crate::engine::{
    ElementOp, Granularity, ItemDescriptor, ItemId, Lane, NormalizedItem, RenderCoordinator,
    RenderFrame, RenderSink, Rgb, Tick,
};

/// Keeps the elements the engine has materialized so the canvas can redraw
/// them at any time, plus the last frame's axis state.
#[derive(Debug, Default)]
pub struct TerminalSink {
    elements: IndexMap<ItemId, RetainedElement>,
    ticks: Vec<Tick>,
    scroll_left: f64,
    zoom: f64,
    granularity: Option<Granularity>,
    visible: usize,
    frames: u64,
}

#[derive(Debug, Clone)]
struct RetainedElement {
    descriptor: ItemDescriptor,
    shown: bool,
}

impl RenderSink for TerminalSink {
    fn emit(&mut self, frame: &RenderFrame) {
        for op in &frame.ops {
            match op {
                ElementOp::Create(descriptor) | ElementOp::Update(descriptor) => {
                    self.elements.insert(
                        descriptor.id.clone(),
                        RetainedElement {
                            descriptor: descriptor.clone(),
                            shown: true,
                        },
                    );
                }
                ElementOp::Hide(id) => {
                    if let Some(element) = self.elements.get_mut(id) {
                        element.shown = false;
                    }
                }
            }
        }
        self.ticks.clone_from(&frame.ticks);
        self.scroll_left = frame.scroll_left;
        self.zoom = frame.zoom;
        self.granularity = frame.granularity;
        self.visible = frame.visible;
        self.frames += 1;
    }
}

impl TerminalSink {
    pub fn shown(&self) -> impl Iterator<Item = &ItemDescriptor> {
        self.elements
            .values()
            .filter(|element| element.shown)
            .map(|element| &element.descriptor)
    }

    pub fn materialized(&self) -> usize {
        self.elements.len()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn granularity(&self) -> Option<Granularity> {
        self.granularity
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Row of the time axis inside `area`: below the label row, halfway down.
pub fn axis_row(area: Rect) -> u16 {
    area.y + 1 + area.height.saturating_sub(1) / 2
}

/// Lane and stack level drawn on screen row `row`, if any.
pub fn slot_at_row(area: Rect, row: u16, base_offset: f64, level_height: f64) -> Option<(Lane, usize)> {
    let axis = axis_row(area);
    let (lane, distance) = match row.cmp(&axis) {
        std::cmp::Ordering::Less => (Lane::Above, axis - row),
        std::cmp::Ordering::Greater => (Lane::Below, row - axis),
        std::cmp::Ordering::Equal => return None,
    };
    let level = (f64::from(distance) - base_offset) / level_height.max(f64::EPSILON);
    if level < 0.0 || !level.is_finite() {
        return None;
    }
    Some((lane, level.round() as usize))
}

pub struct TimelineCanvas<'a> {
    engine: &'a RenderCoordinator<TerminalSink>,
    palette: Palette,
}

impl<'a> TimelineCanvas<'a> {
    pub fn new(engine: &'a RenderCoordinator<TerminalSink>, palette: Palette) -> Self {
        Self { engine, palette }
    }

    fn column(&self, area: Rect, x: f64) -> Option<u16> {
        let offset = (x - self.engine.sink().scroll_left).round();
        if offset < 0.0 || offset >= f64::from(area.width) {
            return None;
        }
        Some(area.x + offset as u16)
    }

    fn row(&self, area: Rect, descriptor: &ItemDescriptor) -> Option<u16> {
        let axis = axis_row(area);
        let offset = descriptor.offset.round().max(1.0);
        let row = match descriptor.lane {
            Lane::Above => f64::from(axis) - offset,
            Lane::Below => f64::from(axis) + offset,
        };
        // the top row holds tick labels
        if row <= f64::from(area.y) || row >= f64::from(area.bottom()) {
            return None;
        }
        Some(row as u16)
    }

    fn draw_axis(&self, area: Rect, buf: &mut Buffer) {
        let axis = axis_row(area);
        if axis >= area.bottom() {
            return;
        }
        let axis_style = Style::default().fg(self.palette.axis);
        buf.set_string(area.x, axis, "─".repeat(area.width as usize), axis_style);

        let mut next_free = area.x;
        for tick in self.engine.sink().ticks() {
            let Some(col) = self.column(area, tick.position) else {
                continue;
            };
            buf.set_string(col, axis, "┼", axis_style);
            let label_width = tick.label.width() as u16;
            if col >= next_free && col + label_width <= area.right() {
                buf.set_string(col, area.y, &tick.label, Style::default().fg(self.palette.muted));
                next_free = col + label_width + 1;
            }
        }
    }

    fn draw_item(&self, area: Rect, buf: &mut Buffer, descriptor: &ItemDescriptor, item: &NormalizedItem) {
        let Some(row) = self.row(area, descriptor) else {
            return;
        };
        let color = to_color(descriptor.color);
        let mut emphasis = Modifier::empty();
        if descriptor.is_selected {
            emphasis = Modifier::BOLD | Modifier::REVERSED;
        }

        let left = descriptor.start_px - self.engine.sink().scroll_left;
        let area_width = f64::from(area.width);
        match descriptor.width {
            Some(width) => {
                let start = left.round().max(0.0);
                let end = (left + width).round().min(area_width);
                if end <= start {
                    return;
                }
                let bar = Rect::new(area.x + start as u16, row, (end - start) as u16, 1);
                let style = Style::default()
                    .bg(color)
                    .fg(Color::Black)
                    .add_modifier(emphasis);
                buf.set_style(bar, style);
                let title = truncate_to_width(&item.title, bar.width as usize);
                buf.set_string(bar.x, row, title, style);
            }
            None => {
                let Some(col) = self.column(area, descriptor.start_px) else {
                    return;
                };
                let marker_style = Style::default().fg(color).add_modifier(emphasis);
                buf.set_string(col, row, "◆", marker_style);
                let room = (area.right().saturating_sub(col + 2)) as usize;
                let budget = (self.engine.config().layout.event_width as usize).saturating_sub(3);
                let title = truncate_to_width(&item.title, room.min(budget));
                let title_style = Style::default()
                    .fg(if descriptor.is_selected { self.palette.selection } else { self.palette.text })
                    .add_modifier(emphasis);
                buf.set_string(col + 2, row, title, title_style);
            }
        }

        if let Some(col) = self.column(area, descriptor.start_px) {
            let axis = axis_row(area);
            if axis < area.bottom() {
                let mark = match descriptor.lane {
                    Lane::Above => "┴",
                    Lane::Below => "┬",
                };
                buf.set_string(col, axis, mark, Style::default().fg(color));
            }
        }
    }
}

impl Widget for TimelineCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height < 2 {
            return;
        }
        self.draw_axis(area, buf);

        let mut drawn = 0usize;
        let mut selected = None;
        for descriptor in self.engine.sink().shown() {
            if descriptor.is_selected {
                selected = Some(descriptor);
                continue;
            }
            if let Some(item) = self.engine.item(&descriptor.id) {
                self.draw_item(area, buf, descriptor, item);
                drawn += 1;
            }
        }
        // selection on top of its neighbours
        if let Some(descriptor) = selected {
            if let Some(item) = self.engine.item(&descriptor.id) {
                self.draw_item(area, buf, descriptor, item);
                drawn += 1;
            }
        }

        if drawn == 0 {
            let message = if self.engine.items().is_empty() {
                "No items in this timeline"
            } else {
                "No items match the active tags"
            };
            let width = message.width() as u16;
            let x = area.x + area.width.saturating_sub(width) / 2;
            let y = axis_row(area).saturating_sub(1).max(area.y + 1).min(area.bottom() - 1);
            buf.set_string(x, y, message, Style::default().fg(self.palette.muted));
        }
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::themes::ThemeRegistry;
    use crate::config::ThemeName;
    use crate::engine::{EngineConfig, TimelineItem};
    use time::macros::datetime;

    fn engine() -> RenderCoordinator<TerminalSink> {
        let records: Vec<TimelineItem> = serde_json::from_value(serde_json::json!([
            {"id": "war", "title": "Long war", "type": "period", "start": "1900", "end": "1950", "tags": ["x"]},
            {"id": "treaty", "title": "Treaty", "type": "event", "start": "1920", "tags": ["y"]}
        ]))
        .expect("records");
        RenderCoordinator::new(
            records,
            EngineConfig::terminal(),
            datetime!(2024-01-01 0:00 UTC),
            TerminalSink::default(),
        )
    }

    #[test]
    fn sink_tracks_engine_layout() {
        let mut engine = engine();
        let shown: Vec<_> = engine.sink().shown().map(|d| d.id.clone()).collect();
        assert_eq!(shown.len(), 2);

        engine.toggle_tag("y", false);
        let shown: Vec<_> = engine.sink().shown().map(|d| d.id.as_str().to_string()).collect();
        assert_eq!(shown, vec!["war"]);
        assert_eq!(engine.sink().materialized(), 2);
        assert_eq!(engine.sink().visible(), 1);
    }

    #[test]
    fn rows_map_back_to_levels() {
        let area = Rect::new(0, 0, 80, 11);
        assert_eq!(axis_row(area), 6);
        assert_eq!(slot_at_row(area, 5, 1.0, 1.0), Some((Lane::Above, 0)));
        assert_eq!(slot_at_row(area, 3, 1.0, 1.0), Some((Lane::Above, 2)));
        assert_eq!(slot_at_row(area, 7, 1.0, 1.0), Some((Lane::Below, 0)));
        assert_eq!(slot_at_row(area, 6, 1.0, 1.0), None);
    }

    #[test]
    fn canvas_draws_axis_and_titles() {
        let engine = engine();
        let area = Rect::new(0, 0, 120, 9);
        let mut buf = Buffer::empty(area);
        let palette = ThemeRegistry::default().palette(ThemeName::Dark);
        TimelineCanvas::new(&engine, palette).render(area, &mut buf);

        let rows: Vec<String> = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf.get(x, y).symbol().to_string())
                    .collect()
            })
            .collect();
        let axis = axis_row(area) as usize;
        assert!(rows[axis].contains('─'));
        assert!(rows[axis - 1].contains("Long"));
        assert!(rows[axis + 1].contains('◆'));
        assert!(rows[axis + 1].contains("Treaty"));
    }
}
