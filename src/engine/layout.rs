//! Pure derivations from engine state to what a host should draw.

use serde::Serialize;

use super::config::LayoutMetrics;
use super::item::{ItemId, ItemKind, Lane, NormalizedItem};
use super::lanes::assign_lanes;
use super::mapper::TimeMapper;
use super::palette::Rgb;
use super::tags::TagFilter;
use super::ticks::{Granularity, Tick, Ticks, Window};

/// Everything a render depends on besides the items and the mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub filter: TagFilter,
    pub scroll_left: f64,
    pub viewport_width: f64,
    pub selected: Option<ItemId>,
}

impl ViewState {
    pub fn window(&self) -> Window {
        Window::new(self.scroll_left, self.viewport_width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDescriptor {
    pub id: ItemId,
    pub kind: ItemKind,
    pub lane: Lane,
    pub stack_level: usize,
    pub start_px: f64,
    /// `None` for point events, whose width is up to the host.
    pub width: Option<f64>,
    /// Distance from the axis: base offset plus one level height per level.
    pub offset: f64,
    pub color: Rgb,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    /// Visible items in start order.
    pub items: Vec<ItemDescriptor>,
    pub ticks: Vec<Tick>,
    pub granularity: Option<Granularity>,
    pub content_width: f64,
    pub above_levels: usize,
    pub below_levels: usize,
}

impl Layout {
    pub fn descriptor(&self, id: &ItemId) -> Option<&ItemDescriptor> {
        self.items.iter().find(|d| &d.id == id)
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|d| &d.id == id)
    }
}

pub fn visible_items<'a>(items: &'a [NormalizedItem], filter: &TagFilter) -> Vec<&'a NormalizedItem> {
    items.iter().filter(|item| filter.admits(item)).collect()
}

pub fn derive_layout(
    items: &[NormalizedItem],
    view: &ViewState,
    mapper: &TimeMapper,
    metrics: &LayoutMetrics,
) -> Layout {
    let visible = visible_items(items, &view.filter);
    let lanes = assign_lanes(&visible, mapper, metrics);

    let descriptors = visible
        .iter()
        .zip(&lanes.slots)
        .map(|(item, slot)| {
            let width = match item.kind {
                ItemKind::Period if item.end.is_some() => Some(
                    (slot.extent.end - slot.extent.start).max(metrics.min_period_width),
                ),
                _ => None,
            };
            ItemDescriptor {
                id: item.id.clone(),
                kind: item.kind,
                lane: slot.lane,
                stack_level: slot.level,
                start_px: slot.extent.start,
                width,
                offset: metrics.base_offset + slot.level as f64 * metrics.level_height,
                color: item.color,
                is_selected: view.selected.as_ref() == Some(&item.id),
            }
        })
        .collect();

    let ticks = Ticks::new(mapper, view.window(), metrics.tick_buffer_days);
    let granularity = ticks.granularity();

    Layout {
        items: descriptors,
        ticks: ticks.collect(),
        granularity: Some(granularity),
        content_width: mapper.content_width(),
        above_levels: lanes.above_levels,
        below_levels: lanes.below_levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::UntaggedPolicy;
    use crate::engine::item::{normalize_items, TimelineItem};
    use crate::engine::mapper::ZoomBounds;
    use time::macros::datetime;

    fn fixture() -> (Vec<NormalizedItem>, TimeMapper) {
        let records: Vec<TimelineItem> = serde_json::from_value(serde_json::json!([
            {"id": "p", "title": "Period", "type": "period", "start": "2020-01-01", "end": "2020-06-01", "tags": ["a"]},
            {"id": "e", "title": "Event", "type": "event", "start": "2020-03-01", "tags": ["a"]},
            {"id": "r", "title": "Reversed", "type": "period", "start": "2020-05-01", "end": "2020-04-01", "tags": ["b"]}
        ]))
        .expect("records");
        let items = normalize_items(records, datetime!(2024-01-01 0:00 UTC)).items;
        let mut mapper = TimeMapper::for_items(
            &items,
            365,
            datetime!(2024-01-01 0:00 UTC),
            ZoomBounds::new(0.01, 200.0),
        );
        mapper.set_zoom(1.0);
        (items, mapper)
    }

    fn view(tags: &[&str]) -> ViewState {
        ViewState {
            filter: TagFilter::new(tags.iter().copied(), UntaggedPolicy::Show),
            scroll_left: 0.0,
            viewport_width: 800.0,
            selected: Some(ItemId::new("e")),
        }
    }

    #[test]
    fn period_width_spans_its_dates() {
        let (items, mapper) = fixture();
        let layout = derive_layout(&items, &view(&["a"]), &mapper, &LayoutMetrics::default());
        let period = layout.descriptor(&ItemId::new("p")).expect("period");
        assert_eq!(period.lane, Lane::Above);
        assert_eq!(period.width, Some(152.0));
        assert_eq!(period.offset, 25.0);
        let event = layout.descriptor(&ItemId::new("e")).expect("event");
        assert_eq!(event.width, None);
        assert!(event.is_selected);
        assert!(!period.is_selected);
    }

    #[test]
    fn reversed_period_is_clamped_to_minimum_width() {
        let (items, mapper) = fixture();
        let layout = derive_layout(&items, &view(&["b"]), &mapper, &LayoutMetrics::default());
        assert_eq!(layout.items.len(), 1);
        assert_eq!(layout.items[0].width, Some(10.0));
    }

    #[test]
    fn ticks_and_width_follow_mapper() {
        let (items, mapper) = fixture();
        let layout = derive_layout(&items, &view(&["a"]), &mapper, &LayoutMetrics::default());
        assert_eq!(layout.granularity, Some(Granularity::Month));
        assert_eq!(layout.content_width, mapper.content_width());
        assert!(!layout.ticks.is_empty());
    }
}
