use std::collections::HashSet;
use std::time::Duration;

use bitflags::bitflags;
use indexmap::IndexMap;
use time::OffsetDateTime;

use super::animator::{FrameStatus, ZoomAnimator};
use super::config::EngineConfig;
use super::item::{normalize_items, ItemId, ItemReport, Lane, NormalizedItem, TimelineItem};
use super::layout::{derive_layout, ItemDescriptor, Layout, ViewState};
use super::mapper::{TimeMapper, ZoomBounds};
use super::tags::{TagCatalog, TagFilter};
use super::ticks::{Granularity, Tick};

bitflags! {
    /// What caused a frame to be emitted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Invalidation: u8 {
        const ZOOM = 1 << 0;
        const FILTER = 1 << 1;
        const SCROLL = 1 << 2;
        const VIEWPORT = 1 << 3;
        const SELECTION = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementOp {
    Create(ItemDescriptor),
    Update(ItemDescriptor),
    /// The element stays materialized but must not be drawn.
    Hide(ItemId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub cause: Invalidation,
    pub zoom: f64,
    pub granularity: Option<Granularity>,
    pub content_width: f64,
    pub scroll_left: f64,
    pub viewport_width: f64,
    pub ops: Vec<ElementOp>,
    /// Number of items drawn after applying `ops`.
    pub visible: usize,
    pub ticks: Vec<Tick>,
    pub above_levels: usize,
    pub below_levels: usize,
}

/// Receives every frame the coordinator produces.
pub trait RenderSink {
    fn emit(&mut self, frame: &RenderFrame);
}

impl RenderSink for Vec<RenderFrame> {
    fn emit(&mut self, frame: &RenderFrame) {
        self.push(frame.clone());
    }
}

/// Where a selection came from, so hosts can place popups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOrigin {
    Pointer { x: f64, y: f64 },
    Keyboard,
}

pub type SelectHandler = Box<dyn FnMut(&NormalizedItem, SelectionOrigin)>;

#[derive(Debug, Clone)]
struct Element {
    descriptor: ItemDescriptor,
    shown: bool,
}

/// Last descriptor sent for every item that was ever materialized.
#[derive(Debug, Default)]
struct ElementCache {
    elements: IndexMap<ItemId, Element>,
}

impl ElementCache {
    fn reconcile(&mut self, layout: &Layout) -> Vec<ElementOp> {
        let mut ops = Vec::new();
        let mut seen = HashSet::with_capacity(layout.items.len());

        for descriptor in &layout.items {
            seen.insert(&descriptor.id);
            match self.elements.get_mut(&descriptor.id) {
                None => {
                    self.elements.insert(
                        descriptor.id.clone(),
                        Element {
                            descriptor: descriptor.clone(),
                            shown: true,
                        },
                    );
                    ops.push(ElementOp::Create(descriptor.clone()));
                }
                Some(element) if !element.shown || element.descriptor != *descriptor => {
                    element.descriptor = descriptor.clone();
                    element.shown = true;
                    ops.push(ElementOp::Update(descriptor.clone()));
                }
                Some(_) => {}
            }
        }

        for (id, element) in self.elements.iter_mut() {
            if element.shown && !seen.contains(id) {
                element.shown = false;
                ops.push(ElementOp::Hide(id.clone()));
            }
        }
        ops
    }
}

/// Owns items, zoom, filter, scroll and selection, and turns every change
/// into a [`RenderFrame`] for its sink.
pub struct RenderCoordinator<S> {
    config: EngineConfig,
    items: Vec<NormalizedItem>,
    index: IndexMap<ItemId, usize>,
    rejected: Vec<ItemReport>,
    defaulted: Vec<ItemReport>,
    catalog: TagCatalog,
    mapper: TimeMapper,
    view: ViewState,
    animator: ZoomAnimator,
    layout: Layout,
    cache: ElementCache,
    on_select: Option<SelectHandler>,
    sink: S,
}

impl<S: RenderSink> RenderCoordinator<S> {
    /// Normalizes `records`, activates every tag, picks a zoom at which the
    /// whole span fits `config.container_width` and emits the first frame.
    pub fn new(records: Vec<TimelineItem>, mut config: EngineConfig, now: OffsetDateTime, sink: S) -> Self {
        for field in config.sanitize() {
            tracing::warn!(field, "invalid engine setting, using default");
        }
        let normalized = normalize_items(records, now);
        let catalog = TagCatalog::from_items(&normalized.items);
        let bounds = ZoomBounds::new(config.min_zoom, config.max_zoom);
        let mut mapper =
            TimeMapper::for_items(&normalized.items, config.edge_buffer_days, now, bounds);
        mapper.set_zoom(mapper.fit_zoom(config.container_width));

        let index = normalized
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id.clone(), position))
            .collect();
        let view = ViewState {
            filter: TagFilter::all(&catalog, config.untagged),
            scroll_left: 0.0,
            viewport_width: config.container_width,
            selected: None,
        };

        tracing::debug!(
            items = normalized.items.len(),
            tags = catalog.len(),
            zoom = mapper.zoom(),
            "timeline engine ready"
        );

        let mut coordinator = Self {
            animator: ZoomAnimator::new(&config.animation),
            config,
            items: normalized.items,
            index,
            rejected: normalized.rejected,
            defaulted: normalized.defaulted,
            catalog,
            mapper,
            view,
            layout: Layout::default(),
            cache: ElementCache::default(),
            on_select: None,
            sink,
        };
        coordinator.render(Invalidation::all());
        coordinator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn items(&self) -> &[NormalizedItem] {
        &self.items
    }

    pub fn item(&self, id: &ItemId) -> Option<&NormalizedItem> {
        self.index.get(id).and_then(|&position| self.items.get(position))
    }

    /// Records dropped during normalization.
    pub fn rejected(&self) -> &[ItemReport] {
        &self.rejected
    }

    /// Records kept with a defaulted field.
    pub fn defaulted(&self) -> &[ItemReport] {
        &self.defaulted
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn mapper(&self) -> &TimeMapper {
        &self.mapper
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn zoom(&self) -> f64 {
        self.mapper.zoom()
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_active()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn on_select<F>(&mut self, handler: F)
    where
        F: FnMut(&NormalizedItem, SelectionOrigin) + 'static,
    {
        self.on_select = Some(Box::new(handler));
    }

    // --- filter -------------------------------------------------------

    pub fn set_active_tags<I, T>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let changed = self.view.filter.replace(tags);
        if changed {
            self.filter_changed();
        }
        changed
    }

    pub fn toggle_tag(&mut self, tag: &str, on: bool) -> bool {
        let changed = self.view.filter.set(tag, on);
        if changed {
            self.filter_changed();
        }
        changed
    }

    pub fn set_all_tags(&mut self, on: bool) -> bool {
        let tags: Vec<String> = if on {
            self.catalog.names().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        self.set_active_tags(tags)
    }

    fn filter_changed(&mut self) {
        let mut cause = Invalidation::FILTER;
        let hidden = self
            .view
            .selected
            .as_ref()
            .and_then(|id| self.item(id))
            .is_some_and(|item| !self.view.filter.admits(item));
        if hidden {
            self.view.selected = None;
            cause |= Invalidation::SELECTION;
        }
        self.render(cause);
    }

    // --- zoom ---------------------------------------------------------

    /// Jumps straight to `zoom`, keeping the centered date in place.
    /// Cancels any running animation.
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.animator.cancel();
        let center = self.center_date();
        self.apply_zoom(zoom, center);
        self.render(Invalidation::ZOOM | Invalidation::SCROLL);
        self.mapper.zoom()
    }

    pub fn animate_zoom_to(&mut self, target: f64) -> bool {
        let center = self.center_date();
        self.animate_zoom_around(target, center)
    }

    /// Starts interpolating towards `target`, recentering on `center` every
    /// frame. Returns false when there is nothing to animate.
    pub fn animate_zoom_around(&mut self, target: f64, center: OffsetDateTime) -> bool {
        if !target.is_finite() {
            tracing::warn!(target, "ignoring non-finite zoom target");
            return false;
        }
        let target = self.mapper.bounds().clamp(target);
        let current = self.mapper.zoom();
        if target == current && !self.animator.is_active() {
            return false;
        }
        self.animator.start(current, target, center);
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.animate_zoom_to(self.mapper.zoom() * self.config.zoom_factor)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.animate_zoom_to(self.mapper.zoom() / self.config.zoom_factor)
    }

    /// Animates to the zoom at which the whole span fits the viewport,
    /// centered on the middle of the span.
    pub fn fit_all(&mut self) -> bool {
        let target = self.mapper.fit_zoom(self.view.viewport_width);
        let middle = self.mapper.to_date(self.mapper.content_width() / 2.0);
        if target == self.mapper.zoom() && !self.animator.is_active() {
            self.center_on(middle);
            return false;
        }
        self.animate_zoom_around(target, middle)
    }

    /// Advances the running animation to `now`.
    pub fn on_frame(&mut self, now: Duration) -> FrameStatus {
        let Some(sample) = self.animator.sample(now) else {
            return FrameStatus::Idle;
        };
        self.apply_zoom(sample.zoom, sample.center);
        self.render(Invalidation::ZOOM | Invalidation::SCROLL);
        if sample.finished {
            FrameStatus::Idle
        } else {
            FrameStatus::Animating
        }
    }

    fn apply_zoom(&mut self, zoom: f64, center: OffsetDateTime) {
        self.mapper.set_zoom(zoom);
        let left = self.mapper.to_pixel(center) - self.view.viewport_width / 2.0;
        self.view.scroll_left = self.clamp_scroll(left);
    }

    // --- scroll -------------------------------------------------------

    pub fn max_scroll(&self) -> f64 {
        (self.mapper.content_width() - self.view.viewport_width).max(0.0)
    }

    fn clamp_scroll(&self, left: f64) -> f64 {
        if left.is_nan() {
            return 0.0;
        }
        left.clamp(0.0, self.max_scroll())
    }

    pub fn set_scroll(&mut self, left: f64) -> f64 {
        let left = self.clamp_scroll(left);
        if left != self.view.scroll_left {
            self.view.scroll_left = left;
            self.render(Invalidation::SCROLL);
        }
        left
    }

    pub fn scroll_by(&mut self, delta: f64) -> f64 {
        self.set_scroll(self.view.scroll_left + delta)
    }

    pub fn center_on(&mut self, at: OffsetDateTime) -> f64 {
        self.set_scroll(self.mapper.to_pixel(at) - self.view.viewport_width / 2.0)
    }

    pub fn center_date(&self) -> OffsetDateTime {
        self.mapper
            .to_date(self.view.scroll_left + self.view.viewport_width / 2.0)
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        if !width.is_finite() || width < 0.0 || width == self.view.viewport_width {
            return;
        }
        self.view.viewport_width = width;
        self.view.scroll_left = self.clamp_scroll(self.view.scroll_left);
        self.render(Invalidation::VIEWPORT);
    }

    // --- selection ----------------------------------------------------

    pub fn selected(&self) -> Option<&NormalizedItem> {
        self.view.selected.as_ref().and_then(|id| self.item(id))
    }

    /// Highlights a visible item and hands it to the selection handler.
    pub fn select(&mut self, id: &ItemId, origin: SelectionOrigin) -> bool {
        if self.layout.descriptor(id).is_none() {
            return false;
        }
        if self.view.selected.as_ref() != Some(id) {
            self.view.selected = Some(id.clone());
            self.render(Invalidation::SELECTION);
        }
        self.dispatch_selected(origin);
        true
    }

    pub fn clear_selection(&mut self) {
        if self.view.selected.take().is_some() {
            self.render(Invalidation::SELECTION);
        }
    }

    pub fn select_next(&mut self) -> Option<ItemId> {
        self.step_selection(true)
    }

    pub fn select_previous(&mut self) -> Option<ItemId> {
        self.step_selection(false)
    }

    /// Fires the selection handler for the highlighted item.
    pub fn activate_selected(&mut self, origin: SelectionOrigin) -> bool {
        self.dispatch_selected(origin)
    }

    fn dispatch_selected(&mut self, origin: SelectionOrigin) -> bool {
        let Some(position) = self
            .view
            .selected
            .as_ref()
            .and_then(|id| self.index.get(id).copied())
        else {
            return false;
        };
        match (self.on_select.as_mut(), self.items.get(position)) {
            (Some(handler), Some(item)) => {
                handler(item, origin);
                true
            }
            _ => false,
        }
    }

    fn step_selection(&mut self, forward: bool) -> Option<ItemId> {
        let count = self.layout.items.len();
        if count == 0 {
            return None;
        }
        let current = self
            .view
            .selected
            .as_ref()
            .and_then(|id| self.layout.position_of(id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => count - 1,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        };
        let descriptor = &self.layout.items[next];
        let id = descriptor.id.clone();
        let mut cause = Invalidation::SELECTION;

        let left = self.view.scroll_left;
        let right = left + self.view.viewport_width;
        let extent = descriptor.width.unwrap_or(self.config.layout.event_width);
        if descriptor.start_px < left || descriptor.start_px + extent.min(self.view.viewport_width) > right {
            let target = self.clamp_scroll(descriptor.start_px - self.view.viewport_width / 2.0);
            if target != left {
                self.view.scroll_left = target;
                cause |= Invalidation::SCROLL;
            }
        }

        self.view.selected = Some(id.clone());
        self.render(cause);
        Some(id)
    }

    /// Topmost visible item drawn at `x` on `level` of `lane`.
    pub fn item_at(&self, x: f64, lane: Lane, level: usize) -> Option<&ItemDescriptor> {
        let event_width = self.config.layout.event_width;
        self.layout.items.iter().rev().find(|descriptor| {
            let width = descriptor.width.unwrap_or(event_width);
            descriptor.lane == lane
                && descriptor.stack_level == level
                && x >= descriptor.start_px
                && x <= descriptor.start_px + width
        })
    }

    // --- rendering ----------------------------------------------------

    /// Re-derives the layout and emits a frame tagged with `cause`.
    pub fn render(&mut self, cause: Invalidation) {
        let layout = derive_layout(&self.items, &self.view, &self.mapper, &self.config.layout);
        let ops = self.cache.reconcile(&layout);
        let frame = RenderFrame {
            cause,
            zoom: self.mapper.zoom(),
            granularity: layout.granularity,
            content_width: layout.content_width,
            scroll_left: self.view.scroll_left,
            viewport_width: self.view.viewport_width,
            ops,
            visible: layout.items.len(),
            ticks: layout.ticks.clone(),
            above_levels: layout.above_levels,
            below_levels: layout.below_levels,
        };
        tracing::trace!(?cause, ops = frame.ops.len(), visible = frame.visible, "render");
        self.sink.emit(&frame);
        self.layout = layout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::animator::{FrameClock, ManualClock};
    use crate::engine::mapper::days_between;
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

    fn records() -> Vec<TimelineItem> {
        serde_json::from_value(serde_json::json!([
            {"id": "calc", "title": "Calculus", "type": "period", "start": "2000-01-01", "end": "2010-01-01", "tags": ["math"]},
            {"id": "apollo", "title": "Moon landing", "type": "event", "start": "2005-07-20", "tags": ["space"]},
            {"id": "both", "title": "Orbital mechanics", "type": "event", "start": "2009-06-01", "tags": ["math", "space"]}
        ]))
        .expect("records")
    }

    fn coordinator() -> RenderCoordinator<Vec<RenderFrame>> {
        RenderCoordinator::new(records(), EngineConfig::default(), NOW, Vec::new())
    }

    #[test]
    fn first_frame_creates_every_visible_element() {
        let engine = coordinator();
        let frames = engine.sink();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].cause, Invalidation::all());
        assert_eq!(frames[0].ops.len(), 3);
        assert!(frames[0].ops.iter().all(|op| matches!(op, ElementOp::Create(_))));
        assert_eq!(engine.view().scroll_left, 0.0);
    }

    #[test]
    fn unsanitized_zoom_bounds_are_repaired() {
        let config = EngineConfig {
            min_zoom: 5.0,
            max_zoom: 1.0,
            ..EngineConfig::default()
        };
        let mut engine = RenderCoordinator::new(records(), config, NOW, Vec::new());
        assert_eq!(engine.config().min_zoom, 5.0);
        assert_eq!(engine.config().max_zoom, 200.0);
        assert_eq!(engine.set_zoom(1_000.0), 200.0);
        assert_eq!(engine.set_zoom(0.5), 5.0);

        let empty = RenderCoordinator::new(Vec::new(), config_with(f64::NAN, -1.0), NOW, Vec::new());
        assert!(empty.zoom() > 0.0);
    }

    fn config_with(min_zoom: f64, max_zoom: f64) -> EngineConfig {
        EngineConfig {
            min_zoom,
            max_zoom,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn initial_zoom_fits_container() {
        let engine = coordinator();
        let expected = 1200.0 / engine.mapper().span_days();
        assert!((engine.zoom() - expected).abs() < 1e-12);
        assert!((engine.mapper().content_width() - 1200.0).abs() < 1e-6);
    }

    #[test]
    fn hiding_then_showing_reuses_elements() {
        let mut engine = coordinator();
        assert!(engine.toggle_tag("space", false));
        let hide = engine.sink().last().expect("frame").clone();
        assert_eq!(hide.cause, Invalidation::FILTER);
        assert_eq!(hide.ops, vec![ElementOp::Hide(ItemId::new("apollo"))]);

        assert!(engine.toggle_tag("space", true));
        let show = engine.sink().last().expect("frame");
        assert_eq!(show.ops.len(), 1);
        assert_matches!(&show.ops[0], ElementOp::Update(d) if d.id.as_str() == "apollo");
    }

    #[test]
    fn no_op_mutations_emit_nothing() {
        let mut engine = coordinator();
        assert!(!engine.toggle_tag("math", true));
        assert!(!engine.set_active_tags(["math", "space"]));
        engine.set_scroll(-50.0);
        assert_eq!(engine.sink().len(), 1);
    }

    #[test]
    fn scrolling_moves_ticks_not_elements() {
        let mut engine = coordinator();
        engine.set_zoom(1.0);
        let before = engine.view().scroll_left;
        let scrolled = engine.scroll_by(400.0);
        assert_eq!(scrolled, before + 400.0);
        let frame = engine.sink().last().expect("frame");
        assert_eq!(frame.cause, Invalidation::SCROLL);
        assert!(frame.ops.is_empty());
        assert!(!frame.ticks.is_empty());
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut engine = coordinator();
        engine.set_zoom(1.0);
        let max = engine.max_scroll();
        assert_eq!(engine.set_scroll(f64::MAX), max);
        assert_eq!(engine.set_scroll(-1.0), 0.0);
    }

    #[test]
    fn selection_reaches_handler_with_origin() {
        let mut engine = coordinator();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_select(move |item, origin| sink.borrow_mut().push((item.id.clone(), origin)));

        let origin = SelectionOrigin::Pointer { x: 12.0, y: 3.0 };
        assert!(engine.select(&ItemId::new("calc"), origin));
        assert_eq!(seen.borrow().as_slice(), &[(ItemId::new("calc"), origin)]);
        let frame = engine.sink().last().expect("frame");
        assert_matches!(&frame.ops[0], ElementOp::Update(d) if d.is_selected);
    }

    #[test]
    fn filtering_out_the_selection_clears_it() {
        let mut engine = coordinator();
        engine.select(&ItemId::new("apollo"), SelectionOrigin::Keyboard);
        engine.toggle_tag("space", false);
        assert!(engine.selected().is_none());
        let frame = engine.sink().last().expect("frame");
        assert_eq!(frame.cause, Invalidation::FILTER | Invalidation::SELECTION);
    }

    #[test]
    fn keyboard_traversal_wraps_in_start_order() {
        let mut engine = coordinator();
        let order: Vec<_> = (0..4)
            .filter_map(|_| engine.select_next())
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["calc", "apollo", "both", "calc"]);
        assert_eq!(engine.select_previous().map(|id| id.to_string()), Some("both".into()));
    }

    #[test]
    fn animation_keeps_center_date_fixed() {
        let clock = ManualClock::default();
        let mut engine = coordinator();
        let center = engine.center_date();
        let target = engine.zoom() * 1.5;
        assert!(engine.zoom_in());

        let mut frames = 0;
        while engine.on_frame(clock.now()) == FrameStatus::Animating {
            let drift = days_between(center, engine.center_date()).abs();
            assert!(drift < 1e-6, "center drifted by {drift} days");
            clock.advance(Duration::from_millis(16));
            frames += 1;
        }
        assert!(frames > 10);
        assert!((engine.zoom() - target).abs() < 1e-12);
        assert!(!engine.is_animating());
    }

    #[test]
    fn zooming_into_the_wall_stops_there() {
        let clock = ManualClock::default();
        let mut engine = coordinator();
        engine.set_zoom(150.0);
        assert!(engine.zoom_in());
        engine.on_frame(clock.now());
        clock.advance(Duration::from_millis(500));
        assert_eq!(engine.on_frame(clock.now()), FrameStatus::Idle);
        assert_eq!(engine.zoom(), 200.0);
        assert!(!engine.zoom_in());
    }

    #[test]
    fn hit_testing_uses_last_layout() {
        let mut engine = coordinator();
        engine.set_zoom(1.0);
        let calc = engine
            .layout()
            .descriptor(&ItemId::new("calc"))
            .expect("calc")
            .clone();
        let hit = engine.item_at(calc.start_px + 5.0, Lane::Above, 0);
        assert_eq!(hit.map(|d| d.id.clone()), Some(calc.id));
        assert!(engine.item_at(calc.start_px - 5.0, Lane::Above, 0).is_none());
    }

    #[test]
    fn empty_timeline_renders() {
        let engine = RenderCoordinator::new(Vec::new(), EngineConfig::default(), NOW, Vec::new());
        let frame = engine.sink().last().expect("frame");
        assert_eq!(frame.visible, 0);
        assert_eq!(frame.content_width, 0.0);
        assert_eq!(engine.mapper().origin(), NOW);
    }
}
