//! Host-agnostic layout and viewport core.
//!
//! Records go in once through [`RenderCoordinator::new`]; every later change
//! to zoom, filter, scroll or selection produces a [`RenderFrame`] for the
//! host's [`RenderSink`].

pub mod animator;
pub mod config;
pub mod coordinator;
pub mod dates;
pub mod item;
pub mod lanes;
pub mod layout;
pub mod mapper;
pub mod palette;
pub mod tags;
pub mod ticks;

pub use animator::{FrameClock, FrameStatus, ManualClock, SystemClock, ZoomAnimator};
pub use config::{AnimationConfig, Easing, EngineConfig, LayoutMetrics, UntaggedPolicy};
pub use coordinator::{
    ElementOp, Invalidation, RenderCoordinator, RenderFrame, RenderSink, SelectionOrigin,
};
pub use item::{
    normalize_items, ItemError, ItemId, ItemKind, ItemReport, Lane, NormalizedItem, TimelineItem,
};
pub use layout::{derive_layout, visible_items, ItemDescriptor, Layout, ViewState};
pub use mapper::{TimeMapper, ZoomBounds};
pub use palette::Rgb;
pub use tags::{TagCatalog, TagFilter, TagInfo};
pub use ticks::{Granularity, Tick, Ticks, Window};
