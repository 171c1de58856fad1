use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Knobs for the layout engine. Units are "pixels", which a host maps onto
/// whatever it draws with (terminal columns for the bundled viewer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_factor: f64,
    /// Only used to pick an initial zoom at which the whole span roughly fits.
    pub container_width: f64,
    pub edge_buffer_days: i64,
    pub untagged: UntaggedPolicy,
    pub layout: LayoutMetrics,
    pub animation: AnimationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.01,
            max_zoom: 200.0,
            zoom_factor: 1.5,
            container_width: 1200.0,
            edge_buffer_days: 365,
            untagged: UntaggedPolicy::Show,
            layout: LayoutMetrics::default(),
            animation: AnimationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Metrics sized for a character grid, one column per pixel unit.
    pub fn terminal() -> Self {
        Self {
            container_width: 120.0,
            layout: LayoutMetrics::terminal(),
            ..Self::default()
        }
    }

    /// Repairs values that would make the engine misbehave, returning the
    /// names of the fields that were reset.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut repaired = Vec::new();
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            self.min_zoom = defaults.min_zoom;
            repaired.push("min_zoom");
        }
        if !(self.max_zoom.is_finite() && self.max_zoom >= self.min_zoom) {
            self.max_zoom = defaults.max_zoom.max(self.min_zoom);
            repaired.push("max_zoom");
        }
        if !(self.zoom_factor.is_finite() && self.zoom_factor > 1.0) {
            self.zoom_factor = defaults.zoom_factor;
            repaired.push("zoom_factor");
        }
        if !(self.container_width.is_finite() && self.container_width > 0.0) {
            self.container_width = defaults.container_width;
            repaired.push("container_width");
        }
        if self.edge_buffer_days < 0 {
            self.edge_buffer_days = defaults.edge_buffer_days;
            repaired.push("edge_buffer_days");
        }
        repaired.extend(self.layout.sanitize());
        if self.animation.duration_ms == 0 {
            self.animation.duration_ms = AnimationConfig::default().duration_ms;
            repaired.push("animation.duration_ms");
        }
        repaired
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutMetrics {
    /// Assumed horizontal footprint of a point event's label.
    pub event_width: f64,
    /// Gap kept free after every item on its stack level.
    pub padding: f64,
    pub min_period_width: f64,
    pub base_offset: f64,
    pub level_height: f64,
    pub tick_buffer_days: i64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            event_width: 140.0,
            padding: 10.0,
            min_period_width: 10.0,
            base_offset: 25.0,
            level_height: 38.0,
            tick_buffer_days: 50,
        }
    }
}

impl LayoutMetrics {
    pub fn terminal() -> Self {
        Self {
            event_width: 18.0,
            padding: 2.0,
            min_period_width: 1.0,
            base_offset: 1.0,
            level_height: 1.0,
            tick_buffer_days: 50,
        }
    }

    fn sanitize(&mut self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut repaired = Vec::new();
        let fields: [(&mut f64, f64, &'static str); 5] = [
            (&mut self.event_width, defaults.event_width, "layout.event_width"),
            (&mut self.padding, defaults.padding, "layout.padding"),
            (
                &mut self.min_period_width,
                defaults.min_period_width,
                "layout.min_period_width",
            ),
            (&mut self.base_offset, defaults.base_offset, "layout.base_offset"),
            (&mut self.level_height, defaults.level_height, "layout.level_height"),
        ];
        for (value, fallback, name) in fields {
            if !(value.is_finite() && *value >= 0.0) {
                *value = fallback;
                repaired.push(name);
            }
        }
        if self.tick_buffer_days < 0 {
            self.tick_buffer_days = defaults.tick_buffer_days;
            repaired.push("layout.tick_buffer_days");
        }
        repaired
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 400,
            easing: Easing::EaseInOutQuad,
        }
    }
}

/// Whether items without any tag survive the tag filter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UntaggedPolicy {
    #[default]
    Show,
    Hide,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Easing {
    Linear,
    #[default]
    EaseInOutQuad,
    EaseInOutCubic,
}

impl Easing {
    /// Maps linear progress in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let f = -2.0 * t + 2.0;
                    1.0 - f * f * f / 2.0
                }
            }
        }
    }
}
