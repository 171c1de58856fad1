use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use super::dates::SECONDS_PER_DAY;
use super::item::NormalizedItem;

// Keeps `Duration::seconds_f64` far away from its overflow point; larger
// offsets saturate at the representable date range anyway.
const MAX_OFFSET_SECONDS: f64 = 1.0e15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

impl ZoomBounds {
    /// Swapped bounds are put back in order; a NaN bound collapses onto the
    /// other one.
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = match (min.is_nan(), max.is_nan()) {
            (true, true) => (0.0, f64::INFINITY),
            (true, false) => (max, max),
            (false, true) => (min, min),
            (false, false) => (min.min(max), min.max(max)),
        };
        Self { min, max }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// Converts between instants and horizontal offsets at `zoom` pixels per day,
/// measured from a fixed origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeMapper {
    origin: OffsetDateTime,
    horizon: OffsetDateTime,
    zoom: f64,
    bounds: ZoomBounds,
}

impl TimeMapper {
    pub fn new(
        origin: OffsetDateTime,
        horizon: OffsetDateTime,
        zoom: f64,
        bounds: ZoomBounds,
    ) -> Self {
        let horizon = horizon.max(origin);
        let zoom = if zoom.is_finite() {
            bounds.clamp(zoom)
        } else {
            bounds.min
        };
        Self {
            origin,
            horizon,
            zoom,
            bounds,
        }
    }

    /// Origin and horizon pad the item range by `buffer_days` on each side.
    /// With no items both collapse onto `now`.
    pub fn for_items(
        items: &[NormalizedItem],
        buffer_days: i64,
        now: OffsetDateTime,
        bounds: ZoomBounds,
    ) -> Self {
        let earliest = items.iter().map(|item| item.start).min();
        let latest = items.iter().map(NormalizedItem::latest).max();
        let (origin, horizon) = match (earliest, latest) {
            (Some(earliest), Some(latest)) => {
                let buffer = Duration::days(buffer_days);
                (
                    earliest.checked_sub(buffer).unwrap_or(earliest),
                    latest.checked_add(buffer).unwrap_or(latest),
                )
            }
            _ => (now, now),
        };
        Self::new(origin, horizon, bounds.min, bounds)
    }

    pub fn origin(&self) -> OffsetDateTime {
        self.origin
    }

    pub fn horizon(&self) -> OffsetDateTime {
        self.horizon
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn bounds(&self) -> ZoomBounds {
        self.bounds
    }

    /// Clamps into the zoom bounds and returns the applied value. Non-finite
    /// requests leave the zoom untouched.
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            self.zoom = self.bounds.clamp(zoom);
        } else {
            tracing::warn!(zoom, "ignoring non-finite zoom request");
        }
        self.zoom
    }

    /// Zoom at which `width` pixels show the whole span.
    pub fn fit_zoom(&self, width: f64) -> f64 {
        let days = self.span_days();
        if days <= 0.0 || !width.is_finite() || width <= 0.0 {
            return self.bounds.clamp(self.bounds.max);
        }
        self.bounds.clamp(width / days)
    }

    pub fn span_days(&self) -> f64 {
        days_between(self.origin, self.horizon)
    }

    pub fn content_width(&self) -> f64 {
        self.span_days() * self.zoom
    }

    pub fn to_pixel(&self, at: OffsetDateTime) -> f64 {
        days_between(self.origin, at) * self.zoom
    }

    pub fn to_date(&self, x: f64) -> OffsetDateTime {
        let seconds = (x / self.zoom * SECONDS_PER_DAY).clamp(-MAX_OFFSET_SECONDS, MAX_OFFSET_SECONDS);
        if seconds.is_nan() {
            return self.origin;
        }
        match self.origin.checked_add(Duration::seconds_f64(seconds)) {
            Some(at) => at,
            None if seconds < 0.0 => PrimitiveDateTime::MIN.assume_utc(),
            None => PrimitiveDateTime::MAX.assume_utc(),
        }
    }

    /// Fractional day count from the origin; what tick alignment works in.
    pub fn day_offset(&self, x: f64) -> f64 {
        x / self.zoom
    }
}

pub fn days_between(from: OffsetDateTime, to: OffsetDateTime) -> f64 {
    (to - from).as_seconds_f64() / SECONDS_PER_DAY
}
