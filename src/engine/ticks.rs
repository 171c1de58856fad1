use serde::Serialize;
use strum::{Display, EnumIter};
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use super::mapper::TimeMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
    Decade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Year,
    MonthYear,
    MonthDay,
}

impl Granularity {
    /// Step function over pixels per day.
    pub fn for_zoom(zoom: f64) -> Self {
        if zoom >= 20.0 {
            Granularity::Day
        } else if zoom >= 5.0 {
            Granularity::Week
        } else if zoom >= 1.0 {
            Granularity::Month
        } else if zoom >= 0.1 {
            Granularity::Year
        } else {
            Granularity::Decade
        }
    }

    pub fn step_days(self) -> i64 {
        match self {
            Granularity::Day => 1,
            Granularity::Week => 7,
            Granularity::Month => 30,
            Granularity::Year => 365,
            Granularity::Decade => 3650,
        }
    }

    pub fn label_style(self) -> LabelStyle {
        match self {
            Granularity::Day | Granularity::Week => LabelStyle::MonthDay,
            Granularity::Month => LabelStyle::MonthYear,
            Granularity::Year | Granularity::Decade => LabelStyle::Year,
        }
    }
}

impl LabelStyle {
    /// English default; hosts wanting localized text format `Tick::date`.
    pub fn format(self, date: OffsetDateTime) -> String {
        let formatted = match self {
            LabelStyle::Year => return date.year().to_string(),
            LabelStyle::MonthYear => date.format(format_description!("[month repr:short] [year]")),
            LabelStyle::MonthDay => {
                date.format(format_description!("[month repr:short] [day padding:none]"))
            }
        };
        formatted.unwrap_or_else(|_| date.year().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub position: f64,
    /// Whole days from the mapper origin; always a multiple of the step.
    pub day: i64,
    #[serde(skip)]
    pub date: OffsetDateTime,
    pub granularity: Granularity,
    pub label: String,
}

/// The visible pixel window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub left: f64,
    pub width: f64,
}

impl Window {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Lazily walks the ticks covering `window` plus `buffer_days` on both
/// sides, clipped to the mapper's span.
#[derive(Debug, Clone)]
pub struct Ticks {
    origin: OffsetDateTime,
    zoom: f64,
    granularity: Granularity,
    next_day: i64,
    last_day: i64,
}

impl Ticks {
    pub fn new(mapper: &TimeMapper, window: Window, buffer_days: i64) -> Self {
        let zoom = mapper.zoom();
        let granularity = Granularity::for_zoom(zoom);
        let step = granularity.step_days();

        let first_visible = mapper.day_offset(window.left).floor() as i64;
        let last_visible = mapper.day_offset(window.right()).ceil() as i64;
        let span = mapper.span_days().floor() as i64;

        let loop_start = first_visible.saturating_sub(buffer_days).max(0);
        let last_day = last_visible.saturating_add(buffer_days).min(span);
        let next_day = loop_start - loop_start.rem_euclid(step);

        Self {
            origin: mapper.origin(),
            zoom,
            granularity,
            next_day,
            last_day,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }
}

impl Iterator for Ticks {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.next_day > self.last_day {
            return None;
        }
        let day = self.next_day;
        self.next_day += self.granularity.step_days();
        let date = self
            .origin
            .checked_add(Duration::days(day))
            .unwrap_or(self.origin);
        Some(Tick {
            position: day as f64 * self.zoom,
            day,
            date,
            granularity: self.granularity,
            label: self.granularity.label_style().format(date),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mapper::ZoomBounds;
    use time::macros::datetime;

    fn mapper(zoom: f64) -> TimeMapper {
        TimeMapper::new(
            datetime!(2019-01-01 0:00 UTC),
            datetime!(2021-01-01 0:00 UTC),
            zoom,
            ZoomBounds::new(0.01, 200.0),
        )
    }

    #[test]
    fn granularity_steps_with_zoom() {
        assert_eq!(Granularity::for_zoom(50.0), Granularity::Day);
        assert_eq!(Granularity::for_zoom(20.0), Granularity::Day);
        assert_eq!(Granularity::for_zoom(7.0), Granularity::Week);
        assert_eq!(Granularity::for_zoom(1.0), Granularity::Month);
        assert_eq!(Granularity::for_zoom(0.05), Granularity::Decade);
        assert_eq!(Granularity::for_zoom(0.1), Granularity::Year);
    }

    #[test]
    fn ticks_are_aligned_to_step_from_origin() {
        let m = mapper(10.0);
        let ticks: Vec<_> = Ticks::new(&m, Window::new(1_234.0, 300.0), 50).collect();
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|t| t.day % 7 == 0));
        assert!(ticks.iter().all(|t| t.granularity == Granularity::Week));
        assert!(ticks.first().map(|t| t.position <= 1_234.0).unwrap_or(false));
    }

    #[test]
    fn scrolling_does_not_shift_shared_ticks() {
        let m = mapper(10.0);
        let a: Vec<_> = Ticks::new(&m, Window::new(1_000.0, 400.0), 50).collect();
        let b: Vec<_> = Ticks::new(&m, Window::new(1_013.0, 400.0), 50).collect();
        let shared: Vec<_> = a.iter().filter(|t| b.contains(t)).collect();
        assert!(shared.len() > 5);
    }

    #[test]
    fn work_is_bounded_by_window_not_span() {
        let m = mapper(200.0);
        let count = Ticks::new(&m, Window::new(50_000.0, 800.0), 50).count();
        // 4 visible days plus 50 on each side
        assert!(count <= 106, "generated {count} ticks");
    }

    #[test]
    fn ticks_stay_inside_span() {
        let m = mapper(1.0);
        let ticks: Vec<_> = Ticks::new(&m, Window::new(0.0, 10_000.0), 50).collect();
        assert_eq!(ticks.first().map(|t| t.day), Some(0));
        assert!(ticks.iter().all(|t| t.day as f64 <= m.span_days()));
    }

    #[test]
    fn labels_follow_granularity() {
        let date = datetime!(2020-03-05 0:00 UTC);
        assert_eq!(LabelStyle::Year.format(date), "2020");
        assert_eq!(LabelStyle::MonthYear.format(date), "Mar 2020");
        assert_eq!(LabelStyle::MonthDay.format(date), "Mar 5");
    }
}
