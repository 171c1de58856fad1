use std::cell::Cell;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use super::config::{AnimationConfig, Easing};

/// Source of frame timestamps. Hosts pass real time; tests advance a
/// [`ManualClock`] so animations run deterministically.
pub trait FrameClock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for SystemClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) -> Duration {
        let next = self.now.get() + by;
        self.now.set(next);
        next
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// What the host should do after delivering a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// An animation is still running; schedule another frame.
    Animating,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSample {
    pub zoom: f64,
    pub center: OffsetDateTime,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ZoomAnimation {
    from: f64,
    to: f64,
    center: OffsetDateTime,
    /// Set by the first frame delivered after the request.
    started_at: Option<Duration>,
}

/// Time-boxed interpolation between zoom levels. At most one animation is
/// in flight; a new request replaces it, starting from wherever the zoom
/// currently is.
#[derive(Debug, Clone)]
pub struct ZoomAnimator {
    duration: Duration,
    easing: Easing,
    active: Option<ZoomAnimation>,
}

impl ZoomAnimator {
    pub fn new(config: &AnimationConfig) -> Self {
        Self {
            duration: Duration::from_millis(config.duration_ms),
            easing: config.easing,
            active: None,
        }
    }

    pub fn start(&mut self, from: f64, to: f64, center: OffsetDateTime) {
        tracing::debug!(from, to, "starting zoom animation");
        self.active = Some(ZoomAnimation {
            from,
            to,
            center,
            started_at: None,
        });
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<f64> {
        self.active.as_ref().map(|animation| animation.to)
    }

    /// Interpolated zoom for the frame at `now`, or `None` when idle.
    /// The sample that reaches the target also ends the animation.
    pub fn sample(&mut self, now: Duration) -> Option<ZoomSample> {
        let animation = self.active.as_mut()?;
        let started_at = *animation.started_at.get_or_insert(now);
        let elapsed = now.saturating_sub(started_at);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        let eased = self.easing.apply(progress);
        let finished = progress >= 1.0;
        let zoom = if finished {
            animation.to
        } else {
            animation.from + (animation.to - animation.from) * eased
        };
        let sample = ZoomSample {
            zoom,
            center: animation.center,
            finished,
        };
        if finished {
            self.active = None;
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const CENTER: OffsetDateTime = datetime!(2020-01-01 0:00 UTC);

    fn animator() -> ZoomAnimator {
        ZoomAnimator::new(&AnimationConfig {
            duration_ms: 400,
            easing: Easing::Linear,
        })
    }

    #[test]
    fn clock_starts_at_first_frame() {
        let clock = ManualClock::default();
        clock.advance(Duration::from_secs(10));
        let mut animator = animator();
        animator.start(1.0, 3.0, CENTER);
        let first = animator.sample(clock.now()).expect("first frame");
        assert_eq!(first.zoom, 1.0);
        let mid = animator.sample(clock.advance(Duration::from_millis(200))).expect("mid");
        assert!((mid.zoom - 2.0).abs() < 1e-9);
        assert!(!mid.finished);
    }

    #[test]
    fn finishes_exactly_on_target() {
        let clock = ManualClock::default();
        let mut animator = animator();
        animator.start(1.0, 3.0, CENTER);
        animator.sample(clock.now());
        let last = animator
            .sample(clock.advance(Duration::from_millis(450)))
            .expect("final frame");
        assert!(last.finished);
        assert_eq!(last.zoom, 3.0);
        assert!(!animator.is_active());
        assert_eq!(animator.sample(clock.advance(Duration::from_millis(16))), None);
    }

    #[test]
    fn restart_replaces_in_flight_target() {
        let clock = ManualClock::default();
        let mut animator = animator();
        animator.start(1.0, 3.0, CENTER);
        animator.sample(clock.now());
        let mid = animator
            .sample(clock.advance(Duration::from_millis(100)))
            .expect("mid");
        animator.start(mid.zoom, 0.5, CENTER);
        assert_eq!(animator.target(), Some(0.5));
        let restarted = animator
            .sample(clock.advance(Duration::from_millis(16)))
            .expect("restart");
        assert_eq!(restarted.zoom, mid.zoom);
    }
}
