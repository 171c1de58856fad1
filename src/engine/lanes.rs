//! Stack level assignment within the two lanes.
//!
//! Each lane is colored independently with a first-fit pass over items in
//! start order: an item takes the lowest level that became free strictly
//! before the item starts, or opens a new level. Replaying the same sorted
//! input always yields the same levels.

use super::config::LayoutMetrics;
use super::item::{ItemKind, Lane, NormalizedItem};
use super::mapper::TimeMapper;

/// Horizontal footprint of an item on its level, padding included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub start: f64,
    pub end: f64,
    pub padded_end: f64,
}

impl Extent {
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.start <= other.padded_end && other.start <= self.padded_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub lane: Lane,
    pub level: usize,
    pub extent: Extent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneAssignment {
    /// Parallel to the input slice.
    pub slots: Vec<Slot>,
    pub above_levels: usize,
    pub below_levels: usize,
}

impl LaneAssignment {
    pub fn levels(&self, lane: Lane) -> usize {
        match lane {
            Lane::Above => self.above_levels,
            Lane::Below => self.below_levels,
        }
    }
}

pub fn extent_of(item: &NormalizedItem, mapper: &TimeMapper, metrics: &LayoutMetrics) -> Extent {
    let start = mapper.to_pixel(item.start);
    let end = match (item.kind, item.end) {
        // reserve at least the bar that gets drawn, even for reversed periods
        (ItemKind::Period, Some(end)) => mapper.to_pixel(end).max(start + metrics.min_period_width),
        _ => start + metrics.event_width,
    };
    Extent {
        start,
        end,
        padded_end: end + metrics.padding,
    }
}

/// First-fit level for each extent, in the order given. Returns the levels
/// and how many were opened.
pub fn allocate_levels<I>(extents: I) -> (Vec<usize>, usize)
where
    I: IntoIterator<Item = Extent>,
{
    let mut occupied_until: Vec<f64> = Vec::new();
    let mut levels = Vec::new();
    for extent in extents {
        let level = match occupied_until
            .iter()
            .position(|&free_at| free_at < extent.start)
        {
            Some(level) => level,
            None => {
                occupied_until.push(f64::NEG_INFINITY);
                occupied_until.len() - 1
            }
        };
        occupied_until[level] = extent.padded_end;
        levels.push(level);
    }
    (levels, occupied_until.len())
}

/// Assigns levels to `visible`, which must already be sorted by start.
pub fn assign_lanes(
    visible: &[&NormalizedItem],
    mapper: &TimeMapper,
    metrics: &LayoutMetrics,
) -> LaneAssignment {
    let extents: Vec<Extent> = visible
        .iter()
        .map(|item| extent_of(item, mapper, metrics))
        .collect();

    let mut slots: Vec<Option<Slot>> = vec![None; visible.len()];
    let mut counts = [0usize; 2];
    for (lane_index, lane) in [Lane::Above, Lane::Below].into_iter().enumerate() {
        let members: Vec<usize> = (0..visible.len())
            .filter(|&i| visible[i].lane == lane)
            .collect();
        let (levels, opened) = allocate_levels(members.iter().map(|&i| extents[i]));
        for (&i, level) in members.iter().zip(levels) {
            slots[i] = Some(Slot {
                lane,
                level,
                extent: extents[i],
            });
        }
        counts[lane_index] = opened;
    }

    LaneAssignment {
        slots: slots.into_iter().flatten().collect(),
        above_levels: counts[0],
        below_levels: counts[1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(start: f64, end: f64) -> Extent {
        Extent {
            start,
            end,
            padded_end: end + 10.0,
        }
    }

    #[test]
    fn identical_ranges_stack_upwards() {
        let (levels, opened) = allocate_levels([extent(0.0, 30.0); 3]);
        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(opened, 3);
    }

    #[test]
    fn lowest_free_level_is_reused_first() {
        let (levels, opened) = allocate_levels([
            extent(0.0, 100.0),
            extent(5.0, 20.0),
            extent(40.0, 60.0),
            extent(200.0, 210.0),
        ]);
        // level 1 frees at 30, level 0 only at 110
        assert_eq!(levels, vec![0, 1, 1, 0]);
        assert_eq!(opened, 2);
    }

    #[test]
    fn touching_padding_counts_as_overlap() {
        let (levels, _) = allocate_levels([extent(0.0, 10.0), extent(20.0, 30.0)]);
        assert_eq!(levels, vec![0, 1]);
        let (levels, _) = allocate_levels([extent(0.0, 10.0), extent(20.5, 30.0)]);
        assert_eq!(levels, vec![0, 0]);
    }

    #[test]
    fn empty_input_opens_no_levels() {
        let (levels, opened) = allocate_levels(std::iter::empty());
        assert!(levels.is_empty());
        assert_eq!(opened, 0);
    }
}
