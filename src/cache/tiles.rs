//! Per-tile switch scheduling.
//!
//! Every tile carries its own timer. Once a tile's timer reaches the switch
//! interval it becomes eligible; each tick only a random fraction of the
//! eligible tiles actually advance, so the wall never flips in lockstep.
//! Eligible tiles that were not picked keep waiting and are reshuffled on the
//! next tick. There is no weighting by wait time.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Logical position in the front store's history, counted from the
    /// oldest retained entry: 0 is the oldest image still in the ring, not the
    /// newest. Wrapped modulo occupancy when resolved to a slot.
    pub ring_position: usize,
    pub elapsed: Duration,
}

/// How many of `candidates` eligible tiles switch this tick:
/// `floor(fraction * candidates)`, clamped to `candidates`.
#[must_use]
pub fn switch_quota(fraction: f32, candidates: usize) -> usize {
    let fraction = f64::from(sanitize_fraction(fraction));
    let quota = (fraction * candidates as f64).floor() as usize;
    quota.min(candidates)
}

fn sanitize_fraction(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub struct TileScheduler<R = StdRng> {
    tiles: Vec<Tile>,
    switch_interval: Duration,
    fraction: f32,
    rng: R,
}

impl TileScheduler<StdRng> {
    /// Seeded schedulers produce the same switch sequence on every run.
    pub fn new(count: usize, switch_interval: Duration, fraction: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(count, switch_interval, fraction, rng)
    }
}

impl<R: Rng> TileScheduler<R> {
    pub fn with_rng(count: usize, switch_interval: Duration, fraction: f32, rng: R) -> Self {
        Self {
            tiles: fresh_tiles(count),
            switch_interval,
            fraction: sanitize_fraction(fraction),
            rng,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn switch_interval(&self) -> Duration {
        self.switch_interval
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Discard all tiles and start `count` new ones with zeroed timers.
    pub fn resize(&mut self, count: usize) {
        debug!(from = self.tiles.len(), to = count, "tile grid resized");
        self.tiles = fresh_tiles(count);
    }

    /// Advance all timers by `dt` and switch a random sample of the eligible
    /// tiles. Returns the indices of the tiles that switched, in selection order.
    ///
    /// With an empty front store (`occupancy == 0`) nothing switches; timers
    /// keep running so tiles switch as soon as content arrives.
    pub fn tick(&mut self, dt: Duration, occupancy: usize) -> Vec<usize> {
        for tile in &mut self.tiles {
            tile.elapsed = tile.elapsed.saturating_add(dt);
        }
        if occupancy == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<usize> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.elapsed >= self.switch_interval)
            .map(|(idx, _)| idx)
            .collect();
        let quota = switch_quota(self.fraction, candidates.len());
        if quota == 0 {
            return Vec::new();
        }

        candidates.shuffle(&mut self.rng);
        candidates.truncate(quota);
        let modulus = occupancy.max(1);
        for &idx in &candidates {
            let tile = &mut self.tiles[idx];
            tile.ring_position = (tile.ring_position + 1) % modulus;
            tile.elapsed = Duration::ZERO;
        }
        debug!(switched = candidates.len(), occupancy, "tiles switched");
        candidates
    }
}

// Tiles start staggered through the history so a fresh grid does not show
// one image everywhere.
fn fresh_tiles(count: usize) -> Vec<Tile> {
    (0..count)
        .map(|idx| Tile {
            ring_position: idx,
            elapsed: Duration::ZERO,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn seeded(count: usize, fraction: f32) -> TileScheduler {
        TileScheduler::new(count, SECOND, fraction, Some(42))
    }

    #[test]
    fn quota_is_floor_of_fraction() {
        assert_eq!(switch_quota(0.5, 0), 0);
        assert_eq!(switch_quota(0.5, 1), 0);
        assert_eq!(switch_quota(0.5, 3), 1);
        assert_eq!(switch_quota(0.25, 8), 2);
        assert_eq!(switch_quota(1.0, 7), 7);
        assert_eq!(switch_quota(0.0, 7), 0);
        assert_eq!(switch_quota(3.0, 7), 7);
        assert_eq!(switch_quota(f32::NAN, 7), 0);
    }

    #[test]
    fn quota_is_monotonic_in_candidates() {
        for fraction in [0.1, 0.33, 0.5, 0.9] {
            let mut last = 0;
            for c in 0..200 {
                let q = switch_quota(fraction, c);
                assert!(q >= last);
                assert!(q <= c);
                last = q;
            }
        }
    }

    #[test]
    fn nothing_switches_before_interval() {
        let mut sched = seeded(6, 1.0);
        assert!(sched.tick(SECOND / 2, 10).is_empty());
        assert!(sched.tiles().iter().all(|t| t.elapsed == SECOND / 2));
    }

    #[test]
    fn switches_exactly_the_quota() {
        let mut sched = seeded(10, 0.5);
        let before: Vec<usize> = sched.tiles().iter().map(|t| t.ring_position).collect();
        let switched = sched.tick(SECOND, 20);
        assert_eq!(switched.len(), 5);
        for (idx, tile) in sched.tiles().iter().enumerate() {
            if switched.contains(&idx) {
                assert_eq!(tile.ring_position, (before[idx] + 1) % 20);
                assert_eq!(tile.elapsed, Duration::ZERO);
            } else {
                assert_eq!(tile.ring_position, before[idx]);
                assert_eq!(tile.elapsed, SECOND);
            }
        }
    }

    #[test]
    fn unselected_tiles_stay_eligible() {
        let mut sched = seeded(4, 0.5);
        let first = sched.tick(SECOND, 8);
        assert_eq!(first.len(), 2);
        // the two leftovers are the only candidates now
        let second = sched.tick(Duration::ZERO, 8);
        assert_eq!(second.len(), 1);
        assert!(second.iter().all(|idx| !first.contains(idx)));
    }

    #[test]
    fn empty_store_blocks_switching() {
        let mut sched = seeded(3, 1.0);
        assert!(sched.tick(SECOND * 2, 0).is_empty());
        assert_eq!(sched.tick(Duration::ZERO, 1).len(), 3);
        assert!(sched.tiles().iter().all(|t| t.ring_position == 0));
    }

    #[test]
    fn seeded_runs_repeat() {
        let mut a = seeded(16, 0.3);
        let mut b = seeded(16, 0.3);
        for _ in 0..20 {
            assert_eq!(a.tick(SECOND / 3, 9), b.tick(SECOND / 3, 9));
        }
        assert_eq!(a.tiles(), b.tiles());
    }

    #[test]
    fn constructor_sanitizes_fraction() {
        assert_eq!(TileScheduler::new(1, SECOND, f32::NAN, Some(1)).fraction(), 0.0);
        assert_eq!(TileScheduler::new(1, SECOND, 4.0, Some(1)).fraction(), 1.0);
        let sched = seeded(1, 0.4);
        assert_eq!(sched.fraction(), 0.4);
        assert_eq!(sched.switch_interval(), SECOND);
    }

    #[test]
    fn resize_resets_timers() {
        let mut sched = seeded(2, 0.0);
        sched.tick(SECOND * 5, 4);
        sched.resize(5);
        assert_eq!(sched.len(), 5);
        assert!(sched.tiles().iter().all(|t| t.elapsed == Duration::ZERO));
    }
}
