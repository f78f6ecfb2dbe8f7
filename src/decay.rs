//! Bounded set of recently-active coordinates that linearly decay into
//! later bins, giving the heat map a brief visual afterglow instead of a
//! hard cutoff at the bin boundary.

use crate::raster::BinRaster;

pub const DECAY_CACHE_CAPACITY: usize = 65_536;

#[derive(Debug, Clone, Copy)]
struct DecayEntry {
    coord_key: u32,
    last_seen: i64,
    intensity: u32,
}

/// Linear-scan, direct-mapped-free decay cache. `size <= DECAY_CACHE_CAPACITY`;
/// acceptable because `touch`/`apply`/`compact` calls dominate only at low
/// attack volume and the driver compacts periodically (see
/// [`crate::binmgr::BinManager`]).
pub struct DecayCache {
    entries: Vec<DecayEntry>,
}

impl Default for DecayCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DecayCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(1024),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn coord_key(x: u32, y: u32) -> u32 {
        (x << 16) | (y & 0xFFFF)
    }

    /// Updates (or inserts) the entry for `(x, y)`. New coordinates are
    /// dropped silently once the cache is at capacity; the caller's current
    /// bin already recorded the event via [`BinRaster::add`], so this does
    /// not lose the event, only its decay afterglow into later bins.
    pub fn touch(&mut self, x: u32, y: u32, ts: i64, intensity: u32) {
        let key = Self::coord_key(x, y);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.coord_key == key) {
            entry.last_seen = ts;
            entry.intensity = entry.intensity.saturating_add(intensity);
            return;
        }
        if self.entries.len() < DECAY_CACHE_CAPACITY {
            self.entries.push(DecayEntry {
                coord_key: key,
                last_seen: ts,
                intensity,
            });
        }
    }

    /// Adds each live entry's decayed contribution into `bin`'s heatmap.
    /// `factor = 1 - age/decay_seconds`; contributions floor to a minimum
    /// of 1 while `factor > 0`.
    pub fn apply(&self, bin: &mut BinRaster, decay_seconds: u32) {
        let dim = bin.dimension();
        for entry in &self.entries {
            let age = bin.bin_start - entry.last_seen;
            if age < 0 || age > decay_seconds as i64 {
                continue;
            }
            let factor = 1.0 - (age as f64 / decay_seconds as f64);
            let mut contribution = (entry.intensity as f64 * factor).floor() as u32;
            if factor > 0.0 && contribution == 0 {
                contribution = 1;
            }

            let x = (entry.coord_key >> 16) & 0xFFFF;
            let y = entry.coord_key & 0xFFFF;
            if x >= dim || y >= dim {
                continue;
            }
            let idx = (y * dim + x) as usize;
            bin.heatmap[idx] = bin.heatmap[idx].saturating_add(contribution);
            if bin.heatmap[idx] > bin.max_intensity {
                bin.max_intensity = bin.heatmap[idx];
            }
        }
    }

    /// In-place two-pointer removal of entries older than `decay_seconds`,
    /// preserving relative order.
    pub fn compact(&mut self, now: i64, decay_seconds: u32) {
        let mut write = 0;
        for read in 0..self.entries.len() {
            let age = now - self.entries[read].last_seen;
            if age >= 0 && age <= decay_seconds as i64 {
                if write != read {
                    self.entries[write] = self.entries[read];
                }
                write += 1;
            }
        }
        self.entries.truncate(write);
    }
}
