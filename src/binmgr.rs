//! Bin lifecycle on an ordered event stream. Owns the current [`BinRaster`],
//! the [`DecayCache`], and the [`ResidueMap`]; routes each event into the
//! current bin or finalizes it and opens the next one.

use crate::decay::DecayCache;
use crate::raster::BinRaster;
use crate::residue::ResidueMap;

/// Finalize-and-emit is expressed as a closure parameter rather than a
/// function pointer: the driver supplies one that renders the bin and
/// writes it to disk.
const COMPACT_EVERY_N_BINS: u32 = 10;

pub struct BinManager {
    dimension: u32,
    bin_seconds: u32,
    decay_seconds: u32,
    current: Option<BinRaster>,
    decay: DecayCache,
    residue: ResidueMap,
    total_bins: u32,
    bins_since_compact: u32,
}

impl BinManager {
    pub fn new(dimension: u32, bin_seconds: u32, decay_seconds: u32) -> Self {
        Self {
            dimension,
            bin_seconds,
            decay_seconds,
            current: None,
            decay: DecayCache::new(),
            residue: ResidueMap::new(dimension),
            total_bins: 0,
            bins_since_compact: 0,
        }
    }

    pub fn total_bins(&self) -> u32 {
        self.total_bins
    }

    pub fn residue(&self) -> &ResidueMap {
        &self.residue
    }

    /// Applied to the *next* bin finalized (i.e. an auto-scale decay
    /// horizon computed at end-of-stream should be set before the final
    /// [`Self::flush`]).
    pub fn set_decay_seconds(&mut self, decay_seconds: u32) {
        self.decay_seconds = decay_seconds;
    }

    fn bin_start_for(&self, ts: i64) -> i64 {
        (ts.div_euclid(self.bin_seconds as i64)) * self.bin_seconds as i64
    }

    fn finalize_current<E>(
        &mut self,
        mut emit: impl FnMut(&BinRaster, &ResidueMap) -> Result<(), E>,
    ) -> Result<(), E> {
        if let Some(mut bin) = self.current.take() {
            self.decay.apply(&mut bin, self.decay_seconds);
            bin.finalize();
            emit(&bin, &self.residue)?;

            self.bins_since_compact += 1;
            if self.bins_since_compact >= COMPACT_EVERY_N_BINS {
                self.decay.compact(bin.bin_start, self.decay_seconds);
                self.bins_since_compact = 0;
            }
        }
        Ok(())
    }

    /// Routes `(ts, x, y)` into the current bin, finalizing and emitting
    /// the previous one first if the event belongs to a later bin.
    /// Requires non-decreasing `ts` across calls; out-of-order input
    /// produces wrong-sized bins (a programming error at the call site,
    /// not something this type detects).
    pub fn process<E>(
        &mut self,
        ts: i64,
        x: u32,
        y: u32,
        emit: impl FnMut(&BinRaster, &ResidueMap) -> Result<(), E>,
    ) -> Result<(), E> {
        let target_start = self.bin_start_for(ts);
        let needs_new_bin = match &self.current {
            Some(bin) => bin.bin_start != target_start,
            None => true,
        };
        if needs_new_bin {
            self.finalize_current(emit)?;
            self.current = Some(BinRaster::new(target_start, self.bin_seconds, self.dimension));
            self.total_bins += 1;
        }

        self.decay.touch(x, y, ts, 1);
        self.residue.mark(x, y);
        if let Some(bin) = self.current.as_mut() {
            bin.add(x, y);
        }
        Ok(())
    }

    /// Finalizes and emits the open bin, if any.
    pub fn flush<E>(
        &mut self,
        emit: impl FnMut(&BinRaster, &ResidueMap) -> Result<(), E>,
    ) -> Result<(), E> {
        self.finalize_current(emit)
    }
}
