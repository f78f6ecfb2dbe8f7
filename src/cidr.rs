//! CIDR band table: a sorted longest-prefix-match table loaded once from a
//! text file, backed by a fixed-size direct-mapped lookup cache.

use std::fs;
use std::path::Path;

const CACHE_SLOTS: usize = 256;

/// A horizontal stripe of the curve assigned to a prefix-delimited address
/// block. `mask` is pre-computed from `prefix_len` at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBand {
    pub network: u32,
    pub mask: u32,
    pub prefix_len: u8,
    pub band_start: u32,
    pub band_end: u32,
}

#[derive(Debug, Clone, Copy)]
struct CacheSlot {
    addr: u32,
    band_idx: Option<u32>,
    occupied: bool,
    access_count: u32,
}

impl Default for CacheSlot {
    fn default() -> Self {
        Self {
            addr: 0,
            band_idx: None,
            occupied: false,
            access_count: 0,
        }
    }
}

/// Sorted sequence of [`CidrBand`]s plus the direct-mapped lookup cache.
/// Loaded once at startup; the table itself is immutable thereafter, only
/// the cache mutates on lookup.
pub struct CidrTable {
    bands: Vec<CidrBand>,
    cache: Box<[CacheSlot; CACHE_SLOTS]>,
}

impl CidrTable {
    /// An empty table; [`CidrTable::find`] always returns `None` and
    /// [`crate::mapper::map`] falls back to direct scaling.
    pub fn empty() -> Self {
        Self {
            bands: Vec::new(),
            cache: Box::new([CacheSlot::default(); CACHE_SLOTS]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Loads and sorts the table from `path`. Returns `Err` only if the
    /// file cannot be opened; malformed individual lines are warned about
    /// and skipped, never fatal. Callers typically map an `Err` here to an
    /// empty table plus a logged warning, rather than aborting the run.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut bands = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(band) => bands.push(band),
                None => {
                    log::warn!("cidr table {}: skipping malformed line {}: {line}", path.display(), line_no + 1);
                }
            }
        }

        bands.sort_by(|a, b| {
            b.prefix_len
                .cmp(&a.prefix_len)
                .then_with(|| a.network.cmp(&b.network))
        });

        Ok(Self {
            bands,
            cache: Box::new([CacheSlot::default(); CACHE_SLOTS]),
        })
    }

    /// Longest-prefix-match lookup with a 256-slot direct-mapped cache
    /// keyed by `addr & 0xFF`. Overwrites on miss, including storing a
    /// "no match" result, to suppress repeated scans for hot-idle
    /// addresses. A hit increments the slot's `access_count`.
    pub fn find(&mut self, addr: u32) -> Option<CidrBand> {
        let slot_idx = (addr & 0xFF) as usize;

        {
            let slot = &mut self.cache[slot_idx];
            if slot.occupied && slot.addr == addr {
                slot.access_count += 1;
                return slot.band_idx.map(|i| self.bands[i as usize]);
            }
        }

        let found_idx = self
            .bands
            .iter()
            .position(|b| (addr & b.mask) == b.network);

        self.cache[slot_idx] = CacheSlot {
            addr,
            band_idx: found_idx.map(|i| i as u32),
            occupied: true,
            access_count: 1,
        };

        found_idx.map(|i| self.bands[i])
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        !((1u32 << (32 - prefix_len as u32)) - 1)
    }
}

/// Parses a data line of the form `A.B.C.D/P T X_START X_END`. `T` is
/// accepted but unused by the core. Returns `None` for anything that
/// doesn't match the eight-field grammar.
fn parse_line(line: &str) -> Option<CidrBand> {
    let mut fields = line.split_whitespace();
    let cidr = fields.next()?;
    let _timezone: i32 = fields.next()?.parse().ok()?;
    let band_start: u32 = fields.next()?.parse().ok()?;
    let band_end: u32 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None; // extra trailing fields: reject
    }

    let (net_str, prefix_str) = cidr.split_once('/')?;
    let prefix_len: u8 = prefix_str.parse().ok()?;
    if prefix_len > 32 {
        return None;
    }

    let mut octets = net_str.split('.');
    let o1: u32 = octets.next()?.parse().ok()?;
    let o2: u32 = octets.next()?.parse().ok()?;
    let o3: u32 = octets.next()?.parse().ok()?;
    let o4: u32 = octets.next()?.parse().ok()?;
    if octets.next().is_some() || o1 > 255 || o2 > 255 || o3 > 255 || o4 > 255 {
        return None;
    }

    let raw_network = (o1 << 24) | (o2 << 16) | (o3 << 8) | o4;
    let mask = prefix_mask(prefix_len);
    let network = raw_network & mask;

    if band_start > band_end {
        return None;
    }

    Some(CidrBand {
        network,
        mask,
        prefix_len,
        band_start,
        band_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line() {
        let band = parse_line("8.8.0.0/16 0 100 200").unwrap();
        assert_eq!(band.prefix_len, 16);
        assert_eq!(band.mask, 0xFFFF0000);
        assert_eq!(band.network, 0x08080000);
        assert_eq!(band.band_start, 100);
        assert_eq!(band.band_end, 200);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("not a cidr line").is_none());
        assert!(parse_line("8.8.0.0/99 0 100 200").is_none());
        assert!(parse_line("8.8.0.0/16 0 100").is_none());
        assert!(parse_line("8.8.0.0/16 0 100 200 extra").is_none());
    }

    #[test]
    fn skips_comments_and_blank_lines_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cidr.txt");
        std::fs::write(
            &path,
            "# comment\n\n8.8.0.0/16 0 100 200\n1.0.0.0/8 0 0 50\nbogus line\n",
        )
        .unwrap();
        let table = CidrTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn sorted_longest_prefix_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cidr.txt");
        std::fs::write(
            &path,
            "1.0.0.0/8 0 0 50\n1.2.0.0/16 0 60 80\n1.2.3.0/24 0 90 95\n",
        )
        .unwrap();
        let table = CidrTable::load(&path).unwrap();
        assert_eq!(table.bands[0].prefix_len, 24);
        assert_eq!(table.bands[1].prefix_len, 16);
        assert_eq!(table.bands[2].prefix_len, 8);
    }

    #[test]
    fn find_returns_longest_match_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cidr.txt");
        std::fs::write(&path, "1.0.0.0/8 0 0 50\n1.2.3.0/24 0 90 95\n").unwrap();
        let mut table = CidrTable::load(&path).unwrap();
        let addr = (1u32 << 24) | (2 << 16) | (3 << 8) | 4;
        let band = table.find(addr).unwrap();
        assert_eq!(band.prefix_len, 24);
        // Second lookup should hit the cache and return the same band.
        let band2 = table.find(addr).unwrap();
        assert_eq!(band2.prefix_len, 24);
    }

    #[test]
    fn repeated_lookups_increment_the_cache_slot_access_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cidr.txt");
        std::fs::write(&path, "1.0.0.0/8 0 0 50\n").unwrap();
        let mut table = CidrTable::load(&path).unwrap();
        let addr = (1u32 << 24) | 1;
        table.find(addr).unwrap();
        table.find(addr).unwrap();
        table.find(addr).unwrap();
        let slot = &table.cache[(addr & 0xFF) as usize];
        assert_eq!(slot.access_count, 3);
    }

    #[test]
    fn find_on_empty_table_returns_none() {
        let mut table = CidrTable::empty();
        assert!(table.find(123).is_none());
    }
}
