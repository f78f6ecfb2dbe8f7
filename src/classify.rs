//! Constant-time classification of non-routable (private/reserved) IPv4
//! addresses, covering the usual 15 RFC-reserved ranges.

/// Returns true for addresses in any of: `0.0.0.0/8`, `10/8`, `100.64/10`,
/// `127/8`, `169.254/16`, `172.16/12`, `192.0.0/24`, `192.0.2/24`,
/// `192.88.99/24`, `192.168/16`, `198.18/15`, `198.51.100/24`,
/// `203.0.113/24`, `224/4`, `240/4`.
///
/// Early-exit octet comparisons; never allocates. `255.255.255.255/32` is
/// deliberately not special-cased (matches the source this was distilled
/// from; see DESIGN.md).
#[inline]
pub fn is_non_routable(addr: u32) -> bool {
    let o1 = ((addr >> 24) & 0xFF) as u8;
    let o2 = ((addr >> 16) & 0xFF) as u8;
    let o3 = ((addr >> 8) & 0xFF) as u8;

    if o1 == 0 {
        return true; // 0.0.0.0/8
    }
    if o1 == 10 {
        return true; // 10/8
    }
    if o1 == 100 && (64..=127).contains(&o2) {
        return true; // 100.64/10
    }
    if o1 == 127 {
        return true; // 127/8
    }
    if o1 == 169 && o2 == 254 {
        return true; // 169.254/16
    }
    if o1 == 172 && (16..=31).contains(&o2) {
        return true; // 172.16/12
    }
    if o1 == 192 && o2 == 0 && o3 == 0 {
        return true; // 192.0.0/24
    }
    if o1 == 192 && o2 == 0 && o3 == 2 {
        return true; // 192.0.2/24
    }
    if o1 == 192 && o2 == 88 && o3 == 99 {
        return true; // 192.88.99/24
    }
    if o1 == 192 && o2 == 168 {
        return true; // 192.168/16
    }
    if o1 == 198 && (o2 == 18 || o2 == 19) {
        return true; // 198.18/15
    }
    if o1 == 198 && o2 == 51 && o3 == 100 {
        return true; // 198.51.100/24
    }
    if o1 == 203 && o2 == 0 && o3 == 113 {
        return true; // 203.0.113/24
    }
    if (224..=239).contains(&o1) {
        return true; // 224/4
    }
    if o1 >= 240 {
        return true; // 240/4
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | d as u32
    }

    #[test]
    fn public_address_is_routable() {
        assert!(!is_non_routable(ip(1, 1, 1, 1)));
    }

    #[test]
    fn every_range_lowest_and_highest_is_non_routable() {
        let ranges: &[(u32, u32)] = &[
            (ip(0, 0, 0, 0), ip(0, 255, 255, 255)),
            (ip(10, 0, 0, 0), ip(10, 255, 255, 255)),
            (ip(100, 64, 0, 0), ip(100, 127, 255, 255)),
            (ip(127, 0, 0, 0), ip(127, 255, 255, 255)),
            (ip(169, 254, 0, 0), ip(169, 254, 255, 255)),
            (ip(172, 16, 0, 0), ip(172, 31, 255, 255)),
            (ip(192, 0, 0, 0), ip(192, 0, 0, 255)),
            (ip(192, 0, 2, 0), ip(192, 0, 2, 255)),
            (ip(192, 88, 99, 0), ip(192, 88, 99, 255)),
            (ip(192, 168, 0, 0), ip(192, 168, 255, 255)),
            (ip(198, 18, 0, 0), ip(198, 19, 255, 255)),
            (ip(198, 51, 100, 0), ip(198, 51, 100, 255)),
            (ip(203, 0, 113, 0), ip(203, 0, 113, 255)),
            (ip(224, 0, 0, 0), ip(239, 255, 255, 255)),
            (ip(240, 0, 0, 0), ip(255, 255, 255, 254)),
        ];
        for &(low, high) in ranges {
            assert!(is_non_routable(low), "low bound {low:#010x}");
            assert!(is_non_routable(high), "high bound {high:#010x}");
        }
    }

    #[test]
    fn known_private_and_reserved_addresses_classify_non_routable() {
        for a in [
            ip(10, 0, 0, 0),
            ip(127, 0, 0, 1),
            ip(192, 168, 1, 1),
            ip(224, 0, 0, 1),
            ip(240, 0, 0, 1),
        ] {
            assert!(is_non_routable(a));
        }
    }
}
