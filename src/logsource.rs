//! Minimal adapter from on-disk honeypot connection logs to the abstract
//! `{ts, src}` event stream the core consumes. Transparent to gzip
//! compression; tolerant of unparseable lines (they are skipped, not fatal).
//!
//! Grounded on the documented sensor line format: a syslog-style prefix
//! followed by `PacketTime:<date> <time>` and an `IPv4/TCP SRC:PORT ->
//! DST:PORT` fragment, e.g.:
//!
//! ```text
//! Feb 22 09:26:39 10.10.10.40 honeypi00 sensor: PacketTime:2019-02-22 17:26:39.092449 Len:60 IPv4/TCP 45.55.247.43:35398 -> 10.10.10.40:5900
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::NaiveDateTime;
use flate2::read::MultiGzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub ts: i64,
    pub src: u32,
}

/// Opens `path`, transparently decompressing if it ends in `.gz`.
fn open_reader(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Parses every recognizable line of `path` into an [`Event`], in file
/// order. Unparseable lines are `log::debug!`-logged and skipped.
pub fn read_events(path: &Path) -> std::io::Result<Vec<Event>> {
    let reader = BufReader::new(open_reader(path)?);
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(&line) {
            Some(event) => events.push(event),
            None => {
                log::debug!("{}: unparseable line {}: {line}", path.display(), line_no + 1);
            }
        }
    }
    Ok(events)
}

/// Returns the first parseable event's timestamp in `path`, without
/// loading the whole file. Used to sort multi-file input sets.
pub fn peek_earliest_timestamp(path: &Path) -> std::io::Result<Option<i64>> {
    let reader = BufReader::new(open_reader(path)?);
    for line in reader.lines() {
        let line = line?;
        if let Some(event) = parse_line(&line) {
            return Ok(Some(event.ts));
        }
    }
    Ok(None)
}

/// Extracts `PacketTime:<naive datetime>` and the source address from the
/// `IPv4/TCP SRC:PORT -> DST:PORT` fragment. Returns `None` for anything
/// that doesn't carry both.
fn parse_line(line: &str) -> Option<Event> {
    let ts = parse_packet_time(line)?;
    let src = parse_source_addr(line)?;
    Some(Event { ts, src })
}

fn parse_packet_time(line: &str) -> Option<i64> {
    let marker = "PacketTime:";
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    // "2019-02-22 17:26:39.092449 Len:60 ..." — take the date, time, and
    // fractional-second fields, drop anything after the next space-run.
    let mut fields = rest.splitn(3, ' ');
    let date = fields.next()?;
    let time_with_frac = fields.next()?;
    let time = time_with_frac.split('.').next()?;
    let combined = format!("{date} {time}");
    let parsed = NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(parsed.and_utc().timestamp())
}

fn parse_source_addr(line: &str) -> Option<u32> {
    let marker = "IPv4/TCP ";
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let src_field = rest.split_whitespace().next()?;
    let (addr_str, _port) = src_field.split_once(':')?;
    let addr: Ipv4Addr = addr_str.parse().ok()?;
    Some(u32::from(addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Feb 22 09:26:39 10.10.10.40 honeypi00 sensor: PacketTime:2019-02-22 17:26:39.092449 Len:60 IPv4/TCP 45.55.247.43:35398 -> 10.10.10.40:5900";

    #[test]
    fn parses_a_well_formed_sensor_line() {
        let event = parse_line(SAMPLE).unwrap();
        assert_eq!(event.src, u32::from(Ipv4Addr::new(45, 55, 247, 43)));
        assert_eq!(event.ts, 1_550_856_399);
    }

    #[test]
    fn rejects_a_line_missing_the_ipv4_fragment() {
        assert!(parse_line("PacketTime:2019-02-22 17:26:39.092449 no transport fragment here").is_none());
    }

    #[test]
    fn rejects_a_line_missing_packet_time() {
        assert!(parse_line("IPv4/TCP 45.55.247.43:35398 -> 10.10.10.40:5900").is_none());
    }

    #[test]
    fn read_events_skips_bad_lines_and_keeps_good_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.log");
        std::fs::write(&path, format!("garbage line\n{SAMPLE}\nmore garbage\n")).unwrap();
        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ts, 1_550_856_399);
    }

    #[test]
    fn peek_earliest_timestamp_stops_at_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.log");
        std::fs::write(&path, format!("garbage line\n{SAMPLE}\n")).unwrap();
        assert_eq!(peek_earliest_timestamp(&path).unwrap(), Some(1_550_856_399));
    }

    #[test]
    fn reads_gzip_compressed_logs() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.log.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].src, u32::from(Ipv4Addr::new(45, 55, 247, 43)));
    }
}
