//! Calendar-time formatting built on `chrono`, shared by the frame
//! renderer's timestamp strip and the pipeline driver's frame filenames.
//! Both render `bin.bin_start` in local time.

use chrono::{DateTime, Local, TimeZone};

fn to_local(epoch_seconds: i64) -> DateTime<Local> {
    match Local.timestamp_opt(epoch_seconds, 0) {
        chrono::LocalResult::Single(t) => t,
        chrono::LocalResult::Ambiguous(t, _) => t,
        chrono::LocalResult::None => Local.timestamp_opt(0, 0).unwrap(),
    }
}

/// `YYYY-MM-DD HH:MM:SS`, used for the on-frame timestamp strip.
pub fn format_timestamp(epoch_seconds: i64) -> String {
    to_local(epoch_seconds).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `YYYYMMDD_HHMMSS`, used for frame filenames.
pub fn format_filename_timestamp(epoch_seconds: i64) -> String {
    to_local(epoch_seconds).format("%Y%m%d_%H%M%S").to_string()
}
