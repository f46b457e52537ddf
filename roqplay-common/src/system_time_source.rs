use roqplay_core::time_source::TimeSource;

use std::thread;
use std::time::Duration;

use time::OffsetDateTime;

pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn time_ms(&self) -> u64 {
        (OffsetDateTime::now_utc() - OffsetDateTime::UNIX_EPOCH).whole_milliseconds() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}
