/// Clock used for frame and poll pacing. Sleeping goes through the same
/// trait so pacing can be tested against a fake clock.
pub trait TimeSource {
    /// Milliseconds since an arbitrary fixed epoch.
    fn time_ms(&self) -> u64;

    /// Suspend the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}
