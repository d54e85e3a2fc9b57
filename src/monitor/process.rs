//! Best-effort process identity lookup.
//!
//! Process names are metadata, not correctness-critical: a process can exit
//! between the table scan and the lookup, or the lookup can be denied. Both
//! cases collapse to the [`UNKNOWN_PROCESS`] placeholder instead of failing
//! the scan.

/// Placeholder name used when the owning process cannot be identified.
pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Maps a pid to a human-readable process name.
///
/// Implementations make exactly one lookup attempt per call, no retries, and
/// represent every failure mode as `None`.
pub trait NameResolver {
    /// Look up the name of a running process by id.
    fn resolve(&mut self, pid: i32) -> Option<String>;
}

impl<T: NameResolver + ?Sized> NameResolver for Box<T> {
    fn resolve(&mut self, pid: i32) -> Option<String> {
        (**self).resolve(pid)
    }
}
