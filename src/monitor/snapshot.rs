//! Listening-port snapshots.

use std::collections::BTreeMap;

use tracing::trace;

use super::endpoint::{Endpoint, TcpState};
use super::process::{NameResolver, UNKNOWN_PROCESS};

/// One listening port and its owner. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    /// The listening port, always in 1..=65535.
    pub port: u16,
    /// Owning process id as reported by the kernel table.
    pub pid: i32,
    /// Resolved process name, or `"Unknown"`.
    pub process_name: String,
}

/// The set of listening ports observed by one scan, keyed by port.
///
/// Built atomically per poll and replaced wholesale, never mutated in place.
/// Iteration is in ascending port order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<u16, PortEntry>,
}

impl Snapshot {
    /// A snapshot with no listening ports.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of listening ports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ports are listening.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `port` is listening in this snapshot.
    pub fn contains(&self, port: u16) -> bool {
        self.entries.contains_key(&port)
    }

    /// The entry for `port`, if it is listening.
    pub fn get(&self, port: u16) -> Option<&PortEntry> {
        self.entries.get(&port)
    }

    /// Entries in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = &PortEntry> {
        self.entries.values()
    }

    /// Listening ports in ascending order.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }
}

impl FromIterator<PortEntry> for Snapshot {
    /// Collect entries into a snapshot; the first entry for a port wins.
    fn from_iter<I: IntoIterator<Item = PortEntry>>(iter: I) -> Self {
        let mut entries = BTreeMap::new();
        for entry in iter {
            entries.entry(entry.port).or_insert(entry);
        }
        Self { entries }
    }
}

/// Builds snapshots from decoded endpoints.
///
/// Filtering rules: keep only LISTEN endpoints on ports 1..=65535; when the
/// table reports multiple owners for one port, the first row in table order
/// wins and later ones are discarded. The tie-break is an artifact of the
/// native iteration order, kept as documented behavior. Names are resolved
/// only for endpoints actually inserted.
pub struct SnapshotBuilder<R> {
    resolver: R,
}

impl<R: NameResolver> SnapshotBuilder<R> {
    /// Build with the given name resolver.
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Filter, deduplicate, and name-resolve one poll's endpoints.
    pub fn build(&mut self, endpoints: &[Endpoint]) -> Snapshot {
        let mut entries = BTreeMap::new();

        for endpoint in endpoints {
            if endpoint.state != TcpState::Listen {
                continue;
            }
            if endpoint.local_port == 0 {
                trace!(pid = endpoint.owner_pid, "skipping listener on port 0");
                continue;
            }
            if entries.contains_key(&endpoint.local_port) {
                trace!(
                    port = endpoint.local_port,
                    pid = endpoint.owner_pid,
                    "duplicate listener, keeping first owner"
                );
                continue;
            }

            let process_name = self
                .resolver
                .resolve(endpoint.owner_pid)
                .unwrap_or_else(|| UNKNOWN_PROCESS.to_string());

            entries.insert(
                endpoint.local_port,
                PortEntry {
                    port: endpoint.local_port,
                    pid: endpoint.owner_pid,
                    process_name,
                },
            );
        }

        Snapshot { entries }
    }
}
