//! Snapshot comparison.

use super::snapshot::{PortEntry, Snapshot};

/// Ports that appeared and disappeared between two consecutive snapshots.
///
/// A port present in both snapshots is neither added nor removed, so the two
/// sets are disjoint by construction. A port removed and re-added between
/// polls is invisible: only the end state is observable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Newly listening ports in ascending order, with their current owners.
    pub added: Vec<PortEntry>,
    /// Ports no longer listening, ascending. Owners are not carried: a
    /// removed port is no longer observable and its process may have exited.
    pub removed: Vec<u16>,
}

impl Delta {
    /// Whether nothing changed between the two snapshots.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the added/removed sets between two snapshots.
///
/// Both sides come out sorted ascending by port, courtesy of the snapshots'
/// ordered iteration.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Delta {
    let added = current
        .iter()
        .filter(|entry| !previous.contains(entry.port))
        .cloned()
        .collect();

    let removed = previous
        .ports()
        .filter(|port| !current.contains(*port))
        .collect();

    Delta { added, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(u16, i32, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(port, pid, name)| PortEntry {
                port: *port,
                pid: *pid,
                process_name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_identical_snapshots_yield_empty_delta() {
        let s = snapshot(&[(80, 1, "nginx"), (443, 2, "caddy")]);
        let delta = diff(&s, &s);

        assert!(delta.is_empty());
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_everything_added_from_empty() {
        let current = snapshot(&[(443, 2, "caddy"), (80, 1, "nginx")]);
        let delta = diff(&Snapshot::empty(), &current);

        let added_ports: Vec<u16> = delta.added.iter().map(|e| e.port).collect();
        assert_eq!(added_ports, vec![80, 443]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_everything_removed_to_empty() {
        let previous = snapshot(&[(443, 2, "caddy"), (80, 1, "nginx")]);
        let delta = diff(&previous, &Snapshot::empty());

        assert!(delta.added.is_empty());
        assert_eq!(delta.removed, vec![80, 443]);
    }

    #[test]
    fn test_mixed_change() {
        let previous = snapshot(&[(22, 1, "sshd"), (80, 2, "nginx")]);
        let current = snapshot(&[(80, 2, "nginx"), (443, 3, "caddy")]);
        let delta = diff(&previous, &current);

        let added_ports: Vec<u16> = delta.added.iter().map(|e| e.port).collect();
        assert_eq!(added_ports, vec![443]);
        assert_eq!(delta.removed, vec![22]);
    }

    #[test]
    fn test_added_and_removed_are_disjoint() {
        let previous = snapshot(&[(22, 1, "sshd"), (80, 2, "nginx")]);
        let current = snapshot(&[(80, 9, "other"), (8080, 3, "node")]);
        let delta = diff(&previous, &current);

        for entry in &delta.added {
            assert!(!delta.removed.contains(&entry.port));
        }
        // Port 80 changed owner but stayed listening: neither added nor removed.
        assert!(!delta.added.iter().any(|e| e.port == 80));
        assert!(!delta.removed.contains(&80));
    }

    #[test]
    fn test_added_entries_carry_current_owner() {
        let current = snapshot(&[(3000, 1234, "node")]);
        let delta = diff(&Snapshot::empty(), &current);

        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].pid, 1234);
        assert_eq!(delta.added[0].process_name, "node");
    }
}
