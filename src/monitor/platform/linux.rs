//! Linux endpoint source backed by procfs.
//!
//! `/proc/net/tcp` rows carry hex-encoded `address:port` pairs, a state code,
//! and a socket inode, but no pid. Ownership is recovered with a second pass:
//! walk `/proc/<pid>/fd` and match symlink targets of the form
//! `socket:[inode]`. Sockets whose owner is not visible (other users'
//! processes, without privileges) keep pid 0 and later resolve to the
//! `"Unknown"` placeholder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::monitor::endpoint::{AddressFamily, Endpoint, EndpointSource, TcpState};
use crate::monitor::error::{ScanError, ScanResult};
use crate::monitor::process::NameResolver;
use crate::monitor::scheduler::Scanner;

use super::NativeScanner;

/// Translate a procfs TCP state code (`include/net/tcp_states.h`) into the
/// portable state set.
fn state_from_procfs(code: u8) -> Option<TcpState> {
    match code {
        0x01 => Some(TcpState::Established),
        0x02 => Some(TcpState::SynSent),
        0x03 => Some(TcpState::SynReceived),
        0x04 => Some(TcpState::FinWait1),
        0x05 => Some(TcpState::FinWait2),
        0x06 => Some(TcpState::TimeWait),
        0x07 => Some(TcpState::Closed),
        0x08 => Some(TcpState::CloseWait),
        0x09 => Some(TcpState::LastAck),
        0x0A => Some(TcpState::Listen),
        0x0B => Some(TcpState::Closing),
        _ => None,
    }
}

/// One parsed `/proc/net/tcp` row: port, state, socket inode.
type ProcfsRow = (u16, TcpState, u64);

/// Parse `/proc/net/tcp` content.
///
/// Each line after the header looks like:
///
/// ```text
///    0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 ...
/// ```
///
/// The port is the hex field after the colon in the local address; the state
/// is the hex field at index 3; the inode is the decimal field at index 9.
/// Malformed lines are skipped: one bad row must not blind the scan.
fn parse_proc_net_tcp(content: &str) -> Vec<ProcfsRow> {
    let mut rows = Vec::new();

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }

        let port = match parts[1].split(':').nth(1) {
            Some(hex) => match u16::from_str_radix(hex, 16) {
                Ok(port) => port,
                Err(_) => {
                    trace!(field = parts[1], "skipping row with unparsable port");
                    continue;
                }
            },
            None => continue,
        };

        let state = match u8::from_str_radix(parts[3], 16).ok().and_then(state_from_procfs) {
            Some(state) => state,
            None => {
                trace!(field = parts[3], "skipping row with unknown state code");
                continue;
            }
        };

        let inode = match parts[9].parse::<u64>() {
            Ok(inode) => inode,
            Err(_) => {
                trace!(field = parts[9], "skipping row with unparsable inode");
                continue;
            }
        };

        rows.push((port, state, inode));
    }

    rows
}

/// Map socket inodes to owning pids by walking `/proc/<pid>/fd`.
///
/// Entries we cannot read (permissions, processes exiting mid-walk) are
/// silently skipped; their sockets stay unowned.
fn socket_owners(proc_root: &Path) -> HashMap<u64, i32> {
    let mut owners = HashMap::new();

    let entries = match fs::read_dir(proc_root) {
        Ok(entries) => entries,
        Err(_) => return owners,
    };

    for entry in entries.flatten() {
        let pid: i32 = match entry.file_name().to_str().and_then(|name| name.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        let fds = match fs::read_dir(entry.path().join("fd")) {
            Ok(fds) => fds,
            Err(_) => continue,
        };

        for fd in fds.flatten() {
            let target = match fs::read_link(fd.path()) {
                Ok(target) => target,
                Err(_) => continue,
            };
            if let Some(inode) = parse_socket_inode(&target.to_string_lossy()) {
                owners.entry(inode).or_insert(pid);
            }
        }
    }

    owners
}

/// Extract the inode from a `socket:[12345]` symlink target.
fn parse_socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Endpoint source reading the procfs TCP table.
pub struct ProcfsTable {
    table_path: PathBuf,
    proc_root: PathBuf,
}

impl ProcfsTable {
    /// Build a source for the given address family.
    ///
    /// Only the IPv4 table is decodable; IPv6 rows have a different address
    /// width and no decoder here.
    pub fn new(family: AddressFamily) -> ScanResult<Self> {
        match family {
            AddressFamily::Ipv4 => Ok(Self {
                table_path: PathBuf::from("/proc/net/tcp"),
                proc_root: PathBuf::from("/proc"),
            }),
            other => Err(ScanError::UnsupportedFamily(other)),
        }
    }

    #[cfg(test)]
    fn with_roots(table_path: PathBuf, proc_root: PathBuf) -> Self {
        Self {
            table_path,
            proc_root,
        }
    }
}

impl EndpointSource for ProcfsTable {
    fn endpoints(&mut self) -> ScanResult<Vec<Endpoint>> {
        let content = fs::read_to_string(&self.table_path)?;
        let rows = parse_proc_net_tcp(&content);
        let owners = socket_owners(&self.proc_root);

        Ok(rows
            .into_iter()
            .map(|(port, state, inode)| Endpoint {
                state,
                local_port: port,
                owner_pid: owners.get(&inode).copied().unwrap_or(0),
            })
            .collect())
    }
}

/// Name resolver reading `/proc/<pid>/comm`.
pub struct CommResolver {
    proc_root: PathBuf,
}

impl CommResolver {
    /// Resolver against the real procfs.
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl Default for CommResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver for CommResolver {
    fn resolve(&mut self, pid: i32) -> Option<String> {
        if pid <= 0 {
            return None;
        }
        let comm = fs::read_to_string(self.proc_root.join(pid.to_string()).join("comm")).ok()?;
        let name = comm.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Build the Linux native scanner.
pub fn native_scanner(family: AddressFamily) -> ScanResult<NativeScanner> {
    let table = ProcfsTable::new(family)?;
    Ok(Scanner::new(
        Box::new(table) as Box<dyn EndpointSource + Send>,
        Box::new(CommResolver::new()) as Box<dyn NameResolver + Send>,
    ))
}
