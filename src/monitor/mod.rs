//! TCP listening-port monitoring engine.
//!
//! The engine turns the kernel's TCP table into two structured products: a
//! [`Snapshot`] of the currently listening ports (port → owning process) and
//! a [`Delta`] of ports added and removed since the previous snapshot.
//! Presentation is someone else's job; nothing here formats text for humans.
//!
//! # Pipeline
//!
//! One tick flows through the layers in order:
//!
//! 1. [`table::TableReader`] — two-phase sized query for the raw table bytes
//! 2. [`table::parse_owner_pid_table`] — decode fixed-size rows into
//!    [`Endpoint`]s
//! 3. [`SnapshotBuilder`] — filter to LISTEN, deduplicate by port, resolve
//!    process names
//! 4. [`diff()`] — set-difference against the previously held snapshot
//!
//! [`Monitor`] drives the ticks on a fixed interval; [`platform`] supplies
//! the native source and resolver for the host OS.

pub mod diff;
pub mod endpoint;
pub mod error;
pub mod platform;
pub mod process;
pub mod scheduler;
pub mod snapshot;
pub mod table;

pub use diff::{diff, Delta};
pub use endpoint::{AddressFamily, Endpoint, EndpointSource, TcpState};
pub use error::{ScanError, ScanResult};
pub use platform::{native_scanner, NativeScanner};
pub use process::{NameResolver, UNKNOWN_PROCESS};
pub use scheduler::{Monitor, MonitorEvent, MonitorHandle, Scanner, DEFAULT_POLL_INTERVAL};
pub use snapshot::{PortEntry, Snapshot, SnapshotBuilder};
pub use table::{parse_owner_pid_table, FetchOutcome, OwnerPidTable, SizedQuery, TableReader};
