//! Typed TCP endpoint records and the source seam they flow through.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ScanResult;

/// TCP transport states as reported by the native table.
///
/// The discriminants match the table's state DWORD values. Only `Listen`
/// matters for snapshot building; the rest exist so every row decodes to a
/// meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpState {
    /// Connection is closed.
    Closed,
    /// Socket is bound and waiting for incoming connections.
    Listen,
    /// Active open sent, awaiting the peer's SYN-ACK.
    SynSent,
    /// Passive open received a SYN, handshake in progress.
    SynReceived,
    /// Connection is established.
    Established,
    /// Local close initiated, awaiting the peer's ACK or FIN.
    FinWait1,
    /// Local close acknowledged, awaiting the peer's FIN.
    FinWait2,
    /// Peer closed, local side still open.
    CloseWait,
    /// Both sides closing simultaneously.
    Closing,
    /// Final ACK outstanding after a passive close.
    LastAck,
    /// Waiting out stray segments after an active close.
    TimeWait,
    /// The transport control block is being deleted.
    DeleteTcb,
}

impl TcpState {
    /// Decode a state DWORD from the native table.
    ///
    /// Returns `None` for values outside the documented 1..=12 range.
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Closed),
            2 => Some(Self::Listen),
            3 => Some(Self::SynSent),
            4 => Some(Self::SynReceived),
            5 => Some(Self::Established),
            6 => Some(Self::FinWait1),
            7 => Some(Self::FinWait2),
            8 => Some(Self::CloseWait),
            9 => Some(Self::Closing),
            10 => Some(Self::LastAck),
            11 => Some(Self::TimeWait),
            12 => Some(Self::DeleteTcb),
            _ => None,
        }
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
            Self::FinWait1 => "FIN_WAIT1",
            Self::FinWait2 => "FIN_WAIT2",
            Self::CloseWait => "CLOSE_WAIT",
            Self::Closing => "CLOSING",
            Self::LastAck => "LAST_ACK",
            Self::TimeWait => "TIME_WAIT",
            Self::DeleteTcb => "DELETE_TCB",
        };
        f.write_str(name)
    }
}

/// One decoded row of the TCP table.
///
/// Transient: produced per poll and discarded after snapshot filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport state of the endpoint.
    pub state: TcpState,
    /// Local port, already reduced to host order.
    pub local_port: u16,
    /// Owning process id as reported by the kernel; `0` when unknown.
    pub owner_pid: i32,
}

/// Address family of the table to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// The IPv4 TCP table.
    #[default]
    Ipv4,
    /// The IPv6 TCP table. Accepted by configuration, but no native decoder
    /// exists for its row layout yet.
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("ipv4"),
            Self::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// Produces the endpoints currently known to the kernel, one batch per poll.
///
/// Implementations must return the full table every call; the snapshot layer
/// owns filtering and deduplication.
pub trait EndpointSource {
    /// Query the kernel table and decode every row.
    fn endpoints(&mut self) -> ScanResult<Vec<Endpoint>>;
}

impl<T: EndpointSource + ?Sized> EndpointSource for Box<T> {
    fn endpoints(&mut self) -> ScanResult<Vec<Endpoint>> {
        (**self).endpoints()
    }
}
