//! Error types for TCP table scanning.

use thiserror::Error;

use super::endpoint::AddressFamily;

/// Errors from TCP table acquisition and decoding.
///
/// Every variant is recoverable at the scheduler boundary: a failed tick is
/// reported and the loop keeps polling.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The native table query failed or returned a non-success status.
    #[error("TCP table query failed with status {status}")]
    OsQuery {
        /// Status code returned by the native query.
        status: u32,
    },

    /// The buffer is shorter than its declared entry count implies.
    #[error("malformed TCP table: {declared} declared entries do not fit in {len} bytes")]
    MalformedTable {
        /// Entry count declared in the table header.
        declared: u32,
        /// Actual length of the buffer in bytes.
        len: usize,
    },

    /// No native table source exists for the requested address family.
    #[error("no TCP table source for address family {0}")]
    UnsupportedFamily(AddressFamily),

    /// The monitor loop has stopped and can no longer serve requests.
    #[error("monitor is not running")]
    MonitorStopped,

    /// I/O error while reading the kernel table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scanning operations.
pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_query_error_carries_status() {
        let err = ScanError::OsQuery { status: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_malformed_table_error_carries_both_numbers() {
        let err = ScanError::MalformedTable {
            declared: 40,
            len: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_unsupported_family_error() {
        let err = ScanError::UnsupportedFamily(AddressFamily::Ipv6);
        assert!(err.to_string().contains("ipv6"));
    }
}
