//! Raw TCP table acquisition and record decoding.
//!
//! The native interface is a two-phase sized query: one call with no buffer
//! to learn the required size, a second call to fill an allocation of that
//! size. Between the two calls the table can grow, so the fill call may
//! report a larger size; [`TableReader`] retries the sizing step once before
//! giving up.
//!
//! # Buffer layout
//!
//! The filled buffer starts with a 4-byte little-endian entry count, followed
//! by that many fixed 24-byte rows. Each row is six 32-bit fields in this
//! exact order: state, local address, local port, remote address, remote
//! port, owning pid. A wrong offset here silently corrupts every field after
//! it, which is why [`parse_owner_pid_table`] is pure over bytes and covered
//! by fixture tests.
//!
//! The port fields deserve special care: the port value sits in the
//! low-order two bytes of its 32-bit field **in network byte order**. The
//! correct decode byte-swaps those two bytes only, never the whole field —
//! `00 50 00 00` is port 80, not 20480.

use tracing::trace;

use super::endpoint::{Endpoint, EndpointSource, TcpState};
use super::error::{ScanError, ScanResult};

/// Length of the entry-count header that precedes the rows.
pub const TABLE_HEADER_LEN: usize = 4;

/// Length of one table row: six 32-bit fields.
pub const TABLE_ROW_LEN: usize = 24;

/// Status surfaced when the table keeps outgrowing the buffer.
const ERROR_INSUFFICIENT_BUFFER: u32 = 122;

/// Outcome of a single fill attempt against the native table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The buffer was filled with `0..len` bytes of table data.
    Filled(usize),
    /// The table no longer fits; a buffer of at least `needed` bytes is
    /// required.
    NeedsSize(usize),
}

/// Two-phase sized query against the native TCP table.
///
/// Implementations wrap the platform call; they never interpret the buffer.
pub trait SizedQuery {
    /// Ask the kernel how many bytes the current table occupies.
    fn probe(&mut self) -> ScanResult<usize>;

    /// Fill `buf` with the table, or report the size now required.
    fn fetch(&mut self, buf: &mut [u8]) -> ScanResult<FetchOutcome>;
}

/// Reads the raw table buffer, tolerating one growth between sizing and fill.
///
/// The buffer is an owned `Vec`, so it is released on every exit path,
/// including decode failures further down the pipeline.
pub struct TableReader<Q> {
    query: Q,
}

impl<Q: SizedQuery> TableReader<Q> {
    /// Wrap a sized query.
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Perform the two-phase read and return the raw table bytes.
    ///
    /// The fill call reports the required size through the same out-parameter
    /// as the probe, so a growth retry reuses that size instead of probing
    /// again. A second undersized fill surfaces [`ScanError::OsQuery`].
    pub fn read(&mut self) -> ScanResult<Vec<u8>> {
        let mut size = self.query.probe()?;

        for _ in 0..2 {
            let mut buf = vec![0u8; size];
            match self.query.fetch(&mut buf)? {
                FetchOutcome::Filled(len) => {
                    buf.truncate(len.min(buf.len()));
                    return Ok(buf);
                }
                FetchOutcome::NeedsSize(needed) => {
                    trace!(needed, have = size, "TCP table grew between sizing and fill");
                    size = needed;
                }
            }
        }

        Err(ScanError::OsQuery {
            status: ERROR_INSUFFICIENT_BUFFER,
        })
    }
}

/// Decode a raw owner-pid table buffer into endpoint records.
///
/// Fails with [`ScanError::MalformedTable`] when the declared entry count
/// would read past the end of the buffer. Trailing bytes beyond the declared
/// rows are ignored. Rows with a state value outside the documented range are
/// skipped rather than failing the whole table.
pub fn parse_owner_pid_table(buf: &[u8]) -> ScanResult<Vec<Endpoint>> {
    if buf.len() < TABLE_HEADER_LEN {
        return Err(ScanError::MalformedTable {
            declared: 0,
            len: buf.len(),
        });
    }

    let declared = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let body_len = (declared as usize)
        .checked_mul(TABLE_ROW_LEN)
        .and_then(|n| n.checked_add(TABLE_HEADER_LEN))
        .ok_or(ScanError::MalformedTable {
            declared,
            len: buf.len(),
        })?;

    if body_len > buf.len() {
        return Err(ScanError::MalformedTable {
            declared,
            len: buf.len(),
        });
    }

    let mut endpoints = Vec::with_capacity(declared as usize);
    for row in buf[TABLE_HEADER_LEN..body_len].chunks_exact(TABLE_ROW_LEN) {
        let raw_state = u32::from_le_bytes([row[0], row[1], row[2], row[3]]);
        // The port occupies the low-order two bytes of its field in network
        // byte order: swap those two bytes, not the whole DWORD.
        let local_port = u16::from_be_bytes([row[8], row[9]]);
        let owner_pid = i32::from_le_bytes([row[20], row[21], row[22], row[23]]);

        let state = match TcpState::from_u32(raw_state) {
            Some(state) => state,
            None => {
                trace!(raw_state, local_port, "skipping row with unknown TCP state");
                continue;
            }
        };

        endpoints.push(Endpoint {
            state,
            local_port,
            owner_pid,
        });
    }

    Ok(endpoints)
}

/// Endpoint source backed by a sized query over the native owner-pid table.
pub struct OwnerPidTable<Q> {
    reader: TableReader<Q>,
}

impl<Q: SizedQuery> OwnerPidTable<Q> {
    /// Build a source from a platform sized query.
    pub fn new(query: Q) -> Self {
        Self {
            reader: TableReader::new(query),
        }
    }
}

impl<Q: SizedQuery> EndpointSource for OwnerPidTable<Q> {
    fn endpoints(&mut self) -> ScanResult<Vec<Endpoint>> {
        let buf = self.reader.read()?;
        parse_owner_pid_table(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_row(state: u32, port: u16, pid: u32) -> [u8; TABLE_ROW_LEN] {
        let mut row = [0u8; TABLE_ROW_LEN];
        row[0..4].copy_from_slice(&state.to_le_bytes());
        // Port in the low-order two bytes of the field, network byte order.
        row[8..10].copy_from_slice(&port.to_be_bytes());
        row[20..24].copy_from_slice(&pid.to_le_bytes());
        row
    }

    fn encode_table(rows: &[[u8; TABLE_ROW_LEN]]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TABLE_HEADER_LEN + rows.len() * TABLE_ROW_LEN);
        buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        for row in rows {
            buf.extend_from_slice(row);
        }
        buf
    }

    #[test]
    fn test_port_field_byte_order() {
        // Captured layout: one LISTEN row whose port field bytes are
        // 00 50 00 00. The naive whole-DWORD read gives 20480; the correct
        // low-16-bits network-order read gives 80.
        let mut buf = vec![1u8, 0, 0, 0];
        let mut row = [0u8; TABLE_ROW_LEN];
        row[0] = 2; // LISTEN
        row[8] = 0x00;
        row[9] = 0x50;
        buf.extend_from_slice(&row);

        let endpoints = parse_owner_pid_table(&buf).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].local_port, 80);
        assert_ne!(endpoints[0].local_port, 20480);
    }

    #[test]
    fn test_parse_decodes_every_field() {
        let buf = encode_table(&[
            encode_row(2, 443, 4242),
            encode_row(5, 50123, 999),
        ]);

        let endpoints = parse_owner_pid_table(&buf).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(
            endpoints[0],
            Endpoint {
                state: TcpState::Listen,
                local_port: 443,
                owner_pid: 4242,
            }
        );
        assert_eq!(
            endpoints[1],
            Endpoint {
                state: TcpState::Established,
                local_port: 50123,
                owner_pid: 999,
            }
        );
    }

    #[test]
    fn test_parse_empty_table() {
        let buf = encode_table(&[]);
        assert!(parse_owner_pid_table(&buf).unwrap().is_empty());
    }

    #[test]
    fn test_declared_count_overruns_buffer() {
        let mut buf = encode_table(&[encode_row(2, 80, 1)]);
        // Claim three entries while carrying one.
        buf[0] = 3;

        let err = parse_owner_pid_table(&buf).unwrap_err();
        match err {
            ScanError::MalformedTable { declared, len } => {
                assert_eq!(declared, 3);
                assert_eq!(len, TABLE_HEADER_LEN + TABLE_ROW_LEN);
            }
            other => panic!("expected MalformedTable, got {other:?}"),
        }
    }

    #[test]
    fn test_buffer_shorter_than_header() {
        assert!(matches!(
            parse_owner_pid_table(&[0, 0]),
            Err(ScanError::MalformedTable { declared: 0, len: 2 })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut buf = encode_table(&[encode_row(2, 8080, 77)]);
        buf.extend_from_slice(&[0xAA; 7]);

        let endpoints = parse_owner_pid_table(&buf).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].local_port, 8080);
    }

    #[test]
    fn test_unknown_state_row_skipped() {
        let buf = encode_table(&[encode_row(99, 80, 1), encode_row(2, 443, 2)]);

        let endpoints = parse_owner_pid_table(&buf).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].local_port, 443);
    }

    /// Query whose table grows once between the sizing and fill calls.
    struct GrowingQuery {
        table: Vec<u8>,
    }

    impl SizedQuery for GrowingQuery {
        fn probe(&mut self) -> ScanResult<usize> {
            // Report the stale, smaller size the first time around.
            Ok(self.table.len() - TABLE_ROW_LEN)
        }

        fn fetch(&mut self, buf: &mut [u8]) -> ScanResult<FetchOutcome> {
            if buf.len() < self.table.len() {
                return Ok(FetchOutcome::NeedsSize(self.table.len()));
            }
            buf[..self.table.len()].copy_from_slice(&self.table);
            Ok(FetchOutcome::Filled(self.table.len()))
        }
    }

    #[test]
    fn test_reader_retries_once_on_growth() {
        let table = encode_table(&[encode_row(2, 80, 1), encode_row(2, 443, 2)]);
        let mut reader = TableReader::new(GrowingQuery {
            table: table.clone(),
        });

        let buf = reader.read().unwrap();
        assert_eq!(buf, table);
        assert_eq!(parse_owner_pid_table(&buf).unwrap().len(), 2);
    }

    /// Query that reports a larger size on every fill attempt.
    struct StubbornQuery;

    impl SizedQuery for StubbornQuery {
        fn probe(&mut self) -> ScanResult<usize> {
            Ok(TABLE_HEADER_LEN)
        }

        fn fetch(&mut self, buf: &mut [u8]) -> ScanResult<FetchOutcome> {
            Ok(FetchOutcome::NeedsSize(buf.len() + TABLE_ROW_LEN))
        }
    }

    #[test]
    fn test_reader_gives_up_after_one_retry() {
        let mut reader = TableReader::new(StubbornQuery);

        let err = reader.read().unwrap_err();
        assert!(matches!(err, ScanError::OsQuery { status: 122 }));
    }

    #[test]
    fn test_owner_pid_table_source_end_to_end() {
        struct FixedQuery(Vec<u8>);

        impl SizedQuery for FixedQuery {
            fn probe(&mut self) -> ScanResult<usize> {
                Ok(self.0.len())
            }

            fn fetch(&mut self, buf: &mut [u8]) -> ScanResult<FetchOutcome> {
                buf.copy_from_slice(&self.0);
                Ok(FetchOutcome::Filled(self.0.len()))
            }
        }

        let table = encode_table(&[encode_row(2, 22, 614)]);
        let mut source = OwnerPidTable::new(FixedQuery(table));

        let endpoints = source.endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].local_port, 22);
        assert_eq!(endpoints[0].owner_pid, 614);
    }
}
