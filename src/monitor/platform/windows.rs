//! Windows endpoint source backed by `GetExtendedTcpTable`.
//!
//! The iphlpapi call is the canonical two-phase sized query: invoked with no
//! buffer it reports `ERROR_INSUFFICIENT_BUFFER` and the required size, then
//! fills a caller-provided buffer with a `MIB_TCPTABLE_OWNER_PID` — exactly
//! the count-prefixed 24-byte-row layout the portable parser decodes.

use std::ffi::c_void;
use std::path::Path;

use windows::Win32::Foundation::{CloseHandle, ERROR_INSUFFICIENT_BUFFER};
use windows::Win32::NetworkManagement::IpHelper::{GetExtendedTcpTable, TCP_TABLE_CLASS};
use windows::Win32::Networking::WinSock::AF_INET;
use windows::Win32::System::ProcessStatus::GetModuleFileNameExW;
use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};

use crate::monitor::endpoint::{AddressFamily, EndpointSource};
use crate::monitor::error::{ScanError, ScanResult};
use crate::monitor::process::NameResolver;
use crate::monitor::scheduler::Scanner;
use crate::monitor::table::{FetchOutcome, OwnerPidTable, SizedQuery};

use super::NativeScanner;

/// Table class returning all rows with owning pids.
const TCP_TABLE_OWNER_PID_ALL: TCP_TABLE_CLASS = TCP_TABLE_CLASS(5);

/// Sized query over the IPv4 owner-pid TCP table.
pub struct IpHelperQuery;

impl SizedQuery for IpHelperQuery {
    fn probe(&mut self) -> ScanResult<usize> {
        let mut size: u32 = 0;
        let status = unsafe {
            GetExtendedTcpTable(
                None,
                &mut size,
                false,
                AF_INET.0 as u32,
                TCP_TABLE_OWNER_PID_ALL,
                0,
            )
        };

        if status != 0 && status != ERROR_INSUFFICIENT_BUFFER.0 {
            return Err(ScanError::OsQuery { status });
        }
        Ok(size as usize)
    }

    fn fetch(&mut self, buf: &mut [u8]) -> ScanResult<FetchOutcome> {
        let mut size = buf.len() as u32;
        let status = unsafe {
            GetExtendedTcpTable(
                Some(buf.as_mut_ptr() as *mut c_void),
                &mut size,
                false,
                AF_INET.0 as u32,
                TCP_TABLE_OWNER_PID_ALL,
                0,
            )
        };

        match status {
            0 => Ok(FetchOutcome::Filled(size as usize)),
            s if s == ERROR_INSUFFICIENT_BUFFER.0 => Ok(FetchOutcome::NeedsSize(size as usize)),
            s => Err(ScanError::OsQuery { status: s }),
        }
    }
}

/// Name resolver via `OpenProcess` + the process image file name.
///
/// Returns the file stem of the main module path, matching what the task
/// manager shows. System processes that deny `OpenProcess` resolve to `None`.
pub struct ProcessImageResolver;

impl NameResolver for ProcessImageResolver {
    fn resolve(&mut self, pid: i32) -> Option<String> {
        if pid <= 0 {
            return None;
        }

        unsafe {
            let handle =
                OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid as u32).ok()?;

            let mut buf = [0u16; 260];
            let len = GetModuleFileNameExW(handle, None, &mut buf);
            let _ = CloseHandle(handle);

            if len == 0 {
                return None;
            }

            let path = String::from_utf16_lossy(&buf[..len as usize]);
            Path::new(&path)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        }
    }
}

/// Build the Windows native scanner.
pub fn native_scanner(family: AddressFamily) -> ScanResult<NativeScanner> {
    match family {
        AddressFamily::Ipv4 => Ok(Scanner::new(
            Box::new(OwnerPidTable::new(IpHelperQuery)) as Box<dyn EndpointSource + Send>,
            Box::new(ProcessImageResolver) as Box<dyn NameResolver + Send>,
        )),
        other => Err(ScanError::UnsupportedFamily(other)),
    }
}
