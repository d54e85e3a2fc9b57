//! Native endpoint sources and name resolvers.
//!
//! Each platform module exposes a `native_scanner` constructor; this module
//! picks the right one at compile time. The boxed scanner type erases the
//! per-platform source and resolver so callers stay platform-neutral.

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(windows)]
pub mod windows;

use super::endpoint::{AddressFamily, EndpointSource};
use super::error::ScanResult;
use super::process::NameResolver;
use super::scheduler::Scanner;

/// Scanner over this platform's native table source and name resolver.
pub type NativeScanner = Scanner<Box<dyn EndpointSource + Send>, Box<dyn NameResolver + Send>>;

/// Build the native scanner for this platform and address family.
///
/// Fails with [`super::error::ScanError::UnsupportedFamily`] when the
/// platform has no decoder for the requested table.
pub fn native_scanner(family: AddressFamily) -> ScanResult<NativeScanner> {
    #[cfg(target_os = "linux")]
    {
        linux::native_scanner(family)
    }

    #[cfg(windows)]
    {
        windows::native_scanner(family)
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    {
        Err(super::error::ScanError::UnsupportedFamily(family))
    }
}
