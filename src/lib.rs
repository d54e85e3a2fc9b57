//! portwatch: TCP listening-port monitor engine.
//!
//! This crate discovers which local TCP ports are in the LISTEN state and
//! which process owns each one, then reports changes (ports opened or
//! closed) between successive scans of the kernel's TCP table.
//!
//! # Architecture
//!
//! - **Monitor**: the acquisition and diffing engine — sized-query table
//!   reader, record parser, snapshot builder, diff engine, and the polling
//!   scheduler that ties them together
//! - **Platform**: native table sources and process-name resolvers for the
//!   host OS, behind seams the engine never sees past
//! - **Config**: hierarchical TOML configuration for the polling interval
//!   and table family
//!
//! The engine exposes only structured [`monitor::Snapshot`] and
//! [`monitor::Delta`] values, never formatted text, so any presentation
//! layer can consume it.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod monitor;
