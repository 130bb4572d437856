//! nftjson - nftables through its JSON interface
//!
//! Hands command buffers to `nft`, collects the status code, output text and
//! error text, and decodes libnftables JSON output. The rule compiler, the
//! netlink protocol and the JSON schema all stay inside nftables.
//!
//! # Architecture
//!
//! - [`core`] - The handle, output flags, JSON helpers and recipes
//! - [`elevation`] - Running `nft` with the privileges it needs
//! - [`audit`] - Audit log of submitted commands
//! - [`validators`] - Input checks before anything is spawned
//! - [`config`] - Configuration persistence
//! - [`utils`] - XDG directories and string helpers

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::error::{Error, Result};
pub use crate::core::flags::OutputFlags;
pub use crate::core::handle::{CmdOutput, JsonCmdOutput, NftRunner, Nftables, ProcessRunner};
