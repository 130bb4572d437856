//! Core nftables functionality
//!
//! - [`handle`]: The [`Nftables`](handle::Nftables) handle and its runner seam
//! - [`flags`]: libnftables output flags and their `nft` switches
//! - [`schema`]: libnftables JSON envelope checks and typed views
//! - [`recipes`]: Ready-made read, load and delete call sequences
//! - [`verify`]: Dry-run document checks
//! - [`error`]: Error types and nft error translation

pub mod error;
pub mod flags;
pub mod handle;
pub mod recipes;
pub mod schema;
pub mod verify;

#[cfg(test)]
pub mod test_helpers;
