//! Privilege elevation for nft invocations
//!
//! Talking to the kernel's nf_tables subsystem needs `CAP_NET_ADMIN`, even for
//! read-only commands like `list ruleset`. nftjson runs as the invoking user
//! and only elevates the `nft` process itself.
//!
//! # Elevation Strategy
//!
//! - **Root**: `nft` is executed directly
//! - **Preferred**: `run0` when available (systemd v256+, no SUID)
//! - **Terminal fallback**: `sudo`
//! - **Non-terminal fallback**: `pkexec`
//!
//! # Environment Variables
//!
//! - `NFTJSON_ELEVATION_METHOD`: Force a specific elevation method (`sudo`, `run0`, or `pkexec`).
//!   Useful for scripts with sudoers NOPASSWD rules.
//! - `NFTJSON_NFT_COMMAND`: Path of the `nft` binary to run (test doubles, custom builds).
//! - `NFTJSON_TEST_NO_ELEVATION`: Bypass elevation entirely (for testing only).
//!
//! Packagers can bake in the `nft` path with `NFTJSON_SYSTEM_NFT_PATH` at build time.
//!
//! # Example
//!
//! ```no_run
//! use nftjson::elevation::create_elevated_nft_command;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cmd = create_elevated_nft_command(&["--json", "list", "ruleset"])?;
//! let output = cmd.output().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// pkexec binary not found in PATH
    #[error("pkexec not found - please install PolicyKit")]
    PkexecNotFound,

    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `NFTJSON_ELEVATION_METHOD`
    #[error("Invalid NFTJSON_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec")]
    InvalidMethod(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Methods accepted by `NFTJSON_ELEVATION_METHOD`
const ELEVATION_METHODS: [&str; 3] = ["sudo", "run0", "pkexec"];

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Resolves which `nft` binary to run.
///
/// Runtime override first, then the build-time packager path, then `nft` from PATH.
pub fn nft_program() -> String {
    if let Ok(path) = std::env::var("NFTJSON_NFT_COMMAND")
        && !path.is_empty()
    {
        return path;
    }
    option_env!("NFTJSON_SYSTEM_NFT_PATH")
        .unwrap_or("nft")
        .to_string()
}

fn wrapped(launcher: &str, program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(launcher);
    cmd.arg(program).args(args);
    cmd
}

/// Builds the command for `program`, wrapped in an elevation launcher when needed.
fn build_elevated_command(program: &str, args: &[&str]) -> Result<Command, ElevationError> {
    use std::os::fd::AsFd;

    // 1. Test mode
    if std::env::var("NFTJSON_TEST_NO_ELEVATION").is_ok() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 2. Already root
    if nix::unistd::getuid().is_root() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 3. Explicit method
    if let Ok(method) = std::env::var("NFTJSON_ELEVATION_METHOD") {
        let method = method.to_lowercase();
        if !method.is_empty() {
            if !ELEVATION_METHODS.contains(&method.as_str()) {
                return Err(ElevationError::InvalidMethod(method));
            }
            if !binary_exists(&method) {
                return Err(ElevationError::MethodNotAvailable(method));
            }
            tracing::debug!("Elevating {program} with {method} (forced)");
            return Ok(wrapped(&method, program, args));
        }
    }

    // 4. Automatic detection
    if binary_exists("run0") {
        return Ok(wrapped("run0", program, args));
    }

    let is_atty = nix::unistd::isatty(std::io::stdin().as_fd()).unwrap_or(false);
    if is_atty {
        Ok(wrapped("sudo", program, args))
    } else {
        if !binary_exists("pkexec") {
            return Err(ElevationError::PkexecNotFound);
        }
        Ok(wrapped("pkexec", program, args))
    }
}

/// Creates an elevated `nft` command with the specified arguments
///
/// Arguments are passed directly without shell interpretation. Command text
/// should go through stdin (`-f -`) rather than argv so it is never split or
/// re-quoted.
///
/// # Errors
///
/// Returns `Err` if the forced elevation method is unknown or missing, or if
/// no launcher is available for a non-terminal session.
pub fn create_elevated_nft_command(args: &[&str]) -> Result<Command, ElevationError> {
    build_elevated_command(&nft_program(), args)
}
