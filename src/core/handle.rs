//! The nftables handle
//!
//! [`Nftables`] is the Rust counterpart of a libnftables context: a set of
//! output flags plus a way to hand a command buffer to nft and get back a
//! status code, the output text and the error text.
//!
//! ```no_run
//! use nftjson::core::handle::Nftables;
//!
//! # async fn example() -> nftjson::Result<()> {
//! let mut nft = Nftables::new();
//! nft.set_json_output(true);
//!
//! let result = nft.cmd("list ruleset").await?;
//! if result.is_success() {
//!     let document: serde_json::Value = serde_json::from_str(&result.output)?;
//!     println!("{document:#}");
//! } else {
//!     eprintln!("{}", result.error);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::process::Stdio;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::core::error::{Error, Result};
use crate::core::flags::OutputFlags;
use crate::core::schema;

/// Three-part result of a native call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    /// Exit status of nft; `-1` when it was killed by a signal
    pub rc: i32,
    pub output: String,
    pub error: String,
}

impl CmdOutput {
    pub fn is_success(&self) -> bool {
        self.rc == 0
    }

    /// True when nft printed nothing but whitespace.
    pub fn output_is_empty(&self) -> bool {
        self.output.trim().is_empty()
    }
}

/// Result of [`Nftables::json_cmd`]
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCmdOutput {
    pub rc: i32,
    /// Decoded output, `None` when nft printed nothing
    pub output: Option<Value>,
    pub error: String,
}

impl JsonCmdOutput {
    pub fn is_success(&self) -> bool {
        self.rc == 0
    }
}

/// Runs nft with a command buffer on stdin.
///
/// [`ProcessRunner`] is the real implementation; tests plug in scripted ones.
pub trait NftRunner {
    /// Runs nft with `args`, feeding `input` on stdin.
    ///
    /// A non-zero exit status is reported through [`CmdOutput::rc`], not `Err`.
    fn run(&self, args: &[String], input: &str) -> impl Future<Output = Result<CmdOutput>> + Send;
}

/// Spawns the nft binary, elevated when needed
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl NftRunner for ProcessRunner {
    async fn run(&self, args: &[String], input: &str) -> Result<CmdOutput> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = crate::elevation::create_elevated_nft_command(&argv)?;
        run_child(command, input).await
    }
}

/// Spawns `command`, feeds `input` on stdin and collects status, stdout and stderr.
///
/// Stdin is written while the output is drained. A child that exits before
/// reading all of its input still reports its own status and stderr.
async fn run_child(mut command: Command, input: &str) -> Result<CmdOutput> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            error!("Failed to spawn nft: {e}");
            Error::Internal(format!("Failed to spawn nft: {e}"))
        })?;

    let stdin = child.stdin.take();
    let feed = async move {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        match stdin.write_all(input.as_bytes()).await {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("nft closed stdin before reading the whole buffer");
                Ok(())
            }
            Err(e) => Err(Error::Internal(format!("Failed to write to nft stdin: {e}"))),
            Ok(()) => Ok(()),
        }
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    fed?;

    Ok(CmdOutput {
        rc: output.status.code().unwrap_or(-1),
        output: String::from_utf8_lossy(&output.stdout).into_owned(),
        error: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Handle to the nftables command interface
#[derive(Debug, Clone, Default)]
pub struct Nftables<R = ProcessRunner> {
    runner: R,
    flags: OutputFlags,
    dry_run: bool,
}

impl Nftables {
    /// Handle backed by the nft binary, all output flags off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle backed by the nft binary, with the configured default flags.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut nft = Self::new();
        nft.set_output_flags(config.output);
        nft
    }
}

macro_rules! output_flag {
    ($(#[$doc:meta])* $field:ident, $setter:ident) => {
        $(#[$doc])*
        /// Returns the previous value.
        pub fn $setter(&mut self, value: bool) -> bool {
            std::mem::replace(&mut self.flags.$field, value)
        }
    };
}

impl<R: NftRunner> Nftables<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            flags: OutputFlags::default(),
            dry_run: false,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn output_flags(&self) -> OutputFlags {
        self.flags
    }

    /// Replaces every output flag at once, returning the previous set.
    pub fn set_output_flags(&mut self, flags: OutputFlags) -> OutputFlags {
        std::mem::replace(&mut self.flags, flags)
    }

    output_flag!(
        /// Switches between libnftables JSON and text output.
        json, set_json_output
    );
    output_flag!(
        /// Shows object handles; needed to address rules for deletion.
        handle, set_handle_output
    );
    output_flag!(echo, set_echo_output);
    output_flag!(stateless, set_stateless_output);
    output_flag!(service, set_service_output);
    output_flag!(reversedns, set_reversedns_output);
    output_flag!(guid, set_guid_output);
    output_flag!(numeric_proto, set_numeric_proto_output);
    output_flag!(numeric_prio, set_numeric_prio_output);
    output_flag!(numeric_symbol, set_numeric_symbol_output);
    output_flag!(numeric_time, set_numeric_time_output);
    output_flag!(terse, set_terse_output);

    pub fn json_output(&self) -> bool {
        self.flags.json
    }

    pub fn handle_output(&self) -> bool {
        self.flags.handle
    }

    /// Only check commands (`nft --check`), never commit them.
    ///
    /// Returns the previous value.
    pub fn set_dry_run(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.dry_run, value)
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn args_for(&self, flags: OutputFlags) -> Vec<String> {
        let mut args: Vec<String> = flags.to_args().into_iter().map(String::from).collect();
        if self.dry_run {
            args.push("--check".to_string());
        }
        args.push("-f".to_string());
        args.push("-".to_string());
        args
    }

    /// Runs nft with explicit arguments, bypassing the handle's flags.
    pub(crate) async fn run_raw(&self, args: &[&str], input: &str) -> Result<CmdOutput> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        self.runner.run(&args, input).await
    }

    async fn run_with_flags(&self, flags: OutputFlags, command: &str) -> Result<CmdOutput> {
        crate::validators::validate_command_text(command).map_err(|message| {
            Error::Validation {
                field: "command".to_string(),
                message,
            }
        })?;

        let args = self.args_for(flags);
        debug!(
            "nft {} <<< {}",
            args.join(" "),
            crate::utils::truncate_string(command.trim(), 120)
        );

        let result = self.runner.run(&args, command).await?;
        if result.is_success() {
            debug!("nft returned {} bytes of output", result.output.len());
        } else {
            info!("nft exited with {}: {}", result.rc, result.error.trim());
        }
        Ok(result)
    }

    /// Submits a command buffer.
    ///
    /// The buffer may hold several newline-separated commands or a JSON
    /// document; nft decides how to parse it.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when nft could not be run at all, or the command
    /// text is unusable. A failing command comes back as `Ok` with a
    /// non-zero [`CmdOutput::rc`].
    pub async fn cmd(&self, command: &str) -> Result<CmdOutput> {
        self.run_with_flags(self.flags, command).await
    }

    /// Submits a JSON document with JSON output forced on for this call only.
    ///
    /// # Errors
    ///
    /// Same as [`Nftables::cmd`], plus `Err` when the document cannot be
    /// serialized or nft's output does not decode.
    pub async fn json_cmd(&self, document: &Value) -> Result<JsonCmdOutput> {
        let text = serde_json::to_string(document)?;
        let flags = OutputFlags {
            json: true,
            ..self.flags
        };

        let result = self.run_with_flags(flags, &text).await?;
        let output = if result.output_is_empty() {
            None
        } else {
            Some(serde_json::from_str(&result.output)?)
        };

        Ok(JsonCmdOutput {
            rc: result.rc,
            output,
            error: result.error,
        })
    }

    /// Checks a document's envelope before submission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] describing the first problem.
    pub fn json_validate(&self, document: &Value) -> Result<()> {
        schema::validate_document(document)?;
        Ok(())
    }
}
