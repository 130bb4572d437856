use thiserror::Error;

use crate::core::handle::CmdOutput;

/// Core error types for nftjson
///
/// A non-zero status from `nft` is not an error at the handle level; callers
/// branch on [`CmdOutput::rc`]. [`Error::Nftables`] is what the higher level
/// recipes return once they have decided a failed status is fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// nftables reported a failure
    #[error("nftables error: {message}")]
    Nftables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// nft succeeded but printed nothing where a document was expected
    #[error("no output from nftables for '{command}'")]
    EmptyOutput { command: String },

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Document does not have the libnftables JSON envelope
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Builds an [`Error::Nftables`] from a failed call.
    pub fn from_failed_call(command: &str, output: &CmdOutput) -> Self {
        let stderr = output.error.trim();
        let message = if stderr.is_empty() {
            format!("'{command}' exited with status {}", output.rc)
        } else {
            stderr.to_string()
        };
        Self::Nftables {
            message,
            stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
            exit_code: Some(output.rc),
        }
    }

    /// Returns the native error text, if this error carries one.
    pub fn native_stderr(&self) -> Option<&str> {
        match self {
            Self::Nftables { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

/// Structural problems with a libnftables JSON document
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("document root is not a JSON object")]
    NotAnObject,

    #[error("missing nftables array")]
    MissingNftablesArray,

    #[error("entry {index} is not a JSON object")]
    EntryNotObject { index: usize },

    #[error("entry {index} must have exactly one key, found {count}")]
    EntryKeyCount { index: usize, count: usize },

    #[error("invalid json_schema_version: {0}")]
    InvalidSchemaVersion(String),
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Database of nftables error patterns and their translations
pub struct NftablesErrorPattern;

impl NftablesErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            return ErrorTranslation::new("Insufficient permissions to talk to nftables")
                .with_suggestion("Run as root, or let nftjson elevate with run0/sudo/pkexec")
                .with_suggestion("Force a method with NFTJSON_ELEVATION_METHOD=sudo")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Quick_reference-nftables_in_10_minutes");
        }

        if lower.contains("cache initialization failed") {
            return ErrorTranslation::new(
                "Failed to initialize nftables cache - insufficient privileges",
            )
            .with_suggestion("Listing the ruleset needs the same privileges as changing it")
            .with_suggestion("Ensure pkexec is installed: sudo apt install policykit-1")
            .with_help("https://wiki.archlinux.org/title/Polkit");
        }

        // nft reports a missing table, chain or rule handle as ENOENT
        if lower.contains("could not process rule") && lower.contains("no such file") {
            return ErrorTranslation::new("Referenced table, chain or rule handle not found")
                .with_suggestion("Handles change when the ruleset is reloaded")
                .with_suggestion("List with --handle output right before deleting");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("nftables is not installed or not found in PATH")
                .with_suggestion("Install nftables: sudo apt install nftables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install nftables  (Fedora/RHEL)")
                .with_suggestion("Or: sudo pacman -S nftables  (Arch)")
                .with_suggestion("Or point NFTJSON_NFT_COMMAND at the nft binary")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Main_Page");
        }

        if lower.contains("could not process rule") || lower.contains("syntax error") {
            return ErrorTranslation::new("nftables could not parse the command")
                .with_suggestion("Try the same command with `nft` directly to see the caret marker")
                .with_suggestion("JSON documents must follow libnftables-json(5)")
                .with_help(
                    "https://wiki.nftables.org/wiki-nftables/index.php/Simple_rule_management",
                );
        }

        if lower.contains("unknown expression type") || lower.contains("invalid expression") {
            return ErrorTranslation::new("Invalid rule expression in JSON document")
                .with_suggestion("Every expr entry is an object with a single key, e.g. {\"accept\": null}")
                .with_suggestion("Match expressions need left, right and usually op")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/JSON_API");
        }

        if lower.contains("json") && (lower.contains("parse") || lower.contains("decode")) {
            return ErrorTranslation::new("nftables rejected the JSON document")
                .with_suggestion("Run `nftjson validate <file>` to check the document envelope")
                .with_suggestion("Check for missing quotes, brackets, or commas");
        }

        if lower.contains("table") && lower.contains("does not exist") {
            return ErrorTranslation::new("Firewall table does not exist")
                .with_suggestion("Create the table before adding chains or rules to it")
                .with_suggestion("List tables with: nftjson cmd --json list tables")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Configuring_tables");
        }

        if lower.contains("chain")
            && (lower.contains("does not exist") || lower.contains("not found"))
        {
            return ErrorTranslation::new("Firewall chain not found")
                .with_suggestion("Ensure the chain exists before adding rules to it")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Configuring_chains");
        }

        if lower.contains("resource busy") || lower.contains("device or resource busy") {
            return ErrorTranslation::new("Firewall resource is busy")
                .with_suggestion("Another process may be modifying nftables")
                .with_suggestion("Wait a moment and try again")
                .with_suggestion(
                    "Check for conflicting firewall managers: sudo systemctl status firewalld ufw",
                );
        }

        if lower.contains("conflict") || lower.contains("already exists") {
            return ErrorTranslation::new("Conflicting firewall object")
                .with_suggestion("An object with the same name already exists")
                .with_suggestion("Use 'flush' or 'delete' before re-adding it");
        }

        if lower.contains("netlink") {
            return ErrorTranslation::new("Communication error with kernel netlink interface")
                .with_suggestion("Check kernel modules: lsmod | grep nf_tables")
                .with_suggestion("Load nf_tables module: sudo modprobe nf_tables")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting");
        }

        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify nftables is working: sudo nft list ruleset")
            .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
