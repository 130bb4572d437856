//! nftjson - nftables through its JSON interface
//!
//! # Usage
//!
//! ```bash
//! nftjson cmd -j list ruleset          # Run any nft command, print status/output/error
//! nftjson cmd -j --parse list tables   # Same, decode and pretty-print the JSON
//! nftjson read-json                    # Dump the ruleset as raw and decoded JSON
//! nftjson counters                     # Print named counters and quotas
//! nftjson load                         # Load the built-in example ruleset
//! nftjson load rules.json --check      # Dry-run a JSON ruleset file
//! nftjson delete-counter-rules         # Delete every rule that has a counter
//! nftjson delete-counter-rules --table mytable -c   # Preview deletions in one table
//! nftjson validate rules.json          # Check the JSON envelope locally
//! nftjson check rules.json             # Ask nft to check a document
//! nftjson audit                        # Show recent audit log entries
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use nftjson::audit::{self, AuditLog, EventType};
use nftjson::config::{self, AppConfig};
use nftjson::core::error::NftablesErrorPattern;
use nftjson::core::recipes::{self, RuleFilter};
use nftjson::core::schema::{self, CommandBatch, Family};
use nftjson::core::verify;
use nftjson::validators;
use nftjson::{Nftables, OutputFlags};
use tokio::io::AsyncReadExt;

shadow_rs::shadow!(build);

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "nftjson")]
#[command(version, about = "Drive nftables through its JSON interface", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not record this invocation in the audit log
    #[arg(long, global = true)]
    no_audit: bool,

    #[command(subcommand)]
    command: Commands,
}

/// nft output switches, on top of the configured defaults
#[derive(Args, Debug, Clone, Copy, Default)]
struct FlagArgs {
    /// Format output as libnftables JSON
    #[arg(short = 'j', long)]
    json: bool,
    /// Output object handles
    #[arg(short = 'a', long)]
    handle: bool,
    /// Echo what has been added, inserted or replaced
    #[arg(short = 'e', long)]
    echo: bool,
    /// Omit stateful information of the ruleset
    #[arg(short = 's', long)]
    stateless: bool,
    /// Translate ports to service names
    #[arg(short = 'S', long)]
    service: bool,
    /// Translate IP addresses to names
    #[arg(short = 'N', long)]
    reversedns: bool,
    /// Print UID/GID as defined in /etc/passwd and /etc/group
    #[arg(short = 'u', long)]
    guid: bool,
    /// Print layer 4 protocols numerically
    #[arg(short = 'p', long = "numeric-protocol")]
    numeric_proto: bool,
    /// Print chain priority numerically
    #[arg(short = 'y', long = "numeric-priority")]
    numeric_prio: bool,
    /// Print fully numerical output
    #[arg(short = 'n', long)]
    numeric: bool,
    /// Print time values numerically
    #[arg(short = 'T', long)]
    numeric_time: bool,
    /// Omit contents of sets
    #[arg(short = 't', long)]
    terse: bool,
}

impl FlagArgs {
    fn merge_into(self, base: OutputFlags) -> OutputFlags {
        OutputFlags {
            json: base.json || self.json,
            handle: base.handle || self.handle,
            echo: base.echo || self.echo,
            stateless: base.stateless || self.stateless,
            service: base.service || self.service,
            reversedns: base.reversedns || self.reversedns,
            guid: base.guid || self.guid,
            numeric_proto: base.numeric_proto || self.numeric_proto,
            numeric_prio: base.numeric_prio || self.numeric_prio,
            numeric_symbol: base.numeric_symbol || self.numeric,
            numeric_time: base.numeric_time || self.numeric_time,
            terse: base.terse || self.terse,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run an nft command and print status, output and error
    Cmd {
        #[command(flatten)]
        flags: FlagArgs,
        /// Check commands only, do not commit them
        #[arg(short = 'c', long)]
        check: bool,
        /// Decode JSON output and pretty-print it
        #[arg(long)]
        parse: bool,
        /// Read the command buffer from a file ('-' for stdin)
        #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "command")]
        file: Option<PathBuf>,
        /// Command words, e.g. `list ruleset`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the ruleset as raw libnftables JSON and as a decoded document
    ReadJson {
        /// Include rule handles
        #[arg(short = 'a', long)]
        handle: bool,
    },
    /// Print named counters and quotas
    Counters,
    /// Validate and load a JSON ruleset (built-in example when no file is given)
    Load {
        /// JSON ruleset file ('-' for stdin)
        file: Option<PathBuf>,
        /// Use the built-in example with a counter rule
        #[arg(long, conflicts_with = "file")]
        with_counters: bool,
        /// Check only, do not commit
        #[arg(short = 'c', long)]
        check: bool,
    },
    /// Delete every rule that has a counter statement
    DeleteCounterRules {
        /// Only rules in this address family
        #[arg(long, value_parser = validators::validate_family)]
        family: Option<Family>,
        /// Only rules in this table
        #[arg(long, value_parser = validators::validate_object_name)]
        table: Option<String>,
        /// Check only, do not commit
        #[arg(short = 'c', long)]
        check: bool,
    },
    /// Check a JSON document's envelope without running nft
    Validate {
        /// JSON document ('-' for stdin)
        file: PathBuf,
    },
    /// Ask nft to check a JSON document against the running ruleset
    Check {
        /// JSON document ('-' for stdin)
        file: PathBuf,
    },
    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recent audit log entries
    Audit {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show build information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init,
    /// Print the configuration file path
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            report_error(e.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured.parse().unwrap_or(tracing::Level::WARN),
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn report_error(e: &(dyn std::error::Error + 'static)) {
    eprintln!("Error: {e}");

    if let Some(nftjson::Error::Nftables { message, .. } | nftjson::Error::Internal(message)) =
        e.downcast_ref::<nftjson::Error>()
    {
        let translation = NftablesErrorPattern::match_error(message);
        eprintln!("{}", translation.user_message);
        for suggestion in &translation.suggestions {
            eprintln!("  - {suggestion}");
        }
        if let Some(url) = translation.help_url {
            eprintln!("  See: {url}");
        }
    }
}

fn exit_code(rc: i32) -> ExitCode {
    u8::try_from(rc).map_or(ExitCode::FAILURE, ExitCode::from)
}

/// Reads a file, or stdin for `-`.
async fn read_input(path: &Path) -> std::io::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(path).await
    }
}

async fn record(enabled: bool, event_type: EventType, command: &str, rc: Option<i32>, error: Option<String>) {
    if enabled {
        audit::log_command(event_type, command, rc, error).await;
    }
}

async fn run(cli: Cli) -> CliResult {
    let _ = nftjson::utils::ensure_dirs();
    let config = config::load_config().await;
    init_logging(cli.verbose, &config.log_level);

    let audit_enabled = config.audit_enabled && !cli.no_audit;
    let mut nft = Nftables::from_config(&config);

    match cli.command {
        Commands::Cmd {
            flags,
            check,
            parse,
            file,
            command,
        } => {
            let text = match file {
                Some(path) => read_input(&path).await?,
                None => command.join(" "),
            };

            nft.set_output_flags(flags.merge_into(config.output));
            nft.set_dry_run(check);

            let result = nft.cmd(&text).await?;
            if !check {
                let error = (!result.is_success()).then(|| result.error.trim().to_string());
                record(audit_enabled, EventType::RunCommand, &text, Some(result.rc), error).await;
            }

            if parse && !result.output_is_empty() {
                let document: serde_json::Value = serde_json::from_str(&result.output)?;
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                print!("{}", result.output);
            }
            eprint!("{}", result.error);
            Ok(exit_code(result.rc))
        }
        Commands::ReadJson { handle } => {
            nft.set_handle_output(handle);
            let dump = recipes::read_ruleset(&mut nft).await?;
            println!("raw libnftables JSON output:\n{}", dump.raw.trim_end());
            println!(
                "decoded document:\n{}",
                serde_json::to_string_pretty(&dump.document)?
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Counters => {
            let (counters, quotas) = recipes::read_counters_and_quotas(&mut nft).await?;
            for counter in &counters {
                println!("{counter}");
            }
            for quota in &quotas {
                println!("{quota}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Load {
            file,
            with_counters,
            check,
        } => {
            let (source, text) = match file {
                Some(path) => (path.display().to_string(), read_input(&path).await?),
                None if with_counters => (
                    "built-in counter example".to_string(),
                    recipes::COUNTER_RULESET_JSON.to_string(),
                ),
                None => (
                    "built-in example".to_string(),
                    recipes::EXAMPLE_RULESET_JSON.to_string(),
                ),
            };

            nft.set_dry_run(check);
            let result = recipes::load_ruleset(&nft, &text).await;
            if !check {
                let (rc, error) = match &result {
                    Ok(output) => (Some(output.rc), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                record(audit_enabled, EventType::LoadRuleset, &text, rc, error).await;
            }
            result?;

            if check {
                println!("Ruleset from {source} passed nft check");
            } else {
                println!("Loaded ruleset from {source}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::DeleteCounterRules {
            family,
            table,
            check,
        } => {
            nft.set_dry_run(check);
            let filter = RuleFilter { family, table };
            let deleted = match recipes::delete_rules_with_counter_in(&mut nft, &filter).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    if !check {
                        let rc = match &e {
                            nftjson::Error::Nftables { exit_code, .. } => *exit_code,
                            _ => None,
                        };
                        let attempted = format!("delete rules with counter {filter:?}");
                        let error = Some(e.to_string());
                        record(audit_enabled, EventType::DeleteRules, &attempted, rc, error).await;
                    }
                    return Err(e.into());
                }
            };

            if deleted.is_empty() {
                println!("No rules with a counter found");
                return Ok(ExitCode::SUCCESS);
            }

            if !check {
                let mut batch = CommandBatch::new();
                for rule in &deleted {
                    batch.delete_rule(rule);
                }
                let text = batch.into_value().to_string();
                record(audit_enabled, EventType::DeleteRules, &text, Some(0), None).await;
            }

            let verb = if check { "Would delete" } else { "Deleted" };
            println!("{verb} {} rule(s):", deleted.len());
            for rule in &deleted {
                println!("  {rule}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { file } => {
            let text = read_input(&file).await?;
            let document: serde_json::Value = serde_json::from_str(&text)?;
            nft.json_validate(&document)?;

            let count = schema::entries(&document).map_or(0, Vec::len);
            match schema::schema_version(&document) {
                Some(version) => println!("ok: {count} entries, json_schema_version {version}"),
                None => println!("ok: {count} entries"),
            }
            if !schema::check_schema_version(&document) {
                println!("warning: document declares a newer schema than this build understands");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { file } => {
            let text = read_input(&file).await?;
            let document: serde_json::Value = serde_json::from_str(&text)?;

            let result = verify::check_document(&nft, &document).await?;
            record(
                audit_enabled,
                EventType::CheckDocument,
                &text,
                None,
                (!result.success).then(|| result.errors.join("; ")),
            )
            .await;

            if result.success {
                println!("Document passed nft check");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Document failed nft check:");
                for error in &result.errors {
                    eprintln!("  {error}");
                }
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
                ConfigAction::Init => {
                    config::save_config(&AppConfig::default()).await?;
                    if let Some(path) = config::config_path() {
                        println!("Wrote {}", path.display());
                    }
                }
                ConfigAction::Path => match config::config_path() {
                    Some(path) => println!("{}", path.display()),
                    None => return Err("Could not determine config directory".into()),
                },
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Audit { count } => {
            let log = AuditLog::new()?;
            let events = match log.read_recent(count).await {
                Ok(events) => events,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            if events.is_empty() {
                println!("No audit entries in {}", log.path().display());
            }
            for event in events {
                let status = if event.success { "ok" } else { "FAILED" };
                println!(
                    "{} {:?} {status} {}{}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.details,
                    event.error.map(|e| format!(" ({e})")).unwrap_or_default()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("nftjson {}", build::PKG_VERSION);
            println!("commit:  {}{}", build::SHORT_COMMIT, if build::GIT_CLEAN { "" } else { "-dirty" });
            println!("built:   {}", build::BUILD_TIME);
            println!("nft:     {}", nftjson::elevation::nft_program());
            Ok(ExitCode::SUCCESS)
        }
    }
}
