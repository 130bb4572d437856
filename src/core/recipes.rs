//! Ready-made call sequences against a handle
//!
//! Each recipe configures the handle it is given, runs one or more commands
//! and decodes the JSON that comes back:
//!
//! - [`read_ruleset`]: `list ruleset` as raw text and as a decoded document
//! - [`read_counters_and_quotas`]: named counters and quotas
//! - [`load_ruleset`]: validate and submit a JSON ruleset
//! - [`delete_rules_with_counter`]: find rules by content, delete them by handle

use serde_json::Value;
use tracing::{info, warn};

use crate::core::error::{Error, Result};
use crate::core::flags::OutputFlags;
use crate::core::handle::{CmdOutput, JsonCmdOutput, NftRunner, Nftables};
use crate::core::schema::{self, CommandBatch, Counter, Family, Quota, Rule, RuleRef};

/// Minimal ruleset from libnftables-json(5): one table, one chain, `tcp dport 22 accept`.
pub const EXAMPLE_RULESET_JSON: &str = r#"{ "nftables": [
    { "flush": { "ruleset": null } },
    { "add": { "table": {
        "family": "inet",
        "name": "mytable"
    }}},
    { "add": { "chain": {
        "family": "inet",
        "table": "mytable",
        "name": "mychain"
    }}},
    { "add": { "rule": {
        "family": "inet",
        "table": "mytable",
        "chain": "mychain",
        "expr": [
            { "match": {
                "op": "==",
                "left": { "payload": {
                    "protocol": "tcp",
                    "field": "dport"
                }},
                "right": 22
            }},
            { "accept": null }
        ]
    }}}
]}"#;

/// Three port rules in one chain, only the ssh one carrying a counter.
pub const COUNTER_RULESET_JSON: &str = r#"{ "nftables": [
    { "flush": { "ruleset": null } },
    { "add": { "table": {
        "family": "inet",
        "name": "mytable"
    }}},
    { "add": { "chain": {
        "family": "inet",
        "table": "mytable",
        "name": "mychain"
    }}},
    { "add": { "rule": {
        "family": "inet",
        "table": "mytable",
        "chain": "mychain",
        "expr": [
            { "match": {
                "op": "==",
                "left": { "payload": { "protocol": "udp", "field": "dport" }},
                "right": 53
            }},
            { "accept": null }
        ]
    }}},
    { "add": { "rule": {
        "family": "inet",
        "table": "mytable",
        "chain": "mychain",
        "expr": [
            { "match": {
                "op": "==",
                "left": { "payload": { "protocol": "tcp", "field": "dport" }},
                "right": 22
            }},
            { "counter": null },
            { "accept": null }
        ]
    }}},
    { "add": { "rule": {
        "family": "inet",
        "table": "mytable",
        "chain": "mychain",
        "expr": [
            { "match": {
                "op": "==",
                "left": { "payload": { "protocol": "tcp", "field": "dport" }},
                "right": 80
            }},
            { "accept": null }
        ]
    }}}
]}"#;

/// `list ruleset` output, raw and decoded
#[derive(Debug, Clone)]
pub struct RulesetDump {
    pub raw: String,
    pub document: Value,
}

/// Puts the handle in the mode the read recipes expect, keeping handle output as is.
fn configure_reader<R: NftRunner>(nft: &mut Nftables<R>) {
    let handle = nft.handle_output();
    nft.set_output_flags(OutputFlags {
        handle,
        ..OutputFlags::json_reader()
    });
}

/// Runs a listing command and decodes its JSON output.
async fn list_json<R: NftRunner>(nft: &Nftables<R>, command: &str) -> Result<(String, Value)> {
    let result = nft.cmd(command).await?;
    if !result.is_success() {
        return Err(Error::from_failed_call(command, &result));
    }
    if result.output_is_empty() {
        return Err(Error::EmptyOutput {
            command: command.to_string(),
        });
    }

    let document: Value = serde_json::from_str(&result.output)?;
    schema::check_schema_version(&document);
    Ok((result.output, document))
}

/// Reads the whole ruleset as libnftables JSON.
///
/// # Errors
///
/// Returns `Err` if nft fails, prints nothing, or prints something that is
/// not JSON.
pub async fn read_ruleset<R: NftRunner>(nft: &mut Nftables<R>) -> Result<RulesetDump> {
    configure_reader(nft);
    let (raw, document) = list_json(nft, "list ruleset").await?;
    info!(
        "Read ruleset: {} entries",
        schema::entries(&document).map(Vec::len).unwrap_or(0)
    );
    Ok(RulesetDump { raw, document })
}

/// Reads all named counters and quotas.
///
/// # Errors
///
/// Returns `Err` if either listing fails or an object does not decode.
pub async fn read_counters_and_quotas<R: NftRunner>(
    nft: &mut Nftables<R>,
) -> Result<(Vec<Counter>, Vec<Quota>)> {
    configure_reader(nft);

    let (_, counters_doc) = list_json(nft, "list counters").await?;
    let counters: Vec<Counter> = schema::decode_objects(&counters_doc, "counter")?;

    let (_, quotas_doc) = list_json(nft, "list quotas").await?;
    let quotas: Vec<Quota> = schema::decode_objects(&quotas_doc, "quota")?;

    info!("Read {} counter(s), {} quota(s)", counters.len(), quotas.len());
    Ok((counters, quotas))
}

/// Submits a prepared document and turns a failed status into an error.
async fn submit<R: NftRunner>(nft: &Nftables<R>, document: &Value) -> Result<JsonCmdOutput> {
    nft.json_validate(document)?;

    let result = nft.json_cmd(document).await?;
    if !result.is_success() {
        let failed = CmdOutput {
            rc: result.rc,
            output: String::new(),
            error: result.error,
        };
        return Err(Error::from_failed_call("json command", &failed));
    }
    if let Some(output) = &result.output {
        warn!("Unexpected output from nft: {output}");
    }
    Ok(result)
}

/// Decodes, validates and loads a libnftables JSON ruleset.
///
/// # Errors
///
/// Returns `Err` if the text is not JSON, the envelope is malformed, or nft
/// rejects the document.
pub async fn load_ruleset<R: NftRunner>(nft: &Nftables<R>, json_text: &str) -> Result<JsonCmdOutput> {
    let document: Value = serde_json::from_str(json_text)?;
    info!(
        "Loading ruleset with {} command(s)",
        schema::entries(&document).map(Vec::len).unwrap_or(0)
    );
    submit(nft, &document).await
}

/// Rules carrying a counter statement, addressed by handle.
///
/// Rules listed without a handle are skipped with a warning.
pub fn rules_with_counter(document: &Value) -> Result<Vec<RuleRef>> {
    let rules: Vec<Rule> = schema::decode_objects(document, "rule")?;
    Ok(rules
        .iter()
        .filter(|rule| rule.has_counter())
        .filter_map(|rule| {
            let reference = rule.reference();
            if reference.is_none() {
                warn!(
                    "Rule in {} {} {} has a counter but no handle, skipping",
                    rule.family, rule.table, rule.chain
                );
            }
            reference
        })
        .collect())
}

/// Restricts which rules the delete recipe touches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub family: Option<Family>,
    pub table: Option<String>,
}

impl RuleFilter {
    pub fn matches(&self, rule: &RuleRef) -> bool {
        self.family.is_none_or(|family| family == rule.family)
            && self.table.as_deref().is_none_or(|table| table == rule.table)
    }
}

/// Deletes every rule that has a counter statement.
///
/// Lists the ruleset with handles, builds one `delete rule` batch and submits
/// it. Returns the rules that were deleted; with no match nothing is submitted.
///
/// # Errors
///
/// Returns `Err` if listing or deletion fails.
pub async fn delete_rules_with_counter<R: NftRunner>(
    nft: &mut Nftables<R>,
) -> Result<Vec<RuleRef>> {
    delete_rules_with_counter_in(nft, &RuleFilter::default()).await
}

/// [`delete_rules_with_counter`], limited to rules `filter` matches.
///
/// # Errors
///
/// Returns `Err` if listing or deletion fails.
pub async fn delete_rules_with_counter_in<R: NftRunner>(
    nft: &mut Nftables<R>,
    filter: &RuleFilter,
) -> Result<Vec<RuleRef>> {
    nft.set_json_output(true);
    nft.set_handle_output(true);
    // Stateless listings print every counter as null
    nft.set_stateless_output(false);

    let (_, document) = list_json(nft, "list ruleset").await?;
    let mut targets = rules_with_counter(&document)?;
    targets.retain(|rule| filter.matches(rule));

    if targets.is_empty() {
        info!("No rules with a counter found, nothing to delete");
        return Ok(targets);
    }

    let mut batch = CommandBatch::new();
    for rule in &targets {
        info!("Deleting rule {rule}");
        batch.delete_rule(rule);
    }

    submit(nft, &batch.into_value()).await?;
    Ok(targets)
}
