//! Helpers for libnftables JSON documents
//!
//! Only the envelope is modelled here: a top-level object holding an
//! `nftables` array whose entries are single-key objects. What goes inside
//! each entry is defined by libnftables-json(5) and is left to nft itself.
//!
//! The typed views ([`Counter`], [`Quota`], [`Rule`]) cover the objects the
//! bundled recipes read back; everything else stays a [`serde_json::Value`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::core::error::SchemaError;

/// Schema version this crate understands.
pub const JSON_SCHEMA_VERSION: u64 = 1;

/// nftables address families
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Family {
    Ip,
    Ip6,
    Inet,
    Arp,
    Bridge,
    Netdev,
}

/// Top-level command verbs of a JSON batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Add,
    Create,
    Insert,
    Replace,
    Delete,
    Destroy,
    Flush,
    List,
    Reset,
    Rename,
}

/// Returns the `nftables` array of a document.
///
/// # Errors
///
/// Returns `Err` if the root is not an object or has no `nftables` array.
pub fn entries(doc: &Value) -> Result<&Vec<Value>, SchemaError> {
    let root = doc.as_object().ok_or(SchemaError::NotAnObject)?;
    root.get("nftables")
        .and_then(Value::as_array)
        .ok_or(SchemaError::MissingNftablesArray)
}

/// Checks the document envelope.
///
/// # Errors
///
/// Returns the first structural problem found.
pub fn validate_document(doc: &Value) -> Result<(), SchemaError> {
    for (index, entry) in entries(doc)?.iter().enumerate() {
        let object = entry
            .as_object()
            .ok_or(SchemaError::EntryNotObject { index })?;
        if object.len() != 1 {
            return Err(SchemaError::EntryKeyCount {
                index,
                count: object.len(),
            });
        }
        if let Some(metainfo) = object.get("metainfo")
            && let Some(version) = metainfo.get("json_schema_version")
            && version.as_u64().is_none()
        {
            return Err(SchemaError::InvalidSchemaVersion(version.to_string()));
        }
    }
    Ok(())
}

/// Returns every object of `kind`, unwrapped from its entry.
///
/// A document without an `nftables` array yields nothing.
pub fn find_objects<'a>(doc: &'a Value, kind: &str) -> Vec<&'a Value> {
    entries(doc)
        .map(|list| list.iter().filter_map(|entry| entry.get(kind)).collect())
        .unwrap_or_default()
}

/// Decodes every object of `kind` into `T`.
///
/// # Errors
///
/// Returns `Err` on the first object that does not fit `T`.
pub fn decode_objects<T: DeserializeOwned>(
    doc: &Value,
    kind: &str,
) -> Result<Vec<T>, serde_json::Error> {
    find_objects(doc, kind)
        .into_iter()
        .map(|object| T::deserialize(object))
        .collect()
}

/// Highest `json_schema_version` reported by the document's metainfo entries.
pub fn schema_version(doc: &Value) -> Option<u64> {
    find_objects(doc, "metainfo")
        .into_iter()
        .filter_map(|m| m.get("json_schema_version").and_then(Value::as_u64))
        .max()
}

/// Returns `false` (and logs a warning) when the producer speaks a newer schema.
pub fn check_schema_version(doc: &Value) -> bool {
    match schema_version(doc) {
        Some(version) if version > JSON_SCHEMA_VERSION => {
            warn!(
                "nftables reports json_schema_version {version}, this build understands {JSON_SCHEMA_VERSION}; output may be misread"
            );
            false
        }
        _ => true,
    }
}

/// A named stateful counter (`list counters`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub family: Family,
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub handle: Option<u64>,
    pub packets: u64,
    pub bytes: u64,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Counter \"{}\" in table {} {}: packets {} bytes {}",
            self.name, self.family, self.table, self.packets, self.bytes
        )
    }
}

/// A named quota (`list quotas`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub family: Family,
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub handle: Option<u64>,
    pub bytes: u64,
    pub used: u64,
    #[serde(default)]
    pub inv: bool,
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quota \"{}\" in table {} {}: used {} out of {} bytes (inv: {})",
            self.name, self.family, self.table, self.used, self.bytes, self.inv
        )
    }
}

/// A rule as listed by `list ruleset`
///
/// `handle` is only present when handle output is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub family: Family,
    pub table: String,
    pub chain: String,
    #[serde(default)]
    pub handle: Option<u64>,
    #[serde(default)]
    pub expr: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Rule {
    /// True when any statement of the rule is a counter.
    pub fn has_counter(&self) -> bool {
        self.expr
            .iter()
            .any(|e| e.get("counter").is_some_and(|c| !c.is_null()))
    }

    /// Address of this rule, if it was listed with its handle.
    pub fn reference(&self) -> Option<RuleRef> {
        self.handle.map(|handle| RuleRef {
            family: self.family,
            table: self.table.clone(),
            chain: self.chain.clone(),
            handle,
        })
    }
}

/// Everything needed to address a single rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub family: Family,
    pub table: String,
    pub chain: String,
    pub handle: u64,
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} handle {}",
            self.family, self.table, self.chain, self.handle
        )
    }
}

/// Builder for an outgoing JSON command batch
///
/// Every batch starts with a `metainfo` entry declaring [`JSON_SCHEMA_VERSION`].
#[derive(Debug, Clone)]
pub struct CommandBatch {
    commands: Vec<Value>,
}

impl Default for CommandBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBatch {
    pub fn new() -> Self {
        Self {
            commands: vec![json!({ "metainfo": { "json_schema_version": JSON_SCHEMA_VERSION } })],
        }
    }

    /// Appends `{ verb: { kind: object } }`.
    pub fn push(&mut self, verb: Verb, kind: &str, object: Value) -> &mut Self {
        let verb: &str = verb.as_ref();
        self.commands.push(json!({ verb: { kind: object } }));
        self
    }

    pub fn delete_rule(&mut self, rule: &RuleRef) -> &mut Self {
        self.push(
            Verb::Delete,
            "rule",
            json!({
                "family": rule.family,
                "table": rule.table,
                "chain": rule.chain,
                "handle": rule.handle,
            }),
        )
    }

    /// Number of commands, not counting the metainfo header.
    pub fn command_count(&self) -> usize {
        self.commands.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }

    pub fn into_value(self) -> Value {
        json!({ "nftables": self.commands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed_ruleset() -> Value {
        json!({ "nftables": [
            { "metainfo": { "version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1 } },
            { "table": { "family": "inet", "name": "mytable", "handle": 1 } },
            { "chain": { "family": "inet", "table": "mytable", "name": "mychain", "handle": 1 } },
            { "rule": { "family": "inet", "table": "mytable", "chain": "mychain", "handle": 2,
                "expr": [
                    { "match": { "op": "==", "left": { "payload": { "protocol": "udp", "field": "dport" } }, "right": 53 } },
                    { "accept": null }
                ] } },
            { "rule": { "family": "inet", "table": "mytable", "chain": "mychain", "handle": 3,
                "expr": [
                    { "match": { "op": "==", "left": { "payload": { "protocol": "tcp", "field": "dport" } }, "right": 22 } },
                    { "counter": { "packets": 4, "bytes": 240 } },
                    { "accept": null }
                ] } }
        ]})
    }

    #[test]
    fn test_validate_document_accepts_listing() {
        assert!(validate_document(&listed_ruleset()).is_ok());
    }

    #[test]
    fn test_validate_document_errors() {
        assert_eq!(validate_document(&json!([])), Err(SchemaError::NotAnObject));
        assert_eq!(
            validate_document(&json!({ "rules": [] })),
            Err(SchemaError::MissingNftablesArray)
        );
        assert_eq!(
            validate_document(&json!({ "nftables": [{ "flush": { "ruleset": null } }, 3] })),
            Err(SchemaError::EntryNotObject { index: 1 })
        );
        assert_eq!(
            validate_document(&json!({ "nftables": [{ "add": {}, "delete": {} }] })),
            Err(SchemaError::EntryKeyCount { index: 0, count: 2 })
        );
        assert!(matches!(
            validate_document(&json!({ "nftables": [{ "metainfo": { "json_schema_version": "one" } }] })),
            Err(SchemaError::InvalidSchemaVersion(_))
        ));
    }

    #[test]
    fn test_empty_batch_is_valid() {
        assert!(validate_document(&json!({ "nftables": [] })).is_ok());
    }

    #[test]
    fn test_find_objects() {
        let doc = listed_ruleset();
        assert_eq!(find_objects(&doc, "rule").len(), 2);
        assert_eq!(find_objects(&doc, "table")[0]["name"], "mytable");
        assert!(find_objects(&doc, "quota").is_empty());
        assert!(find_objects(&json!({ "other": [] }), "rule").is_empty());
    }

    #[test]
    fn test_rule_counter_detection() {
        let rules: Vec<Rule> = decode_objects(&listed_ruleset(), "rule").unwrap();
        assert!(!rules[0].has_counter());
        assert!(rules[1].has_counter());
        assert_eq!(
            rules[1].reference().unwrap().to_string(),
            "inet mytable mychain handle 3"
        );
    }

    #[test]
    fn test_null_counter_is_not_counted() {
        let rule = Rule {
            family: Family::Inet,
            table: "t".into(),
            chain: "c".into(),
            handle: None,
            expr: vec![json!({ "counter": null })],
            comment: None,
        };
        assert!(!rule.has_counter());
        assert!(rule.reference().is_none());
    }

    #[test]
    fn test_schema_version_check() {
        assert_eq!(schema_version(&listed_ruleset()), Some(1));
        assert!(check_schema_version(&listed_ruleset()));

        let newer = json!({ "nftables": [{ "metainfo": { "json_schema_version": 2 } }] });
        assert!(!check_schema_version(&newer));

        let none = json!({ "nftables": [] });
        assert_eq!(schema_version(&none), None);
        assert!(check_schema_version(&none));
    }

    #[test]
    fn test_counter_and_quota_display() {
        let doc = json!({ "nftables": [
            { "counter": { "family": "ip", "name": "mycounter", "table": "mytable", "handle": 1, "packets": 0, "bytes": 0 } },
            { "quota": { "family": "ip", "name": "myquota", "table": "mytable", "handle": 2, "bytes": 26_214_400, "used": 0, "inv": false } }
        ]});

        let counters: Vec<Counter> = decode_objects(&doc, "counter").unwrap();
        let quotas: Vec<Quota> = decode_objects(&doc, "quota").unwrap();

        assert_eq!(
            counters[0].to_string(),
            "Counter \"mycounter\" in table ip mytable: packets 0 bytes 0"
        );
        assert_eq!(
            quotas[0].to_string(),
            "Quota \"myquota\" in table ip mytable: used 0 out of 26214400 bytes (inv: false)"
        );
    }

    #[test]
    fn test_command_batch_delete_rules() {
        let mut batch = CommandBatch::new();
        assert!(batch.is_empty());

        batch.delete_rule(&RuleRef {
            family: Family::Inet,
            table: "mytable".into(),
            chain: "mychain".into(),
            handle: 3,
        });
        assert_eq!(batch.command_count(), 1);

        let doc = batch.into_value();
        assert!(validate_document(&doc).is_ok());
        assert_eq!(doc["nftables"][0]["metainfo"]["json_schema_version"], 1);
        assert_eq!(
            doc["nftables"][1],
            json!({ "delete": { "rule": { "family": "inet", "table": "mytable", "chain": "mychain", "handle": 3 } } })
        );
    }

    #[test]
    fn test_family_names() {
        assert_eq!(Family::Ip6.to_string(), "ip6");
        assert_eq!("netdev".parse::<Family>().unwrap(), Family::Netdev);
        assert_eq!(serde_json::to_value(Family::Bridge).unwrap(), "bridge");
    }
}
