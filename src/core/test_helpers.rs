//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::core::error::{Error, Result};
use crate::core::handle::{CmdOutput, NftRunner};

/// Mutex for tests that need exclusive access to environment variables.
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("NFTJSON_ELEVATION_METHOD", "sudo");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("NFTJSON_ELEVATION_METHOD");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// Runner that replays canned responses in order and records every call.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<CmdOutput>>,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl ScriptedRunner {
    pub fn new(responses: Vec<CmdOutput>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(args, stdin)` pair seen so far.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl NftRunner for ScriptedRunner {
    async fn run(&self, args: &[String], input: &str) -> Result<CmdOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((args.to_vec(), input.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Internal(format!("no scripted response for '{input}'")))
    }
}

/// Successful call printing `output`.
pub fn ok_output(output: &str) -> CmdOutput {
    CmdOutput {
        rc: 0,
        output: output.to_string(),
        error: String::new(),
    }
}

/// Failed call printing `error` on stderr.
pub fn failed_output(rc: i32, error: &str) -> CmdOutput {
    CmdOutput {
        rc,
        output: String::new(),
        error: error.to_string(),
    }
}

/// `nft -j -a list ruleset` after loading the counter example ruleset.
pub const LISTED_COUNTER_RULESET: &str = r#"{"nftables": [
  {"metainfo": {"version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1}},
  {"table": {"family": "inet", "name": "mytable", "handle": 1}},
  {"chain": {"family": "inet", "table": "mytable", "name": "mychain", "handle": 1}},
  {"rule": {"family": "inet", "table": "mytable", "chain": "mychain", "handle": 2,
    "expr": [{"match": {"op": "==", "left": {"payload": {"protocol": "udp", "field": "dport"}}, "right": 53}},
             {"accept": null}]}},
  {"rule": {"family": "inet", "table": "mytable", "chain": "mychain", "handle": 3,
    "expr": [{"match": {"op": "==", "left": {"payload": {"protocol": "tcp", "field": "dport"}}, "right": 22}},
             {"counter": {"packets": 0, "bytes": 0}},
             {"accept": null}]}},
  {"rule": {"family": "inet", "table": "mytable", "chain": "mychain", "handle": 4,
    "expr": [{"match": {"op": "==", "left": {"payload": {"protocol": "tcp", "field": "dport"}}, "right": 80}},
             {"accept": null}]}}
]}"#;

/// `nft -j list counters` with one named counter.
pub const LISTED_COUNTERS: &str = r#"{"nftables": [
  {"metainfo": {"version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1}},
  {"counter": {"family": "ip", "name": "mycounter", "table": "mytable", "handle": 1, "packets": 12, "bytes": 3400}}
]}"#;

/// `nft -j list quotas` with one named quota.
pub const LISTED_QUOTAS: &str = r#"{"nftables": [
  {"metainfo": {"version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1}},
  {"quota": {"family": "ip", "name": "myquota", "table": "mytable", "handle": 2, "bytes": 26214400, "used": 0, "inv": false}}
]}"#;
