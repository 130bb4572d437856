use serde::{Deserialize, Serialize};

/// libnftables output flags
///
/// Each flag maps to one `nft` command-line switch. All flags default to off,
/// which is plain-text output with symbolic names, same as bare `nft`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFlags {
    /// Emit libnftables JSON instead of text
    pub json: bool,
    /// Show object handles
    pub handle: bool,
    /// Echo the commands that changed the ruleset
    pub echo: bool,
    /// Omit stateful data (counter values, quota usage)
    pub stateless: bool,
    /// Translate ports to service names
    pub service: bool,
    /// Resolve addresses with reverse DNS
    pub reversedns: bool,
    /// Print UID/GID as names
    pub guid: bool,
    /// Print layer 4 protocols numerically
    pub numeric_proto: bool,
    /// Print chain priorities numerically
    pub numeric_prio: bool,
    /// Print expression constants numerically
    ///
    /// nft has no switch for this flag alone; `--numeric` turns on every
    /// numeric flag at once.
    pub numeric_symbol: bool,
    /// Print time values numerically
    pub numeric_time: bool,
    /// Omit set contents
    pub terse: bool,
}

impl OutputFlags {
    /// Flags used by the read-only recipes: JSON, stateful, no name lookups,
    /// numeric protocols.
    pub fn json_reader() -> Self {
        Self {
            json: true,
            numeric_proto: true,
            ..Self::default()
        }
    }

    /// Maps the flags to `nft` switches, in a fixed order.
    pub fn to_args(&self) -> Vec<&'static str> {
        let table = [
            (self.json, "--json"),
            (self.handle, "--handle"),
            (self.echo, "--echo"),
            (self.stateless, "--stateless"),
            (self.service, "--service"),
            (self.reversedns, "--reversedns"),
            (self.guid, "--guid"),
            (self.numeric_proto, "--numeric-protocol"),
            (self.numeric_prio, "--numeric-priority"),
            (self.numeric_symbol, "--numeric"),
            (self.numeric_time, "--numeric-time"),
            (self.terse, "--terse"),
        ];
        table
            .into_iter()
            .filter_map(|(on, arg)| on.then_some(arg))
            .collect()
    }
}
