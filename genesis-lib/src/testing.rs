//! Helpers to build small genesis exports in tests.

use crate::DelegationRecord;
use serde_json::json;

/// Render a minimal genesis export holding `delegations`, surrounded by the
/// other sections a real export carries.
pub fn genesis_export(delegations: &[DelegationRecord]) -> String {
    json!({
        "genesis_time": "2022-08-29T00:00:00Z",
        "chain_id": "canto_7700-1",
        "app_state": {
            "auth": { "accounts": [] },
            "bank": {
                "balances": [],
                "supply": [{ "denom": "acanto", "amount": "1000000000000000000000000000" }]
            },
            "staking": {
                "params": { "bond_denom": "acanto" },
                "validators": [],
                "delegations": delegations,
            }
        }
    })
    .to_string()
}
