use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DocumentError;

/// One untyped row as it arrives from an export: keys and values are not trusted.
pub type RawRecord = serde_json::Map<String, Value>;

pub const BALANCES_KEY: &str = "balances";
pub const VOTING_POWER_KEY: &str = "votingPower";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Balances,
    VotingPower,
}

impl DocumentKind {
    pub fn wrapper_key(&self) -> &'static str {
        match self {
            Self::Balances => BALANCES_KEY,
            Self::VotingPower => VOTING_POWER_KEY,
        }
    }
}

/// Accepts either a bare list of rows or `{ "result": { <key>: [rows] } }`.
/// Non-object entries inside the list are skipped.
pub fn unwrap_rows(document: &Value, kind: DocumentKind) -> Result<Vec<RawRecord>, DocumentError> {
    let key = kind.wrapper_key();
    let rows = match document {
        Value::Array(rows) => rows,
        Value::Object(obj) => match obj.get("result").and_then(|r| r.get(key)) {
            Some(Value::Array(rows)) => rows,
            _ => return Err(DocumentError::UnexpectedShape { key }),
        },
        _ => return Err(DocumentError::UnexpectedShape { key }),
    };
    Ok(rows
        .iter()
        .filter_map(|row| row.as_object().cloned())
        .collect())
}

pub fn parse_rows(json: &str, kind: DocumentKind) -> Result<Vec<RawRecord>, DocumentError> {
    let document: Value = serde_json::from_str(json)?;
    unwrap_rows(&document, kind)
}

/// A dated pair of balance and voting-power documents, still untyped.
#[derive(Debug, Clone)]
pub struct SnapshotDocuments {
    pub date: String,
    pub balances: Vec<RawRecord>,
    pub voting_power: Vec<RawRecord>,
}

/// Manifest entry describing one stored snapshot pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// `DD-MM-YYYY`
    pub date: String,
    pub balances: String,
    #[serde(rename = "votingPower")]
    pub voting_power: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub snapshots: Vec<SnapshotEntry>,
}
