//! Transaction and transfer identifiers
//!
//! Identifiers are opaque strings chosen by the submitter. A transaction id
//! is unique within its tenant; a transfer id is unique within its
//! transaction. Neither carries any ordering or timestamp semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a transaction, unique per tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a transfer, unique within its transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransferId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip() {
        let id = TransactionId::new("trn_2021_03");
        assert_eq!(id.to_string(), "trn_2021_03");
        assert_eq!(TransactionId::from(id.to_string()), id);
    }

    #[test]
    fn test_hash_eq_consistency() {
        use std::collections::HashMap;

        let id = TransferId::new("leg-1");
        let mut map = HashMap::new();
        map.insert(id.clone(), "value");

        assert_eq!(map.get(&TransferId::new("leg-1")), Some(&"value"));
    }
}
