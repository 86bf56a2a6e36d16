//! Account references
//!
//! An account is addressed by its `(tenant, name)` pair. The pair is the
//! identity: two references are equal iff both components match. The account
//! itself is owned by an account actor outside this process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an account in some tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub tenant: String,
    pub name: String,
}

impl Account {
    pub fn new(tenant: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.name)
    }
}
