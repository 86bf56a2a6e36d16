//! Wire message and addressing types
//!
//! A message is an opaque body plus string headers; typed views over it
//! live in the protocol crate. Actors are addressed by coordinates, a
//! `(region, name)` pair: the region names the actor family (a tenant's
//! coordinators, an account service), the name the instance.

use std::collections::HashMap;
use std::fmt;

/// Address of an actor on the lake
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub region: String,
    pub name: String,
}

impl Coordinates {
    pub fn new(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

/// Message that flows over the lake
#[derive(Debug, Clone)]
pub struct Message {
    /// Serialized payload
    pub body: Vec<u8>,

    /// Headers for metadata
    pub headers: HashMap<String, String>,
}

impl Message {
    pub fn new(body: Vec<u8>, headers: HashMap<String, String>) -> Self {
        Self { body, headers }
    }

    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|s| s.as_str())
    }
}

/// A message in flight between two coordinates
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: Coordinates,
    pub to: Coordinates,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: Coordinates, to: Coordinates, message: Message) -> Self {
        Self { from, to, message }
    }
}
