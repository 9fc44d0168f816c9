//! Managed-object identifiers and attribute descriptors.
//!
//! An identifier is a domain plus an ordered set of unique key/value
//! properties, written `domain:key1=val1,key2=val2`. Property order is not
//! semantically significant, so equality and the canonical rendering sort
//! properties by key, while `Display` keeps the order the identifier was
//! written in.

use serde::Serialize;

/// Error raised when an identifier string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Identifier is structurally invalid (missing domain, bad property).
    Malformed(String),
    /// A property key appears more than once.
    DuplicateKey(String),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::Malformed(s) => write!(f, "malformed object name '{}'", s),
            NameError::DuplicateKey(k) => write!(f, "duplicate property key '{}'", k),
        }
    }
}

impl std::error::Error for NameError {}

/// Hierarchical identifier of a managed object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectId {
    domain: String,
    props: Vec<(String, String)>,
}

impl ObjectId {
    /// Parses `domain:key1=val1,key2=val2`. The property list may be empty
    /// (`domain:`), keys must be unique and non-empty.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        let (domain, rest) = s
            .split_once(':')
            .ok_or_else(|| NameError::Malformed(s.to_string()))?;
        if domain.is_empty() {
            return Err(NameError::Malformed(s.to_string()));
        }

        let mut props = Vec::new();
        for part in rest.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| NameError::Malformed(s.to_string()))?;
            if key.is_empty() {
                return Err(NameError::Malformed(s.to_string()));
            }
            if props.iter().any(|(k, _)| k == key) {
                return Err(NameError::DuplicateKey(key.to_string()));
            }
            props.push((key.to_string(), val.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            props,
        })
    }

    /// Builds an identifier from a domain and key/value pairs, preserving
    /// the given property order.
    pub fn new(
        domain: impl Into<String>,
        props: Vec<(String, String)>,
    ) -> Result<Self, NameError> {
        let domain = domain.into();
        if domain.is_empty() {
            return Err(NameError::Malformed(domain));
        }
        for (i, (k, _)) in props.iter().enumerate() {
            if k.is_empty() {
                return Err(NameError::Malformed(domain));
            }
            if props[..i].iter().any(|(pk, _)| pk == k) {
                return Err(NameError::DuplicateKey(k.clone()));
            }
        }
        Ok(Self { domain, props })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Properties in the order the identifier was written.
    pub fn props(&self) -> &[(String, String)] {
        &self.props
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical rendering: properties sorted by key. Stable across parses
    /// of equivalent identifiers, used for map keys and reproducible output.
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.props.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let body: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}:{}", self.domain, body.join(","))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body: Vec<String> = self
            .props
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}:{}", self.domain, body.join(","))
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for ObjectId {}

/// Declared type tag of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    List,
    Map,
    Other,
}

/// Attribute descriptor: immutable for the lifetime of an object
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttrInfo {
    pub name: String,
    pub readable: bool,
    pub kind: AttrKind,
}

impl AttrInfo {
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            readable: true,
            kind,
        }
    }

    pub fn unreadable(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            readable: false,
            kind,
        }
    }
}

/// A managed object registration: identifier plus attribute descriptors.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub attrs: Vec<AttrInfo>,
}

impl ObjectInfo {
    pub fn new(id: ObjectId, attrs: Vec<AttrInfo>) -> Self {
        Self { id, attrs }
    }
}
