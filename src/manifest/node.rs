// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic manifest tree
//!
//! Manifests are not a closed schema, so properties are kept as a recursive
//! `Scalar | Mapping | Sequence` tree and read through path lookups that
//! return `None` when anything along the way is missing.

use std::collections::BTreeMap;
use std::fmt;

/// A leaf value in the manifest
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// A node of the decoded manifest
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Mapping(BTreeMap<String, Node>),
    Sequence(Vec<Node>),
}

impl Node {
    /// An empty mapping, used when a manifest has no global properties
    pub fn empty_mapping() -> Self {
        Node::Mapping(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    /// Direct child of a mapping; explicit nulls read as absent
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(map) => map.get(key).filter(|node| !node.is_null()),
            _ => None,
        }
    }

    /// Walk a path of mapping keys
    pub fn lookup(&self, path: &[&str]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Walk a dotted path such as `consul.agent.domain`
    pub fn lookup_dotted(&self, path: &str) -> Option<&Node> {
        self.lookup(&path.split('.').collect::<Vec<_>>())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup_dotted(path).is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Render a scalar as text, so `5514` and `"5514"` both read as `5514`
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Scalar(Scalar::Null) => None,
            Node::Scalar(scalar) => Some(scalar.to_string()),
            _ => None,
        }
    }

    /// Interpret a scalar as a boolean, accepting `true`/`false` spelled as strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Scalar(Scalar::Bool(value)) => Some(*value),
            Node::Scalar(Scalar::String(value)) => match value.trim() {
                v if v.eq_ignore_ascii_case("true") => Some(true),
                v if v.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Every scalar item of a sequence rendered as text
    pub fn string_list(&self) -> Option<Vec<String>> {
        self.as_sequence()
            .map(|items| items.iter().filter_map(Node::scalar_text).collect())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Integer(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::String(value) => f.write_str(value),
        }
    }
}

impl From<serde_yaml::Value> for Node {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Integer(i)),
                None => match n.as_u64() {
                    Some(u) => Node::Scalar(Scalar::String(u.to_string())),
                    None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or_default())),
                },
            },
            Value::String(s) => Node::Scalar(Scalar::String(s)),
            Value::Sequence(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            Value::Mapping(map) => Node::Mapping(
                map.into_iter()
                    .filter_map(|(key, value)| {
                        Node::from(key)
                            .scalar_text()
                            .map(|key| (key, Node::from(value)))
                    })
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}
