//! Fixed schemas for the items carried in `Message::payload`.
//!
//! Each target has its own shape; `state::StateMutation::decode` picks the
//! shape from the (operation, target) pair and turns the item into a typed
//! store request.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::message::{StateOp, Target};

pub const ACTION_TYPES: [&str; 8] = [
    "transformer",
    "restapi",
    "graphql",
    "redis",
    "mysql",
    "mariadb",
    "postgresql",
    "mongodb",
];

pub const TRIGGER_MODES: [&str; 2] = ["manually", "automate"];

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload item does not match the {schema} schema: {source}")]
    Schema {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("key-value item must have exactly one key, found {0}")]
    KvEntryShape(usize),

    #[error("{op} is not supported for target {target}")]
    Unsupported { op: StateOp, target: Target },
}

/// Decode one payload item into `T`, naming the schema on failure
pub fn parse_item<T: DeserializeOwned>(schema: &'static str, item: &Value) -> Result<T, PayloadError> {
    T::deserialize(item).map_err(|source| PayloadError::Schema { schema, source })
}

/// A UI component as sent by the editor
///
/// Only the name and parent linkage are interpreted; everything else is kept
/// verbatim as the node's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node: Option<String>,
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl ComponentNode {
    pub fn parse(item: &Value) -> Result<Self, PayloadError> {
        let node: ComponentNode = parse_item("component", item)?;
        if node.display_name.is_empty() {
            return Err(PayloadError::MissingField {
                field: "displayName",
            });
        }
        Ok(node)
    }

    /// Serialized form stored as the tree node content
    pub fn content(&self) -> String {
        // Serializing a string-keyed map of JSON values cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Delete requests name a component either directly or through the node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ComponentRef {
    Name(String),
    Node(ComponentNode),
}

impl ComponentRef {
    pub fn parse(item: &Value) -> Result<String, PayloadError> {
        let name = match parse_item::<ComponentRef>("component reference", item)? {
            ComponentRef::Name(name) => name,
            ComponentRef::Node(node) => node.display_name,
        };
        if name.is_empty() {
            return Err(PayloadError::MissingField {
                field: "displayName",
            });
        }
        Ok(name)
    }
}

/// A single `{key: value}` entry of ephemeral key-value state
#[derive(Debug, Clone, PartialEq)]
pub struct KvEntry {
    pub key: String,
    pub value: Value,
}

impl KvEntry {
    pub fn parse(item: &Value) -> Result<Self, PayloadError> {
        let entry: Map<String, Value> = parse_item("key-value entry", item)?;
        if entry.len() != 1 {
            return Err(PayloadError::KvEntryShape(entry.len()));
        }
        let Some((key, value)) = entry.into_iter().next() else {
            return Err(PayloadError::KvEntryShape(0));
        };
        if key.is_empty() {
            return Err(PayloadError::MissingField { field: "key" });
        }
        Ok(Self { key, value })
    }
}

/// Non-empty string item (display names, keys, action names)
pub fn parse_name(field: &'static str, item: &Value) -> Result<String, PayloadError> {
    let name: String = parse_item(field, item)?;
    if name.is_empty() {
        return Err(PayloadError::MissingField { field });
    }
    Ok(name)
}

/// Display names carried by one create or delete item, in order.
///
/// The editor sends an array of names; a bare string is taken as a
/// single-name array.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayNameState(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum DisplayNameItem {
    Many(Vec<String>),
    One(String),
}

impl DisplayNameState {
    pub fn parse(item: &Value) -> Result<Self, PayloadError> {
        let names = match parse_item::<DisplayNameItem>("display names", item)? {
            DisplayNameItem::Many(names) => names,
            DisplayNameItem::One(name) => vec![name],
        };
        if names.iter().any(String::is_empty) {
            return Err(PayloadError::MissingField {
                field: "displayName",
            });
        }
        Ok(Self(names))
    }
}

/// Compare-and-swap request for a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayNameChange {
    pub before: String,
    pub after: String,
}

impl DisplayNameChange {
    pub fn parse(item: &Value) -> Result<Self, PayloadError> {
        let change: DisplayNameChange = parse_item("display name change", item)?;
        if change.after.is_empty() {
            return Err(PayloadError::MissingField { field: "after" });
        }
        Ok(change)
    }
}

/// Action definition as edited in the builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub display_name: String,
    pub action_type: String,
    #[serde(default)]
    pub resource_id: i64,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub transformer: Map<String, Value>,
    pub trigger_mode: String,
}

impl ActionPayload {
    pub fn parse(item: &Value) -> Result<Self, PayloadError> {
        let action: ActionPayload = parse_item("action", item)?;
        if action.display_name.is_empty() {
            return Err(PayloadError::MissingField {
                field: "displayName",
            });
        }
        if !ACTION_TYPES.contains(&action.action_type.as_str()) {
            return Err(PayloadError::InvalidValue {
                field: "actionType",
                value: action.action_type,
            });
        }
        if !TRIGGER_MODES.contains(&action.trigger_mode.as_str()) {
            return Err(PayloadError::InvalidValue {
                field: "triggerMode",
                value: action.trigger_mode,
            });
        }
        Ok(action)
    }
}
