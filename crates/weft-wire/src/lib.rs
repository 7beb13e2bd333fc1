//! Text protocol spoken between an instrumented process and an external
//! inspector. Each message is a single JSON document; framing and delivery
//! belong to the transport.

use facet::Facet;
use std::fmt;

pub const MUTATION_MESSAGE_TYPE: &str = "mutation";

#[derive(Debug)]
pub enum WireError {
    Json(String),
    UnknownMessageType(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "{err}"),
            Self::UnknownMessageType(kind) => write!(f, "unknown message type {kind:?}"),
        }
    }
}

impl std::error::Error for WireError {}

#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MutationKind {
    #[facet(rename = "childList")]
    ChildList,
    #[facet(rename = "attributes")]
    Attributes,
    #[facet(rename = "characterData")]
    CharacterData,
}

/// One observed change, shaped like a DOM `MutationRecord`.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    #[facet(rename = "type")]
    pub kind: MutationKind,
    pub target: Option<String>,
    #[facet(rename = "addedNodes")]
    pub added_nodes: Vec<String>,
    #[facet(rename = "removedNodes")]
    pub removed_nodes: Vec<String>,
    #[facet(rename = "attributeName")]
    pub attribute_name: Option<String>,
    #[facet(rename = "oldValue")]
    pub old_value: Option<String>,
}

impl Mutation {
    pub fn child_added(target: Option<String>, node: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes: vec![node.into()],
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: None,
        }
    }

    pub fn child_removed(target: Option<String>, node: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes: Vec::new(),
            removed_nodes: vec![node.into()],
            attribute_name: None,
            old_value: None,
        }
    }
}

#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct ClientMessage {
    #[facet(rename = "type")]
    pub kind: String,
    pub mutation: Mutation,
}

impl ClientMessage {
    pub fn mutation(mutation: Mutation) -> Self {
        Self {
            kind: MUTATION_MESSAGE_TYPE.to_string(),
            mutation,
        }
    }
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, WireError> {
    facet_json::to_string(message).map_err(|e| WireError::Json(e.to_string()))
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, WireError> {
    let message: ClientMessage =
        facet_json::from_str(text).map_err(|e| WireError::Json(e.to_string()))?;
    if message.kind != MUTATION_MESSAGE_TYPE {
        return Err(WireError::UnknownMessageType(message.kind));
    }
    Ok(message)
}
