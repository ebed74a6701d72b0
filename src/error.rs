//! # Errors
//!
//! Typed failures. Anything that can be handled by skipping one element is a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead.

use crate::model::{Direction, EndpointClass, NodeId};
use thiserror::Error;

/// Structural edit failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} is not a group")]
    NotAGroup(NodeId),

    #[error("Node {0} is not a source")]
    NotASource(NodeId),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Id {0} is already in use")]
    DuplicateId(u32),

    #[error("'{name}' already exists on node {node}")]
    DuplicateName { node: NodeId, name: String },

    #[error("Only one top-level group is allowed (existing: {0})")]
    RootExists(NodeId),
}

/// Reasons a connection is rejected. A rejected connection leaves the graph
/// and every destination table untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    #[error("Cannot connect a {a} to a {b}")]
    IllegalPair { a: EndpointClass, b: EndpointClass },

    #[error("Both endpoints are {0}s")]
    DirectionMismatch(Direction),

    #[error("Channel input '{input}' needs a channel output, got '{output}'")]
    ChannelMismatch { input: String, output: String },

    #[error("No message variant of '{a}' matches '{b}'")]
    NoVariantOverlap { a: String, b: String },

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Cannot connect an endpoint to itself")]
    SelfConnection,
}

/// Failures of the storage collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("No {kind} document at '{location}'")]
    NotFound { location: String, kind: String },

    #[error("Storage failure at '{location}': {reason}")]
    Io { location: String, reason: String },
}

/// Model load failures. `Clone` so one pending fetch can be shared by all
/// of its waiters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Behavioral document for '{location}' is unusable: {reason}")]
    BehavioralLoadFailure { location: String, reason: String },

    #[error("Visual document for '{location}' is unusable: {reason}")]
    VisualLoadFailure { location: String, reason: String },

    #[error("Model '{location}' is already waiting on its importer")]
    LinkCycle { location: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Json(err.to_string())
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
