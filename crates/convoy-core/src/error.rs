//! Error types for convoy

use thiserror::Error;

use crate::{EntityId, EventKind, SceneId};

/// Convoy errors
#[derive(Error, Debug)]
pub enum ConvoyError {
    // Store errors
    #[error("Store rejected batch for scene {scene}: {reason}")]
    StoreWrite { scene: SceneId, reason: String },

    #[error("Entity {entity} not found in scene {scene}")]
    EntityNotFound { scene: SceneId, entity: EntityId },

    #[error("Scene not found: {0}")]
    SceneNotFound(SceneId),

    #[error("Unsupported follow record version: {0}")]
    UnsupportedSchema(u64),

    // Wire errors
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Envelope for {0} carried no payload")]
    EmptyPayload(EventKind),

    #[error("Transport error: {0}")]
    Transport(String),

    // Dispatch errors
    #[error("Handler {subscription} failed on {event}: {message}")]
    Handler {
        event: EventKind,
        subscription: u64,
        message: String,
    },

    // Request errors
    #[error("No leader selected")]
    MissingLeader,

    #[error("No followers given")]
    NoFollowers,
}

/// Result type for convoy operations
pub type ConvoyResult<T> = Result<T, ConvoyError>;
