//! Message envelopes exchanged between the scheduler and execution units
//!
//! Every request and the responses it produces share one correlation id. The
//! serde form is tagged by `type` so the envelope reads the same on the wire:
//!
//! ```text
//! { "type": "compress", "id": "...", "data": [...], "filename": "a.pdf" }
//! { "type": "success", "id": "...", "data": [...], "originalSize": 10, "compressedSize": 4 }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Scheduler -> execution unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// Load the engine (one-shot, idempotent)
    Init { id: String },
    /// Run the engine over `data`; the buffer is owned by the unit from here on
    Compress {
        id: String,
        data: Vec<u8>,
        filename: String,
    },
}

impl Request {
    pub fn id(&self) -> &str {
        match self {
            Request::Init { id } | Request::Compress { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Init { .. } => "init",
            Request::Compress { .. } => "compress",
        }
    }
}

/// Execution unit -> scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    InitSuccess {
        id: String,
    },
    InitError {
        id: String,
        error: String,
    },
    /// Informational: the unit has started running the engine for `id`
    Progress {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        id: String,
        data: Vec<u8>,
        original_size: usize,
        compressed_size: usize,
    },
    Error {
        id: String,
        error: String,
    },
}

impl Response {
    pub fn id(&self) -> &str {
        match self {
            Response::InitSuccess { id }
            | Response::InitError { id, .. }
            | Response::Progress { id }
            | Response::Success { id, .. }
            | Response::Error { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Response::InitSuccess { .. } => "init-success",
            Response::InitError { .. } => "init-error",
            Response::Progress { .. } => "progress",
            Response::Success { .. } => "success",
            Response::Error { .. } => "error",
        }
    }
}

/// Decode a request envelope, rejecting unknown `type` tags
pub fn decode_request(raw: &str) -> Result<Request> {
    serde_json::from_str(raw).context("Failed to decode request envelope")
}

/// Decode a response envelope, rejecting unknown `type` tags
pub fn decode_response(raw: &str) -> Result<Response> {
    serde_json::from_str(raw).context("Failed to decode response envelope")
}
