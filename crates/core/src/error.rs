// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for chatlink-core operations.

use thiserror::Error;

/// All possible errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid reply payload: {0}")]
    InvalidReply(String),

    #[error("invalid broadcast payload: {0}")]
    InvalidBroadcast(String),
}

/// A specialized Result type for chatlink-core operations.
pub type Result<T> = std::result::Result<T, Error>;
