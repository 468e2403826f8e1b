// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy shared by every fallible core operation.
//!
//! Per-device failures inside a bulk or scan fan-out are never surfaced as
//! a `CoreError` — they are folded into the per-device result type instead,
//! so one device's failure never aborts the rest of a fan-out.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("device {address} unreachable: {source}")]
    Unreachable { address: String, source: String },

    #[error("device {address} requires authentication: {reason}")]
    AuthRequired { address: String, reason: String },

    #[error("communication error with {address}: {message}")]
    Communication { address: String, message: String },

    #[error("unsupported action {action} on {component_key}: {reason}")]
    UnsupportedAction {
        component_key: String,
        action: String,
        reason: String,
    },

    #[error("bulk operation '{operation}' could not start: {message}")]
    BulkOperationError { operation: String, message: String },
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unreachable(address: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Unreachable {
            address: address.into(),
            source: source.into(),
        }
    }

    pub fn auth_required(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthRequired {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn communication(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Communication {
            address: address.into(),
            message: message.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
