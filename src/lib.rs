// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Discovery, status, and control for a mixed fleet of JSON-RPC ("modern")
//! and legacy HTTP/GET smart-plug, relay, and meter devices.

pub mod auth;
pub mod bulk;
pub mod cfg;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod mdns;
pub mod scanner;
pub mod target;
pub mod transport;

pub use error::{CoreError, CoreResult};
