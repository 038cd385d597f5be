//! Request/reply mapping for the HTTP surface
//!
//! `POST api/plc/read` and `POST api/plc/write` carry the JSON bodies defined
//! here. [`PlcApi`] runs them against a shared [`DeviceSession`] and returns
//! the reply together with the [`ApiStatus`] the server should answer with.
//! The HTTP listener itself lives outside this crate.
//!
//! | Outcome | Status | `code` |
//! |---------|--------|--------|
//! | success | 200 | 0 |
//! | bad address, type, value, or not connected | 400 | 1 |
//! | transport or other failure | 500 | 2 |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::area::AreaDescriptor;
use crate::error::PlcError;
use crate::session::DeviceSession;
use crate::transport::PlcConnector;

/// Reply code for success.
pub const CODE_OK: i32 = 0;
/// Reply code for rejected input.
pub const CODE_BAD_REQUEST: i32 = 1;
/// Reply code for failures on the PLC side.
pub const CODE_INTERNAL_ERROR: i32 = 2;

/// `POST api/plc/read` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    pub db: u16,
    pub byte_adr: String,
    pub data_type: String,
}

/// `POST api/plc/write` body.
///
/// `data` may arrive as a JSON string, number or bool; it is turned into
/// text and then parsed strictly as `data_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub db: u16,
    pub byte_adr: String,
    pub data_type: String,
    pub data: serde_json::Value,
}

impl WriteRequest {
    /// Text form of `data` handed to the value parser.
    pub fn data_text(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Reply to a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReply {
    pub code: i32,
    pub description: String,
    pub data: serde_json::Value,
}

/// Reply to a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcReply {
    pub code: i32,
    pub description: String,
}

/// HTTP status class of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    BadRequest,
    InternalError,
}

impl ApiStatus {
    pub fn http_code(&self) -> u16 {
        match self {
            ApiStatus::Ok => 200,
            ApiStatus::BadRequest => 400,
            ApiStatus::InternalError => 500,
        }
    }

    pub fn reply_code(&self) -> i32 {
        match self {
            ApiStatus::Ok => CODE_OK,
            ApiStatus::BadRequest => CODE_BAD_REQUEST,
            ApiStatus::InternalError => CODE_INTERNAL_ERROR,
        }
    }

    fn from_error(err: &PlcError) -> Self {
        if err.is_client_error() {
            ApiStatus::BadRequest
        } else {
            ApiStatus::InternalError
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.http_code())
    }
}

/// Handlers for the PLC endpoints. All requests address data blocks.
pub struct PlcApi<C: PlcConnector> {
    session: Arc<DeviceSession<C>>,
}

impl<C: PlcConnector> Clone for PlcApi<C> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<C: PlcConnector> PlcApi<C> {
    pub fn new(session: Arc<DeviceSession<C>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<DeviceSession<C>> {
        &self.session
    }

    /// Handle `POST api/plc/read`.
    pub async fn read(&self, request: &ReadRequest) -> (ApiStatus, ReadReply) {
        info!(
            "Read request: DB{}, address {}, type {}",
            request.db, request.byte_adr, request.data_type
        );

        let result = self
            .session
            .read_typed(
                AreaDescriptor::data_block(request.db),
                &request.byte_adr,
                &request.data_type,
                None,
            )
            .await;

        match result {
            Ok(value) => (
                ApiStatus::Ok,
                ReadReply {
                    code: CODE_OK,
                    description: "Read succeeded".to_string(),
                    data: value.to_json(),
                },
            ),
            Err(e) => {
                let status = ApiStatus::from_error(&e);
                error!("Read request failed ({}): {}", status, e);
                (
                    status,
                    ReadReply {
                        code: status.reply_code(),
                        description: e.to_string(),
                        data: serde_json::Value::Null,
                    },
                )
            }
        }
    }

    /// Handle `POST api/plc/write`.
    pub async fn write(&self, request: &WriteRequest) -> (ApiStatus, PlcReply) {
        let data = request.data_text();
        info!(
            "Write request: DB{}, address {}, type {}, data {}",
            request.db, request.byte_adr, request.data_type, data
        );

        let result = self
            .session
            .write_typed(
                AreaDescriptor::data_block(request.db),
                &request.byte_adr,
                &request.data_type,
                &data,
                None,
            )
            .await;

        match result {
            Ok(()) => (
                ApiStatus::Ok,
                PlcReply {
                    code: CODE_OK,
                    description: "Write succeeded".to_string(),
                },
            ),
            Err(e) => {
                let status = ApiStatus::from_error(&e);
                error!("Write request failed ({}): {}", status, e);
                (
                    status,
                    PlcReply {
                        code: status.reply_code(),
                        description: e.to_string(),
                    },
                )
            }
        }
    }
}
