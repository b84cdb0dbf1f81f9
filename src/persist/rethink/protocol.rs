//! RethinkDB V0_4 JSON wire protocol.
//!
//! # Framing
//! ```text
//! handshake:  u32 magic | u32 key_len | key | u32 protocol   (little-endian)
//!             ← "SUCCESS\0"
//! query:      u64 token | u32 len | JSON [type, term, opts]
//! response:   u64 token | u32 len | JSON {"t": type, "r": [...]}
//! ```
//!
//! Arrays inside a term must be wrapped as `[MAKE_ARRAY, [...]]`; see [`datum`].

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::persist::PersistError;

pub const MAGIC_V0_4: u32 = 0x400c_2d20;
pub const PROTOCOL_JSON: u32 = 0x7e69_70c7;

/// Size of a response header: token plus length.
pub const HEADER_LEN: usize = 12;

/// Upper bound on a single response body.
pub const MAX_RESPONSE_LEN: u32 = 64 * 1024 * 1024;

/// ReQL term type codes.
pub mod term {
    pub const MAKE_ARRAY: u64 = 2;
    pub const DB: u64 = 14;
    pub const TABLE: u64 = 15;
    pub const GET: u64 = 16;
    pub const DELETE: u64 = 54;
    pub const INSERT: u64 = 56;
    pub const DB_CREATE: u64 = 57;
    pub const DB_LIST: u64 = 59;
    pub const TABLE_CREATE: u64 = 60;
    pub const TABLE_LIST: u64 = 62;
    pub const INDEX_CREATE: u64 = 75;
    pub const INDEX_LIST: u64 = 77;
    pub const GET_ALL: u64 = 78;
    pub const INDEX_WAIT: u64 = 140;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Start = 1,
    Continue = 2,
    Stop = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    SuccessAtom,
    SuccessSequence,
    SuccessPartial,
    WaitComplete,
    ServerInfo,
    ClientError,
    CompileError,
    RuntimeError,
}

impl ResponseType {
    pub fn from_code(code: i64) -> Option<Self> {
        let kind = match code {
            1 => ResponseType::SuccessAtom,
            2 => ResponseType::SuccessSequence,
            3 => ResponseType::SuccessPartial,
            4 => ResponseType::WaitComplete,
            5 => ResponseType::ServerInfo,
            16 => ResponseType::ClientError,
            17 => ResponseType::CompileError,
            18 => ResponseType::RuntimeError,
            _ => return None,
        };
        Some(kind)
    }

    pub fn error_kind(self) -> Option<&'static str> {
        match self {
            ResponseType::ClientError => Some("client"),
            ResponseType::CompileError => Some("compile"),
            ResponseType::RuntimeError => Some("runtime"),
            _ => None,
        }
    }
}

/// A ReQL term in its JSON wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct Term(Value);

impl Term {
    fn op(code: u64, args: Vec<Value>) -> Self {
        Term(json!([code, args]))
    }

    fn op_with(code: u64, args: Vec<Value>, opts: Value) -> Self {
        Term(json!([code, args, opts]))
    }

    pub fn db_list() -> Self {
        Self::op(term::DB_LIST, Vec::new())
    }

    pub fn db_create(name: &str) -> Self {
        Self::op(term::DB_CREATE, vec![json!(name)])
    }

    pub fn db(name: &str) -> Self {
        Self::op(term::DB, vec![json!(name)])
    }

    pub fn table_list(db: &str) -> Self {
        Self::op(term::TABLE_LIST, vec![Self::db(db).0])
    }

    pub fn table_create(db: &str, table: &str, primary_key: Option<&str>) -> Self {
        let args = vec![Self::db(db).0, json!(table)];
        match primary_key {
            Some(key) => Self::op_with(term::TABLE_CREATE, args, json!({ "primary_key": key })),
            None => Self::op(term::TABLE_CREATE, args),
        }
    }

    pub fn table(db: &str, table: &str) -> Self {
        Self::op(term::TABLE, vec![Self::db(db).0, json!(table)])
    }

    pub fn index_list(self) -> Self {
        Self::op(term::INDEX_LIST, vec![self.0])
    }

    pub fn index_create(self, index: &str) -> Self {
        Self::op(term::INDEX_CREATE, vec![self.0, json!(index)])
    }

    pub fn index_wait(self) -> Self {
        Self::op(term::INDEX_WAIT, vec![self.0])
    }

    pub fn insert(self, document: &Value) -> Self {
        Self::op(term::INSERT, vec![self.0, datum(document)])
    }

    pub fn get(self, key: &str) -> Self {
        Self::op(term::GET, vec![self.0, json!(key)])
    }

    pub fn get_all(self, key: &str, index: &str) -> Self {
        Self::op_with(term::GET_ALL, vec![self.0, json!(key)], json!({ "index": index }))
    }

    pub fn delete(self) -> Self {
        Self::op(term::DELETE, vec![self.0])
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

/// Convert a JSON document into a ReQL datum, wrapping every array.
pub fn datum(value: &Value) -> Value {
    match value {
        Value::Array(items) => json!([term::MAKE_ARRAY, items.iter().map(datum).collect::<Vec<_>>()]),
        Value::Object(fields) => {
            let wrapped: Map<String, Value> =
                fields.iter().map(|(k, v)| (k.clone(), datum(v))).collect();
            Value::Object(wrapped)
        }
        other => other.clone(),
    }
}

/// Handshake bytes for an empty auth key.
pub fn handshake(auth_key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + auth_key.len());
    buf.extend_from_slice(&MAGIC_V0_4.to_le_bytes());
    buf.extend_from_slice(&(auth_key.len() as u32).to_le_bytes());
    buf.extend_from_slice(auth_key.as_bytes());
    buf.extend_from_slice(&PROTOCOL_JSON.to_le_bytes());
    buf
}

/// Frame a query for the wire.
pub fn encode_query(token: u64, kind: QueryType, term: Option<&Term>) -> Vec<u8> {
    let body = match (kind, term) {
        (QueryType::Start, Some(t)) => json!([kind as u64, t.as_json(), {}]),
        _ => json!([kind as u64]),
    };
    let payload = body.to_string();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&token.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload.as_bytes());
    buf
}

/// Split a response header into token and body length.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> (u64, u32) {
    let mut token = [0u8; 8];
    token.copy_from_slice(&header[..8]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[8..]);
    (u64::from_le_bytes(token), u32::from_le_bytes(len))
}

/// A decoded response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub t: i64,
    #[serde(default)]
    pub r: Vec<Value>,
}

impl RawResponse {
    pub fn parse(body: &[u8]) -> Result<Self, PersistError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn kind(&self) -> Result<ResponseType, PersistError> {
        ResponseType::from_code(self.t)
            .ok_or_else(|| PersistError::Protocol(format!("unknown response type {}", self.t)))
    }

    /// Turn error responses into `PersistError::Query`.
    pub fn check(self) -> Result<(ResponseType, Vec<Value>), PersistError> {
        let kind = self.kind()?;
        if let Some(error_kind) = kind.error_kind() {
            let message = self
                .r
                .first()
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(PersistError::Query { kind: error_kind, message });
        }
        Ok((kind, self.r))
    }
}
