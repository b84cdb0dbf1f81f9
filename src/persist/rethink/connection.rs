//! A single RethinkDB connection.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::persist::rethink::protocol::{
    decode_header, encode_query, handshake, QueryType, RawResponse, ResponseType, Term,
    HEADER_LEN, MAX_RESPONSE_LEN,
};
use crate::persist::{PersistError, PersistResult};

/// Longest handshake reply accepted before giving up.
const MAX_HANDSHAKE_REPLY: usize = 4096;

/// An authenticated connection.
///
/// Queries are serialized: each one takes the stream out of its slot and
/// puts it back only after its last batch has been read. A query that fails
/// mid-exchange or is dropped leaves the slot empty, and the next query
/// reconnects.
#[derive(Debug)]
pub struct Connection {
    address: String,
    stream: Mutex<Option<TcpStream>>,
    next_token: AtomicU64,
}

impl Connection {
    /// Open a TCP connection and complete the V0_4 handshake.
    pub async fn open(address: &str) -> PersistResult<Self> {
        let stream = connect(address).await?;
        tracing::debug!(address, "RethinkDB connection established");

        Ok(Self {
            address: address.to_string(),
            stream: Mutex::new(Some(stream)),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run a term expected to produce a single value.
    pub async fn run_atom(&self, term: &Term) -> PersistResult<Value> {
        let (kind, mut values) = self.run(term).await?;
        match kind {
            ResponseType::SuccessAtom => Ok(values.pop().unwrap_or(Value::Null)),
            ResponseType::WaitComplete => Ok(Value::Null),
            _ => Ok(Value::Array(values)),
        }
    }

    /// Run a term expected to produce a sequence, draining every batch.
    pub async fn run_sequence(&self, term: &Term) -> PersistResult<Vec<Value>> {
        let (kind, mut values) = self.run(term).await?;
        if kind == ResponseType::SuccessAtom {
            // Some sequence terms come back as an atom holding an array.
            return match values.pop() {
                Some(Value::Array(items)) => Ok(items),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(other) => Ok(vec![other]),
            };
        }
        Ok(values)
    }

    async fn run(&self, term: &Term) -> PersistResult<(ResponseType, Vec<Value>)> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.stream.lock().await;

        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => {
                let stream = connect(&self.address).await?;
                tracing::info!(address = %self.address, "RethinkDB connection reopened");
                stream
            }
        };

        // Transport failures drop the stream; query errors keep it in sync.
        let outcome = exchange(&mut stream, token, term).await?;
        *slot = Some(stream);
        outcome
    }
}

async fn connect(address: &str) -> PersistResult<TcpStream> {
    let mut stream = TcpStream::connect(address).await.map_err(|source| {
        PersistError::Connect { address: address.to_string(), source }
    })?;
    stream.set_nodelay(true)?;

    stream.write_all(&handshake("")).await?;
    let reply = read_null_terminated(&mut stream).await?;
    if reply != "SUCCESS" {
        return Err(PersistError::Handshake(reply));
    }
    Ok(stream)
}

/// Send one query and read every batch of its reply.
///
/// The outer error means the stream is unusable. The inner one is an error
/// the server reported for this query.
async fn exchange(
    stream: &mut TcpStream,
    token: u64,
    term: &Term,
) -> PersistResult<PersistResult<(ResponseType, Vec<Value>)>> {
    stream.write_all(&encode_query(token, QueryType::Start, Some(term))).await?;
    let (mut kind, mut values) = match read_response(stream, token).await?.check() {
        Ok(first) => first,
        Err(err) => return Ok(Err(err)),
    };

    while kind == ResponseType::SuccessPartial {
        stream.write_all(&encode_query(token, QueryType::Continue, None)).await?;
        match read_response(stream, token).await?.check() {
            Ok((next_kind, batch)) => {
                values.extend(batch);
                kind = next_kind;
            }
            Err(err) => return Ok(Err(err)),
        }
    }

    Ok(Ok((kind, values)))
}

async fn read_null_terminated(stream: &mut TcpStream) -> PersistResult<String> {
    let mut reply = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == 0 {
            break;
        }
        reply.push(byte);
        if reply.len() > MAX_HANDSHAKE_REPLY {
            return Err(PersistError::Protocol("handshake reply too long".to_string()));
        }
    }
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

async fn read_response(stream: &mut TcpStream, expected: u64) -> PersistResult<RawResponse> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let (token, len) = decode_header(&header);

    if token != expected {
        return Err(PersistError::Protocol(format!(
            "response token {token} does not match query token {expected}"
        )));
    }
    if len > MAX_RESPONSE_LEN {
        return Err(PersistError::Protocol(format!("response of {len} bytes exceeds limit")));
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    RawResponse::parse(&body)
}
