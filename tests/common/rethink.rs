//! Minimal RethinkDB V0_4 JSON-protocol server.
//!
//! Understands the handful of terms the daemon issues and counts every
//! create so tests can assert on idempotence.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const MAGIC_V0_4: u32 = 0x400c_2d20;
const PROTOCOL_JSON: u32 = 0x7e69_70c7;

const SUCCESS_ATOM: u64 = 1;
const SUCCESS_SEQUENCE: u64 = 2;
const RUNTIME_ERROR: u64 = 18;

#[derive(Debug, Default)]
pub struct Table {
    pub primary_key: String,
    pub indexes: Vec<String>,
    pub rows: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub db_creates: usize,
    pub table_creates: usize,
    pub index_creates: usize,
    pub connections: usize,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub databases: BTreeMap<String, BTreeMap<String, Table>>,
    pub counters: Counters,
    /// Held before every reply is written.
    pub reply_delay: Duration,
    /// List terms report nothing, as seen by an initializer racing another.
    pub stale_listings: bool,
}

#[derive(Clone)]
pub struct FakeRethink {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeRethink {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(FakeState::default()));

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let state = shared.clone();
                tokio::spawn(async move {
                    let _ = handle(socket, state).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn db_creates(&self) -> usize {
        self.state.lock().unwrap().counters.db_creates
    }

    pub fn table_creates(&self) -> usize {
        self.state.lock().unwrap().counters.table_creates
    }

    pub fn index_creates(&self) -> usize {
        self.state.lock().unwrap().counters.index_creates
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().counters.connections
    }

    pub fn set_reply_delay(&self, delay: Duration) {
        self.state.lock().unwrap().reply_delay = delay;
    }

    pub fn set_stale_listings(&self, stale: bool) {
        self.state.lock().unwrap().stale_listings = stale;
    }

    pub fn table_names(&self, db: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }
}

async fn handle(mut socket: TcpStream, state: Arc<Mutex<FakeState>>) -> std::io::Result<()> {
    let magic = socket.read_u32_le().await?;
    let key_len = socket.read_u32_le().await?;
    let mut key = vec![0u8; key_len as usize];
    socket.read_exact(&mut key).await?;
    let protocol = socket.read_u32_le().await?;

    if magic != MAGIC_V0_4 || protocol != PROTOCOL_JSON {
        socket.write_all(b"ERROR: unsupported protocol\0").await?;
        return Ok(());
    }
    socket.write_all(b"SUCCESS\0").await?;
    state.lock().unwrap().counters.connections += 1;

    loop {
        let token = match socket.read_u64_le().await {
            Ok(token) => token,
            Err(_) => return Ok(()),
        };
        let len = socket.read_u32_le().await?;
        let mut body = vec![0u8; len as usize];
        socket.read_exact(&mut body).await?;

        let query: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let (response, delay) = {
            let mut state = state.lock().unwrap();
            let response = match evaluate_query(&mut state, &query) {
                Ok(Output::Atom(value)) => json!({ "t": SUCCESS_ATOM, "r": [value] }),
                Ok(Output::Sequence(values)) => json!({ "t": SUCCESS_SEQUENCE, "r": values }),
                Err(message) => json!({ "t": RUNTIME_ERROR, "r": [message] }),
            };
            (response, state.reply_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let payload = response.to_string();
        let mut frame = Vec::with_capacity(12 + payload.len());
        frame.extend_from_slice(&token.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload.as_bytes());
        socket.write_all(&frame).await?;
    }
}

enum Output {
    Atom(Value),
    Sequence(Vec<Value>),
}

enum Evaluated {
    Db(String),
    Table(String, String),
    Row { db: String, table: String, key: String, value: Value },
    Value(Value),
    Sequence(Vec<Value>),
}

fn evaluate_query(state: &mut FakeState, query: &Value) -> Result<Output, String> {
    let term = query.get(1).ok_or("missing term")?;
    let output = match evaluate(state, term)? {
        Evaluated::Table(db, table) => Output::Sequence(table_ref(state, &db, &table)?.rows.clone()),
        Evaluated::Sequence(values) => Output::Sequence(values),
        Evaluated::Row { value, .. } => Output::Atom(value),
        Evaluated::Value(value) => Output::Atom(value),
        Evaluated::Db(name) => Output::Atom(json!({ "db": name })),
    };
    Ok(output)
}

fn table_ref<'a>(state: &'a mut FakeState, db: &str, table: &str) -> Result<&'a mut Table, String> {
    state
        .databases
        .get_mut(db)
        .ok_or_else(|| format!("Database `{db}` does not exist."))?
        .get_mut(table)
        .ok_or_else(|| format!("Table `{db}.{table}` does not exist."))
}

/// Strip `[MAKE_ARRAY, [...]]` wrappers.
fn unwrap_datum(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() == 2 && items[0] == json!(2) => match &items[1] {
            Value::Array(inner) => Value::Array(inner.iter().map(unwrap_datum).collect()),
            other => other.clone(),
        },
        Value::Object(fields) => {
            Value::Object(fields.iter().map(|(k, v)| (k.clone(), unwrap_datum(v))).collect())
        }
        other => other.clone(),
    }
}

fn string_arg(args: &[Value], index: usize) -> Result<String, String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("expected string argument {index}"))
}

fn table_arg(state: &mut FakeState, args: &[Value]) -> Result<(String, String), String> {
    match evaluate(state, args.first().ok_or("missing table")?)? {
        Evaluated::Table(db, table) => Ok((db, table)),
        _ => Err("expected a table".to_string()),
    }
}

fn db_arg(state: &mut FakeState, args: &[Value]) -> Result<String, String> {
    match evaluate(state, args.first().ok_or("missing db")?)? {
        Evaluated::Db(db) => Ok(db),
        _ => Err("expected a database".to_string()),
    }
}

fn evaluate(state: &mut FakeState, term: &Value) -> Result<Evaluated, String> {
    let parts = match term.as_array() {
        Some(parts) => parts,
        None => return Ok(Evaluated::Value(term.clone())),
    };
    let code = parts.first().and_then(Value::as_u64).ok_or("bad term")?;
    let empty = Vec::new();
    let args = parts.get(1).and_then(Value::as_array).unwrap_or(&empty);
    let opts = parts.get(2).cloned().unwrap_or_else(|| json!({}));

    match code {
        // DB_LIST
        59 if state.stale_listings => Ok(Evaluated::Value(json!([]))),
        59 => Ok(Evaluated::Value(json!(state.databases.keys().collect::<Vec<_>>()))),
        // DB_CREATE
        57 => {
            let name = string_arg(args, 0)?;
            if state.databases.contains_key(&name) {
                return Err(format!("Database `{name}` already exists."));
            }
            state.databases.insert(name, BTreeMap::new());
            state.counters.db_creates += 1;
            Ok(Evaluated::Value(json!({ "dbs_created": 1 })))
        }
        // DB
        14 => Ok(Evaluated::Db(string_arg(args, 0)?)),
        // TABLE_LIST
        62 => {
            let db = db_arg(state, args)?;
            let tables = state
                .databases
                .get(&db)
                .ok_or_else(|| format!("Database `{db}` does not exist."))?;
            if state.stale_listings {
                return Ok(Evaluated::Value(json!([])));
            }
            Ok(Evaluated::Value(json!(tables.keys().collect::<Vec<_>>())))
        }
        // TABLE_CREATE
        60 => {
            let db = db_arg(state, args)?;
            let name = string_arg(args, 1)?;
            let primary_key =
                opts.get("primary_key").and_then(Value::as_str).unwrap_or("id").to_string();
            let tables = state
                .databases
                .get_mut(&db)
                .ok_or_else(|| format!("Database `{db}` does not exist."))?;
            if tables.contains_key(&name) {
                return Err(format!("Table `{db}.{name}` already exists."));
            }
            tables.insert(name, Table { primary_key, ..Table::default() });
            state.counters.table_creates += 1;
            Ok(Evaluated::Value(json!({ "tables_created": 1 })))
        }
        // TABLE
        15 => {
            let db = db_arg(state, args)?;
            let name = string_arg(args, 1)?;
            table_ref(state, &db, &name)?;
            Ok(Evaluated::Table(db, name))
        }
        // INDEX_LIST
        77 => {
            let (db, table) = table_arg(state, args)?;
            if state.stale_listings {
                return Ok(Evaluated::Value(json!([])));
            }
            Ok(Evaluated::Value(json!(table_ref(state, &db, &table)?.indexes)))
        }
        // INDEX_CREATE
        75 => {
            let (db, table) = table_arg(state, args)?;
            let index = string_arg(args, 1)?;
            let t = table_ref(state, &db, &table)?;
            if t.indexes.contains(&index) {
                return Err(format!("Index `{index}` already exists on table `{db}.{table}`."));
            }
            t.indexes.push(index);
            state.counters.index_creates += 1;
            Ok(Evaluated::Value(json!({ "created": 1 })))
        }
        // INDEX_WAIT
        140 => {
            let (db, table) = table_arg(state, args)?;
            let statuses: Vec<Value> = table_ref(state, &db, &table)?
                .indexes
                .iter()
                .map(|i| json!({ "index": i, "ready": true }))
                .collect();
            Ok(Evaluated::Value(json!(statuses)))
        }
        // INSERT
        56 => {
            let (db, table) = table_arg(state, args)?;
            let document = unwrap_datum(args.get(1).ok_or("missing document")?);
            let t = table_ref(state, &db, &table)?;
            let key = document.get(&t.primary_key).cloned().unwrap_or(Value::Null);
            if t.rows.iter().any(|r| r.get(&t.primary_key) == Some(&key)) {
                return Ok(Evaluated::Value(json!({
                    "inserted": 0,
                    "errors": 1,
                    "first_error": format!("Duplicate primary key `{}`: {}", t.primary_key, key),
                })));
            }
            t.rows.push(document);
            Ok(Evaluated::Value(json!({ "inserted": 1, "errors": 0 })))
        }
        // GET
        16 => {
            let (db, table) = table_arg(state, args)?;
            let key = string_arg(args, 1)?;
            let t = table_ref(state, &db, &table)?;
            let value = t
                .rows
                .iter()
                .find(|r| r.get(&t.primary_key).and_then(Value::as_str) == Some(key.as_str()))
                .cloned()
                .unwrap_or(Value::Null);
            Ok(Evaluated::Row { db, table, key, value })
        }
        // GET_ALL
        78 => {
            let (db, table) = table_arg(state, args)?;
            let key = string_arg(args, 1)?;
            let t = table_ref(state, &db, &table)?;
            let index = opts.get("index").and_then(Value::as_str).unwrap_or(t.primary_key.as_str()).to_string();
            let rows = t
                .rows
                .iter()
                .filter(|r| r.get(&index).and_then(Value::as_str) == Some(key.as_str()))
                .cloned()
                .collect();
            Ok(Evaluated::Sequence(rows))
        }
        // DELETE
        54 => match evaluate(state, args.first().ok_or("missing selection")?)? {
            Evaluated::Row { db, table, key, .. } => {
                let t = table_ref(state, &db, &table)?;
                let before = t.rows.len();
                let pk = t.primary_key.clone();
                t.rows.retain(|r| r.get(&pk).and_then(Value::as_str) != Some(key.as_str()));
                Ok(Evaluated::Value(json!({ "deleted": before - t.rows.len() })))
            }
            _ => Err("delete expects a single row".to_string()),
        },
        other => Err(format!("unsupported term {other}")),
    }
}
