//! RethinkDB-backed implementation of [`PersistApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::persist::rethink::connection::Connection;
use crate::persist::rethink::protocol::Term;
use crate::persist::{PersistApi, PersistError, PersistResult};
use crate::pps::types::{CommitMapping, Job, JobLog, JobStatus, Pipeline};

pub const JOBS_TABLE: &str = "jobs";
pub const JOB_STATUSES_TABLE: &str = "job_statuses";
pub const JOB_LOGS_TABLE: &str = "job_logs";
pub const PIPELINES_TABLE: &str = "pipelines";
pub const COMMIT_MAPPINGS_TABLE: &str = "pfs_commit_mappings";

struct TableSpec {
    name: &'static str,
    primary_key: Option<&'static str>,
    indexes: &'static [&'static str],
}

const TABLES: &[TableSpec] = &[
    TableSpec { name: JOBS_TABLE, primary_key: None, indexes: &["pipeline_name"] },
    TableSpec { name: JOB_STATUSES_TABLE, primary_key: None, indexes: &["job_id"] },
    TableSpec { name: JOB_LOGS_TABLE, primary_key: None, indexes: &["job_id"] },
    TableSpec { name: PIPELINES_TABLE, primary_key: Some("name"), indexes: &[] },
    TableSpec { name: COMMIT_MAPPINGS_TABLE, primary_key: None, indexes: &["pipeline_name"] },
];

/// What a call to [`init_dbs`] had to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub created_database: bool,
    pub created_tables: Vec<String>,
    pub created_indexes: Vec<String>,
}

impl InitSummary {
    pub fn is_noop(&self) -> bool {
        !self.created_database && self.created_tables.is_empty() && self.created_indexes.is_empty()
    }
}

/// Ensure `database`, its tables and secondary indexes exist.
///
/// Safe to call any number of times; existing objects are left untouched.
pub async fn init_dbs(address: &str, database: &str) -> PersistResult<InitSummary> {
    let conn = Connection::open(address).await?;
    let mut summary = InitSummary::default();

    let databases: Vec<String> = decode_all(conn.run_sequence(&Term::db_list()).await?)?;
    if !databases.iter().any(|d| d == database) {
        summary.created_database = create_if_missing(&conn, &Term::db_create(database)).await?;
    }

    let tables: Vec<String> = decode_all(conn.run_sequence(&Term::table_list(database)).await?)?;
    for spec in TABLES {
        if !tables.iter().any(|t| t == spec.name) {
            let create = Term::table_create(database, spec.name, spec.primary_key);
            if create_if_missing(&conn, &create).await? {
                summary.created_tables.push(spec.name.to_string());
            }
        }
    }

    for spec in TABLES.iter().filter(|s| !s.indexes.is_empty()) {
        let table = Term::table(database, spec.name);
        let existing: Vec<String> =
            decode_all(conn.run_sequence(&table.clone().index_list()).await?)?;
        for index in spec.indexes {
            if !existing.iter().any(|i| i == index)
                && create_if_missing(&conn, &table.clone().index_create(index)).await?
            {
                summary.created_indexes.push(format!("{}.{}", spec.name, index));
            }
        }
        conn.run_atom(&table.index_wait()).await?;
    }

    tracing::info!(
        address,
        database,
        created_database = summary.created_database,
        created_tables = summary.created_tables.len(),
        created_indexes = summary.created_indexes.len(),
        "Database initialized"
    );

    Ok(summary)
}

/// Run a create term. Returns false when another process created the object
/// between our listing and this call.
async fn create_if_missing(conn: &Connection, create: &Term) -> PersistResult<bool> {
    match conn.run_atom(create).await {
        Ok(_) => Ok(true),
        Err(PersistError::Query { kind: "runtime", message })
            if message.contains("already exists") =>
        {
            tracing::debug!(%message, "Concurrent initializer already created object");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Persistence client bound to one database.
#[derive(Debug)]
pub struct RethinkPersist {
    conn: Connection,
    database: String,
}

impl RethinkPersist {
    /// Connect to an already-initialized database.
    pub async fn connect(address: &str, database: &str) -> PersistResult<Self> {
        let conn = Connection::open(address).await?;
        Ok(Self { conn, database: database.to_string() })
    }

    fn table(&self, name: &str) -> Term {
        Term::table(&self.database, name)
    }

    async fn insert<T: Serialize>(
        &self,
        table: &str,
        kind: &'static str,
        key: &str,
        record: &T,
    ) -> PersistResult<()> {
        let document = serde_json::to_value(record)?;
        let result = self.conn.run_atom(&self.table(table).insert(&document)).await?;
        check_write(&result, kind, key)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        kind: &'static str,
        key: &str,
    ) -> PersistResult<T> {
        match self.conn.run_atom(&self.table(table).get(key)).await? {
            Value::Null => Err(PersistError::NotFound { kind, key: key.to_string() }),
            value => Ok(serde_json::from_value(value)?),
        }
    }

    async fn scan<T: DeserializeOwned>(&self, table: &str) -> PersistResult<Vec<T>> {
        decode_all(self.conn.run_sequence(&self.table(table)).await?)
    }

    async fn by_index<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &str,
        index: &str,
    ) -> PersistResult<Vec<T>> {
        decode_all(self.conn.run_sequence(&self.table(table).get_all(key, index)).await?)
    }
}

fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> PersistResult<Vec<T>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(PersistError::from))
        .collect()
}

/// Inspect a write summary (`{"inserted": n, "errors": n, "first_error": ...}`).
fn check_write(result: &Value, kind: &'static str, key: &str) -> PersistResult<()> {
    let errors = result.get("errors").and_then(Value::as_u64).unwrap_or(0);
    if errors == 0 {
        return Ok(());
    }
    let message = result
        .get("first_error")
        .and_then(Value::as_str)
        .unwrap_or("write failed")
        .to_string();
    if message.contains("Duplicate primary key") {
        return Err(PersistError::AlreadyExists { kind, key: key.to_string() });
    }
    Err(PersistError::Query { kind: "write", message })
}

#[async_trait]
impl PersistApi for RethinkPersist {
    async fn create_job(&self, job: Job) -> PersistResult<Job> {
        self.insert(JOBS_TABLE, "job", &job.id, &job).await?;
        Ok(job)
    }

    async fn get_job(&self, id: &str) -> PersistResult<Job> {
        self.get(JOBS_TABLE, "job", id).await
    }

    async fn list_jobs(&self, pipeline_name: Option<&str>) -> PersistResult<Vec<Job>> {
        let mut jobs: Vec<Job> = match pipeline_name {
            Some(name) => self.by_index(JOBS_TABLE, name, "pipeline_name").await?,
            None => self.scan(JOBS_TABLE).await?,
        };
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn create_job_status(&self, status: JobStatus) -> PersistResult<()> {
        self.insert(JOB_STATUSES_TABLE, "job status", &status.id, &status).await
    }

    async fn list_job_statuses(&self, job_id: &str) -> PersistResult<Vec<JobStatus>> {
        let mut statuses: Vec<JobStatus> =
            self.by_index(JOB_STATUSES_TABLE, job_id, "job_id").await?;
        statuses.sort_by_key(|s| s.timestamp);
        Ok(statuses)
    }

    async fn create_job_log(&self, log: JobLog) -> PersistResult<()> {
        self.insert(JOB_LOGS_TABLE, "job log", &log.id, &log).await
    }

    async fn list_job_logs(&self, job_id: &str) -> PersistResult<Vec<JobLog>> {
        let mut logs: Vec<JobLog> = self.by_index(JOB_LOGS_TABLE, job_id, "job_id").await?;
        logs.sort_by_key(|l| l.timestamp);
        Ok(logs)
    }

    async fn create_pipeline(&self, pipeline: Pipeline) -> PersistResult<Pipeline> {
        self.insert(PIPELINES_TABLE, "pipeline", &pipeline.name, &pipeline).await?;
        Ok(pipeline)
    }

    async fn get_pipeline(&self, name: &str) -> PersistResult<Pipeline> {
        self.get(PIPELINES_TABLE, "pipeline", name).await
    }

    async fn list_pipelines(&self) -> PersistResult<Vec<Pipeline>> {
        let mut pipelines: Vec<Pipeline> = self.scan(PIPELINES_TABLE).await?;
        pipelines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, name: &str) -> PersistResult<()> {
        let result = self.conn.run_atom(&self.table(PIPELINES_TABLE).get(name).delete()).await?;
        match result.get("deleted").and_then(Value::as_u64) {
            Some(0) | None => Err(PersistError::NotFound { kind: "pipeline", key: name.to_string() }),
            Some(_) => Ok(()),
        }
    }

    async fn create_commit_mapping(&self, mapping: CommitMapping) -> PersistResult<()> {
        self.insert(COMMIT_MAPPINGS_TABLE, "commit mapping", &mapping.id, &mapping).await
    }

    async fn list_commit_mappings(&self, pipeline_name: &str) -> PersistResult<Vec<CommitMapping>> {
        self.by_index(COMMIT_MAPPINGS_TABLE, pipeline_name, "pipeline_name").await
    }
}
