//! HTTP SQL-pipeline database client.
//!
//! The hosted database is reached over the libsql `/v2/pipeline` endpoint:
//! each call POSTs a batch of `execute` requests followed by a `close`, and
//! the response carries typed cells that get reshaped into JSON objects
//! keyed by column name.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{Config, Error, Result};

/// A typed SQL cell, as carried on the pipeline wire.
///
/// Integers travel as decimal strings; the endpoint rejects bare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Value {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl Value {
    pub fn integer(v: i64) -> Self {
        Value::Integer {
            value: v.to_string(),
        }
    }

    pub fn float(v: f64) -> Self {
        Value::Float { value: v }
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Text { value: v.into() }
    }

    pub fn blob(bytes: &[u8]) -> Self {
        Value::Blob {
            base64: BASE64.encode(bytes),
        }
    }

    /// NULL when absent, INTEGER otherwise.
    pub fn opt_integer(v: Option<i64>) -> Self {
        v.map(Value::integer).unwrap_or(Value::Null)
    }

    /// NULL when absent, TEXT otherwise.
    pub fn opt_text(v: Option<&str>) -> Self {
        v.map(Value::text).unwrap_or(Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer { value } => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text { value } => Some(value),
            _ => None,
        }
    }

    /// Convert a cell to plain JSON for API responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer { value } => value
                .parse::<i64>()
                .map(serde_json::Value::from)
                .unwrap_or_else(|_| serde_json::Value::String(value.clone())),
            Value::Float { value } => serde_json::Value::from(*value),
            Value::Text { value } => serde_json::Value::String(value.clone()),
            Value::Blob { base64 } => serde_json::Value::String(base64.clone()),
        }
    }
}

/// A parameterized SQL statement.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineRequest {
    Execute { stmt: Statement },
    Close,
}

#[derive(Debug, Serialize)]
struct PipelineBody {
    requests: Vec<PipelineRequest>,
}

/// One column of a result set.
#[derive(Debug, Clone, Deserialize)]
pub struct Col {
    pub name: String,
    #[serde(default)]
    pub decltype: Option<String>,
}

/// Result of a single executed statement.
#[derive(Debug, Clone, Deserialize)]
pub struct StmtResult {
    #[serde(default)]
    pub cols: Vec<Col>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub affected_row_count: u64,
    #[serde(default)]
    pub last_insert_rowid: Option<String>,
}

impl StmtResult {
    /// Rowid of the row inserted by this statement.
    pub fn last_insert_id(&self) -> Result<i64> {
        self.last_insert_rowid
            .as_deref()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Database("No last_insert_rowid in result".to_string()))
    }

    /// Reshape rows into JSON objects keyed by column name.
    pub fn rows_as_objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, cell) in self.cols.iter().zip(row.iter()) {
                    obj.insert(col.name.clone(), cell.to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PipelineError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineResult {
    Ok { response: PipelineResponse },
    Error { error: PipelineError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineResponse {
    Execute { result: StmtResult },
    Close,
}

#[derive(Debug, Deserialize)]
struct PipelineReply {
    results: Vec<PipelineResult>,
}

/// Unpack per-statement results, surfacing the first pipeline error.
fn collect_results(reply: PipelineReply) -> Result<Vec<StmtResult>> {
    let mut results = Vec::new();
    for entry in reply.results {
        match entry {
            PipelineResult::Ok {
                response: PipelineResponse::Execute { result },
            } => results.push(result),
            PipelineResult::Ok {
                response: PipelineResponse::Close,
            } => {}
            PipelineResult::Error { error } => {
                let message = match error.code {
                    Some(code) => format!("{}: {}", code, error.message),
                    None => error.message,
                };
                return Err(Error::Database(message));
            }
        }
    }
    Ok(results)
}

/// Rewrite a configured database URL to the HTTPS pipeline endpoint.
fn pipeline_url(database_url: &str) -> String {
    let https = if let Some(rest) = database_url.strip_prefix("libsql://") {
        format!("https://{}", rest)
    } else {
        database_url.to_string()
    };
    format!("{}/v2/pipeline", https.trim_end_matches('/'))
}

/// Client for the hosted database's SQL pipeline endpoint.
#[derive(Debug, Clone)]
pub struct Database {
    client: reqwest::Client,
    url: String,
    auth_token: String,
}

impl Database {
    pub fn new(database_url: &str, auth_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: pipeline_url(database_url),
            auth_token: auth_token.to_string(),
        }
    }

    /// Build a client from configuration, resolving the auth token.
    pub async fn connect(config: &Config) -> Result<Self> {
        let token = crate::secrets::resolve_auth_token(config).await?;
        Ok(Self::new(&config.database_url, &token))
    }

    /// Execute a batch of statements in a single pipeline round trip.
    ///
    /// Statements run in order but without transactional guarantees; each is
    /// an independent commit on the server side.
    pub async fn execute_batch(&self, statements: Vec<Statement>) -> Result<Vec<StmtResult>> {
        let mut requests: Vec<PipelineRequest> = statements
            .into_iter()
            .map(|stmt| PipelineRequest::Execute { stmt })
            .collect();
        requests.push(PipelineRequest::Close);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.auth_token)
            .json(&PipelineBody { requests })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Database(format!(
                "Pipeline request failed ({}): {}",
                status, body
            )));
        }

        let reply: PipelineReply = response.json().await?;
        collect_results(reply)
    }

    /// Execute a single parameterized statement.
    pub async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<StmtResult> {
        let mut results = self.execute_batch(vec![Statement::new(sql, args)]).await?;
        results
            .pop()
            .ok_or_else(|| Error::Database("Empty pipeline response".to_string()))
    }

    /// Execute a query and reshape the rows into JSON objects.
    pub async fn query(&self, sql: &str, args: Vec<Value>) -> Result<Vec<serde_json::Value>> {
        Ok(self.execute(sql, args).await?.rows_as_objects())
    }
}

/// Idempotent schema, applied at cold start.
const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        category TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cycles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meetings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cycle_id INTEGER NOT NULL,
        sequence_no INTEGER NOT NULL,
        meeting_date TEXT NOT NULL,
        week_title TEXT,
        week_reading TEXT,
        opening_song_no TEXT,
        opening_song_title TEXT,
        middle_song_no TEXT,
        middle_song_title TEXT,
        closing_song_no TEXT,
        closing_song_title TEXT,
        treasures_title TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (cycle_id) REFERENCES cycles(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS slot_assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meeting_id INTEGER NOT NULL,
        slot_key TEXT NOT NULL,
        person_id INTEGER,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (meeting_id, slot_key),
        FOREIGN KEY (meeting_id) REFERENCES meetings(id),
        FOREIGN KEY (person_id) REFERENCES people(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ministry_rows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meeting_id INTEGER NOT NULL,
        part_no TEXT,
        part_title TEXT,
        publisher_id INTEGER,
        householder_id INTEGER,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (meeting_id) REFERENCES meetings(id),
        FOREIGN KEY (publisher_id) REFERENCES people(id),
        FOREIGN KEY (householder_id) REFERENCES people(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS living_rows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meeting_id INTEGER NOT NULL,
        part_no TEXT,
        part_title TEXT,
        speaker_id INTEGER,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (meeting_id) REFERENCES meetings(id),
        FOREIGN KEY (speaker_id) REFERENCES people(id)
    )
    "#,
];

/// Create all tables if they do not exist yet.
pub async fn init_schema(db: &Database) -> Result<()> {
    let statements = SCHEMA
        .iter()
        .map(|sql| Statement::new(*sql, Vec::new()))
        .collect();
    db.execute_batch(statements).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arg_encoding() {
        let stmt = Statement::new(
            "INSERT INTO people (full_name, category) VALUES (?, ?)",
            vec![Value::text("Ana Reyes"), Value::opt_integer(None)],
        );
        let encoded = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            encoded["args"],
            json!([
                {"type": "text", "value": "Ana Reyes"},
                {"type": "null"}
            ])
        );
    }

    #[test]
    fn test_integer_args_travel_as_strings() {
        let encoded = serde_json::to_value(Value::integer(42)).unwrap();
        assert_eq!(encoded, json!({"type": "integer", "value": "42"}));
    }

    #[test]
    fn test_cell_decoding() {
        let cell: Value = serde_json::from_value(json!({"type": "integer", "value": "17"})).unwrap();
        assert_eq!(cell.as_i64(), Some(17));

        let cell: Value = serde_json::from_value(json!({"type": "text", "value": "elder"})).unwrap();
        assert_eq!(cell.as_str(), Some("elder"));

        let cell: Value = serde_json::from_value(json!({"type": "null"})).unwrap();
        assert_eq!(cell, Value::Null);
    }

    #[test]
    fn test_blob_cells() {
        let cell = Value::blob(&[0x01, 0x02]);
        let encoded = serde_json::to_value(&cell).unwrap();
        assert_eq!(encoded, json!({"type": "blob", "base64": "AQI="}));

        let decoded: Value = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, cell);
        assert_eq!(decoded.to_json(), json!("AQI="));
    }

    #[test]
    fn test_rows_as_objects() {
        let result = StmtResult {
            cols: vec![
                Col {
                    name: "id".to_string(),
                    decltype: Some("INTEGER".to_string()),
                },
                Col {
                    name: "full_name".to_string(),
                    decltype: Some("TEXT".to_string()),
                },
                Col {
                    name: "notes".to_string(),
                    decltype: Some("TEXT".to_string()),
                },
            ],
            rows: vec![vec![
                Value::integer(3),
                Value::text("Ana Reyes"),
                Value::Null,
            ]],
            affected_row_count: 0,
            last_insert_rowid: None,
        };

        let objects = result.rows_as_objects();
        assert_eq!(
            objects,
            vec![json!({"id": 3, "full_name": "Ana Reyes", "notes": null})]
        );
    }

    #[test]
    fn test_pipeline_reply_parsing() {
        let raw = json!({
            "results": [
                {
                    "type": "ok",
                    "response": {
                        "type": "execute",
                        "result": {
                            "cols": [{"name": "id", "decltype": "INTEGER"}],
                            "rows": [[{"type": "integer", "value": "1"}]],
                            "affected_row_count": 0,
                            "last_insert_rowid": null
                        }
                    }
                },
                {"type": "ok", "response": {"type": "close"}}
            ]
        });

        let reply: PipelineReply = serde_json::from_value(raw).unwrap();
        let results = collect_results(reply).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rows[0][0].as_i64(), Some(1));
    }

    #[test]
    fn test_pipeline_error_surfaces() {
        let raw = json!({
            "results": [
                {
                    "type": "error",
                    "error": {"message": "no such table: peoples", "code": "SQLITE_ERROR"}
                }
            ]
        });

        let reply: PipelineReply = serde_json::from_value(raw).unwrap();
        let err = collect_results(reply).unwrap_err();
        match err {
            Error::Database(message) => {
                assert_eq!(message, "SQLITE_ERROR: no such table: peoples");
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn test_last_insert_id() {
        let result = StmtResult {
            cols: Vec::new(),
            rows: Vec::new(),
            affected_row_count: 1,
            last_insert_rowid: Some("12".to_string()),
        };
        assert_eq!(result.last_insert_id().unwrap(), 12);
    }

    #[test]
    fn test_pipeline_url_rewrite() {
        assert_eq!(
            pipeline_url("libsql://cong.turso.io"),
            "https://cong.turso.io/v2/pipeline"
        );
        assert_eq!(
            pipeline_url("https://cong.turso.io/"),
            "https://cong.turso.io/v2/pipeline"
        );
    }
}
