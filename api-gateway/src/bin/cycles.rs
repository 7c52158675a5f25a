//! Cycle Lambda - scheduling cycles and their generated weekly meetings.
//!
//! Endpoints:
//! - GET /cycles - List cycles
//! - POST /cycles - Create a cycle and its weekly meetings
//! - GET /cycles/{id}/meetings - List the cycle's meetings
//! - DELETE /cycles/{id} - Delete a cycle and everything under it

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::db::{Statement, Value};
use shared::{Config, Database, MEETING_WEEKDAY};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Create cycle request
#[derive(Debug, Deserialize)]
struct CreateCycleRequest {
    title: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Application state
struct AppState {
    db: Database,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let db = Database::connect(&config).await?;
        shared::init_schema(&db).await?;
        Ok(Self { db })
    }
}

async fn cycle_exists(db: &Database, cycle_id: i64) -> shared::Result<bool> {
    let rows = db
        .query(
            "SELECT id FROM cycles WHERE id = ?",
            vec![Value::integer(cycle_id)],
        )
        .await?;
    Ok(!rows.is_empty())
}

async fn route(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let raw_path = event.uri().path();
    // Strip /api stage prefix if present (API Gateway REST API includes stage in path)
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let method = event.method().as_str();

    match (method, path) {
        // List cycles
        ("GET", "/cycles") => {
            let cycles = state
                .db
                .query(
                    "SELECT id, title, start_date, end_date, created_at FROM cycles ORDER BY start_date DESC",
                    Vec::new(),
                )
                .await?;
            shared::json_response(200, &cycles)
        }

        // Create a cycle and generate one meeting per scheduled weekday
        ("POST", "/cycles") => {
            let request: CreateCycleRequest = shared::parse_json_body(event.body())?;

            let (title, start_raw, end_raw) = match (
                request.title.filter(|t| !t.trim().is_empty()),
                request.start_date,
                request.end_date,
            ) {
                (Some(title), Some(start), Some(end)) => (title.trim().to_string(), start, end),
                _ => {
                    return Err(shared::Error::Validation(
                        "title, start_date and end_date are required".to_string(),
                    ))
                }
            };

            let start = shared::parse_iso_date("start_date", &start_raw)?;
            let end = shared::parse_iso_date("end_date", &end_raw)?;
            let dates = shared::weekly_dates(start, end, MEETING_WEEKDAY)?;

            let result = state
                .db
                .execute(
                    "INSERT INTO cycles (title, start_date, end_date) VALUES (?, ?, ?)",
                    vec![
                        Value::text(&title),
                        Value::text(start.to_string()),
                        Value::text(end.to_string()),
                    ],
                )
                .await?;
            let cycle_id = result.last_insert_id()?;

            // One insert per week, batched into a single pipeline round trip.
            let inserts = dates
                .iter()
                .enumerate()
                .map(|(idx, date)| {
                    Statement::new(
                        "INSERT INTO meetings (cycle_id, sequence_no, meeting_date) VALUES (?, ?, ?)",
                        vec![
                            Value::integer(cycle_id),
                            Value::integer(idx as i64 + 1),
                            Value::text(date.to_string()),
                        ],
                    )
                })
                .collect::<Vec<_>>();
            if !inserts.is_empty() {
                state.db.execute_batch(inserts).await?;
            }

            info!(
                "Created cycle {} ({}) with {} meetings",
                cycle_id,
                title,
                dates.len()
            );

            shared::json_response(
                201,
                &serde_json::json!({
                    "id": cycle_id,
                    "title": title,
                    "start_date": start.to_string(),
                    "end_date": end.to_string(),
                    "meeting_count": dates.len(),
                }),
            )
        }

        // Cycle-specific routes
        _ if path.starts_with("/cycles/") => {
            let path_parts: Vec<&str> = path.trim_start_matches("/cycles/").split('/').collect();
            let cycle_id = shared::parse_id(path_parts[0])?;

            match (method, path_parts.get(1)) {
                // List the cycle's meetings
                ("GET", Some(&"meetings")) => {
                    if !cycle_exists(&state.db, cycle_id).await? {
                        return Err(shared::Error::NotFound(format!("cycle {}", cycle_id)));
                    }

                    let meetings = state
                        .db
                        .query(
                            "SELECT id, sequence_no, meeting_date FROM meetings WHERE cycle_id = ? ORDER BY sequence_no ASC",
                            vec![Value::integer(cycle_id)],
                        )
                        .await?;
                    shared::json_response(200, &meetings)
                }

                // Delete the cycle and everything under it
                ("DELETE", None) => {
                    if !cycle_exists(&state.db, cycle_id).await? {
                        return Err(shared::Error::NotFound(format!("cycle {}", cycle_id)));
                    }

                    // Dependents first; the pipeline has no transactions.
                    state
                        .db
                        .execute_batch(vec![
                            Statement::new(
                                "DELETE FROM slot_assignments WHERE meeting_id IN (SELECT id FROM meetings WHERE cycle_id = ?)",
                                vec![Value::integer(cycle_id)],
                            ),
                            Statement::new(
                                "DELETE FROM ministry_rows WHERE meeting_id IN (SELECT id FROM meetings WHERE cycle_id = ?)",
                                vec![Value::integer(cycle_id)],
                            ),
                            Statement::new(
                                "DELETE FROM living_rows WHERE meeting_id IN (SELECT id FROM meetings WHERE cycle_id = ?)",
                                vec![Value::integer(cycle_id)],
                            ),
                            Statement::new(
                                "DELETE FROM meetings WHERE cycle_id = ?",
                                vec![Value::integer(cycle_id)],
                            ),
                            Statement::new(
                                "DELETE FROM cycles WHERE id = ?",
                                vec![Value::integer(cycle_id)],
                            ),
                        ])
                        .await?;

                    info!("Deleted cycle {}", cycle_id);

                    shared::json_response(200, &serde_json::json!({"success": true}))
                }

                _ => shared::error_response(405, "Method not allowed"),
            }
        }

        _ => shared::error_response(404, "Not found"),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method() == lambda_http::http::Method::OPTIONS {
        return Ok(shared::preflight_response()?);
    }

    match route(&state, &event).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!("Request failed: {}", err);
            Ok(shared::failure_response(&err)?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
