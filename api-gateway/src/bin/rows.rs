//! Part-row Lambda - edit and remove the per-meeting part rows.
//!
//! Endpoints:
//! - PUT /ministry-rows/{id} - Update a student-part row
//! - DELETE /ministry-rows/{id} - Remove a student-part row
//! - PUT /living-rows/{id} - Update a Christian-living part row
//! - DELETE /living-rows/{id} - Remove a Christian-living part row

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::db::Value;
use shared::{Config, Database};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Update ministry row request
#[derive(Debug, Deserialize)]
struct MinistryRowRequest {
    part_no: Option<String>,
    part_title: Option<String>,
    publisher_id: Option<i64>,
    householder_id: Option<i64>,
}

/// Update living row request
#[derive(Debug, Deserialize)]
struct LivingRowRequest {
    part_no: Option<String>,
    part_title: Option<String>,
    speaker_id: Option<i64>,
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

async fn route(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let raw_path = event.uri().path();
    // Strip /api stage prefix if present (API Gateway REST API includes stage in path)
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let method = event.method().as_str();

    if let Some(segment) = path.strip_prefix("/ministry-rows/") {
        let row_id = shared::parse_id(segment)?;

        return match method {
            "PUT" => {
                let request: MinistryRowRequest = shared::parse_json_body(event.body())?;

                let result = state
                    .db
                    .execute(
                        "UPDATE ministry_rows SET part_no = ?, part_title = ?, publisher_id = ?, householder_id = ? WHERE id = ?",
                        vec![
                            Value::opt_text(request.part_no.as_deref()),
                            Value::opt_text(request.part_title.as_deref()),
                            Value::opt_integer(request.publisher_id),
                            Value::opt_integer(request.householder_id),
                            Value::integer(row_id),
                        ],
                    )
                    .await?;
                if result.affected_row_count == 0 {
                    return Err(shared::Error::NotFound(format!("ministry row {}", row_id)));
                }

                info!("Updated ministry row {}", row_id);

                shared::json_response(200, &serde_json::json!({"success": true}))
            }

            "DELETE" => {
                state
                    .db
                    .execute(
                        "DELETE FROM ministry_rows WHERE id = ?",
                        vec![Value::integer(row_id)],
                    )
                    .await?;

                info!("Deleted ministry row {}", row_id);

                shared::json_response(200, &serde_json::json!({"success": true}))
            }

            _ => shared::error_response(405, "Method not allowed"),
        };
    }

    if let Some(segment) = path.strip_prefix("/living-rows/") {
        let row_id = shared::parse_id(segment)?;

        return match method {
            "PUT" => {
                let request: LivingRowRequest = shared::parse_json_body(event.body())?;

                let result = state
                    .db
                    .execute(
                        "UPDATE living_rows SET part_no = ?, part_title = ?, speaker_id = ? WHERE id = ?",
                        vec![
                            Value::opt_text(request.part_no.as_deref()),
                            Value::opt_text(request.part_title.as_deref()),
                            Value::opt_integer(request.speaker_id),
                            Value::integer(row_id),
                        ],
                    )
                    .await?;
                if result.affected_row_count == 0 {
                    return Err(shared::Error::NotFound(format!("living row {}", row_id)));
                }

                info!("Updated living row {}", row_id);

                shared::json_response(200, &serde_json::json!({"success": true}))
            }

            "DELETE" => {
                state
                    .db
                    .execute(
                        "DELETE FROM living_rows WHERE id = ?",
                        vec![Value::integer(row_id)],
                    )
                    .await?;

                info!("Deleted living row {}", row_id);

                shared::json_response(200, &serde_json::json!({"success": true}))
            }

            _ => shared::error_response(405, "Method not allowed"),
        };
    }

    shared::error_response(404, "Not found")
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
