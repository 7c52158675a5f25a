//! Meeting Lambda - per-week meeting detail, fields, and slot assignments.
//!
//! Endpoints:
//! - GET /meetings/{id} - Meeting with assignments map and part rows
//! - PUT /meetings/{id} - Partial update of editable meeting fields
//! - POST /meetings/{id}/assignments - Upsert (or clear) a slot assignment
//! - POST /meetings/{id}/ministry-rows - Add a student-part row
//! - POST /meetings/{id}/living-rows - Add a Christian-living part row

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::db::{Statement, Value};
use shared::{Config, Database};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Slot keys a meeting can assign a person to
const SLOT_KEYS: [&str; 8] = [
    "chairman",
    "opening_prayer",
    "closing_prayer",
    "treasures_talk",
    "spiritual_gems",
    "bible_reading",
    "study_reader_paragraph",
    "study_reader_bible",
];

/// Meeting columns editable through PUT
const EDITABLE_FIELDS: [&str; 9] = [
    "week_title",
    "week_reading",
    "opening_song_no",
    "opening_song_title",
    "middle_song_no",
    "middle_song_title",
    "closing_song_no",
    "closing_song_title",
    "treasures_title",
];

/// Upsert slot assignment request
#[derive(Debug, Deserialize)]
struct SlotAssignmentRequest {
    slot_key: Option<String>,
    person_id: Option<i64>,
}

/// Create ministry row request
#[derive(Debug, Deserialize)]
struct MinistryRowRequest {
    part_no: Option<String>,
    part_title: Option<String>,
    publisher_id: Option<i64>,
    householder_id: Option<i64>,
}

/// Create living row request
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

/// Build the UPDATE statements for a partial meeting edit.
///
/// The whole body is validated before anything is returned: a request mixing
/// valid and unknown fields must not write at all.
fn update_statements(
    meeting_id: i64,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> shared::Result<Vec<Statement>> {
    let mut statements = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        if !EDITABLE_FIELDS.contains(&field.as_str()) {
            return Err(shared::Error::Validation(format!(
                "Unknown field: {}",
                field
            )));
        }
        let cell = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::String(s) => Value::text(s.clone()),
            _ => {
                return Err(shared::Error::Validation(format!(
                    "{} must be a string or null",
                    field
                )))
            }
        };
        // Field names are allow-listed above, never interpolated from input.
        statements.push(Statement::new(
            format!("UPDATE meetings SET {} = ? WHERE id = ?", field),
            vec![cell, Value::integer(meeting_id)],
        ));
    }
    Ok(statements)
}

/// Presence and allow-list check for a slot key.
fn validate_slot_key(slot_key: Option<String>) -> shared::Result<String> {
    let slot_key = slot_key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| shared::Error::Validation("slot_key is required".to_string()))?;
    if !SLOT_KEYS.contains(&slot_key.as_str()) {
        return Err(shared::Error::Validation(format!(
            "Invalid slot key. Must be one of: {:?}",
            SLOT_KEYS
        )));
    }
    Ok(slot_key)
}

async fn fetch_meeting(db: &Database, meeting_id: i64) -> shared::Result<serde_json::Value> {
    let rows = db
        .query(
            r#"
            SELECT id, cycle_id, sequence_no, meeting_date, week_title, week_reading,
                   opening_song_no, opening_song_title, middle_song_no, middle_song_title,
                   closing_song_no, closing_song_title, treasures_title
            FROM meetings WHERE id = ?
            "#,
            vec![Value::integer(meeting_id)],
        )
        .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| shared::Error::NotFound(format!("meeting {}", meeting_id)))
}

async fn route(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let raw_path = event.uri().path();
    // Strip /api stage prefix if present (API Gateway REST API includes stage in path)
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let method = event.method().as_str();

    let path_parts: Vec<&str> = match path.strip_prefix("/meetings/") {
        Some(rest) => rest.split('/').collect(),
        None => return shared::error_response(404, "Not found"),
    };
    let meeting_id = shared::parse_id(path_parts[0])?;

    match (method, path_parts.get(1)) {
        // Meeting detail: fields, slot map, and part rows
        ("GET", None) => {
            let meeting = fetch_meeting(&state.db, meeting_id).await?;

            // Re-derive the slot map from the normalized join table.
            let slot_rows = state
                .db
                .query(
                    "SELECT slot_key, person_id FROM slot_assignments WHERE meeting_id = ?",
                    vec![Value::integer(meeting_id)],
                )
                .await?;
            let mut assignments = serde_json::Map::new();
            for row in &slot_rows {
                if let Some(slot_key) = row["slot_key"].as_str() {
                    assignments.insert(slot_key.to_string(), row["person_id"].clone());
                }
            }

            let ministry_rows = state
                .db
                .query(
                    "SELECT id, meeting_id, part_no, part_title, publisher_id, householder_id FROM ministry_rows WHERE meeting_id = ? ORDER BY id ASC",
                    vec![Value::integer(meeting_id)],
                )
                .await?;
            let living_rows = state
                .db
                .query(
                    "SELECT id, meeting_id, part_no, part_title, speaker_id FROM living_rows WHERE meeting_id = ? ORDER BY id ASC",
                    vec![Value::integer(meeting_id)],
                )
                .await?;

            shared::json_response(
                200,
                &serde_json::json!({
                    "meeting": meeting,
                    "assignments": assignments,
                    "ministry_rows": ministry_rows,
                    "living_rows": living_rows,
                }),
            )
        }

        // Partial update of editable meeting fields
        ("PUT", None) => {
            let request: serde_json::Map<String, serde_json::Value> =
                shared::parse_json_body(event.body())?;

            // Validate the whole body before any statement runs.
            let statements = update_statements(meeting_id, &request)?;

            fetch_meeting(&state.db, meeting_id).await?;

            if !statements.is_empty() {
                state.db.execute_batch(statements).await?;
            }

            info!("Updated meeting {} ({} fields)", meeting_id, request.len());

            shared::json_response(200, &serde_json::json!({"success": true}))
        }

        // Upsert a slot assignment; a null person clears the slot
        ("POST", Some(&"assignments")) => {
            let request: SlotAssignmentRequest = shared::parse_json_body(event.body())?;
            let slot_key = validate_slot_key(request.slot_key)?;

            fetch_meeting(&state.db, meeting_id).await?;

            match request.person_id {
                Some(person_id) => {
                    state
                        .db
                        .execute(
                            r#"
                            INSERT INTO slot_assignments (meeting_id, slot_key, person_id)
                            VALUES (?, ?, ?)
                            ON CONFLICT (meeting_id, slot_key) DO UPDATE SET person_id = excluded.person_id
                            "#,
                            vec![
                                Value::integer(meeting_id),
                                Value::text(&slot_key),
                                Value::integer(person_id),
                            ],
                        )
                        .await?;
                    info!(
                        "Assigned person {} to {} of meeting {}",
                        person_id, slot_key, meeting_id
                    );
                }
                None => {
                    state
                        .db
                        .execute(
                            "DELETE FROM slot_assignments WHERE meeting_id = ? AND slot_key = ?",
                            vec![Value::integer(meeting_id), Value::text(&slot_key)],
                        )
                        .await?;
                    info!("Cleared {} of meeting {}", slot_key, meeting_id);
                }
            }

            shared::json_response(200, &serde_json::json!({"success": true}))
        }

        // Add a student-part row
        ("POST", Some(&"ministry-rows")) => {
            let request: MinistryRowRequest = shared::parse_json_body(event.body())?;

            fetch_meeting(&state.db, meeting_id).await?;

            let result = state
                .db
                .execute(
                    "INSERT INTO ministry_rows (meeting_id, part_no, part_title, publisher_id, householder_id) VALUES (?, ?, ?, ?, ?)",
                    vec![
                        Value::integer(meeting_id),
                        Value::opt_text(request.part_no.as_deref()),
                        Value::opt_text(request.part_title.as_deref()),
                        Value::opt_integer(request.publisher_id),
                        Value::opt_integer(request.householder_id),
                    ],
                )
                .await?;
            let row_id = result.last_insert_id()?;

            info!("Added ministry row {} to meeting {}", row_id, meeting_id);

            let created = state
                .db
                .query(
                    "SELECT id, meeting_id, part_no, part_title, publisher_id, householder_id FROM ministry_rows WHERE id = ?",
                    vec![Value::integer(row_id)],
                )
                .await?;
            shared::json_response(201, &created.into_iter().next())
        }

        // Add a Christian-living part row
        ("POST", Some(&"living-rows")) => {
            let request: LivingRowRequest = shared::parse_json_body(event.body())?;

            fetch_meeting(&state.db, meeting_id).await?;

            let result = state
                .db
                .execute(
                    "INSERT INTO living_rows (meeting_id, part_no, part_title, speaker_id) VALUES (?, ?, ?, ?)",
                    vec![
                        Value::integer(meeting_id),
                        Value::opt_text(request.part_no.as_deref()),
                        Value::opt_text(request.part_title.as_deref()),
                        Value::opt_integer(request.speaker_id),
                    ],
                )
                .await?;
            let row_id = result.last_insert_id()?;

            info!("Added living row {} to meeting {}", row_id, meeting_id);

            let created = state
                .db
                .query(
                    "SELECT id, meeting_id, part_no, part_title, speaker_id FROM living_rows WHERE id = ?",
                    vec![Value::integer(row_id)],
                )
                .await?;
            shared::json_response(201, &created.into_iter().next())
        }

        // Known paths with the wrong verb get 405; unknown subresources 404.
        (_, None)
        | (_, Some(&"assignments"))
        | (_, Some(&"ministry-rows"))
        | (_, Some(&"living-rows")) => shared::error_response(405, "Method not allowed"),

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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn test_update_statements_build() {
        let statements = update_statements(
            5,
            &fields(json!({
                "week_title": "Proverbs 7-8",
                "treasures_title": null,
            })),
        )
        .unwrap();

        // serde_json::Map iterates in sorted key order.
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "UPDATE meetings SET treasures_title = ? WHERE id = ?"
        );
        assert_eq!(statements[0].args, vec![Value::Null, Value::integer(5)]);
        assert_eq!(
            statements[1].sql,
            "UPDATE meetings SET week_title = ? WHERE id = ?"
        );
        assert_eq!(
            statements[1].args,
            vec![Value::text("Proverbs 7-8"), Value::integer(5)]
        );
    }

    #[test]
    fn test_update_rejects_unknown_field_before_any_statement() {
        // Mixing a valid field with an unknown one must reject the whole
        // request; no statement list is ever produced for the valid part.
        let err = update_statements(
            5,
            &fields(json!({
                "week_title": "x",
                "zzz": "y",
            })),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_update_rejects_non_string_value() {
        let err = update_statements(5, &fields(json!({"week_title": 7}))).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_update_accepts_every_editable_field() {
        for field in EDITABLE_FIELDS {
            let mut body = serde_json::Map::new();
            body.insert(field.to_string(), json!("value"));
            let statements = update_statements(1, &body).unwrap();
            assert_eq!(statements.len(), 1);
        }
    }

    #[test]
    fn test_slot_key_allow_list() {
        assert_eq!(
            validate_slot_key(Some("chairman".to_string())).unwrap(),
            "chairman"
        );
        for key in SLOT_KEYS {
            assert!(validate_slot_key(Some(key.to_string())).is_ok());
        }

        let err = validate_slot_key(Some("song_leader".to_string())).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            validate_slot_key(Some(String::new())).unwrap_err().status_code(),
            400
        );
        assert_eq!(validate_slot_key(None).unwrap_err().status_code(), 400);
    }
}
