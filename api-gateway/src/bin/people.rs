//! People Lambda - CRUD operations for congregation members.
//!
//! Endpoints:
//! - GET /people - List people
//! - POST /people - Add a person
//! - PUT /people/{id} - Update a person
//! - DELETE /people/{id} - Remove a person and clear their assignments

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::db::{Statement, Value};
use shared::{Config, Database};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Person categories
const CATEGORIES: [&str; 6] = [
    "elder",
    "ms",
    "publisher",
    "student-brother",
    "student-sister",
    "attendant",
];

/// Create/update person request
#[derive(Debug, Deserialize)]
struct PersonRequest {
    full_name: Option<String>,
    category: Option<String>,
}

impl PersonRequest {
    /// Presence and allow-list checks shared by create and update.
    fn validated(self) -> shared::Result<(String, String)> {
        let full_name = self
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let category = self.category.filter(|category| !category.is_empty());

        let (full_name, category) = match (full_name, category) {
            (Some(name), Some(category)) => (name, category),
            _ => {
                return Err(shared::Error::Validation(
                    "full_name and category are required".to_string(),
                ))
            }
        };

        if !CATEGORIES.contains(&category.as_str()) {
            return Err(shared::Error::Validation(format!(
                "Invalid category. Must be one of: {:?}",
                CATEGORIES
            )));
        }

        Ok((full_name, category))
    }
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

    match (method, path) {
        // List people
        ("GET", "/people") => {
            let people = state
                .db
                .query(
                    "SELECT id, full_name, category, created_at FROM people ORDER BY full_name ASC",
                    Vec::new(),
                )
                .await?;
            shared::json_response(200, &people)
        }

        // Add a person
        ("POST", "/people") => {
            let request: PersonRequest = shared::parse_json_body(event.body())?;
            let (full_name, category) = request.validated()?;

            let result = state
                .db
                .execute(
                    "INSERT INTO people (full_name, category) VALUES (?, ?)",
                    vec![Value::text(&full_name), Value::text(&category)],
                )
                .await?;
            let person_id = result.last_insert_id()?;

            info!("Created person {} ({})", person_id, full_name);

            let created = state
                .db
                .query(
                    "SELECT id, full_name, category, created_at FROM people WHERE id = ?",
                    vec![Value::integer(person_id)],
                )
                .await?;
            shared::json_response(201, &created.into_iter().next())
        }

        // Person-specific routes
        _ if path.starts_with("/people/") => {
            let person_id = shared::parse_id(path.trim_start_matches("/people/"))?;

            match method {
                "PUT" => {
                    let request: PersonRequest = shared::parse_json_body(event.body())?;
                    let (full_name, category) = request.validated()?;

                    let result = state
                        .db
                        .execute(
                            "UPDATE people SET full_name = ?, category = ? WHERE id = ?",
                            vec![
                                Value::text(&full_name),
                                Value::text(&category),
                                Value::integer(person_id),
                            ],
                        )
                        .await?;
                    if result.affected_row_count == 0 {
                        return Err(shared::Error::NotFound(format!("person {}", person_id)));
                    }

                    info!("Updated person {}", person_id);

                    let updated = state
                        .db
                        .query(
                            "SELECT id, full_name, category, created_at FROM people WHERE id = ?",
                            vec![Value::integer(person_id)],
                        )
                        .await?;
                    shared::json_response(200, &updated.into_iter().next())
                }

                "DELETE" => {
                    // Clear the person out of every meeting before deleting.
                    state
                        .db
                        .execute_batch(vec![
                            Statement::new(
                                "DELETE FROM slot_assignments WHERE person_id = ?",
                                vec![Value::integer(person_id)],
                            ),
                            Statement::new(
                                "UPDATE ministry_rows SET publisher_id = NULL WHERE publisher_id = ?",
                                vec![Value::integer(person_id)],
                            ),
                            Statement::new(
                                "UPDATE ministry_rows SET householder_id = NULL WHERE householder_id = ?",
                                vec![Value::integer(person_id)],
                            ),
                            Statement::new(
                                "UPDATE living_rows SET speaker_id = NULL WHERE speaker_id = ?",
                                vec![Value::integer(person_id)],
                            ),
                            Statement::new(
                                "DELETE FROM people WHERE id = ?",
                                vec![Value::integer(person_id)],
                            ),
                        ])
                        .await?;

                    info!("Deleted person {}", person_id);

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

#[cfg(test)]
mod tests {
    use super::*;

    fn request(full_name: Option<&str>, category: Option<&str>) -> PersonRequest {
        PersonRequest {
            full_name: full_name.map(String::from),
            category: category.map(String::from),
        }
    }

    #[test]
    fn test_validated_trims_name() {
        let (full_name, category) = request(Some("  Ana Reyes "), Some("publisher"))
            .validated()
            .unwrap();
        assert_eq!(full_name, "Ana Reyes");
        assert_eq!(category, "publisher");
    }

    #[test]
    fn test_missing_or_blank_fields_rejected() {
        assert_eq!(
            request(None, Some("elder")).validated().unwrap_err().status_code(),
            400
        );
        assert_eq!(
            request(Some("   "), Some("elder")).validated().unwrap_err().status_code(),
            400
        );
        assert_eq!(
            request(Some("Ana Reyes"), None).validated().unwrap_err().status_code(),
            400
        );
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = request(Some("Ana Reyes"), Some("visitor"))
            .validated()
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_every_category_accepted() {
        for category in CATEGORIES {
            assert!(request(Some("Ana Reyes"), Some(category)).validated().is_ok());
        }
    }
}
