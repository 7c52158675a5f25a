//! Shared library for the meeting-scheduler Lambda functions.
//!
//! This crate provides the configuration, SQL-pipeline database client,
//! schedule derivation, and HTTP helpers used across all Lambda functions.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod schedule;
pub mod secrets;

pub use config::Config;
pub use db::{init_schema, Database, Statement, StmtResult, Value};
pub use error::{Error, Result};
pub use http::{
    error_response, failure_response, json_response, parse_id, parse_json_body,
    preflight_response,
};
pub use schedule::{parse_iso_date, weekly_dates, MEETING_WEEKDAY};
pub use secrets::{get_secret, resolve_auth_token};
