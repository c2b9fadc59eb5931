//! HTTP query interface.
//!
//! `GET /` reports the cache size and usage, `GET /check?validate=<value>`
//! classifies a domain or the domain part of an email address.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domains::DomainCache;
use crate::stats::Stats;

const USAGE: &str = "Usage: /check?validate=test.com or /check?validate=hello@world.com";
const MISSING_PARAM: &str = "Please provide a 'validate' parameter with a domain or an email. \
    Example: /check?validate=test.com or /check?validate=max@test.tld";
const INVALID_DOMAIN: &str = "The domain entered is invalid. Please check it for a valid structure.";

/// Labels of 1-63 alphanumerics or inner hyphens, then an alphabetic TLD.
static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,6}$")
        .expect("domain pattern is valid")
});

struct AppState {
    cache: Arc<DomainCache>,
    stats: Arc<Stats>,
}

/// Builds the router. The cache is shared with the refresh scheduler.
pub fn router(cache: Arc<DomainCache>, stats: Arc<Stats>) -> Router {
    let state = Arc::new(AppState { cache, stats });

    Router::new()
        .route("/", get(info))
        .route("/check", get(check))
        .with_state(state)
}

/// Whether the input named a bare domain or an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provided {
    Domain,
    Email,
}

/// Lowercases `value` and extracts the domain to check.
///
/// For emails the domain is everything after the last `@`.
pub fn split_candidate(value: &str) -> (Provided, String) {
    let value = value.trim().to_lowercase();
    match value.rsplit_once('@') {
        Some((_, domain)) => (Provided::Email, domain.to_string()),
        None => (Provided::Domain, value),
    }
}

/// Checks domain syntax. Expects already lowercased input.
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_PATTERN.is_match(domain)
}

#[derive(Serialize)]
struct InfoResponse {
    domains: usize,
    info: &'static str,
    stats: crate::stats::StatsSnapshot,
}

async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(InfoResponse {
        domains: state.cache.size(),
        info: USAGE,
        stats: state.stats.snapshot(),
    })
}

#[derive(Deserialize)]
struct CheckParams {
    validate: Option<String>,
}

#[derive(Serialize)]
struct CheckResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    provided: Option<Provided>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    processing_ms: f64,
}

async fn check(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CheckParams>, QueryRejection>,
) -> Response {
    let start = Instant::now();

    // A query that does not deserialize (e.g. a repeated `validate`) is
    // treated as missing.
    let value = params.ok().and_then(|Query(p)| p.validate);
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        state.stats.record_invalid(start.elapsed());
        return rejected(None, None, MISSING_PARAM, start);
    };

    let (provided, domain) = split_candidate(&value);
    if !is_valid_domain(&domain) {
        state.stats.record_invalid(start.elapsed());
        return rejected(Some(provided), Some(domain), INVALID_DOMAIN, start);
    }

    let suspicious = state.cache.lookup(&domain);
    if suspicious {
        state.stats.record_suspicious(start.elapsed());
    } else {
        state.stats.record_unsuspicious(start.elapsed());
    }

    tracing::debug!(domain = %domain, suspicious, "Checked domain");

    Json(CheckResponse {
        provided: Some(provided),
        domain: Some(domain),
        status: Some(if suspicious { "suspicious" } else { "unsuspicious" }),
        error: None,
        processing_ms: elapsed_ms(start),
    })
    .into_response()
}

fn rejected(
    provided: Option<Provided>,
    domain: Option<String>,
    error: &'static str,
    start: Instant,
) -> Response {
    let body = CheckResponse {
        provided,
        domain,
        status: None,
        error: Some(error),
        processing_ms: elapsed_ms(start),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
