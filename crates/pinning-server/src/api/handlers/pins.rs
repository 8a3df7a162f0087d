//! Pin Issuance Handler
//!
//! Translates `GET /v1/pins` into one `IssuanceService::issue` call and the
//! result into either the signed envelope or a classified error body.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::AppState;
use crate::api::error::{ApiError, INVALID_DOMAIN, METHOD_NOT_ALLOWED};
use crate::service::IssueOptions;

/// Query parameters for `/v1/pins`
#[derive(Debug, Default, Deserialize)]
pub struct PinsQuery {
    /// Host to issue pins for
    pub domain: Option<String>,

    /// Only the literal `true` enables backup pins
    #[serde(rename = "include-backup-pins")]
    pub include_backup_pins: Option<String>,
}

impl PinsQuery {
    fn options(&self) -> IssueOptions {
        IssueOptions {
            include_backup_pins: self.include_backup_pins.as_deref() == Some("true"),
        }
    }
}

/// Issue a signed pin set
///
/// GET /v1/pins?domain=<fqdn>[&include-backup-pins=true]
///
/// A query string that does not deserialize (a repeated `domain`, say) is an
/// invalid domain parameter.
pub async fn get_pins(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    query: Result<Query<PinsQuery>, QueryRejection>,
) -> Response {
    let started = Instant::now();
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let api_error = ApiError::BadRequest(INVALID_DOMAIN);
            info!(
                method = %method,
                path = uri.path(),
                status = api_error.status().as_u16(),
                error = "invalid_domain",
                rejection = %rejection.body_text(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
            return api_error.into_response();
        }
    };
    let options = query.options();
    let domain = query.domain.as_deref().unwrap_or_default();

    match state.service.issue(domain, options).await {
        Ok(envelope) => {
            info!(
                method = %method,
                path = uri.path(),
                domain = %domain,
                status = StatusCode::OK.as_u16(),
                include_backup = options.include_backup_pins,
                duration_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Err(err) => {
            let api_error = ApiError::from(&err);
            info!(
                method = %method,
                path = uri.path(),
                domain = %domain,
                status = api_error.status().as_u16(),
                error = err.tag(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
            api_error.into_response()
        }
    }
}

/// Any method other than GET on `/v1/pins`
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    warn!(method = %method, path = uri.path(), "Method not allowed");
    ApiError::MethodNotAllowed(METHOD_NOT_ALLOWED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(domain: Option<&str>, backup: Option<&str>) -> PinsQuery {
        PinsQuery {
            domain: domain.map(String::from),
            include_backup_pins: backup.map(String::from),
        }
    }

    #[test]
    fn test_only_literal_true_enables_backup() {
        assert!(query(None, Some("true")).options().include_backup_pins);

        for value in [None, Some("false"), Some("TRUE"), Some("1"), Some("yes"), Some("")] {
            assert!(!query(None, value).options().include_backup_pins, "{:?}", value);
        }
    }
}
