use std::net::IpAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::error::UpdateError;
use crate::types::AppState;

pub(crate) async fn handle_update_request(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    // The parameter name is matched case-insensitively.
    let candidate = params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("ip"))
        .map(|(_, value)| value.as_str());

    let Some(candidate) = candidate else {
        return (StatusCode::BAD_REQUEST, "missing 'ip' parameter".to_string()).into_response();
    };

    let ip = match candidate.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid 'ip' parameter: {}", e),
            )
                .into_response();
        }
    };

    if !state.record_type.matches(ip) {
        return (
            StatusCode::BAD_REQUEST,
            format!(
                "'{}' does not fit an {} record",
                ip,
                state.record_type.as_str()
            ),
        )
            .into_response();
    }

    info!(ip = %ip, "IP update request received");

    match apply_update(&state, ip).await {
        Ok(UpdateOutcome::Unchanged { current }) => {
            info!(ip = %current, "record already current, nothing to do");
            StatusCode::ACCEPTED.into_response()
        }
        Ok(UpdateOutcome::Updated { previous, new }) => {
            info!(previous = %previous, new = %new, "IP changed");
            (StatusCode::OK, "success".to_string()).into_response()
        }
        Err(e) => {
            warn!(error = %e, ip = %ip, "failed to update DNS record");
            // Full detail went to the log, the caller only learns that we
            // failed.
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
                .into_response()
        }
    }
}

/// Result of one invocation, before status mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpdateOutcome {
    /// Candidate equals the stored address, no write happened.
    Unchanged { current: IpAddr },
    /// Record rewritten from `previous` to `new`.
    Updated { previous: String, new: IpAddr },
}

/// The conditional-update protocol: acquire a token, read the record fresh,
/// compare, and write at most once, guarded by the version tag observed at
/// read time. A tag mismatch is surfaced, not retried.
///
/// Equality is exact-string between the stored value and the canonical text
/// of the parsed candidate.
pub(crate) async fn apply_update(
    state: &AppState,
    candidate: IpAddr,
) -> Result<UpdateOutcome, UpdateError> {
    let token = state.credentials.acquire().await?;
    let record = state.store.fetch(&token).await?;

    let candidate_text = candidate.to_string();
    if record.address == candidate_text {
        return Ok(UpdateOutcome::Unchanged { current: candidate });
    }

    state.store.update(&token, &record, &candidate_text).await?;

    Ok(UpdateOutcome::Updated {
        previous: record.address,
        new: candidate,
    })
}
