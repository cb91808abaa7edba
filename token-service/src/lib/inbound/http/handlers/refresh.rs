use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::TokenPairResponseData;
use crate::domain::credentials::models::RefreshCommand;
use crate::inbound::http::client_ip::ClientAddress;
use crate::inbound::http::router::AppState;

pub async fn refresh(
    State(state): State<AppState>,
    ClientAddress(client_ip): ClientAddress,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiSuccess<TokenPairResponseData>, ApiError> {
    if body.access_token.is_empty() || body.refresh_token.is_empty() {
        return Err(ApiError::BadRequest(
            "access_token and refresh_token are required".to_string(),
        ));
    }

    let command = RefreshCommand {
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        client_ip,
    };

    state
        .auth_service
        .refresh_tokens(command)
        .await
        .map_err(ApiError::from)
        .map(|pair| ApiSuccess::new(StatusCode::OK, pair.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}
