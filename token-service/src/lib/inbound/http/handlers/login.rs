use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::TokenPairResponseData;
use crate::domain::credentials::models::LoginCommand;
use crate::inbound::http::client_ip::ClientAddress;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    ClientAddress(client_ip): ClientAddress,
    Json(body): Json<LoginRequest>,
) -> Result<ApiSuccess<TokenPairResponseData>, ApiError> {
    let command = LoginCommand {
        email: body.email,
        password: body.password,
        client_ip,
    };

    state
        .auth_service
        .login(command)
        .await
        .map_err(ApiError::from)
        .map(|pair| ApiSuccess::new(StatusCode::OK, pair.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}
