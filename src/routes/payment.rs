use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payment::{PaymentReceipt, PaymentRequest},
    error::AppResult,
    middleware::{auth::AuthUser, extract::AppJson},
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(process_payment))
}

#[utoipa::path(
    post,
    path = "/api/payment",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment accepted", body = ApiResponse<PaymentReceipt>),
        (status = 400, description = "Invalid details or payment declined"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentReceipt>>> {
    let resp = payment_service::process_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}
