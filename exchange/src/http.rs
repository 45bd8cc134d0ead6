//! HTTP surface over the exchange service.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;

use coinrate_common::{AccountId, ExchangeError, RateOverride, RateRecord, Rejection, TradeDirection};
use coinrate_ledger::{Account, BalanceUpdate};

use crate::executor::{TradeQuote, TradeResult};
use crate::service::{Caller, SharedExchangeService};

/// Header carrying the account id resolved by the session layer.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Build the router for `service`.
pub fn router(service: SharedExchangeService) -> Router {
    Router::new()
        .route("/api/rates/current", get(current_rate))
        .route("/api/admin/rates/override", post(set_rate_override))
        .route("/api/admin/rates/reset", post(reset_rate))
        .route("/api/trade/buy", post(buy))
        .route("/api/trade/sell", post(sell))
        .route("/api/trade/quote", get(quote))
        .route("/api/admin/accounts/balance", post(set_account_balance))
        .route("/api/accounts", post(register))
        .route("/api/accounts/me", get(me))
        .route("/metrics", get(metrics))
        .with_state(service)
}

/// An `ExchangeError` rendered as `{ kind, message }`.
#[derive(Debug)]
pub struct ApiError(pub ExchangeError);

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(Rejection::from(&self.0))).into_response()
    }
}

/// HTTP status for an error kind.
pub fn status_for(err: &ExchangeError) -> StatusCode {
    match err {
        ExchangeError::InvalidAmount(_)
        | ExchangeError::InvalidRequest(_)
        | ExchangeError::InvalidRate(_)
        | ExchangeError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        ExchangeError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ExchangeError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ExchangeError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        ExchangeError::DuplicateAccount(_) => StatusCode::CONFLICT,
        ExchangeError::RateUnavailable | ExchangeError::AllProvidersUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ExchangeError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyBody {
    primary_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SellBody {
    secondary_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct QuoteParams {
    direction: TradeDirection,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceBody {
    account_id: AccountId,
    #[serde(default)]
    primary_balance: Option<Decimal>,
    #[serde(default)]
    secondary_balance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
}

fn caller(service: &SharedExchangeService, headers: &HeaderMap) -> ApiResult<Caller> {
    let account_id = match headers.get(ACCOUNT_HEADER) {
        None => None,
        Some(value) => {
            let raw = value.to_str().map_err(|_| ExchangeError::Unauthenticated)?;
            Some(AccountId::parse(raw).map_err(|_| ExchangeError::Unauthenticated)?)
        }
    };
    Ok(service.caller(account_id)?)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError(ExchangeError::InvalidRequest(e.body_text())))
}

async fn current_rate(State(service): State<SharedExchangeService>) -> ApiResult<Json<RateRecord>> {
    Ok(Json(service.current_rate().await?))
}

async fn set_rate_override(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
    payload: Result<Json<RateOverride>, JsonRejection>,
) -> ApiResult<Json<RateRecord>> {
    let caller = caller(&service, &headers)?;
    let request = json_body(payload)?;
    Ok(Json(service.set_rate_override(&caller, &request)?))
}

async fn reset_rate(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
) -> ApiResult<Json<RateRecord>> {
    let caller = caller(&service, &headers)?;
    Ok(Json(service.reset_rate(&caller).await?))
}

async fn buy(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
    payload: Result<Json<BuyBody>, JsonRejection>,
) -> ApiResult<Json<TradeResult>> {
    let caller = caller(&service, &headers)?;
    let body = json_body(payload)?;
    Ok(Json(service.buy(&caller, body.primary_amount).await?))
}

async fn sell(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
    payload: Result<Json<SellBody>, JsonRejection>,
) -> ApiResult<Json<TradeResult>> {
    let caller = caller(&service, &headers)?;
    let body = json_body(payload)?;
    Ok(Json(service.sell(&caller, body.secondary_amount).await?))
}

async fn quote(
    State(service): State<SharedExchangeService>,
    params: Result<Query<QuoteParams>, QueryRejection>,
) -> ApiResult<Json<TradeQuote>> {
    let Query(params) =
        params.map_err(|e| ApiError(ExchangeError::InvalidRequest(e.body_text())))?;
    Ok(Json(service.quote(params.direction, params.amount).await?))
}

async fn set_account_balance(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
    payload: Result<Json<BalanceBody>, JsonRejection>,
) -> ApiResult<Json<Account>> {
    let caller = caller(&service, &headers)?;
    let body = json_body(payload)?;
    let update = BalanceUpdate {
        primary: body.primary_balance,
        secondary: body.secondary_balance,
    };
    Ok(Json(service.set_account_balance(&caller, body.account_id, &update)?))
}

async fn register(
    State(service): State<SharedExchangeService>,
    payload: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let body = json_body(payload)?;
    let account = service.register(&body.username)?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn me(
    State(service): State<SharedExchangeService>,
    headers: HeaderMap,
) -> ApiResult<Json<Account>> {
    let caller = caller(&service, &headers)?;
    Ok(Json(service.account(&caller)?))
}

async fn metrics(State(service): State<SharedExchangeService>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render_metrics(),
    )
}
