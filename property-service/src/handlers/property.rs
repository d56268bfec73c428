use crate::config::PaginationConfig;
use crate::cursor::{self, PaginationCursor};
use crate::dtos::{
    BalanceResponse, EventListParams, EventListResponse, EventResponse, MonthlyReportParams,
    MonthlyReportResponse, SaveEventRequest,
};
use crate::ledger::{EventQuery, LedgerError};
use crate::models::{AmountType, SortOrder};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

pub async fn save_event(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Json(payload): Json<SaveEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let occurred_at = payload.occurred_at.unwrap_or_else(Utc::now);
    let balance = state
        .ledger
        .save_event(&property_id, payload.amount, occurred_at)
        .await?;

    Ok((StatusCode::CREATED, Json(BalanceResponse { balance })))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.ledger.get_balance(&property_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

pub async fn get_property_events(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(params): Query<EventListParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let (limit, offset) = resolve_page(
        &state.pagination,
        params.limit,
        params.offset,
        params.next_token.as_deref(),
    )?;

    let query = EventQuery {
        property_id,
        date_from: params.date_from,
        date_to: params.date_to,
        sort_order: SortOrder::from_query(params.sort_order.as_deref()),
        amount_type: AmountType::from_query(params.amount_type.as_deref()),
        offset,
        limit,
    };

    let events = state.ledger.get_property_events(&query).await?;
    let next_token = cursor::next_page_token(limit, offset, events.len()).unwrap_or_default();

    Ok(Json(EventListResponse {
        events: events.into_iter().map(EventResponse::from).collect(),
        next_token,
    }))
}

pub async fn get_monthly_report(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(params): Query<MonthlyReportParams>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let (limit, offset) = resolve_page(
        &state.pagination,
        params.limit,
        params.offset,
        params.next_token.as_deref(),
    )?;

    let report = state
        .ledger
        .get_monthly_report(&property_id, params.month, params.year, offset, limit)
        .await?;
    let next_token = cursor::next_page_token(limit, offset, report.events.len());

    Ok(Json(MonthlyReportResponse::new(report, next_token)))
}

/// Resolve `(limit, offset)` for a list request. A non-empty `next_token`
/// wins over the explicit parameters; the limit is always capped.
fn resolve_page(
    pagination: &PaginationConfig,
    limit: Option<u64>,
    offset: Option<u64>,
    next_token: Option<&str>,
) -> Result<(u64, u64), AppError> {
    let (limit, offset) = match next_token.filter(|token| !token.is_empty()) {
        Some(token) => {
            let cursor = PaginationCursor::decode(token).map_err(LedgerError::from)?;
            (cursor.limit, cursor.offset)
        }
        None => (limit.unwrap_or(0), offset.unwrap_or(0)),
    };

    let limit = if limit == 0 {
        pagination.default_limit
    } else {
        limit
    };

    Ok((limit.min(pagination.max_limit), offset))
}
