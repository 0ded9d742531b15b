use crate::clock::parse_day_key;
use crate::errors::AppError;
use crate::models::{
    CalendarMonth, CalendarQuery, DayStatusRequest, DayToggleRequest, PlayLaterRequest,
    RecordResponse, Reflection, RelapseRequest, SummaryResponse, TriggerRequest,
};
use crate::state::AppState;
use crate::storage::FileSlot;
use crate::store::QuitStore;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate};
use tracing::info;

pub async fn get_record(State(state): State<AppState>) -> Json<RecordResponse> {
    let store = state.store.lock().await;
    Json(record_response(&store))
}

pub async fn get_summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let store = state.store.lock().await;
    Json(SummaryResponse {
        streak_days: store.streak_days(),
        time_since_relapse: store.time_since_relapse(),
        first_opened_date: store.data().first_opened_date,
    })
}

pub async fn log_relapse(
    State(state): State<AppState>,
    Json(payload): Json<RelapseRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    let mut store = state.store.lock().await;
    store
        .log_relapse(non_blank(payload.lie), non_blank(payload.change))
        .await?;
    Ok(Json(record_response(&store)))
}

pub async fn delete_relapse(
    State(state): State<AppState>,
    Path(timestamp): Path<i64>,
) -> Result<Json<RecordResponse>, AppError> {
    let mut store = state.store.lock().await;
    if store.delete_relapse_entry(timestamp).await? {
        info!(timestamp, "relapse entry deleted");
    }
    Ok(Json(record_response(&store)))
}

pub async fn log_trigger(
    State(state): State<AppState>,
    Json(payload): Json<TriggerRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    let mut store = state.store.lock().await;
    store
        .log_trigger(payload.triggers, payload.action_completed)
        .await?;
    Ok(Json(record_response(&store)))
}

pub async fn delete_trigger(
    State(state): State<AppState>,
    Path(timestamp): Path<i64>,
) -> Result<Json<RecordResponse>, AppError> {
    let mut store = state.store.lock().await;
    if store.delete_trigger_entry(timestamp).await? {
        info!(timestamp, "trigger entry deleted");
    }
    Ok(Json(record_response(&store)))
}

pub async fn toggle_play_later(
    State(state): State<AppState>,
    Json(payload): Json<PlayLaterRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    if payload.video_id.trim().is_empty() {
        return Err(AppError::bad_request("videoId must not be empty"));
    }

    let mut store = state.store.lock().await;
    store.toggle_play_later(&payload.video_id).await?;
    Ok(Json(record_response(&store)))
}

pub async fn set_day_status(
    State(state): State<AppState>,
    Json(payload): Json<DayStatusRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    let date = parse_date(&payload.date)?;
    let mut store = state.store.lock().await;
    store.set_day_status(date, payload.status).await?;
    Ok(Json(record_response(&store)))
}

pub async fn toggle_day_status(
    State(state): State<AppState>,
    Json(payload): Json<DayToggleRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    let date = parse_date(&payload.date)?;
    let mut store = state.store.lock().await;
    if store.toggle_day_status(date).await?.is_none() {
        return Err(AppError::bad_request(
            "date must fall between the first opened day and today",
        ));
    }
    Ok(Json(record_response(&store)))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarMonth>, AppError> {
    let store = state.store.lock().await;
    let today = store.today();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    store
        .calendar(year, month)
        .map(Json)
        .ok_or_else(|| AppError::bad_request("month must be between 1 and 12"))
}

pub async fn get_reflections(State(state): State<AppState>) -> Json<Vec<Reflection>> {
    let store = state.store.lock().await;
    Json(store.reflections())
}

fn record_response(store: &QuitStore<FileSlot>) -> RecordResponse {
    RecordResponse {
        data: store.data().clone(),
        is_loaded: store.is_loaded(),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_day_key(raw).ok_or_else(|| AppError::bad_request("date must be formatted as YYYY-MM-DD"))
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|value| !value.trim().is_empty())
}
