//! Schedule endpoints.

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::schedule::{Course, ScheduleMatrix, SynthesizedSchedule, localize};
use crate::state::AppState;
use crate::web::error::ApiError;

const DEFAULT_SCHEDULE_TYPE: &str = "Daily Schedule";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    username: Option<String>,
    password: Option<String>,
    schedule_type: Option<String>,
    frn: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodResponse {
    pub period: u8,
    pub course: Option<Course>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub day: String,
    pub schedule_type: String,
    pub periods: Vec<PeriodResponse>,
}

impl ScheduleResponse {
    fn on_date(schedule: SynthesizedSchedule, date: NaiveDate, tz: Tz) -> Self {
        Self {
            day: schedule.day,
            schedule_type: schedule.schedule_type,
            periods: schedule
                .periods
                .into_iter()
                .map(|p| PeriodResponse {
                    period: p.period,
                    start_time: localize(date, p.start, tz),
                    end_time: localize(date, p.end, tz),
                    course: p.course,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SchedulesResponse<T> {
    pub schedules: Vec<T>,
}

fn credentials(state: &AppState, query: &ScheduleQuery) -> Result<(String, String), ApiError> {
    state
        .credentials_or_default(query.username.clone(), query.password.clone())
        .ok_or_else(ApiError::credentials_required)
}

/// `GET /schedule/current`
pub(super) async fn current(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let (username, password) = credentials(&state, &query)?;
    let pipeline = &state.pipeline;

    let schedule = pipeline
        .current_schedule(&username, &password)
        .await
        .map_err(|e| ApiError::from_portal(e, "retrieve schedule"))?
        .ok_or_else(ApiError::schedule_unknown)?;

    Ok(Json(ScheduleResponse::on_date(
        schedule,
        pipeline.today(),
        pipeline.timezone(),
    )))
}

/// `GET /schedule/all?scheduleType=`
pub(super) async fn all(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<SchedulesResponse<ScheduleResponse>>, ApiError> {
    let (username, password) = credentials(&state, &query)?;
    let variant = query
        .schedule_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SCHEDULE_TYPE);
    let pipeline = &state.pipeline;

    let schedules = pipeline
        .all_schedules(&username, &password, variant)
        .await
        .map_err(|e| ApiError::from_portal(e, "retrieve schedule"))?;

    let (today, tz) = (pipeline.today(), pipeline.timezone());
    Ok(Json(SchedulesResponse {
        schedules: schedules
            .into_iter()
            .map(|s| ScheduleResponse::on_date(s, today, tz))
            .collect(),
    }))
}

/// `GET /schedule/matrix?frn=`
pub(super) async fn matrix(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<SchedulesResponse<ScheduleMatrix>>, ApiError> {
    let (username, password) = credentials(&state, &query)?;
    let schedules = state
        .pipeline
        .raw_matrix(&username, &password, query.frn.as_deref())
        .await
        .map_err(|e| ApiError::from_portal(e, "retrieve schedule"))?;
    Ok(Json(SchedulesResponse { schedules }))
}
