use crate::config::AppConfig;
use crate::db::Db;
use crate::error::AppError;
use crate::models::leaderboard::{LeaderboardQuery, SubmissionPayload};
use crate::services::leaderboard as service;
use chrono::Utc;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;

pub async fn submit_result(
    db: web::types::State<Arc<Db>>,
    body: web::types::Json<SubmissionPayload>,
) -> Result<HttpResponse, AppError> {
    let result = service::submit(&**db, body.into_inner())?;
    Ok(HttpResponse::Ok().json(&result))
}

pub async fn fetch_leaderboard(
    db: web::types::State<Arc<Db>>,
    cfg: web::types::State<AppConfig>,
    path: web::types::Path<String>,
    query: web::types::Query<LeaderboardQuery>,
) -> Result<HttpResponse, AppError> {
    let date = path.into_inner();
    // Bots only ever seed the live board, never a queried past day.
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let populate_bots = cfg.bots_enabled && date == today;

    let result = service::fetch(
        &**db,
        &date,
        query.device_id.as_deref(),
        query.limit,
        populate_bots,
    )?;
    Ok(HttpResponse::Ok().json(&result))
}
