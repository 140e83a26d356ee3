use crate::db::RankedStore;
use crate::error::AppError;
use crate::models::leaderboard::*;
use crate::services::bots;
use crate::validation;
use chrono::{DateTime, Duration, Utc};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;
const SUBMISSION_TTL_HOURS: i64 = 25;
const LEADERBOARD_TTL_DAYS: i64 = 7;

pub fn leaderboard_key(date: &str) -> String {
    format!("leaderboard:{}", date)
}

pub fn submission_key(date: &str, device_id: &str) -> String {
    format!("submission:{}:{}", date, device_id)
}

pub fn has_submitted(
    store: &dyn RankedStore,
    date: &str,
    device_id: &str,
) -> Result<bool, AppError> {
    store.exists(&submission_key(date, device_id))
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Accepted,
    Duplicate,
}

/// Commit point of a submission: the atomic set-if-absent on the per-device
/// marker is the sole authority on duplicates. Only a winning write inserts
/// into the day's ranked set and re-asserts the board's 7-day expiry.
pub fn record_submission(
    store: &dyn RankedStore,
    date: &str,
    device_id: &str,
    member: &str,
    score: i64,
) -> Result<RecordOutcome, AppError> {
    let marker_set = store.set_nx(
        &submission_key(date, device_id),
        "1",
        Duration::hours(SUBMISSION_TTL_HOURS),
    )?;
    if !marker_set {
        return Ok(RecordOutcome::Duplicate);
    }

    let key = leaderboard_key(date);
    store.zadd(&key, member, score)?;
    store.expire(&key, Duration::days(LEADERBOARD_TTL_DAYS))?;
    Ok(RecordOutcome::Accepted)
}

/// Top of the day's board as (entry, 1-based rank), capped at 100 rows.
pub fn top_entries(
    store: &dyn RankedStore,
    date: &str,
    limit: i64,
) -> Result<Vec<(StoredEntry, i64)>, AppError> {
    let limit = limit.clamp(1, MAX_LIMIT);
    let members = store.zrevrange(&leaderboard_key(date), 0, limit - 1)?;
    let mut entries = Vec::with_capacity(members.len());
    for (i, member) in members.iter().enumerate() {
        let entry: StoredEntry = serde_json::from_str(member)?;
        entries.push((entry, i as i64 + 1));
    }
    Ok(entries)
}

/// Locate a device's entry. Members are keyed by serialized content, not by
/// device, so this scans the full ordered set; per-day cardinality is small
/// enough that the linear pass is acceptable.
pub fn rank_of(
    store: &dyn RankedStore,
    date: &str,
    device_id: &str,
) -> Result<Option<(i64, StoredEntry)>, AppError> {
    let members = store.zrevrange(&leaderboard_key(date), 0, -1)?;
    for (i, member) in members.iter().enumerate() {
        let entry: StoredEntry = serde_json::from_str(member)?;
        if entry.device_id == device_id {
            return Ok(Some((i as i64 + 1, entry)));
        }
    }
    Ok(None)
}

pub fn count(store: &dyn RankedStore, date: &str) -> Result<i64, AppError> {
    store.zcard(&leaderboard_key(date))
}

pub fn submit(store: &dyn RankedStore, req: SubmissionPayload) -> Result<SubmitResponse, AppError> {
    submit_at(store, req, Utc::now())
}

pub fn submit_at(
    store: &dyn RankedStore,
    req: SubmissionPayload,
    now: DateTime<Utc>,
) -> Result<SubmitResponse, AppError> {
    let today = now.format("%Y-%m-%d").to_string();
    let mistake_count = validation::validate_submission(&req, &today)?;

    // Cheap pre-check so obvious duplicates return without touching the
    // ranked set. Correctness does not depend on it; the marker write in
    // record_submission is the real gate.
    if has_submitted(store, &req.date, &req.device_id)? {
        return Err(AppError::Conflict("Already submitted today".into()));
    }

    let entry = StoredEntry {
        display_name: validation::sanitize_display_name(req.display_name.as_deref()),
        // Presence established by the validator.
        correct_count: req.correct_count.unwrap_or(0),
        total_attempts: req.total_attempts.unwrap_or(0),
        emoji_grid: req.emoji_grid.clone(),
        device_id: req.device_id.clone(),
        timestamp: now.timestamp_millis(),
    };
    let member = serde_json::to_string(&entry)?;
    let score = entry.correct_count * 100 - mistake_count;

    match record_submission(store, &req.date, &req.device_id, &member, score)? {
        RecordOutcome::Duplicate => Err(AppError::Conflict("Already submitted today".into())),
        RecordOutcome::Accepted => {
            let key = leaderboard_key(&req.date);
            let rank = store.zrevrank(&key, &member)?.map(|r| r + 1);
            let total_players = store.zcard(&key)?;
            Ok(SubmitResponse {
                success: true,
                rank,
                total_players,
            })
        }
    }
}

pub fn fetch(
    store: &dyn RankedStore,
    date: &str,
    device_id: Option<&str>,
    limit: Option<i64>,
    populate_bots: bool,
) -> Result<LeaderboardResponse, AppError> {
    if !validation::is_valid_date_format(date) {
        return Err(AppError::BadRequest(
            "Invalid date format. Use YYYY-MM-DD".into(),
        ));
    }

    if populate_bots {
        bots::ensure_bots(store, date)?;
    }

    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let leaderboard: Vec<PublicEntry> = top_entries(store, date, limit)?
        .iter()
        .map(|(entry, rank)| PublicEntry::from_stored(entry, *rank))
        .collect();
    let total_players = count(store, date)?;

    let (player_rank, player_entry) = match device_id {
        Some(id) if !id.is_empty() => match rank_of(store, date, id)? {
            Some((rank, entry)) => (Some(rank), Some(PublicEntry::from_stored(&entry, rank))),
            None => (None, None),
        },
        _ => (None, None),
    };

    Ok(LeaderboardResponse {
        date: date.to_string(),
        leaderboard,
        total_players,
        player_rank,
        player_entry,
    })
}
