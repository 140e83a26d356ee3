use crate::error::AppError;
use crate::models::leaderboard::SubmissionPayload;
use crate::services::daily_theme;

pub const CORRECT_GLYPH: char = '🟩';
pub const MISTAKE_GLYPH: char = '🟥';

const MAX_DISPLAY_NAME_LEN: usize = 20;
// Game ends once all five lives are spent.
const MAX_MISTAKES: i64 = 5;

/// Validate an untrusted submission against `today` (server UTC date).
/// Checks run in order and short-circuit on the first failure; on success
/// the validated mistake count is returned for scoring. Client-declared
/// derived values are never trusted: the grid must imply the counts, and
/// the claimed theme must match the re-derived one.
pub fn validate_submission(payload: &SubmissionPayload, today: &str) -> Result<i64, AppError> {
    if payload.date.is_empty()
        || payload.device_id.is_empty()
        || payload.correct_count.is_none()
        || payload.total_attempts.is_none()
        || payload.emoji_grid.is_empty()
    {
        return Err(AppError::BadRequest("Missing required fields".into()));
    }

    // Hard equality, not a window: a client clock straddling midnight gets
    // rejected here and is tolerated only by the 25-hour dedup marker TTL.
    if payload.date != today {
        return Err(AppError::BadRequest("Invalid date - must be today".into()));
    }

    let correct_count = payload.correct_count.unwrap_or(0);
    let total_attempts = payload.total_attempts.unwrap_or(0);

    if correct_count < 0 {
        return Err(AppError::BadRequest("Invalid correctCount".into()));
    }

    let green_count = count_glyph(&payload.emoji_grid, CORRECT_GLYPH);
    let red_count = count_glyph(&payload.emoji_grid, MISTAKE_GLYPH);

    let grid_consistent = red_count <= MAX_MISTAKES
        && total_attempts == correct_count + red_count
        && green_count + red_count == total_attempts
        && green_count == correct_count;
    if !grid_consistent {
        return Err(AppError::BadRequest("Invalid emoji grid or counts".into()));
    }

    if let Some(theme) = payload.theme.as_deref() {
        let expected = daily_theme::theme_for_date(&payload.date).display_name();
        if !theme.is_empty() && theme != expected {
            return Err(AppError::BadRequest("Invalid theme".into()));
        }
    }

    Ok(red_count)
}

fn count_glyph(grid: &str, glyph: char) -> i64 {
    grid.chars().filter(|&c| c == glyph).count() as i64
}

/// Trim, cap at 20 characters, strip angle brackets; empty names fall back
/// to "Anonymous".
pub fn sanitize_display_name(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or("")
        .trim()
        .chars()
        .take(MAX_DISPLAY_NAME_LEN)
        .filter(|&c| c != '<' && c != '>')
        .collect();
    if cleaned.is_empty() {
        "Anonymous".to_string()
    } else {
        cleaned
    }
}

pub fn is_valid_date_format(date: &str) -> bool {
    let b = date.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && [0, 1, 2, 3, 5, 6, 8, 9]
            .iter()
            .all(|&i| b[i].is_ascii_digit())
}
