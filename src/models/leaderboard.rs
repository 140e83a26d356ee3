use serde::{Deserialize, Serialize};

/// Caller-supplied submission. Everything here is untrusted; fields are
/// optional at the serde layer so absence surfaces as a validation reason
/// rather than a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub correct_count: Option<i64>,
    #[serde(default)]
    pub total_attempts: Option<i64>,
    #[serde(default)]
    pub emoji_grid: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub theme: Option<String>,
}

/// Entry as persisted in the day's ranked set, serialized to a JSON string
/// member. Written exactly once per (date, deviceId), never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub display_name: String,
    pub correct_count: i64,
    pub total_attempts: i64,
    pub emoji_grid: String,
    pub device_id: String,
    pub timestamp: i64,
}

impl StoredEntry {
    pub fn mistake_count(&self) -> i64 {
        self.total_attempts - self.correct_count
    }

    pub fn score(&self) -> i64 {
        self.correct_count * 100 - self.mistake_count()
    }
}

/// Entry as served to clients: deviceId stripped, rank attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEntry {
    pub display_name: String,
    pub correct_count: i64,
    pub total_attempts: i64,
    pub emoji_grid: String,
    pub rank: i64,
}

impl PublicEntry {
    pub fn from_stored(entry: &StoredEntry, rank: i64) -> Self {
        PublicEntry {
            display_name: entry.display_name.clone(),
            correct_count: entry.correct_count,
            total_attempts: entry.total_attempts,
            emoji_grid: entry.emoji_grid.clone(),
            rank,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub rank: Option<i64>,
    pub total_players: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub date: String,
    pub leaderboard: Vec<PublicEntry>,
    pub total_players: i64,
    pub player_rank: Option<i64>,
    pub player_entry: Option<PublicEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub device_id: Option<String>,
    pub limit: Option<i64>,
}
