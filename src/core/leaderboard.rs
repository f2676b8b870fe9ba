use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ChartKind, SongId};

/// Which leaderboard to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    #[default]
    AllTime,
    Monthly,
}

/// The caller's own standing on one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub song_id: SongId,
    pub chart_id: u8,
    pub score: u32,
    pub rank: u32,
}

/// One row of a public leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub score: u32,
    pub nickname: String,
    /// Avatar id
    pub head: i64,
}

/// Account info behind a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub created_at: Option<DateTime<Utc>>,
    pub nickname: String,
    pub head: i64,
}

/// Per-chart record of one song, used for score cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub chart: ChartKind,
    pub difficulty: f64,
    pub record: PlayerRecord,
}
