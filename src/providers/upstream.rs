use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::config::{EngineConfig, UpstreamConfig};
use crate::core::{
    Board, ChartKind, LeaderboardEntry, PlayerRecord, SessionToken, SongId, UserProfile,
};
use crate::error::{EngineError, Result};
use crate::providers::ScoreSource;

/// Client for the game's Parse backend.
///
/// All calls are POSTs; reads are tunnelled with `_method: GET`.
pub struct LeaderboardClient {
    client: Client,
    upstream: UpstreamConfig,
    retry_count: u32,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    result: Value,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "expiresAt")]
    expires_at: Option<ParseDate>,
    user: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ParseDate {
    iso: String,
}

#[derive(Debug, Deserialize)]
struct PointerFields {
    #[serde(rename = "className")]
    class_name: String,
    #[serde(rename = "objectId")]
    object_id: String,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    #[serde(default)]
    username: String,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    head: Value,
}

impl LeaderboardClient {
    /// Create new client from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeouts.connect())
            .timeout(config.timeouts.read())
            .build()
            .map_err(EngineError::HttpRequest)?;

        Ok(Self {
            client,
            upstream: config.upstream.clone(),
            retry_count: config.retry_count.max(1),
        })
    }

    /// POST a JSON body, retrying timeouts, and return the decoded JSON
    async fn post(&self, path: &str, token: &SessionToken, body: &Value) -> Result<Value> {
        let url = self.upstream.url(path);
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            let sent = self
                .client
                .post(&url)
                .header("X-Parse-Application-Id", &self.upstream.app_id)
                .header("X-Parse-Session-Token", token.as_str())
                .json(body)
                .send()
                .await;

            match sent {
                Ok(response) => break response,
                Err(e) if e.is_timeout() && attempt < self.retry_count => {
                    tracing::warn!(
                        "⚠️ {} timed out (attempt {}/{})",
                        path,
                        attempt,
                        self.retry_count
                    );
                }
                Err(e) => return Err(e.into()),
            }
        };

        if response.status() != StatusCode::OK {
            return Err(EngineError::BadUpstreamResponse(format!(
                "Response code is {} instead of 200",
                response.status().as_u16()
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::BadUpstreamResponse(format!("Body is not valid JSON: {}", e)))
    }

    async fn get(&self, path: &str, token: &SessionToken) -> Result<Value> {
        self.post(path, token, &json!({ "_method": "GET", "_noBody": true }))
            .await
    }

    /// Call a leaderboard cloud function and return its string `result`
    async fn leaderboard_function(
        &self,
        function: &str,
        token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
    ) -> Result<String> {
        let body = json!({ "diff": chart.id(), "score": 0, "songId": song_id });
        let value = self
            .post(&format!("parse/functions/{}", function), token, &body)
            .await?;
        let response: FunctionResponse = serde_json::from_value(value).map_err(|_| {
            EngineError::BadUpstreamResponse("The JSON has no `result` field".to_string())
        })?;

        match response.result {
            Value::String(result) => Ok(result),
            other => Err(EngineError::BadUpstreamResponse(format!(
                "The `result` field of the JSON is not a string but {}",
                json_kind(&other)
            ))),
        }
    }

    /// The player's own score and rank on a chart
    pub async fn my_record(
        &self,
        token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
        board: Board,
    ) -> Result<PlayerRecord> {
        let function = match board {
            Board::AllTime => "AskMyLeaderBoard",
            Board::Monthly => "AskMyMonthLeaderBoard",
        };
        let result = self.leaderboard_function(function, token, song_id, chart).await?;
        Ok(parse_my_record(&result))
    }

    /// Public leaderboard of a chart
    pub async fn leaderboard(
        &self,
        token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
        board: Board,
    ) -> Result<Vec<LeaderboardEntry>> {
        let function = match board {
            Board::AllTime => "AskLeaderBoardNew",
            Board::Monthly => "AskMonthLeaderBoardNew",
        };
        let result = self.leaderboard_function(function, token, song_id, chart).await?;
        parse_leaderboard(&result)
    }

    async fn session(&self, token: &SessionToken) -> Result<SessionResponse> {
        let value = self.get("parse/sessions/me", token).await?;
        serde_json::from_value(value).map_err(|e| {
            EngineError::BadUpstreamResponse(format!("Unexpected session shape: {}", e))
        })
    }

    /// When the session token stops working
    pub async fn session_expiration(&self, token: &SessionToken) -> Result<DateTime<Utc>> {
        let session = self.session(token).await?;
        let iso = session.expires_at.map(|d| d.iso).ok_or_else(|| {
            let detail = "The JSON does not have `expiresAt.iso` field";
            EngineError::BadUpstreamResponse(detail.to_string())
        })?;
        parse_iso(&iso)
    }

    /// Account behind the session token
    pub async fn user(&self, token: &SessionToken) -> Result<UserProfile> {
        let session = self.session(token).await?;
        let pointer = match session.user {
            Some(user @ Value::Object(_)) => {
                serde_json::from_value::<PointerFields>(user).map_err(|e| {
                    let detail = format!("The `user` field is not a pointer: {}", e);
                    EngineError::BadUpstreamResponse(detail)
                })?
            }
            other => {
                return Err(EngineError::BadUpstreamResponse(format!(
                    "The `user` field of the JSON is not an object but {}",
                    other.as_ref().map_or("missing", json_kind)
                )))
            }
        };

        let path = format!("parse/classes/{}/{}", pointer.class_name, pointer.object_id);
        let value = self.get(&path, token).await?;
        let user: UserObject = serde_json::from_value(value).map_err(|e| {
            EngineError::BadUpstreamResponse(format!("Unexpected user shape: {}", e))
        })?;

        Ok(UserProfile {
            username: user.username,
            created_at: user.created_at.as_deref().map(parse_iso).transpose()?,
            nickname: user.nickname,
            head: lenient_int(&user.head),
        })
    }
}

#[async_trait]
impl ScoreSource for LeaderboardClient {
    async fn fetch_score(
        &self,
        token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
    ) -> Result<u32> {
        let record = self.my_record(token, song_id, chart, Board::AllTime).await?;
        Ok(record.score)
    }

    fn name(&self) -> &str {
        "lyrica"
    }
}

/// `0,<score>,<rank>,<diff>,<song>[,...]`; missing or non-numeric fields read as 0
pub fn parse_my_record(result: &str) -> PlayerRecord {
    let mut fields = result.split(',').skip(1);
    PlayerRecord {
        score: leading_int(fields.next()),
        rank: leading_int(fields.next()),
        chart_id: leading_int(fields.next()),
        song_id: leading_int(fields.next()),
    }
}

/// `<head>$<scores>$<nicknames>$<heads>$<x>$<y>` with `'`-separated columns;
/// column count and column lengths must match, numbers read like records
pub fn parse_leaderboard(result: &str) -> Result<Vec<LeaderboardEntry>> {
    let columns: Vec<&str> = result.split('$').skip(1).collect();
    if columns.len() != 5 {
        return Err(EngineError::BadUpstreamResponse(format!(
            "The leaderboard has {} instead of 5 columns",
            columns.len()
        )));
    }

    let split = |column: &str| -> Vec<String> {
        if column.is_empty() {
            Vec::new()
        } else {
            column.split('\'').map(str::to_string).collect()
        }
    };
    let scores = split(columns[0]);
    let nicknames = split(columns[1]);
    let heads = split(columns[2]);

    if scores.len() != nicknames.len() || nicknames.len() != heads.len() {
        return Err(EngineError::BadUpstreamResponse(format!(
            "The leaderboard format is wrong because there are {} scores, {} nicknames, and {} heads",
            scores.len(),
            nicknames.len(),
            heads.len()
        )));
    }

    Ok(scores
        .iter()
        .zip(nicknames)
        .zip(heads.iter())
        .enumerate()
        .map(|(i, ((score, nickname), head))| LeaderboardEntry {
            rank: i as u32 + 1,
            score: leading_int(Some(score.as_str())),
            nickname,
            head: leading_int(Some(head.as_str())),
        })
        .collect())
}

/// Integer prefix of a field (`"12x"` → 12), 0 when there is none
fn leading_int<T: FromStr + Default>(field: Option<&str>) -> T {
    let field = field.unwrap_or("").trim();
    let unsigned = field.strip_prefix('-').unwrap_or(field);
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    field[..field.len() - unsigned.len() + digits]
        .parse()
        .unwrap_or_default()
}

fn parse_iso(iso: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| EngineError::BadUpstreamResponse(format!("Bad date format: {}", iso)))
}

fn lenient_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_my_record() {
        let record = parse_my_record("0,995000,12,4,107,extra");
        assert_eq!(record.score, 995_000);
        assert_eq!(record.rank, 12);
        assert_eq!(record.chart_id, 4);
        assert_eq!(record.song_id, 107);
    }

    #[test]
    fn test_short_record_reads_as_zero() {
        let record = parse_my_record("0,995000");
        assert_eq!(record.score, 995_000);
        assert_eq!(record.rank, 0);
        assert_eq!(record.song_id, 0);

        let empty = parse_my_record("");
        assert_eq!(empty.score, 0);
    }

    #[test]
    fn test_non_numeric_fields_read_as_zero() {
        let record = parse_my_record("0,lots,7th,4,107");
        assert_eq!(record.score, 0);
        assert_eq!(record.rank, 7);
        assert_eq!(record.song_id, 107);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int::<i64>(Some(" -3 ")), -3);
        assert_eq!(leading_int::<u32>(Some("-3")), 0);
        assert_eq!(leading_int::<u32>(Some("12abc")), 12);
        assert_eq!(leading_int::<u32>(None), 0);
    }

    #[test]
    fn test_parse_leaderboard_lenient_heads() {
        let board = parse_leaderboard("x$990000'oops$bob'eve$?'4$a$b").unwrap();
        assert_eq!(board[0].head, 0);
        assert_eq!(board[1].score, 0);
        assert_eq!(board[1].head, 4);
    }

    #[test]
    fn test_parse_leaderboard() {
        let board = parse_leaderboard("x$1000000'990000$alice'bob$3'17$a$b").unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].score, 1_000_000);
        assert_eq!(board[0].nickname, "alice");
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].head, 17);
    }

    #[test]
    fn test_parse_empty_leaderboard() {
        let board = parse_leaderboard("x$$$$$").unwrap();
        assert!(board.is_empty());
    }

    #[test]
    fn test_parse_leaderboard_wrong_columns() {
        let err = parse_leaderboard("x$1$a$3").unwrap_err();
        assert!(err.to_string().contains("3 instead of 5 columns"));
    }

    #[test]
    fn test_parse_leaderboard_ragged() {
        let err = parse_leaderboard("x$1'2$a$3$$").unwrap_err();
        assert!(err.to_string().contains("2 scores, 1 nicknames, and 1 heads"));
    }

    #[test]
    fn test_lenient_int() {
        assert_eq!(lenient_int(&json!(7)), 7);
        assert_eq!(lenient_int(&json!("12")), 12);
        assert_eq!(lenient_int(&json!(null)), 0);
    }
}
