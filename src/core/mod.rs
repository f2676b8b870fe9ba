pub mod chart;
pub mod entry;
pub mod leaderboard;
pub mod session;

pub use chart::{Candidate, ChartKind, Observation, SongId};
pub use entry::{BestEntry, PlayerRating};
pub use leaderboard::{Board, ChartRecord, LeaderboardEntry, PlayerRecord, UserProfile};
pub use session::SessionToken;
