use serde::{Deserialize, Serialize};
use std::fmt;

/// Song index as used by the game backend
pub type SongId = u32;

/// One difficulty tier of a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChartKind {
    Easy = 1,
    Normal = 2,
    Hard = 3,
    Master = 4,
    Special = 5,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Easy,
        ChartKind::Normal,
        ChartKind::Hard,
        ChartKind::Master,
        ChartKind::Special,
    ];

    /// Numeric id used on the wire (`diff` field)
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::Easy => "Easy",
            ChartKind::Normal => "Normal",
            ChartKind::Hard => "Hard",
            ChartKind::Master => "Master",
            ChartKind::Special => "Special",
        }
    }
}

impl TryFrom<u8> for ChartKind {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| format!("Invalid chart id: {}", id))
    }
}

impl From<ChartKind> for u8 {
    fn from(kind: ChartKind) -> u8 {
        kind.id()
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A chart awaiting evaluation, at a fixed position in the
/// difficulty-sorted input (0 = hardest)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub sequence_index: usize,
    pub song_id: SongId,
    pub chart: ChartKind,
    pub difficulty: f64,
}

impl Candidate {
    pub fn new(sequence_index: usize, song_id: SongId, chart: ChartKind, difficulty: f64) -> Self {
        Self {
            sequence_index,
            song_id,
            chart,
            difficulty,
        }
    }
}

/// Result of evaluating one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub sequence_index: usize,
    pub raw_score: u32,
    pub rating: f64,
}
