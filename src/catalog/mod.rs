pub mod sheet;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::core::{Candidate, ChartKind, SongId};
use crate::error::{EngineError, Result};

pub use sheet::parse_song_sheet;

/// Charts at or above this difficulty are joke charts and never count
pub const MAX_COUNTED_DIFFICULTY: f64 = 15.0;

/// Release era of a song relative to the latest major update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    /// Released before the latest major version
    Old,
    /// Released in the latest major version
    New,
}

/// Static data of one song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    song_id: SongId,
    name: String,
    update_version: String,
    charts: BTreeMap<ChartKind, f64>,
}

impl Song {
    pub fn new(
        song_id: SongId,
        name: impl Into<String>,
        update_version: impl Into<String>,
        charts: BTreeMap<ChartKind, f64>,
    ) -> Self {
        Self {
            song_id,
            name: name.into(),
            update_version: update_version.into(),
            charts,
        }
    }

    pub fn song_id(&self) -> SongId {
        self.song_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_version(&self) -> &str {
        &self.update_version
    }

    /// Major version the song was added in (`"4.2.0"` → 4)
    pub fn major(&self) -> u32 {
        self.update_version
            .split('.')
            .next()
            .and_then(|major| major.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Difficulty per chart; absent charts are not listed
    pub fn charts(&self) -> &BTreeMap<ChartKind, f64> {
        &self.charts
    }

    pub fn difficulty(&self, chart: ChartKind) -> Option<f64> {
        self.charts.get(&chart).copied()
    }
}

/// Read-only song catalog, built once and shared.
///
/// Candidate lists for both eras are computed at construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    songs: Vec<Song>,
    by_id: HashMap<SongId, usize>,
    max_major: u32,
    old_candidates: Vec<Candidate>,
    new_candidates: Vec<Candidate>,
}

impl Catalog {
    /// Build from songs; a later duplicate id replaces the earlier song
    pub fn from_songs(songs: impl IntoIterator<Item = Song>) -> Result<Self> {
        let mut deduped: Vec<Song> = Vec::new();
        let mut by_id = HashMap::new();
        for song in songs {
            match by_id.get(&song.song_id) {
                Some(&i) => deduped[i] = song,
                None => {
                    by_id.insert(song.song_id, deduped.len());
                    deduped.push(song);
                }
            }
        }
        if deduped.is_empty() {
            return Err(EngineError::Catalog("No songs in catalog".to_string()));
        }

        let max_major = deduped.iter().map(Song::major).max().unwrap_or(0);
        let mut catalog = Self {
            songs: deduped,
            by_id,
            max_major,
            old_candidates: Vec::new(),
            new_candidates: Vec::new(),
        };
        catalog.old_candidates = catalog.build_candidates(Era::Old);
        catalog.new_candidates = catalog.build_candidates(Era::New);

        tracing::info!(
            "📚 catalog: {} songs, latest major {}, {} old / {} new charts",
            catalog.songs.len(),
            catalog.max_major,
            catalog.old_candidates.len(),
            catalog.new_candidates.len()
        );
        Ok(catalog)
    }

    /// Build from a `song_lib` sheet
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_songs(parse_song_sheet(yaml)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml_str(&yaml)
    }

    pub fn song(&self, song_id: SongId) -> Option<&Song> {
        self.by_id.get(&song_id).map(|&i| &self.songs[i])
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Highest major version of any song
    pub fn max_major(&self) -> u32 {
        self.max_major
    }

    pub fn era(&self, song: &Song) -> Era {
        if song.major() == self.max_major {
            Era::New
        } else {
            Era::Old
        }
    }

    /// Counted charts of an era, hardest first
    pub fn candidates(&self, era: Era) -> &[Candidate] {
        match era {
            Era::Old => &self.old_candidates,
            Era::New => &self.new_candidates,
        }
    }

    fn build_candidates(&self, era: Era) -> Vec<Candidate> {
        let mut charts: Vec<(SongId, ChartKind, f64)> = self
            .songs
            .iter()
            .filter(|song| self.era(song) == era)
            .flat_map(|song| {
                song.charts
                    .iter()
                    .filter(|&(_, &d)| d < MAX_COUNTED_DIFFICULTY)
                    .map(move |(&kind, &d)| (song.song_id, kind, d))
            })
            .collect();

        // Stable: equal difficulties keep catalog order
        charts.sort_by(|a, b| b.2.total_cmp(&a.2));

        charts
            .into_iter()
            .enumerate()
            .map(|(i, (song_id, kind, d))| Candidate::new(i, song_id, kind, d))
            .collect()
    }
}
