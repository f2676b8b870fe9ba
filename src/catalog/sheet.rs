//! The game's `song_lib` sheet as exported from Unity:
//!
//! ```yaml
//! MonoBehaviour:
//!   dataArray:
//!   - index: 1
//!     songname: ...
//!     updateversion: 1.0.0
//!     diffe: 2.1
//!     diffn: 5.4
//!     diffh: 8.8
//!     diffm: 11.2
//!     diffsp: -1
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::catalog::Song;
use crate::core::ChartKind;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct SheetFile {
    #[serde(rename = "MonoBehaviour")]
    mono_behaviour: SheetBody,
}

#[derive(Debug, Deserialize)]
struct SheetBody {
    #[serde(rename = "dataArray", default)]
    data_array: Vec<SongRow>,
}

/// One row; separator rows use non-integer indices and are ignored
#[derive(Debug, Deserialize)]
struct SongRow {
    #[serde(default)]
    index: serde_yaml::Value,
    #[serde(default)]
    songname: serde_yaml::Value,
    #[serde(default)]
    updateversion: serde_yaml::Value,
    #[serde(default)]
    diffe: serde_yaml::Value,
    #[serde(default)]
    diffn: serde_yaml::Value,
    #[serde(default)]
    diffh: serde_yaml::Value,
    #[serde(default)]
    diffm: serde_yaml::Value,
    #[serde(default)]
    diffsp: serde_yaml::Value,
}

impl SongRow {
    fn into_song(self) -> Option<Song> {
        let song_id = self.index.as_u64().and_then(|i| u32::try_from(i).ok())?;
        let name = self.songname.as_str()?;
        let update_version = self.updateversion.as_str()?;
        // Multi-line titles keep the last variant
        let name = name.rsplit('|').next().unwrap_or(name).replace('\n', " ");
        if name.trim().is_empty() {
            return None;
        }

        let charts: BTreeMap<ChartKind, f64> = [
            (ChartKind::Easy, self.diffe),
            (ChartKind::Normal, self.diffn),
            (ChartKind::Hard, self.diffh),
            (ChartKind::Master, self.diffm),
            (ChartKind::Special, self.diffsp),
        ]
        .into_iter()
        .filter_map(|(kind, diff)| diff.as_f64().filter(|d| *d >= 0.0).map(|d| (kind, d)))
        .collect();

        Some(Song::new(song_id, name, update_version, charts))
    }
}

/// Parse songs from a sheet, dropping rows that are not songs
pub fn parse_song_sheet(yaml: &str) -> Result<Vec<Song>> {
    let sheet: SheetFile = serde_yaml::from_str(yaml)?;
    let total = sheet.mono_behaviour.data_array.len();
    let songs: Vec<Song> = sheet
        .mono_behaviour
        .data_array
        .into_iter()
        .filter_map(SongRow::into_song)
        .collect();
    tracing::debug!("📖 song sheet: {} rows, {} songs", total, songs.len());
    Ok(songs)
}
