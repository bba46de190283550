// Roster CSV loading.
//
// Expected columns: id,name,squad_number (squad_number may be blank).

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::ProviderError;
use crate::provider::RosterProvider;
use crate::types::{Player, TeamId};

#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    name: String,
    #[serde(default)]
    squad_number: Option<u32>,
}

/// Parse a roster from any reader. Rows with a blank id or name are skipped
/// with a warning; malformed CSV is an error.
pub fn load_roster_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();
    for (line, result) in reader.deserialize::<RosterRow>().enumerate() {
        let row = result?;
        match Player::new(row.id, row.name, row.squad_number) {
            Ok(p) => players.push(p),
            Err(e) => warn!("Skipping roster row {}: {}", line + 1, e),
        }
    }
    Ok(players)
}

/// Parse a roster CSV file.
pub fn load_roster_csv(path: &Path) -> Result<Vec<Player>, ProviderError> {
    let file = std::fs::File::open(path)?;
    load_roster_from_reader(file).map_err(|source| ProviderError::Csv {
        path: path.display().to_string(),
        source,
    })
}

/// Roster provider reading `<dir>/<team_id>.csv`.
#[derive(Debug, Clone)]
pub struct CsvRosterProvider {
    dir: PathBuf,
}

impl CsvRosterProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, team: &TeamId) -> PathBuf {
        self.dir.join(format!("{}.csv", team.as_str()))
    }
}

#[async_trait]
impl RosterProvider for CsvRosterProvider {
    async fn fetch_roster(&self, team: &TeamId) -> Result<Vec<Player>, ProviderError> {
        let path = self.path_for(team);
        let text = tokio::fs::read_to_string(&path).await?;
        load_roster_from_reader(text.as_bytes()).map_err(|source| ProviderError::Csv {
            path: path.display().to_string(),
            source,
        })
    }
}
