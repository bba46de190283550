// SQLite persistence for rosters, fixture periods, selections and captains.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::ProviderError;
use crate::formation::{CaptaincyTracker, Format, PeriodRecord, PersistedSelection, SelectionRecord};
use crate::provider::{PersistenceProvider, RosterProvider};
use crate::types::{FixtureId, Minutes, PerformanceCategory, PeriodId, Player, PlayerId, TeamId};

/// SQLite-backed store. Pass `":memory:"` to [`Database::open`] for an
/// ephemeral database (tests).
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                team_id      TEXT NOT NULL,
                player_id    TEXT NOT NULL,
                name         TEXT NOT NULL,
                squad_number INTEGER,
                sort_order   INTEGER NOT NULL,
                PRIMARY KEY (team_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                fixture_id TEXT PRIMARY KEY,
                format     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fixture_periods (
                fixture_id TEXT NOT NULL,
                period_id  INTEGER NOT NULL,
                label      TEXT NOT NULL,
                duration   INTEGER NOT NULL CHECK (duration > 0),
                PRIMARY KEY (fixture_id, period_id)
            );

            CREATE TABLE IF NOT EXISTS fixture_selections (
                fixture_id           TEXT NOT NULL,
                period_id            INTEGER NOT NULL,
                player_id            TEXT NOT NULL,
                position             TEXT,
                performance_category TEXT,
                is_captain           INTEGER,
                is_substitution      INTEGER,
                saved_at             TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_fixture_selections_fixture
                ON fixture_selections(fixture_id, period_id);

            CREATE TABLE IF NOT EXISTS team_captains (
                team_id   TEXT PRIMARY KEY,
                player_id TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection.
    ///
    /// Panics if the mutex is poisoned, which only happens if another thread
    /// panicked mid-query.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // -- Roster ------------------------------------------------------------

    /// Replace the stored roster for `team`, keeping the given order.
    pub fn replace_roster(&self, team: &TeamId, players: &[Player]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin roster transaction")?;
        tx.execute("DELETE FROM players WHERE team_id = ?1", params![team.as_str()])
            .context("failed to clear roster")?;
        for (i, p) in players.iter().enumerate() {
            tx.execute(
                "INSERT INTO players (team_id, player_id, name, squad_number, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![team.as_str(), p.id.as_str(), p.name, p.squad_number, i as i64],
            )
            .with_context(|| format!("failed to insert player {}", p.id))?;
        }
        tx.commit().context("failed to commit roster")?;
        debug!("Stored {} players for {}", players.len(), team);
        Ok(())
    }

    pub fn load_roster(&self, team: &TeamId) -> Result<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, name, squad_number FROM players
                 WHERE team_id = ?1 ORDER BY sort_order",
            )
            .context("failed to prepare load_roster query")?;

        let players = stmt
            .query_map(params![team.as_str()], |row| {
                Ok(Player {
                    id: PlayerId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    squad_number: row.get(2)?,
                })
            })
            .context("failed to query roster")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;
        Ok(players)
    }

    // -- Selections --------------------------------------------------------

    /// Replace every stored selection row for one period in a single
    /// transaction.
    pub fn replace_selections(
        &self,
        fixture: &FixtureId,
        period: PeriodId,
        records: &[SelectionRecord],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin selection transaction")?;
        tx.execute(
            "DELETE FROM fixture_selections WHERE fixture_id = ?1 AND period_id = ?2",
            params![fixture.as_str(), period.0],
        )
        .context("failed to clear period selections")?;
        for r in records {
            tx.execute(
                "INSERT INTO fixture_selections
                    (fixture_id, period_id, player_id, position, performance_category, is_captain, is_substitution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    fixture.as_str(),
                    period.0,
                    r.player_id.as_str(),
                    r.position,
                    r.performance_category.as_str(),
                    r.is_captain,
                    r.is_substitution,
                ],
            )
            .context("failed to insert selection")?;
        }
        tx.commit().context("failed to commit selections")?;
        Ok(())
    }

    /// Load every selection row of a fixture, ordered by period then
    /// insertion order.
    pub fn fetch_selections(&self, fixture: &FixtureId) -> Result<Vec<PersistedSelection>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT period_id, player_id, position, performance_category, is_captain, is_substitution
                 FROM fixture_selections WHERE fixture_id = ?1 ORDER BY period_id, rowid",
            )
            .context("failed to prepare load_selections query")?;

        let rows = stmt
            .query_map(params![fixture.as_str()], |row| {
                Ok(PersistedSelection {
                    period_id: PeriodId(row.get(0)?),
                    player_id: PlayerId::new(row.get::<_, String>(1)?),
                    position: row.get(2)?,
                    performance_category: row
                        .get::<_, Option<String>>(3)?
                        .map(PerformanceCategory::new),
                    is_captain: row.get(4)?,
                    is_substitution: row.get(5)?,
                })
            })
            .context("failed to query selections")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map selection rows")?;
        Ok(rows)
    }

    // -- Fixtures ----------------------------------------------------------

    pub fn replace_format(&self, fixture: &FixtureId, format: Format) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO fixtures (fixture_id, format) VALUES (?1, ?2)",
                params![fixture.as_str(), format.as_str()],
            )
            .with_context(|| format!("failed to save format of fixture {fixture}"))?;
        Ok(())
    }

    /// The stored format of a fixture, if it was ever saved.
    pub fn fetch_format(&self, fixture: &FixtureId) -> Result<Option<Format>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT format FROM fixtures WHERE fixture_id = ?1",
                params![fixture.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query fixture format")?;
        raw.map(|s| {
            s.parse::<Format>()
                .with_context(|| format!("fixture {fixture} has an invalid format"))
        })
        .transpose()
    }

    // -- Periods -----------------------------------------------------------

    /// Replace the stored period list of a fixture. Selection rows of periods
    /// no longer present are deleted too.
    pub fn replace_periods(&self, fixture: &FixtureId, periods: &[PeriodRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin period transaction")?;
        tx.execute(
            "DELETE FROM fixture_periods WHERE fixture_id = ?1",
            params![fixture.as_str()],
        )
        .context("failed to clear periods")?;
        for p in periods {
            tx.execute(
                "INSERT INTO fixture_periods (fixture_id, period_id, label, duration)
                 VALUES (?1, ?2, ?3, ?4)",
                params![fixture.as_str(), p.id.0, p.label, p.duration.get()],
            )
            .context("failed to insert period")?;
        }
        tx.execute(
            "DELETE FROM fixture_selections WHERE fixture_id = ?1
               AND period_id NOT IN (SELECT period_id FROM fixture_periods WHERE fixture_id = ?1)",
            params![fixture.as_str()],
        )
        .context("failed to prune orphaned selections")?;
        tx.commit().context("failed to commit periods")?;
        Ok(())
    }

    pub fn fetch_periods(&self, fixture: &FixtureId) -> Result<Vec<PeriodRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT period_id, label, duration FROM fixture_periods
                 WHERE fixture_id = ?1 ORDER BY period_id",
            )
            .context("failed to prepare load_periods query")?;

        let raw = stmt
            .query_map(params![fixture.as_str()], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })
            .context("failed to query periods")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map period rows")?;

        raw.into_iter()
            .map(|(id, label, duration)| {
                let duration = Minutes::new(duration)
                    .with_context(|| format!("period {id} has an invalid duration"))?;
                Ok(PeriodRecord {
                    id: PeriodId(id),
                    label,
                    duration,
                })
            })
            .collect()
    }

    // -- Captains ----------------------------------------------------------

    pub fn save_captain(&self, team: &TeamId, player: &PlayerId) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO team_captains (team_id, player_id) VALUES (?1, ?2)",
                params![team.as_str(), player.as_str()],
            )
            .context("failed to save captain")?;
        Ok(())
    }

    /// Every stored captain, as a tracker.
    pub fn load_captains(&self) -> Result<CaptaincyTracker> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT team_id, player_id FROM team_captains")
            .context("failed to prepare load_captains query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("failed to query captains")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map captain rows")?;

        let mut tracker = CaptaincyTracker::new();
        for (team, player) in rows {
            tracker.set_captain(TeamId::new(team), PlayerId::new(player));
        }
        Ok(tracker)
    }
}

#[async_trait]
impl RosterProvider for Database {
    async fn fetch_roster(&self, team: &TeamId) -> Result<Vec<Player>, ProviderError> {
        self.load_roster(team).map_err(ProviderError::Database)
    }
}

#[async_trait]
impl PersistenceProvider for Database {
    async fn load_selections(&self, fixture: &FixtureId) -> Result<Vec<PersistedSelection>, ProviderError> {
        self.fetch_selections(fixture).map_err(ProviderError::Database)
    }

    async fn save_selections(
        &self,
        fixture: &FixtureId,
        period: PeriodId,
        records: &[SelectionRecord],
    ) -> Result<(), ProviderError> {
        self.replace_selections(fixture, period, records)
            .map_err(ProviderError::Database)
    }

    async fn load_periods(&self, fixture: &FixtureId) -> Result<Vec<PeriodRecord>, ProviderError> {
        self.fetch_periods(fixture).map_err(ProviderError::Database)
    }

    async fn load_format(&self, fixture: &FixtureId) -> Result<Option<Format>, ProviderError> {
        self.fetch_format(fixture).map_err(ProviderError::Database)
    }

    async fn save_format(&self, fixture: &FixtureId, format: Format) -> Result<(), ProviderError> {
        self.replace_format(fixture, format).map_err(ProviderError::Database)
    }

    async fn save_periods(&self, fixture: &FixtureId, periods: &[PeriodRecord]) -> Result<(), ProviderError> {
        self.replace_periods(fixture, periods)
            .map_err(ProviderError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open(":memory:").unwrap()
    }

    fn record(position: &str, player: &str) -> SelectionRecord {
        SelectionRecord {
            position: position.into(),
            player_id: player.into(),
            is_captain: false,
            performance_category: PerformanceCategory::default(),
            is_substitution: false,
        }
    }

    #[test]
    fn roster_round_trip_keeps_order() {
        let db = db();
        let team = TeamId::from("teamA");
        let players = vec![
            Player::new("p2", "Bea", Some(9)).unwrap(),
            Player::new("p1", "Ann", None).unwrap(),
        ];
        db.replace_roster(&team, &players).unwrap();
        assert_eq!(db.load_roster(&team).unwrap(), players);
        assert!(db.load_roster(&"other".into()).unwrap().is_empty());
    }

    #[test]
    fn replace_selections_is_last_write_wins() {
        let db = db();
        let fixture = FixtureId::from("f1");
        db.replace_selections(&fixture, PeriodId(1), &[record("GK", "p1"), record("DL", "p2")])
            .unwrap();
        db.replace_selections(&fixture, PeriodId(1), &[record("STC", "p3")])
            .unwrap();
        db.replace_selections(&fixture, PeriodId(2), &[record("GK", "p4")])
            .unwrap();

        let rows = db.fetch_selections(&fixture).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period_id, PeriodId(1));
        assert_eq!(rows[0].player_id.as_str(), "p3");
        assert_eq!(rows[0].position.as_deref(), Some("STC"));
        assert_eq!(rows[0].is_captain, Some(false));
    }

    #[test]
    fn null_columns_load_as_missing() {
        let db = db();
        db.conn()
            .execute(
                "INSERT INTO fixture_selections (fixture_id, period_id, player_id) VALUES ('f1', 1, 'p1')",
                [],
            )
            .unwrap();
        let rows = db.fetch_selections(&"f1".into()).unwrap();
        assert_eq!(rows[0].position, None);
        assert_eq!(rows[0].performance_category, None);
        assert_eq!(rows[0].is_captain, None);
    }

    #[test]
    fn replacing_periods_prunes_orphaned_selections() {
        let db = db();
        let fixture = FixtureId::from("f1");
        let half = |id: u32, label: &str| PeriodRecord {
            id: PeriodId(id),
            label: label.into(),
            duration: Minutes::DEFAULT_PERIOD,
        };
        db.replace_periods(&fixture, &[half(1, "First Half"), half(2, "Second Half")])
            .unwrap();
        db.replace_selections(&fixture, PeriodId(2), &[record("GK", "p1")])
            .unwrap();

        db.replace_periods(&fixture, &[half(1, "First Half")]).unwrap();
        assert_eq!(db.fetch_periods(&fixture).unwrap(), vec![half(1, "First Half")]);
        assert!(db.fetch_selections(&fixture).unwrap().is_empty());
    }

    #[test]
    fn fixture_format_round_trips() {
        let db = db();
        let fixture = FixtureId::from("f1");
        assert_eq!(db.fetch_format(&fixture).unwrap(), None);
        db.replace_format(&fixture, Format::SevenASide).unwrap();
        db.replace_format(&fixture, Format::ElevenASide).unwrap();
        assert_eq!(db.fetch_format(&fixture).unwrap(), Some(Format::ElevenASide));
    }

    #[test]
    fn captains_persist() {
        let db = db();
        db.save_captain(&"teamA".into(), &"p1".into()).unwrap();
        db.save_captain(&"teamA".into(), &"p2".into()).unwrap();
        let tracker = db.load_captains().unwrap();
        assert_eq!(tracker.captain(&"teamA".into()), Some(&PlayerId::from("p2")));
    }

    #[tokio::test]
    async fn provider_traits_delegate_to_sqlite() {
        let db = db();
        let fixture = FixtureId::from("f9");
        db.save_selections(&fixture, PeriodId(3), &[record("GK", "p1")])
            .await
            .unwrap();
        let rows = db.load_selections(&fixture).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(db.fetch_roster(&"nobody".into()).await.unwrap().is_empty());
    }
}
