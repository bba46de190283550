// Teamsheet entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Dispatch the requested command

use std::path::Path;

use anyhow::{bail, Context};
use serde_json::json;
use tracing::info;

use teamsheet_app::notify::Notifier;
use teamsheet_app::session::FixtureSession;
use teamsheet_core::config::{self, Config};
use teamsheet_core::db::Database;
use teamsheet_core::formation::{reconcile, SlotId};
use teamsheet_core::provider::RosterProvider;
use teamsheet_core::roster_csv::{self, CsvRosterProvider};
use teamsheet_core::types::{FixtureId, PlayerId, TeamId};

const USAGE: &str = "usage:
  teamsheet show <fixture>
  teamsheet select <fixture> <slot> <player>
  teamsheet import-roster <team> [csv]
  teamsheet captain <team> <player>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Teamsheet starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: team={} ({}), default format {}",
        config.team.name, config.team.id, config.selection.default_format
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Dispatch
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["show", fixture] => show(&config, &db, FixtureId::new(*fixture)).await,
        ["select", fixture, slot, player] => {
            select(&config, &db, FixtureId::new(*fixture), SlotId::new(*slot), PlayerId::new(*player)).await
        }
        ["import-roster", team] => import_roster(&config, &db, TeamId::new(*team), None).await,
        ["import-roster", team, csv] => {
            import_roster(&config, &db, TeamId::new(*team), Some(Path::new(csv))).await
        }
        ["captain", team, player] => set_captain(&db, TeamId::new(*team), PlayerId::new(*player)),
        _ => bail!("{USAGE}"),
    }
}

/// Print every period of a fixture with its starting lineup and bench.
async fn show(config: &Config, db: &Database, fixture: FixtureId) -> anyhow::Result<()> {
    let mut session = FixtureSession::new(fixture.clone(), config.team.team_id(), config.selection.clone());
    let summary = session
        .load(db, db)
        .await
        .with_context(|| format!("failed to load fixture {fixture}"))?;
    if !summary.unknown_positions.is_empty() {
        eprintln!(
            "warning: positions not in {}: {}",
            session.periods().format(),
            summary.unknown_positions.join(", ")
        );
    }

    let captains = db.load_captains().context("failed to load captains")?;
    let periods: Vec<_> = session
        .periods()
        .periods()
        .iter()
        .map(|period| {
            json!({
                "id": period.id(),
                "label": period.label,
                "duration": period.duration,
                "lineup": reconcile::to_export(period.selections()),
                "selections": reconcile::to_records(
                    period,
                    session.team(),
                    &captains,
                    &config.selection.default_category,
                ),
            })
        })
        .collect();

    let out = json!({
        "fixture": fixture,
        "team": session.team(),
        "format": session.periods().format(),
        "captain": captains.captain(session.team()),
        "periods": periods,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Place a player in the active period of a fixture and save it.
async fn select(
    config: &Config,
    db: &Database,
    fixture: FixtureId,
    slot: SlotId,
    player: PlayerId,
) -> anyhow::Result<()> {
    let notifier = Notifier::from_config(config).context("failed to build notifier")?;
    let mut session = FixtureSession::new(fixture.clone(), config.team.team_id(), config.selection.clone());
    session
        .load(db, db)
        .await
        .with_context(|| format!("failed to load fixture {fixture}"))?;

    if let Some(vacated) = session.place(slot.clone(), player.clone())? {
        println!("{player} moved out of {vacated}");
    }
    let captains = db.load_captains().context("failed to load captains")?;
    session
        .save_active(db, &notifier, &captains)
        .await
        .with_context(|| format!("failed to save fixture {fixture}"))?;
    println!("{player} selected at {slot}");
    Ok(())
}

/// Store a team's roster from `csv`, or from `<roster.csv_dir>/<team>.csv`.
async fn import_roster(
    config: &Config,
    db: &Database,
    team: TeamId,
    csv: Option<&Path>,
) -> anyhow::Result<()> {
    let players = match csv {
        Some(path) => roster_csv::load_roster_csv(path)
            .with_context(|| format!("failed to read roster {}", path.display()))?,
        None => {
            let provider = CsvRosterProvider::new(&config.roster.csv_dir);
            provider
                .fetch_roster(&team)
                .await
                .with_context(|| format!("failed to read roster {}", provider.path_for(&team).display()))?
        }
    };
    db.replace_roster(&team, &players)
        .context("failed to store roster")?;
    info!("Imported {} players for team {}", players.len(), team);
    println!("Imported {} players for {}", players.len(), team);
    Ok(())
}

fn set_captain(db: &Database, team: TeamId, player: PlayerId) -> anyhow::Result<()> {
    let roster = db.load_roster(&team).context("failed to load roster")?;
    if !roster.iter().any(|p| p.id == player) {
        bail!("{player} is not on the {team} roster");
    }
    let mut captains = db.load_captains().context("failed to load captains")?;
    let previous = captains.set_captain(team.clone(), player.clone());
    db.save_captain(&team, &player).context("failed to save captain")?;
    match previous {
        Some(prev) if prev != player => println!("Captain of {team}: {prev} -> {player}"),
        _ => println!("Captain of {team}: {player}"),
    }
    Ok(())
}

/// Initialize tracing to log to a file so command output stays clean.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("teamsheet.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("teamsheet=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
