use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{error, info};

use fpl_cheat::compare::{self, ComparisonReport, SquadEntry};
use fpl_cheat::config::Config;
use fpl_cheat::fpl_api::{FplClient, FplSource, OVERALL_LEAGUE_ID};
use fpl_cheat::refresh::{self, RefreshOptions, RefreshSummary, REFRESH_GUARD};
use fpl_cheat::{logging, managers, players, scheduler, store};

#[derive(Debug, Parser)]
#[command(name = "fpl_cheat", about = "Compare an FPL squad against content creator squads")]
struct Cli {
    /// SQLite database path (overrides FPL_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank creator squads by overlap with a manager's squad.
    Compare {
        manager_id: u32,
        #[arg(long)]
        gw: Option<u32>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show a manager's squad for a gameweek.
    Squad {
        manager_id: u32,
        #[arg(long)]
        gw: Option<u32>,
    },
    /// Show a stored creator squad, as captured by the last refresh.
    Creator { team_id: u32 },
    /// Find managers by name or team name prefix (at least 4 characters).
    Search { query: String },
    /// Re-capture creator squads for the current gameweek.
    Refresh {
        #[arg(long)]
        force: bool,
    },
    /// Keep running and refresh creator squads at the configured local hours.
    Schedule {
        #[arg(long, default_value_t = 30)]
        tick_secs: u64,
    },
    /// Import managers from classic league standings into the search table.
    ImportManagers {
        #[arg(long, default_value_t = OVERALL_LEAGUE_ID)]
        league: u32,
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        #[arg(long, default_value_t = 10)]
        pages: u32,
    },
    /// Write the player directory as CSV (element, web_name, position).
    ExportPlayers {
        #[arg(default_value = "players.csv")]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let cfg = Config::from_env();
    logging::init_logger(cli.verbose);

    if let Err(err) = run(cli, cfg) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, cfg: Config) -> Result<()> {
    let db_path = cli
        .db
        .clone()
        .or_else(|| cfg.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let api = FplClient::new(&cfg)?;

    match cli.command {
        Command::Compare {
            manager_id,
            gw,
            top,
            json,
        } => {
            let conn = store::open_db(&db_path)?;
            let top_n = top.unwrap_or(cfg.top_n);
            let report = compare::compare_manager(&api, &conn, manager_id, gw, top_n)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Squad { manager_id, gw } => {
            let gameweek = match gw {
                Some(gw) => gw,
                None => api.current_event_id()?,
            };
            let directory = players::build(&api.bootstrap()?);
            let picks = api.entry_picks(manager_id, gameweek)?;
            if picks.is_empty() {
                anyhow::bail!("no picks found for manager {manager_id} in GW {gameweek}");
            }
            let fixtures = api.fixtures(gameweek).unwrap_or_default();
            println!("Manager {manager_id} - GW {gameweek}");
            print_squad(&compare::squad_view(&picks, &directory, &fixtures));
        }
        Command::Creator { team_id } => {
            let conn = store::open_db(&db_path)?;
            let row = store::get_creator_team(&conn, team_id)?.with_context(|| {
                format!("no stored squad for creator {team_id}; run `fpl_cheat refresh` first")
            })?;
            let directory = players::build(&api.bootstrap()?);
            let fixtures = api.fixtures(row.current_gameweek).unwrap_or_default();
            println!(
                "{} (team {}) - GW {}",
                row.manager_name, row.team_id, row.current_gameweek
            );
            print_squad(&compare::creator_squad_view(&row, &directory, &fixtures));
        }
        Command::Search { query } => {
            let conn = store::open_db(&db_path)?;
            let rows = store::search_managers(&conn, &query)?;
            if rows.is_empty() {
                println!("No managers found (queries need at least 4 characters).");
            }
            for row in rows {
                println!("{:>9}  {:<28} {}", row.manager_id, row.manager_name, row.team_name);
            }
        }
        Command::Refresh { force } => {
            let conn = store::open_db(&db_path)?;
            let opts = RefreshOptions {
                force,
                delay: cfg.refresh_delay,
            };
            let summary =
                refresh::update_creator_teams(&api, &conn, &cfg.roster, &opts, &REFRESH_GUARD)?;
            print_refresh(&summary);
        }
        Command::Schedule { tick_secs } => {
            let hours = cfg.refresh_hours.clone();
            let tz = cfg.refresh_tz;
            let opts = RefreshOptions {
                force: false,
                delay: cfg.refresh_delay,
            };
            let handle = scheduler::spawn_scheduler(
                hours,
                tz,
                Duration::from_secs(tick_secs.max(1)),
                move || scheduled_refresh(&api, &db_path, &cfg, &opts),
            );
            handle.join();
        }
        Command::ImportManagers {
            league,
            start_page,
            pages,
        } => {
            let mut conn = store::open_db(&db_path)?;
            let summary = managers::import_managers(
                &mut conn,
                start_page,
                pages,
                cfg.refresh_delay,
                |page| api.standings_page(league, page),
            )?;
            println!(
                "Imported {} managers from {} pages (last page {}, more: {})",
                summary.managers_upserted, summary.pages_fetched, summary.last_page, summary.has_more
            );
            for err in summary.errors.iter().take(8) {
                println!(" - {err}");
            }
        }
        Command::ExportPlayers { out } => {
            let directory = players::build(&api.bootstrap()?);
            let written = export_players(&directory, &out)?;
            println!("Wrote {written} players to {}", out.display());
        }
    }

    Ok(())
}

fn scheduled_refresh(api: &FplClient, db_path: &Path, cfg: &Config, opts: &RefreshOptions) {
    let result = store::open_db(db_path).and_then(|conn: Connection| {
        refresh::update_creator_teams(api, &conn, &cfg.roster, opts, &REFRESH_GUARD)
    });
    match result {
        Ok(summary) if summary.already_up_to_date || summary.skipped_overlap => {}
        Ok(summary) => info!(
            "update complete: {}/{} successful, {} failed, {} already current",
            summary.success, summary.total, summary.failed, summary.current
        ),
        Err(err) => error!("scheduled update failed: {err:#}"),
    }
}

fn export_players(directory: &players::PlayerDirectory, out: &Path) -> Result<usize> {
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).ok();
    }
    let mut writer =
        csv::Writer::from_path(out).with_context(|| format!("create {}", out.display()))?;
    writer.write_record(["element", "web_name", "position"])?;
    let records = directory.records();
    for record in &records {
        writer.write_record([
            record.player_id.to_string(),
            record.display_name.clone(),
            record.position.tag().to_string(),
        ])?;
    }
    writer.flush().context("flush players csv")?;
    Ok(records.len())
}

fn print_report(report: &ComparisonReport) {
    println!("Manager {} - GW {}", report.manager_id, report.gameweek);
    print_squad(&report.squad);
    println!();

    if report.matches.is_empty() {
        if report.stale_creators > 0 {
            println!(
                "No creator squads stored for GW {} ({} from other gameweeks). Run `fpl_cheat refresh`.",
                report.gameweek, report.stale_creators
            );
        } else {
            println!("No creator squads stored. Run `fpl_cheat refresh` first.");
        }
        return;
    }
    if report.stale_creators > 0 {
        println!(
            "Note: {} creator squads from other gameweeks were left out.",
            report.stale_creators
        );
    }
    println!("Top matches ({} creators compared):", report.creators_compared);
    for (idx, m) in report.matches.iter().enumerate() {
        println!(
            "{:>2}. {:<20} {:>5.1}%  {:>2} common  (GW {})",
            idx + 1,
            m.manager_name,
            m.similarity_score,
            m.common_player_count,
            m.gameweek
        );
    }
}

fn print_squad(entries: &[SquadEntry]) {
    let (starters, bench): (Vec<&SquadEntry>, Vec<&SquadEntry>) =
        entries.iter().partition(|e| e.starter);
    for (title, rows) in [("Starting XI", starters), ("Bench", bench)] {
        println!("{title}:");
        for e in rows {
            let marker = if e.captain {
                " (C)"
            } else if e.vice_captain {
                " (VC)"
            } else {
                ""
            };
            println!(
                "  {:>2}  {:<3} {:<18} {:<4} {}",
                e.slot_index,
                e.position.tag(),
                format!("{}{}", e.name, marker),
                e.club,
                e.fixture.as_deref().unwrap_or("-")
            );
        }
    }
}

fn print_refresh(summary: &RefreshSummary) {
    if summary.skipped_overlap {
        println!("Another refresh is already running.");
        return;
    }
    if summary.already_up_to_date {
        println!(
            "Creator squads already up to date for GW {}.",
            summary.gameweek.unwrap_or_default()
        );
        return;
    }
    println!(
        "GW {}: {}/{} creator squads updated, {} failed, {} already current",
        summary.gameweek.map(|g| g.to_string()).unwrap_or_else(|| "?".into()),
        summary.success,
        summary.total,
        summary.failed,
        summary.current
    );
    for err in summary.errors.iter().take(8) {
        println!(" - {err}");
    }
}
