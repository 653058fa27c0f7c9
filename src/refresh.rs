use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::creators::{self, Creator};
use crate::fpl_api::FplSource;
use crate::players::{self, PlayerDirectory, Position};
use crate::squad::{format_slot_label, Pick, SQUAD_SLOTS};
use crate::store::{self, CreatorTeamRow};

/// Collapses overlapping refresh triggers into no-ops.
#[derive(Debug, Default)]
pub struct RefreshGuard {
    running: AtomicBool,
}

pub struct RefreshPermit<'a> {
    guard: &'a RefreshGuard,
}

impl RefreshGuard {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    pub fn try_acquire(&self) -> Option<RefreshPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RefreshPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

/// Process-wide guard shared by the CLI and the scheduler.
pub static REFRESH_GUARD: RefreshGuard = RefreshGuard::new();

#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Refresh even if the stored gameweek is already current.
    pub force: bool,
    /// Pause between creators.
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub gameweek: Option<u32>,
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    /// Roster entries already stored for this gameweek and not fetched again.
    pub current: usize,
    pub already_up_to_date: bool,
    pub skipped_overlap: bool,
    pub errors: Vec<String>,
}

pub fn update_creator_teams(
    source: &dyn FplSource,
    conn: &Connection,
    roster: &[Creator],
    opts: &RefreshOptions,
    guard: &RefreshGuard,
) -> Result<RefreshSummary> {
    let total = roster.len();
    let Some(_permit) = guard.try_acquire() else {
        info!("refresh already running, skipping");
        return Ok(RefreshSummary {
            total,
            skipped_overlap: true,
            ..RefreshSummary::default()
        });
    };
    if roster.is_empty() {
        return Ok(RefreshSummary::default());
    }

    let gameweek = match source.current_event_id() {
        Ok(gw) => gw,
        Err(err) => return Ok(all_failed(total, total, None, "current gameweek", &err)),
    };
    info!(gameweek, "checking creator squads");

    // Only the roster counts; rows for creators dropped from it never block the no-op.
    let stored = if opts.force {
        HashSet::new()
    } else {
        store::creator_team_ids_at(conn, gameweek)?
    };
    let pending: Vec<&Creator> = roster
        .iter()
        .filter(|c| !stored.contains(&c.team_id))
        .collect();
    let current = total - pending.len();
    if pending.is_empty() {
        info!(gameweek, "creator squads already up to date");
        return Ok(RefreshSummary {
            gameweek: Some(gameweek),
            total,
            current,
            already_up_to_date: true,
            ..RefreshSummary::default()
        });
    }

    let bootstrap = match source.bootstrap() {
        Ok(v) => v,
        Err(err) => {
            return Ok(RefreshSummary {
                current,
                ..all_failed(total, pending.len(), Some(gameweek), "bootstrap", &err)
            });
        }
    };
    let directory = players::build(&bootstrap);
    let mut summary = RefreshSummary {
        gameweek: Some(gameweek),
        total,
        current,
        ..RefreshSummary::default()
    };

    for (idx, creator) in pending.iter().enumerate() {
        if idx > 0 && !opts.delay.is_zero() {
            thread::sleep(opts.delay);
        }
        let manager_name = creators::display_name(conn, creator)?;
        info!("updating {}/{}: {}", idx + 1, pending.len(), manager_name);

        match refresh_one(source, conn, &directory, creator.team_id, &manager_name, gameweek) {
            Ok(()) => summary.success += 1,
            Err(err) => {
                warn!(team_id = creator.team_id, "creator refresh failed: {err:#}");
                summary.failed += 1;
                summary.errors.push(format!("{}: {err:#}", creator.team_id));
            }
        }
    }

    info!(
        "update complete: {}/{} successful, {} failed, {} already current",
        summary.success,
        pending.len(),
        summary.failed,
        summary.current
    );
    Ok(summary)
}

fn all_failed(
    total: usize,
    failed: usize,
    gameweek: Option<u32>,
    stage: &str,
    err: &anyhow::Error,
) -> RefreshSummary {
    warn!("{stage} fetch failed: {err:#}");
    RefreshSummary {
        gameweek,
        failed,
        total,
        errors: vec![format!("{stage}: {err:#}")],
        ..RefreshSummary::default()
    }
}

fn refresh_one(
    source: &dyn FplSource,
    conn: &Connection,
    directory: &PlayerDirectory,
    team_id: u32,
    manager_name: &str,
    gameweek: u32,
) -> Result<()> {
    let picks = source.entry_picks(team_id, gameweek)?;
    if picks.is_empty() {
        return Err(anyhow::anyhow!("no picks returned"));
    }
    let row = CreatorTeamRow {
        team_id,
        manager_name: manager_name.to_string(),
        current_gameweek: gameweek,
        slots: slot_labels(&picks, directory),
    };
    store::upsert_creator_team(conn, &row)
}

/// Free-text slot labels keyed by pick position; positions outside 1..=15 are ignored.
pub fn slot_labels(picks: &[Pick], directory: &PlayerDirectory) -> [Option<String>; SQUAD_SLOTS] {
    let mut slots: [Option<String>; SQUAD_SLOTS] = Default::default();
    for pick in picks {
        let idx = pick.slot_index as usize;
        if !(1..=SQUAD_SLOTS).contains(&idx) {
            continue;
        }
        let (name, position) = directory
            .get(pick.player_id)
            .map(|r| (r.display_name.as_str(), r.position))
            .unwrap_or(("Unknown", Position::Unknown));
        slots[idx - 1] = Some(format_slot_label(
            name,
            position,
            pick.is_captain,
            pick.is_vice_captain,
        ));
    }
    slots
}
