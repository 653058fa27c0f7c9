use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::fpl_api::{Fixture, FplSource};
use crate::players::{self, PlayerDirectory, Position};
use crate::ranking::rank;
use crate::squad::{resolve_slot, resolve_structured, Pick, RawSquad, SlotLabel, STARTING_SLOTS};
use crate::store::{self, CreatorTeamRow};

#[derive(Debug, Clone, Serialize)]
pub struct SquadEntry {
    pub slot_index: u8,
    pub player_id: u32,
    pub name: String,
    pub position: Position,
    pub club: String,
    pub captain: bool,
    pub vice_captain: bool,
    pub starter: bool,
    pub fixture: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatorMatch {
    pub team_id: u32,
    pub manager_name: String,
    pub gameweek: u32,
    pub similarity_score: f64,
    pub common_player_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub manager_id: u32,
    pub gameweek: u32,
    pub squad: Vec<SquadEntry>,
    pub matches: Vec<CreatorMatch>,
    /// Stored creator squads captured for this gameweek, all of them ranked.
    pub creators_compared: usize,
    /// Stored creator squads from another gameweek, left out of the ranking.
    pub stale_creators: usize,
}

pub fn compare_manager(
    source: &dyn FplSource,
    conn: &Connection,
    manager_id: u32,
    gameweek: Option<u32>,
    top_n: usize,
) -> Result<ComparisonReport> {
    let gameweek = match gameweek {
        Some(gw) => gw,
        None => source.current_event_id()?,
    };
    let bootstrap = source.bootstrap()?;
    let directory = players::build(&bootstrap);

    let picks = source
        .entry_picks(manager_id, gameweek)
        .with_context(|| format!("failed to fetch picks for manager {manager_id}"))?;
    if picks.is_empty() {
        bail!("no picks found for manager {manager_id} in GW {gameweek}");
    }

    let creators = store::get_creator_teams(conn)?;
    let fixtures = source.fixtures(gameweek).unwrap_or_else(|err| {
        warn!("fixtures unavailable for GW {gameweek}: {err:#}");
        Vec::new()
    });

    let report = build_report(
        manager_id, gameweek, &picks, &directory, &creators, &fixtures, top_n,
    );
    info!(
        manager_id,
        gameweek,
        compared = report.creators_compared,
        "comparison complete"
    );
    Ok(report)
}

/// Pure half of [`compare_manager`], over already-fetched inputs.
pub fn build_report(
    manager_id: u32,
    gameweek: u32,
    picks: &[Pick],
    directory: &PlayerDirectory,
    creators: &[CreatorTeamRow],
    fixtures: &[Fixture],
    top_n: usize,
) -> ComparisonReport {
    let user_set = resolve_structured(picks, directory);
    let current: Vec<&CreatorTeamRow> = creators
        .iter()
        .filter(|row| row.current_gameweek == gameweek)
        .collect();
    let stale_creators = creators.len() - current.len();
    if current.is_empty() && stale_creators > 0 {
        warn!(gameweek, stale_creators, "no creator squads stored for this gameweek");
    }
    let candidates: Vec<(usize, RawSquad)> = current
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx, row.raw_squad()))
        .collect();

    let matches = rank(&user_set, &candidates, directory, top_n)
        .into_iter()
        .map(|result| {
            let row = current[result.candidate_identifier];
            CreatorMatch {
                team_id: row.team_id,
                manager_name: row.manager_name.clone(),
                gameweek: row.current_gameweek,
                similarity_score: result.similarity_score,
                common_player_count: result.common_player_count,
            }
        })
        .collect();

    ComparisonReport {
        manager_id,
        gameweek,
        squad: squad_view(picks, directory, fixtures),
        matches,
        creators_compared: current.len(),
        stale_creators,
    }
}

/// Display rows in pick order.
pub fn squad_view(picks: &[Pick], directory: &PlayerDirectory, fixtures: &[Fixture]) -> Vec<SquadEntry> {
    let mut ordered: Vec<&Pick> = picks.iter().collect();
    ordered.sort_by_key(|p| p.slot_index);

    ordered
        .into_iter()
        .map(|pick| {
            let record = directory.get(pick.player_id);
            let club_id = record.map(|r| r.club_id).unwrap_or(0);
            SquadEntry {
                slot_index: pick.slot_index,
                player_id: pick.player_id,
                name: record
                    .map(|r| r.display_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                position: record.map(|r| r.position).unwrap_or(Position::Unknown),
                club: club_short_name(directory, club_id),
                captain: pick.is_captain,
                vice_captain: pick.is_vice_captain,
                starter: pick.is_starter(),
                fixture: fixture_label(directory, fixtures, club_id),
            }
        })
        .collect()
}

/// Display rows for a stored creator squad. Labels are resolved back through the
/// directory; slots that no longer resolve keep the stored name with player id 0.
pub fn creator_squad_view(
    row: &CreatorTeamRow,
    directory: &PlayerDirectory,
    fixtures: &[Fixture],
) -> Vec<SquadEntry> {
    row.slots
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| {
            let raw = slot.as_deref()?;
            let label = SlotLabel::parse(raw)?;
            let slot_index = idx as u8 + 1;
            let record = resolve_slot(raw, directory).and_then(|id| directory.get(id));
            let club_id = record.map(|r| r.club_id).unwrap_or(0);
            Some(SquadEntry {
                slot_index,
                player_id: record.map(|r| r.player_id).unwrap_or(0),
                name: record
                    .map(|r| r.display_name.clone())
                    .unwrap_or(label.name),
                position: record
                    .map(|r| r.position)
                    .or(label.position)
                    .unwrap_or(Position::Unknown),
                club: club_short_name(directory, club_id),
                captain: label.captain,
                vice_captain: label.vice_captain && !label.captain,
                starter: slot_index <= STARTING_SLOTS,
                fixture: fixture_label(directory, fixtures, club_id),
            })
        })
        .collect()
}

fn club_short_name(directory: &PlayerDirectory, club_id: u32) -> String {
    directory
        .club(club_id)
        .map(|c| c.short_name.clone())
        .unwrap_or_default()
}

// Double gameweeks list both opponents, blanks give None.
fn fixture_label(directory: &PlayerDirectory, fixtures: &[Fixture], club_id: u32) -> Option<String> {
    if club_id == 0 {
        return None;
    }
    let labels: Vec<String> = fixtures
        .iter()
        .filter_map(|f| f.opponent_of(club_id))
        .map(|(opp, home)| {
            let name = directory
                .club(opp)
                .map(|c| c.short_name.clone())
                .unwrap_or_else(|| opp.to_string());
            format!("{} ({})", name, if home { "H" } else { "A" })
        })
        .collect();
    (!labels.is_empty()).then(|| labels.join(", "))
}
