use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::players::{normalize_name, PlayerDirectory, Position};

pub const SQUAD_SLOTS: usize = 15;
pub const STARTING_SLOTS: u8 = 11;

/// Canonical squad: captaincy and bench order are not part of it.
pub type PlayerSet = BTreeSet<u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub player_id: u32,
    pub slot_index: u8,
    pub is_captain: bool,
    pub is_vice_captain: bool,
    pub multiplier: u8,
}

impl Pick {
    pub fn is_starter(&self) -> bool {
        (1..=STARTING_SLOTS).contains(&self.slot_index) && self.multiplier > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSquad {
    Structured(Vec<Pick>),
    FreeText([Option<String>; SQUAD_SLOTS]),
}

/// One decoded `"Name (POS) (C)"` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLabel {
    pub name: String,
    pub position: Option<Position>,
    pub captain: bool,
    pub vice_captain: bool,
}

impl SlotLabel {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('(');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return None;
        }

        let mut label = SlotLabel {
            name: name.to_string(),
            position: None,
            captain: false,
            vice_captain: false,
        };
        for part in parts {
            let inner = part.split(')').next().unwrap_or_default().trim();
            match inner.to_ascii_uppercase().as_str() {
                "C" => label.captain = true,
                "VC" => label.vice_captain = true,
                other => {
                    if label.position.is_none() {
                        label.position = Position::from_tag(other);
                    }
                }
            }
        }
        Some(label)
    }
}

/// Inverse of [`SlotLabel::parse`]; captain wins over vice-captain.
pub fn format_slot_label(
    name: &str,
    position: Position,
    is_captain: bool,
    is_vice_captain: bool,
) -> String {
    let mut out = format!("{} ({})", name, position.tag());
    if is_captain {
        out.push_str(" (C)");
    } else if is_vice_captain {
        out.push_str(" (VC)");
    }
    out
}

pub fn resolve_structured(picks: &[Pick], directory: &PlayerDirectory) -> PlayerSet {
    let mut out = PlayerSet::new();
    for pick in picks {
        if pick.player_id == 0 {
            continue;
        }
        if !directory.contains(pick.player_id) {
            debug!(player_id = pick.player_id, "pick not present in player directory");
        }
        out.insert(pick.player_id);
    }
    out
}

pub fn resolve_freetext(slots: &[Option<String>], directory: &PlayerDirectory) -> PlayerSet {
    let mut out = PlayerSet::new();
    for raw in slots.iter().flatten() {
        match resolve_slot(raw, directory) {
            Some(id) => {
                out.insert(id);
            }
            None => debug!(slot = raw.as_str(), "unresolved creator slot"),
        }
    }
    out
}

pub fn resolve(squad: &RawSquad, directory: &PlayerDirectory) -> PlayerSet {
    match squad {
        RawSquad::Structured(picks) => resolve_structured(picks, directory),
        RawSquad::FreeText(slots) => resolve_freetext(slots, directory),
    }
}

/// Exact normalized name first, then the prefix relation in either direction.
pub fn resolve_slot(raw: &str, directory: &PlayerDirectory) -> Option<u32> {
    let label = SlotLabel::parse(raw)?;
    let needle = normalize_name(&label.name);
    if needle.is_empty() {
        return None;
    }

    let exact = directory.ids_for_name(&needle);
    if !exact.is_empty() {
        return best_candidate(
            directory,
            exact.iter().map(|id| (needle.as_str(), *id)),
            label.position,
        );
    }

    let prefixed = directory
        .names()
        .filter(|(name, _)| name.starts_with(needle.as_str()) || needle.starts_with(name))
        .flat_map(|(name, ids)| ids.iter().map(move |id| (name, *id)));
    best_candidate(directory, prefixed, label.position)
}

// Order: position agreement, shortest name, then name, then id.
fn best_candidate<'a>(
    directory: &PlayerDirectory,
    candidates: impl Iterator<Item = (&'a str, u32)>,
    hint: Option<Position>,
) -> Option<u32> {
    candidates
        .min_by_key(|(name, id)| {
            let mismatch = match hint {
                Some(pos) => directory.get(*id).is_none_or(|r| r.position != pos),
                None => false,
            };
            (mismatch, name.chars().count(), *name, *id)
        })
        .map(|(_, id)| id)
}

pub fn parse_picks_json(raw: &str) -> Result<Vec<Pick>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid picks json")?;
    Ok(picks_from_value(&root))
}

pub fn picks_from_value(root: &Value) -> Vec<Pick> {
    let Some(arr) = root.get("picks").and_then(|x| x.as_array()) else {
        return Vec::new();
    };
    arr.iter().filter_map(parse_pick).collect()
}

fn parse_pick(v: &Value) -> Option<Pick> {
    let player_id = u32::try_from(v.get("element")?.as_u64()?).ok()?;
    let slot_index = v
        .get("position")
        .and_then(|x| x.as_u64())
        .and_then(|x| u8::try_from(x).ok())
        .unwrap_or(0);
    let multiplier = v
        .get("multiplier")
        .and_then(|x| x.as_u64())
        .and_then(|x| u8::try_from(x).ok())
        .unwrap_or(1);
    Some(Pick {
        player_id,
        slot_index,
        is_captain: v.get("is_captain").and_then(|x| x.as_bool()).unwrap_or(false),
        is_vice_captain: v
            .get("is_vice_captain")
            .and_then(|x| x.as_bool())
            .unwrap_or(false),
        multiplier,
    })
}
