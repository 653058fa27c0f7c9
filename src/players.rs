use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
    Unknown,
}

impl Position {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Position::Goalkeeper,
            2 => Position::Defender,
            3 => Position::Midfielder,
            4 => Position::Forward,
            _ => Position::Unknown,
        }
    }

    /// Parses the short tag used inside free-text slots, e.g. `MID` in `"Salah (MID)"`.
    pub fn from_tag(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GK" | "GKP" => Some(Position::Goalkeeper),
            "DEF" => Some(Position::Defender),
            "MID" => Some(Position::Midfielder),
            "FWD" => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Position::Goalkeeper => "GKP",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
            Position::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: u32,
    pub display_name: String,
    pub position: Position,
    pub club_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: u32,
    pub short_name: String,
    pub code: String,
}

/// Immutable snapshot of the player pool for one gameweek.
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    players: HashMap<u32, PlayerRecord>,
    by_name: BTreeMap<String, Vec<u32>>,
    clubs: HashMap<u32, Club>,
}

/// Lowercase + trim. Every name comparison in the resolver goes through this.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl PlayerDirectory {
    pub fn from_records(records: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let mut dir = PlayerDirectory::default();
        for record in records {
            dir.insert(record);
        }
        dir
    }

    fn insert(&mut self, record: PlayerRecord) {
        if let Some(previous) = self.players.get(&record.player_id) {
            let old_key = normalize_name(&previous.display_name);
            if let Some(ids) = self.by_name.get_mut(&old_key) {
                ids.retain(|id| *id != record.player_id);
                if ids.is_empty() {
                    self.by_name.remove(&old_key);
                }
            }
        }
        let key = normalize_name(&record.display_name);
        if !key.is_empty() {
            let ids = self.by_name.entry(key).or_default();
            ids.push(record.player_id);
            ids.sort_unstable();
        }
        self.players.insert(record.player_id, record);
    }

    pub fn get(&self, player_id: u32) -> Option<&PlayerRecord> {
        self.players.get(&player_id)
    }

    pub fn contains(&self, player_id: u32) -> bool {
        self.players.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Ids whose normalized display name equals `normalized` exactly, ascending.
    pub fn ids_for_name(&self, normalized: &str) -> &[u32] {
        self.by_name
            .get(normalized)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Name index in sorted order.
    pub fn names(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.by_name
            .iter()
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
    }

    pub fn club(&self, club_id: u32) -> Option<&Club> {
        self.clubs.get(&club_id)
    }

    /// Records sorted by player id.
    pub fn records(&self) -> Vec<&PlayerRecord> {
        let mut out: Vec<&PlayerRecord> = self.players.values().collect();
        out.sort_by_key(|r| r.player_id);
        out
    }
}

/// Builds the directory from a bootstrap payload. Malformed elements and teams are skipped.
pub fn build(bootstrap: &Value) -> PlayerDirectory {
    let mut dir = PlayerDirectory::default();

    if let Some(arr) = bootstrap.get("elements").and_then(|x| x.as_array()) {
        for item in arr {
            if let Some(record) = parse_element(item) {
                dir.insert(record);
            }
        }
    }

    if let Some(arr) = bootstrap.get("teams").and_then(|x| x.as_array()) {
        for item in arr {
            if let Some(club) = parse_club(item) {
                dir.clubs.insert(club.id, club);
            }
        }
    }

    dir
}

fn parse_element(v: &Value) -> Option<PlayerRecord> {
    let player_id = u32::try_from(v.get("id")?.as_u64()?).ok()?;
    if player_id == 0 {
        return None;
    }
    let display_name = v.get("web_name")?.as_str()?.trim().to_string();
    let position = v
        .get("element_type")
        .and_then(|x| x.as_i64())
        .map(Position::from_code)
        .unwrap_or(Position::Unknown);
    let club_id = v
        .get("team")
        .and_then(|x| x.as_u64())
        .and_then(|x| u32::try_from(x).ok())
        .unwrap_or(0);

    Some(PlayerRecord {
        player_id,
        display_name,
        position,
        club_id,
    })
}

fn parse_club(v: &Value) -> Option<Club> {
    let id = u32::try_from(v.get("id")?.as_u64()?).ok()?;
    let short_name = v
        .get("short_name")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();
    // FPL sends `code` as a number; older dumps stored it as a string.
    let code = match v.get("code") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    Some(Club {
        id,
        short_name,
        code,
    })
}

pub fn parse_bootstrap_json(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).context("invalid bootstrap json")
}

/// Current gameweek from the bootstrap `events` list; falls back to the next one, then to 1.
pub fn current_event_id(bootstrap: &Value) -> u32 {
    let Some(events) = bootstrap.get("events").and_then(|x| x.as_array()) else {
        return 1;
    };
    for flag in ["is_current", "is_next"] {
        let found = events.iter().find(|ev| {
            ev.get(flag)
                .and_then(|x| x.as_bool())
                .unwrap_or(false)
        });
        if let Some(id) = found
            .and_then(|ev| ev.get("id"))
            .and_then(|x| x.as_u64())
            .and_then(|x| u32::try_from(x).ok())
        {
            return id;
        }
    }
    1
}
