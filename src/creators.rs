use anyhow::Result;
use rusqlite::Connection;

use crate::store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub team_id: u32,
    pub name: Option<String>,
}

impl Creator {
    pub fn named(team_id: u32, name: &str) -> Self {
        Self {
            team_id,
            name: Some(name.to_string()),
        }
    }
}

/// Curated content-creator FPL entries.
pub const DEFAULT_CREATORS: &[(u32, &str)] = &[
    (44, "Lets Talk FPL"),
    (200, "FPL Focal"),
    (1320, "FPL Harry"),
    (1587, "FPL Raptor"),
    (14501, "FPL Pickle"),
    (16267, "FPL Mate"),
    (6586, "Ben Crellin"),
    (441, "Az Phillips"),
    (1924811, "Kelly Somers"),
    (1514450, "Julien Laurens"),
    (260, "Sam Bonfield"),
    (341, "Lee Bonfield"),
    (135, "Holly Shand"),
    (7577129, "Ian Irwing"),
    (16725, "FPL Sonaldo"),
    (3570, "Pras"),
    (17614, "Gianni Buttice"),
    (963, "BigMan Bakar"),
    (251, "Yelena"),
    (698910, "Stormzy"),
    (2253812, "Chunkz"),
];

pub fn default_roster() -> Vec<Creator> {
    DEFAULT_CREATORS
        .iter()
        .map(|(id, name)| Creator::named(*id, name))
        .collect()
}

/// Parses `"44:Lets Talk FPL,200"`. Entries without a usable id are dropped.
pub fn parse_roster(raw: &str) -> Vec<Creator> {
    raw.split(',')
        .filter_map(|entry| {
            let (id, name) = match entry.split_once(':') {
                Some((id, name)) => (id, Some(name.trim()).filter(|n| !n.is_empty())),
                None => (entry, None),
            };
            let team_id = id.trim().parse::<u32>().ok().filter(|id| *id != 0)?;
            Some(Creator {
                team_id,
                name: name.map(|n| n.to_string()),
            })
        })
        .collect()
}

/// Roster name first, then the manager directory, then a placeholder.
pub fn display_name(conn: &Connection, creator: &Creator) -> Result<String> {
    if let Some(name) = creator.name.as_ref() {
        return Ok(name.clone());
    }
    if let Some(manager) = store::get_manager_by_id(conn, creator.team_id)? {
        if !manager.manager_name.trim().is_empty() {
            return Ok(manager.manager_name);
        }
    }
    Ok(format!("Manager {}", creator.team_id))
}
