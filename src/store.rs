use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::squad::{RawSquad, SQUAD_SLOTS};

const MIN_SEARCH_LEN: usize = 4;
const SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorTeamRow {
    pub team_id: u32,
    pub manager_name: String,
    pub current_gameweek: u32,
    pub slots: [Option<String>; SQUAD_SLOTS],
}

impl CreatorTeamRow {
    pub fn raw_squad(&self) -> RawSquad {
        RawSquad::FreeText(self.slots.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerRow {
    pub manager_id: u32,
    pub manager_name: String,
    pub team_name: String,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let player_columns = (1..=SQUAD_SLOTS)
        .map(|i| format!("player_{i} TEXT NULL,"))
        .collect::<Vec<_>>()
        .join("\n            ");
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS creator_teams (
            team_id INTEGER PRIMARY KEY,
            manager_name TEXT NOT NULL,
            current_gameweek INTEGER NOT NULL,
            {player_columns}
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS all_managers (
            manager_id INTEGER PRIMARY KEY,
            manager_name TEXT NOT NULL,
            team_name TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_managers_name ON all_managers(manager_name COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_managers_team ON all_managers(team_name COLLATE NOCASE);
        "#
    ))
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_creator_team(conn: &Connection, row: &CreatorTeamRow) -> Result<()> {
    let slot_names = slot_columns();
    let placeholders = (5..5 + SQUAD_SLOTS)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = slot_names
        .iter()
        .map(|col| format!("{col} = excluded.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO creator_teams(team_id, manager_name, current_gameweek, updated_at, {cols})
         VALUES (?1, ?2, ?3, ?4, {placeholders})
         ON CONFLICT(team_id) DO UPDATE SET
            manager_name = excluded.manager_name,
            current_gameweek = excluded.current_gameweek,
            updated_at = excluded.updated_at,
            {updates}",
        cols = slot_names.join(", "),
    );

    let updated_at = Utc::now().to_rfc3339();
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![
        &row.team_id,
        &row.manager_name,
        &row.current_gameweek,
        &updated_at,
    ];
    for slot in &row.slots {
        values.push(slot);
    }
    conn.execute(&sql, values.as_slice())
        .with_context(|| format!("upsert creator team {}", row.team_id))?;
    Ok(())
}

pub fn get_creator_teams(conn: &Connection) -> Result<Vec<CreatorTeamRow>> {
    let sql = format!(
        "SELECT team_id, manager_name, current_gameweek, {} FROM creator_teams
         ORDER BY manager_name ASC, team_id ASC",
        slot_columns().join(", ")
    );
    let mut stmt = conn.prepare(&sql).context("prepare creator teams query")?;
    let rows = stmt
        .query_map([], creator_row)
        .context("query creator teams")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode creator team row")?);
    }
    Ok(out)
}

pub fn get_creator_team(conn: &Connection, team_id: u32) -> Result<Option<CreatorTeamRow>> {
    let sql = format!(
        "SELECT team_id, manager_name, current_gameweek, {} FROM creator_teams WHERE team_id = ?1",
        slot_columns().join(", ")
    );
    conn.query_row(&sql, params![team_id], creator_row)
        .optional()
        .context("query creator team")
}

/// Team ids whose stored squad was captured for `gameweek`.
pub fn creator_team_ids_at(conn: &Connection, gameweek: u32) -> Result<HashSet<u32>> {
    let mut stmt = conn
        .prepare("SELECT team_id FROM creator_teams WHERE current_gameweek = ?1")
        .context("prepare creator gameweek query")?;
    let rows = stmt
        .query_map(params![gameweek], |row| row.get::<_, u32>(0))
        .context("query creator gameweek")?;

    let mut out = HashSet::new();
    for row in rows {
        out.insert(row.context("decode creator team id")?);
    }
    Ok(out)
}

pub fn upsert_manager(conn: &Connection, manager: &ManagerRow) -> Result<()> {
    conn.execute(
        "INSERT INTO all_managers(manager_id, manager_name, team_name) VALUES (?1, ?2, ?3)
         ON CONFLICT(manager_id) DO UPDATE SET
            manager_name = excluded.manager_name,
            team_name = excluded.team_name",
        params![manager.manager_id, manager.manager_name, manager.team_name],
    )
    .with_context(|| format!("upsert manager {}", manager.manager_id))?;
    Ok(())
}

pub fn get_manager_by_id(conn: &Connection, manager_id: u32) -> Result<Option<ManagerRow>> {
    conn.query_row(
        "SELECT manager_id, manager_name, team_name FROM all_managers WHERE manager_id = ?1",
        params![manager_id],
        manager_row,
    )
    .optional()
    .context("query manager by id")
}

/// Case-insensitive prefix search on manager or team name. Queries shorter than four
/// characters return nothing.
pub fn search_managers(conn: &Connection, query: &str) -> Result<Vec<ManagerRow>> {
    let q = query.trim();
    if q.chars().count() < MIN_SEARCH_LEN {
        return Ok(Vec::new());
    }
    let pattern = format!("{}%", escape_like(q));
    let mut stmt = conn
        .prepare(
            r#"
            SELECT DISTINCT manager_id, manager_name, team_name
            FROM all_managers
            WHERE manager_name LIKE ?1 ESCAPE '\' OR team_name LIKE ?1 ESCAPE '\'
            ORDER BY manager_name ASC, manager_id ASC
            LIMIT ?2
            "#,
        )
        .context("prepare manager search")?;
    let rows = stmt
        .query_map(params![pattern, SEARCH_LIMIT], manager_row)
        .context("query manager search")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode manager row")?);
    }
    Ok(out)
}

fn slot_columns() -> Vec<String> {
    (1..=SQUAD_SLOTS).map(|i| format!("player_{i}")).collect()
}

fn creator_row(row: &Row<'_>) -> rusqlite::Result<CreatorTeamRow> {
    let mut slots: [Option<String>; SQUAD_SLOTS] = Default::default();
    for (idx, slot) in slots.iter_mut().enumerate() {
        *slot = row.get(3 + idx)?;
    }
    Ok(CreatorTeamRow {
        team_id: row.get(0)?,
        manager_name: row.get(1)?,
        current_gameweek: row.get(2)?,
        slots,
    })
}

fn manager_row(row: &Row<'_>) -> rusqlite::Result<ManagerRow> {
    Ok(ManagerRow {
        manager_id: row.get(0)?,
        manager_name: row.get(1)?,
        team_name: row.get(2)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
