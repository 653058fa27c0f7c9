use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::creators::{default_roster, parse_roster, Creator};

const APP_DIR: &str = "fpl_cheat";
const DB_FILE: &str = "fpl_cheat.sqlite";
const DEFAULT_REFRESH_TZ: Tz = chrono_tz::Europe::London;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub top_n: usize,
    pub http_timeout: Duration,
    pub bootstrap_ttl: Duration,
    pub picks_ttl: Duration,
    pub event_ttl: Duration,
    pub fixtures_ttl: Duration,
    pub refresh_delay: Duration,
    /// Local hours in `refresh_tz` at which the scheduler refreshes creator squads.
    pub refresh_hours: Vec<u32>,
    pub refresh_tz: Tz,
    pub roster: Vec<Creator>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            top_n: 3,
            http_timeout: Duration::from_secs(10),
            bootstrap_ttl: Duration::from_secs(600),
            picks_ttl: Duration::from_secs(60),
            event_ttl: Duration::from_secs(120),
            fixtures_ttl: Duration::from_secs(300),
            refresh_delay: Duration::from_millis(500),
            refresh_hours: vec![0, 17],
            refresh_tz: DEFAULT_REFRESH_TZ,
            roster: default_roster(),
        }
    }
}

impl Config {
    /// Loads `.env.local` / `.env` if present, then reads overrides from the environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let defaults = Config::default();
        let db_path = env::var("FPL_DB_PATH")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.db_path);
        let refresh_hours = env::var("FPL_REFRESH_HOURS")
            .ok()
            .map(|val| parse_hours(&val))
            .filter(|hours| !hours.is_empty())
            .unwrap_or(defaults.refresh_hours);
        let refresh_tz = env::var("FPL_REFRESH_TZ")
            .ok()
            .and_then(|val| parse_tz(&val))
            .unwrap_or(defaults.refresh_tz);
        let roster = env::var("FPL_CREATORS")
            .ok()
            .map(|val| parse_roster(&val))
            .filter(|roster| !roster.is_empty())
            .unwrap_or(defaults.roster);

        Self {
            db_path,
            top_n: env_parse("FPL_TOP_N").unwrap_or(defaults.top_n).clamp(1, 20),
            http_timeout: Duration::from_secs(
                env_parse("FPL_HTTP_TIMEOUT_SECS").unwrap_or(10).max(2),
            ),
            bootstrap_ttl: secs_or("FPL_BOOTSTRAP_TTL_SECS", defaults.bootstrap_ttl),
            picks_ttl: secs_or("FPL_PICKS_TTL_SECS", defaults.picks_ttl),
            event_ttl: secs_or("FPL_EVENT_TTL_SECS", defaults.event_ttl),
            fixtures_ttl: secs_or("FPL_FIXTURES_TTL_SECS", defaults.fixtures_ttl),
            refresh_delay: env_parse("FPL_REFRESH_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.refresh_delay),
            refresh_hours,
            refresh_tz,
            roster,
        }
    }
}

/// `"0,17"` -> `[0, 17]`; out-of-range and junk entries are dropped.
pub fn parse_hours(raw: &str) -> Vec<u32> {
    let mut hours: Vec<u32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|h| *h < 24)
        .collect();
    hours.sort_unstable();
    hours.dedup();
    hours
}

/// IANA zone name such as `Europe/London`; unknown names give `None`.
pub fn parse_tz(raw: &str) -> Option<Tz> {
    raw.trim().parse::<Tz>().ok()
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn secs_or(key: &str, fallback: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}
