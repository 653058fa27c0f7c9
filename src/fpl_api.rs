use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::http_cache::TtlCache;
use crate::http_client::http_client;
use crate::players::{self, parse_bootstrap_json};
use crate::squad::{parse_picks_json, Pick};
use crate::store::ManagerRow;

pub const FPL_API_BASE: &str = "https://fantasy.premierleague.com/api";
const MAX_ATTEMPTS: u32 = 3;

/// Read-only view of the upstream FPL data the app needs.
pub trait FplSource {
    fn bootstrap(&self) -> Result<Value>;

    fn entry_picks(&self, manager_id: u32, gameweek: u32) -> Result<Vec<Pick>>;

    fn fixtures(&self, gameweek: u32) -> Result<Vec<Fixture>>;

    fn current_event_id(&self) -> Result<u32> {
        Ok(players::current_event_id(&self.bootstrap()?))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fixture {
    pub id: u32,
    #[serde(default)]
    pub event: Option<u32>,
    pub team_h: u32,
    pub team_a: u32,
    #[serde(default)]
    pub kickoff_time: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub team_h_score: Option<u8>,
    #[serde(default)]
    pub team_a_score: Option<u8>,
}

impl Fixture {
    /// Opponent club id and whether `club_id` plays at home.
    pub fn opponent_of(&self, club_id: u32) -> Option<(u32, bool)> {
        if self.team_h == club_id {
            Some((self.team_a, true))
        } else if self.team_a == club_id {
            Some((self.team_h, false))
        } else {
            None
        }
    }
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let arr: Vec<Value> = serde_json::from_str(trimmed).context("invalid fixtures json")?;
    Ok(arr
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Fixture>(item).ok())
        .collect())
}

pub fn bootstrap_url() -> String {
    format!("{FPL_API_BASE}/bootstrap-static/")
}

pub fn entry_picks_url(manager_id: u32, gameweek: u32) -> String {
    format!("{FPL_API_BASE}/entry/{manager_id}/event/{gameweek}/picks/")
}

pub fn fixtures_url(gameweek: u32) -> String {
    format!("{FPL_API_BASE}/fixtures/?event={gameweek}")
}

/// Overall classic league; every entry is a member.
pub const OVERALL_LEAGUE_ID: u32 = 314;

pub fn standings_url(league_id: u32, page: u32) -> String {
    format!("{FPL_API_BASE}/leagues-classic/{league_id}/standings/?page_standings={page}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingsPage {
    pub managers: Vec<ManagerRow>,
    pub has_next: bool,
}

/// Incomplete standings rows (missing id, manager or team name) are skipped.
pub fn parse_standings_json(raw: &str) -> Result<StandingsPage> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(StandingsPage::default());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid standings json")?;
    let standings = root.get("standings").unwrap_or(&Value::Null);
    let managers = standings
        .get("results")
        .and_then(|x| x.as_array())
        .map(|arr| arr.iter().filter_map(parse_standings_row).collect())
        .unwrap_or_default();
    let has_next = standings
        .get("has_next")
        .and_then(|x| x.as_bool())
        .unwrap_or(false);
    Ok(StandingsPage { managers, has_next })
}

fn parse_standings_row(v: &Value) -> Option<ManagerRow> {
    // `entry` is the FPL team id; `id` is the standings row id.
    let manager_id = v
        .get("entry")
        .or_else(|| v.get("id"))
        .and_then(|x| x.as_u64())
        .and_then(|x| u32::try_from(x).ok())
        .filter(|id| *id != 0)?;
    let manager_name = v.get("player_name")?.as_str()?.trim();
    let team_name = v.get("entry_name")?.as_str()?.trim();
    if manager_name.is_empty() || team_name.is_empty() {
        return None;
    }
    Some(ManagerRow {
        manager_id,
        manager_name: manager_name.to_string(),
        team_name: team_name.to_string(),
    })
}

/// Live client. Responses go through a caller-owned [`TtlCache`].
pub struct FplClient {
    client: &'static Client,
    cache: TtlCache,
    bootstrap_ttl: Duration,
    picks_ttl: Duration,
    fixtures_ttl: Duration,
    event_ttl: Duration,
}

impl FplClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client(Some(cfg.http_timeout))?,
            cache: TtlCache::new(),
            bootstrap_ttl: cfg.bootstrap_ttl,
            picks_ttl: cfg.picks_ttl,
            fixtures_ttl: cfg.fixtures_ttl,
            event_ttl: cfg.event_ttl,
        })
    }

    /// Standings pages are bulk-imported once, so they bypass the cache.
    pub fn standings_page(&self, league_id: u32, page: u32) -> Result<StandingsPage> {
        let body = get_with_retry(self.client, &standings_url(league_id, page))
            .with_context(|| format!("failed to fetch standings page {page}"))?;
        parse_standings_json(&body)
    }

    fn get_cached(&self, url: &str, ttl: Duration) -> Result<String> {
        self.cache
            .get_or_fetch(url, ttl, || get_with_retry(self.client, url))
    }

    fn fetch_bootstrap(&self) -> Result<String> {
        get_with_retry(self.client, &bootstrap_url())
    }
}

const CURRENT_EVENT_KEY: &str = "current_event";

fn cached_bootstrap<F>(cache: &TtlCache, ttl: Duration, fetch: F) -> Result<Value>
where
    F: FnOnce() -> Result<String>,
{
    let body = cache
        .get_or_fetch(&bootstrap_url(), ttl, fetch)
        .context("failed to fetch bootstrap data")?;
    parse_bootstrap_json(&body)
}

// Only the parsed id is cached under its own key; the payload is shared with
// `bootstrap()`, so a cold comparison downloads it once.
fn cached_event_id<F>(
    cache: &TtlCache,
    event_ttl: Duration,
    bootstrap_ttl: Duration,
    fetch: F,
) -> Result<u32>
where
    F: FnOnce() -> Result<String>,
{
    let body = cache.get_or_fetch(CURRENT_EVENT_KEY, event_ttl, || {
        let bootstrap = cached_bootstrap(cache, bootstrap_ttl, fetch)?;
        Ok(players::current_event_id(&bootstrap).to_string())
    })?;
    body.parse::<u32>().context("invalid cached event id")
}

impl FplSource for FplClient {
    fn bootstrap(&self) -> Result<Value> {
        cached_bootstrap(&self.cache, self.bootstrap_ttl, || self.fetch_bootstrap())
    }

    fn entry_picks(&self, manager_id: u32, gameweek: u32) -> Result<Vec<Pick>> {
        let body = self
            .get_cached(&entry_picks_url(manager_id, gameweek), self.picks_ttl)
            .with_context(|| format!("failed to fetch picks for manager {manager_id}"))?;
        parse_picks_json(&body)
    }

    fn fixtures(&self, gameweek: u32) -> Result<Vec<Fixture>> {
        let body = self
            .get_cached(&fixtures_url(gameweek), self.fixtures_ttl)
            .with_context(|| format!("failed to fetch fixtures for GW {gameweek}"))?;
        parse_fixtures_json(&body)
    }

    fn current_event_id(&self) -> Result<u32> {
        cached_event_id(&self.cache, self.event_ttl, self.bootstrap_ttl, || {
            self.fetch_bootstrap()
        })
    }
}

pub fn should_retry(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// 1s, 2s, 4s, ... before attempt `attempt` (zero-based; the first attempt never waits).
pub fn backoff_delay(attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(1u64 << (attempt - 1).min(6))
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Transport errors, unreadable bodies, 5xx and 429.
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

fn get_with_retry(client: &Client, url: &str) -> Result<String> {
    retry_with_backoff(url, MAX_ATTEMPTS, backoff_delay, || fetch_once(client, url))
}

fn fetch_once(client: &Client, url: &str) -> std::result::Result<String, AttemptError> {
    debug!(url, "GET");
    let resp = client
        .get(url)
        .send()
        .map_err(|err| AttemptError::Transient(anyhow::Error::new(err).context("request failed")))?;
    let status = resp.status();
    let body = resp.text().map_err(|err| {
        AttemptError::Transient(anyhow::Error::new(err).context("failed reading body"))
    })?;
    if status.is_success() {
        return Ok(body);
    }

    let snippet: String = body.chars().take(200).collect();
    let err = anyhow!("http {}: {}", status, snippet);
    if should_retry(status) {
        Err(AttemptError::Transient(err))
    } else {
        Err(AttemptError::Fatal(err))
    }
}

/// Runs `attempt` up to `max_attempts` times, sleeping `delay(n)` before attempt `n`.
/// Fatal errors end the loop at once.
pub fn retry_with_backoff<F, D>(
    url: &str,
    max_attempts: u32,
    delay: D,
    mut attempt: F,
) -> Result<String>
where
    F: FnMut() -> std::result::Result<String, AttemptError>,
    D: Fn(u32) -> Duration,
{
    let mut last_err = None;
    for n in 0..max_attempts {
        if n > 0 {
            let wait = delay(n);
            warn!(url, attempt = n + 1, ?wait, "retrying request");
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        match attempt() {
            Ok(body) => return Ok(body),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient(err)) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("request failed")))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn retries_only_transient_statuses() {
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::FORBIDDEN));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::ZERO);
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let body = retry_with_backoff("u", 3, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(AttemptError::Transient(anyhow!("failed reading body")))
            } else {
                Ok("ok".to_string())
            }
        })
        .unwrap();
        assert_eq!(body, "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn fatal_failure_stops_and_transient_exhausts() {
        let calls = Cell::new(0);
        let err = retry_with_backoff("u", 3, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(AttemptError::Fatal(anyhow!("http 404")))
        })
        .unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(calls.get(), 1);

        calls.set(0);
        let err = retry_with_backoff("u", 3, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(AttemptError::Transient(anyhow!("http 503")))
        })
        .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn current_event_reuses_cached_bootstrap_body() {
        let cache = TtlCache::new();
        let ttl = Duration::from_secs(60);
        let downloads = Cell::new(0);
        let fetch = || {
            downloads.set(downloads.get() + 1);
            Ok::<_, anyhow::Error>(r#"{"events":[{"id":6},{"id":7,"is_current":true}]}"#.to_string())
        };

        let bootstrap = cached_bootstrap(&cache, ttl, fetch).unwrap();
        assert_eq!(players::current_event_id(&bootstrap), 7);
        assert_eq!(cached_event_id(&cache, ttl, ttl, fetch).unwrap(), 7);
        assert_eq!(cached_event_id(&cache, ttl, ttl, fetch).unwrap(), 7);
        assert_eq!(downloads.get(), 1);
    }

    #[test]
    fn cold_current_event_fills_the_bootstrap_entry() {
        let cache = TtlCache::new();
        let ttl = Duration::from_secs(60);
        let downloads = Cell::new(0);
        let fetch = || {
            downloads.set(downloads.get() + 1);
            Ok::<_, anyhow::Error>(r#"{"events":[{"id":8,"is_next":true}]}"#.to_string())
        };

        assert_eq!(cached_event_id(&cache, ttl, ttl, fetch).unwrap(), 8);
        cached_bootstrap(&cache, ttl, fetch).unwrap();
        assert_eq!(downloads.get(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entry_picks_url_shape() {
        assert_eq!(
            entry_picks_url(44, 7),
            "https://fantasy.premierleague.com/api/entry/44/event/7/picks/"
        );
    }
}
