use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::fpl_api::StandingsPage;
use crate::store;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub pages_fetched: u32,
    pub last_page: u32,
    pub managers_upserted: usize,
    pub has_more: bool,
    pub errors: Vec<String>,
}

/// Walks standings pages from `start_page`, upserting every manager into `all_managers`.
/// Stops after `max_pages`, when upstream reports no further page, or on the first
/// failed page.
pub fn import_managers<F>(
    conn: &mut Connection,
    start_page: u32,
    max_pages: u32,
    delay: Duration,
    mut fetch_page: F,
) -> Result<ImportSummary>
where
    F: FnMut(u32) -> Result<StandingsPage>,
{
    let mut summary = ImportSummary {
        has_more: true,
        ..ImportSummary::default()
    };
    let start_page = start_page.max(1);

    for page in start_page..start_page.saturating_add(max_pages) {
        if page > start_page && !delay.is_zero() {
            thread::sleep(delay);
        }
        let data = match fetch_page(page) {
            Ok(data) => data,
            Err(err) => {
                warn!(page, "standings fetch failed: {err:#}");
                summary.errors.push(format!("page {page}: {err:#}"));
                break;
            }
        };
        summary.pages_fetched += 1;
        summary.last_page = page;

        let tx = conn.transaction().context("begin manager import")?;
        for manager in &data.managers {
            store::upsert_manager(&tx, manager)?;
        }
        tx.commit().context("commit manager import")?;
        summary.managers_upserted += data.managers.len();
        info!(
            page,
            managers = data.managers.len(),
            total = summary.managers_upserted,
            "imported standings page"
        );

        if data.managers.is_empty() || !data.has_next {
            summary.has_more = false;
            break;
        }
    }

    Ok(summary)
}
