use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";
const FPL_REFERER: &str = "https://fantasy.premierleague.com/";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client. The timeout of the first caller wins.
pub fn http_client(timeout: Option<Duration>) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(REFERER, HeaderValue::from_static(FPL_REFERER));
        Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .default_headers(headers)
            .build()
            .context("failed to build http client")
    })
}
