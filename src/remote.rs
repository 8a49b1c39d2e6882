// 🌐 Remote Catalog - fetch one set and its cards
// The engine only needs "give me this set and its cards". The Scryfall
// client below is blocking, so no async runtime is needed.

use crate::catalog::CanonicalCard;
use anyhow::Result;

/// One set as returned by a remote catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSet {
    pub code: String,
    pub name: String,
    pub cards: Vec<CanonicalCard>,
}

/// Remote catalog contract: fetch exactly one set, never its child sets
pub trait RemoteCatalog {
    fn fetch_set(&self, code: &str) -> Result<RemoteSet>;
}

/// Stand-in used when no remote catalog is configured
pub struct OfflineCatalog;

impl RemoteCatalog for OfflineCatalog {
    fn fetch_set(&self, code: &str) -> Result<RemoteSet> {
        anyhow::bail!("Remote catalog unavailable (offline), cannot fetch set {}", code)
    }
}

#[cfg(feature = "scryfall")]
pub use scryfall::ScryfallClient;

#[cfg(feature = "scryfall")]
mod scryfall {
    use super::{RemoteCatalog, RemoteSet};
    use crate::catalog::CanonicalCard;
    use crate::config::RemoteConfig;
    use anyhow::{anyhow, Context, Result};
    use serde::Deserialize;
    use std::time::Duration;
    use tracing::debug;

    #[derive(Debug, Deserialize)]
    struct SetResponse {
        code: String,
        name: String,
        search_uri: String,
    }

    #[derive(Debug, Deserialize)]
    struct CardPage {
        data: Vec<CardResponse>,
        #[serde(default)]
        has_more: bool,
        #[serde(default)]
        next_page: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct CardResponse {
        id: String,
        name: String,
        set: String,
        collector_number: String,
    }

    /// Scryfall API client (blocking).
    #[derive(Clone)]
    pub struct ScryfallClient {
        http: reqwest::blocking::Client,
        base_url: String,
    }

    impl ScryfallClient {
        pub fn new(config: &RemoteConfig) -> Result<Self> {
            let http = reqwest::blocking::Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .context("Failed to create HTTP client")?;

            Ok(Self {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
            })
        }

        fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
            let response = self
                .http
                .get(url)
                .header("Accept", "application/json")
                .send()
                .with_context(|| format!("Request to {} failed", url))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(anyhow!("HTTP {}: {}", status.as_u16(), body));
            }

            response
                .json::<T>()
                .with_context(|| format!("Failed to parse response from {}", url))
        }
    }

    impl RemoteCatalog for ScryfallClient {
        fn fetch_set(&self, code: &str) -> Result<RemoteSet> {
            let set: SetResponse = self.get_json(&format!("{}/sets/{}", self.base_url, code))?;
            let set_code = set.code.to_lowercase();

            let mut cards = Vec::new();
            let mut next = Some(set.search_uri.clone());

            while let Some(url) = next.take() {
                let page: CardPage = self.get_json(&url)?;
                debug!(set = %set_code, page_cards = page.data.len(), "fetched card page");

                // The search may surface printings from related sets; keep only this one
                cards.extend(
                    page.data
                        .into_iter()
                        .filter(|c| c.set.eq_ignore_ascii_case(&set_code))
                        .map(|c| CanonicalCard::new(c.id, c.name, c.set, c.collector_number)),
                );

                if page.has_more {
                    next = page.next_page;
                }
            }

            Ok(RemoteSet {
                code: set_code,
                name: set.name,
                cards,
            })
        }
    }
}
