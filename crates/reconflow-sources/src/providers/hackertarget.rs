//! HackerTarget host search.
//!
//! The API answers in plain text, one `host,ip` pair per line. Quota and input
//! problems come back as a 200 whose body starts with "error".

use super::common::{get_text, optional_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROVIDER: &str = "HackerTarget";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.hackertarget.com";

/// HackerTarget host search adapter.
pub struct HackerTargetAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl HackerTargetAdapter {
    /// Create an adapter against the production API.
    #[must_use]
    pub fn new(client: Client, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            client,
            settings,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// A host name and the address it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host name
    pub hostname: String,
    /// Address, when present on the line
    pub ip: Option<String>,
}

/// Normalized HackerTarget result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HackerTargetResult {
    /// Domain that was searched
    pub domain: String,
    /// Hosts found
    pub hosts: Vec<HostRecord>,
    /// Number of hosts
    pub count: usize,
}

fn parse_hosts(body: &str) -> Vec<HostRecord> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("error"))
        .filter_map(|line| {
            let mut parts = line.splitn(2, ',');
            let hostname = parts.next().map(str::trim).filter(|h| !h.is_empty())?;
            let ip = parts
                .next()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string);
            Some(HostRecord {
                hostname: hostname.to_string(),
                ip,
            })
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for HackerTargetAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::HackerTarget
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key = optional_setting(&*self.settings, keys::HACKERTARGET_API_KEY).await?;

        let mut query = vec![("q", ctx.domain().to_string())];
        if let Some(key) = api_key {
            query.push(("apikey", key));
        }

        ctx.update(format!(
            "Querying HackerTarget for DNS records of {}...",
            ctx.domain()
        ));
        let body = get_text(
            PROVIDER,
            self.client
                .get(format!("{}/hostsearch/", self.base_url))
                .query(&query),
        )
        .await?;

        let hosts = parse_hosts(&body);
        let result = HackerTargetResult {
            domain: ctx.domain().to_string(),
            count: hosts.len(),
            hosts,
        };
        let summary = format!("HackerTarget complete. Found {} hosts.", result.count);
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
