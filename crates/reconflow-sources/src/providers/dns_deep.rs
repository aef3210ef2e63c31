//! Subdomain harvesting from certificate transparency and SecurityTrails.
//!
//! crt.sh needs no credential. SecurityTrails is queried only when a key is
//! configured. Either source may fail without failing the job; the result is
//! whatever the sources that answered returned, deduplicated and sorted.

use super::common::{get_json, optional_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Production crt.sh root.
pub const DEFAULT_CRTSH_URL: &str = "https://crt.sh";
/// Production SecurityTrails API root.
pub const DEFAULT_SECURITYTRAILS_URL: &str = "https://api.securitytrails.com/v1";

/// Certificate-transparency plus SecurityTrails subdomain adapter.
pub struct DnsDeepAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    crtsh_url: String,
    securitytrails_url: String,
}

impl DnsDeepAdapter {
    /// Create an adapter against the production endpoints.
    #[must_use]
    pub fn new(client: Client, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            client,
            settings,
            crtsh_url: DEFAULT_CRTSH_URL.to_string(),
            securitytrails_url: DEFAULT_SECURITYTRAILS_URL.to_string(),
        }
    }

    /// Point the adapter at different roots.
    #[must_use]
    pub fn with_base_urls(
        mut self,
        crtsh_url: impl Into<String>,
        securitytrails_url: impl Into<String>,
    ) -> Self {
        self.crtsh_url = crtsh_url.into();
        self.securitytrails_url = securitytrails_url.into();
        self
    }

    async fn query_crtsh(&self, domain: &str) -> Result<BTreeSet<String>> {
        let entries: Vec<CertificateEntry> = get_json(
            "crt.sh",
            self.client
                .get(format!("{}/", self.crtsh_url))
                .query(&[("q", format!("%.{domain}")), ("output", "json".to_string())]),
        )
        .await?;

        Ok(entries
            .iter()
            .flat_map(|entry| entry.name_value.lines())
            .filter_map(|name| normalize_name(name, domain))
            .collect())
    }

    async fn query_securitytrails(&self, domain: &str, api_key: &str) -> Result<Vec<String>> {
        let response: SubdomainsResponse = get_json(
            "SecurityTrails",
            self.client
                .get(format!("{}/domain/{domain}/subdomains", self.securitytrails_url))
                .header("APIKEY", api_key),
        )
        .await?;

        Ok(response
            .subdomains
            .iter()
            .map(|label| format!("{}.{domain}", label.trim().to_ascii_lowercase()))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CertificateEntry {
    #[serde(default)]
    name_value: String,
}

#[derive(Debug, Deserialize)]
struct SubdomainsResponse {
    #[serde(default)]
    subdomains: Vec<String>,
}

/// Normalized subdomain harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsDeepResult {
    /// Domain that was searched
    pub domain: String,
    /// Unique names, sorted
    pub subdomains: Vec<String>,
    /// Number of names
    pub count: usize,
}

/// Lowercase a certificate name, drop wildcards, keep it only if it belongs to `domain`.
fn normalize_name(name: &str, domain: &str) -> Option<String> {
    let name = name.trim().to_ascii_lowercase();
    let name = name.strip_prefix("*.").unwrap_or(&name);
    let belongs = name == domain
        || name
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'));
    belongs.then(|| name.to_string())
}

#[async_trait]
impl SourceAdapter for DnsDeepAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::DnsDeep
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let domain = ctx.domain().to_ascii_lowercase();
        let mut subdomains = BTreeSet::new();

        ctx.update(format!("Querying crt.sh for {domain}..."));
        match self.query_crtsh(&domain).await {
            Ok(names) => {
                subdomains.extend(names);
                ctx.update(format!("crt.sh found {} unique subdomains.", subdomains.len()));
            }
            Err(e) => {
                tracing::warn!(job_id = %ctx.job_id(), error = %e, "crt.sh lookup failed");
                ctx.update(format!("crt.sh failed: {e}"));
            }
        }

        match optional_setting(&*self.settings, keys::SECURITYTRAILS_API_KEY).await? {
            Some(api_key) => {
                ctx.update("Querying SecurityTrails...");
                match self.query_securitytrails(&domain, &api_key).await {
                    Ok(names) => {
                        subdomains.extend(names);
                        ctx.update(format!(
                            "SecurityTrails added more subdomains. Total: {}",
                            subdomains.len()
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %ctx.job_id(), error = %e, "SecurityTrails lookup failed");
                        ctx.update(format!("SecurityTrails failed: {e}"));
                    }
                }
            }
            None => ctx.update("Skipping SecurityTrails (no API key configured)"),
        }

        let result = DnsDeepResult {
            count: subdomains.len(),
            subdomains: subdomains.into_iter().collect(),
            domain,
        };
        let summary = format!("DNS enumeration complete. Found {} subdomains.", result.count);
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
