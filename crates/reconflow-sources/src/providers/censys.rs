//! Censys host search.

use super::common::{get_json, optional_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::{Result, SourceError};
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const PROVIDER: &str = "Censys";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://search.censys.io/api/v2";

/// Censys host search adapter. Needs both an API id and secret.
pub struct CensysAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl CensysAdapter {
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

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    ip: Option<String>,
    #[serde(default)]
    services: Vec<HitService>,
    location: Option<Value>,
    last_updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HitService {
    port: Option<u16>,
    transport_protocol: Option<String>,
    service_name: Option<String>,
}

/// A service exposed by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CensysService {
    /// Port number
    pub port: Option<u16>,
    /// Transport protocol, e.g. "TCP"
    pub protocol: Option<String>,
    /// Detected service, e.g. "HTTP"
    pub service_name: Option<String>,
}

/// A host matching the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CensysHost {
    /// Host address
    pub ip: Option<String>,
    /// Exposed services
    pub services: Vec<CensysService>,
    /// Geolocation as reported by Censys
    pub location: Value,
    /// When Censys last refreshed the host
    pub last_updated: Option<String>,
}

/// Normalized Censys result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensysResult {
    /// Domain that was searched
    pub domain: String,
    /// Matching hosts
    pub hosts: Vec<CensysHost>,
    /// Number of hosts
    pub count: usize,
}

#[async_trait]
impl SourceAdapter for CensysAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Censys
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_id = optional_setting(&*self.settings, keys::CENSYS_API_ID).await?;
        let api_secret = optional_setting(&*self.settings, keys::CENSYS_API_SECRET).await?;
        let (Some(api_id), Some(api_secret)) = (api_id, api_secret) else {
            return Err(SourceError::Configuration {
                provider: PROVIDER,
                credential: "API credentials",
            });
        };

        ctx.update(format!(
            "Querying Censys for hosts matching {}...",
            ctx.domain()
        ));
        let response: SearchResponse = get_json(
            PROVIDER,
            self.client
                .get(format!("{}/hosts/search", self.base_url))
                .query(&[("q", ctx.domain())])
                .basic_auth(api_id, Some(api_secret)),
        )
        .await?;

        let hosts: Vec<CensysHost> = response
            .result
            .map(|r| r.hits)
            .unwrap_or_default()
            .into_iter()
            .map(|hit| CensysHost {
                ip: hit.ip,
                services: hit
                    .services
                    .into_iter()
                    .map(|s| CensysService {
                        port: s.port,
                        protocol: s.transport_protocol,
                        service_name: s.service_name,
                    })
                    .collect(),
                location: hit
                    .location
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
                last_updated: hit.last_updated_at,
            })
            .collect();

        let result = CensysResult {
            domain: ctx.domain().to_string(),
            count: hosts.len(),
            hosts,
        };
        let summary = format!("Censys scan complete. Found {} hosts.", result.count);
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
