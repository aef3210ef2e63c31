//! Vulnerability intelligence from NIST NVD and the CISA KEV catalogue.
//!
//! NVD is searched by the full domain as a keyword. The KEV catalogue is
//! downloaded whole and filtered locally: the domain minus its final
//! extension, lowercased, is matched as a substring against each entry's
//! vendor, product and description. Each source may fail independently.

use super::common::{get_json, optional_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Production NVD CVE endpoint.
pub const DEFAULT_NVD_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
/// Production CISA KEV feed.
pub const DEFAULT_KEV_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

const NVD_RESULTS_PER_PAGE: &str = "20";

/// NVD plus CISA KEV adapter.
pub struct VulnIntelAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    nvd_url: String,
    kev_url: String,
}

impl VulnIntelAdapter {
    /// Create an adapter against the production feeds.
    #[must_use]
    pub fn new(client: Client, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            client,
            settings,
            nvd_url: DEFAULT_NVD_URL.to_string(),
            kev_url: DEFAULT_KEV_URL.to_string(),
        }
    }

    /// Point the adapter at different endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, nvd_url: impl Into<String>, kev_url: impl Into<String>) -> Self {
        self.nvd_url = nvd_url.into();
        self.kev_url = kev_url.into();
        self
    }

    async fn query_nvd(&self, domain: &str) -> Result<Vec<CveRecord>> {
        let mut request = self.client.get(self.nvd_url.as_str()).query(&[
            ("keywordSearch", domain),
            ("resultsPerPage", NVD_RESULTS_PER_PAGE),
        ]);
        if let Some(key) = optional_setting(&*self.settings, keys::NVD_API_KEY).await? {
            request = request.header("apiKey", key);
        }

        let response: NvdResponse = get_json("NVD", request).await?;
        Ok(response
            .vulnerabilities
            .into_iter()
            .map(|item| CveRecord::from(item.cve))
            .collect())
    }

    async fn query_kev(&self, domain: &str) -> Result<Vec<KevRecord>> {
        let catalogue: KevCatalogue = get_json("CISA KEV", self.client.get(self.kev_url.as_str())).await?;
        let keyword = domain_keyword(domain);

        Ok(catalogue
            .vulnerabilities
            .into_iter()
            .filter(|entry| entry.haystack().contains(&keyword))
            .map(KevRecord::from)
            .collect())
    }
}

/// Strip the final `.ext` and lowercase, e.g. "Acme.example.com" -> "acme.example".
fn domain_keyword(domain: &str) -> String {
    static EXTENSION: OnceLock<Regex> = OnceLock::new();
    let re = EXTENSION.get_or_init(|| Regex::new(r"\.\w+$").expect("valid regex"));
    re.replace(domain, "").to_lowercase()
}

#[derive(Debug, Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdItem>,
}

#[derive(Debug, Deserialize)]
struct NvdItem {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    id: String,
    published: Option<String>,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: NvdMetrics,
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NvdMetrics {
    #[serde(default)]
    cvss_metric_v31: Vec<CvssMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssMetric {
    cvss_data: CvssData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssData {
    base_severity: Option<String>,
    base_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct KevCatalogue {
    #[serde(default)]
    vulnerabilities: Vec<KevEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KevEntry {
    #[serde(rename = "cveID")]
    cve_id: String,
    #[serde(default)]
    vendor_project: String,
    #[serde(default)]
    product: String,
    #[serde(default)]
    short_description: String,
    date_added: Option<String>,
    due_date: Option<String>,
}

impl KevEntry {
    fn haystack(&self) -> String {
        format!(
            "{} {} {}",
            self.vendor_project, self.product, self.short_description
        )
        .to_lowercase()
    }
}

/// A CVE returned by the NVD keyword search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveRecord {
    /// CVE identifier
    pub id: String,
    /// English description
    pub description: String,
    /// CVSS v3.1 base severity, or "UNKNOWN"
    pub severity: String,
    /// CVSS v3.1 base score
    pub score: Option<f64>,
    /// Publication date
    pub published: Option<String>,
}

impl From<NvdCve> for CveRecord {
    fn from(cve: NvdCve) -> Self {
        let cvss = cve.metrics.cvss_metric_v31.first().map(|m| &m.cvss_data);
        Self {
            description: cve
                .descriptions
                .iter()
                .find(|d| d.lang == "en")
                .map(|d| d.value.clone())
                .unwrap_or_default(),
            severity: cvss
                .and_then(|c| c.base_severity.clone())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            score: cvss.and_then(|c| c.base_score),
            published: cve.published,
            id: cve.id,
        }
    }
}

/// A known-exploited vulnerability relevant to the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevRecord {
    /// CVE identifier
    pub cve_id: String,
    /// Vendor or project
    pub vendor: String,
    /// Affected product
    pub product: String,
    /// Short description
    pub description: String,
    /// When CISA added the entry
    pub date_added: Option<String>,
    /// Remediation due date for federal agencies
    pub due_date: Option<String>,
}

impl From<KevEntry> for KevRecord {
    fn from(entry: KevEntry) -> Self {
        Self {
            cve_id: entry.cve_id,
            vendor: entry.vendor_project,
            product: entry.product,
            description: entry.short_description,
            date_added: entry.date_added,
            due_date: entry.due_date,
        }
    }
}

/// Normalized vulnerability intelligence result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnIntelResult {
    /// Domain that was searched
    pub domain: String,
    /// CVEs from NVD
    pub nvd_cves: Vec<CveRecord>,
    /// Matching KEV entries
    pub cisa_kev: Vec<KevRecord>,
    /// Number of CVEs
    pub total_cves: usize,
    /// Number of KEV entries
    pub total_kev: usize,
}

#[async_trait]
impl SourceAdapter for VulnIntelAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::VulnIntel
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let domain = ctx.domain();

        ctx.update(format!(
            "Querying NIST NVD for vulnerabilities related to {domain}..."
        ));
        let nvd_cves = match self.query_nvd(domain).await {
            Ok(cves) => {
                ctx.update(format!("NVD returned {} CVEs.", cves.len()));
                cves
            }
            Err(e) => {
                tracing::warn!(job_id = %ctx.job_id(), error = %e, "NVD query failed");
                ctx.update(format!("NVD query failed: {e}"));
                Vec::new()
            }
        };

        ctx.update("Fetching CISA Known Exploited Vulnerabilities catalog...");
        let cisa_kev = match self.query_kev(domain).await {
            Ok(entries) => {
                ctx.update(format!("CISA KEV: {} relevant entries found.", entries.len()));
                entries
            }
            Err(e) => {
                tracing::warn!(job_id = %ctx.job_id(), error = %e, "CISA KEV fetch failed");
                ctx.update(format!("CISA KEV fetch failed: {e}"));
                Vec::new()
            }
        };

        let result = VulnIntelResult {
            domain: domain.to_string(),
            total_cves: nvd_cves.len(),
            total_kev: cisa_kev.len(),
            nvd_cves,
            cisa_kev,
        };
        let summary = format!(
            "Vulnerability intelligence complete. {} CVEs, {} KEV entries.",
            result.total_cves, result.total_kev
        );
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::{client, context, messages};
    use reconflow_core::StaticSettings;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, settings: StaticSettings) -> VulnIntelAdapter {
        VulnIntelAdapter::new(client(), Arc::new(settings))
            .with_endpoints(format!("{}/nvd", server.uri()), format!("{}/kev.json", server.uri()))
    }

    fn kev_feed() -> serde_json::Value {
        json!({
            "vulnerabilities": [
                {
                    "cveID": "CVE-2023-0001",
                    "vendorProject": "Acme",
                    "product": "Gateway",
                    "shortDescription": "Auth bypass",
                    "dateAdded": "2023-02-01",
                    "dueDate": "2023-02-22"
                },
                {
                    "cveID": "CVE-2023-0002",
                    "vendorProject": "Other",
                    "product": "Thing",
                    "shortDescription": "Unrelated"
                }
            ]
        })
    }

    #[test]
    fn test_domain_keyword() {
        assert_eq!(domain_keyword("Acme.com"), "acme");
        assert_eq!(domain_keyword("portal.acme.io"), "portal.acme");
        assert_eq!(domain_keyword("localhost"), "localhost");
    }

    #[tokio::test]
    async fn test_combines_nvd_and_filtered_kev() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nvd"))
            .and(query_param("keywordSearch", "acme.com"))
            .and(query_param("resultsPerPage", "20"))
            .and(header("apiKey", "nvd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "vulnerabilities": [{
                    "cve": {
                        "id": "CVE-2024-1111",
                        "published": "2024-01-02T00:00:00",
                        "descriptions": [
                            { "lang": "es", "value": "hola" },
                            { "lang": "en", "value": "hello" }
                        ],
                        "metrics": {
                            "cvssMetricV31": [
                                { "cvssData": { "baseSeverity": "HIGH", "baseScore": 8.1 } }
                            ]
                        }
                    }
                }, {
                    "cve": { "id": "CVE-2024-2222" }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kev.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(kev_feed()))
            .mount(&server)
            .await;

        let (ctx, _sub) = context("acme.com");
        let outcome = adapter(&server, StaticSettings::new().with(keys::NVD_API_KEY, "nvd"))
            .run(&ctx)
            .await
            .expect("scan");

        let result = &outcome.result;
        assert_eq!(result["totalCves"], 2);
        assert_eq!(result["nvdCves"][0]["description"], "hello");
        assert_eq!(result["nvdCves"][0]["severity"], "HIGH");
        assert_eq!(result["nvdCves"][0]["score"], 8.1);
        assert_eq!(result["nvdCves"][1]["severity"], "UNKNOWN");
        assert_eq!(result["nvdCves"][1]["score"], json!(null));
        assert_eq!(result["totalKev"], 1);
        assert_eq!(result["cisaKev"][0]["cveId"], "CVE-2023-0001");
        assert_eq!(result["cisaKev"][0]["vendor"], "Acme");
    }

    #[tokio::test]
    async fn test_nvd_failure_still_completes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nvd"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kev.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(kev_feed()))
            .mount(&server)
            .await;

        let (ctx, mut sub) = context("acme.com");
        let outcome = adapter(&server, StaticSettings::new())
            .run(&ctx)
            .await
            .expect("partial result");

        assert_eq!(outcome.result["totalCves"], 0);
        assert_eq!(outcome.result["totalKev"], 1);
        assert!(messages(&mut sub)
            .iter()
            .any(|m| m == "NVD query failed: NVD API error: 403 Forbidden"));
    }
}
