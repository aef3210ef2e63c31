//! HTTP intelligence provider implementations.

pub mod alienvault;
pub mod censys;
pub mod common;
pub mod dns_deep;
pub mod hackertarget;
pub mod hunter;
pub mod shodan;
pub mod virustotal;
pub mod vuln_intel;
pub mod whois;

pub use alienvault::AlienVaultAdapter;
pub use censys::CensysAdapter;
pub use dns_deep::DnsDeepAdapter;
pub use hackertarget::HackerTargetAdapter;
pub use hunter::HunterAdapter;
pub use shodan::ShodanAdapter;
pub use virustotal::VirusTotalAdapter;
pub use vuln_intel::VulnIntelAdapter;
pub use whois::WhoisAdapter;

use crate::adapter::SourceAdapter;
use reconflow_core::SettingsProvider;
use reqwest::Client;
use std::sync::Arc;

/// Every HTTP adapter against its production endpoint, sharing one client.
#[must_use]
pub fn http_adapters(
    client: &Client,
    settings: &Arc<dyn SettingsProvider>,
) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(ShodanAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(DnsDeepAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(VirusTotalAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(AlienVaultAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(CensysAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(VulnIntelAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(HackerTargetAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(HunterAdapter::new(client.clone(), Arc::clone(settings))),
        Arc::new(WhoisAdapter::new(client.clone(), Arc::clone(settings))),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::adapter::JobContext;
    use reconflow_core::{JobId, SourcesConfig, TargetId};
    use reconflow_events::{ProgressBus, ProgressPublisher, ScopeKey, Subscription};
    use reqwest::Client;
    use std::sync::Arc;

    pub fn client() -> Client {
        super::common::build_http_client(&SourcesConfig::default()).expect("client")
    }

    /// A job context plus a subscription to its job scope.
    pub fn context(domain: &str) -> (JobContext, Subscription) {
        let bus = Arc::new(ProgressBus::new(64));
        let job_id = JobId::generate();
        let sub = bus.subscribe(ScopeKey::Job(job_id.clone()));
        let publisher = ProgressPublisher::new(bus, job_id, TargetId::generate());
        (JobContext::new(domain, publisher), sub)
    }

    /// Drain every message published so far.
    pub fn messages(sub: &mut Subscription) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(event) = sub.try_recv() {
            if let Some(text) = event.as_progress().and_then(|e| e.payload.text()) {
                out.push(text.to_string());
            }
        }
        out
    }
}
