//! Scan type to adapter lookup.

use crate::error::{EngineError, Result};
use reconflow_core::{ScanType, SettingsProvider, SourcesConfig};
use reconflow_scripts::{ScriptAdapter, ScriptRunner};
use reconflow_sources::{build_http_client, http_adapters, SourceAdapter};
use std::collections::HashMap;
use std::sync::Arc;

/// Adapters indexed by the scan type they implement.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ScanType, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every production adapter: the HTTP providers sharing one client, and
    /// the script scans backed by `runner`.
    pub fn with_defaults(
        sources: &SourcesConfig,
        settings: &Arc<dyn SettingsProvider>,
        runner: &Arc<ScriptRunner>,
    ) -> Result<Self> {
        let client = build_http_client(sources)?;
        let mut registry = Self::new();
        for adapter in http_adapters(&client, settings)
            .into_iter()
            .chain(ScriptAdapter::all(runner))
        {
            registry.register(adapter);
        }
        tracing::debug!(count = registry.adapters.len(), "registered source adapters");
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for its scan type.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        let scan_type = adapter.scan_type();
        if self.adapters.insert(scan_type, adapter).is_some() {
            tracing::debug!(%scan_type, "replaced source adapter");
        }
        self
    }

    /// Look up the adapter for a scan type.
    pub fn get(&self, scan_type: ScanType) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&scan_type)
            .cloned()
            .ok_or(EngineError::UnsupportedScan(scan_type))
    }

    /// Registered scan types, in catalogue order.
    #[must_use]
    pub fn scan_types(&self) -> Vec<ScanType> {
        ScanType::ALL
            .into_iter()
            .filter(|scan_type| self.adapters.contains_key(scan_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::{ScriptsConfig, StaticSettings};

    #[test]
    fn test_defaults_cover_every_scan_type() {
        let settings: Arc<dyn SettingsProvider> = Arc::new(StaticSettings::new());
        let runner = Arc::new(ScriptRunner::new(ScriptsConfig::default()));
        let registry =
            AdapterRegistry::with_defaults(&SourcesConfig::default(), &settings, &runner)
                .expect("registry");

        assert_eq!(registry.scan_types(), ScanType::ALL);
        assert_eq!(
            registry.get(ScanType::Passive).expect("passive").scan_type(),
            ScanType::Passive
        );
    }

    #[test]
    fn test_empty_registry_rejects_lookup() {
        let err = AdapterRegistry::new()
            .get(ScanType::Whois)
            .err()
            .expect("unsupported");
        assert!(matches!(err, EngineError::UnsupportedScan(ScanType::Whois)));
        assert_eq!(err.to_string(), "No adapter registered for scan type 'whois'");
    }
}
