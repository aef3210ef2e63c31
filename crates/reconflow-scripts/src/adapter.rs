//! Script-backed source adapters.

use crate::runner::ScriptRunner;
use async_trait::async_trait;
use reconflow_core::ScanType;
use reconflow_sources::{JobContext, ScanOutcome, SourceAdapter};
use std::sync::Arc;

/// Runs the script registered for one script scan type.
pub struct ScriptAdapter {
    runner: Arc<ScriptRunner>,
    scan_type: ScanType,
    script: &'static str,
}

impl ScriptAdapter {
    /// Create the adapter for `scan_type`, or `None` if it is not a script scan.
    #[must_use]
    pub fn new(runner: Arc<ScriptRunner>, scan_type: ScanType) -> Option<Self> {
        let script = scan_type.script_name()?;
        Some(Self {
            runner,
            scan_type,
            script,
        })
    }

    /// One adapter per script scan type.
    #[must_use]
    pub fn all(runner: &Arc<ScriptRunner>) -> Vec<Arc<dyn SourceAdapter>> {
        ScanType::ALL
            .into_iter()
            .filter_map(|scan_type| Self::new(Arc::clone(runner), scan_type))
            .map(|adapter| Arc::new(adapter) as Arc<dyn SourceAdapter>)
            .collect()
    }

    /// Script file this adapter runs.
    #[must_use]
    pub fn script(&self) -> &'static str {
        self.script
    }
}

#[async_trait]
impl SourceAdapter for ScriptAdapter {
    fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    async fn run(&self, ctx: &JobContext) -> reconflow_sources::Result<ScanOutcome> {
        let output = self
            .runner
            .run(self.script, ctx.domain(), ctx.progress())
            .await?;
        ScanOutcome::from_result(&output)
    }
}
