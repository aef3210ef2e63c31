//! Shared types used across reconflow.
//!
//! This module defines the identifiers, the scan catalogue and the job state
//! machine. Wire names (the strings stored in the job table and accepted from
//! callers) are fixed here and nowhere else.

use crate::error::ReconflowError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for job identifiers.
///
/// Job IDs are UUID v4 strings generated once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new random `JobId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse a `JobId` from a caller-supplied string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, ReconflowError> {
        let id = id.into();
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(ReconflowError::Validation(format!(
                "invalid job ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }

    /// Wrap a value read back from the job store without re-validating it.
    #[must_use]
    pub fn from_stored(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for target identifiers (owned by the record store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Create a new `TargetId`.
    ///
    /// # Errors
    /// Returns error if the ID is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, ReconflowError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ReconflowError::Validation(
                "invalid target ID: must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Create a new random `TargetId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of scan a job can run.
///
/// Three kinds run local scripts; every other kind queries one external
/// intelligence source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    /// Passive reconnaissance script
    #[serde(rename = "passive")]
    Passive,
    /// Active reconnaissance script
    #[serde(rename = "active")]
    Active,
    /// Quick vulnerability scan script
    #[serde(rename = "quick-scan")]
    QuickScan,
    /// Shodan host lookup
    #[serde(rename = "shodan")]
    Shodan,
    /// Certificate transparency + SecurityTrails subdomain harvesting
    #[serde(rename = "dns_deep")]
    DnsDeep,
    /// VirusTotal subdomain enumeration
    #[serde(rename = "virustotal")]
    VirusTotal,
    /// AlienVault OTX passive DNS
    #[serde(rename = "alienvault")]
    AlienVault,
    /// Censys host/service search
    #[serde(rename = "censys")]
    Censys,
    /// NVD keyword search + CISA KEV feed
    #[serde(rename = "vulnintel")]
    VulnIntel,
    /// HackerTarget DNS host search
    #[serde(rename = "hackertarget")]
    HackerTarget,
    /// Hunter.io email harvesting
    #[serde(rename = "hunter")]
    Hunter,
    /// WHOIS registration lookup
    #[serde(rename = "whois")]
    Whois,
}

impl ScanType {
    /// Every scan kind, in catalogue order.
    pub const ALL: [ScanType; 12] = [
        Self::Passive,
        Self::Active,
        Self::QuickScan,
        Self::Shodan,
        Self::DnsDeep,
        Self::VirusTotal,
        Self::AlienVault,
        Self::Censys,
        Self::VulnIntel,
        Self::HackerTarget,
        Self::Hunter,
        Self::Whois,
    ];

    /// Wire name stored in the job table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Active => "active",
            Self::QuickScan => "quick-scan",
            Self::Shodan => "shodan",
            Self::DnsDeep => "dns_deep",
            Self::VirusTotal => "virustotal",
            Self::AlienVault => "alienvault",
            Self::Censys => "censys",
            Self::VulnIntel => "vulnintel",
            Self::HackerTarget => "hackertarget",
            Self::Hunter => "hunter",
            Self::Whois => "whois",
        }
    }

    /// Script file run by this scan kind, if it is a script scan.
    #[must_use]
    pub fn script_name(&self) -> Option<&'static str> {
        match self {
            Self::Passive => Some("passive-recon.sh"),
            Self::Active => Some("active-recon.sh"),
            Self::QuickScan => Some("quick-vuln-scan.sh"),
            _ => None,
        }
    }

    /// Whether this scan kind runs a local script.
    #[must_use]
    pub fn is_script(&self) -> bool {
        self.script_name().is_some()
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = ReconflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        // "dns" is the route name the scan was historically started under
        if normalized == "dns" {
            return Ok(Self::DnsDeep);
        }
        Self::ALL
            .into_iter()
            .find(|scan| scan.as_str() == normalized)
            .ok_or_else(|| ReconflowError::Validation(format!("unknown scan type '{s}'")))
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// pending ──► running ──► completed
///                    └──► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet dispatched
    Pending,
    /// Adapter dispatched, no terminal event yet
    Running,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl JobStatus {
    /// Wire name stored in the job table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are permitted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    #[must_use]
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running) => true,
            (Self::Pending | Self::Running, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ReconflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ReconflowError::Validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// Validate a target domain before it is used to build filesystem paths or URLs.
///
/// # Errors
/// Returns error if the domain is empty, contains path separators or `..`,
/// or contains characters outside `[A-Za-z0-9.-]`.
pub fn validate_domain(domain: &str) -> Result<(), ReconflowError> {
    static DOMAIN_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DOMAIN_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]{0,251}[A-Za-z0-9])?$").expect("valid regex"));

    if domain.contains("..") || !regex.is_match(domain) {
        return Err(ReconflowError::Validation(format!(
            "invalid domain '{domain}': expected a hostname such as example.com"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generate_is_valid() {
        let id = JobId::generate();
        let parsed = JobId::new(id.as_str()).expect("generated id parses");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_job_id_invalid() {
        for invalid in ["", "not-a-uuid", "550e8400-e29b-11d4-a716-446655440000"] {
            assert!(JobId::new(invalid).is_err(), "{invalid} should be rejected");
        }
    }

    #[test]
    fn test_target_id_rejects_blank() {
        assert!(TargetId::new("  ").is_err());
        assert_eq!(TargetId::new("t-1").expect("valid").as_str(), "t-1");
    }

    #[test]
    fn test_scan_type_wire_names() {
        for scan in ScanType::ALL {
            let parsed: ScanType = scan.as_str().parse().expect("round trip");
            assert_eq!(parsed, scan);
            let json = serde_json::to_string(&scan).expect("serialize");
            assert_eq!(json, format!("\"{}\"", scan.as_str()));
        }
    }

    #[test]
    fn test_scan_type_aliases_and_errors() {
        assert_eq!("dns".parse::<ScanType>().expect("alias"), ScanType::DnsDeep);
        assert_eq!(" WHOIS ".parse::<ScanType>().expect("case"), ScanType::Whois);
        assert!("nmap".parse::<ScanType>().is_err());
    }

    #[test]
    fn test_script_scan_types() {
        assert_eq!(ScanType::Passive.script_name(), Some("passive-recon.sh"));
        assert_eq!(ScanType::QuickScan.script_name(), Some("quick-vuln-scan.sh"));
        assert!(ScanType::Active.is_script());
        assert!(!ScanType::Shodan.is_script());
    }

    #[test]
    fn test_status_transitions_are_forward_only() {
        use JobStatus::{Completed, Failed, Pending, Running};

        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Running));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Running, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("failed".parse::<JobStatus>().expect("parse"), JobStatus::Failed);
        assert!("Failed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub-1.example.co.uk").is_ok());

        for invalid in ["", "../etc", "a/b.com", "a\\b.com", "example..com", "-bad.com", "x y.com"] {
            assert!(validate_domain(invalid).is_err(), "{invalid} should be rejected");
        }
    }
}
