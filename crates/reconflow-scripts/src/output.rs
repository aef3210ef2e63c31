//! Files scripts leave behind in a target's output directory.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One file in a target's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
}

impl OutputFile {
    async fn from_path(path: PathBuf) -> std::io::Result<Option<Self>> {
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Ok(None);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Self {
            name,
            size: metadata.len(),
            modified_at: metadata.modified().map_or_else(|_| Utc::now(), DateTime::from),
            path,
        }))
    }
}

/// List regular files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub async fn list_output_files(dir: &Path) -> Result<Vec<OutputFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        // Entries can vanish between the listing and the stat.
        match OutputFile::from_path(entry.path()).await {
            Ok(Some(file)) => files.push(file),
            Ok(None) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %entry.path().display(), "output file disappeared");
            }
            Err(e) => return Err(e.into()),
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Describe a single file if it exists.
pub(crate) async fn stat_file(path: &Path) -> Result<Option<OutputFile>> {
    match OutputFile::from_path(path.to_path_buf()).await {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A host that answered an HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveHost {
    /// Probed URL
    pub url: String,
    /// HTTP status, as printed by the probe
    pub status: Option<String>,
    /// Page title
    pub title: Option<String>,
}

/// Counts over the parsed results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconSummary {
    /// Number of subdomains
    pub total_subdomains: usize,
    /// Number of live hosts
    pub live_hosts: usize,
    /// When the results were read
    pub scan_date: DateTime<Utc>,
}

/// Subdomains and live hosts a recon script wrote for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconResults {
    /// One entry per line of `subdomains.txt`
    pub subdomains: Vec<String>,
    /// One entry per line of `live-subdomains.txt`
    pub live_hosts: Vec<LiveHost>,
    /// Counts
    pub summary: ReconSummary,
}

/// Subdomain list file name.
pub const SUBDOMAINS_FILE: &str = "subdomains.txt";
/// Live host list file name (tab-separated url, status, title).
pub const LIVE_SUBDOMAINS_FILE: &str = "live-subdomains.txt";

async fn read_optional(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter(|line| !line.trim().is_empty())
}

fn parse_live_host(line: &str) -> LiveHost {
    let mut fields = line.split('\t').map(str::trim);
    let url = fields.next().unwrap_or_default().to_string();
    let mut next = || {
        fields
            .next()
            .filter(|f| !f.is_empty())
            .map(str::to_string)
    };
    let status = next();
    let title = next();
    LiveHost { url, status, title }
}

/// Parse the result files in `dir`. Missing files count as empty.
pub async fn parse_recon_results(dir: &Path) -> Result<ReconResults> {
    let subdomains: Vec<String> = non_blank_lines(&read_optional(&dir.join(SUBDOMAINS_FILE)).await?)
        .map(|line| line.trim().to_string())
        .collect();
    let live_hosts: Vec<LiveHost> =
        non_blank_lines(&read_optional(&dir.join(LIVE_SUBDOMAINS_FILE)).await?)
            .map(parse_live_host)
            .collect();

    Ok(ReconResults {
        summary: ReconSummary {
            total_subdomains: subdomains.len(),
            live_hosts: live_hosts.len(),
            scan_date: Utc::now(),
        },
        subdomains,
        live_hosts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_output_files_missing_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let files = list_output_files(&dir.path().join("nope"))
            .await
            .expect("list");
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_list_output_files_skips_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        tokio::fs::write(dir.path().join("b.txt"), "bb").await.expect("write");
        tokio::fs::write(dir.path().join("a.txt"), "a").await.expect("write");
        tokio::fs::create_dir(dir.path().join("nested")).await.expect("mkdir");

        let files = list_output_files(dir.path()).await.expect("list");
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(files[1].size, 2);
        assert_eq!(files[0].path, dir.path().join("a.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_output_files_skips_vanished_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        tokio::fs::write(dir.path().join("kept.txt"), "x").await.expect("write");
        std::os::unix::fs::symlink(dir.path().join("gone.txt"), dir.path().join("dangling.txt"))
            .expect("symlink");

        let files = list_output_files(dir.path()).await.expect("list");
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["kept.txt"]);
    }

    #[tokio::test]
    async fn test_parse_recon_results() {
        let dir = tempfile::tempdir().expect("temp dir");
        tokio::fs::write(
            dir.path().join(SUBDOMAINS_FILE),
            "www.example.com\n\napi.example.com\n",
        )
        .await
        .expect("write");
        tokio::fs::write(
            dir.path().join(LIVE_SUBDOMAINS_FILE),
            "https://www.example.com\t200\tHome\nhttps://api.example.com\n",
        )
        .await
        .expect("write");

        let results = parse_recon_results(dir.path()).await.expect("parse");
        assert_eq!(results.subdomains, ["www.example.com", "api.example.com"]);
        assert_eq!(results.summary.total_subdomains, 2);
        assert_eq!(results.summary.live_hosts, 2);
        assert_eq!(results.live_hosts[0].status.as_deref(), Some("200"));
        assert_eq!(results.live_hosts[0].title.as_deref(), Some("Home"));
        assert_eq!(results.live_hosts[1].status, None);
    }

    #[tokio::test]
    async fn test_parse_recon_results_without_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let results = parse_recon_results(dir.path()).await.expect("parse");
        assert!(results.subdomains.is_empty());
        assert!(results.live_hosts.is_empty());
    }
}
