use std::cmp::Ordering;
use std::future::Future;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{SnapshotSourceKind, Snapshots};
use crate::error::SnapshotError;
use crate::types::{parse_rows, DocumentKind, SnapshotDocuments, SnapshotEntry, SnapshotManifest};

pub const SNAPSHOT_DATE_FORMAT: &str = "%d-%m-%Y";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const BALANCES_FILE: &str = "balances.json";
pub const VOTING_POWER_FILE: &str = "voting_power.json";

pub fn parse_snapshot_date(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label.trim(), SNAPSHOT_DATE_FORMAT).ok()
}

/// Newest first; labels that are not `DD-MM-YYYY` go last, in label order.
pub fn newest_first(a: &str, b: &str) -> Ordering {
    match (parse_snapshot_date(a), parse_snapshot_date(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

pub fn sort_newest_first(entries: &mut [SnapshotEntry]) {
    entries.sort_by(|a, b| newest_first(&a.date, &b.date));
}

/// A key-value directory of historical snapshot pairs, addressed by date.
pub trait SnapshotSource {
    fn list_snapshots(
        &self,
    ) -> impl Future<Output = Result<Vec<SnapshotEntry>, SnapshotError>> + Send;

    fn load_snapshot(
        &self,
        date: &str,
    ) -> impl Future<Output = Result<SnapshotDocuments, SnapshotError>> + Send;
}

fn find_entry(entries: Vec<SnapshotEntry>, date: &str) -> Result<SnapshotEntry, SnapshotError> {
    entries
        .into_iter()
        .find(|e| e.date == date)
        .ok_or_else(|| SnapshotError::NotFound(date.to_string()))
}

fn parse_document(
    name: &str,
    body: &str,
    kind: DocumentKind,
) -> Result<Vec<crate::types::RawRecord>, SnapshotError> {
    parse_rows(body, kind).map_err(|source| SnapshotError::Malformed {
        name: name.to_string(),
        source,
    })
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read(&self, relative: &str) -> Result<String, SnapshotError> {
        let path = self.resolve(relative)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SnapshotError::Io { path, source })
    }

    /// Joins a manifest path onto the snapshot directory. Absolute paths and
    /// `..` components are refused so a manifest cannot point outside it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, SnapshotError> {
        let relative = Path::new(relative);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(SnapshotError::OutsideStore(relative.to_path_buf()));
        }
        Ok(self.dir.join(relative))
    }

    /// Without a manifest, every `<DD-MM-YYYY>/` folder holding both documents is a snapshot.
    async fn scan_dated_folders(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };
        while let Some(item) = dir.next_entry().await.map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })? {
            let name = item.file_name().to_string_lossy().to_string();
            if parse_snapshot_date(&name).is_none() {
                continue;
            }
            let folder = item.path();
            if is_file(&folder.join(BALANCES_FILE)).await
                && is_file(&folder.join(VOTING_POWER_FILE)).await
            {
                entries.push(SnapshotEntry {
                    balances: format!("{name}/{BALANCES_FILE}"),
                    voting_power: format!("{name}/{VOTING_POWER_FILE}"),
                    date: name,
                });
            }
        }
        Ok(entries)
    }
}

impl SnapshotSource for FsSnapshotStore {
    async fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        let mut entries = if is_file(&self.dir.join(MANIFEST_FILE)).await {
            let body = self.read(MANIFEST_FILE).await?;
            let manifest: SnapshotManifest =
                serde_json::from_str(&body).map_err(|e| SnapshotError::Malformed {
                    name: MANIFEST_FILE.to_string(),
                    source: e.into(),
                })?;
            manifest.snapshots
        } else {
            self.scan_dated_folders().await?
        };
        sort_newest_first(&mut entries);
        debug!(dir = %self.dir.display(), count = entries.len(), "listed snapshots");
        Ok(entries)
    }

    async fn load_snapshot(&self, date: &str) -> Result<SnapshotDocuments, SnapshotError> {
        let entry = find_entry(self.list_snapshots().await?, date)?;
        let balances = self.read(&entry.balances).await?;
        let voting_power = self.read(&entry.voting_power).await?;
        Ok(SnapshotDocuments {
            date: entry.date,
            balances: parse_document(&entry.balances, &balances, DocumentKind::Balances)?,
            voting_power: parse_document(
                &entry.voting_power,
                &voting_power,
                DocumentKind::VotingPower,
            )?,
        })
    }
}

/// Same layout as [`FsSnapshotStore`], served over HTTP. Requires a manifest.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SnapshotError::Http {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url, relative.trim_start_matches('/'))
    }

    async fn get(&self, relative: &str) -> Result<String, SnapshotError> {
        let url = self.url_for(relative);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| SnapshotError::Http {
                url: url.clone(),
                source,
            })?;
        response
            .text()
            .await
            .map_err(|source| SnapshotError::Http { url, source })
    }
}

impl SnapshotSource for HttpSnapshotSource {
    async fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        let body = self.get(MANIFEST_FILE).await?;
        let manifest: SnapshotManifest =
            serde_json::from_str(&body).map_err(|e| SnapshotError::Malformed {
                name: MANIFEST_FILE.to_string(),
                source: e.into(),
            })?;
        let mut entries = manifest.snapshots;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn load_snapshot(&self, date: &str) -> Result<SnapshotDocuments, SnapshotError> {
        let entry = find_entry(self.list_snapshots().await?, date)?;
        let (balances, voting_power) =
            tokio::try_join!(self.get(&entry.balances), self.get(&entry.voting_power))?;
        Ok(SnapshotDocuments {
            date: entry.date,
            balances: parse_document(&entry.balances, &balances, DocumentKind::Balances)?,
            voting_power: parse_document(
                &entry.voting_power,
                &voting_power,
                DocumentKind::VotingPower,
            )?,
        })
    }
}

/// The configured snapshot backend.
#[derive(Debug, Clone)]
pub enum AnySnapshotSource {
    Fs(FsSnapshotStore),
    Http(HttpSnapshotSource),
}

impl AnySnapshotSource {
    pub fn from_config(cfg: &Snapshots) -> Result<Self, SnapshotError> {
        match cfg.source {
            SnapshotSourceKind::Fs => Ok(Self::Fs(FsSnapshotStore::new(&cfg.dir))),
            SnapshotSourceKind::Http => {
                let base = cfg.base_url.as_deref().unwrap_or_default();
                Ok(Self::Http(HttpSnapshotSource::new(
                    base,
                    cfg.fetch_timeout(),
                )?))
            }
        }
    }
}

impl SnapshotSource for AnySnapshotSource {
    async fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        match self {
            Self::Fs(s) => s.list_snapshots().await,
            Self::Http(s) => s.list_snapshots().await,
        }
    }

    async fn load_snapshot(&self, date: &str) -> Result<SnapshotDocuments, SnapshotError> {
        match self {
            Self::Fs(s) => s.load_snapshot(date).await,
            Self::Http(s) => s.load_snapshot(date).await,
        }
    }
}
