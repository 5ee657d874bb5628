//! Disk-backed session records.
//!
//! Writes are atomic (write to a temp file, then rename over the target) so
//! a crash mid-write never leaves a half-written record. A record that
//! fails to parse or fails the required-field shape check is quarantined by
//! renaming it aside rather than deleted, so the raw bytes survive for
//! inspection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, warn};

use lesca_types::{session::sanitize_name, BrowserContext, LescaError, Result, SessionRecord};

/// Evaluated on the context's first page; the driver is expected to return
/// the storage object directly rather than a serialized string.
const SNAPSHOT_LOCAL_STORAGE_SCRIPT: &str = "Object.assign({}, window.localStorage)";
const SNAPSHOT_SESSION_STORAGE_SCRIPT: &str = "Object.assign({}, window.sessionStorage)";

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_name(name)))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LescaError::Corrupted { message: format!("cannot create session dir: {e}") })
    }

    /// Creates a bare record with no cookies or storage -- used to reserve
    /// a session's file before a browser context exists for it.
    pub async fn create(&self, name: &str) -> Result<SessionRecord> {
        self.ensure_dir().await?;
        let record = SessionRecord::new(name, lesca_utils::now_unix_millis());
        self.save(&record).await?;
        Ok(record)
    }

    /// Snapshots `context`'s cookies and best-effort page-zero storage into
    /// a fresh record, saving it atomically.
    pub async fn snapshot(
        &self,
        name: &str,
        context: &Arc<dyn BrowserContext>,
        description: Option<String>,
    ) -> Result<SessionRecord> {
        self.ensure_dir().await?;
        let now = lesca_utils::now_unix_millis();
        let cookies = context.cookies().await?;
        let local_storage = self.snapshot_storage(context, SNAPSHOT_LOCAL_STORAGE_SCRIPT, "localStorage").await;
        let session_storage =
            self.snapshot_storage(context, SNAPSHOT_SESSION_STORAGE_SCRIPT, "sessionStorage").await;
        let mut record = SessionRecord::new(name, now);
        record.cookies = cookies;
        record.local_storage = local_storage;
        record.session_storage = session_storage;
        record.metadata.description = description;
        self.save(&record).await?;
        Ok(record)
    }

    async fn snapshot_storage(
        &self,
        context: &Arc<dyn BrowserContext>,
        script: &str,
        kind: &str,
    ) -> HashMap<String, String> {
        match context.evaluate(script).await {
            Ok(Some(serde_json::Value::Object(map))) => map
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect(),
            Ok(_) => {
                debug!(kind, "no page to snapshot storage from");
                HashMap::new()
            }
            Err(e) => {
                warn!(kind, error = %e, "failed to snapshot storage");
                HashMap::new()
            }
        }
    }

    async fn inject_storage(&self, context: &Arc<dyn BrowserContext>, storage: &HashMap<String, String>, kind: &str) {
        if storage.is_empty() {
            return;
        }
        let entries: Result<Vec<String>> = storage
            .iter()
            .map(|(k, v)| {
                let k = serde_json::to_string(k)
                    .map_err(|e| LescaError::Corrupted { message: e.to_string() })?;
                let v = serde_json::to_string(v)
                    .map_err(|e| LescaError::Corrupted { message: e.to_string() })?;
                Ok(format!("{k}:{v}"))
            })
            .collect();
        let entries = match entries {
            Ok(e) => e,
            Err(e) => {
                warn!(kind, error = %e, "failed to encode storage for injection");
                return;
            }
        };
        let script = format!("Object.assign(window.{kind}, {{{}}})", entries.join(","));
        if let Err(e) = context.evaluate(&script).await {
            warn!(kind, error = %e, "failed to inject storage");
        }
    }

    /// Restores a previously saved record's cookies and storage into
    /// `context`. Returns whether a record was found at all.
    pub async fn restore_into(&self, name: &str, context: &Arc<dyn BrowserContext>) -> Result<bool> {
        let record = match self.get(name).await {
            Ok(r) => r,
            Err(LescaError::SessionNotFound { .. }) => {
                debug!(name, "no saved session to restore");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        context.add_cookies(record.cookies.clone()).await?;
        self.inject_storage(context, &record.local_storage, "localStorage").await;
        self.inject_storage(context, &record.session_storage, "sessionStorage").await;
        Ok(true)
    }

    pub async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.path_for(&record.name);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| LescaError::Corrupted { message: format!("cannot serialize session: {e}") })?;
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| LescaError::Corrupted { message: format!("cannot write session: {e}") })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| LescaError::Corrupted { message: format!("cannot finalize session write: {e}") })?;
        Ok(())
    }

    /// Reads a record without touching its `last_used_at`.
    pub async fn get(&self, name: &str) -> Result<SessionRecord> {
        self.read(&self.path_for(name)).await.ok_or_else(|| LescaError::SessionNotFound { name: name.to_string() })
    }

    /// Reads a record and bumps `last_used_at`, persisting the touch.
    pub async fn restore(&self, name: &str) -> Result<SessionRecord> {
        let mut record = self.get(name).await?;
        record.metadata.last_used_at = lesca_utils::now_unix_millis();
        self.save(&record).await?;
        Ok(record)
    }

    async fn read(&self, path: &Path) -> Option<SessionRecord> {
        let bytes = fs::read(path).await.ok()?;
        let value: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                self.quarantine(path, &e.to_string()).await;
                return None;
            }
        };
        if !SessionRecord::has_valid_shape(&value) {
            self.quarantine(path, "missing required fields").await;
            return None;
        }
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                self.quarantine(path, &e.to_string()).await;
                None
            }
        }
    }

    async fn quarantine(&self, path: &Path, reason: &str) {
        let dest = path.with_extension(format!("json.bak.{}", lesca_utils::now_unix_millis()));
        warn!(path = %path.display(), %reason, dest = %dest.display(), "quarantining corrupted session record");
        let _ = fs::rename(path, dest).await;
    }

    pub async fn exists(&self, name: &str) -> bool {
        fs::try_exists(self.path_for(name)).await.unwrap_or(false)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        fs::remove_file(&path)
            .await
            .map_err(|_| LescaError::SessionNotFound { name: name.to_string() })
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<SessionRecord> {
        let mut record = self.get(from).await?;
        record.name = to.to_string();
        self.save(&record).await?;
        self.delete(from).await?;
        Ok(record)
    }

    /// Every session filename stem on disk, whether or not its record
    /// parses -- used internally to drive the scans below.
    async fn list_names(&self) -> Result<Vec<String>> {
        self.ensure_dir().await?;
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| LescaError::Corrupted { message: format!("cannot list session dir: {e}") })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LescaError::Corrupted { message: format!("cannot read session dir entry: {e}") })?
        {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(".json") {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    /// Every non-expired session record on disk. Expired records are
    /// deleted as the scan encounters them.
    pub async fn list(&self) -> Result<Vec<SessionRecord>> {
        let now = lesca_utils::now_unix_millis();
        let mut records = Vec::new();
        for name in self.list_names().await? {
            if let Some(record) = self.read(&self.path_for(&name)).await {
                if record.is_expired(now) {
                    let _ = self.delete(&name).await;
                } else {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Same as [`Self::list`], newest-used first.
    pub async fn list_active(&self) -> Result<Vec<SessionRecord>> {
        let mut records = self.list().await?;
        records.sort_by_key(|r| std::cmp::Reverse(r.metadata.last_used_at));
        Ok(records)
    }

    pub async fn validate(&self, name: &str) -> bool {
        self.read(&self.path_for(name)).await.is_some()
    }

    /// Deletes every expired session record, returning the names removed.
    pub async fn cleanup_expired(&self) -> Result<Vec<String>> {
        let now = lesca_utils::now_unix_millis();
        let mut removed = Vec::new();
        for name in self.list_names().await? {
            if let Some(record) = self.read(&self.path_for(&name)).await {
                if record.is_expired(now) {
                    self.delete(&name).await?;
                    removed.push(name);
                }
            }
        }
        Ok(removed)
    }

    /// Merges `sources` into `target`, per the given strategy, and saves
    /// the result under `target`'s name. `target` need not already exist.
    pub async fn merge(
        &self,
        sources: &[&str],
        target: &str,
        strategy: crate::merge::MergeStrategy,
    ) -> Result<SessionRecord> {
        let base = match self.get(target).await {
            Ok(r) => r,
            Err(LescaError::SessionNotFound { .. }) => SessionRecord::new(target, lesca_utils::now_unix_millis()),
            Err(e) => return Err(e),
        };
        let mut incoming = Vec::with_capacity(sources.len());
        for name in sources {
            incoming.push(self.get(name).await?);
        }
        let merged = crate::merge::merge_records(base, incoming, strategy);
        self.save(&merged).await?;
        Ok(merged)
    }
}
