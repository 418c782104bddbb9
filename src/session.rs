use std::collections::{BTreeMap, HashMap};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::domain::{Host, JobRef, MetricSample, OptionId};
use crate::error::VizError;
use crate::table::RunsTable;
use crate::viewer::Renderer;

/// Everything one user session accumulates: the temp directory tree, the
/// fetched metrics, the model index, and the viewer-format cache. Passed
/// explicitly to every component instead of living in ambient global state.
///
/// Submitting a different job URL resets the derived state, so nothing from
/// a previous job leaks into the next one.
pub struct Session {
    root: SessionRoot,
    host: Host,
    renderer: Renderer,
    job: Option<JobRef>,
    table: Option<RunsTable>,
    metrics: Option<Vec<MetricSample>>,
    model_index: BTreeMap<OptionId, Utf8PathBuf>,
    viewer_cache: HashMap<String, Utf8PathBuf>,
}

enum SessionRoot {
    // TempDir cleans up on drop
    Managed { _dir: TempDir, path: Utf8PathBuf },
    External(Utf8PathBuf),
}

impl SessionRoot {
    fn path(&self) -> &Utf8Path {
        match self {
            SessionRoot::Managed { path, .. } => path,
            SessionRoot::External(path) => path,
        }
    }
}

impl Session {
    pub fn new(host: Host) -> Result<Self, VizError> {
        let dir = tempfile::Builder::new()
            .prefix("parviz-session")
            .tempdir()
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|_| VizError::Filesystem("non-utf8 temp directory".to_string()))?;
        Ok(Self {
            root: SessionRoot::Managed { _dir: dir, path },
            host,
            renderer: Renderer::for_host(host),
            job: None,
            table: None,
            metrics: None,
            model_index: BTreeMap::new(),
            viewer_cache: HashMap::new(),
        })
    }

    /// Session rooted at a caller-owned directory. The directory is not
    /// removed on drop.
    pub fn with_root(root: Utf8PathBuf, host: Host) -> Self {
        Self {
            root: SessionRoot::External(root),
            host,
            renderer: Renderer::for_host(host),
            job: None,
            table: None,
            metrics: None,
            model_index: BTreeMap::new(),
            viewer_cache: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        self.root.path()
    }

    pub fn host(&self) -> Host {
        self.host
    }

    /// The rendering capability, fixed when the session was created.
    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    pub fn job(&self) -> Option<&JobRef> {
        self.job.as_ref()
    }

    pub fn eui_dir(&self) -> Utf8PathBuf {
        self.root.path().join("eui")
    }

    pub fn model_dir(&self) -> Utf8PathBuf {
        self.root.path().join("model")
    }

    pub fn viewer_dir(&self) -> Utf8PathBuf {
        self.root.path().join("viewer")
    }

    /// Binds the session to a job. Switching to a different job discards all
    /// derived state, including the viewer cache.
    pub fn bind_job(&mut self, job: JobRef) {
        if self.job.as_ref() != Some(&job) {
            self.table = None;
            self.metrics = None;
            self.model_index.clear();
            self.viewer_cache.clear();
        }
        self.job = Some(job);
    }

    pub fn table(&self) -> Option<&RunsTable> {
        self.table.as_ref()
    }

    pub fn set_table(&mut self, table: RunsTable) {
        self.table = Some(table);
    }

    pub fn metrics(&self) -> Option<&[MetricSample]> {
        self.metrics.as_deref()
    }

    pub fn set_metrics(&mut self, metrics: Vec<MetricSample>) {
        self.metrics = Some(metrics);
    }

    pub fn model_index(&self) -> &BTreeMap<OptionId, Utf8PathBuf> {
        &self.model_index
    }

    pub fn set_model_index(&mut self, index: BTreeMap<OptionId, Utf8PathBuf>) {
        self.model_index = index;
    }

    pub fn lookup_model(&self, option: &OptionId) -> Result<&Utf8Path, VizError> {
        self.model_index
            .get(option)
            .map(Utf8PathBuf::as_path)
            .ok_or_else(|| VizError::InvalidOptionNumber(option.as_str().to_string()))
    }

    pub fn cached_viewer_file(&self, stem: &str) -> Option<&Utf8Path> {
        self.viewer_cache.get(stem).map(Utf8PathBuf::as_path)
    }

    pub fn record_viewer_file(&mut self, stem: String, path: Utf8PathBuf) {
        self.viewer_cache.insert(stem, path);
    }

    /// Wipes then remakes a cache directory so a fresh population never sees
    /// stale artifacts from an earlier fetch.
    pub fn recreate_dir(path: &Utf8Path) -> Result<(), VizError> {
        if path.as_std_path().exists() {
            fs::remove_dir_all(path.as_std_path())
                .map_err(|err| VizError::Filesystem(err.to_string()))?;
        }
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| VizError::Filesystem(err.to_string()))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), VizError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| VizError::Filesystem(err.to_string()))
    }

    pub fn write_manifest(&self) -> Result<(), VizError> {
        let manifest = SessionManifest {
            job: self.job.clone(),
            host: self.host,
            run_count: self.metrics.as_ref().map(Vec::len).unwrap_or(0),
            created_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("parviz/{}", env!("CARGO_PKG_VERSION")),
        };
        let path = self.root.path().join("session.json");
        let content = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub job: Option<JobRef>,
    pub host: Host,
    pub run_count: usize,
    pub created_at: String,
    pub tool: String,
}
