use camino::Utf8Path;
use serde_json::Value;
use tracing::debug;

use crate::api::JobApi;
use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{JobRef, MetricSample};
use crate::error::VizError;
use crate::fs_util;
use crate::session::Session;

/// Named output every run of the required recipe produces.
pub const METRIC_OUTPUT: &str = "eui";
/// File inside the extracted output bundle holding the metric.
pub const METRIC_FILE: &str = "eui.json";
/// JSON key of the scalar inside [`METRIC_FILE`].
pub const METRIC_KEY: &str = "eui";

/// Reads the EUI scalar out of an extracted `eui.json`.
pub fn extract_eui(path: &Utf8Path) -> Result<f64, VizError> {
    let content = std::fs::read_to_string(path.as_std_path())
        .map_err(|err| VizError::Filesystem(format!("read {path}: {err}")))?;
    let payload: Value = serde_json::from_str(&content).map_err(|err| VizError::MetricParse {
        path: path.to_owned(),
        message: err.to_string(),
    })?;
    payload
        .get(METRIC_KEY)
        .and_then(|value| value.as_f64())
        .ok_or_else(|| VizError::MissingMetricKey {
            key: METRIC_KEY.to_string(),
            path: path.to_owned(),
        })
}

/// Downloads and unpacks each run's `eui` output bundle and extracts the
/// metric, one sample per run. The eui cache directory is wiped first, so a
/// fresh fetch never reads a stale bundle. Any missing file, missing key, or
/// corrupt archive fails the whole fetch; no partial results.
pub fn fetch_metrics(
    api: &dyn JobApi,
    job: &JobRef,
    session: &Session,
    sink: &dyn ProgressSink,
) -> Result<Vec<MetricSample>, VizError> {
    let eui_dir = session.eui_dir();
    Session::recreate_dir(&eui_dir)?;

    let runs = api.list_runs(job)?;
    sink.event(ProgressEvent::msg(format!(
        "phase=Fetch; downloading {} run bundles",
        runs.len()
    )));

    let mut samples = Vec::with_capacity(runs.len());
    for run in &runs {
        debug!(run_id = %run.id, "fetching output bundle");
        sink.event(ProgressEvent::msg(format!("api.request run={}", run.id)));

        let zip_path = eui_dir.join(format!("{}.zip", run.id));
        api.download_run_output(job, &run.id, METRIC_OUTPUT, zip_path.as_std_path())?;

        let run_dir = eui_dir.join(&run.id);
        Session::ensure_dir(&run_dir)?;
        fs_util::extract_zip(zip_path.as_std_path(), run_dir.as_std_path())?;

        let metric_file = run_dir.join(METRIC_FILE);
        if !metric_file.as_std_path().is_file() {
            return Err(VizError::MissingMetricFile {
                run_id: run.id.clone(),
                file: METRIC_FILE.to_string(),
            });
        }
        let eui = extract_eui(&metric_file)?;
        samples.push(MetricSample {
            run_id: run.id.clone(),
            eui,
        });
    }
    Ok(samples)
}

/// Downloads every run's input geometry file into the session model cache,
/// named after the artifact. The directory is wiped and remade first.
pub fn materialize_models(
    api: &dyn JobApi,
    job: &JobRef,
    session: &Session,
    sink: &dyn ProgressSink,
) -> Result<(), VizError> {
    let model_dir = session.model_dir();
    Session::recreate_dir(&model_dir)?;

    let artifacts = api.list_model_artifacts(job)?;
    sink.event(ProgressEvent::msg(format!(
        "phase=Fetch; downloading {} model files",
        artifacts.len()
    )));

    for artifact in &artifacts {
        debug!(name = %artifact.name, "downloading model");
        let destination = model_dir.join(&artifact.name);
        api.download_artifact(job, &artifact.key, destination.as_std_path())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn extract_eui_reads_key() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("eui.json")).unwrap();
        std::fs::write(path.as_std_path(), br#"{"eui": 42.5}"#).unwrap();
        assert_eq!(extract_eui(&path).unwrap(), 42.5);
    }

    #[test]
    fn extract_eui_missing_key() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("eui.json")).unwrap();
        std::fs::write(path.as_std_path(), br#"{"cooling": 7.0}"#).unwrap();
        let err = extract_eui(&path).unwrap_err();
        assert!(matches!(err, VizError::MissingMetricKey { .. }));
    }

    #[test]
    fn extract_eui_bad_json() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("eui.json")).unwrap();
        std::fs::write(path.as_std_path(), b"{").unwrap();
        let err = extract_eui(&path).unwrap_err();
        assert!(matches!(err, VizError::MetricParse { .. }));
    }
}
