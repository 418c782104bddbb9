use std::fs;
use std::io::Write;
use std::path::Path;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;
use zip::write::{SimpleFileOptions, ZipWriter};

use parviz::api::{ArtifactInfo, JobApi, JobInfo, RunInfo};
use parviz::domain::{Host, JobRef};
use parviz::error::VizError;
use parviz::fetch::{extract_eui, fetch_metrics};
use parviz::output::JsonOutput;
use parviz::session::Session;
use parviz::table::RunsTable;

#[test]
fn extract_eui_reads_scalar() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("eui.json")).unwrap();
    fs::write(path.as_std_path(), br#"{"eui": 42.5}"#).unwrap();
    assert_eq!(extract_eui(&path).unwrap(), 42.5);
}

/// API whose run bundles are missing the metric file.
struct EmptyBundleApi;

impl JobApi for EmptyBundleApi {
    fn fetch_job(&self, _job: &JobRef) -> Result<JobInfo, VizError> {
        Ok(JobInfo {
            status: "completed".to_string(),
            recipe: "annual-energy-use".to_string(),
        })
    }

    fn list_runs(&self, _job: &JobRef) -> Result<Vec<RunInfo>, VizError> {
        Ok(vec![RunInfo {
            id: "run-1".to_string(),
        }])
    }

    fn runs_table(&self, _job: &JobRef) -> Result<RunsTable, VizError> {
        RunsTable::from_records(json!([]))
    }

    fn list_model_artifacts(&self, _job: &JobRef) -> Result<Vec<ArtifactInfo>, VizError> {
        Ok(Vec::new())
    }

    fn download_artifact(
        &self,
        _job: &JobRef,
        _key: &str,
        _destination: &Path,
    ) -> Result<(), VizError> {
        Ok(())
    }

    fn download_run_output(
        &self,
        _job: &JobRef,
        _run_id: &str,
        _output: &str,
        destination: &Path,
    ) -> Result<(), VizError> {
        let file =
            fs::File::create(destination).map_err(|err| VizError::Filesystem(err.to_string()))?;
        let mut writer = ZipWriter::new(file);
        writer
            .start_file("readme.txt", SimpleFileOptions::default())
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        writer
            .write_all(b"no metrics here")
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        writer
            .finish()
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[test]
fn missing_metric_file_fails_whole_fetch() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let session = Session::with_root(root, Host::Web);
    let job: JobRef = "https://host/acme/projects/tower/jobs/j1".parse().unwrap();

    let err = fetch_metrics(&EmptyBundleApi, &job, &session, &JsonOutput).unwrap_err();
    assert_matches!(err, VizError::MissingMetricFile { .. });
}
