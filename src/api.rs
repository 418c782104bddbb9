use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::JobRef;
use crate::error::VizError;
use crate::table::RunsTable;

/// Job status and recipe metadata, the minimum needed to gate the pipeline.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub status: String,
    pub recipe: String,
}

#[derive(Debug, Clone)]
pub struct RunInfo {
    pub id: String,
}

/// One downloadable model file: display name plus the storage key to fetch
/// its bytes from.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub name: String,
    pub key: String,
}

pub trait JobApi: Send + Sync {
    fn fetch_job(&self, job: &JobRef) -> Result<JobInfo, VizError>;
    fn list_runs(&self, job: &JobRef) -> Result<Vec<RunInfo>, VizError>;
    fn runs_table(&self, job: &JobRef) -> Result<RunsTable, VizError>;
    fn list_model_artifacts(&self, job: &JobRef) -> Result<Vec<ArtifactInfo>, VizError>;
    fn download_artifact(
        &self,
        job: &JobRef,
        key: &str,
        destination: &Path,
    ) -> Result<(), VizError>;
    fn download_run_output(
        &self,
        job: &JobRef,
        run_id: &str,
        output: &str,
        destination: &Path,
    ) -> Result<(), VizError>;
}

#[derive(Clone)]
pub struct HttpJobApi {
    client: Client,
    base_url: String,
}

impl HttpJobApi {
    pub fn new() -> Result<Self, VizError> {
        Self::with_base_url("https://api.pollination.cloud".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, VizError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("parviz/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| VizError::ApiHttp(err.to_string()))?,
        );
        if let Ok(token) = std::env::var("PARVIZ_API_TOKEN") {
            if !token.trim().is_empty() {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                        .map_err(|err| VizError::ApiHttp(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| VizError::ApiHttp(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn job_url(&self, job: &JobRef) -> String {
        format!(
            "{}/projects/{}/{}/jobs/{}",
            self.base_url, job.owner, job.project, job.job_id
        )
    }

    fn get_json(&self, url: &str) -> Result<Value, VizError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| VizError::ApiHttp(err.to_string()))?;
        let response = handle_status(response)?;
        response
            .json()
            .map_err(|err| VizError::ApiHttp(err.to_string()))
    }

    fn get_to_file(&self, url: &str, destination: &Path) -> Result<(), VizError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| VizError::ApiHttp(err.to_string()))?;
        let mut response = handle_status(response)?;
        let mut file =
            File::create(destination).map_err(|err| VizError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| VizError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn list_artifacts(&self, job: &JobRef, path: &str) -> Result<Vec<ArtifactInfo>, VizError> {
        let url = format!("{}/artifacts", self.job_url(job));
        let response = self
            .client
            .get(&url)
            .query(&[("path", path)])
            .send()
            .map_err(|err| VizError::ApiHttp(err.to_string()))?;
        let response = handle_status(response)?;
        let payload: Value = response
            .json()
            .map_err(|err| VizError::ApiHttp(err.to_string()))?;
        let entries = payload
            .get("resources")
            .and_then(|value| value.as_array())
            .cloned()
            .unwrap_or_default();
        let mut artifacts = Vec::new();
        for entry in entries {
            let name = entry
                .get("file_name")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            let key = entry
                .get("key")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            artifacts.push(ArtifactInfo { name, key });
        }
        Ok(artifacts)
    }
}

impl JobApi for HttpJobApi {
    fn fetch_job(&self, job: &JobRef) -> Result<JobInfo, VizError> {
        let payload = self.get_json(&self.job_url(job))?;
        let status = payload
            .get("status")
            .and_then(|value| value.get("status"))
            .and_then(|value| value.as_str())
            .unwrap_or("unknown")
            .to_string();
        let recipe = payload
            .get("recipe")
            .and_then(|value| value.get("name"))
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(JobInfo { status, recipe })
    }

    fn list_runs(&self, job: &JobRef) -> Result<Vec<RunInfo>, VizError> {
        let url = format!("{}/runs", self.job_url(job));
        let payload = self.get_json(&url)?;
        let entries = payload
            .get("resources")
            .and_then(|value| value.as_array())
            .cloned()
            .unwrap_or_default();
        let runs = entries
            .iter()
            .filter_map(|entry| entry.get("id").and_then(|value| value.as_str()))
            .map(|id| RunInfo { id: id.to_string() })
            .collect();
        Ok(runs)
    }

    fn runs_table(&self, job: &JobRef) -> Result<RunsTable, VizError> {
        let url = format!("{}/runs-table", self.job_url(job));
        let payload = self.get_json(&url)?;
        RunsTable::from_records(payload)
    }

    fn list_model_artifacts(&self, job: &JobRef) -> Result<Vec<ArtifactInfo>, VizError> {
        // top level is one folder per run input; the model file is the first
        // child of each folder
        let folders = self.list_artifacts(job, "inputs/model")?;
        let mut models = Vec::new();
        for folder in folders {
            let children = self.list_artifacts(job, &folder.key)?;
            let child = children
                .into_iter()
                .next()
                .ok_or_else(|| VizError::EmptyArtifact(folder.name.clone()))?;
            models.push(child);
        }
        Ok(models)
    }

    fn download_artifact(
        &self,
        job: &JobRef,
        key: &str,
        destination: &Path,
    ) -> Result<(), VizError> {
        let url = format!("{}/artifacts/download?path={key}", self.job_url(job));
        self.get_to_file(&url, destination)
    }

    fn download_run_output(
        &self,
        job: &JobRef,
        run_id: &str,
        output: &str,
        destination: &Path,
    ) -> Result<(), VizError> {
        let url = format!(
            "{}/runs/{run_id}/outputs/{output}/download",
            self.job_url(job)
        );
        self.get_to_file(&url, destination)
    }
}

fn handle_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, VizError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "job API request failed".to_string());
    Err(VizError::ApiStatus { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_url_layout() {
        let api = HttpJobApi::with_base_url("https://api.example.com".to_string()).unwrap();
        let job = JobRef {
            owner: "devang".to_string(),
            project: "demo".to_string(),
            job_id: "3e6bef53".to_string(),
        };
        assert_eq!(
            api.job_url(&job),
            "https://api.example.com/projects/devang/demo/jobs/3e6bef53"
        );
    }
}
