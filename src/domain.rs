use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::VizError;

/// Recipe a job must run for its outputs to contain the `eui` bundle.
pub const REQUIRED_RECIPE: &str = "annual-energy-use";

/// Job URL offered by the interactive prompt when none is configured.
pub const DEFAULT_JOB_URL: &str =
    "https://app.pollination.cloud/devang/projects/demo/jobs/3e6bef53-179b-4fc4-aeed-03e49816e5e8";

/// Remote job handle parsed from a job URL of the form
/// `.../{owner}/projects/{project}/jobs/{job-id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub owner: String,
    pub project: String,
    pub job_id: String,
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.project, self.job_id)
    }
}

impl FromStr for JobRef {
    type Err = VizError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(VizError::MissingJobUrl);
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() < 5 {
            return Err(VizError::InvalidJobUrl(value.to_string()));
        }
        let job_id = segments[segments.len() - 1];
        let jobs_literal = segments[segments.len() - 2];
        let project = segments[segments.len() - 3];
        let projects_literal = segments[segments.len() - 4];
        let owner = segments[segments.len() - 5];
        if jobs_literal != "jobs" || projects_literal != "projects" {
            return Err(VizError::InvalidJobUrl(value.to_string()));
        }
        if job_id.is_empty() || project.is_empty() || owner.is_empty() {
            return Err(VizError::InvalidJobUrl(value.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            project: project.to_string(),
            job_id: job_id.to_string(),
        })
    }
}

/// Option identifier from the runs table. Kept as the raw cell text so that
/// numeric and string study designs both work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionId(String);

impl OptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OptionId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for OptionId {
    fn from(value: String) -> Self {
        Self(value.trim().to_string())
    }
}

/// One extracted metric, tagged with the run it came from so table rows can
/// be joined by id instead of by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub run_id: String,
    pub eui: f64,
}

/// Rendering environment, fixed once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Host {
    Web,
    Rhino,
}

impl Default for Host {
    fn default() -> Self {
        Host::Web
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Web => write!(f, "web"),
            Host::Rhino => write!(f, "rhino"),
        }
    }
}

impl FromStr for Host {
    type Err = VizError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "" | "web" => Ok(Host::Web),
            "rhino" => Ok(Host::Rhino),
            _ => Err(VizError::InvalidHost(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_job_url() {
        let job: JobRef =
            "https://app.pollination.cloud/devang/projects/demo/jobs/3e6bef53"
                .parse()
                .unwrap();
        assert_eq!(job.owner, "devang");
        assert_eq!(job.project, "demo");
        assert_eq!(job.job_id, "3e6bef53");
    }

    #[test]
    fn parse_job_url_trailing_slash() {
        let job: JobRef = "https://host/acme/projects/tower/jobs/abc123/"
            .parse()
            .unwrap();
        assert_eq!(job.job_id, "abc123");
    }

    #[test]
    fn parse_job_url_empty() {
        let err = "  ".parse::<JobRef>().unwrap_err();
        assert_matches!(err, VizError::MissingJobUrl);
    }

    #[test]
    fn parse_job_url_wrong_shape() {
        let err = "https://host/a/b/c/d/e".parse::<JobRef>().unwrap_err();
        assert_matches!(err, VizError::InvalidJobUrl(_));
    }

    #[test]
    fn parse_host_case_insensitive() {
        assert_eq!("Rhino".parse::<Host>().unwrap(), Host::Rhino);
        assert_eq!("WEB".parse::<Host>().unwrap(), Host::Web);
        assert_eq!("".parse::<Host>().unwrap(), Host::Web);
        assert_matches!("vr".parse::<Host>(), Err(VizError::InvalidHost(_)));
    }

    #[test]
    fn option_id_trims() {
        let id = OptionId::from(" 3 ");
        assert_eq!(id.as_str(), "3");
    }
}
