use std::cmp::Ordering;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::api::{JobApi, JobInfo};
use crate::chart::{ChartSpec, build_chart};
use crate::domain::{JobRef, OptionId, REQUIRED_RECIPE};
use crate::error::VizError;
use crate::fetch;
use crate::session::Session;
use crate::table::build_index;
use crate::viewer::{DisplaySurface, GeometryConverter};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Fetch,
    Chart,
    View,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub job: String,
    pub status: String,
    pub recipe: String,
    pub run_count: usize,
    pub options: Vec<String>,
    pub model_dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub option: String,
    pub model_path: String,
    pub host: String,
}

/// Orchestrates the whole pipeline over the two external collaborators: the
/// remote job API and the geometry converter. All derived state lives on the
/// [`Session`] passed in, so reruns with an unchanged job short-circuit the
/// expensive steps.
#[derive(Clone)]
pub struct App<A: JobApi, C: GeometryConverter> {
    api: A,
    converter: C,
}

impl<A: JobApi, C: GeometryConverter> App<A, C> {
    pub fn new(api: A, converter: C) -> Self {
        Self { api, converter }
    }

    /// Parses the job URL, verifies the recipe, and binds the session to the
    /// job. Binding a different job than before drops all derived state.
    pub fn load_job(
        &self,
        job_url: &str,
        session: &mut Session,
        sink: &dyn ProgressSink,
    ) -> Result<JobInfo, VizError> {
        let job: JobRef = job_url.parse()?;
        sink.event(ProgressEvent::msg(format!("phase=Resolve; job {job}")));

        let info = self.api.fetch_job(&job)?;
        if !info.recipe.eq_ignore_ascii_case(REQUIRED_RECIPE) {
            return Err(VizError::WrongRecipe {
                expected: REQUIRED_RECIPE.to_string(),
                actual: info.recipe,
            });
        }

        session.bind_job(job);
        Ok(info)
    }

    /// Runs the fetch pipeline: metrics, models, then the option index. The
    /// index is only built after every model file is on disk, so its paths
    /// always resolve. Results already on the session are reused as-is.
    pub fn fetch(
        &self,
        info: &JobInfo,
        session: &mut Session,
        sink: &dyn ProgressSink,
    ) -> Result<FetchSummary, VizError> {
        let job = session
            .job()
            .cloned()
            .ok_or(VizError::MissingJobUrl)?;

        if session.metrics().is_none() {
            let samples = fetch::fetch_metrics(&self.api, &job, session, sink)?;
            session.set_metrics(samples);
        } else {
            sink.event(ProgressEvent::msg("phase=Fetch; metrics already cached"));
        }

        if session.model_index().is_empty() {
            fetch::materialize_models(&self.api, &job, session, sink)?;
            sink.event(ProgressEvent::msg("phase=Store; indexing models"));
            let table = self.api.runs_table(&job)?;
            let index = build_index(&table, &session.model_dir());
            session.set_table(table);
            session.set_model_index(index);
        } else {
            sink.event(ProgressEvent::msg("phase=Store; model index already built"));
        }

        session.write_manifest()?;
        let run_count = session.metrics().map(<[_]>::len).unwrap_or(0);
        info!(job = %job, run_count, "fetch complete");

        let mut options: Vec<String> = session
            .model_index()
            .keys()
            .map(|option| option.to_string())
            .collect();
        sort_options(&mut options);

        Ok(FetchSummary {
            job: job.to_string(),
            status: info.status.clone(),
            recipe: info.recipe.clone(),
            run_count,
            options,
            model_dir: session.model_dir().to_string(),
        })
    }

    /// Projects the fetched table and metrics into the chart definition.
    pub fn chart(&self, session: &Session) -> Result<ChartSpec, VizError> {
        let table = session
            .table()
            .ok_or_else(|| VizError::MalformedTable("no runs table fetched yet".to_string()))?;
        let samples = session
            .metrics()
            .ok_or_else(|| VizError::MalformedTable("no metrics fetched yet".to_string()))?;
        let eui = table.join_metrics(samples)?;
        Ok(build_chart(table, &eui))
    }

    /// Looks up the option's model in the session index and renders it with
    /// the session's rendering capability.
    pub fn render_option(
        &self,
        option: &OptionId,
        session: &mut Session,
        surface: &mut dyn DisplaySurface,
        sink: &dyn ProgressSink,
    ) -> Result<ViewSummary, VizError> {
        let model_path = session.lookup_model(option)?.to_owned();
        sink.event(ProgressEvent::msg(format!(
            "phase=Render; option {option} -> {model_path}"
        )));

        let renderer = session.renderer();
        renderer.render(&model_path, session, &self.converter, surface)?;

        Ok(ViewSummary {
            option: option.to_string(),
            model_path: model_path.to_string(),
            host: session.host().to_string(),
        })
    }
}

// numeric ids sort as numbers, so "10" lists after "2"
fn sort_options(options: &mut [String]) {
    options.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(left), Ok(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    });
}
