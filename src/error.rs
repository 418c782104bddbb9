use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VizError {
    #[error("missing job URL: paste the URL of a job with parametric runs")]
    MissingJobUrl,

    #[error("invalid job URL: {0}")]
    InvalidJobUrl(String),

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("this app only works with the {expected} recipe (job uses {actual})")]
    WrongRecipe { expected: String, actual: String },

    #[error("Not a valid option number.")]
    InvalidOptionNumber(String),

    #[error("job API request failed: {0}")]
    ApiHttp(String),

    #[error("job API returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("run {run_id} has no {file} in its output bundle")]
    MissingMetricFile { run_id: String, file: String },

    #[error("key `{key}` missing or not a number in {path}")]
    MissingMetricKey { key: String, path: Utf8PathBuf },

    #[error("failed to parse {path}: {message}")]
    MetricParse { path: Utf8PathBuf, message: String },

    #[error("malformed runs table: {0}")]
    MalformedTable(String),

    #[error("model artifact {0} has no downloadable child")]
    EmptyArtifact(String),

    #[error("model path is empty, nothing to convert")]
    EmptyModelPath,

    #[error("model file not found: {0}")]
    ModelNotFound(Utf8PathBuf),

    #[error("geometry conversion failed for {path}: {message}")]
    Conversion { path: Utf8PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
