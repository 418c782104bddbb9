use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use parviz::api::HttpJobApi;
use parviz::app::{App, FetchSummary, ProgressSinkKind};
use parviz::config::{Config, ConfigLoader};
use parviz::domain::{DEFAULT_JOB_URL, Host, OptionId};
use parviz::error::VizError;
use parviz::output::{JsonOutput, JsonSurface, OutputMode};
use parviz::session::Session;
use parviz::tui::Tui;
use parviz::viewer::PackedConverter;

#[derive(Parser)]
#[command(name = "parviz")]
#[command(about = "Visualize the results of a parametric energy study")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    host: Option<Host>,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download run metrics and models for a job")]
    Fetch(JobArgs),
    #[command(about = "Print the parallel-coordinates chart definition")]
    Chart(JobArgs),
    #[command(about = "Render the geometry of one option")]
    View(ViewArgs),
}

#[derive(Args, Clone)]
struct JobArgs {
    job_url: String,
}

#[derive(Args, Clone)]
struct ViewArgs {
    job_url: String,
    option_no: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(viz) = report.downcast_ref::<VizError>() {
            return ExitCode::from(map_exit_code(viz));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &VizError) -> u8 {
    match error {
        VizError::MissingJobUrl
        | VizError::InvalidJobUrl(_)
        | VizError::InvalidHost(_)
        | VizError::WrongRecipe { .. }
        | VizError::InvalidOptionNumber(_)
        | VizError::ConfigRead(_)
        | VizError::ConfigParse(_) => 2,
        VizError::ApiHttp(_) | VizError::ApiStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    let host = cli.host.or(config.host).unwrap_or_default();

    let api = match &config.api_base_url {
        Some(base_url) => HttpJobApi::with_base_url(base_url.clone()).into_diagnostic()?,
        None => HttpJobApi::new().into_diagnostic()?,
    };
    let app = App::new(api, PackedConverter);

    match cli.command {
        Some(Commands::Fetch(args)) => run_fetch(args, app, host, output_mode),
        Some(Commands::Chart(args)) => run_chart(args, app, host, output_mode),
        Some(Commands::View(args)) => run_view(args, app, host, output_mode),
        None => match output_mode {
            OutputMode::Interactive => run_session(app, host, &config),
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `parviz --help`)",
            )),
        },
    }
}

type CloudApp = App<HttpJobApi, PackedConverter>;

fn run_fetch(
    args: JobArgs,
    app: CloudApp,
    host: Host,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let mut session = Session::new(host).into_diagnostic()?;
            let info = app
                .load_job(&args.job_url, &mut session, &JsonOutput)
                .into_diagnostic()?;
            let summary = app
                .fetch(&info, &mut session, &JsonOutput)
                .into_diagnostic()?;
            JsonOutput::print_fetch(&summary).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Fetch);
            let summary = tui.run(move |sink| {
                let mut session = Session::new(host)?;
                let info = app.load_job(&args.job_url, &mut session, sink)?;
                app.fetch(&info, &mut session, sink)
            })?;
            print_fetch_summary(&summary);
            Ok(())
        }
    }
}

fn run_chart(
    args: JobArgs,
    app: CloudApp,
    host: Host,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let run = move |sink: &dyn parviz::app::ProgressSink| {
        let mut session = Session::new(host)?;
        let info = app.load_job(&args.job_url, &mut session, sink)?;
        app.fetch(&info, &mut session, sink)?;
        app.chart(&session)
    };
    let chart = match output_mode {
        OutputMode::NonInteractive => run(&JsonOutput).into_diagnostic()?,
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::Chart);
            tui.run(run)?
        }
    };
    JsonOutput::print_chart(&chart).into_diagnostic()?;
    Ok(())
}

fn run_view(
    args: ViewArgs,
    app: CloudApp,
    host: Host,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let option = OptionId::from(args.option_no.as_str());
    let run = move |sink: &dyn parviz::app::ProgressSink| {
        let mut session = Session::new(host)?;
        let info = app.load_job(&args.job_url, &mut session, sink)?;
        app.fetch(&info, &mut session, sink)?;
        let mut surface = JsonSurface;
        app.render_option(&option, &mut session, &mut surface, sink)
    };
    let summary = match output_mode {
        OutputMode::NonInteractive => run(&JsonOutput).into_diagnostic()?,
        OutputMode::Interactive => {
            let mut tui = Tui::new(ProgressSinkKind::View);
            tui.run(run)?
        }
    };
    JsonOutput::print_view(&summary).into_diagnostic()?;
    Ok(())
}

/// Interactive session: prompt for a job URL, fetch, then keep prompting for
/// option numbers. Recoverable errors stay inline; the session survives them.
fn run_session(app: CloudApp, host: Host, config: &Config) -> miette::Result<()> {
    let default_url = config
        .job_url
        .clone()
        .unwrap_or_else(|| DEFAULT_JOB_URL.to_string());
    let session = Arc::new(Mutex::new(Session::new(host).into_diagnostic()?));
    let mut tui = Tui::new(ProgressSinkKind::Fetch);

    'jobs: loop {
        let Some(job_url) = tui.prompt(
            "Paste URL of job with parametric runs using the annual energy recipe",
            &default_url,
        )?
        else {
            return Ok(());
        };

        let fetch_app = app.clone();
        let fetch_session = session.clone();
        let outcome = tui.run(move |sink| {
            let mut session = lock_session(&fetch_session)?;
            let info = fetch_app.load_job(&job_url, &mut session, sink)?;
            fetch_app.fetch(&info, &mut session, sink)
        });

        let summary = match outcome {
            Ok(summary) => summary,
            Err(report) => {
                tui.show_error(&format!("{report}"));
                continue 'jobs;
            }
        };
        tui.set_summary(
            format!(
                "{} runs fetched from {} ({})",
                summary.run_count, summary.job, summary.recipe
            ),
            eui_rows(&session)?,
        );

        loop {
            let Some(option_no) = tui.prompt("Option number (Esc to change job)", "")? else {
                continue 'jobs;
            };
            if option_no.is_empty() {
                continue;
            }

            let view_app = app.clone();
            let view_session = session.clone();
            let mut surface = tui.surface();
            let option = OptionId::from(option_no.as_str());
            let outcome = tui.run(move |sink| {
                let mut session = lock_session(&view_session)?;
                view_app.render_option(&option, &mut session, &mut surface, sink)
            });

            match outcome {
                Ok(_) => tui.clear_error(),
                Err(report) => {
                    let message = match report.downcast_ref::<VizError>() {
                        Some(err @ VizError::InvalidOptionNumber(_)) => err.to_string(),
                        _ => format!("{report}"),
                    };
                    tui.show_error(&message);
                }
            }
        }
    }
}

fn lock_session(
    session: &Arc<Mutex<Session>>,
) -> Result<std::sync::MutexGuard<'_, Session>, VizError> {
    session
        .lock()
        .map_err(|_| VizError::Filesystem("session lock poisoned".to_string()))
}

fn eui_rows(session: &Arc<Mutex<Session>>) -> miette::Result<Vec<String>> {
    let session = lock_session(session).into_diagnostic()?;
    let Some(table) = session.table() else {
        return Ok(Vec::new());
    };
    let Some(samples) = session.metrics() else {
        return Ok(Vec::new());
    };
    let eui = table.join_metrics(samples).into_diagnostic()?;
    Ok(table
        .rows
        .iter()
        .zip(eui)
        .map(|(row, value)| format!("option {:<8} EUI {value:.2}", row.option_no))
        .collect())
}

fn print_fetch_summary(summary: &FetchSummary) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}parviz summary{reset}");
    println!(
        "{green}fetched {} runs from {} ({}, {}){reset}",
        summary.run_count, summary.job, summary.recipe, summary.status
    );
    println!("models: {}", summary.model_dir);
    for option in &summary.options {
        println!("  option {option}");
    }
}
