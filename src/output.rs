use std::io::{self, Write};

use serde::Serialize;
use serde_json::{Value, json};

use crate::app::{FetchSummary, ViewSummary};
use crate::chart::ChartSpec;
use crate::error::VizError;
use crate::viewer::{BakeOptions, DisplaySurface};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_chart(result: &ChartSpec) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_view(result: &ViewSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

/// Display surface for non-interactive runs: emits one JSON line per payload
/// instead of driving a rendering widget.
pub struct JsonSurface;

impl DisplaySurface for JsonSurface {
    fn show_packed(&mut self, key: &str, bytes: &[u8]) -> Result<(), VizError> {
        print_line(json!({"event": "show-packed", "key": key, "bytes": bytes.len()}))
    }

    fn show_model(&mut self, model: &Value) -> Result<(), VizError> {
        let kind = model.get("type").cloned().unwrap_or(Value::Null);
        print_line(json!({"event": "view-model", "model_type": kind}))
    }

    fn offer_bake(&mut self, _model: &Value, options: &BakeOptions) -> Result<(), VizError> {
        print_line(json!({
            "event": "bake-model",
            "layer": options.layer,
            "units": options.units
        }))
    }
}

fn print_line(value: Value) -> Result<(), VizError> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{value}").map_err(|err| VizError::Filesystem(err.to_string()))
}
