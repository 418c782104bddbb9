use serde::Serialize;
use serde_json::{Number, Value};

use crate::table::RunsTable;

const LINE_COLOR: &str = "rgb(228, 61, 106)";
const FONT_SIZE: u32 = 15;

/// A parallel-coordinates chart definition, serializable to the JSON shape
/// the plotting surface consumes. Visual style is fixed; only the dimensions
/// vary with the study design.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub data: Vec<Parcoords>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parcoords {
    #[serde(rename = "type")]
    pub kind: String,
    pub line: LineStyle,
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineStyle {
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dimension {
    pub label: String,
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub font: Font,
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub size: u32,
}

/// Projects the table and the joined EUI values into the chart. The first
/// two axes are always present; the parameter axes appear only when the
/// study varied them.
pub fn build_chart(table: &RunsTable, eui: &[f64]) -> ChartSpec {
    let mut dimensions = vec![
        Dimension {
            label: "Option-no".to_string(),
            values: table
                .rows
                .iter()
                .map(|row| cell_value(row.option_no.as_str()))
                .collect(),
            range: None,
        },
        Dimension {
            label: "EUI".to_string(),
            values: eui.iter().copied().map(number).collect(),
            range: None,
        },
    ];

    if table.has_window_to_wall_ratio() {
        dimensions.push(Dimension {
            label: "WWR".to_string(),
            values: column(table, |row| row.window_to_wall_ratio),
            range: Some([0.0, 1.0]),
        });
    }
    if table.has_louver_count() {
        dimensions.push(Dimension {
            label: "Louver count".to_string(),
            values: column(table, |row| row.louver_count),
            range: None,
        });
    }
    if table.has_louver_depth() {
        dimensions.push(Dimension {
            label: "Louver depth".to_string(),
            values: column(table, |row| row.louver_depth),
            range: None,
        });
    }

    ChartSpec {
        data: vec![Parcoords {
            kind: "parcoords".to_string(),
            line: LineStyle {
                color: LINE_COLOR.to_string(),
            },
            dimensions,
        }],
        layout: Layout {
            font: Font { size: FONT_SIZE },
        },
    }
}

fn column(table: &RunsTable, pick: fn(&crate::table::RunRow) -> Option<f64>) -> Vec<Value> {
    table
        .rows
        .iter()
        .map(|row| pick(row).map(number).unwrap_or(Value::Null))
        .collect()
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

// numeric option ids stay numeric so the axis scales properly
fn cell_value(text: &str) -> Value {
    match text.parse::<f64>() {
        Ok(parsed) => number(parsed),
        Err(_) => Value::String(text.to_string()),
    }
}
