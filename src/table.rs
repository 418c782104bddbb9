use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{MetricSample, OptionId};
use crate::error::VizError;

/// One row of the runs table: the option identifier, the input model
/// reference, and whichever parameter columns this study design varied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    #[serde(rename = "run-id")]
    pub run_id: String,
    #[serde(rename = "option-no", deserialize_with = "cell_as_option_id")]
    pub option_no: OptionId,
    pub model: String,
    #[serde(rename = "window-to-wall-ratio", default)]
    pub window_to_wall_ratio: Option<f64>,
    #[serde(rename = "louver-count", default)]
    pub louver_count: Option<f64>,
    #[serde(rename = "louver-depth", default)]
    pub louver_depth: Option<f64>,
}

/// The runs dataframe of a job, one record per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunsTable {
    pub rows: Vec<RunRow>,
}

impl RunsTable {
    pub fn from_records(records: Value) -> Result<Self, VizError> {
        let rows: Vec<RunRow> = serde_json::from_value(records)
            .map_err(|err| VizError::MalformedTable(err.to_string()))?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_window_to_wall_ratio(&self) -> bool {
        self.rows.iter().any(|row| row.window_to_wall_ratio.is_some())
    }

    pub fn has_louver_count(&self) -> bool {
        self.rows.iter().any(|row| row.louver_count.is_some())
    }

    pub fn has_louver_depth(&self) -> bool {
        self.rows.iter().any(|row| row.louver_depth.is_some())
    }

    /// EUI values in row order, joined to the samples by run id.
    pub fn join_metrics(&self, samples: &[MetricSample]) -> Result<Vec<f64>, VizError> {
        let by_run: BTreeMap<&str, f64> = samples
            .iter()
            .map(|sample| (sample.run_id.as_str(), sample.eui))
            .collect();
        self.rows
            .iter()
            .map(|row| {
                by_run.get(row.run_id.as_str()).copied().ok_or_else(|| {
                    VizError::MalformedTable(format!(
                        "no metric sample for run {}",
                        row.run_id
                    ))
                })
            })
            .collect()
    }
}

/// Maps each option id to the local path of its downloaded model file. The
/// model column may carry a directory prefix; only the basename is kept.
/// Duplicate option ids resolve to the last occurrence.
pub fn build_index(
    table: &RunsTable,
    model_dir: &Utf8Path,
) -> BTreeMap<OptionId, Utf8PathBuf> {
    let mut index = BTreeMap::new();
    for row in &table.rows {
        let basename = row.model.rsplit('/').next().unwrap_or(row.model.as_str());
        index.insert(row.option_no.clone(), model_dir.join(basename));
    }
    index
}

fn cell_as_option_id<'de, D>(deserializer: D) -> Result<OptionId, D::Error>
where
    D: Deserializer<'de>,
{
    // option-no arrives as a number or a string depending on the study design
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(text) => Ok(OptionId::from(text)),
        Value::Number(num) => Ok(OptionId::from(num.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "option-no must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_table() -> RunsTable {
        RunsTable::from_records(json!([
            {
                "run-id": "run-1",
                "option-no": 1,
                "model": "a/x.hbjson",
                "window-to-wall-ratio": 0.4
            },
            {
                "run-id": "run-2",
                "option-no": 2,
                "model": "b/y.hbjson",
                "window-to-wall-ratio": 0.6
            }
        ]))
        .unwrap()
    }

    #[test]
    fn records_roundtrip() {
        let table = sample_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].option_no.as_str(), "1");
        assert!(table.has_window_to_wall_ratio());
        assert!(!table.has_louver_count());
    }

    #[test]
    fn index_strips_directory_prefix() {
        let table = sample_table();
        let index = build_index(&table, Utf8Path::new("/tmp/model"));
        assert_eq!(
            index.get(&OptionId::from("1")).unwrap(),
            Utf8Path::new("/tmp/model/x.hbjson")
        );
        assert_eq!(
            index.get(&OptionId::from("2")).unwrap(),
            Utf8Path::new("/tmp/model/y.hbjson")
        );
    }

    #[test]
    fn index_last_duplicate_wins() {
        let table = RunsTable::from_records(json!([
            {"run-id": "r1", "option-no": "1", "model": "first.hbjson"},
            {"run-id": "r2", "option-no": "1", "model": "second.hbjson"}
        ]))
        .unwrap();
        let index = build_index(&table, Utf8Path::new("/tmp/model"));
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get(&OptionId::from("1")).unwrap(),
            Utf8Path::new("/tmp/model/second.hbjson")
        );
    }

    #[test]
    fn join_metrics_by_run_id() {
        let table = sample_table();
        // samples deliberately out of row order
        let samples = vec![
            MetricSample {
                run_id: "run-2".to_string(),
                eui: 21.0,
            },
            MetricSample {
                run_id: "run-1".to_string(),
                eui: 42.5,
            },
        ];
        let values = table.join_metrics(&samples).unwrap();
        assert_eq!(values, vec![42.5, 21.0]);
    }

    #[test]
    fn join_metrics_missing_run() {
        let table = sample_table();
        let samples = vec![MetricSample {
            run_id: "run-1".to_string(),
            eui: 42.5,
        }];
        let err = table.join_metrics(&samples).unwrap_err();
        assert!(matches!(err, VizError::MalformedTable(_)));
    }
}
