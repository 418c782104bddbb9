use serde_json::{Value, json};

use parviz::chart::build_chart;
use parviz::table::RunsTable;

fn row(extra: Value) -> Value {
    let mut base = json!({"run-id": "r1", "option-no": 1, "model": "x.hbjson"});
    if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
        for (key, value) in extra_map {
            base_map.insert(key.clone(), value.clone());
        }
    }
    base
}

#[test]
fn dimension_count_tracks_present_columns() {
    let cases: Vec<(Value, usize)> = vec![
        (json!({}), 2),
        (json!({"window-to-wall-ratio": 0.5}), 3),
        (json!({"louver-count": 4.0}), 3),
        (json!({"window-to-wall-ratio": 0.5, "louver-count": 4.0}), 4),
        (
            json!({
                "window-to-wall-ratio": 0.5,
                "louver-count": 4.0,
                "louver-depth": 0.3
            }),
            5,
        ),
    ];

    for (extra, expected) in cases {
        let table = RunsTable::from_records(json!([row(extra)])).unwrap();
        let chart = build_chart(&table, &[10.0]);
        let dims = &chart.data[0].dimensions;
        assert_eq!(dims.len(), expected);
        assert_eq!(dims[0].label, "Option-no");
        assert_eq!(dims[1].label, "EUI");
    }
}

#[test]
fn chart_serializes_to_parcoords_json() {
    let table = RunsTable::from_records(json!([
        row(json!({"window-to-wall-ratio": 0.5}))
    ]))
    .unwrap();
    let chart = build_chart(&table, &[10.0]);
    let serialized = serde_json::to_value(&chart).unwrap();

    assert_eq!(serialized["data"][0]["type"], "parcoords");
    assert_eq!(serialized["data"][0]["line"]["color"], "rgb(228, 61, 106)");
    assert_eq!(serialized["layout"]["font"]["size"], 15);
    assert_eq!(serialized["data"][0]["dimensions"][2]["range"], json!([0.0, 1.0]));
    // unranged axes omit the key entirely
    assert!(serialized["data"][0]["dimensions"][1].get("range").is_none());
}
