//! Tabular export of the report.
//!
//! One CSV row per (application, country) entry, with multi-value metrics
//! folded into single multi-line cells.

use crate::models::{CountryMetrics, Report};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::Value;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// A rendered spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "appID")]
    pub app_id: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Last Update")]
    pub last_update: String,
    #[serde(rename = "engagement time")]
    pub engagement_time: String,
    #[serde(rename = "level 0 drop rate")]
    pub level_0_drop_rate: String,
    #[serde(rename = "level 20 remain rate")]
    pub level_20_remain_rate: String,
    #[serde(rename = "level 50 remain rate")]
    pub level_50_remain_rate: String,
    #[serde(rename = "level 100 remain rate")]
    pub level_100_remain_rate: String,
    #[serde(rename = "impressions per dau (total, new, old)")]
    pub impressions_per_dau: String,
    #[serde(rename = "reward impressions per dau (total, new, old)")]
    pub reward_impressions_per_dau: String,
    #[serde(rename = "iap_rev")]
    pub iap_rev: String,
    #[serde(rename = "RR D1")]
    pub rr_d1: String,
    #[serde(rename = "RR D7")]
    pub rr_d7: String,
    #[serde(rename = "PU")]
    pub paying_users: String,
    #[serde(rename = "ARPPU")]
    pub arppu: String,
}

impl ExportRow {
    pub fn from_entry(app_id: &str, country: &str, metrics: &CountryMetrics) -> Self {
        Self {
            app_id: app_id.to_string(),
            country: country.to_string(),
            last_update: last_update(metrics),
            engagement_time: split_cell(
                metrics,
                "avg_engagement_time",
                "avg_new_users_engagement_time",
                "avg_old_users_engagement_time",
            ),
            level_0_drop_rate: level_cell(metrics, "0", "drop_rate"),
            level_20_remain_rate: level_cell(metrics, "20", "remain_rate"),
            level_50_remain_rate: level_cell(metrics, "50", "remain_rate"),
            level_100_remain_rate: level_cell(metrics, "100", "remain_rate"),
            impressions_per_dau: split_cell(
                metrics,
                "avg_imp/dau",
                "avg_new_users_imp/dau",
                "avg_old_users_imp/dau",
            ),
            reward_impressions_per_dau: split_cell(
                metrics,
                "avg_rwd/dau",
                "avg_new_users_rwd/dau",
                "avg_old_users_rwd/dau",
            ),
            iap_rev: plain_cell(metrics, "iap_rev"),
            rr_d1: plain_cell(metrics, "avg_rr_d1"),
            rr_d7: plain_cell(metrics, "avg_rr_d7"),
            paying_users: plain_cell(metrics, "PU"),
            arppu: plain_cell(metrics, "ARPPU"),
        }
    }
}

/// Render a scalar; `null` renders empty.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn plain_cell(metrics: &CountryMetrics, label: &str) -> String {
    metrics.get(label).map(render).unwrap_or_default()
}

fn numeric_or_zero(metrics: &CountryMetrics, label: &str) -> String {
    match metrics.get(label) {
        Some(Value::Null) | None => "0".to_string(),
        Some(value) => render(value),
    }
}

fn split_cell(metrics: &CountryMetrics, total: &str, new: &str, old: &str) -> String {
    format!(
        "{}\n- new: {}\n- old: {}",
        numeric_or_zero(metrics, total),
        numeric_or_zero(metrics, new),
        numeric_or_zero(metrics, old)
    )
}

fn level_cell(metrics: &CountryMetrics, level: &str, rate: &str) -> String {
    metrics
        .get(level)
        .and_then(|slot| slot.get(rate))
        .map(render)
        .unwrap_or_default()
}

fn last_update(metrics: &CountryMetrics) -> String {
    let notes = match metrics.get("notes") {
        Some(Value::Array(items)) => items.iter().map(render).collect::<Vec<_>>().join(", "),
        Some(other) => render(other),
        None => String::new(),
    };

    format!(
        "{}\n{}\nNotes: {}",
        plain_cell(metrics, "appVersion"),
        plain_cell(metrics, "buildDate"),
        notes
    )
}

/// Flatten the report into rows, in report order.
pub fn export_rows(report: &Report) -> Vec<ExportRow> {
    report
        .iter()
        .flat_map(|(app_id, countries)| {
            countries
                .iter()
                .map(move |(country, metrics)| ExportRow::from_entry(app_id, country, metrics))
        })
        .collect()
}

/// Write rows as CSV with a header line.
pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for (i, row) in rows.iter().enumerate() {
        wtr.serialize(row)
            .with_context(|| format!("serialize CSV row #{}", i + 1))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Export the report to a CSV file. Returns the number of rows written.
pub fn export_csv(report: &Report, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
    }

    let rows = export_rows(report);
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(file, &rows)?;

    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> Report {
        let global: CountryMetrics = [
            ("appVersion", json!("1.4.2")),
            ("buildDate", json!("2024-03-01")),
            ("notes", json!(["crash fix", "new level"])),
            ("avg_engagement_time", json!(120.5)),
            ("avg_new_users_engagement_time", json!(80.0)),
            ("0", json!({"drop_rate": 0.1})),
            ("20", json!({"remain_rate": null})),
            ("avg_imp/dau", json!(3.0)),
            ("iap_rev", json!(20.0)),
            ("avg_rr_d1", json!(0.5)),
            ("PU", json!(4.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut app = std::collections::BTreeMap::new();
        app.insert("Global".to_string(), global);
        app.insert("France".to_string(), CountryMetrics::new());

        let mut report = Report::new();
        report.insert("A1".to_string(), app);
        report
    }

    #[test]
    fn test_export_rows_composite_cells() {
        let rows = export_rows(&sample_report());
        assert_eq!(rows.len(), 2);

        let global = rows.iter().find(|r| r.country == "Global").unwrap();
        assert_eq!(global.app_id, "A1");
        assert_eq!(
            global.last_update,
            "1.4.2\n2024-03-01\nNotes: crash fix, new level"
        );
        assert_eq!(global.engagement_time, "120.5\n- new: 80.0\n- old: 0");
        assert_eq!(global.impressions_per_dau, "3.0\n- new: 0\n- old: 0");
        assert_eq!(global.level_0_drop_rate, "0.1");
        assert_eq!(global.level_20_remain_rate, "");
        assert_eq!(global.level_100_remain_rate, "");
        assert_eq!(global.iap_rev, "20.0");
        assert_eq!(global.rr_d1, "0.5");
        assert_eq!(global.rr_d7, "");
        assert_eq!(global.paying_users, "4.0");
    }

    #[test]
    fn test_empty_entry_renders_defaults() {
        let rows = export_rows(&sample_report());
        let france = rows.iter().find(|r| r.country == "France").unwrap();

        assert_eq!(france.last_update, "\n\nNotes: ");
        assert_eq!(france.reward_impressions_per_dau, "0\n- new: 0\n- old: 0");
        assert_eq!(france.arppu, "");
    }

    #[test]
    fn test_write_csv_header() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &export_rows(&sample_report())).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("appID,Country,Last Update,engagement time"));
        assert!(header.ends_with("iap_rev,RR D1,RR D7,PU,ARPPU"));
    }

    #[test]
    fn test_export_csv_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.csv");

        let written = export_csv(&sample_report(), &path).unwrap();
        assert_eq!(written, 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "A1");
    }
}
