//! Report store.
//!
//! Owns the nested `appId -> country -> metric` report. Results are folded in
//! with [`ReportStore::merge`], which only adds or overwrites labels, so
//! results from different endpoints accumulate on the same entry.

use crate::models::{AggregateResult, CountryMetrics, Report, GLOBAL_COUNTRY};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Accumulates aggregate results into a report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStore {
    report: Report,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a report document, starting empty when the file is missing or blank.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No report at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let report: Report = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))?;

        info!(
            "Loaded report with {} application(s) from {}",
            report.len(),
            path.display()
        );
        Ok(Self { report })
    }

    /// Overlay `result` onto the entry for `app_id` and `country`.
    ///
    /// A missing country is filed under [`GLOBAL_COUNTRY`]. Labels already in
    /// the entry but absent from `result` are kept.
    pub fn merge(&mut self, app_id: &str, country: Option<&str>, result: AggregateResult) {
        let country = country.unwrap_or(GLOBAL_COUNTRY);
        let entry = self
            .report
            .entry(app_id.to_string())
            .or_default()
            .entry(country.to_string())
            .or_default();

        entry.extend(result);
    }

    /// Merge every entry of another report into this one.
    pub fn absorb(&mut self, other: Report) {
        for (app_id, countries) in other {
            for (country, metrics) in countries {
                self.merge(&app_id, Some(&country), metrics);
            }
        }
    }

    #[cfg(test)]
    pub fn entry(&self, app_id: &str, country: &str) -> Option<&CountryMetrics> {
        self.report.get(app_id)?.get(country)
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Number of (application, country) entries.
    pub fn entry_count(&self) -> usize {
        self.report.values().map(|countries| countries.len()).sum()
    }

    /// Write the report to `path`, replacing the file atomically.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let content = serde_json::to_string_pretty(&self.report)?;

        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        file.write_all(content.as_bytes())?;
        file.write_all(b"\n")?;
        file.persist(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        debug!("Wrote {} entries to {}", self.entry_count(), path.display());
        Ok(())
    }

    /// Re-read `path`, merge this report over it and write the result back.
    ///
    /// Entries and labels written by earlier runs are kept unless this
    /// report overwrites them.
    pub fn persist_merged(&self, path: &Path) -> Result<()> {
        let mut on_disk = Self::load(path)?;
        on_disk.absorb(self.report.clone());
        on_disk.persist(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn result(pairs: &[(&str, Value)]) -> AggregateResult {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_creates_global_entry() {
        let mut store = ReportStore::new();
        store.merge("A1", None, result(&[("iap_rev", json!(20.0))]));

        let entry = store.entry("A1", GLOBAL_COUNTRY).unwrap();
        assert_eq!(entry.get("iap_rev"), Some(&json!(20.0)));
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn test_merge_is_additive_across_endpoints() {
        let mut store = ReportStore::new();
        store.merge(
            "A1",
            Some("France"),
            result(&[("appVersion", json!("1.0")), ("notes", json!([]))]),
        );
        store.merge(
            "A1",
            Some("France"),
            result(&[("PU", json!(4.0)), ("ARPPU", json!(1.5))]),
        );

        let entry = store.entry("A1", "France").unwrap();
        assert_eq!(entry.len(), 4);
        assert_eq!(entry.get("appVersion"), Some(&json!("1.0")));
        assert_eq!(entry.get("ARPPU"), Some(&json!(1.5)));
    }

    #[test]
    fn test_merge_same_label_keeps_latest() {
        let mut store = ReportStore::new();
        store.merge("A1", None, result(&[("iap_rev", json!(1.0))]));
        store.merge("A1", None, result(&[("iap_rev", json!(2.0))]));

        let entry = store.entry("A1", GLOBAL_COUNTRY).unwrap();
        assert_eq!(entry.get("iap_rev"), Some(&json!(2.0)));
        assert_eq!(entry.len(), 1);
    }

    #[test]
    fn test_empty_result_still_creates_entry() {
        let mut store = ReportStore::new();
        store.merge("A1", Some("Japan"), AggregateResult::new());
        assert!(store.entry("A1", "Japan").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::load(&dir.path().join("output.json")).unwrap();
        assert!(store.report().is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("output.json");

        let mut store = ReportStore::new();
        store.merge("A1", None, result(&[("avg_rr_d1", json!(0.5))]));
        store.persist(&path).unwrap();

        let loaded = ReportStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["A1"]["Global"]["avg_rr_d1"], json!(0.5));
    }

    #[test]
    fn test_persist_merged_keeps_previous_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.json");

        let mut first = ReportStore::new();
        first.merge("A1", None, result(&[("iap_rev", json!(5.0)), ("PU", json!(1.0))]));
        first.merge("A2", None, result(&[("iap_rev", json!(7.0))]));
        first.persist(&path).unwrap();

        let mut second = ReportStore::new();
        second.merge("A1", None, result(&[("PU", json!(3.0))]));
        second.persist_merged(&path).unwrap();

        let loaded = ReportStore::load(&path).unwrap();
        let a1 = loaded.entry("A1", GLOBAL_COUNTRY).unwrap();
        assert_eq!(a1.get("iap_rev"), Some(&json!(5.0)));
        assert_eq!(a1.get("PU"), Some(&json!(3.0)));
        assert_eq!(
            loaded.entry("A2", GLOBAL_COUNTRY).unwrap().get("iap_rev"),
            Some(&json!(7.0))
        );
    }

    #[test]
    fn test_load_rejects_malformed_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(ReportStore::load(&path).is_err());
    }
}
