//! State of one report screen: the fetched collection, the criteria over it
//! and the options the filter form offers.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::filter::{
    apply, distinct_values, DistinctValues, FilterCriteria, FilterError, MatchPolicy,
};
use crate::report::{compose, Locale, ReportDocument, ReportError, ReportKind, ReportRecord};

/// Rows returned by a preview, as the console's on-screen table shows.
pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ScreenError {
    #[error("{} report is still loading", .0.as_str())]
    NotLoaded(ReportKind),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed { message: String },
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportScreen<R> {
    state: LoadState,
    records: Vec<R>,
    criteria: FilterCriteria,
    distinct: DistinctValues,
    locale: Locale,
}

impl<R: ReportRecord + Serialize> ReportScreen<R> {
    /// A freshly mounted screen, waiting on its fetch.
    pub fn mount(locale: Locale) -> Self {
        Self {
            state: LoadState::Loading,
            records: Vec::new(),
            criteria: FilterCriteria::new(),
            distinct: DistinctValues::default(),
            locale,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Resolves the fetch. A failure leaves an empty collection that filters
    /// still work over.
    pub fn finish_load(&mut self, fetched: Result<Vec<R>, String>) {
        match fetched {
            Ok(records) => {
                self.records = records;
                self.state = LoadState::Ready;
            }
            Err(message) => {
                tracing::warn!(kind = R::KIND.as_str(), %message, "report fetch failed");
                self.records = Vec::new();
                self.state = LoadState::Failed { message };
            }
        }
        self.distinct = distinct_values(&self.records);
    }

    fn ensure_loaded(&self) -> Result<(), ScreenError> {
        match self.state {
            LoadState::Loading => Err(ScreenError::NotLoaded(R::KIND)),
            _ => Ok(()),
        }
    }

    pub fn set_filter(&mut self, patch: &Value) -> Result<(), ScreenError> {
        self.ensure_loaded()?;
        self.criteria.patch(patch)?;
        Ok(())
    }

    pub fn reset_filters(&mut self) -> Result<(), ScreenError> {
        self.ensure_loaded()?;
        self.criteria.clear();
        Ok(())
    }

    pub fn visible(&self) -> Vec<&R> {
        apply(&self.records, &self.criteria, R::KIND.policy())
    }

    /// Counts, criteria, dropdown options and the first `limit` visible rows.
    pub fn snapshot(&self, limit: usize) -> Value {
        let visible = self.visible();
        let rows: Vec<&R> = visible.iter().take(limit).copied().collect();
        let policy = match R::KIND.policy() {
            MatchPolicy::Exact => "exact",
            MatchPolicy::Substring => "substring",
        };
        let mut out = json!({
            "kind": R::KIND.as_str(),
            "state": self.state.as_str(),
            "policy": policy,
            "total": self.records.len(),
            "filtered": visible.len(),
            "criteria": self.criteria.to_json(),
            "rowKeys": rows.iter().map(|r| r.row_key()).collect::<Vec<_>>(),
            "rows": rows,
        });
        if R::KIND.policy() == MatchPolicy::Exact {
            out["options"] = json!(self.distinct);
        }
        if let LoadState::Failed { message } = &self.state {
            out["error"] = json!({ "code": "fetch_failed", "message": message });
        }
        out
    }

    pub fn compose(&self, generated_on: NaiveDate) -> Result<ReportDocument, ScreenReportError> {
        self.ensure_loaded()?;
        let visible = self.visible();
        Ok(compose(&visible, &self.criteria, self.locale, generated_on)?)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScreenReportError {
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterField;
    use crate::model::{School, Student};

    fn schools() -> Vec<School> {
        serde_json::from_value(json!([
            { "id_school": 1, "nombre": "CE Norte", "direccion": "Santa Ana" },
            { "id_school": 2, "nombre": "CE Sur", "direccion": "San Miguel" },
            { "id_school": 3, "nombre": "CE Norte", "direccion": "Sonsonate" }
        ]))
        .expect("schools")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("date")
    }

    #[test]
    fn filters_are_refused_until_loaded() {
        let mut screen = ReportScreen::<School>::mount(Locale::Es);
        assert_eq!(
            screen.set_filter(&json!({ "name": "x" })),
            Err(ScreenError::NotLoaded(ReportKind::Schools))
        );
        assert!(matches!(
            screen.compose(date()),
            Err(ScreenReportError::Screen(ScreenError::NotLoaded(_)))
        ));
    }

    #[test]
    fn exact_screen_filters_and_offers_options() {
        let mut screen = ReportScreen::<School>::mount(Locale::Es);
        screen.finish_load(Ok(schools()));
        screen.set_filter(&json!({ "name": "CE Norte" })).expect("filter");
        let snap = screen.snapshot(PREVIEW_ROWS);
        assert_eq!(snap["total"], 3);
        assert_eq!(snap["filtered"], 2);
        assert_eq!(snap["options"]["name"], json!(["CE Norte", "CE Sur"]));

        // "CE" is not an exact value.
        screen.set_filter(&json!({ "name": "CE" })).expect("filter");
        assert_eq!(screen.visible().len(), 0);

        screen.reset_filters().expect("reset");
        assert_eq!(screen.visible().len(), 3);
        assert_eq!(screen.criteria().get(FilterField::Name), None);
    }

    #[test]
    fn blank_backend_values_are_not_dropdown_options() {
        let loaded: Vec<School> = serde_json::from_value(json!([
            { "id_school": 1, "nombre": "CE Norte", "email": "" },
            { "id_school": 2, "nombre": "CE Sur", "email": "b@x" }
        ]))
        .expect("schools");
        let mut screen = ReportScreen::<School>::mount(Locale::Es);
        screen.finish_load(Ok(loaded));
        let snap = screen.snapshot(PREVIEW_ROWS);
        assert_eq!(snap["options"]["email"], json!(["b@x"]));
    }

    #[test]
    fn failed_fetch_leaves_working_empty_screen() {
        let mut screen = ReportScreen::<Student>::mount(Locale::En);
        screen.finish_load(Err("connection refused".into()));
        assert_eq!(screen.state().as_str(), "failed");
        screen.set_filter(&json!({ "name": "ana" })).expect("filter");
        let snap = screen.snapshot(PREVIEW_ROWS);
        assert_eq!(snap["filtered"], 0);
        assert_eq!(snap["error"]["code"], "fetch_failed");
        assert!(snap.get("options").is_none());
        assert!(matches!(
            screen.compose(date()),
            Err(ScreenReportError::Report(ReportError::Empty { .. }))
        ));
    }

    #[test]
    fn preview_is_capped() {
        let many: Vec<School> = (0..25)
            .map(|i| serde_json::from_value(json!({ "id_school": i, "nombre": "E" })).expect("school"))
            .collect();
        let mut screen = ReportScreen::<School>::mount(Locale::Es);
        screen.finish_load(Ok(many));
        let snap = screen.snapshot(PREVIEW_ROWS);
        assert_eq!(snap["rows"].as_array().map(Vec::len), Some(PREVIEW_ROWS));
        assert_eq!(snap["filtered"], 25);
        let doc = screen.compose(date()).expect("document");
        assert_eq!(doc.record_count, 25);
    }
}
