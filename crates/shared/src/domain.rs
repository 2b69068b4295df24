use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Route-level identity of the report being edited.
///
/// The `"new"` route id denotes an unsaved draft; everything else is the
/// server-assigned id of a persisted report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportRef {
    New,
    Existing(String),
}

impl ReportRef {
    pub const NEW_ROUTE_ID: &'static str = "new";

    pub fn parse(route_id: &str) -> Self {
        if route_id == Self::NEW_ROUTE_ID {
            ReportRef::New
        } else {
            ReportRef::Existing(route_id.to_string())
        }
    }

    pub fn as_route_id(&self) -> &str {
        match self {
            ReportRef::New => Self::NEW_ROUTE_ID,
            ReportRef::Existing(id) => id,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, ReportRef::New)
    }
}

/// Report-wide filter defaults that pinned section fields mirror.
///
/// All fields are optional; an absent field means "unset". Serialized with
/// the camelCase names the persistence backend stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Map,
    Legend,
    LineChart,
    LineComparison,
    ColumnChart,
    BarChart,
    TableTrend,
    TableComparison,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Map => "map",
            SectionKind::Legend => "legend",
            SectionKind::LineChart => "line-chart",
            SectionKind::LineComparison => "line-comparison",
            SectionKind::ColumnChart => "column-chart",
            SectionKind::BarChart => "bar-chart",
            SectionKind::TableTrend => "table-trend",
            SectionKind::TableComparison => "table-comparison",
        }
    }
}

/// One visual/data unit within a report.
///
/// Type-specific fields (topic, region, year, ...) live in `fields` rather
/// than being spelled out per kind, because each section kind carries a
/// different subset of them and absent fields must stay absent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pins: BTreeMap<String, bool>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
}

/// The top-level persisted document. `id == None` denotes an unsaved draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Server response to a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedReport {
    pub id: String,
}

/// Fields a section pin can track against the report defaults.
///
/// `fromYear`/`toYear` do not carry their own pin flags; both follow the
/// single `period` flag.
pub const PINNABLE_FIELDS: [&str; 5] = ["topic", "region", "countries", "fromYear", "toYear"];

pub const PERIOD_PIN: &str = "period";

/// Collision-free opaque id for sections.
pub fn uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_ref_round_trips_route_ids() {
        assert_eq!(ReportRef::parse("new"), ReportRef::New);
        assert_eq!(
            ReportRef::parse("abc123"),
            ReportRef::Existing("abc123".into())
        );
        assert_eq!(ReportRef::Existing("abc123".into()).as_route_id(), "abc123");
        assert!(ReportRef::New.is_draft());
    }

    #[test]
    fn section_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&SectionKind::LineComparison).expect("serialize");
        assert_eq!(json, "\"line-comparison\"");
        let kind: SectionKind = serde_json::from_str("\"table-trend\"").expect("deserialize");
        assert_eq!(kind, SectionKind::TableTrend);
    }

    #[test]
    fn section_flattens_type_specific_fields() {
        let raw = serde_json::json!({
            "id": "s1",
            "type": "map",
            "title": "{indicator} - {year}",
            "pins": {"topic": true},
            "topic": "health",
            "year": 2020,
        });
        let section: Section = serde_json::from_value(raw.clone()).expect("deserialize");
        assert_eq!(section.kind, SectionKind::Map);
        assert_eq!(section.fields["topic"], serde_json::json!("health"));
        assert_eq!(section.fields["year"], serde_json::json!(2020));
        let back = serde_json::to_value(&section).expect("serialize");
        assert_eq!(back, raw);
    }

    #[test]
    fn draft_report_omits_unset_identity() {
        let report = Report {
            title: "New Report".into(),
            ..Report::default()
        };
        let json = serde_json::to_value(&report).expect("serialize");
        assert!(json.get("id").is_none());
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn uids_are_unique() {
        assert_ne!(uid(), uid());
    }
}
