//! Section commands: append, duplicate, delete, and the per-kind
//! template builders that seed new sections from the report defaults.
//!
//! Every command rebuilds the section list as a fresh array while reusing
//! the untouched elements by identity, so downstream diffing only sees
//! the elements that actually changed.

use shared::domain::{uid, SectionKind};
use store::Value;
use tracing::debug;

use crate::{paths, ReportController};

const DELETE_SECTION_PROMPT: &str = "Are you sure that you want to delete this section?";

impl ReportController {
    fn template_defaults(&self) -> Value {
        self.store().get(&paths::report_defaults())
    }

    pub fn add_map(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::Map,
            vec![
                ("topic", d.get_or_null("topic")),
                ("year", d.get_or_null("toYear")),
                ("region", d.get_or_null("region")),
                ("title", "{indicator} {region:prefix; in } - {year}".into()),
            ],
        );
    }

    pub fn add_legend(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::Legend,
            vec![
                ("region", d.get_or_null("region")),
                ("countries", d.get_or_null("countries")),
                ("title", "Legend".into()),
            ],
        );
    }

    pub fn add_line_graph(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::LineChart,
            vec![
                ("topic", d.get_or_null("topic")),
                ("indicator", d.get_or_null("indicator")),
                ("fromYear", d.get_or_null("fromYear")),
                ("toYear", d.get_or_null("toYear")),
                ("region", d.get_or_null("region")),
                ("countries", d.get_or_null("countries")),
                ("title", "{indicator}".into()),
            ],
        );
    }

    pub fn add_line_comparison(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::LineComparison,
            vec![
                ("topic", d.get_or_null("topic")),
                ("fromYear", d.get_or_null("fromYear")),
                ("toYear", d.get_or_null("toYear")),
                ("region", d.get_or_null("region")),
                ("title", "{topic} in {country}".into()),
            ],
        );
    }

    pub fn add_column_graph(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::ColumnChart,
            vec![
                ("topic", d.get_or_null("topic")),
                ("year", d.get_or_null("toYear")),
                ("region", d.get_or_null("region")),
                ("countries", d.get_or_null("countries")),
                ("title", "{topic} in {countries} - {year}".into()),
            ],
        );
    }

    pub fn add_bar_graph(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::BarChart,
            vec![
                ("topic", d.get_or_null("topic")),
                ("region", d.get_or_null("region")),
                ("indicator", d.get_or_null("indicator")),
                (
                    "title",
                    "Top {top} - {indicator} {region:prefix; in } - {year}".into(),
                ),
            ],
        );
    }

    pub fn add_table_trend(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::TableTrend,
            vec![
                ("topic", d.get_or_null("topic")),
                ("region", d.get_or_null("region")),
                ("indicator", d.get_or_null("indicator")),
                ("fromYear", d.get_or_null("fromYear")),
                ("toYear", d.get_or_null("toYear")),
                ("title", "{indicator} {region:prefix; in }".into()),
            ],
        );
    }

    pub fn add_table_indicators(&self) {
        let d = self.template_defaults();
        self.add_section(
            SectionKind::TableComparison,
            vec![
                ("region", d.get_or_null("region")),
                ("year", d.get_or_null("toYear")),
                ("title", "{topic} {region:prefix; in } - {year}".into()),
            ],
        );
    }

    /// Appends a new section built from `template_fields`. Fields whose
    /// template value is unset are omitted entirely rather than written
    /// as null. The new section is also opened in edit mode in the
    /// transient page state.
    pub fn add_section(&self, kind: SectionKind, template_fields: Vec<(&'static str, Value)>) {
        let id = uid();
        let mut section = Value::object([
            ("title", Value::from("New Section")),
            ("id", Value::from(id.clone())),
            ("type", Value::from(kind.as_str())),
        ]);
        for (field, value) in template_fields {
            if !value.is_null() {
                section = section.with_field(field, value);
            }
        }
        debug!(id = %id, kind = kind.as_str(), "adding section");

        let appended = section.clone();
        self.store().update(&paths::report_sections(), move |sections| {
            let mut items: Vec<Value> = sections
                .as_array()
                .map(|a| (**a).clone())
                .unwrap_or_default();
            items.push(appended);
            Value::array(items)
        });

        self.store().set(
            &paths::page_section(&id),
            Value::object([("form", section), ("isNew", Value::Bool(true))]),
        );
    }

    /// Inserts a shallow copy of `section` with a fresh id immediately
    /// after `index`; every other element keeps its identity.
    pub fn duplicate_section(&self, section: &Value, index: usize) {
        let copy = section.with_field("id", Value::from(uid()));
        self.store().update(&paths::report_sections(), move |sections| {
            let Some(items) = sections.as_array() else {
                return sections;
            };
            let split = (index + 1).min(items.len());
            let mut next = Vec::with_capacity(items.len() + 1);
            next.extend(items.iter().take(split).cloned());
            next.push(copy);
            next.extend(items.iter().skip(split).cloned());
            Value::array(next)
        });
    }

    /// Removes `section` (matched by identity) after interactive
    /// confirmation; any answer but yes leaves the list untouched.
    pub async fn delete_section(&self, section: &Value) {
        if !self.prompt().confirm(DELETE_SECTION_PROMPT).await {
            debug!("section delete not confirmed");
            return;
        }
        let target = section.clone();
        self.store().update(&paths::report_sections(), move |sections| {
            let Some(items) = sections.as_array() else {
                return sections;
            };
            let Some(position) = items.iter().position(|s| s.same(&target)) else {
                return sections;
            };
            let mut next = (**items).clone();
            next.remove(position);
            Value::array(next)
        });
    }
}
