//! The [`SchemaGuard`]: a strict checker that a fetched page still matches the structural
//! contract the extractors were written against.
//!
//! The guard is pure — it never fetches and holds no state beyond the declared catalogue. When
//! a check fails the calling extractor records a schema alert through the store and propagates
//! the [`Error::SchemaDrift`]; the orchestrator marks the entity failed and continues with its
//! siblings. Catching drift here is what keeps a silent site redesign from flowing garbage into
//! the store.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::{
    error::{Error, Result},
    id::EntityKind,
};

/// The structural contract for one entity kind's page.
#[derive(Debug)]
pub struct PageSchema {
    /// Textual fingerprints that must appear in the raw page when it is well-formed.
    pub markers: Vec<(&'static str, Regex)>,
    /// Metadata fields the extractor must have produced, by name.
    pub required_fields: &'static [&'static str],
    /// Header names the results table must expose (case-insensitive; extras allowed).
    pub required_columns: &'static [&'static str],
}

static THEAD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("thead").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());

fn marker(label: &'static str, pattern: &str) -> (&'static str, Regex) {
    (label, Regex::new(pattern).unwrap_or_else(|_| unreachable!()))
}

/// Validates fetched pages and extracted data against the declared per-entity contracts.
///
/// The catalogue is closed: exactly the entity kinds with a crawlable page carry a schema.
/// Asking about any other kind is an [`Error::Validation`], never a silent pass.
#[derive(Debug)]
pub struct SchemaGuard {
    catalogue: IndexMap<EntityKind, PageSchema>,
}

impl Default for SchemaGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGuard {
    /// Build the guard with the declared site contract.
    pub fn new() -> Self {
        let mut catalogue = IndexMap::new();

        let _ = catalogue.insert(
            EntityKind::League,
            PageSchema {
                markers: vec![
                    marker("series array push", r"series\.push\(\{"),
                    marker("series id field", r"\b(?:id|sid)\s*:\s*\d+"),
                    marker("series name field", r#"\b(?:name|sname)\s*:\s*["']"#),
                ],
                required_fields: &["league_id", "name", "url"],
                required_columns: &[],
            },
        );

        let _ = catalogue.insert(
            EntityKind::Series,
            PageSchema {
                markers: vec![
                    marker("seasons array", r"seasons\s*=\s*\["),
                    marker("season id field", r"\{\s*id\s*:\s*\d+"),
                    marker("season name field", r#"\b(?:n|sname)\s*:\s*["']"#),
                    marker("season start timestamp", r"\bscrt\s*:\s*\d+"),
                    marker("scheduled race count", r"\bns\s*:\s*\d+"),
                    marker("completed race count", r"\bnr\s*:\s*\d+"),
                ],
                required_fields: &["series_id", "name", "url"],
                required_columns: &[],
            },
        );

        let _ = catalogue.insert(
            EntityKind::Season,
            PageSchema {
                markers: vec![marker("schedule link", r"schedule_id=\d+")],
                required_fields: &["season_id", "name", "url"],
                required_columns: &[],
            },
        );

        let _ = catalogue.insert(
            EntityKind::Race,
            PageSchema {
                markers: vec![marker("results table", r"<table")],
                required_fields: &["schedule_id", "url"],
                required_columns: &["fin", "driver"],
            },
        );

        let _ = catalogue.insert(
            EntityKind::Driver,
            PageSchema {
                markers: vec![marker("driver id reference", r"driver_id[=:]\s*\d+")],
                required_fields: &["driver_id", "url"],
                required_columns: &[],
            },
        );

        Self { catalogue }
    }

    /// The declared schema for `kind`, or [`Error::Validation`] if the kind has none.
    pub fn schema(&self, kind: EntityKind) -> Result<&PageSchema> {
        self.catalogue.get(&kind).ok_or_else(|| {
            let known = self
                .catalogue
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Error::Validation(format!("no declared page schema for {kind:?}; known kinds: {known}"))
        })
    }

    /// Check that every declared marker pattern of `kind` appears in the raw page text.
    ///
    /// Empty or whitespace-only input fails outright: a blank page is drift, not absence of
    /// evidence.
    pub fn validate_markers(&self, kind: EntityKind, raw_page_text: &str) -> Result<()> {
        let schema = self.schema(kind)?;

        if raw_page_text.trim().is_empty() {
            return Err(Error::SchemaDrift {
                entity: kind,
                detail: "empty page content, expected marker patterns not found".to_string(),
            });
        }

        let missing: Vec<&str> = schema
            .markers
            .iter()
            .filter(|(_, regex)| !regex.is_match(raw_page_text))
            .map(|(label, _)| *label)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaDrift {
                entity: kind,
                detail: format!("missing marker pattern(s): {}", missing.join(", ")),
            })
        }
    }

    /// Check that every required field of `kind` is present and non-null in the extracted
    /// metadata mapping. A field explicitly set to `null` fails identically to one missing.
    pub fn validate_fields(&self, kind: EntityKind, extracted: &serde_json::Value) -> Result<()> {
        let schema = self.schema(kind)?;

        let Some(mapping) = extracted.as_object() else {
            return Err(Error::SchemaDrift {
                entity: kind,
                detail: "extracted metadata is not a field mapping".to_string(),
            });
        };

        let missing: Vec<&str> = schema
            .required_fields
            .iter()
            .filter(|field| mapping.get(**field).is_none_or(serde_json::Value::is_null))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaDrift {
                entity: kind,
                detail: format!("missing required field(s): {}", missing.join(", ")),
            })
        }
    }

    /// Check that a results table exposes a header row with at least the declared columns.
    ///
    /// Header names are matched case-insensitively and extra columns are allowed; the site adds
    /// columns freely but removing one of ours means the positional row parser is wrong.
    pub fn validate_table(&self, kind: EntityKind, table: ElementRef<'_>) -> Result<()> {
        let schema = self.schema(kind)?;

        if schema.required_columns.is_empty() {
            return Ok(());
        }

        let header_row = table
            .select(&THEAD)
            .next()
            .and_then(|thead| thead.select(&TR).next())
            .or_else(|| table.select(&TR).next())
            .ok_or_else(|| Error::SchemaDrift {
                entity: kind,
                detail: "no header row found in results table".to_string(),
            })?;

        let columns: Vec<String> = header_row
            .select(&TH)
            .map(|th| th.text().collect::<String>().trim().to_lowercase())
            .collect();

        if columns.is_empty() {
            return Err(Error::SchemaDrift {
                entity: kind,
                detail: "no <th> column headers found in results table".to_string(),
            });
        }

        if columns.len() < schema.required_columns.len() {
            return Err(Error::SchemaDrift {
                entity: kind,
                detail: format!(
                    "results table has {} column(s), expected at least {}: found [{}]",
                    columns.len(),
                    schema.required_columns.len(),
                    columns.join(", ")
                ),
            });
        }

        let missing: Vec<&str> = schema
            .required_columns
            .iter()
            .filter(|required| !columns.iter().any(|column| column == &required.to_lowercase()))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaDrift {
                entity: kind,
                detail: format!(
                    "missing required column(s): {}; found [{}]",
                    missing.join(", "),
                    columns.join(", ")
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::Html;
    use serde_json::json;

    use crate::tests::asserts::*;

    use super::*;

    fn first_table(html: &Html) -> ElementRef<'_> {
        let table = Selector::parse("table").unwrap();
        html.select(&table).next().unwrap()
    }

    #[test]
    fn league_markers_accept_a_well_formed_page() {
        let guard = SchemaGuard::new();
        let page = r#"<script>series.push({id: 3714, name: "Wednesday Night"});</script>"#;

        guard.validate_markers(EntityKind::League, page).unwrap();
    }

    #[test]
    fn missing_series_array_is_drift() {
        let guard = SchemaGuard::new();
        let page = "<script>var x = [];</script>";

        let err = guard.validate_markers(EntityKind::League, page).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaDrift {
                entity: EntityKind::League,
                ..
            }
        ));
    }

    #[test]
    fn empty_content_is_drift() {
        let guard = SchemaGuard::new();

        assert_true!(guard.validate_markers(EntityKind::Series, "   \n ").is_err());
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let guard = SchemaGuard::new();

        assert!(matches!(
            guard.validate_markers(EntityKind::Team, "anything"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn null_field_fails_like_an_absent_one() {
        let guard = SchemaGuard::new();

        let absent = guard
            .validate_fields(EntityKind::League, &json!({"league_id": 1558, "url": "u"}))
            .unwrap_err();
        let null = guard
            .validate_fields(
                EntityKind::League,
                &json!({"league_id": 1558, "url": "u", "name": null}),
            )
            .unwrap_err();

        let detail_of = |err: Error| match err {
            Error::SchemaDrift { detail, .. } => detail,
            other => panic!("expected drift, got {other:?}"),
        };
        assert_eq!(detail_of(absent), detail_of(null));
    }

    #[test]
    fn complete_fields_pass() {
        let guard = SchemaGuard::new();

        guard
            .validate_fields(
                EntityKind::Series,
                &json!({"series_id": 3714, "name": "Wednesday Night", "url": "u", "extra": null}),
            )
            .unwrap();
    }

    #[test]
    fn table_with_required_columns_passes() {
        let guard = SchemaGuard::new();
        let html = Html::parse_fragment(
            "<table><thead><tr><th>FIN</th><th>CAR #</th><th>DRIVER</th><th>ST</th></tr></thead></table>",
        );

        guard.validate_table(EntityKind::Race, first_table(&html)).unwrap();
    }

    #[test]
    fn headerless_table_is_drift() {
        let guard = SchemaGuard::new();
        let html = Html::parse_fragment("<table><tbody><tr><td>1</td></tr></tbody></table>");

        let result = guard.validate_table(EntityKind::Race, first_table(&html));
        assert_true!(result.is_err());
    }

    #[test]
    fn missing_driver_column_is_drift() {
        let guard = SchemaGuard::new();
        let html = Html::parse_fragment("<table><tr><th>FIN</th><th>CAR #</th><th>PTS</th></tr></table>");

        let err = guard.validate_table(EntityKind::Race, first_table(&html)).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaDrift {
                entity: EntityKind::Race,
                ..
            }
        ));
    }

    #[test]
    fn header_matching_is_case_insensitive_and_allows_extras() {
        let guard = SchemaGuard::new();
        let html = Html::parse_fragment(
            "<table><tr><th>Fin</th><th>Driver</th><th>Int</th><th>Laps</th><th>Pts</th></tr></table>",
        );

        guard.validate_table(EntityKind::Race, first_table(&html)).unwrap();
    }
}
