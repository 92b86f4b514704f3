//! League extractor: league metadata plus the series (and teams-page) references discovered on
//! the league's series page.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::{
    error::Result,
    fetch::FetchGate,
    id::{EntityKind, LeagueID, SeriesID},
    site::{
        extract::{TITLE, text_of},
        payload,
        schema::SchemaGuard,
        urls,
    },
};

static DROPDOWN_BUTTON: LazyLock<Selector> = LazyLock::new(|| Selector::parse("button.dropdown-toggle").unwrap());
static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3, h4").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static PAGE_TITLE_DESCR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.pageTitleDescr").unwrap());
static LEAGUE_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.league-description").unwrap());
static SERIES_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr.jsTableRow").unwrap());
static SERIES_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="series_seasons.php?series_id="]"#).unwrap());
static TEAMS_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"a[href*="teams.php?league_id="]"#).unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Headings the site reuses on every page; never acceptable as a league name.
const GENERIC_HEADINGS: [&str; 4] = ["League Series", "Series", "Seasons", "Race Results"];
const GENERIC_TITLES: [&str; 3] = ["League Series", "Series Seasons", "Race Results"];

/// League metadata parsed from the league series page.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct LeagueMeta {
    /// External league id, parsed from the URL.
    pub league_id: LeagueID,
    /// League display name (see the fallback chain in [`league_name`]).
    pub name: String,
    /// League description, when the page carries one.
    pub description: Option<String>,
    /// The fetched URL.
    pub url: String,
}

/// A series discovered on a league page, with everything the parent page gives away for free.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct SeriesRef {
    /// External series id.
    pub series_id: SeriesID,
    /// Series name as the league page's embedded data spells it. The league page is the
    /// authoritative source for series names; series pages carry generic titles.
    pub name: String,
    /// Canonical series URL.
    pub url: String,
    /// Series description from the league page's series table, when present.
    pub description: Option<String>,
    /// Series creation date (`YYYY-MM-DD`), derived from the embedded Unix timestamp.
    pub created_date: Option<String>,
    /// Declared season count, when present.
    pub num_seasons: Option<u32>,
}

/// Everything extracted from one league page.
#[derive(Clone, PartialEq, Debug)]
pub struct LeaguePage {
    /// League metadata.
    pub metadata: LeagueMeta,
    /// Discovered series references, in page order.
    pub series: Vec<SeriesRef>,
    /// The league's teams page, when advertised (or constructed, since most leagues have one).
    pub teams_url: Option<String>,
}

/// Extractor for league series pages (static fetch).
#[derive(Debug)]
pub struct LeagueExtractor<'a> {
    gate: &'a FetchGate,
    guard: SchemaGuard,
}

impl<'a> LeagueExtractor<'a> {
    /// Create a league extractor borrowing the run's shared fetch gate.
    pub fn new(gate: &'a FetchGate) -> Self {
        Self {
            gate,
            guard: SchemaGuard::new(),
        }
    }

    /// Fetch and parse a league series page.
    pub fn extract(&self, url: &str) -> Result<LeaguePage> {
        urls::require_shape(url, EntityKind::League)?;
        let league_id = urls::league_id_from(url)?;

        let doc = self.gate.fetch_static(url)?;
        self.parse(&doc, url, league_id)
    }

    pub(crate) fn parse(&self, doc: &Html, url: &str, league_id: LeagueID) -> Result<LeaguePage> {
        let raw = doc.html();
        self.guard.validate_markers(EntityKind::League, &raw)?;

        let metadata = LeagueMeta {
            league_id,
            name: league_name(doc),
            description: league_description(doc),
            url: url.to_string(),
        };
        self.guard
            .validate_fields(EntityKind::League, &serde_json::to_value(&metadata)?)?;

        let series = series_refs(doc, &raw);
        let teams_url = teams_url(doc, league_id);

        Ok(LeaguePage {
            metadata,
            series,
            teams_url,
        })
    }
}

/// Extract the league name, tolerating the site's generic page titles.
///
/// Strategies, in order: the dropdown button carrying *both* the `dropdown-toggle` and `bold`
/// classes (the one place the site prints the league's actual name), secondary headings that are
/// not generic boilerplate, the page title with its `Sim Racer Hub:` prefix stripped, the `h1`,
/// and finally a constant.
fn league_name(doc: &Html) -> String {
    for button in doc.select(&DROPDOWN_BUTTON) {
        let has_bold = button.value().classes().any(|class| class == "bold");
        if has_bold {
            let name = text_of(button);
            if name.len() > 3 {
                return name;
            }
        }
    }

    for heading in doc.select(&HEADINGS) {
        let name = text_of(heading);
        if !name.is_empty() && !GENERIC_HEADINGS.contains(&name.as_str()) {
            return name;
        }
    }

    if let Some(title) = doc.select(&TITLE).next() {
        let title_text = text_of(title);
        if let Some((_, right)) = title_text.split_once(':') {
            let name = right.trim();
            if !name.is_empty() && !GENERIC_TITLES.contains(&name) {
                return name.to_string();
            }
        }
    }

    if let Some(h1) = doc.select(&H1).next() {
        let name = text_of(h1);
        if !name.is_empty() && !GENERIC_TITLES.contains(&name.as_str()) {
            return name;
        }
    }

    "Unknown League".to_string()
}

fn league_description(doc: &Html) -> Option<String> {
    for selector in [&*PAGE_TITLE_DESCR, &*LEAGUE_DESCRIPTION] {
        if let Some(element) = doc.select(selector).next() {
            let description = text_of(element);
            if !description.is_empty() {
                return Some(description);
            }
        }
    }

    None
}

/// Combine the embedded `series.push` payload (ids, names, creation timestamps, season counts)
/// with per-row descriptions harvested from the series table.
fn series_refs(doc: &Html, raw: &str) -> Vec<SeriesRef> {
    let descriptions: Vec<(SeriesID, String)> = doc
        .select(&SERIES_ROW)
        .filter_map(|row| {
            let link = row.select(&SERIES_LINK).next()?;
            let href = link.value().attr("href")?;
            let series_id = urls::series_id_from(href).ok()?;

            // Row layout: Active | Name | URL | Stats | Description | Created | Seasons.
            let cells: Vec<_> = row.select(&TD).collect();
            let description = text_of(*cells.get(4)?);
            (!description.is_empty()).then_some((series_id, description))
        })
        .collect();

    payload::series_entries(raw)
        .into_iter()
        .map(|entry| {
            let description = descriptions
                .iter()
                .find(|(id, _)| *id == entry.id)
                .map(|(_, text)| text.clone());

            SeriesRef {
                series_id: entry.id,
                url: urls::series_url(entry.id),
                name: entry.name,
                description,
                created_date: entry.scrt.and_then(date_from_unix),
                num_seasons: entry.num_seasons,
            }
        })
        .collect()
}

fn date_from_unix(seconds: i64) -> Option<String> {
    const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
        format_description!("[year]-[month]-[day]");

    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|dt| dt.format(&DATE_FORMAT).ok())
}

fn teams_url(doc: &Html, league_id: LeagueID) -> Option<String> {
    if let Some(link) = doc.select(&TEAMS_LINK).next()
        && let Some(href) = link.value().attr("href")
        && !href.is_empty()
    {
        return Some(urls::absolute(href));
    }

    // Most leagues expose a roster page even when it is not linked from here.
    Some(urls::teams_url(league_id))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    fn extractor_fixture(html: &str) -> Result<LeaguePage> {
        let gate = FetchGate::default();
        let extractor = LeagueExtractor::new(&gate);
        let doc = Html::parse_document(html);
        extractor.parse(&doc, &urls::league_url(1558), 1558)
    }

    const LEAGUE_PAGE: &str = r#"
        <html>
        <head><title>Sim Racer Hub: League Series</title></head>
        <body>
          <button class="dropdown-toggle bold">The OBRL</button>
          <div class="pageTitleDescr">Online racing five nights a week.</div>
          <table>
            <tr class="jsTableRow">
              <td>Y</td><td>Wednesday Night</td>
              <td><a href="series_seasons.php?series_id=3714">link</a></td>
              <td>stats</td><td>Fixed-setup oval series.</td><td>2020-01-01</td><td>12</td>
            </tr>
          </table>
          <a href="teams.php?league_id=1558">Teams</a>
          <script>
            var series = [];
            series.push({id: 3714, name: "Wednesday Night", scrt: 1577836800, nsea: 12});
            series.push({id: 3713, name: "Thursday Trucks"});
            series.push({id: 3712, name: "Friday Fixed"});
          </script>
        </body>
        </html>
    "#;

    #[test]
    fn parses_a_well_formed_league_page() {
        let page = extractor_fixture(LEAGUE_PAGE).unwrap();

        assert_eq!(page.metadata.league_id, 1558);
        assert_eq!(page.metadata.name, "The OBRL");
        assert_eq!(page.metadata.description.as_deref(), Some("Online racing five nights a week."));

        assert_eq!(page.series.len(), 3);
        assert_eq!(page.series[0].series_id, 3714);
        assert_eq!(page.series[0].name, "Wednesday Night");
        assert_eq!(page.series[0].description.as_deref(), Some("Fixed-setup oval series."));
        assert_eq!(page.series[0].created_date.as_deref(), Some("2020-01-01"));
        assert_eq!(page.series[0].num_seasons, Some(12));
        assert_eq!(page.series[1].description, None);
        assert_eq!(
            page.series[2].url,
            "https://www.simracerhub.com/series_seasons.php?series_id=3712"
        );

        assert_eq!(
            page.teams_url.as_deref(),
            Some("https://www.simracerhub.com/teams.php?league_id=1558")
        );
    }

    #[test]
    fn name_falls_back_past_generic_headings() {
        let html = r#"
            <html><head><title>Sim Racer Hub: My Racing League</title></head>
            <body><h1>League Series</h1>
            <script>series.push({id: 1, name: "A"});</script></body></html>
        "#;

        let page = extractor_fixture(html).unwrap();
        assert_eq!(page.metadata.name, "My Racing League");
    }

    #[test]
    fn name_falls_back_to_constant_when_everything_is_generic() {
        let html = r#"
            <html><head><title>League Series</title></head>
            <body><h1>League Series</h1>
            <script>series.push({id: 1, name: "A"});</script></body></html>
        "#;

        let page = extractor_fixture(html).unwrap();
        assert_eq!(page.metadata.name, "Unknown League");
    }

    #[test]
    fn page_without_series_payload_is_schema_drift(){
        let html = "<html><body><h2>Some League</h2></body></html>";

        let result = extractor_fixture(html);
        assert_true!(matches!(
            result,
            Err(crate::error::Error::SchemaDrift {
                entity: EntityKind::League,
                ..
            })
        ));
    }

    #[test]
    fn foreign_url_is_rejected_before_fetching() {
        let gate = FetchGate::default();
        let extractor = LeagueExtractor::new(&gate);

        let result = extractor.extract("https://www.simracerhub.com/series_seasons.php?series_id=3714");
        assert_true!(matches!(result, Err(crate::error::Error::Validation(_))));
    }
}
