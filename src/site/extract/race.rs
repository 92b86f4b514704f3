//! Race extractor: fine-grained race metadata plus the results table from a race detail page.
//!
//! A race row is assembled from two sources in priority order: the embedded schedule payload
//! (authoritative for pre-race configuration, track identity, weather, and flags) and the
//! rendered session-details block (authoritative for realized statistics, always overlaid on
//! top). Result rows parse positionally from the wide results table.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::{
    error::Result,
    fetch::FetchGate,
    id::{DriverID, EntityKind, ScheduleID},
    site::{
        extract::{heading_or_title_name, text_of},
        payload::{self, RaceSchedulePayload},
        schema::SchemaGuard,
        urls, when,
    },
};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TBODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static A: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static TRACK_NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.track-name").unwrap());
static TRACK_META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.track-meta").unwrap());
static TRACK_META_TYPE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.track-meta i").unwrap());
static SESSION_DETAILS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.session-details").unwrap());

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:(\d+)h)?\s*(\d+)m").unwrap());
static TEMPERATURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(-?\d+)\s*°\s*([CF])").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").unwrap());
static WIND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Z]{1,3})\s*@\s*(\d+)\s*([A-Za-z/]+)").unwrap());
static BR_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").unwrap());

/// Race metadata assembled from the embedded payload and the rendered statistics block.
#[derive(Serialize, Clone, Default, PartialEq, Debug)]
pub struct RaceMeta {
    /// External schedule id, parsed from the URL.
    pub schedule_id: ScheduleID,
    /// The fetched URL.
    pub url: String,
    /// Event display name.
    pub event_name: Option<String>,
    /// Race number within the season, when the payload carries it.
    pub race_number: Option<u32>,
    /// Event date, RFC 3339 UTC.
    pub date: Option<String>,
    /// Scheduled green-flag time as printed.
    pub race_time: Option<String>,
    /// Scheduled practice time as printed.
    pub practice_time: Option<String>,
    /// Track id.
    pub track_id: Option<u32>,
    /// Track configuration id.
    pub track_config_id: Option<u32>,
    /// Track display name.
    pub track_name: Option<String>,
    /// Track type, e.g. `"Oval"`.
    pub track_type: Option<String>,
    /// Track length in miles.
    pub track_length: Option<f64>,
    /// The simulator's own track-configuration identifier.
    pub track_config_iracing_id: Option<String>,
    /// Planned lap count.
    pub planned_laps: Option<u32>,
    /// Whether the race scores points.
    pub points_race: Option<bool>,
    /// Whether the schedule entry is an off week.
    pub off_week: Option<bool>,
    /// Whether the race runs at night.
    pub night_race: Option<bool>,
    /// Whether the race is part of a playoff.
    pub playoff_race: Option<bool>,
    /// Realized race duration in minutes.
    pub race_duration_minutes: Option<u32>,
    /// Realized total laps.
    pub total_laps: Option<u32>,
    /// Number of distinct leaders.
    pub leaders: Option<u32>,
    /// Number of lead changes.
    pub lead_changes: Option<u32>,
    /// Number of cautions.
    pub cautions: Option<u32>,
    /// Number of caution laps.
    pub caution_laps: Option<u32>,
    /// Number of classified drivers.
    pub num_drivers: Option<u32>,
    /// Weather mode, e.g. `"Realistic weather"`.
    pub weather_type: Option<String>,
    /// Sky conditions.
    pub cloud_conditions: Option<String>,
    /// Air temperature in Fahrenheit (Celsius readings are converted).
    pub temperature_f: Option<i32>,
    /// Relative humidity in percent.
    pub humidity_pct: Option<i32>,
    /// Fog in percent.
    pub fog_pct: Option<i32>,
    /// Wind direction.
    pub wind_dir: Option<String>,
    /// Wind speed as printed.
    pub wind_speed: Option<String>,
    /// Wind speed unit.
    pub wind_unit: Option<String>,
}

/// One row of the results table, parsed positionally. Blank and `"-"` cells are absent fields.
#[derive(Serialize, Clone, Default, PartialEq, Debug)]
pub struct ResultRow {
    /// Finish position.
    pub finish_position: u32,
    /// Car number as printed (may carry a leading zero).
    pub car_number: String,
    /// Driver display name.
    pub driver_name: Option<String>,
    /// Driver external id; only present when the name cell links to a driver profile.
    pub driver_id: Option<DriverID>,
    /// Starting position.
    pub starting_position: Option<u32>,
    /// Qualifying time as printed.
    pub qualifying_time: Option<String>,
    /// Interval to the leader as printed.
    pub interval: Option<String>,
    /// Race points.
    pub race_points: Option<i32>,
    /// Bonus points.
    pub bonus_points: Option<i32>,
    /// Total points.
    pub total_points: Option<i32>,
    /// Laps completed.
    pub laps_completed: Option<u32>,
    /// Laps led.
    pub laps_led: Option<u32>,
    /// Fastest lap time as printed.
    pub fastest_lap: Option<String>,
    /// Lap on which the fastest lap was set.
    pub fastest_lap_number: Option<u32>,
    /// Incident points.
    pub incidents: Option<i32>,
    /// Average lap time as printed.
    pub average_lap: Option<String>,
    /// Final status, e.g. `"Running"`, `"DNF"`.
    pub status: Option<String>,
    /// Car model.
    pub car: Option<String>,
    /// Fast lap count.
    pub fast_laps: Option<u32>,
    /// Quality passes.
    pub quality_passes: Option<u32>,
    /// Closing passes.
    pub closing_passes: Option<u32>,
    /// Total passes.
    pub total_passes: Option<u32>,
    /// Average running position.
    pub average_running_position: Option<f64>,
    /// Driver skill rating snapshot at race time.
    pub irating: Option<i32>,
    /// Team name as printed in the results table.
    pub team: Option<String>,
}

/// Everything extracted from one race detail page.
#[derive(Clone, PartialEq, Debug)]
pub struct RacePage {
    /// Assembled race metadata.
    pub metadata: RaceMeta,
    /// Result rows in finish-position order as emitted by the table.
    pub results: Vec<ResultRow>,
}

/// Extractor for race detail pages (rendered fetch; the results table is drawn by React).
#[derive(Debug)]
pub struct RaceExtractor<'a> {
    gate: &'a FetchGate,
    guard: SchemaGuard,
}

impl<'a> RaceExtractor<'a> {
    /// Create a race extractor borrowing the run's shared fetch gate.
    pub fn new(gate: &'a FetchGate) -> Self {
        Self {
            gate,
            guard: SchemaGuard::new(),
        }
    }

    /// Fetch (rendered) and parse a race detail page.
    pub fn extract(&self, url: &str) -> Result<RacePage> {
        urls::require_shape(url, EntityKind::Race)?;
        let schedule_id = urls::schedule_id_from(url)?;

        let doc = self.gate.fetch_rendered(url)?;
        self.parse(&doc, url, schedule_id)
    }

    pub(crate) fn parse(&self, doc: &Html, url: &str, schedule_id: ScheduleID) -> Result<RacePage> {
        let raw = doc.html();
        self.guard.validate_markers(EntityKind::Race, &raw)?;

        let results = match doc.select(&TABLE).next() {
            Some(table) => {
                self.guard.validate_table(EntityKind::Race, table)?;
                parse_results(table)
            }
            None => Vec::new(),
        };

        let mut metadata = assemble_metadata(doc, payload::race_schedule_payload(&raw));
        metadata.schedule_id = schedule_id;
        metadata.url = url.to_string();
        metadata.event_name = Some(
            metadata
                .event_name
                .take()
                .unwrap_or_else(|| heading_or_title_name(doc, "Unknown Race")),
        );
        metadata.num_drivers = Some(u32::try_from(results.len()).unwrap_or(u32::MAX));

        self.guard
            .validate_fields(EntityKind::Race, &serde_json::to_value(&metadata)?)?;

        Ok(RacePage { metadata, results })
    }
}

/// Realized statistics parsed from the session-details block's first segment.
#[derive(Default, Debug, PartialEq)]
struct SessionStats {
    duration_minutes: Option<u32>,
    total_laps: Option<u32>,
    leaders: Option<u32>,
    lead_changes: Option<u32>,
    cautions: Option<u32>,
    caution_laps: Option<u32>,
}

/// Weather parsed from the session-details block's second segment.
#[derive(Default, Debug, PartialEq)]
struct SessionWeather {
    weather_type: Option<String>,
    cloud_conditions: Option<String>,
    temperature_f: Option<i32>,
    humidity_pct: Option<i32>,
    fog_pct: Option<i32>,
    wind_dir: Option<String>,
    wind_speed: Option<String>,
    wind_unit: Option<String>,
}

/// Start from the embedded payload, then overlay DOM-derived data: realized statistics always
/// win; configuration and weather fields from the DOM only fill payload gaps.
fn assemble_metadata(doc: &Html, schedule: Option<RaceSchedulePayload>) -> RaceMeta {
    let schedule = schedule.unwrap_or_default();

    let (stats, weather) = session_details(doc);

    let dom_track_name = doc.select(&TRACK_NAME).next().map(text_of).filter(|s| !s.is_empty());
    let (dom_date, dom_track_type) = track_meta(doc);

    RaceMeta {
        schedule_id: 0,
        url: String::new(),
        event_name: schedule.event_name,
        race_number: schedule.race_number,
        date: dom_date,
        race_time: schedule.race_time,
        practice_time: schedule.practice_time,
        track_id: schedule.track_id,
        track_config_id: schedule.track_config_id,
        track_name: schedule.track_name.or(dom_track_name),
        track_type: schedule.track_type.or(dom_track_type),
        track_length: schedule.track_length,
        track_config_iracing_id: schedule.track_config_iracing_id,
        planned_laps: schedule.planned_laps,
        points_race: schedule.points_race,
        off_week: schedule.off_week,
        night_race: schedule.night_race,
        playoff_race: schedule.playoff_race,
        race_duration_minutes: stats.duration_minutes,
        total_laps: stats.total_laps,
        leaders: stats.leaders,
        lead_changes: stats.lead_changes,
        cautions: stats.cautions,
        caution_laps: stats.caution_laps,
        num_drivers: None,
        weather_type: schedule.weather_type.or(weather.weather_type),
        cloud_conditions: schedule.cloud_conditions.or(weather.cloud_conditions),
        temperature_f: schedule.temperature_f.or(weather.temperature_f),
        humidity_pct: schedule.humidity_pct.or(weather.humidity_pct),
        fog_pct: schedule.fog_pct.or(weather.fog_pct),
        wind_dir: schedule.wind_dir.or(weather.wind_dir),
        wind_speed: schedule.wind_speed.or(weather.wind_speed),
        wind_unit: schedule.wind_unit.or(weather.wind_unit),
    }
}

/// The `div.track-meta` line: `"Mar 16, 2022 · Oval - 2008"` → (date, track type).
fn track_meta(doc: &Html) -> (Option<String>, Option<String>) {
    let Some(meta) = doc.select(&TRACK_META).next() else {
        return (None, None);
    };

    let meta_text = meta.text().collect::<Vec<_>>().join(" ");
    let date = when::find_schedule_date(&meta_text);

    let track_type = doc.select(&TRACK_META_TYPE).next().map(|tag| {
        let tag_text = text_of(tag);
        match tag_text.split_once(" - ") {
            Some((kind, _year)) => kind.trim().to_string(),
            None => tag_text,
        }
    });

    (date, track_type.filter(|s| !s.is_empty()))
}

/// Split the session-details block on its line break: statistics segment, weather segment.
fn session_details(doc: &Html) -> (SessionStats, SessionWeather) {
    let Some(details) = doc.select(&SESSION_DETAILS).next() else {
        return (SessionStats::default(), SessionWeather::default());
    };

    let inner = details.inner_html();
    let mut segments = BR_SPLIT_RE.splitn(&inner, 2);

    let stats_line = segments.next().map(fragment_text).unwrap_or_default();
    let weather_line = segments.next().map(fragment_text).unwrap_or_default();

    (parse_stats_line(&stats_line), parse_weather_line(&weather_line))
}

fn fragment_text(fragment_html: &str) -> String {
    let fragment = Html::parse_fragment(fragment_html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse `"1h 11m · 140 laps · 5 Leaders · 9 Lead Changes · 4 cautions (17 laps)"`.
fn parse_stats_line(line: &str) -> SessionStats {
    let mut stats = SessionStats::default();

    for part in line.split('·').map(str::trim) {
        if part.is_empty() {
            continue;
        }

        if let Some(captures) = DURATION_RE.captures(part)
            && (part.contains('h') || part.ends_with('m'))
            && stats.duration_minutes.is_none()
            && !part.contains("laps")
        {
            let hours: u32 = captures.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let minutes: u32 = captures[2].parse().unwrap_or(0);
            stats.duration_minutes = Some(hours * 60 + minutes);
        } else if let Some(laps) = part.strip_suffix(" laps")
            && !part.contains("cautions")
        {
            stats.total_laps = laps.trim().parse().ok();
        } else if let Some(leaders) = part.strip_suffix("Leaders") {
            stats.leaders = leaders.trim().parse().ok();
        } else if let Some(changes) = part.strip_suffix("Lead Changes") {
            stats.lead_changes = changes.trim().parse().ok();
        } else if part.contains("cautions") {
            match part.split_once('(') {
                Some((count, laps)) => {
                    stats.cautions = count.replace("cautions", "").trim().parse().ok();
                    stats.caution_laps = laps.replace("laps)", "").trim().parse().ok();
                }
                None => {
                    stats.cautions = part.replace("cautions", "").trim().parse().ok();
                    stats.caution_laps = Some(0);
                }
            }
        }
    }

    stats
}

/// Parse `"Realistic weather · Clear · 88° F · Humidity 55% · Fog 0% · Wind N @2 MPH"`.
fn parse_weather_line(line: &str) -> SessionWeather {
    let mut weather = SessionWeather::default();

    for part in line.split('·').map(str::trim) {
        if part.is_empty() {
            continue;
        }

        if part.to_lowercase().contains("weather") {
            weather.weather_type = Some(part.to_string());
        } else if ["Cloudy", "Clear", "Overcast", "Rain", "Storm"]
            .iter()
            .any(|sky| part.contains(sky))
        {
            weather.cloud_conditions = Some(part.to_string());
        } else if let Some(captures) = TEMPERATURE_RE.captures(part) {
            let reading: i32 = captures[1].parse().unwrap_or(0);
            weather.temperature_f = Some(match &captures[2] {
                "C" => (f64::from(reading) * 9.0 / 5.0 + 32.0).round() as i32,
                _ => reading,
            });
        } else if let Some(rest) = part.strip_prefix("Humidity") {
            weather.humidity_pct = percent(rest);
        } else if let Some(rest) = part.strip_prefix("Fog") {
            weather.fog_pct = percent(rest);
        } else if let Some(rest) = part.strip_prefix("Wind") {
            if let Some(captures) = WIND_RE.captures(rest) {
                weather.wind_dir = Some(captures[1].to_string());
                weather.wind_speed = Some(captures[2].to_string());
                weather.wind_unit = Some(captures[3].to_string());
            }
        }
    }

    weather
}

fn percent(text: &str) -> Option<i32> {
    PERCENT_RE.captures(text).and_then(|captures| captures[1].parse().ok())
}

/// Parse the wide results table body by positional column index.
///
/// Column layout: FIN, CAR #, DRIVER, ST, QUAL TIME, INT, RACE PTS, BNS PTS, TOT PTS, LAPS,
/// LAPS LED, FASTEST LAP, FAST LAP #, INC, AVG LAP, STATUS, CAR, FAST LAPS, QUALITY PASSES,
/// CLOSING PASSES, TOTAL PASSES, ARP, DRIVER RATING, TEAM; trailing columns are ignored.
fn parse_results(table: ElementRef<'_>) -> Vec<ResultRow> {
    let Some(tbody) = table.select(&TBODY).next() else {
        return Vec::new();
    };

    tbody
        .select(&TR)
        .filter_map(|row| {
            let cells: Vec<_> = row.select(&TD).collect();
            if cells.len() < 3 {
                return None;
            }
            parse_result_row(&cells)
        })
        .collect()
}

fn parse_result_row(cells: &[ElementRef<'_>]) -> Option<ResultRow> {
    let cell = |index: usize| -> Option<String> {
        let text = text_of(*cells.get(index)?);
        (!text.is_empty() && text != "-").then_some(text)
    };
    let int = |index: usize| cell(index).and_then(|text| text.parse::<i32>().ok());
    let uint = |index: usize| cell(index).and_then(|text| text.parse::<u32>().ok());
    let float = |index: usize| cell(index).and_then(|text| text.parse::<f64>().ok());

    let finish_position: u32 = cell(0)?.parse().ok()?;
    let car_number = cell(1).unwrap_or_else(|| "0".to_string());

    let (driver_name, driver_id) = match cells.get(2) {
        Some(driver_cell) => match driver_cell.select(&A).next() {
            Some(link) => {
                let id = link
                    .value()
                    .attr("href")
                    .and_then(|href| urls::driver_id_from(href).ok());
                (Some(text_of(link)), id)
            }
            None => {
                let name = text_of(*driver_cell);
                ((!name.is_empty()).then_some(name), None)
            }
        },
        None => (None, None),
    };

    Some(ResultRow {
        finish_position,
        car_number,
        driver_name,
        driver_id,
        starting_position: uint(3),
        qualifying_time: cell(4),
        interval: cell(5),
        race_points: int(6),
        bonus_points: int(7),
        total_points: int(8),
        laps_completed: uint(9),
        laps_led: uint(10),
        fastest_lap: cell(11),
        fastest_lap_number: uint(12),
        incidents: int(13),
        average_lap: cell(14),
        status: cell(15),
        car: cell(16),
        fast_laps: uint(17),
        quality_passes: uint(18),
        closing_passes: uint(19),
        total_passes: uint(20),
        average_running_position: float(21),
        irating: float(22).map(|rating| rating as i32),
        team: cell(23),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    fn parse_fixture(html: &str) -> Result<RacePage> {
        let gate = FetchGate::default();
        let extractor = RaceExtractor::new(&gate);
        let doc = Html::parse_document(html);
        extractor.parse(&doc, &urls::race_url(324_462), 324_462)
    }

    fn results_table(rows: &str) -> String {
        format!(
            r#"<table>
                 <thead><tr>
                   <th>FIN</th><th>CAR #</th><th>DRIVER</th><th>ST</th><th>QUAL TIME</th>
                   <th>INT</th><th>RACE PTS</th><th>BNS PTS</th><th>TOT PTS</th><th>LAPS</th>
                   <th>LAPS LED</th><th>FASTEST LAP</th><th>FAST LAP #</th><th>INC</th>
                   <th>AVG LAP</th><th>STATUS</th><th>CAR</th><th>FAST LAPS</th>
                   <th>QUALITY PASSES</th><th>CLOSING PASSES</th><th>TOTAL PASSES</th>
                   <th>ARP</th><th>DRIVER RATING</th><th>TEAM</th>
                 </tr></thead>
                 <tbody>{rows}</tbody>
               </table>"#
        )
    }

    fn race_page(body: &str) -> String {
        format!("<html><head><title>Bristol 200 - Results</title></head><body><h1>Bristol 200</h1>{body}</body></html>")
    }

    const WINNER_ROW: &str = r#"
        <tr>
          <td>1</td><td>24</td>
          <td><a href="driver_stats.php?driver_id=98765">Doe, John Jr.</a></td>
          <td>3</td><td>15.123</td><td>-</td><td>43</td><td>5</td><td>48</td>
          <td>140</td><td>88</td><td>15.456</td><td>17</td><td>0</td><td>15.789</td>
          <td>Running</td><td>Gen 4 Cup</td><td>12</td><td>4</td><td>2</td><td>11</td>
          <td>2.3</td><td>3126.0</td><td>Team Alpha</td>
        </tr>"#;

    const NO_LINK_ROW: &str = r#"
        <tr>
          <td>2</td><td>7</td><td>Jane Smith</td>
          <td>1</td><td></td><td>-1.2</td><td>40</td><td>-</td><td>40</td>
          <td>140</td><td>52</td><td></td><td></td><td>4</td><td></td>
          <td>Running</td><td>Gen 4 Cup</td><td>3</td><td></td><td></td><td></td>
          <td>4.1</td><td></td><td></td>
        </tr>"#;

    #[test]
    fn parses_results_positionally() {
        let html = race_page(&results_table(&format!("{WINNER_ROW}{NO_LINK_ROW}")));
        let page = parse_fixture(&html).unwrap();

        assert_eq!(page.results.len(), 2);

        let winner = &page.results[0];
        assert_eq!(winner.finish_position, 1);
        assert_eq!(winner.car_number, "24");
        assert_eq!(winner.driver_name.as_deref(), Some("Doe, John Jr."));
        assert_eq!(winner.driver_id, Some(98_765));
        assert_eq!(winner.starting_position, Some(3));
        assert_eq!(winner.interval, None, "a dash cell is an absent field");
        assert_eq!(winner.race_points, Some(43));
        assert_eq!(winner.total_points, Some(48));
        assert_eq!(winner.laps_completed, Some(140));
        assert_eq!(winner.fastest_lap_number, Some(17));
        assert_eq!(winner.average_running_position, Some(2.3));
        assert_eq!(winner.irating, Some(3126));
        assert_eq!(winner.team.as_deref(), Some("Team Alpha"));

        let second = &page.results[1];
        assert_eq!(second.driver_name.as_deref(), Some("Jane Smith"));
        assert_eq!(second.driver_id, None, "no anchor, no driver id");
        assert_eq!(second.bonus_points, None);
        assert_eq!(second.fastest_lap, None);

        assert_eq!(page.metadata.num_drivers, Some(2));
        assert_eq!(page.metadata.event_name.as_deref(), Some("Bristol 200"));
    }

    #[test]
    fn session_details_split_into_stats_and_weather() {
        let html = race_page(&format!(
            r#"<span class="track-name">Bristol Motor Speedway</span>
               <div class="track-meta">Mar 16, 2022 <span>·</span> <i>Oval - 2008</i></div>
               <div class="session-details">
                 1h 11m · <span>140 laps</span> · <span>5 Leaders</span> ·
                 <span>9 Lead Changes</span> · <span>4 cautions (17 laps)</span>
                 <br/>Realistic weather · <span>Clear</span> · <span>88° F</span> ·
                 <span>Humidity 55%</span> · <span>Fog 0%</span> · <span>Wind N @2 MPH</span>
               </div>
               {table}"#,
            table = results_table(WINNER_ROW)
        ));

        let page = parse_fixture(&html).unwrap();
        let meta = &page.metadata;

        assert_eq!(meta.race_duration_minutes, Some(71));
        assert_eq!(meta.total_laps, Some(140));
        assert_eq!(meta.leaders, Some(5));
        assert_eq!(meta.lead_changes, Some(9));
        assert_eq!(meta.cautions, Some(4));
        assert_eq!(meta.caution_laps, Some(17));

        assert_eq!(meta.track_name.as_deref(), Some("Bristol Motor Speedway"));
        assert_eq!(meta.track_type.as_deref(), Some("Oval"));
        assert_eq!(meta.date.as_deref(), Some("2022-03-16T00:00:00Z"));

        assert_eq!(meta.weather_type.as_deref(), Some("Realistic weather"));
        assert_eq!(meta.cloud_conditions.as_deref(), Some("Clear"));
        assert_eq!(meta.temperature_f, Some(88));
        assert_eq!(meta.humidity_pct, Some(55));
        assert_eq!(meta.fog_pct, Some(0));
        assert_eq!(meta.wind_dir.as_deref(), Some("N"));
        assert_eq!(meta.wind_speed.as_deref(), Some("2"));
        assert_eq!(meta.wind_unit.as_deref(), Some("MPH"));
    }

    #[test]
    fn celsius_temperatures_convert_to_fahrenheit() {
        let html = race_page(&format!(
            r#"<div class="session-details">45m · 60 laps<br/>Static weather · Overcast · 23° C · Humidity 40%</div>{table}"#,
            table = results_table(WINNER_ROW)
        ));

        let page = parse_fixture(&html).unwrap();
        assert_eq!(page.metadata.temperature_f, Some(73));
        assert_eq!(page.metadata.race_duration_minutes, Some(45));
        assert_eq!(page.metadata.cloud_conditions.as_deref(), Some("Overcast"));
    }

    #[test]
    fn payload_wins_over_dom_for_configuration() {
        let html = race_page(&format!(
            r#"<span class="track-name">DOM Track</span>
               <div class="session-details">1h 0m · 100 laps<br/>Realistic weather · Clear · 70° F</div>
               <script>
                 ReactDOM.render(El, {{schedule: {{"race_number": "7", "event_name": "Night 200",
                   "track_name": "Payload Track", "track_type": "Oval", "planned_laps": "200",
                   "points_race": "1", "night_race": "1", "temperature_f": "78"}}}})
               </script>
               {table}"#,
            table = results_table(WINNER_ROW)
        ));

        let page = parse_fixture(&html).unwrap();
        let meta = &page.metadata;

        assert_eq!(meta.event_name.as_deref(), Some("Night 200"));
        assert_eq!(meta.race_number, Some(7));
        assert_eq!(meta.track_name.as_deref(), Some("Payload Track"));
        assert_eq!(meta.planned_laps, Some(200));
        assert_eq!(meta.points_race, Some(true));
        assert_eq!(meta.night_race, Some(true));
        assert_eq!(meta.temperature_f, Some(78), "payload weather is authoritative");
        // Realized statistics still come from the rendered block.
        assert_eq!(meta.race_duration_minutes, Some(60));
        assert_eq!(meta.total_laps, Some(100));
    }

    #[test]
    fn tableless_page_is_schema_drift() {
        let result = parse_fixture("<html><body><h1>Bristol 200</h1></body></html>");

        assert_true!(matches!(
            result,
            Err(crate::error::Error::SchemaDrift {
                entity: EntityKind::Race,
                ..
            })
        ));
    }

    #[test]
    fn short_rows_are_skipped() {
        let html = race_page(&results_table("<tr><td>colspan filler</td></tr>"));
        let page = parse_fixture(&html).unwrap();

        assert_eq!(page.results, Vec::new());
        assert_eq!(page.metadata.num_drivers, Some(0));
    }
}
