//! Extraction of data the site embeds in JavaScript rather than markup.
//!
//! Three embedding styles exist and each parser here handles one:
//!
//! 1. `series.push({id: 3714, name: "Wednesday Night", ...});` on league pages,
//! 2. `seasons = [{id: 26741, n: "2025 S1", scrt: 1754380800, ns: 10, nr: 5}, ...];` on series
//!    pages,
//! 3. React props (`rps: [...]`, `schedule: {...}`) rendered into race and driver pages, where
//!    numeric values arrive as strings.
//!
//! The JavaScript object notation is normalized to JSON (quoting bare keys, rewriting single
//! quotes) and then deserialized into typed entries; entries that fail to parse or lack their
//! required fields are dropped rather than propagated, matching the harvest-what-you-can role
//! these payloads play for parent-discovery.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::id::{ScheduleID, SeasonID, SeriesID};

static SERIES_PUSH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"series\.push\(\{([^}]+)\}\)").unwrap());
static SEASONS_ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)seasons\s*=\s*\[(.*?)\];").unwrap());
static JS_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").unwrap());
static BARE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"([A-Za-z_]\w*)\s*:"#).unwrap());

/// One series reference harvested from a league page's `series.push` calls.
///
/// The live site abbreviates keys (`sid`/`sname`); fixture-era pages spell them out. Both are
/// accepted.
#[derive(Deserialize, Clone, PartialEq, Debug)]
pub struct SeriesEntry {
    /// External series id.
    #[serde(alias = "sid")]
    pub id: SeriesID,
    /// Series display name.
    #[serde(alias = "sname")]
    pub name: String,
    /// Series creation time as Unix seconds, when present.
    #[serde(default)]
    pub scrt: Option<i64>,
    /// Declared number of seasons, when present.
    #[serde(default, alias = "nsea")]
    pub num_seasons: Option<u32>,
}

/// One season reference harvested from a series page's `seasons` array.
#[derive(Deserialize, Clone, PartialEq, Debug)]
pub struct SeasonEntry {
    /// External season id.
    pub id: SeasonID,
    /// Season display name (`n` on the live site, `sname` in some revisions).
    #[serde(alias = "n", alias = "sname")]
    pub name: String,
    /// Season start time as Unix seconds.
    #[serde(default, rename = "scrt")]
    pub start_time: Option<i64>,
    /// Number of scheduled races.
    #[serde(default, rename = "ns")]
    pub scheduled_races: Option<u32>,
    /// Number of completed races.
    #[serde(default, rename = "nr")]
    pub completed_races: Option<u32>,
}

/// The embedded schedule payload on a race page: pre-race configuration as the site recorded it.
///
/// Authoritative for configuration, track identity, weather, and flags when present; realized
/// race statistics are overlaid from the rendered statistics block afterwards. All numeric
/// fields arrive as strings in the React props and are therefore parsed via `DisplayFromStr`.
#[serde_as]
#[derive(Deserialize, Clone, Default, Debug)]
pub struct RaceSchedulePayload {
    /// External schedule id, when the payload repeats it.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub schedule_id: Option<ScheduleID>,
    /// Event display name.
    #[serde(default)]
    pub event_name: Option<String>,
    /// Race number within the season.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub race_number: Option<u32>,
    /// Scheduled green-flag time as printed by the site.
    #[serde(default)]
    pub race_time: Option<String>,
    /// Scheduled practice time as printed by the site.
    #[serde(default)]
    pub practice_time: Option<String>,
    /// Track id.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub track_id: Option<u32>,
    /// Track configuration id.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub track_config_id: Option<u32>,
    /// Track display name.
    #[serde(default)]
    pub track_name: Option<String>,
    /// Track type, e.g. `"Oval"` or `"Road Course"`.
    #[serde(default)]
    pub track_type: Option<String>,
    /// Track length in miles.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub track_length: Option<f64>,
    /// The simulator's own track-configuration identifier.
    #[serde(default)]
    pub track_config_iracing_id: Option<String>,
    /// Planned lap count.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub planned_laps: Option<u32>,
    /// Whether the race scores points.
    #[serde(default, deserialize_with = "flag")]
    pub points_race: Option<bool>,
    /// Whether the schedule entry is an off week.
    #[serde(default, deserialize_with = "flag")]
    pub off_week: Option<bool>,
    /// Whether the race runs at night.
    #[serde(default, deserialize_with = "flag")]
    pub night_race: Option<bool>,
    /// Whether the race is part of a playoff.
    #[serde(default, deserialize_with = "flag")]
    pub playoff_race: Option<bool>,
    /// Weather mode, e.g. `"Realistic weather"`.
    #[serde(default)]
    pub weather_type: Option<String>,
    /// Sky conditions, e.g. `"Clear"`, `"Partly Cloudy"`.
    #[serde(default, alias = "sky")]
    pub cloud_conditions: Option<String>,
    /// Air temperature in Fahrenheit.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub temperature_f: Option<i32>,
    /// Relative humidity in percent.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub humidity_pct: Option<i32>,
    /// Fog in percent.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub fog_pct: Option<i32>,
    /// Wind direction, e.g. `"N"`.
    #[serde(default)]
    pub wind_dir: Option<String>,
    /// Wind speed as printed.
    #[serde(default)]
    pub wind_speed: Option<String>,
    /// Wind speed unit, e.g. `"MPH"`.
    #[serde(default)]
    pub wind_unit: Option<String>,
}

/// Accepts booleans, 0/1 numbers, and their string spellings; anything else is `None`.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::Number(n)) => n.as_i64().map(|n| n != 0),
        Some(serde_json::Value::String(s)) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Normalize JavaScript object-literal content (without braces) to a JSON object string.
fn js_object_to_json(js: &str) -> String {
    let quoted = BARE_KEY_RE.replace_all(js, "\"$1\":");
    let normalized = quoted.replace('\'', "\"");

    format!("{{{}}}", normalized.trim().trim_start_matches('{').trim_end_matches('}'))
}

fn parse_objects<T: serde::de::DeserializeOwned>(object_bodies: impl Iterator<Item = String>) -> Vec<T> {
    object_bodies
        .filter_map(|body| serde_json::from_str::<T>(&js_object_to_json(&body)).ok())
        .collect()
}

/// Harvest the series references embedded in a league page.
pub fn series_entries(html: &str) -> Vec<SeriesEntry> {
    parse_objects(SERIES_PUSH_RE.captures_iter(html).map(|captures| captures[1].to_string()))
}

/// Harvest the season references embedded in a series page.
pub fn season_entries(html: &str) -> Vec<SeasonEntry> {
    let Some(captures) = SEASONS_ARRAY_RE.captures(html) else {
        return Vec::new();
    };
    let array_content = captures[1].to_string();

    parse_objects(
        JS_OBJECT_RE
            .find_iter(&array_content)
            .map(|object| object.as_str().to_string()),
    )
}

/// Extract a single React prop value (array or object) by brace matching from `prop:` onwards.
///
/// Returns `None` when the prop is absent, unterminated, or not valid JSON — the caller falls
/// back to DOM parsing in that case.
pub fn react_prop(html: &str, prop: &str) -> Option<serde_json::Value> {
    let marker = Regex::new(&format!(r"{}\s*:\s*", regex::escape(prop))).unwrap_or_else(|_| unreachable!());
    let start = marker.find(html)?.end();

    let mut chars = html[start..].char_indices();
    let (_, open) = chars.next()?;
    let close = match open {
        '[' => ']',
        '{' => '}',
        _ => return None,
    };

    let mut depth = 1usize;
    for (offset, ch) in chars {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                let raw = &html[start..=start + offset];
                return serde_json::from_str(raw).ok();
            }
        }
    }

    None
}

/// Extract a race page's embedded schedule payload, if present and parseable.
pub fn race_schedule_payload(html: &str) -> Option<RaceSchedulePayload> {
    react_prop(html, "schedule").and_then(|value| serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn series_push_calls_parse() {
        let html = r#"
            <script>
            var series = [];
            series.push({id: 3714, name: "Wednesday Night", scrt: 1600000000, nsea: 12});
            series.push({id: 3713, name: 'Thursday Trucks'});
            </script>
        "#;

        let entries = series_entries(html);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 3714);
        assert_eq!(entries[0].name, "Wednesday Night");
        assert_eq!(entries[0].num_seasons, Some(12));
        assert_eq!(entries[1].id, 3713);
        assert_eq!(entries[1].scrt, None);
    }

    #[test]
    fn live_site_key_spelling_is_accepted() {
        let html = r#"series.push({sid:3712, sname:"Friday Fixed"});"#;

        let entries = series_entries(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 3712);
        assert_eq!(entries[0].name, "Friday Fixed");
    }

    #[test]
    fn entries_missing_required_fields_are_dropped() {
        let html = r#"series.push({id: 99}); series.push({name: "No Id"});"#;

        assert_eq!(series_entries(html), Vec::new());
    }

    #[test]
    fn seasons_array_parses() {
        let html = r#"
            <script>
            seasons = [{id: 26741, n: "2025 S1", scrt: 1754380800, ns: 10, nr: 5},
                       {id: 26740, n: "2024 S4", scrt: 1720000000, ns: 12, nr: 12}];
            </script>
        "#;

        let entries = season_entries(html);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 26741);
        assert_eq!(entries[0].name, "2025 S1");
        assert_eq!(entries[0].start_time, Some(1_754_380_800));
        assert_eq!(entries[0].scheduled_races, Some(10));
        assert_eq!(entries[1].completed_races, Some(12));
    }

    #[test]
    fn missing_seasons_array_yields_nothing() {
        assert_eq!(season_entries("<html><body>static page</body></html>"), Vec::new());
    }

    #[test]
    fn react_prop_brace_matching() {
        let html = r#"ReactDOM.render(El, {rps: [{"pos": 1}, {"pos": 2}], schedule: {"race_number": "3"}})"#;

        let rps = react_prop(html, "rps").unwrap();
        assert_eq!(rps.as_array().unwrap().len(), 2);

        let schedule = react_prop(html, "schedule").unwrap();
        assert_eq!(schedule["race_number"], "3");

        assert_eq!(react_prop(html, "drivers"), None);
    }

    #[test]
    fn react_prop_rejects_unterminated_payloads() {
        assert_eq!(react_prop(r#"rps: [{"pos": 1}"#, "rps"), None);
    }

    #[test]
    fn schedule_payload_parses_stringly_numbers_and_flags() {
        let html = r#"
            schedule: {"schedule_id": "324462", "race_number": "7", "event_name": "Night 200",
                       "track_name": "Bristol", "track_type": "Oval", "track_length": "0.533",
                       "planned_laps": "200", "points_race": "1", "night_race": 1,
                       "off_week": "0", "temperature_f": "78", "humidity_pct": "55",
                       "wind_dir": "N", "wind_speed": "2", "wind_unit": "MPH"}
        "#;

        let payload = race_schedule_payload(html).unwrap();
        assert_eq!(payload.schedule_id, Some(324_462));
        assert_eq!(payload.race_number, Some(7));
        assert_eq!(payload.track_length, Some(0.533));
        assert_eq!(payload.planned_laps, Some(200));
        assert_eq!(payload.points_race, Some(true));
        assert_eq!(payload.night_race, Some(true));
        assert_eq!(payload.off_week, Some(false));
        assert_eq!(payload.playoff_race, None);
        assert_eq!(payload.temperature_f, Some(78));
    }
}
