//! Typed rows and write-patches for the relational store, plus the small value types shared by
//! the freshness logic: timestamps, the discovery sentinel, scrape outcomes, and reason codes.

use bitflags::bitflags;
use enum_as_inner::EnumAsInner;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::well_known::Rfc3339, macros::format_description};

use crate::{
    error::{Error, Result},
    id::{DriverID, LeagueID, RaceRowID, ResultRowID, ScheduleID, SeasonID, SeriesID, TeamID},
};

/// The reserved `scraped_at` value marking a row that exists from parent-discovery only, i.e.
/// whose own page has never been fetched. Freshness checks treat it as infinitely stale.
pub const DISCOVERY_SENTINEL: &str = "1970-01-01T00:00:00Z";

/// Current time as the RFC 3339 UTC string every `scraped_at` column stores.
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&Rfc3339)
        .unwrap_or_else(|_| DISCOVERY_SENTINEL.to_string())
}

/// Defensive timestamp parsing: RFC 3339 first, then a bare `YYYY-MM-DDTHH:MM:SS` interpreted
/// as UTC. Anything else is `None`, which freshness math treats as "not fresh".
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }

    const NAIVE: &[time::format_description::FormatItem<'static>] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

    PrimitiveDateTime::parse(raw, &NAIVE)
        .ok()
        .map(|naive| naive.assume_offset(UtcOffset::UTC))
}

/// Whether a row has ever had its own page fetched, decoded from its `scraped_at` column.
///
/// The sentinel (and anything unparseable) decodes to [`FreshnessState::DiscoveredOnly`]; a real
/// timestamp decodes to [`FreshnessState::FetchedAt`].
#[derive(EnumAsInner, Clone, Copy, PartialEq, Debug)]
pub enum FreshnessState {
    /// The row exists only because a parent page listed it.
    DiscoveredOnly,
    /// The row's own page was last fetched and parsed at this instant.
    FetchedAt(OffsetDateTime),
}

impl FreshnessState {
    /// Decode a `scraped_at` column value.
    pub fn from_column(raw: &str) -> Self {
        if raw == DISCOVERY_SENTINEL {
            return Self::DiscoveredOnly;
        }

        match parse_timestamp(raw) {
            Some(at) if at.unix_timestamp() > 0 => Self::FetchedAt(at),
            _ => Self::DiscoveredOnly,
        }
    }

    /// Age relative to `now`, or `None` for rows never fetched.
    pub fn age(self, now: OffsetDateTime) -> Option<time::Duration> {
        self.as_fetched_at().map(|at| now - *at)
    }
}

/// Outcome of a scrape attempt, as recorded in the audit log.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScrapeOutcome {
    /// The page was fetched, parsed, and persisted.
    Success,
    /// The attempt failed; the log row carries the error message.
    Failed,
    /// The entity was skipped, typically by the freshness cache.
    Skipped,
}

impl ScrapeOutcome {
    /// The lowercase name stored in the audit log's CHECK'd column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for ScrapeOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(Error::Validation(format!("invalid scrape outcome: {other:?}"))),
        }
    }
}

/// Why [`Store::should_scrape`](crate::store::Store::should_scrape) decided what it decided.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScrapeReason {
    /// No row exists for the entity.
    NotInCache,
    /// No validity window was supplied; an existing row is trusted indefinitely.
    CacheValidIndefinitely,
    /// The row's last fetch is older than the validity window.
    CacheStale,
    /// The row's `scraped_at` could not be parsed (or is the discovery sentinel).
    InvalidTimestamp,
    /// The row is fresh but its status is in-progress or unknown, so data may still change.
    StatusNeedsRefresh,
    /// The row is fresh and its status is terminal; nothing can change.
    StatusCompleteStable,
    /// The row is fresh and the entity kind carries no status.
    CacheFresh,
}

impl ScrapeReason {
    /// Snake-case code for logs and progress output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInCache => "not_in_cache",
            Self::CacheValidIndefinitely => "cache_valid_indefinitely",
            Self::CacheStale => "cache_stale",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::StatusNeedsRefresh => "status_needs_refresh",
            Self::StatusCompleteStable => "status_complete_stable",
            Self::CacheFresh => "cache_fresh",
        }
    }
}

/// Split a results-table driver name into `(first, last)`.
///
/// A comma splits last-first (`"Doe, John Jr."` → `("John Jr.", "Doe")`); otherwise the first
/// whitespace token is the first name and the remainder the last. Empty input yields two
/// `None`s.
pub fn parse_driver_name(name: &str) -> (Option<String>, Option<String>) {
    let name = name.trim();
    if name.is_empty() {
        return (None, None);
    }

    if let Some((last, first)) = name.split_once(',') {
        return (
            Some(first.trim().to_string()).filter(|s| !s.is_empty()),
            Some(last.trim().to_string()).filter(|s| !s.is_empty()),
        );
    }

    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
        None => (Some(name.to_string()), None),
    }
}

bitflags! {
    /// The per-race schedule flags, packed for log output and quick comparisons. The store keeps
    /// them as four nullable boolean columns; `None` packs as unset.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct RaceFlags: u8 {
        /// The race scores championship points.
        const POINTS = 1;
        /// The schedule entry is an off week.
        const OFF_WEEK = 1 << 1;
        /// The race runs at night.
        const NIGHT = 1 << 2;
        /// The race is part of a playoff.
        const PLAYOFF = 1 << 3;
    }
}

/// A league row.
#[derive(Clone, PartialEq, Debug)]
pub struct League {
    /// External league id.
    pub league_id: LeagueID,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Canonical URL.
    pub url: String,
    /// Last successful own-page fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a league upsert. Required fields are owned strings; optionals merge.
#[derive(Clone, Default, Debug)]
pub struct LeagueUpdate {
    /// Display name (required, non-empty).
    pub name: String,
    /// Canonical URL (required, non-empty).
    pub url: String,
    /// Fetch timestamp (required; the discovery sentinel for parent-discovery writes).
    pub scraped_at: String,
    /// Description, when known.
    pub description: Option<String>,
}

/// A series row.
#[derive(Clone, PartialEq, Debug)]
pub struct Series {
    /// External series id.
    pub series_id: SeriesID,
    /// Owning league.
    pub league_id: LeagueID,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Creation date (`YYYY-MM-DD`), when known.
    pub created_date: Option<String>,
    /// Declared season count, when known.
    pub num_seasons: Option<u32>,
    /// Canonical URL.
    pub url: String,
    /// Last successful own-page fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a series upsert.
#[derive(Clone, Default, Debug)]
pub struct SeriesUpdate {
    /// Display name (required, non-empty).
    pub name: String,
    /// Canonical URL (required, non-empty).
    pub url: String,
    /// Fetch timestamp (required).
    pub scraped_at: String,
    /// Description, when known.
    pub description: Option<String>,
    /// Creation date, when known.
    pub created_date: Option<String>,
    /// Declared season count, when known.
    pub num_seasons: Option<u32>,
}

/// A season row.
#[derive(Clone, PartialEq, Debug)]
pub struct Season {
    /// External season id.
    pub season_id: SeasonID,
    /// Owning series.
    pub series_id: SeriesID,
    /// Display name.
    pub name: String,
    /// Canonical URL.
    pub url: String,
    /// Last successful own-page fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a season upsert.
#[derive(Clone, Default, Debug)]
pub struct SeasonUpdate {
    /// Display name (required, non-empty).
    pub name: String,
    /// Canonical URL (required, non-empty).
    pub url: String,
    /// Fetch timestamp (required).
    pub scraped_at: String,
}

/// A race row. Surrogate-keyed; the external key is the unique schedule id.
#[derive(Clone, PartialEq, Debug)]
pub struct Race {
    /// Surrogate row id.
    pub race_id: RaceRowID,
    /// External schedule id (unique).
    pub schedule_id: ScheduleID,
    /// Owning season.
    pub season_id: SeasonID,
    /// Race number within the season.
    pub race_number: u32,
    /// Event display name.
    pub event_name: Option<String>,
    /// Event timestamp, RFC 3339 UTC.
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
    /// Track type.
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
    /// Weather mode.
    pub weather_type: Option<String>,
    /// Sky conditions.
    pub cloud_conditions: Option<String>,
    /// Air temperature in Fahrenheit.
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
    /// Canonical URL.
    pub url: String,
    /// Completion flag: once set, the race is immutable to the cache policy.
    pub is_complete: bool,
    /// Last successful own-page fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

impl Race {
    /// The race's schedule flags packed into a [`RaceFlags`] set (unknown packs as unset).
    pub fn flags(&self) -> RaceFlags {
        let mut flags = RaceFlags::empty();
        flags.set(RaceFlags::POINTS, self.points_race.unwrap_or(false));
        flags.set(RaceFlags::OFF_WEEK, self.off_week.unwrap_or(false));
        flags.set(RaceFlags::NIGHT, self.night_race.unwrap_or(false));
        flags.set(RaceFlags::PLAYOFF, self.playoff_race.unwrap_or(false));
        flags
    }
}

/// Attributes for a race upsert.
#[derive(Clone, Default, Debug)]
pub struct RaceUpdate {
    /// Canonical URL (required, non-empty).
    pub url: String,
    /// Fetch timestamp (required).
    pub scraped_at: String,
    /// Race number within the season (required).
    pub race_number: u32,
    /// Event display name.
    pub event_name: Option<String>,
    /// Event timestamp, RFC 3339 UTC.
    pub date: Option<String>,
    /// Scheduled green-flag time.
    pub race_time: Option<String>,
    /// Scheduled practice time.
    pub practice_time: Option<String>,
    /// Track id.
    pub track_id: Option<u32>,
    /// Track configuration id.
    pub track_config_id: Option<u32>,
    /// Track display name.
    pub track_name: Option<String>,
    /// Track type.
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
    /// Weather mode.
    pub weather_type: Option<String>,
    /// Sky conditions.
    pub cloud_conditions: Option<String>,
    /// Air temperature in Fahrenheit.
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
    /// Completion flag. `Some(true)` is a one-way transition; see the store's merge rules.
    pub is_complete: Option<bool>,
}

/// A driver row.
#[derive(Clone, PartialEq, Debug)]
pub struct Driver {
    /// External driver id.
    pub driver_id: DriverID,
    /// Owning league.
    pub league_id: LeagueID,
    /// Team, when known. A foreign-key-style reference resolved lazily, never an owned object.
    pub team_id: Option<TeamID>,
    /// Display name as seen on results.
    pub name: String,
    /// Split first name, when derivable.
    pub first_name: Option<String>,
    /// Split last name, when derivable.
    pub last_name: Option<String>,
    /// Car numbers seen, comma-joined.
    pub car_numbers: Option<String>,
    /// Primary car number.
    pub primary_number: Option<String>,
    /// Club name.
    pub club: Option<String>,
    /// Club id.
    pub club_id: Option<u32>,
    /// Skill rating.
    pub irating: Option<i32>,
    /// Safety rating.
    pub safety_rating: Option<f64>,
    /// License class.
    pub license_class: Option<String>,
    /// Profile URL.
    pub url: String,
    /// Last successful own-page fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a driver upsert.
#[derive(Clone, Default, Debug)]
pub struct DriverUpdate {
    /// Display name (required, non-empty).
    pub name: String,
    /// Profile URL (required, non-empty).
    pub url: String,
    /// Fetch timestamp (required).
    pub scraped_at: String,
    /// Team reference, when known.
    pub team_id: Option<TeamID>,
    /// Split first name.
    pub first_name: Option<String>,
    /// Split last name.
    pub last_name: Option<String>,
    /// Car numbers seen.
    pub car_numbers: Option<String>,
    /// Primary car number.
    pub primary_number: Option<String>,
    /// Club name.
    pub club: Option<String>,
    /// Club id.
    pub club_id: Option<u32>,
    /// Skill rating.
    pub irating: Option<i32>,
    /// Safety rating.
    pub safety_rating: Option<f64>,
    /// License class.
    pub license_class: Option<String>,
}

/// A team row.
#[derive(Clone, PartialEq, Debug)]
pub struct Team {
    /// External team id.
    pub team_id: TeamID,
    /// Owning league.
    pub league_id: LeagueID,
    /// Display name.
    pub name: String,
    /// Roster size, when known.
    pub driver_count: Option<u32>,
    /// Team page URL, when known.
    pub url: Option<String>,
    /// Last successful fetch (or the discovery sentinel).
    pub scraped_at: String,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a team upsert.
#[derive(Clone, Default, Debug)]
pub struct TeamUpdate {
    /// Display name (required, non-empty).
    pub name: String,
    /// Fetch timestamp (required).
    pub scraped_at: String,
    /// Team page URL, when known.
    pub url: Option<String>,
    /// Roster size, when known.
    pub driver_count: Option<u32>,
}

/// A race-result fact row, unique by `(race, driver)`.
#[derive(Clone, PartialEq, Debug)]
pub struct RaceResult {
    /// Surrogate row id.
    pub result_id: ResultRowID,
    /// Owning race (surrogate id).
    pub race_id: RaceRowID,
    /// Driver external id.
    pub driver_id: DriverID,
    /// Team name string as printed in the results table.
    pub team: Option<String>,
    /// Finish position.
    pub finish_position: Option<u32>,
    /// Starting position.
    pub starting_position: Option<u32>,
    /// Car number as printed.
    pub car_number: Option<String>,
    /// Qualifying time as printed.
    pub qualifying_time: Option<String>,
    /// Fastest lap time as printed.
    pub fastest_lap: Option<String>,
    /// Lap the fastest lap was set on.
    pub fastest_lap_number: Option<u32>,
    /// Average lap time as printed.
    pub average_lap: Option<String>,
    /// Interval to the leader as printed.
    pub interval: Option<String>,
    /// Laps completed.
    pub laps_completed: Option<u32>,
    /// Laps led.
    pub laps_led: Option<u32>,
    /// Incident points.
    pub incident_points: Option<i32>,
    /// Race points.
    pub race_points: Option<i32>,
    /// Bonus points.
    pub bonus_points: Option<i32>,
    /// Penalty points.
    pub penalty_points: Option<i32>,
    /// Total points.
    pub total_points: Option<i32>,
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
    /// Skill rating snapshot at race time.
    pub irating: Option<i32>,
    /// Final status string.
    pub status: Option<String>,
    /// Car id, when the payload supplies one.
    pub car_id: Option<i64>,
    /// Car model string, when the results table prints one.
    pub car: Option<String>,
    /// Row creation time, set once.
    pub created_at: String,
    /// Last write time.
    pub updated_at: String,
}

/// Attributes for a race-result upsert. Everything is optional; merge rules apply.
#[derive(Clone, Default, Debug)]
pub struct RaceResultUpdate {
    /// Team name string.
    pub team: Option<String>,
    /// Finish position.
    pub finish_position: Option<u32>,
    /// Starting position.
    pub starting_position: Option<u32>,
    /// Car number as printed.
    pub car_number: Option<String>,
    /// Qualifying time as printed.
    pub qualifying_time: Option<String>,
    /// Fastest lap time as printed.
    pub fastest_lap: Option<String>,
    /// Lap the fastest lap was set on.
    pub fastest_lap_number: Option<u32>,
    /// Average lap time as printed.
    pub average_lap: Option<String>,
    /// Interval to the leader as printed.
    pub interval: Option<String>,
    /// Laps completed.
    pub laps_completed: Option<u32>,
    /// Laps led.
    pub laps_led: Option<u32>,
    /// Incident points.
    pub incident_points: Option<i32>,
    /// Race points.
    pub race_points: Option<i32>,
    /// Bonus points.
    pub bonus_points: Option<i32>,
    /// Penalty points.
    pub penalty_points: Option<i32>,
    /// Total points.
    pub total_points: Option<i32>,
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
    /// Skill rating snapshot.
    pub irating: Option<i32>,
    /// Final status string.
    pub status: Option<String>,
    /// Car id.
    pub car_id: Option<i64>,
    /// Car model string.
    pub car: Option<String>,
}

/// One audit-log row.
#[derive(Clone, PartialEq, Debug)]
pub struct ScrapeLogEntry {
    /// Surrogate row id.
    pub log_id: i64,
    /// Entity kind the attempt targeted.
    pub entity_kind: String,
    /// Entity id, when known.
    pub entity_id: Option<i64>,
    /// The URL attempted.
    pub entity_url: String,
    /// Outcome, one of `success` / `failed` / `skipped`.
    pub outcome: String,
    /// Error message for failed attempts.
    pub error_message: Option<String>,
    /// Wall-clock duration of the attempt.
    pub duration_ms: Option<i64>,
    /// Row timestamp.
    pub timestamp: String,
}

/// One schema-alert row.
#[derive(Clone, PartialEq, Debug)]
pub struct SchemaAlert {
    /// Surrogate row id.
    pub alert_id: i64,
    /// Entity kind whose page drifted.
    pub entity_kind: String,
    /// Alert classification, e.g. `schema_drift`.
    pub alert_kind: String,
    /// Human-readable detail.
    pub details: String,
    /// The URL that failed validation, when known.
    pub url: Option<String>,
    /// Whether an operator has resolved the alert.
    pub resolved: bool,
    /// Row timestamp.
    pub timestamp: String,
}
