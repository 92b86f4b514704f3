//! Relational persistence: typed CRUD with merge-upserts, freshness queries, and the append-only
//! audit tables.
//!
//! One SQLite connection, foreign keys enforced, every mutation committed before the method
//! returns. Upserts merge rather than replace: an optional attribute the caller did not supply
//! never clobbers a stored non-null value, and `scraped_at` never moves backwards — which is how
//! parent-discovery sentinel writes coexist with the freshness cache.

pub mod records;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::{
    error::{Error, Result},
    id::{DriverID, EntityKind, LeagueID, RaceRowID, ResultRowID, ScheduleID, SeasonID, SeriesID, TeamID},
    store::records::{
        Driver, DriverUpdate, FreshnessState, League, LeagueUpdate, Race, RaceResult, RaceResultUpdate, RaceUpdate,
        SchemaAlert, ScrapeLogEntry, ScrapeOutcome, ScrapeReason, Season, SeasonUpdate, Series, SeriesUpdate, Team,
        TeamUpdate,
    },
};

/// The relational store backing a crawl.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Validation(format!("{field} is a required field")))
    } else {
        Ok(())
    }
}

/// Map SQLite constraint violations (missing parent, duplicate key) to [`Error::Integrity`].
fn constraint(context: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Integrity(format!("{context}: {e}"))
        }
        _ => Error::Sql(e),
    }
}

impl Store {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open a fresh in-memory store. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection (read-only helpers, export).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // Leagues
    // -------

    /// Insert-or-merge a league row, returning its external id.
    pub fn upsert_league(&self, league_id: LeagueID, update: &LeagueUpdate) -> Result<LeagueID> {
        require("name", &update.name)?;
        require("url", &update.url)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO leagues (league_id, name, url, description, scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
                 ON CONFLICT(league_id) DO UPDATE SET
                     name = excluded.name,
                     url = excluded.url,
                     description = COALESCE(excluded.description, description),
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![league_id, update.name, update.url, update.description, update.scraped_at],
            )
            .map_err(constraint("upsert league"))?;

        Ok(league_id)
    }

    /// Fetch a league by external id.
    pub fn get_league(&self, league_id: LeagueID) -> Result<Option<League>> {
        self.conn
            .query_row("SELECT * FROM leagues WHERE league_id = ?1", params![league_id], league_from_row)
            .optional()
            .map_err(Error::from)
    }

    // Series
    // ------

    /// Insert-or-merge a series row under `league_id`, returning the series' external id.
    pub fn upsert_series(&self, series_id: SeriesID, league_id: LeagueID, update: &SeriesUpdate) -> Result<SeriesID> {
        require("name", &update.name)?;
        require("url", &update.url)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO series (series_id, league_id, name, url, description, created_date, num_seasons,
                                     scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
                 ON CONFLICT(series_id) DO UPDATE SET
                     league_id = excluded.league_id,
                     name = excluded.name,
                     url = excluded.url,
                     description = COALESCE(excluded.description, description),
                     created_date = COALESCE(excluded.created_date, created_date),
                     num_seasons = COALESCE(excluded.num_seasons, num_seasons),
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![
                    series_id,
                    league_id,
                    update.name,
                    update.url,
                    update.description,
                    update.created_date,
                    update.num_seasons,
                    update.scraped_at,
                ],
            )
            .map_err(constraint("upsert series"))?;

        Ok(series_id)
    }

    /// Fetch a series by external id.
    pub fn get_series(&self, series_id: SeriesID) -> Result<Option<Series>> {
        self.conn
            .query_row("SELECT * FROM series WHERE series_id = ?1", params![series_id], series_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// All series of a league, ordered by external id.
    pub fn get_series_by_league(&self, league_id: LeagueID) -> Result<Vec<Series>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM series WHERE league_id = ?1 ORDER BY series_id")?;
        let rows = stmt.query_map(params![league_id], series_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // Seasons
    // -------

    /// Insert-or-merge a season row under `series_id`, returning the season's external id.
    pub fn upsert_season(&self, season_id: SeasonID, series_id: SeriesID, update: &SeasonUpdate) -> Result<SeasonID> {
        require("name", &update.name)?;
        require("url", &update.url)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO seasons (season_id, series_id, name, url, scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
                 ON CONFLICT(season_id) DO UPDATE SET
                     series_id = excluded.series_id,
                     name = excluded.name,
                     url = excluded.url,
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![season_id, series_id, update.name, update.url, update.scraped_at],
            )
            .map_err(constraint("upsert season"))?;

        Ok(season_id)
    }

    /// Fetch a season by external id.
    pub fn get_season(&self, season_id: SeasonID) -> Result<Option<Season>> {
        self.conn
            .query_row("SELECT * FROM seasons WHERE season_id = ?1", params![season_id], season_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// All seasons of a series, ordered by external id.
    pub fn get_seasons_by_series(&self, series_id: SeriesID) -> Result<Vec<Season>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM seasons WHERE series_id = ?1 ORDER BY season_id")?;
        let rows = stmt.query_map(params![series_id], season_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // Races
    // -----

    /// Insert-or-merge a race row under `season_id`, keyed by the unique schedule id. Returns
    /// the surrogate row id race results reference.
    ///
    /// The completion flag is a one-way transition: once a row is complete, later writes cannot
    /// clear it.
    pub fn upsert_race(&self, schedule_id: ScheduleID, season_id: SeasonID, update: &RaceUpdate) -> Result<RaceRowID> {
        require("url", &update.url)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO races (schedule_id, season_id, race_number, event_name, date, race_time, practice_time,
                                    track_id, track_config_id, track_name, track_type, track_length,
                                    track_config_iracing_id, planned_laps, points_race, off_week, night_race,
                                    playoff_race, race_duration_minutes, total_laps, leaders, lead_changes, cautions,
                                    caution_laps, num_drivers, weather_type, cloud_conditions, temperature_f,
                                    humidity_pct, fog_pct, wind_dir, wind_speed, wind_unit, url, is_complete,
                                    scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                         ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36,
                         CURRENT_TIMESTAMP)
                 ON CONFLICT(schedule_id) DO UPDATE SET
                     season_id = excluded.season_id,
                     race_number = excluded.race_number,
                     event_name = COALESCE(excluded.event_name, event_name),
                     date = COALESCE(excluded.date, date),
                     race_time = COALESCE(excluded.race_time, race_time),
                     practice_time = COALESCE(excluded.practice_time, practice_time),
                     track_id = COALESCE(excluded.track_id, track_id),
                     track_config_id = COALESCE(excluded.track_config_id, track_config_id),
                     track_name = COALESCE(excluded.track_name, track_name),
                     track_type = COALESCE(excluded.track_type, track_type),
                     track_length = COALESCE(excluded.track_length, track_length),
                     track_config_iracing_id = COALESCE(excluded.track_config_iracing_id, track_config_iracing_id),
                     planned_laps = COALESCE(excluded.planned_laps, planned_laps),
                     points_race = COALESCE(excluded.points_race, points_race),
                     off_week = COALESCE(excluded.off_week, off_week),
                     night_race = COALESCE(excluded.night_race, night_race),
                     playoff_race = COALESCE(excluded.playoff_race, playoff_race),
                     race_duration_minutes = COALESCE(excluded.race_duration_minutes, race_duration_minutes),
                     total_laps = COALESCE(excluded.total_laps, total_laps),
                     leaders = COALESCE(excluded.leaders, leaders),
                     lead_changes = COALESCE(excluded.lead_changes, lead_changes),
                     cautions = COALESCE(excluded.cautions, cautions),
                     caution_laps = COALESCE(excluded.caution_laps, caution_laps),
                     num_drivers = COALESCE(excluded.num_drivers, num_drivers),
                     weather_type = COALESCE(excluded.weather_type, weather_type),
                     cloud_conditions = COALESCE(excluded.cloud_conditions, cloud_conditions),
                     temperature_f = COALESCE(excluded.temperature_f, temperature_f),
                     humidity_pct = COALESCE(excluded.humidity_pct, humidity_pct),
                     fog_pct = COALESCE(excluded.fog_pct, fog_pct),
                     wind_dir = COALESCE(excluded.wind_dir, wind_dir),
                     wind_speed = COALESCE(excluded.wind_speed, wind_speed),
                     wind_unit = COALESCE(excluded.wind_unit, wind_unit),
                     url = excluded.url,
                     is_complete = MAX(is_complete, excluded.is_complete),
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![
                    schedule_id,
                    season_id,
                    update.race_number,
                    update.event_name,
                    update.date,
                    update.race_time,
                    update.practice_time,
                    update.track_id,
                    update.track_config_id,
                    update.track_name,
                    update.track_type,
                    update.track_length,
                    update.track_config_iracing_id,
                    update.planned_laps,
                    update.points_race,
                    update.off_week,
                    update.night_race,
                    update.playoff_race,
                    update.race_duration_minutes,
                    update.total_laps,
                    update.leaders,
                    update.lead_changes,
                    update.cautions,
                    update.caution_laps,
                    update.num_drivers,
                    update.weather_type,
                    update.cloud_conditions,
                    update.temperature_f,
                    update.humidity_pct,
                    update.fog_pct,
                    update.wind_dir,
                    update.wind_speed,
                    update.wind_unit,
                    update.url,
                    update.is_complete.unwrap_or(false),
                    update.scraped_at,
                ],
            )
            .map_err(constraint("upsert race"))?;

        self.conn
            .query_row(
                "SELECT race_id FROM races WHERE schedule_id = ?1",
                params![schedule_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    /// Fetch a race by schedule id.
    pub fn get_race(&self, schedule_id: ScheduleID) -> Result<Option<Race>> {
        self.conn
            .query_row("SELECT * FROM races WHERE schedule_id = ?1", params![schedule_id], race_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// All races of a season, ordered by external (schedule) id.
    pub fn get_races_by_season(&self, season_id: SeasonID) -> Result<Vec<Race>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM races WHERE season_id = ?1 ORDER BY schedule_id")?;
        let rows = stmt.query_map(params![season_id], race_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Races of a season whose completion flag is still clear.
    pub fn get_incomplete_races(&self, season_id: SeasonID) -> Result<Vec<Race>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM races WHERE season_id = ?1 AND is_complete = 0 ORDER BY schedule_id")?;
        let rows = stmt.query_map(params![season_id], race_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// True iff the race row exists and its completion flag is set.
    pub fn is_race_complete(&self, schedule_id: ScheduleID) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT is_complete FROM races WHERE schedule_id = ?1",
                params![schedule_id],
                |row| row.get::<_, bool>(0),
            )
            .optional()
            .map(|complete| complete.unwrap_or(false))
            .map_err(Error::from)
    }

    // Teams
    // -----

    /// Insert-or-merge a team row under `league_id`, returning the team's external id.
    pub fn upsert_team(&self, team_id: TeamID, league_id: LeagueID, update: &TeamUpdate) -> Result<TeamID> {
        require("name", &update.name)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO teams (team_id, league_id, name, driver_count, url, scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
                 ON CONFLICT(team_id) DO UPDATE SET
                     league_id = excluded.league_id,
                     name = excluded.name,
                     driver_count = COALESCE(excluded.driver_count, driver_count),
                     url = COALESCE(excluded.url, url),
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![team_id, league_id, update.name, update.driver_count, update.url, update.scraped_at],
            )
            .map_err(constraint("upsert team"))?;

        Ok(team_id)
    }

    /// Fetch a team by external id.
    pub fn get_team(&self, team_id: TeamID) -> Result<Option<Team>> {
        self.conn
            .query_row("SELECT * FROM teams WHERE team_id = ?1", params![team_id], team_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// All teams of a league, ordered by external id.
    pub fn get_teams_by_league(&self, league_id: LeagueID) -> Result<Vec<Team>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM teams WHERE league_id = ?1 ORDER BY team_id")?;
        let rows = stmt.query_map(params![league_id], team_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // Drivers
    // -------

    /// Insert-or-merge a driver row under `league_id`, returning the driver's external id.
    pub fn upsert_driver(&self, driver_id: DriverID, league_id: LeagueID, update: &DriverUpdate) -> Result<DriverID> {
        require("name", &update.name)?;
        require("url", &update.url)?;
        require("scraped_at", &update.scraped_at)?;

        let _ = self
            .conn
            .execute(
                "INSERT INTO drivers (driver_id, league_id, team_id, name, first_name, last_name, car_numbers,
                                      primary_number, club, club_id, irating, safety_rating, license_class, url,
                                      scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, CURRENT_TIMESTAMP)
                 ON CONFLICT(driver_id) DO UPDATE SET
                     league_id = excluded.league_id,
                     team_id = COALESCE(excluded.team_id, team_id),
                     name = excluded.name,
                     first_name = COALESCE(excluded.first_name, first_name),
                     last_name = COALESCE(excluded.last_name, last_name),
                     car_numbers = COALESCE(excluded.car_numbers, car_numbers),
                     primary_number = COALESCE(excluded.primary_number, primary_number),
                     club = COALESCE(excluded.club, club),
                     club_id = COALESCE(excluded.club_id, club_id),
                     irating = COALESCE(excluded.irating, irating),
                     safety_rating = COALESCE(excluded.safety_rating, safety_rating),
                     license_class = COALESCE(excluded.license_class, license_class),
                     url = excluded.url,
                     scraped_at = MAX(scraped_at, excluded.scraped_at),
                     updated_at = CURRENT_TIMESTAMP",
                params![
                    driver_id,
                    league_id,
                    update.team_id,
                    update.name,
                    update.first_name,
                    update.last_name,
                    update.car_numbers,
                    update.primary_number,
                    update.club,
                    update.club_id,
                    update.irating,
                    update.safety_rating,
                    update.license_class,
                    update.url,
                    update.scraped_at,
                ],
            )
            .map_err(constraint("upsert driver"))?;

        Ok(driver_id)
    }

    /// Fetch a driver by external id.
    pub fn get_driver(&self, driver_id: DriverID) -> Result<Option<Driver>> {
        self.conn
            .query_row("SELECT * FROM drivers WHERE driver_id = ?1", params![driver_id], driver_from_row)
            .optional()
            .map_err(Error::from)
    }

    /// All drivers of a league, ordered by external id.
    pub fn get_drivers_by_league(&self, league_id: LeagueID) -> Result<Vec<Driver>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM drivers WHERE league_id = ?1 ORDER BY driver_id")?;
        let rows = stmt.query_map(params![league_id], driver_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Case-insensitive substring search over driver names, optionally scoped to a league.
    pub fn find_driver_by_name(&self, name: &str, league_id: Option<LeagueID>) -> Result<Vec<Driver>> {
        let pattern = format!("%{name}%");

        let mut stmt = match league_id {
            Some(_) => self
                .conn
                .prepare("SELECT * FROM drivers WHERE name LIKE ?1 AND league_id = ?2 ORDER BY driver_id")?,
            None => self.conn.prepare("SELECT * FROM drivers WHERE name LIKE ?1 ORDER BY driver_id")?,
        };

        let rows = match league_id {
            Some(league) => stmt.query_map(params![pattern, league], driver_from_row)?,
            None => stmt.query_map(params![pattern], driver_from_row)?,
        };
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // Race results
    // ------------

    /// Insert-or-merge a race-result fact, unique by `(race, driver)`. Both referenced rows must
    /// exist. Returns the result's surrogate row id.
    pub fn upsert_race_result(
        &self,
        race_id: RaceRowID,
        driver_id: DriverID,
        update: &RaceResultUpdate,
    ) -> Result<ResultRowID> {
        let _ = self
            .conn
            .execute(
                "INSERT INTO race_results (race_id, driver_id, team, finish_position, starting_position, car_number,
                                           qualifying_time, fastest_lap, fastest_lap_number, average_lap, interval,
                                           laps_completed, laps_led, incident_points, race_points, bonus_points,
                                           penalty_points, total_points, fast_laps, quality_passes, closing_passes,
                                           total_passes, average_running_position, irating, status, car_id, car,
                                           updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                         ?21, ?22, ?23, ?24, ?25, ?26, ?27, CURRENT_TIMESTAMP)
                 ON CONFLICT(race_id, driver_id) DO UPDATE SET
                     team = COALESCE(excluded.team, team),
                     finish_position = COALESCE(excluded.finish_position, finish_position),
                     starting_position = COALESCE(excluded.starting_position, starting_position),
                     car_number = COALESCE(excluded.car_number, car_number),
                     qualifying_time = COALESCE(excluded.qualifying_time, qualifying_time),
                     fastest_lap = COALESCE(excluded.fastest_lap, fastest_lap),
                     fastest_lap_number = COALESCE(excluded.fastest_lap_number, fastest_lap_number),
                     average_lap = COALESCE(excluded.average_lap, average_lap),
                     interval = COALESCE(excluded.interval, interval),
                     laps_completed = COALESCE(excluded.laps_completed, laps_completed),
                     laps_led = COALESCE(excluded.laps_led, laps_led),
                     incident_points = COALESCE(excluded.incident_points, incident_points),
                     race_points = COALESCE(excluded.race_points, race_points),
                     bonus_points = COALESCE(excluded.bonus_points, bonus_points),
                     penalty_points = COALESCE(excluded.penalty_points, penalty_points),
                     total_points = COALESCE(excluded.total_points, total_points),
                     fast_laps = COALESCE(excluded.fast_laps, fast_laps),
                     quality_passes = COALESCE(excluded.quality_passes, quality_passes),
                     closing_passes = COALESCE(excluded.closing_passes, closing_passes),
                     total_passes = COALESCE(excluded.total_passes, total_passes),
                     average_running_position = COALESCE(excluded.average_running_position, average_running_position),
                     irating = COALESCE(excluded.irating, irating),
                     status = COALESCE(excluded.status, status),
                     car_id = COALESCE(excluded.car_id, car_id),
                     car = COALESCE(excluded.car, car),
                     updated_at = CURRENT_TIMESTAMP",
                params![
                    race_id,
                    driver_id,
                    update.team,
                    update.finish_position,
                    update.starting_position,
                    update.car_number,
                    update.qualifying_time,
                    update.fastest_lap,
                    update.fastest_lap_number,
                    update.average_lap,
                    update.interval,
                    update.laps_completed,
                    update.laps_led,
                    update.incident_points,
                    update.race_points,
                    update.bonus_points,
                    update.penalty_points,
                    update.total_points,
                    update.fast_laps,
                    update.quality_passes,
                    update.closing_passes,
                    update.total_passes,
                    update.average_running_position,
                    update.irating,
                    update.status,
                    update.car_id,
                    update.car,
                ],
            )
            .map_err(constraint("upsert race result"))?;

        self.conn
            .query_row(
                "SELECT result_id FROM race_results WHERE race_id = ?1 AND driver_id = ?2",
                params![race_id, driver_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    /// All results of a race, ordered by finish position.
    pub fn get_race_results(&self, race_id: RaceRowID) -> Result<Vec<RaceResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM race_results WHERE race_id = ?1 ORDER BY finish_position")?;
        let rows = stmt.query_map(params![race_id], race_result_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// All results of a driver, in insertion order.
    pub fn get_driver_results(&self, driver_id: DriverID) -> Result<Vec<RaceResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM race_results WHERE driver_id = ?1 ORDER BY result_id")?;
        let rows = stmt.query_map(params![driver_id], race_result_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    // Freshness
    // ---------

    /// True iff a row of `kind` with this URL exists and is fresh within `max_age_days`.
    ///
    /// `None` means the cache never expires. Rows whose `scraped_at` is the discovery sentinel
    /// (or unparseable) are never fresh under any finite window, and a zero-day window rejects
    /// everything.
    pub fn is_url_cached(&self, url: &str, kind: EntityKind, max_age_days: Option<u32>) -> Result<bool> {
        let table = table_for(kind);

        let scraped_at: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT scraped_at FROM {table} WHERE url = ?1"),
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        let Some(scraped_at) = scraped_at else {
            return Ok(false);
        };
        let Some(max_age_days) = max_age_days else {
            return Ok(true);
        };

        let freshness = FreshnessState::from_column(&scraped_at);
        let Some(age) = freshness.age(OffsetDateTime::now_utc()) else {
            return Ok(false);
        };

        Ok(age < time::Duration::days(i64::from(max_age_days)))
    }

    /// Decide whether an entity's page should be fetched, with the reason for the decision.
    ///
    /// `false` only when the row exists, its last fetch is within `validity_hours`, and — for
    /// race rows — the status is terminal (completion flag set). A fresh race that is not yet
    /// complete, and a fresh season (seasons carry no status), still report `true` with
    /// [`ScrapeReason::StatusNeedsRefresh`].
    pub fn should_scrape(
        &self,
        kind: EntityKind,
        entity_id: i64,
        validity_hours: Option<u32>,
    ) -> Result<(bool, ScrapeReason)> {
        let (table, id_column) = match kind {
            EntityKind::League => ("leagues", "league_id"),
            EntityKind::Series => ("series", "series_id"),
            EntityKind::Season => ("seasons", "season_id"),
            EntityKind::Race => ("races", "schedule_id"),
            EntityKind::Driver => ("drivers", "driver_id"),
            EntityKind::Team => ("teams", "team_id"),
        };

        let row: Option<(String, Option<bool>)> = if kind == EntityKind::Race {
            self.conn
                .query_row(
                    "SELECT scraped_at, is_complete FROM races WHERE schedule_id = ?1",
                    params![entity_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
        } else {
            self.conn
                .query_row(
                    &format!("SELECT scraped_at FROM {table} WHERE {id_column} = ?1"),
                    params![entity_id],
                    |row| Ok((row.get(0)?, None)),
                )
                .optional()?
        };

        let Some((scraped_at, is_complete)) = row else {
            return Ok((true, ScrapeReason::NotInCache));
        };
        let Some(validity_hours) = validity_hours else {
            return Ok((false, ScrapeReason::CacheValidIndefinitely));
        };

        let freshness = FreshnessState::from_column(&scraped_at);
        let Some(age) = freshness.age(OffsetDateTime::now_utc()) else {
            return Ok((true, ScrapeReason::InvalidTimestamp));
        };
        if age > time::Duration::hours(i64::from(validity_hours)) {
            return Ok((true, ScrapeReason::CacheStale));
        }

        Ok(match kind {
            EntityKind::Race => {
                if is_complete.unwrap_or(false) {
                    (false, ScrapeReason::StatusCompleteStable)
                } else {
                    (true, ScrapeReason::StatusNeedsRefresh)
                }
            }
            EntityKind::Season => (true, ScrapeReason::StatusNeedsRefresh),
            _ => (false, ScrapeReason::CacheFresh),
        })
    }

    // Audit
    // -----

    /// Append a scrape attempt to the audit log, returning the log row id.
    pub fn log_scrape(
        &self,
        kind: EntityKind,
        url: &str,
        outcome: ScrapeOutcome,
        entity_id: Option<i64>,
        error: Option<&str>,
        duration_ms: Option<i64>,
    ) -> Result<i64> {
        require("entity_url", url)?;

        let _ = self.conn.execute(
            "INSERT INTO scrape_log (entity_type, entity_id, entity_url, status, error_message, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![kind.as_str(), entity_id, url, outcome.as_str(), error, duration_ms],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Recent audit-log rows, newest first.
    pub fn recent_scrapes(&self, limit: u32) -> Result<Vec<ScrapeLogEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM scrape_log ORDER BY log_id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], scrape_log_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }

    /// Append a schema alert, returning the alert row id.
    pub fn record_alert(&self, kind: EntityKind, alert_kind: &str, details: &str, url: Option<&str>) -> Result<i64> {
        require("alert_type", alert_kind)?;
        require("details", details)?;

        let _ = self.conn.execute(
            "INSERT INTO schema_alerts (entity_type, alert_type, details, url) VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), alert_kind, details, url],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All unresolved schema alerts, oldest first.
    pub fn open_alerts(&self) -> Result<Vec<SchemaAlert>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM schema_alerts WHERE resolved = 0 ORDER BY alert_id")?;
        let rows = stmt.query_map([], schema_alert_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::from)
    }
}

fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::League => "leagues",
        EntityKind::Series => "series",
        EntityKind::Season => "seasons",
        EntityKind::Race => "races",
        EntityKind::Driver => "drivers",
        EntityKind::Team => "teams",
    }
}

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    Ok(League {
        league_id: row.get("league_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        url: row.get("url")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn series_from_row(row: &Row<'_>) -> rusqlite::Result<Series> {
    Ok(Series {
        series_id: row.get("series_id")?,
        league_id: row.get("league_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_date: row.get("created_date")?,
        num_seasons: row.get("num_seasons")?,
        url: row.get("url")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn season_from_row(row: &Row<'_>) -> rusqlite::Result<Season> {
    Ok(Season {
        season_id: row.get("season_id")?,
        series_id: row.get("series_id")?,
        name: row.get("name")?,
        url: row.get("url")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn race_from_row(row: &Row<'_>) -> rusqlite::Result<Race> {
    Ok(Race {
        race_id: row.get("race_id")?,
        schedule_id: row.get("schedule_id")?,
        season_id: row.get("season_id")?,
        race_number: row.get("race_number")?,
        event_name: row.get("event_name")?,
        date: row.get("date")?,
        race_time: row.get("race_time")?,
        practice_time: row.get("practice_time")?,
        track_id: row.get("track_id")?,
        track_config_id: row.get("track_config_id")?,
        track_name: row.get("track_name")?,
        track_type: row.get("track_type")?,
        track_length: row.get("track_length")?,
        track_config_iracing_id: row.get("track_config_iracing_id")?,
        planned_laps: row.get("planned_laps")?,
        points_race: row.get("points_race")?,
        off_week: row.get("off_week")?,
        night_race: row.get("night_race")?,
        playoff_race: row.get("playoff_race")?,
        race_duration_minutes: row.get("race_duration_minutes")?,
        total_laps: row.get("total_laps")?,
        leaders: row.get("leaders")?,
        lead_changes: row.get("lead_changes")?,
        cautions: row.get("cautions")?,
        caution_laps: row.get("caution_laps")?,
        num_drivers: row.get("num_drivers")?,
        weather_type: row.get("weather_type")?,
        cloud_conditions: row.get("cloud_conditions")?,
        temperature_f: row.get("temperature_f")?,
        humidity_pct: row.get("humidity_pct")?,
        fog_pct: row.get("fog_pct")?,
        wind_dir: row.get("wind_dir")?,
        wind_speed: row.get("wind_speed")?,
        wind_unit: row.get("wind_unit")?,
        url: row.get("url")?,
        is_complete: row.get("is_complete")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        team_id: row.get("team_id")?,
        league_id: row.get("league_id")?,
        name: row.get("name")?,
        driver_count: row.get("driver_count")?,
        url: row.get("url")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn driver_from_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
    Ok(Driver {
        driver_id: row.get("driver_id")?,
        league_id: row.get("league_id")?,
        team_id: row.get("team_id")?,
        name: row.get("name")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        car_numbers: row.get("car_numbers")?,
        primary_number: row.get("primary_number")?,
        club: row.get("club")?,
        club_id: row.get("club_id")?,
        irating: row.get("irating")?,
        safety_rating: row.get("safety_rating")?,
        license_class: row.get("license_class")?,
        url: row.get("url")?,
        scraped_at: row.get("scraped_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn race_result_from_row(row: &Row<'_>) -> rusqlite::Result<RaceResult> {
    Ok(RaceResult {
        result_id: row.get("result_id")?,
        race_id: row.get("race_id")?,
        driver_id: row.get("driver_id")?,
        team: row.get("team")?,
        finish_position: row.get("finish_position")?,
        starting_position: row.get("starting_position")?,
        car_number: row.get("car_number")?,
        qualifying_time: row.get("qualifying_time")?,
        fastest_lap: row.get("fastest_lap")?,
        fastest_lap_number: row.get("fastest_lap_number")?,
        average_lap: row.get("average_lap")?,
        interval: row.get("interval")?,
        laps_completed: row.get("laps_completed")?,
        laps_led: row.get("laps_led")?,
        incident_points: row.get("incident_points")?,
        race_points: row.get("race_points")?,
        bonus_points: row.get("bonus_points")?,
        penalty_points: row.get("penalty_points")?,
        total_points: row.get("total_points")?,
        fast_laps: row.get("fast_laps")?,
        quality_passes: row.get("quality_passes")?,
        closing_passes: row.get("closing_passes")?,
        total_passes: row.get("total_passes")?,
        average_running_position: row.get("average_running_position")?,
        irating: row.get("irating")?,
        status: row.get("status")?,
        car_id: row.get("car_id")?,
        car: row.get("car")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn scrape_log_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeLogEntry> {
    Ok(ScrapeLogEntry {
        log_id: row.get("log_id")?,
        entity_kind: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        entity_url: row.get("entity_url")?,
        outcome: row.get("status")?,
        error_message: row.get("error_message")?,
        duration_ms: row.get("duration_ms")?,
        timestamp: row.get("timestamp")?,
    })
}

fn schema_alert_from_row(row: &Row<'_>) -> rusqlite::Result<SchemaAlert> {
    Ok(SchemaAlert {
        alert_id: row.get("alert_id")?,
        entity_kind: row.get("entity_type")?,
        alert_kind: row.get("alert_type")?,
        details: row.get("details")?,
        url: row.get("url")?,
        resolved: row.get("resolved")?,
        timestamp: row.get("timestamp")?,
    })
}
