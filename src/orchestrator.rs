//! The crawl orchestrator: a depth-first walk of the league → series → season → race hierarchy
//! under a depth limit, optional filters, and the freshness cache.
//!
//! One orchestrator owns one [`Store`], one [`FetchGate`], and one progress snapshot per run.
//! Recovery is local: one entity's failure is logged, recorded in the snapshot, and never aborts
//! its siblings or ancestors. Only store/IO failures (and operator interrupts) propagate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use time::UtcOffset;

use crate::{
    config::CrawlConfigs,
    error::{Error, Result},
    fetch::FetchGate,
    id::{DriverID, EntityKind, LeagueID, RaceRowID, SeasonID},
    site::{
        extract::{
            DriverExtractor, LeagueExtractor, RaceExtractor, SeasonExtractor, SeriesExtractor,
            league::SeriesRef,
            race::ResultRow,
            season::RaceRef,
            series::SeasonRef,
        },
        urls, when,
    },
    store::{
        Store,
        records::{
            DISCOVERY_SENTINEL, DriverUpdate, LeagueUpdate, RaceResultUpdate, RaceUpdate, ScrapeOutcome, SeasonUpdate,
            SeriesUpdate, now_timestamp, parse_driver_name,
        },
    },
};

/// How deep a crawl descends. Each level implies all the previous ones.
#[derive(clap::ValueEnum, serde::Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// League metadata only.
    League,
    /// League plus series metadata.
    Series,
    /// League, series, and seasons.
    Season,
    /// The full hierarchy including race results.
    Race,
}

/// Optional filters narrowing a crawl.
#[derive(Clone, Default, Debug)]
pub struct Filters {
    /// Only descend into series whose external id is listed.
    pub series_ids: Option<Vec<u32>>,
    /// Only descend into seasons whose name contains this year literal.
    pub season_year: Option<i32>,
    /// Descend into at most the first N seasons per series, in discovery order.
    pub season_limit: Option<usize>,
}

/// One entity failure as surfaced in the progress snapshot.
#[derive(Clone, PartialEq, Debug)]
pub struct ScrapeFailure {
    /// The entity kind that failed.
    pub entity: EntityKind,
    /// The URL being processed.
    pub url: String,
    /// The error, rendered.
    pub message: String,
}

/// Progress snapshot for a run: counts by entity kind, cache skips, and per-entity failures.
#[derive(Clone, Default, Debug)]
pub struct Progress {
    /// Leagues fetched and persisted.
    pub leagues_scraped: u64,
    /// Series fetched and persisted.
    pub series_scraped: u64,
    /// Seasons fetched and persisted.
    pub seasons_scraped: u64,
    /// Races fetched and persisted.
    pub races_scraped: u64,
    /// Driver profiles fetched and persisted (maintenance pass).
    pub drivers_scraped: u64,
    /// Entities skipped by the freshness cache.
    pub skipped_cached: u64,
    /// Per-entity failures; siblings of a failed entity still ran.
    pub errors: Vec<ScrapeFailure>,
}

/// The crawl coordinator. See the module docs for the walk and recovery rules.
#[derive(Debug)]
pub struct Orchestrator {
    store: Store,
    gate: FetchGate,
    progress: Progress,
    cancel: Arc<AtomicBool>,
    refetch_hub_pages: bool,
    schedule_offset: UtcOffset,
}

impl Orchestrator {
    /// Create an orchestrator over `store` configured by `configs`.
    ///
    /// The orchestrator creates the run's single [`FetchGate`] here and injects it into every
    /// extractor; rate limiting is shared across the whole run by construction.
    pub fn new(store: Store, configs: &CrawlConfigs) -> Self {
        Self {
            store,
            gate: FetchGate::new(configs.fetch_configs()),
            progress: Progress::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            refetch_hub_pages: configs.refetch_hub_pages,
            schedule_offset: when::offset_for_abbreviation(configs.schedule_timezone.as_deref()),
        }
    }

    /// The flag an interrupt handler sets to stop the walk. Checked before every fetch.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Borrow the underlying store (reports, export).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The current progress snapshot.
    pub fn get_progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Close the shared fetch resources after a completed run.
    pub fn finish(&self) {
        self.gate.close(false);
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Record a per-entity failure and continue, or propagate it if it is unrecoverable.
    ///
    /// Schema drift additionally appends a schema alert before logging. Store/IO errors and
    /// interrupts are the unrecoverable class.
    fn note_failure(&mut self, kind: EntityKind, url: &str, elapsed_ms: i64, error: Error) -> Result<()> {
        match error {
            Error::Interrupted => Err(Error::Interrupted),
            unrecoverable @ (Error::Sql(_) | Error::Io(_) | Error::Config(_)) => Err(unrecoverable),
            error => {
                if let Error::SchemaDrift { entity, detail } = &error {
                    let _ = self.store.record_alert(*entity, "schema_drift", detail, Some(url))?;
                }

                log::warn!("{kind} failed at {url}: {error}");
                let _ = self.store.log_scrape(
                    kind,
                    url,
                    ScrapeOutcome::Failed,
                    None,
                    Some(&error.to_string()),
                    Some(elapsed_ms),
                )?;
                self.progress.errors.push(ScrapeFailure {
                    entity: kind,
                    url: url.to_string(),
                    message: error.to_string(),
                });
                Ok(())
            }
        }
    }

    fn note_skip(&mut self, kind: EntityKind, url: &str, entity_id: Option<i64>, started: Instant) -> Result<()> {
        log::info!("cached, skipping {kind}: {url}");
        self.progress.skipped_cached += 1;
        let _ = self.store.log_scrape(
            kind,
            url,
            ScrapeOutcome::Skipped,
            entity_id,
            Some("URL cached"),
            Some(elapsed_ms(started)),
        )?;
        Ok(())
    }

    /// Crawl a league to `depth`, returning the run's progress snapshot.
    ///
    /// League and series pages are refetched even when cached (they are the canonical source for
    /// child discovery) unless the hub-refetch policy toggle is off. Seasons and races honor the
    /// freshness cache; completed races are immutable and skipped outright.
    pub fn scrape_league(
        &mut self,
        league_url: &str,
        depth: Depth,
        filters: &Filters,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<Progress> {
        self.progress = Progress::default();

        match self.walk_league(league_url, depth, filters, cache_max_age_days, force) {
            Ok(()) => Ok(self.get_progress()),
            Err(Error::Interrupted) => {
                self.gate.close(true);
                Err(Error::Interrupted)
            }
            Err(unrecoverable) => Err(unrecoverable),
        }
    }

    fn walk_league(
        &mut self,
        league_url: &str,
        depth: Depth,
        filters: &Filters,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<()> {
        self.check_interrupt()?;
        let started = Instant::now();

        // The league page is small, cheap, and the canonical list of series; "always fetch" is
        // the default policy, cache-skippable only via the configuration toggle.
        if !self.refetch_hub_pages
            && !force
            && self.store.is_url_cached(league_url, EntityKind::League, cache_max_age_days)?
        {
            return self.note_skip(EntityKind::League, league_url, None, started);
        }

        log::info!("fetching league: {league_url}");
        let extracted = LeagueExtractor::new(&self.gate).extract(league_url);
        let page = match extracted {
            Ok(page) => page,
            Err(error) => return self.note_failure(EntityKind::League, league_url, elapsed_ms(started), error),
        };

        let league_id = page.metadata.league_id;
        let _ = self.store.upsert_league(
            league_id,
            &LeagueUpdate {
                name: page.metadata.name.clone(),
                url: page.metadata.url.clone(),
                scraped_at: now_timestamp(),
                description: page.metadata.description.clone(),
            },
        )?;
        self.progress.leagues_scraped += 1;
        let _ = self.store.log_scrape(
            EntityKind::League,
            league_url,
            ScrapeOutcome::Success,
            Some(i64::from(league_id)),
            None,
            Some(elapsed_ms(started)),
        )?;

        if depth < Depth::Series {
            return Ok(());
        }

        let series = filter_series(page.series, filters);

        // Parent-discovery writes: capture names and hints from the league page before any
        // series page is fetched (or fails), marked with the discovery sentinel.
        for series_ref in &series {
            let _ = self.store.upsert_series(
                series_ref.series_id,
                league_id,
                &SeriesUpdate {
                    name: series_ref.name.clone(),
                    url: series_ref.url.clone(),
                    scraped_at: DISCOVERY_SENTINEL.to_string(),
                    description: series_ref.description.clone(),
                    created_date: series_ref.created_date.clone(),
                    num_seasons: series_ref.num_seasons,
                },
            )?;
        }

        for series_ref in &series {
            self.walk_series(series_ref, league_id, depth, filters, cache_max_age_days, force)?;
        }

        Ok(())
    }

    fn walk_series(
        &mut self,
        series_ref: &SeriesRef,
        league_id: LeagueID,
        depth: Depth,
        filters: &Filters,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<()> {
        self.check_interrupt()?;
        let started = Instant::now();
        let series_url = series_ref.url.as_str();

        // Same hub policy as the league page: the seasons list must be fresh.
        if !self.refetch_hub_pages
            && !force
            && self.store.is_url_cached(series_url, EntityKind::Series, cache_max_age_days)?
        {
            return self.note_skip(EntityKind::Series, series_url, Some(i64::from(series_ref.series_id)), started);
        }

        log::info!("fetching series: {series_url}");
        let extracted = SeriesExtractor::new(&self.gate).extract(series_url);
        let page = match extracted {
            Ok(page) => page,
            Err(error) => return self.note_failure(EntityKind::Series, series_url, elapsed_ms(started), error),
        };

        let series_id = page.metadata.series_id;

        // The league page's embedded data is the authoritative series name; the series page's
        // own heading is often generic. Merge without losing the better value.
        let name = match self.store.get_series(series_id)? {
            Some(existing) if !existing.name.is_empty() && existing.name != "Unknown Series" => existing.name,
            _ => page.metadata.name.clone(),
        };

        let _ = self.store.upsert_series(
            series_id,
            league_id,
            &SeriesUpdate {
                name,
                url: page.metadata.url.clone(),
                scraped_at: now_timestamp(),
                description: None,
                created_date: None,
                num_seasons: None,
            },
        )?;
        self.progress.series_scraped += 1;
        let _ = self.store.log_scrape(
            EntityKind::Series,
            series_url,
            ScrapeOutcome::Success,
            Some(i64::from(series_id)),
            None,
            Some(elapsed_ms(started)),
        )?;

        if depth < Depth::Season {
            return Ok(());
        }

        let seasons = filter_seasons(page.seasons, filters);

        for season_ref in &seasons {
            let _ = self.store.upsert_season(
                season_ref.season_id,
                series_id,
                &SeasonUpdate {
                    name: season_ref.name.clone(),
                    url: season_ref.url.clone(),
                    scraped_at: DISCOVERY_SENTINEL.to_string(),
                },
            )?;
        }

        for season_ref in &seasons {
            self.walk_season(season_ref, series_id, depth, cache_max_age_days, force)?;
        }

        Ok(())
    }

    fn walk_season(
        &mut self,
        season_ref: &SeasonRef,
        series_id: u32,
        depth: Depth,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<()> {
        self.check_interrupt()?;
        let started = Instant::now();
        let season_url = season_ref.url.as_str();
        let season_id = season_ref.season_id;

        if !force && self.store.is_url_cached(season_url, EntityKind::Season, cache_max_age_days)? {
            return self.note_skip(EntityKind::Season, season_url, Some(i64::from(season_id)), started);
        }

        log::info!("fetching season: {season_url}");
        let extracted = SeasonExtractor::new(&self.gate, self.schedule_offset).extract(season_url);
        let page = match extracted {
            Ok(page) => page,
            Err(error) => return self.note_failure(EntityKind::Season, season_url, elapsed_ms(started), error),
        };

        // Prefer the name captured from the series page's embedded data over the schedule
        // page's heading.
        let name = match self.store.get_season(season_id)? {
            Some(existing) if !existing.name.is_empty() && existing.name != "Unknown Season" => existing.name,
            _ => page.metadata.name.clone(),
        };

        let _ = self.store.upsert_season(
            season_id,
            series_id,
            &SeasonUpdate {
                name,
                url: page.metadata.url.clone(),
                scraped_at: now_timestamp(),
            },
        )?;
        self.progress.seasons_scraped += 1;
        let _ = self.store.log_scrape(
            EntityKind::Season,
            season_url,
            ScrapeOutcome::Success,
            Some(i64::from(season_id)),
            None,
            Some(elapsed_ms(started)),
        )?;

        if depth < Depth::Race {
            return Ok(());
        }

        // Parent-discovery writes for the races, then visit each in schedule order.
        for race_ref in &page.races {
            let _ = self.store.upsert_race(
                race_ref.schedule_id,
                season_id,
                &RaceUpdate {
                    url: race_ref.url.clone(),
                    scraped_at: DISCOVERY_SENTINEL.to_string(),
                    race_number: race_ref.race_number,
                    date: race_ref.date.clone(),
                    track_name: race_ref.track.clone(),
                    ..RaceUpdate::default()
                },
            )?;
        }

        for race_ref in &page.races {
            self.walk_race(race_ref, season_id, cache_max_age_days, force)?;
        }

        Ok(())
    }

    fn walk_race(
        &mut self,
        race_ref: &RaceRef,
        season_id: SeasonID,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<()> {
        self.check_interrupt()?;
        let started = Instant::now();
        let race_url = race_ref.url.as_str();
        let schedule_id = race_ref.schedule_id;

        // Two-layer gate: a completed race is immutable regardless of any age window, then the
        // ordinary URL freshness check.
        if !force && self.store.is_race_complete(schedule_id)? {
            return self.note_skip(EntityKind::Race, race_url, Some(i64::from(schedule_id)), started);
        }
        if !force && self.store.is_url_cached(race_url, EntityKind::Race, cache_max_age_days)? {
            return self.note_skip(EntityKind::Race, race_url, Some(i64::from(schedule_id)), started);
        }

        log::info!("fetching race: {race_url}");
        let extracted = RaceExtractor::new(&self.gate).extract(race_url);
        let page = match extracted {
            Ok(page) => page,
            Err(error) => return self.note_failure(EntityKind::Race, race_url, elapsed_ms(started), error),
        };
        let meta = page.metadata;

        // Reaching a race page with a results table is the completion signal.
        let race_row_id = self.store.upsert_race(
            schedule_id,
            season_id,
            &RaceUpdate {
                url: meta.url.clone(),
                scraped_at: now_timestamp(),
                race_number: meta.race_number.unwrap_or(race_ref.race_number),
                event_name: meta.event_name.clone(),
                date: meta.date.clone().or_else(|| race_ref.date.clone()),
                race_time: meta.race_time.clone(),
                practice_time: meta.practice_time.clone(),
                track_id: meta.track_id,
                track_config_id: meta.track_config_id,
                track_name: meta.track_name.clone(),
                track_type: meta.track_type.clone(),
                track_length: meta.track_length,
                track_config_iracing_id: meta.track_config_iracing_id.clone(),
                planned_laps: meta.planned_laps,
                points_race: meta.points_race,
                off_week: meta.off_week,
                night_race: meta.night_race,
                playoff_race: meta.playoff_race,
                race_duration_minutes: meta.race_duration_minutes,
                total_laps: meta.total_laps,
                leaders: meta.leaders,
                lead_changes: meta.lead_changes,
                cautions: meta.cautions,
                caution_laps: meta.caution_laps,
                num_drivers: meta.num_drivers,
                weather_type: meta.weather_type.clone(),
                cloud_conditions: meta.cloud_conditions.clone(),
                temperature_f: meta.temperature_f,
                humidity_pct: meta.humidity_pct,
                fog_pct: meta.fog_pct,
                wind_dir: meta.wind_dir.clone(),
                wind_speed: meta.wind_speed.clone(),
                wind_unit: meta.wind_unit.clone(),
                is_complete: Some(true),
            },
        )?;
        self.progress.races_scraped += 1;

        if log::log_enabled!(log::Level::Debug)
            && let Some(row) = self.store.get_race(schedule_id)?
        {
            log::debug!("race {schedule_id} persisted, flags {:?}", row.flags());
        }

        for result in &page.results {
            self.store_result(race_row_id, season_id, result)?;
        }

        let _ = self.store.log_scrape(
            EntityKind::Race,
            race_url,
            ScrapeOutcome::Success,
            Some(i64::from(schedule_id)),
            None,
            Some(elapsed_ms(started)),
        )?;

        Ok(())
    }

    /// Persist one result row: lazily upsert the driver (a parent-discovery write carrying the
    /// split name and profile URL), then the fact row. A driver that cannot be stored skips this
    /// one result, never the whole race.
    fn store_result(&mut self, race_row_id: RaceRowID, season_id: SeasonID, row: &ResultRow) -> Result<()> {
        let Some(driver_id) = row.driver_id else {
            // No profile link in the name cell; without an external id there is nothing to key
            // the driver row on.
            return Ok(());
        };

        let Some(season) = self.store.get_season(season_id)? else {
            return Ok(());
        };
        let Some(series) = self.store.get_series(season.series_id)? else {
            return Ok(());
        };
        let league_id = series.league_id;

        let name = row.driver_name.clone().unwrap_or_else(|| "Unknown Driver".to_string());
        let (first_name, last_name) = parse_driver_name(&name);

        if let Err(error) = self.store.upsert_driver(
            driver_id,
            league_id,
            &DriverUpdate {
                name,
                url: urls::driver_url(driver_id),
                scraped_at: DISCOVERY_SENTINEL.to_string(),
                first_name,
                last_name,
                car_numbers: Some(row.car_number.clone()),
                primary_number: Some(row.car_number.clone()),
                ..DriverUpdate::default()
            },
        ) {
            log::warn!("skipping result for driver {driver_id}: {error}");
            return Ok(());
        }

        if let Err(error) = self.store.upsert_race_result(
            race_row_id,
            driver_id,
            &RaceResultUpdate {
                team: row.team.clone(),
                finish_position: Some(row.finish_position),
                starting_position: row.starting_position,
                car_number: Some(row.car_number.clone()),
                qualifying_time: row.qualifying_time.clone(),
                fastest_lap: row.fastest_lap.clone(),
                fastest_lap_number: row.fastest_lap_number,
                average_lap: row.average_lap.clone(),
                interval: row.interval.clone(),
                laps_completed: row.laps_completed,
                laps_led: row.laps_led,
                incident_points: row.incidents,
                race_points: row.race_points,
                bonus_points: row.bonus_points,
                penalty_points: None,
                total_points: row.total_points,
                fast_laps: row.fast_laps,
                quality_passes: row.quality_passes,
                closing_passes: row.closing_passes,
                total_passes: row.total_passes,
                average_running_position: row.average_running_position,
                irating: row.irating,
                status: row.status.clone(),
                car_id: None,
                car: row.car.clone(),
            },
        ) {
            log::warn!("failed to store result for driver {driver_id}: {error}");
        }

        Ok(())
    }

    /// Maintenance pass over one driver's profile page, merging the current rating snapshot.
    pub fn refresh_driver(&mut self, driver_id: DriverID, cache_max_age_days: Option<u32>, force: bool) -> Result<()> {
        self.check_interrupt()?;
        let started = Instant::now();
        let url = urls::driver_url(driver_id);

        if !force && self.store.is_url_cached(&url, EntityKind::Driver, cache_max_age_days)? {
            return self.note_skip(EntityKind::Driver, &url, Some(i64::from(driver_id)), started);
        }

        let Some(existing) = self.store.get_driver(driver_id)? else {
            return self.note_failure(
                EntityKind::Driver,
                &url,
                elapsed_ms(started),
                Error::Validation(format!("driver {driver_id} is not in the store")),
            );
        };

        log::info!("fetching driver: {url}");
        let extracted = DriverExtractor::new(&self.gate).extract(&url);
        let snapshot = match extracted {
            Ok(snapshot) => snapshot,
            Err(error) => return self.note_failure(EntityKind::Driver, &url, elapsed_ms(started), error),
        };

        let _ = self.store.upsert_driver(
            driver_id,
            existing.league_id,
            &DriverUpdate {
                name: existing.name,
                url,
                scraped_at: now_timestamp(),
                irating: snapshot.irating,
                safety_rating: snapshot.safety_rating,
                license_class: snapshot.license_class,
                ..DriverUpdate::default()
            },
        )?;
        self.progress.drivers_scraped += 1;
        let _ = self.store.log_scrape(
            EntityKind::Driver,
            &urls::driver_url(driver_id),
            ScrapeOutcome::Success,
            Some(i64::from(driver_id)),
            None,
            Some(elapsed_ms(started)),
        )?;

        Ok(())
    }

    /// Maintenance pass over every known driver of a league.
    pub fn refresh_all_drivers(
        &mut self,
        league_id: LeagueID,
        cache_max_age_days: Option<u32>,
        force: bool,
    ) -> Result<Progress> {
        let drivers = self.store.get_drivers_by_league(league_id)?;
        log::info!("refreshing {} driver profile(s) for league {league_id}", drivers.len());

        for driver in drivers {
            match self.refresh_driver(driver.driver_id, cache_max_age_days, force) {
                Ok(()) => {}
                Err(Error::Interrupted) => {
                    self.gate.close(true);
                    return Err(Error::Interrupted);
                }
                Err(unrecoverable) => return Err(unrecoverable),
            }
        }

        Ok(self.get_progress())
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn filter_series(series: Vec<SeriesRef>, filters: &Filters) -> Vec<SeriesRef> {
    match &filters.series_ids {
        Some(allowed) => series
            .into_iter()
            .filter(|series_ref| allowed.contains(&series_ref.series_id))
            .collect(),
        None => series,
    }
}

fn filter_seasons(seasons: Vec<SeasonRef>, filters: &Filters) -> Vec<SeasonRef> {
    let mut seasons = match filters.season_year {
        Some(year) => {
            let literal = year.to_string();
            seasons
                .into_iter()
                .filter(|season_ref| season_ref.name.contains(&literal))
                .collect()
        }
        None => seasons,
    };

    if let Some(limit) = filters.season_limit {
        seasons.truncate(limit);
    }

    seasons
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::store::records::now_timestamp;
    use crate::tests::asserts::*;

    use super::*;

    fn season_ref(season_id: u32, name: &str) -> SeasonRef {
        SeasonRef {
            season_id,
            name: name.to_string(),
            url: urls::season_url(season_id),
            start_time: None,
            scheduled_races: None,
            completed_races: None,
        }
    }

    fn series_ref(series_id: u32) -> SeriesRef {
        SeriesRef {
            series_id,
            name: format!("Series {series_id}"),
            url: urls::series_url(series_id),
            description: None,
            created_date: None,
            num_seasons: None,
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Store::open_in_memory().unwrap(), &CrawlConfigs::default())
    }

    fn seed_hierarchy(store: &Store) {
        let _ = store
            .upsert_league(
                1558,
                &crate::store::records::LeagueUpdate {
                    name: "The OBRL".into(),
                    url: urls::league_url(1558),
                    scraped_at: now_timestamp(),
                    description: None,
                },
            )
            .unwrap();
        let _ = store
            .upsert_series(
                3714,
                1558,
                &SeriesUpdate {
                    name: "Wednesday Night".into(),
                    url: urls::series_url(3714),
                    scraped_at: now_timestamp(),
                    ..SeriesUpdate::default()
                },
            )
            .unwrap();
        let _ = store
            .upsert_season(
                17424,
                3714,
                &SeasonUpdate {
                    name: "2025 S1".into(),
                    url: urls::season_url(17424),
                    scraped_at: now_timestamp(),
                },
            )
            .unwrap();
    }

    #[test]
    fn depth_levels_are_ordered() {
        assert_lt!(Depth::League, Depth::Series);
        assert_lt!(Depth::Series, Depth::Season);
        assert_lt!(Depth::Season, Depth::Race);
    }

    #[test]
    fn series_filter_keeps_only_listed_ids() {
        let filters = Filters {
            series_ids: Some(vec![3714, 3712]),
            ..Filters::default()
        };

        let kept = filter_series(vec![series_ref(3714), series_ref(3713), series_ref(3712)], &filters);
        let ids: Vec<u32> = kept.iter().map(|s| s.series_id).collect();
        assert_eq!(ids, vec![3714, 3712]);
    }

    #[test]
    fn season_filters_compose_year_then_limit() {
        let filters = Filters {
            season_year: Some(2025),
            season_limit: Some(1),
            ..Filters::default()
        };

        let kept = filter_seasons(
            vec![
                season_ref(1, "2025 S1"),
                season_ref(2, "2024 S4"),
                season_ref(3, "2025 S2"),
            ],
            &filters,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].season_id, 1);
    }

    #[test]
    fn completed_race_is_skipped_without_a_fetch() {
        let mut orch = orchestrator();
        seed_hierarchy(orch.store());

        let mut update = RaceUpdate {
            url: urls::race_url(324_462),
            scraped_at: now_timestamp(),
            race_number: 1,
            ..RaceUpdate::default()
        };
        update.is_complete = Some(true);
        let _ = orch.store.upsert_race(324_462, 17424, &update).unwrap();

        let race = RaceRef {
            schedule_id: 324_462,
            url: urls::race_url(324_462),
            race_number: 1,
            track: None,
            has_results: true,
            date: None,
        };

        // A zero-day window would normally force a refetch; completion wins.
        orch.walk_race(&race, 17424, Some(0), false).unwrap();

        assert_eq!(orch.progress.skipped_cached, 1);
        assert_eq!(orch.progress.races_scraped, 0);
        let log = orch.store().recent_scrapes(1).unwrap();
        assert_eq!(log[0].outcome, "skipped");
        assert_eq!(log[0].entity_kind, "race");
    }

    #[test]
    fn fresh_season_is_skipped_with_an_audit_row() {
        let mut orch = orchestrator();
        seed_hierarchy(orch.store());

        orch.walk_season(&season_ref(17424, "2025 S1"), 3714, Depth::Season, Some(7), false)
            .unwrap();

        assert_eq!(orch.progress.skipped_cached, 1);
        assert_eq!(orch.progress.seasons_scraped, 0);
        let log = orch.store().recent_scrapes(1).unwrap();
        assert_eq!(log[0].outcome, "skipped");
        assert_eq!(log[0].entity_url, urls::season_url(17424));
    }

    #[test]
    fn results_without_a_driver_link_are_skipped_softly() {
        let mut orch = orchestrator();
        seed_hierarchy(orch.store());
        let race_row_id = orch
            .store
            .upsert_race(
                324_462,
                17424,
                &RaceUpdate {
                    url: urls::race_url(324_462),
                    scraped_at: now_timestamp(),
                    race_number: 1,
                    ..RaceUpdate::default()
                },
            )
            .unwrap();

        let linked = ResultRow {
            finish_position: 1,
            car_number: "24".into(),
            driver_name: Some("Doe, John".into()),
            driver_id: Some(98_765),
            laps_led: Some(88),
            ..ResultRow::default()
        };
        let unlinked = ResultRow {
            finish_position: 2,
            car_number: "7".into(),
            driver_name: Some("Jane Smith".into()),
            driver_id: None,
            ..ResultRow::default()
        };

        orch.store_result(race_row_id, 17424, &linked).unwrap();
        orch.store_result(race_row_id, 17424, &unlinked).unwrap();

        let results = orch.store().get_race_results(race_row_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].driver_id, 98_765);

        let driver = orch.store().get_driver(98_765).unwrap().unwrap();
        assert_eq!(driver.first_name.as_deref(), Some("John"));
        assert_eq!(driver.last_name.as_deref(), Some("Doe"));
        assert_eq!(
            driver.scraped_at,
            DISCOVERY_SENTINEL.to_string(),
            "a driver discovered from results has not had a profile fetch"
        );
    }

    #[test]
    fn schema_drift_records_an_alert_and_continues() {
        let mut orch = orchestrator();
        let url = urls::series_url(3714);

        let drift = Error::SchemaDrift {
            entity: EntityKind::Series,
            detail: "missing marker pattern(s): seasons array".to_string(),
        };
        orch.note_failure(EntityKind::Series, &url, 5, drift).unwrap();

        let alerts = orch.store().open_alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].entity_kind, "series");
        assert_eq!(alerts[0].url.as_deref(), Some(url.as_str()));

        let log = orch.store().recent_scrapes(1).unwrap();
        assert_eq!(log[0].outcome, "failed");

        let progress = orch.get_progress();
        assert_eq!(progress.errors.len(), 1);
        assert_eq!(progress.errors[0].entity, EntityKind::Series);
    }

    #[test]
    fn interrupts_and_store_failures_propagate_out_of_note_failure() {
        let mut orch = orchestrator();

        let interrupted = orch.note_failure(EntityKind::Race, "https://host/r", 1, Error::Interrupted);
        assert_true!(matches!(interrupted, Err(Error::Interrupted)));

        let transport = orch.note_failure(
            EntityKind::Race,
            "https://host/r",
            1,
            Error::Http(ureq::Error::ConnectionFailed),
        );
        assert_true!(transport.is_ok(), "transport failures are per-entity, not fatal");
    }

    #[test]
    fn interrupt_stops_before_any_fetch() {
        let mut orch = orchestrator();
        orch.cancel_flag().store(true, Ordering::Relaxed);

        let result = orch.scrape_league(&urls::league_url(1558), Depth::Race, &Filters::default(), Some(7), false);
        assert_true!(matches!(result, Err(Error::Interrupted)));
        assert_eq!(orch.get_progress().leagues_scraped, 0);
    }

    #[test]
    #[ignore = "requires network access and a Chromium install"]
    fn first_time_league_crawl_live() {
        let mut orch = orchestrator();

        let progress = orch
            .scrape_league(&urls::league_url(1558), Depth::League, &Filters::default(), Some(7), false)
            .unwrap();
        orch.finish();

        assert_eq!(progress.leagues_scraped, 1);
        assert_eq!(progress.skipped_cached, 0);
        assert_true!(progress.errors.is_empty());
    }
}
