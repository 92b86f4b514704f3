//! SQLite schema for the store: nine tables, their indexes, and the CHECK'd enum domains.
//!
//! Creation is idempotent (`IF NOT EXISTS` throughout) so [`Store::open`](crate::store::Store)
//! can run it on every start.

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS leagues (
    league_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    url TEXT NOT NULL UNIQUE,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_leagues_url ON leagues(url);
CREATE INDEX IF NOT EXISTS idx_leagues_scraped_at ON leagues(scraped_at);

CREATE TABLE IF NOT EXISTS teams (
    team_id INTEGER PRIMARY KEY,
    league_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    driver_count INTEGER,
    url TEXT,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (league_id) REFERENCES leagues(league_id)
);
CREATE INDEX IF NOT EXISTS idx_teams_league_id ON teams(league_id);
CREATE INDEX IF NOT EXISTS idx_teams_scraped_at ON teams(scraped_at);

CREATE TABLE IF NOT EXISTS drivers (
    driver_id INTEGER PRIMARY KEY,
    league_id INTEGER NOT NULL,
    team_id INTEGER,
    name TEXT NOT NULL,
    first_name TEXT,
    last_name TEXT,
    car_numbers TEXT,
    primary_number TEXT,
    club TEXT,
    club_id INTEGER,
    irating INTEGER,
    safety_rating REAL,
    license_class TEXT,
    url TEXT NOT NULL UNIQUE,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (league_id) REFERENCES leagues(league_id),
    FOREIGN KEY (team_id) REFERENCES teams(team_id)
);
CREATE INDEX IF NOT EXISTS idx_drivers_league_id ON drivers(league_id);
CREATE INDEX IF NOT EXISTS idx_drivers_team_id ON drivers(team_id);
CREATE INDEX IF NOT EXISTS idx_drivers_url ON drivers(url);
CREATE INDEX IF NOT EXISTS idx_drivers_name ON drivers(name);
CREATE INDEX IF NOT EXISTS idx_drivers_scraped_at ON drivers(scraped_at);

CREATE TABLE IF NOT EXISTS series (
    series_id INTEGER PRIMARY KEY,
    league_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    created_date DATE,
    num_seasons INTEGER,
    url TEXT NOT NULL UNIQUE,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (league_id) REFERENCES leagues(league_id)
);
CREATE INDEX IF NOT EXISTS idx_series_league_id ON series(league_id);
CREATE INDEX IF NOT EXISTS idx_series_url ON series(url);
CREATE INDEX IF NOT EXISTS idx_series_scraped_at ON series(scraped_at);

CREATE TABLE IF NOT EXISTS seasons (
    season_id INTEGER PRIMARY KEY,
    series_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (series_id) REFERENCES series(series_id)
);
CREATE INDEX IF NOT EXISTS idx_seasons_series_id ON seasons(series_id);
CREATE INDEX IF NOT EXISTS idx_seasons_url ON seasons(url);
CREATE INDEX IF NOT EXISTS idx_seasons_scraped_at ON seasons(scraped_at);

CREATE TABLE IF NOT EXISTS races (
    race_id INTEGER PRIMARY KEY AUTOINCREMENT,
    schedule_id INTEGER NOT NULL UNIQUE,
    season_id INTEGER NOT NULL,
    race_number INTEGER NOT NULL,
    event_name TEXT,
    date TIMESTAMP,
    race_time TEXT,
    practice_time TEXT,
    track_id INTEGER,
    track_config_id INTEGER,
    track_name TEXT,
    track_type TEXT,
    track_length REAL,
    track_config_iracing_id TEXT,
    planned_laps INTEGER,
    points_race BOOLEAN,
    off_week BOOLEAN,
    night_race BOOLEAN,
    playoff_race BOOLEAN,
    race_duration_minutes INTEGER,
    total_laps INTEGER,
    leaders INTEGER,
    lead_changes INTEGER,
    cautions INTEGER,
    caution_laps INTEGER,
    num_drivers INTEGER,
    weather_type TEXT,
    cloud_conditions TEXT,
    temperature_f INTEGER,
    humidity_pct INTEGER,
    fog_pct INTEGER,
    wind_dir TEXT,
    wind_speed TEXT,
    wind_unit TEXT,
    url TEXT NOT NULL UNIQUE,
    is_complete BOOLEAN DEFAULT 0,
    scraped_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (season_id) REFERENCES seasons(season_id)
);
CREATE INDEX IF NOT EXISTS idx_races_schedule_id ON races(schedule_id);
CREATE INDEX IF NOT EXISTS idx_races_season_id ON races(season_id);
CREATE INDEX IF NOT EXISTS idx_races_url ON races(url);
CREATE INDEX IF NOT EXISTS idx_races_date ON races(date);
CREATE INDEX IF NOT EXISTS idx_races_is_complete ON races(is_complete);
CREATE INDEX IF NOT EXISTS idx_races_scraped_at ON races(scraped_at);

CREATE TABLE IF NOT EXISTS race_results (
    result_id INTEGER PRIMARY KEY AUTOINCREMENT,
    race_id INTEGER NOT NULL,
    driver_id INTEGER NOT NULL,
    team TEXT,
    finish_position INTEGER,
    starting_position INTEGER,
    car_number TEXT,
    qualifying_time TEXT,
    fastest_lap TEXT,
    fastest_lap_number INTEGER,
    average_lap TEXT,
    interval TEXT,
    laps_completed INTEGER,
    laps_led INTEGER,
    incident_points INTEGER,
    race_points INTEGER,
    bonus_points INTEGER,
    penalty_points INTEGER,
    total_points INTEGER,
    fast_laps INTEGER,
    quality_passes INTEGER,
    closing_passes INTEGER,
    total_passes INTEGER,
    average_running_position REAL,
    irating INTEGER,
    status TEXT,
    car_id INTEGER,
    car TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (race_id) REFERENCES races(race_id),
    FOREIGN KEY (driver_id) REFERENCES drivers(driver_id),
    UNIQUE(race_id, driver_id)
);
CREATE INDEX IF NOT EXISTS idx_race_results_race_id ON race_results(race_id);
CREATE INDEX IF NOT EXISTS idx_race_results_driver_id ON race_results(driver_id);
CREATE INDEX IF NOT EXISTS idx_race_results_position ON race_results(finish_position);

CREATE TABLE IF NOT EXISTS scrape_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL CHECK(entity_type IN ('league', 'team', 'driver', 'series', 'season', 'race')),
    entity_id INTEGER,
    entity_url TEXT NOT NULL,
    status TEXT NOT NULL CHECK(status IN ('success', 'failed', 'skipped')),
    error_message TEXT,
    duration_ms INTEGER,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_scrape_log_entity_type ON scrape_log(entity_type);
CREATE INDEX IF NOT EXISTS idx_scrape_log_status ON scrape_log(status);
CREATE INDEX IF NOT EXISTS idx_scrape_log_timestamp ON scrape_log(timestamp);

CREATE TABLE IF NOT EXISTS schema_alerts (
    alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    details TEXT NOT NULL,
    url TEXT,
    resolved BOOLEAN DEFAULT 0,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_schema_alerts_resolved ON schema_alerts(resolved);
CREATE INDEX IF NOT EXISTS idx_schema_alerts_timestamp ON schema_alerts(timestamp);
";

/// Create all tables and indexes (idempotent) and enforce foreign keys on `conn`.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// The persisted tables in export order, with their columns and declared types.
///
/// The export utility emits one file per entry; the declared types are the contract downstream
/// loaders rely on.
pub const EXPORT_TABLES: &[(&str, &[(&str, &str)])] = &[
    (
        "leagues",
        &[
            ("league_id", "INTEGER"),
            ("name", "TEXT"),
            ("description", "TEXT"),
            ("url", "TEXT"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "teams",
        &[
            ("team_id", "INTEGER"),
            ("league_id", "INTEGER"),
            ("name", "TEXT"),
            ("driver_count", "INTEGER"),
            ("url", "TEXT"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "drivers",
        &[
            ("driver_id", "INTEGER"),
            ("league_id", "INTEGER"),
            ("team_id", "INTEGER"),
            ("name", "TEXT"),
            ("first_name", "TEXT"),
            ("last_name", "TEXT"),
            ("car_numbers", "TEXT"),
            ("primary_number", "TEXT"),
            ("club", "TEXT"),
            ("club_id", "INTEGER"),
            ("irating", "INTEGER"),
            ("safety_rating", "REAL"),
            ("license_class", "TEXT"),
            ("url", "TEXT"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "series",
        &[
            ("series_id", "INTEGER"),
            ("league_id", "INTEGER"),
            ("name", "TEXT"),
            ("description", "TEXT"),
            ("created_date", "TEXT"),
            ("num_seasons", "INTEGER"),
            ("url", "TEXT"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "seasons",
        &[
            ("season_id", "INTEGER"),
            ("series_id", "INTEGER"),
            ("name", "TEXT"),
            ("url", "TEXT"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "races",
        &[
            ("race_id", "INTEGER"),
            ("schedule_id", "INTEGER"),
            ("season_id", "INTEGER"),
            ("race_number", "INTEGER"),
            ("event_name", "TEXT"),
            ("date", "TIMESTAMP"),
            ("race_time", "TEXT"),
            ("practice_time", "TEXT"),
            ("track_id", "INTEGER"),
            ("track_config_id", "INTEGER"),
            ("track_name", "TEXT"),
            ("track_type", "TEXT"),
            ("track_length", "REAL"),
            ("track_config_iracing_id", "TEXT"),
            ("planned_laps", "INTEGER"),
            ("points_race", "BOOLEAN"),
            ("off_week", "BOOLEAN"),
            ("night_race", "BOOLEAN"),
            ("playoff_race", "BOOLEAN"),
            ("race_duration_minutes", "INTEGER"),
            ("total_laps", "INTEGER"),
            ("leaders", "INTEGER"),
            ("lead_changes", "INTEGER"),
            ("cautions", "INTEGER"),
            ("caution_laps", "INTEGER"),
            ("num_drivers", "INTEGER"),
            ("weather_type", "TEXT"),
            ("cloud_conditions", "TEXT"),
            ("temperature_f", "INTEGER"),
            ("humidity_pct", "INTEGER"),
            ("fog_pct", "INTEGER"),
            ("wind_dir", "TEXT"),
            ("wind_speed", "TEXT"),
            ("wind_unit", "TEXT"),
            ("url", "TEXT"),
            ("is_complete", "BOOLEAN"),
            ("scraped_at", "TIMESTAMP"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "race_results",
        &[
            ("result_id", "INTEGER"),
            ("race_id", "INTEGER"),
            ("driver_id", "INTEGER"),
            ("team", "TEXT"),
            ("finish_position", "INTEGER"),
            ("starting_position", "INTEGER"),
            ("car_number", "TEXT"),
            ("qualifying_time", "TEXT"),
            ("fastest_lap", "TEXT"),
            ("fastest_lap_number", "INTEGER"),
            ("average_lap", "TEXT"),
            ("interval", "TEXT"),
            ("laps_completed", "INTEGER"),
            ("laps_led", "INTEGER"),
            ("incident_points", "INTEGER"),
            ("race_points", "INTEGER"),
            ("bonus_points", "INTEGER"),
            ("penalty_points", "INTEGER"),
            ("total_points", "INTEGER"),
            ("fast_laps", "INTEGER"),
            ("quality_passes", "INTEGER"),
            ("closing_passes", "INTEGER"),
            ("total_passes", "INTEGER"),
            ("average_running_position", "REAL"),
            ("irating", "INTEGER"),
            ("status", "TEXT"),
            ("car_id", "INTEGER"),
            ("car", "TEXT"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "scrape_log",
        &[
            ("log_id", "INTEGER"),
            ("entity_type", "TEXT"),
            ("entity_id", "INTEGER"),
            ("entity_url", "TEXT"),
            ("status", "TEXT"),
            ("error_message", "TEXT"),
            ("duration_ms", "INTEGER"),
            ("timestamp", "TIMESTAMP"),
        ],
    ),
    (
        "schema_alerts",
        &[
            ("alert_id", "INTEGER"),
            ("entity_type", "TEXT"),
            ("alert_type", "TEXT"),
            ("details", "TEXT"),
            ("url", "TEXT"),
            ("resolved", "BOOLEAN"),
            ("timestamp", "TIMESTAMP"),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 9);
    }

    #[test]
    fn export_catalogue_matches_live_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for (table, columns) in EXPORT_TABLES {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table} LIMIT 0")).unwrap();
            let live: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_string()).collect();
            let declared: Vec<String> = columns.iter().map(|(name, _)| (*name).to_string()).collect();
            assert_eq!(live, declared, "column drift in {table}");
        }
    }
}
