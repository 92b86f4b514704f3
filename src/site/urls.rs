//! URL shapes for the crawled hierarchy: validation, external-id extraction, and builders.
//!
//! Each entity kind has exactly one URL shape, identified by its PHP endpoint and the integer
//! query parameter carrying the entity's external id. Extractors refuse URLs that do not match
//! their shape before any network work happens.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::{Error, Result},
    id::{DriverID, EntityKind, LeagueID, ScheduleID, SeasonID, SeriesID},
};

/// Base URL all relative links on the site resolve against.
pub const SITE_BASE_URL: &str = "https://www.simracerhub.com";

static LEAGUE_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"league_series\.php\?league_id=\d+").unwrap());
static SERIES_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"series_seasons\.php\?series_id=\d+").unwrap());
static SEASON_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"season_schedule\.php\?season_id=\d+").unwrap());
static RACE_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"season_race\.php\?schedule_id=\d+").unwrap());
static DRIVER_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"driver_stats\.php\?driver_id=\d+").unwrap());

fn shape_for(kind: EntityKind) -> Option<(&'static Regex, &'static str)> {
    match kind {
        EntityKind::League => Some((&LEAGUE_URL_RE, "league_series.php?league_id=<id>")),
        EntityKind::Series => Some((&SERIES_URL_RE, "series_seasons.php?series_id=<id>")),
        EntityKind::Season => Some((&SEASON_URL_RE, "season_schedule.php?season_id=<id>")),
        EntityKind::Race => Some((&RACE_URL_RE, "season_race.php?schedule_id=<id>")),
        EntityKind::Driver => Some((&DRIVER_URL_RE, "driver_stats.php?driver_id=<id>")),
        EntityKind::Team => None,
    }
}

/// Verify that `url` matches the declared shape for `kind`.
pub fn require_shape(url: &str, kind: EntityKind) -> Result<()> {
    let Some((regex, expected)) = shape_for(kind) else {
        return Err(Error::Validation(format!("no declared URL shape for entity kind {kind}")));
    };

    if regex.is_match(url) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid {kind} URL format, expected {expected}, got: {url}"
        )))
    }
}

/// Extract the integer value of query parameter `param` from `url`.
pub fn id_param(url: &str, param: &str) -> Result<u32> {
    let regex = Regex::new(&format!(r"{}=(\d+)", regex::escape(param))).unwrap_or_else(|_| unreachable!());

    regex
        .captures(url)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .ok_or_else(|| Error::Validation(format!("could not extract {param} from URL: {url}")))
}

/// Extract the league id from a league series URL.
pub fn league_id_from(url: &str) -> Result<LeagueID> {
    id_param(url, "league_id")
}

/// Extract the series id from a series seasons URL.
pub fn series_id_from(url: &str) -> Result<SeriesID> {
    id_param(url, "series_id")
}

/// Extract the season id from a season schedule URL.
pub fn season_id_from(url: &str) -> Result<SeasonID> {
    id_param(url, "season_id")
}

/// Extract the schedule id from a race detail URL.
pub fn schedule_id_from(url: &str) -> Result<ScheduleID> {
    id_param(url, "schedule_id")
}

/// Extract the driver id from a driver profile URL.
pub fn driver_id_from(url: &str) -> Result<DriverID> {
    id_param(url, "driver_id")
}

/// Canonical URL of a league's series page.
pub fn league_url(id: LeagueID) -> String {
    format!("{SITE_BASE_URL}/league_series.php?league_id={id}")
}

/// Canonical URL of a series' seasons page.
pub fn series_url(id: SeriesID) -> String {
    format!("{SITE_BASE_URL}/series_seasons.php?series_id={id}")
}

/// Canonical URL of a season's schedule page.
pub fn season_url(id: SeasonID) -> String {
    format!("{SITE_BASE_URL}/season_schedule.php?season_id={id}")
}

/// Canonical URL of a race's detail page.
pub fn race_url(id: ScheduleID) -> String {
    format!("{SITE_BASE_URL}/season_race.php?schedule_id={id}")
}

/// Canonical URL of a driver's profile page.
pub fn driver_url(id: DriverID) -> String {
    format!("{SITE_BASE_URL}/driver_stats.php?driver_id={id}")
}

/// Canonical URL of a league's teams page.
pub fn teams_url(id: LeagueID) -> String {
    format!("{SITE_BASE_URL}/teams.php?league_id={id}")
}

/// Resolve a possibly relative `href` against the site base.
pub fn absolute(href: &str) -> String {
    if let Ok(parsed) = url::Url::parse(href) {
        return parsed.into();
    }

    url::Url::parse(SITE_BASE_URL)
        .and_then(|base| base.join(href))
        .map_or_else(
            |_| format!("{SITE_BASE_URL}/{}", href.trim_start_matches('/')),
            String::from,
        )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn shapes_accept_their_own_urls() {
        require_shape(&league_url(1558), EntityKind::League).unwrap();
        require_shape(&series_url(3714), EntityKind::Series).unwrap();
        require_shape(&season_url(17424), EntityKind::Season).unwrap();
        require_shape(&race_url(324462), EntityKind::Race).unwrap();
        require_shape(&driver_url(55), EntityKind::Driver).unwrap();
    }

    #[test]
    fn shapes_reject_foreign_urls() {
        assert!(matches!(
            require_shape(&series_url(3714), EntityKind::League),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            require_shape("https://example.com/other.php?x=1", EntityKind::Race),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn id_extraction_round_trips() {
        assert_eq!(league_id_from(&league_url(1558)).unwrap(), 1558);
        assert_eq!(series_id_from(&series_url(3714)).unwrap(), 3714);
        assert_eq!(season_id_from(&season_url(17424)).unwrap(), 17424);
        assert_eq!(schedule_id_from(&race_url(324462)).unwrap(), 324462);
        assert_eq!(driver_id_from(&driver_url(98765)).unwrap(), 98765);
    }

    #[test]
    fn missing_id_is_a_validation_error() {
        assert!(matches!(
            league_id_from("https://www.simracerhub.com/league_series.php"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn absolute_resolves_relative_hrefs() {
        assert_eq!(
            absolute("season_race.php?schedule_id=1"),
            "https://www.simracerhub.com/season_race.php?schedule_id=1"
        );
        assert_eq!(absolute("/teams.php?league_id=2"), "https://www.simracerhub.com/teams.php?league_id=2");
        assert_eq!(absolute("https://elsewhere.test/x"), "https://elsewhere.test/x");
    }
}
