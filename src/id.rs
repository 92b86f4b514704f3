use crate::error::{Error, Result};

/// Uniquely identifies a league by the site's numeric identifier, e.g. `1558`.
pub type LeagueID = u32;

/// Uniquely identifies a series within the site, e.g. `3714`. Series belong to one league.
pub type SeriesID = u32;

/// Uniquely identifies a season within the site, e.g. `17424`. Seasons belong to one series.
pub type SeasonID = u32;

/// Uniquely identifies a race by its schedule entry on the site, e.g. `324462`. This is the
/// race's *external* id; the store additionally assigns a surrogate [`RaceRowID`].
pub type ScheduleID = u32;

/// Uniquely identifies a driver by the site's numeric identifier.
pub type DriverID = u32;

/// Uniquely identifies a team by the site's numeric identifier. Teams belong to one league.
pub type TeamID = u32;

/// Surrogate row id assigned by the store to a race (SQLite `INTEGER PRIMARY KEY`). Race results
/// reference races through this id, not through the external [`ScheduleID`].
pub type RaceRowID = i64;

/// Surrogate row id assigned by the store to a race result.
pub type ResultRowID = i64;

/// The closed set of entity kinds the crawler knows about.
///
/// Every store row, scrape-log entry, schema alert, and page contract is keyed by one of these.
/// Parsing an unknown kind is a [`Error::Validation`], never a silent default.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityKind {
    /// The root of the hierarchy; owns series, teams, and drivers.
    League,
    /// A competition series within a league; owns seasons.
    Series,
    /// A season within a series; owns races.
    Season,
    /// A single scheduled event within a season; owns race results.
    Race,
    /// A driver profile; referenced by race results.
    Driver,
    /// A team roster entry; drivers may reference one.
    Team,
}

impl EntityKind {
    /// All entity kinds, in hierarchy order.
    pub const ALL: [Self; 6] = [
        Self::League,
        Self::Series,
        Self::Season,
        Self::Race,
        Self::Driver,
        Self::Team,
    ];

    /// The lowercase name used in the store's enum columns and in log output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Series => "series",
            Self::Season => "season",
            Self::Race => "race",
            Self::Driver => "driver",
            Self::Team => "team",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown entity kind: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        assert!(matches!(
            "constructor".parse::<EntityKind>(),
            Err(Error::Validation(_))
        ));
    }
}
