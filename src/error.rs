use crate::id::EntityKind;

/// An error that may occur while crawling a league site or persisting its data.
///
/// Transport problems surface as [`Error::Http`] (single attempt) or [`Error::HttpRetries`]
/// (retries exhausted), rendered-mode browser failures as [`Error::Browser`], and problems
/// decoding embedded page payloads as [`Error::Parse`]. The crawl-specific failure classes are
/// [`Error::Validation`] (bad input or missing required data), [`Error::SchemaDrift`] (a page no
/// longer matches the declared site contract), [`Error::Integrity`] (a write referencing a row
/// that does not exist), and [`Error::Interrupted`] (the operator cancelled the run).
#[derive(Debug)]
pub enum Error {
    /// Underlying HTTP error, passing through [`ureq::Error`] from a failed GET attempt.
    Http(ureq::Error),

    /// All configured retries resulted in transport errors; holds the number of retries
    /// attempted and the last encountered [`ureq::Error`].
    HttpRetries((usize, ureq::Error)),

    /// Error from the shared headless browser, passing through
    /// [`chromiumoxide::error::CdpError`].
    Browser(chromiumoxide::error::CdpError),

    /// Forwarded [`std::io::Error`] from underlying reads and writes.
    Io(std::io::Error),

    /// Forwarded [`rusqlite::Error`] from the store's SQLite connection.
    Sql(rusqlite::Error),

    /// Error parsing an embedded JSON payload, passing through [`serde_json::Error`].
    Parse(serde_json::Error),

    /// Error reading the optional configuration file, passing through [`toml::de::Error`].
    Config(toml::de::Error),

    /// Error writing a columnar export file, passing through [`csv::Error`].
    Export(csv::Error),

    /// A required field was missing or empty, an enum value was outside its domain, or a URL did
    /// not match the expected shape for its entity kind.
    Validation(String),

    /// A fetched page no longer matches the declared structural contract for its entity kind.
    /// The orchestrator records these as schema alerts and continues with siblings.
    SchemaDrift {
        /// The entity kind whose page contract was violated.
        entity: EntityKind,
        /// Human-readable description of the missing marker, field, or column.
        detail: String,
    },

    /// A write referenced a parent or foreign row that does not exist, or violated a uniqueness
    /// constraint. Indicates an orchestration bug rather than a site problem.
    Integrity(String),

    /// The run was cancelled by the operator; resources were shut down without draining.
    Interrupted,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

impl From<ureq::Error> for Error {
    fn from(error: ureq::Error) -> Self {
        Self::Http(error)
    }
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(error: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Sql(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error)
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::Export(error)
    }
}

impl Error {
    /// Returns `true` if this error is transient transport trouble, i.e. a single-attempt
    /// [`Error::Http`] or a rendered-mode [`Error::Browser`] failure. The fetch layer retries
    /// exactly these.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Browser(_))
    }
}

/// Convenience type alias for [`Result<T, league_scraper::error::Error>`].
pub type Result<T> = std::result::Result<T, Error>;
