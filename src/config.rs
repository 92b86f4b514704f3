//! Run configuration: sensible defaults, optionally overridden by a TOML file and then by CLI
//! flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::Result,
    fetch::{FetchConfigs, RetryPolicy},
    id::LeagueID,
    orchestrator::Depth,
};

/// Options configuring a crawl run. Field-for-field this is what the configuration file accepts;
/// every field has a default so a missing or partial file works.
#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfigs {
    /// League to crawl when the CLI does not name one.
    pub league_id: Option<LeagueID>,
    /// Default traversal depth.
    pub depth: Depth,
    /// Path of the SQLite store.
    pub db_path: PathBuf,
    /// Default log level (`DEBUG` / `INFO` / `WARNING` / `ERROR`).
    pub log_level: String,
    /// User-Agent header for every outbound request.
    pub user_agent: String,
    /// Minimum rate-limit gap, seconds.
    pub min_delay_seconds: f64,
    /// Maximum rate-limit gap, seconds.
    pub max_delay_seconds: f64,
    /// Maximum retries after a failed fetch attempt.
    pub max_retries: usize,
    /// Exponential back-off base factor, seconds.
    pub backoff_base: f64,
    /// Upper bound for any single network call, seconds.
    pub timeout_seconds: u64,
    /// How long rendered fetches wait for the table readiness probe, seconds.
    pub table_wait_seconds: u64,
    /// Days before a cached row expires. `None` caches indefinitely.
    pub cache_max_age_days: Option<u32>,
    /// Whether league and series pages are always refetched for rediscovery (the default) or
    /// allowed to hit the URL cache like the levels below them.
    pub refetch_hub_pages: bool,
    /// Timezone abbreviation the site's schedule times are printed in (EST/EDT/CST/CDT/MST/MDT/
    /// PST/PDT). Unset or unknown means UTC.
    pub schedule_timezone: Option<String>,
}

impl Default for CrawlConfigs {
    fn default() -> Self {
        let fetch = FetchConfigs::default();

        Self {
            league_id: None,
            depth: Depth::Race,
            db_path: PathBuf::from("league_data.db"),
            log_level: "INFO".to_string(),
            user_agent: fetch.user_agent,
            min_delay_seconds: fetch.delay_range.0.as_secs_f64(),
            max_delay_seconds: fetch.delay_range.1.as_secs_f64(),
            max_retries: fetch.retry.max_retries,
            backoff_base: fetch.retry.backoff_base,
            timeout_seconds: fetch.timeout.as_secs(),
            table_wait_seconds: fetch.table_wait.as_secs(),
            cache_max_age_days: Some(7),
            refetch_hub_pages: true,
            schedule_timezone: None,
        }
    }
}

impl CrawlConfigs {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// The fetch-layer slice of this configuration.
    pub fn fetch_configs(&self) -> FetchConfigs {
        FetchConfigs {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            delay_range: (
                Duration::from_secs_f64(self.min_delay_seconds),
                Duration::from_secs_f64(self.max_delay_seconds),
            ),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_base: self.backoff_base,
            },
            table_wait: Duration::from_secs(self.table_wait_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    #[test]
    fn defaults_are_complete_and_polite() {
        let configs = CrawlConfigs::default();

        assert_eq!(configs.depth, Depth::Race);
        assert_eq!(configs.cache_max_age_days, Some(7));
        assert_true!(configs.refetch_hub_pages);
        assert_ge!(configs.min_delay_seconds, 2.0);
        assert_ge!(configs.max_delay_seconds, configs.min_delay_seconds);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let configs: CrawlConfigs = toml::from_str(
            r#"
                league_id = 1558
                depth = "season"
                schedule_timezone = "EST"
            "#,
        )
        .unwrap();

        assert_eq!(configs.league_id, Some(1558));
        assert_eq!(configs.depth, Depth::Season);
        assert_eq!(configs.schedule_timezone.as_deref(), Some("EST"));
        assert_eq!(configs.max_retries, 3);
        assert_eq!(configs.db_path, PathBuf::from("league_data.db"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<CrawlConfigs, _> = toml::from_str("rate_limit = 1.0");
        assert_true!(result.is_err());
    }

    #[test]
    fn fetch_slice_carries_the_tuning() {
        let mut configs = CrawlConfigs::default();
        configs.min_delay_seconds = 1.0;
        configs.max_delay_seconds = 2.0;
        configs.max_retries = 5;

        let fetch = configs.fetch_configs();
        assert_eq!(fetch.delay_range.0, Duration::from_secs(1));
        assert_eq!(fetch.delay_range.1, Duration::from_secs(2));
        assert_eq!(fetch.retry.max_retries, 5);
    }
}
