//! The [`FetchGate`]: the single coordinated choke point through which every outbound request in
//! a run passes, in either static (plain HTTP GET) or rendered (headless browser) mode.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use scraper::Html;

use crate::{
    error::{Error, Result},
    fetch::limiter::RateLimiter,
};

/// Retry behavior for failed fetch attempts, expressed as one small policy value.
///
/// A transient failure (transport error, timeout, non-2xx status, browser hiccup) is retried up
/// to [`max_retries`](Self::max_retries) times. Before retry `k` (1-based) the gate sleeps
/// `backoff_base^k * backoff_base` seconds, so the default base of `2.0` yields 4 s, 8 s, 16 s.
/// The shared rate-limit gap is enforced in addition to, not instead of, this back-off.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Exponential back-off base factor, in seconds.
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2.0,
        }
    }
}

impl RetryPolicy {
    /// The sleep inserted before the `retry`-th retry (1-based).
    pub fn backoff_delay(&self, retry: usize) -> Duration {
        Duration::from_secs_f64(self.backoff_base.powi(i32::try_from(retry).unwrap_or(i32::MAX)) * self.backoff_base)
    }
}

/// Options configuring a [`FetchGate`]: identification, pacing, patience.
#[derive(Clone, Debug)]
pub struct FetchConfigs {
    /// The User-Agent header sent with every request.
    pub user_agent: String,
    /// Upper bound for any single network call.
    pub timeout: Duration,
    /// `[min, max]` range the rate-limit gap is drawn from. See [`RateLimiter`].
    pub delay_range: (Duration, Duration),
    /// Retry and back-off behavior for failed attempts.
    pub retry: RetryPolicy,
    /// How long a rendered fetch waits for a `table` element to appear after navigation. The
    /// table is a cheap readiness probe for dynamic content; its absence is non-fatal.
    pub table_wait: Duration,
}

impl Default for FetchConfigs {
    /// Defaults: a 2.0–4.0 s shared gap, 30 s network timeout, 5 s table probe, three retries
    /// with base-2 exponential back-off.
    fn default() -> Self {
        Self {
            user_agent: "LeagueScraper/0.1 (polite archival crawler)".to_string(),
            timeout: Duration::from_secs(30),
            delay_range: (Duration::from_secs_f64(2.0), Duration::from_secs_f64(4.0)),
            retry: RetryPolicy::default(),
            table_wait: Duration::from_secs(5),
        }
    }
}

/// The lazily created shared browser: one Chromium process, one dedicated runtime driving its
/// CDP connection, reused for every rendered fetch until [`FetchGate::close`].
struct BrowserHandle {
    runtime: tokio::runtime::Runtime,
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHandle").finish_non_exhaustive()
    }
}

impl BrowserHandle {
    fn launch() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| Error::Validation(format!("browser configuration: {e}")))?;

        let (browser, mut handler) = runtime.block_on(Browser::launch(config))?;

        // The handler stream must be polled for the CDP connection to make progress.
        let handler_task = runtime.spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            runtime,
            browser,
            handler: handler_task,
        })
    }

    /// Navigate a fresh tab to `url`, wait for the load to settle and (best-effort) for a
    /// `table` element, capture the final HTML, and close the tab. The browser stays up.
    fn render(&self, url: &str, table_wait: Duration) -> Result<String> {
        self.runtime.block_on(async {
            let page = self.browser.new_page(url).await?;
            page.wait_for_navigation().await?;

            let deadline = Instant::now() + table_wait;
            while page.find_element("table").await.is_err() {
                if Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }

            let html = page.content().await?;
            page.close().await?;
            Ok(html)
        })
    }
}

/// One coordinated choke point for all outbound requests across all extractors in a run.
///
/// The gate owns the shared [`RateLimiter`], the HTTP agent, and the single headless-browser
/// handle. Extractors never talk to the network directly; the orchestrator creates one gate and
/// every extractor borrows it, which is what makes the rate-limit gap hold across the whole run
/// rather than per extractor.
#[derive(Debug)]
pub struct FetchGate {
    configs: FetchConfigs,
    agent: ureq::Agent,
    limiter: RateLimiter,
    browser: Mutex<Option<BrowserHandle>>,
}

impl Default for FetchGate {
    /// Creates a new [`FetchGate`] with default settings via [`FetchConfigs::default`].
    fn default() -> Self {
        Self::new(FetchConfigs::default())
    }
}

impl FetchGate {
    /// Creates a new [`FetchGate`] with the given [`FetchConfigs`].
    pub fn new(configs: FetchConfigs) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(configs.timeout))
            .user_agent(configs.user_agent.as_str())
            .build()
            .into();

        let (min, max) = configs.delay_range;
        let limiter = RateLimiter::new(min, max);

        Self {
            configs,
            agent,
            limiter,
            browser: Mutex::new(None),
        }
    }

    /// The gate's shared rate limiter.
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Block until the shared gap since the last gate-issued request has elapsed. Both fetch
    /// modes call this internally before every attempt; it is public so out-of-band callers
    /// (e.g. a probe request) can participate in the same pacing.
    pub fn rate_limit(&self) {
        self.limiter.wait_until_ready();
    }

    /// Fetch a page with a single rate-limited HTTP GET and parse it into a DOM.
    ///
    /// Sends the configured User-Agent plus the non-negotiable `Accept` and `Connection`
    /// headers. Transient failures are retried per the gate's [`RetryPolicy`]; the final error
    /// surfaces to the caller.
    pub fn fetch_static(&self, url: &str) -> Result<Html> {
        retry_transport(
            || {
                let body = self
                    .agent
                    .get(url)
                    .header("Accept", "text/html,application/xhtml+xml")
                    .header("Connection", "keep-alive")
                    .call()?
                    .into_body()
                    .read_to_string()?;

                Ok(Html::parse_document(&body))
            },
            &self.limiter,
            &self.configs.retry,
        )
    }

    /// Fetch a page through the shared headless browser so dynamic DOM mutations have executed
    /// before the HTML is captured.
    ///
    /// The browser is launched lazily on the first rendered fetch and reused afterwards. Each
    /// request opens a tab, navigates, waits for the load to settle, additionally waits up to
    /// [`FetchConfigs::table_wait`] for a `table` element (non-fatal if it never appears),
    /// captures the final HTML, and closes the tab.
    pub fn fetch_rendered(&self, url: &str) -> Result<Html> {
        retry_transport(
            || {
                let mut guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
                if guard.is_none() {
                    log::info!("launching shared headless browser");
                    *guard = Some(BrowserHandle::launch()?);
                }
                let handle = guard.as_ref().unwrap_or_else(|| unreachable!());

                let html = handle.render(url, self.configs.table_wait)?;
                Ok(Html::parse_document(&html))
            },
            &self.limiter,
            &self.configs.retry,
        )
    }

    /// Close the shared browser, if one was launched.
    ///
    /// With `interrupted = false` the browser is closed gracefully and its process reaped. With
    /// `interrupted = true` nothing blocks: handles are dropped, the runtime shuts down in the
    /// background, and the process exit cleans up the browser.
    pub fn close(&self, interrupted: bool) {
        let handle = {
            let mut guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };

        let Some(BrowserHandle {
            runtime,
            mut browser,
            handler,
        }) = handle
        else {
            return;
        };

        if interrupted {
            log::debug!("skipping graceful browser shutdown due to interrupt");
            handler.abort();
            runtime.shutdown_background();
            return;
        }

        log::info!("closing shared headless browser");
        runtime.block_on(async {
            if let Err(e) = browser.close().await {
                log::warn!("browser close failed: {e}");
            }
            if let Err(e) = browser.wait().await {
                log::warn!("browser wait failed: {e}");
            }
        });
        handler.abort();
    }
}

/// Call the provided function, retrying transient transport errors, forwarding anything else.
///
/// The function is unconditionally called at least once, and the `limiter` is waited on before
/// every attempt, including the first. Between attempts the policy's exponential back-off sleep
/// is inserted. If all attempts fail with HTTP errors, an [`Error::HttpRetries`] is returned
/// holding the retry count and the last [`ureq::Error`]; a final browser error is returned
/// as-is. Non-transport errors are never retried.
pub(crate) fn retry_transport<T>(
    f: impl Fn() -> Result<T>,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
) -> Result<T> {
    let rate_limited_call = || {
        limiter.wait_until_ready();
        f()
    };

    let mut result = rate_limited_call();

    for retry in 1..=policy.max_retries {
        match result {
            Err(ref e) if e.is_transport() => {
                let delay = policy.backoff_delay(retry);
                log::debug!("transient fetch failure, retry {retry} in {delay:?}");
                std::thread::sleep(delay);
                result = rate_limited_call();
            }
            _ => return result,
        }
    }

    match result {
        Err(Error::Http(ureq_err)) => Err(Error::HttpRetries((policy.max_retries, ureq_err))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use crate::tests::asserts::*;

    use super::*;

    // Helper to create a closure that counts how many times it has been called. The counter is
    // reset to zero whenever this function is called to make a new closure.
    fn make_counter_f<T>(count: &RefCell<u32>, f: impl Fn() -> Result<T>) -> impl Fn() -> Result<T> {
        *count.borrow_mut() = 0;

        move || {
            *count.borrow_mut() += 1;
            f()
        }
    }

    fn instant_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: 0.0,
        }
    }

    fn unlimited() -> RateLimiter {
        RateLimiter::fixed(Duration::ZERO)
    }

    #[test]
    fn backoff_schedule_is_exponential() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(16));
    }

    #[test]
    fn retry_passes_through_success() {
        let count = RefCell::<u32>::new(0);
        let limiter = unlimited();

        let result = retry_transport(make_counter_f(&count, || Ok(42)), &limiter, &instant_policy(3));
        assert_eq!(result.unwrap(), 42);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn retry_does_not_retry_non_transport_errors() {
        let count = RefCell::<u32>::new(0);
        let limiter = unlimited();

        let result: Result<u32> = retry_transport(
            make_counter_f(&count, || Err(Error::Validation("bad url".into()))),
            &limiter,
            &instant_policy(3),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn retry_recovers_after_transient_failures() {
        let count = RefCell::<u32>::new(0);
        let limiter = unlimited();

        let result = retry_transport(
            make_counter_f(&count, || {
                if *count.borrow() < 3 {
                    Err(Error::Http(ureq::Error::ConnectionFailed))
                } else {
                    Ok(7)
                }
            }),
            &limiter,
            &instant_policy(3),
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn retry_exhaustion_reports_http_retries() {
        let count = RefCell::<u32>::new(0);
        let limiter = unlimited();

        let result: Result<u32> = retry_transport(
            make_counter_f(&count, || Err(Error::Http(ureq::Error::ConnectionFailed))),
            &limiter,
            &instant_policy(2),
        );
        assert!(matches!(result, Err(Error::HttpRetries((2, _)))));
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn retry_waits_on_the_shared_limiter_each_attempt() {
        let count = RefCell::<u32>::new(0);
        let limiter = RateLimiter::fixed(Duration::from_millis(30));
        limiter.wait_until_ready(); // clear the immediate first slot

        let start = Instant::now();
        let result: Result<u32> = retry_transport(
            make_counter_f(&count, || Err(Error::Http(ureq::Error::ConnectionFailed))),
            &limiter,
            &instant_policy(2),
        );
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(Error::HttpRetries((2, _)))));
        assert_eq!(*count.borrow(), 3);
        assert_ge!(elapsed, Duration::from_millis(80));
    }

    #[test]
    fn default_configs_are_polite() {
        let configs = FetchConfigs::default();

        assert_ge!(configs.delay_range.0, Duration::from_secs(2));
        assert_ge!(configs.delay_range.1, configs.delay_range.0);
        assert_eq!(configs.timeout, Duration::from_secs(30));
        assert_eq!(configs.retry.max_retries, 3);
    }

    #[test]
    #[ignore = "requires network access"]
    fn fetch_static_live() {
        let gate = FetchGate::default();
        let doc = gate.fetch_static("https://www.simracerhub.com/scoring/league_series.php?league_id=1558");
        assert_true!(doc.is_ok());
    }

    #[test]
    #[ignore = "requires a local Chromium install"]
    fn fetch_rendered_live() {
        let gate = FetchGate::default();
        let doc = gate.fetch_rendered("https://www.simracerhub.com/scoring/season_race.php?schedule_id=324462");
        assert_true!(doc.is_ok());
        gate.close(false);
    }
}
