/*!
`league_scraper` is a polite, resumable crawler that materializes a remote racing-league site's
hierarchical content (league → series → season → race → result/driver) into a local SQLite
store.

It is built to be restartable and respectful: every outbound request flows through one shared
rate-limited [`FetchGate`](fetch::FetchGate), every successful parse is upserted with
merge-not-replace semantics, and freshness bookkeeping lets a re-run skip everything that cannot
have changed — most importantly completed races, which are immutable once their results are in.

# Usage

The crate ships a `league-scraper` binary:

```text
league-scraper scrape league 1558 --depth race --db league_data.db
league-scraper drivers refresh --league 1558
league-scraper export --out ./export
```

Programmatic use goes through the [`Orchestrator`](orchestrator::Orchestrator):

```no_run
use league_scraper::{
    config::CrawlConfigs,
    orchestrator::{Depth, Filters, Orchestrator},
    store::Store,
};

let configs = CrawlConfigs::default();
let store = Store::open(&configs.db_path).unwrap();
let mut orchestrator = Orchestrator::new(store, &configs);

let progress = orchestrator
    .scrape_league(
        "https://www.simracerhub.com/league_series.php?league_id=1558",
        Depth::Race,
        &Filters::default(),
        Some(7),
        false,
    )
    .unwrap();
orchestrator.finish();

println!("scraped {} race(s), skipped {} cached", progress.races_scraped, progress.skipped_cached);
```

The walk is single-threaded and cooperative on purpose: the rate-limit gap between requests is
the system's hottest invariant, and sequencing every fetch through one gate is what keeps it
honest. See [`orchestrator`] for the traversal and cache rules, [`site`] for the page contracts,
and [`store`] for the persistence model.
*/

// These lint levels mirror CI, which runs with `-D warnings`; `warn` keeps local iteration
// quiet while CI stays strict.
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(missing_docs, missing_debug_implementations, clippy::all)]
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod id;
pub mod orchestrator;
pub mod site;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod tests;
