use chrono::{DateTime, Utc};
use futures::FutureExt;
use reqwest::Url;
use scraper::Html;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

pub mod board;
pub mod config;
pub mod detector;
pub mod fetch;
pub mod notify;
pub mod schedule;

mod error;
mod utils;

pub use error::WatcherError;

use board::{BoardExtractor, ImageResolver};
use detector::{decide, AnnounceReason, ObservedMemory};
use notify::{Announcement, Mentions};
use schedule::SchedulerState;

#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, WatcherError>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, announcement: &Announcement) -> Result<(), WatcherError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Announced(AnnounceReason),
    Unchanged,
    FetchFailed,
}

/// Owns everything one check cycle touches, including the only copy of `ObservedMemory`.
pub struct Watcher<S, N> {
    source: S,
    notifier: N,
    board_url: Url,
    extractor: BoardExtractor,
    images: ImageResolver,
    mentions: Mentions,
    memory: ObservedMemory,
}

impl<S, N> Watcher<S, N>
where
    S: PageSource,
    N: Notifier,
{
    pub fn new(source: S, notifier: N, board_url: Url, mentions: Mentions) -> Self {
        Watcher {
            source,
            notifier,
            extractor: BoardExtractor::new(board_url.clone()),
            images: ImageResolver::new(board_url.clone()),
            board_url,
            mentions,
            memory: ObservedMemory::new(),
        }
    }

    pub fn memory(&self) -> &ObservedMemory {
        &self.memory
    }

    /// One fetch, extract, decide, notify pass. Never fails; problems are logged.
    pub async fn check(&mut self) -> CheckOutcome {
        let html = match self.source.fetch(self.board_url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                // Only the first failure of a streak is worth an error.
                if self.memory.last_fetch_succeeded {
                    error!(error = %e, "Failed to fetch the board page");
                } else {
                    debug!(error = %e, "Board page still unreachable");
                }
                self.memory.last_fetch_succeeded = false;
                return CheckOutcome::FetchFailed;
            }
        };
        if !self.memory.last_fetch_succeeded {
            info!("Board page reachable again");
        }
        self.memory.last_fetch_succeeded = true;

        let mut state = {
            let doc = Html::parse_document(&html);
            self.extractor.extract(&doc)
        };

        let decision = decide(&self.memory, &state);
        self.memory.record(&decision, &state);

        let Some(reason) = decision.reason else {
            info!(
                "No change detected. Occupant: {}, countdown: {}",
                state.occupant,
                state.countdown_text.as_deref().unwrap_or("None")
            );
            return CheckOutcome::Unchanged;
        };
        info!("{}", reason);

        state.image_url = self
            .images
            .resolve(
                &self.source,
                &html,
                &state.occupant,
                state.detail_page_url.as_deref(),
            )
            .await;
        if state.image_url.is_none() {
            warn!("No image URL available for {}", state.occupant);
        }

        let announcement = Announcement::new(
            &reason,
            &state,
            self.board_url.as_str(),
            &self.mentions,
            utils::get_now(),
        );
        if let Err(e) = self.notifier.send(&announcement).await {
            error!(error = %e, "Failed to deliver announcement");
        }

        CheckOutcome::Announced(reason)
    }
}

/// Sleeps until each top of the hour and runs one check per wake-up, forever.
pub async fn run_watcher<S, N>(watcher: Watcher<S, N>)
where
    S: PageSource,
    N: Notifier,
{
    run_aligned(watcher, utils::get_now).await
}

async fn run_aligned<S, N, C>(mut watcher: Watcher<S, N>, clock: C)
where
    S: PageSource,
    N: Notifier,
    C: Fn() -> DateTime<Utc>,
{
    let mut state = SchedulerState::WaitingForAlignment;
    let mut last_tick: Option<DateTime<Utc>> = None;

    loop {
        // A sleep may end just before the wall clock reaches the tick.
        let now = match last_tick {
            Some(tick) => clock().max(tick),
            None => clock(),
        };
        let tick = schedule::next_tick(now);
        let delay = schedule::delay_until_next_tick(now);
        match state {
            SchedulerState::WaitingForAlignment => info!(
                "Waiting {}s for the first check at {}",
                delay.as_secs(),
                utils::format_timestamp(tick)
            ),
            SchedulerState::Polling => debug!("Next check at {}", utils::format_timestamp(tick)),
        }

        tokio::time::sleep(delay).await;
        state = SchedulerState::Polling;
        last_tick = Some(tick);

        if let Some(grace) = schedule::reset_grace(tick) {
            info!(
                "Daily reset tick, waiting {}s for the board to update",
                grace.as_secs()
            );
            tokio::time::sleep(grace).await;
        }

        info!("Hourly check triggered at {}", utils::format_timestamp(tick));
        match AssertUnwindSafe(watcher.check()).catch_unwind().await {
            Ok(outcome) => debug!("Check finished: {:?}", outcome),
            Err(_) => error!("Check panicked; continuing with the next tick"),
        }
    }
}
