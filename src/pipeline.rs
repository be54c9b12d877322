use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::arbitrage_engine::find_arbitrage;
use crate::normalization::build_quotes;
use crate::odds_fetcher::fetch_match_odds;
use crate::renderer::DocumentRenderer;
use crate::shared_types::{FetchError, Match, MatchOutcome, MatchReport, RawOddsTable};

/// Per-match odds retrieval, abstracted so the pipeline runs against a
/// scripted source in tests and a browser session in production.
#[async_trait]
pub trait OddsSource: Send {
    async fn quotes_for(&mut self, m: &Match) -> Result<RawOddsTable, FetchError>;

    /// Releases whatever the source holds (e.g. a browser session).
    async fn shutdown(&mut self) {}
}

pub struct RendererOddsSource<R: DocumentRenderer> {
    renderer: R,
}

impl<R: DocumentRenderer> RendererOddsSource<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl<R: DocumentRenderer> OddsSource for RendererOddsSource<R> {
    async fn quotes_for(&mut self, m: &Match) -> Result<RawOddsTable, FetchError> {
        fetch_match_odds(&mut self.renderer, &m.page_url).await
    }

    async fn shutdown(&mut self) {
        if let Err(reason) = self.renderer.close().await {
            warn!(%reason, "failed to close renderer session");
        }
    }
}

/// Runs one match through fetch, normalization and detection.
/// Every failure mode lands in the report; nothing propagates.
pub async fn process_match<S: OddsSource + ?Sized>(
    source: &mut S,
    m: &Match,
    total_stake: Decimal,
) -> MatchReport {
    let outcome = match source.quotes_for(m).await {
        Ok(table) => {
            let quotes = build_quotes(&table, m);
            if quotes.is_empty() {
                MatchOutcome::NoData {
                    reason: "no valid odds rows on the page".to_string(),
                }
            } else {
                match find_arbitrage(m, &quotes, total_stake) {
                    Some(opportunity) => MatchOutcome::Opportunity(opportunity),
                    None => MatchOutcome::NoArbitrage {
                        providers: quotes.len(),
                    },
                }
            }
        }
        Err(reason) => {
            warn!(match_info = %m, %reason, "odds fetch failed");
            MatchOutcome::NoData {
                reason: reason.to_string(),
            }
        }
    };

    MatchReport {
        match_info: m.clone(),
        outcome,
    }
}

/// Processes matches one at a time against a single source, in discovery
/// order. Mirrors the one-browser-session reference behavior.
pub async fn run_sequential<S: OddsSource>(
    source: &mut S,
    matches: &[Match],
    total_stake: Decimal,
) -> Vec<MatchReport> {
    let mut reports = Vec::with_capacity(matches.len());
    for m in matches {
        reports.push(process_match(source, m, total_stake).await);
    }
    source.shutdown().await;
    reports
}

/// Processes matches across a fixed set of workers, one source per worker.
///
/// Workers pull from a shared queue, so a slow page only stalls its own
/// worker. Reports are reassembled into discovery order before returning;
/// a run with zero sources returns no reports.
pub async fn run_concurrent<S: OddsSource + 'static>(
    sources: Vec<S>,
    matches: Vec<Match>,
    total_stake: Decimal,
) -> Vec<MatchReport> {
    if sources.is_empty() {
        warn!("no odds sources supplied, nothing scanned");
        return Vec::new();
    }

    let total = matches.len();
    let queue: Arc<Mutex<VecDeque<(usize, Match)>>> =
        Arc::new(Mutex::new(matches.into_iter().enumerate().collect()));
    let (tx, mut rx) = mpsc::channel::<(usize, MatchReport)>(total.max(1));

    let mut workers = Vec::with_capacity(sources.len());
    for (worker_id, mut source) in sources.into_iter().enumerate() {
        let queue = queue.clone();
        let tx = tx.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let job = queue.lock().await.pop_front();
                let Some((index, m)) = job else { break };
                let report = process_match(&mut source, &m, total_stake).await;
                if tx.send((index, report)).await.is_err() {
                    break;
                }
            }
            source.shutdown().await;
            info!(worker_id, "worker drained the queue");
        }));
    }
    drop(tx);

    let mut slots: Vec<Option<MatchReport>> = (0..total).map(|_| None).collect();
    while let Some((index, report)) = rx.recv().await {
        slots[index] = Some(report);
    }
    join_all(workers).await;

    slots.into_iter().flatten().collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub opportunities: usize,
    pub no_arbitrage: usize,
    pub no_data: usize,
}

/// Collapses a run into the caller-facing distinction between "nothing
/// found" and "nothing readable".
pub fn summarize(reports: &[MatchReport]) -> RunSummary {
    let mut summary = RunSummary {
        scanned: reports.len(),
        ..RunSummary::default()
    };
    for report in reports {
        match report.outcome {
            MatchOutcome::Opportunity(_) => summary.opportunities += 1,
            MatchOutcome::NoArbitrage { .. } => summary.no_arbitrage += 1,
            MatchOutcome::NoData { .. } => summary.no_data += 1,
        }
    }
    summary
}
