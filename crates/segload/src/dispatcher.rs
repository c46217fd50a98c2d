//! Bounded-concurrency driver.
//!
//! Each of the N worker slots owns one sink. Free slots wait in a bounded
//! channel; the dispatcher takes inputs strictly in order, hands each to the
//! next free slot and spawns it on a [`JoinSet`]. A finished task returns its
//! slot to the channel, so at most N files are ever in flight. The run ends
//! with a drain barrier over the `JoinSet`.

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::Result;
use crate::pipeline::FileReport;

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Inputs that could not be read from the source, or were never
    /// started because the run was cancelled
    pub skipped: usize,
    pub documents: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, joined: std::result::Result<Result<FileReport>, JoinError>) {
        match joined {
            Ok(Ok(report)) => {
                self.succeeded += 1;
                self.documents += report.submitted;
            }
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "worker task aborted; its slot is lost");
                self.failed += 1;
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub struct Dispatcher<S> {
    slots: Vec<S>,
}

impl<S: Send + 'static> Dispatcher<S> {
    /// One slot per sink.
    pub fn new(slots: Vec<S>) -> Self {
        Self { slots }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Drive `inputs` through `work`, which receives the input index, the
    /// path and the slot's sink, and must hand the sink back with its result.
    /// Returns once every started file has finished.
    pub async fn run<I, F, Fut>(self, inputs: I, cancel: watch::Receiver<bool>, mut work: F) -> RunSummary
    where
        I: IntoIterator<Item = Result<PathBuf>>,
        F: FnMut(usize, PathBuf, S) -> Fut,
        Fut: Future<Output = (S, Result<FileReport>)> + Send + 'static,
    {
        let workers = self.slots.len();
        let mut summary = RunSummary::default();
        if workers == 0 {
            warn!("no worker slots; nothing to do");
            return summary;
        }

        let (free_tx, mut free_rx) = mpsc::channel::<(usize, S)>(workers);
        for slot in self.slots.into_iter().enumerate() {
            // capacity equals the slot count
            let _ = free_tx.try_send(slot);
        }

        let mut tasks = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let path = match input {
                Ok(path) => path,
                Err(e) => {
                    warn!(index, error = %e, "skipping unreadable input entry");
                    summary.skipped += 1;
                    continue;
                }
            };

            let free = loop {
                if let Ok(free) = free_rx.try_recv() {
                    break Some(free);
                }
                match tasks.join_next().await {
                    Some(joined) => summary.record(joined),
                    None => break None,
                }
            };
            let Some((slot, sink)) = free else {
                error!("every worker slot has been lost; stopping dispatch");
                summary.skipped += 1;
                break;
            };

            if *cancel.borrow() {
                info!(index, "cancelled; no further files will be started");
                summary.cancelled = true;
                summary.skipped += 1;
                break;
            }

            summary.started += 1;
            let span = info_span!("file", index, slot, path = %path.display());
            let job = work(index, path, sink);
            let free_tx = free_tx.clone();
            tasks.spawn(
                async move {
                    let (sink, result) = job.await;
                    if let Err(e) = &result {
                        error!(error = %e, "failed to load file");
                    }
                    // never blocks: each slot is in the channel at most once
                    let _ = free_tx.send((slot, sink)).await;
                    result
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            summary.record(joined);
        }

        info!(
            started = summary.started,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            documents = summary.documents,
            cancelled = summary.cancelled,
            "run finished"
        );
        summary
    }
}
