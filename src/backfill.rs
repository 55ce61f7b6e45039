//! Full historical backfill
//!
//! Fetches a fixed lookback window ending yesterday for every tracked
//! instrument and overwrites its series file. This is a destructive rebuild,
//! not a merge.

use chrono::NaiveDate;
use std::fmt;
use tracing::{error, info, warn};

use crate::common::{Cooldown, RequestPacer, RetryPolicy};
use crate::dates::{backfill_window, DateRange, BACKFILL_LOOKBACK_DAYS};
use crate::error::StoreError;
use crate::fetcher::{fetch_with_retry, BarFetcher};
use crate::store::SeriesStore;
use crate::{Instrument, Series};

/// What a backfill did for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// Series rewritten with this many bars
    Written(usize),
    /// The source had no bars for the window; any existing file is left alone
    NoData,
    /// The fetch failed; logged and counted as zero bars
    FetchFailed,
}

#[derive(Debug)]
pub struct InstrumentBackfill {
    pub instrument: Instrument,
    pub result: Result<BackfillOutcome, StoreError>,
}

impl InstrumentBackfill {
    pub fn records(&self) -> usize {
        match self.result {
            Ok(BackfillOutcome::Written(n)) => n,
            _ => 0,
        }
    }
}

/// Result of a backfill run, one entry per instrument in processing order
#[derive(Debug)]
pub struct BackfillReport {
    pub window: DateRange,
    pub instruments: Vec<InstrumentBackfill>,
}

impl BackfillReport {
    pub fn total_records(&self) -> usize {
        self.instruments.iter().map(InstrumentBackfill::records).sum()
    }

    pub fn failures(&self) -> usize {
        self.instruments
            .iter()
            .filter(|entry| {
                matches!(entry.result, Err(_) | Ok(BackfillOutcome::FetchFailed))
            })
            .count()
    }
}

impl fmt::Display for BackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "BACKFILL COMPLETE ({})", self.window)?;
        writeln!(f, "{}", "=".repeat(60))?;
        for entry in &self.instruments {
            let status = match &entry.result {
                Ok(BackfillOutcome::Written(n)) => format!("{} days written", n),
                Ok(BackfillOutcome::NoData) => "no data".to_string(),
                Ok(BackfillOutcome::FetchFailed) => "fetch failed".to_string(),
                Err(e) => format!("store error: {}", e),
            };
            writeln!(f, "  {:<12} {}", entry.instrument.ticker, status)?;
        }
        writeln!(f, "{}", "=".repeat(60))?;
        write!(f, "  Total records collected: {}", self.total_records())
    }
}

/// Rebuilds every tracked series from a fresh lookback window
pub struct BackfillOrchestrator<F, S> {
    fetcher: F,
    store: S,
    instruments: Vec<Instrument>,
    lookback_days: u32,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl<F: BarFetcher, S: SeriesStore> BackfillOrchestrator<F, S> {
    pub fn new(fetcher: F, store: S, instruments: Vec<Instrument>) -> Self {
        BackfillOrchestrator {
            fetcher,
            store,
            instruments,
            lookback_days: BACKFILL_LOOKBACK_DAYS,
            pacer: RequestPacer::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_pacer(mut self, pacer: RequestPacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Backfill every instrument, in order, for the window ending the day
    /// before `reference_date`.
    ///
    /// Every fetch counts against the rate limit, including empty and failed
    /// ones, so the pacer waits between every pair of instruments. Nothing
    /// waits after the last one.
    pub async fn run(&self, reference_date: NaiveDate) -> BackfillReport {
        let window = backfill_window(reference_date, self.lookback_days);
        info!(
            "Backfilling {} instruments for {}",
            self.instruments.len(),
            window
        );

        let mut entries = Vec::with_capacity(self.instruments.len());
        let mut pending: Option<Cooldown> = None;

        for instrument in &self.instruments {
            if let Some(cooldown) = pending.take() {
                self.pacer.cool_down(cooldown).await;
            }

            let (result, cooldown) = self.backfill_instrument(instrument, window).await;
            pending = Some(cooldown);

            if let Err(e) = &result {
                error!("Failed to store {}: {}", instrument.ticker, e);
            }
            entries.push(InstrumentBackfill {
                instrument: instrument.clone(),
                result,
            });
        }

        let report = BackfillReport {
            window,
            instruments: entries,
        };
        info!(
            "Finished collecting data for all instruments, total records: {}",
            report.total_records()
        );
        report
    }

    async fn backfill_instrument(
        &self,
        instrument: &Instrument,
        window: DateRange,
    ) -> (Result<BackfillOutcome, StoreError>, Cooldown) {
        info!("Collecting data for {} from {}", instrument, window);

        let fetched = fetch_with_retry(&self.fetcher, instrument, window, &self.retry).await;
        let cooldown = self.pacer.note_call();

        let bars = match fetched {
            Ok(bars) if bars.is_empty() => {
                warn!("No data returned for {}, keeping existing series", instrument.ticker);
                return (Ok(BackfillOutcome::NoData), cooldown);
            }
            Ok(bars) => bars,
            Err(e) => {
                error!("Fetch failed for {}: {}", instrument.ticker, e);
                return (Ok(BackfillOutcome::FetchFailed), cooldown);
            }
        };

        let mut series = Series::from_bars(bars);
        let dropped = series.trim_after(window.end());
        if dropped > 0 {
            warn!(
                "Dropped {} bars after {} for {}",
                dropped,
                window.end(),
                instrument.ticker
            );
        }

        let result = self.store.save(instrument, &series).map(|()| {
            info!(
                "Collected {} days for {}, saved to {}",
                series.len(),
                instrument.ticker,
                self.store.location(instrument)
            );
            if let Some(last) = series.last() {
                info!(
                    "Latest bar: {} close={} volume={}",
                    last.date, last.close, last.volume
                );
            }
            BackfillOutcome::Written(series.len())
        });

        (result, cooldown)
    }
}
