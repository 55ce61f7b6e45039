//! Incremental daily sync
//!
//! For each tracked instrument the persisted series is loaded, any bars dated
//! after yesterday are dropped, and only the missing days between the latest
//! stored bar and yesterday are requested. New bars are merged, the series is
//! re-sorted and the file rewritten. Series that were never backfilled are
//! skipped.
//!
//! Per instrument the run moves through:
//!
//! ```text
//! no file            -> NotInitialized
//! file -> trimmed    -> empty                -> UpToDate(EmptySeries)
//!                    -> latest >= yesterday  -> UpToDate(AlreadyCurrent)
//!                    -> stale -> fetch       -> UpToDate(FetchFailed | NoNewData | AllDuplicate)
//!                                            -> Updated(n)
//! ```

use chrono::NaiveDate;
use std::fmt;
use tracing::{error, info, warn};

use crate::common::{Cooldown, RequestPacer, RetryPolicy};
use crate::dates::{gap_after, yesterday};
use crate::error::StoreError;
use crate::fetcher::{fetch_with_retry, BarFetcher};
use crate::store::SeriesStore;
use crate::Instrument;

/// Why an instrument finished without new bars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoChange {
    /// The file exists but holds no bars on or before yesterday
    EmptySeries,
    /// The latest bar is already yesterday's
    AlreadyCurrent,
    /// The source returned nothing for the gap
    NoNewData,
    /// Every fetched bar was already stored or outside the gap
    AllDuplicate,
    /// The fetch failed; logged and treated as no new data
    FetchFailed,
}

/// What a sync did for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No series file yet; a backfill has to run first
    NotInitialized,
    UpToDate(NoChange),
    /// This many new bars were merged and persisted
    Updated(usize),
}

impl SyncOutcome {
    pub fn new_records(&self) -> usize {
        match self {
            SyncOutcome::Updated(n) => *n,
            SyncOutcome::NotInitialized | SyncOutcome::UpToDate(_) => 0,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NotInitialized => write!(f, "not initialized, run backfill first"),
            SyncOutcome::UpToDate(NoChange::EmptySeries) => write!(f, "no valid data in series"),
            SyncOutcome::UpToDate(NoChange::AlreadyCurrent) => write!(f, "already up to date"),
            SyncOutcome::UpToDate(NoChange::NoNewData) => write!(f, "no new data"),
            SyncOutcome::UpToDate(NoChange::AllDuplicate) => write!(f, "no new unique data"),
            SyncOutcome::UpToDate(NoChange::FetchFailed) => write!(f, "fetch failed"),
            SyncOutcome::Updated(n) => write!(f, "{} new records", n),
        }
    }
}

#[derive(Debug)]
pub struct InstrumentSync {
    pub instrument: Instrument,
    pub result: Result<SyncOutcome, StoreError>,
}

impl InstrumentSync {
    pub fn new_records(&self) -> usize {
        self.result.as_ref().map_or(0, SyncOutcome::new_records)
    }
}

/// Result of a sync run, one entry per instrument in processing order
#[derive(Debug)]
pub struct SyncReport {
    pub yesterday: NaiveDate,
    pub instruments: Vec<InstrumentSync>,
}

impl SyncReport {
    pub fn total_new_records(&self) -> usize {
        self.instruments.iter().map(InstrumentSync::new_records).sum()
    }

    pub fn outcome(&self, ticker: &str) -> Option<&Result<SyncOutcome, StoreError>> {
        self.instruments
            .iter()
            .find(|entry| entry.instrument.ticker == ticker)
            .map(|entry| &entry.result)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "SYNC COMPLETE (through {})", self.yesterday)?;
        writeln!(f, "{}", "=".repeat(60))?;
        for entry in &self.instruments {
            match &entry.result {
                Ok(outcome) => writeln!(f, "  {:<12} {}", entry.instrument.ticker, outcome)?,
                Err(e) => writeln!(f, "  {:<12} store error: {}", entry.instrument.ticker, e)?,
            }
        }
        writeln!(f, "{}", "=".repeat(60))?;
        write!(f, "  Total new records added: {}", self.total_new_records())
    }
}

/// Extends every tracked series up to yesterday
pub struct SyncOrchestrator<F, S> {
    fetcher: F,
    store: S,
    instruments: Vec<Instrument>,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl<F: BarFetcher, S: SeriesStore> SyncOrchestrator<F, S> {
    pub fn new(fetcher: F, store: S, instruments: Vec<Instrument>) -> Self {
        SyncOrchestrator {
            fetcher,
            store,
            instruments,
            pacer: RequestPacer::default(),
            retry: RetryPolicy::default(),
        }
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

    /// Sync every instrument, in order, up to the day before `reference_date`
    pub async fn run(&self, reference_date: NaiveDate) -> SyncReport {
        let yesterday = yesterday(reference_date);
        info!(
            "Syncing {} instruments through {}",
            self.instruments.len(),
            yesterday
        );

        let mut entries = Vec::with_capacity(self.instruments.len());
        let mut pending: Option<Cooldown> = None;

        for instrument in &self.instruments {
            if let Some(cooldown) = pending.take() {
                self.pacer.cool_down(cooldown).await;
            }

            let (result, cooldown) = self.sync_instrument(instrument, yesterday).await;
            pending = cooldown;

            if let Err(e) = &result {
                error!("Failed to sync {}: {}", instrument.ticker, e);
            }
            entries.push(InstrumentSync {
                instrument: instrument.clone(),
                result,
            });
        }

        let report = SyncReport {
            yesterday,
            instruments: entries,
        };
        info!(
            "Finished updating all instruments, total new records added: {}",
            report.total_new_records()
        );
        report
    }

    /// Sync one instrument. The cooldown is present only if a call was made.
    async fn sync_instrument(
        &self,
        instrument: &Instrument,
        yesterday: NaiveDate,
    ) -> (Result<SyncOutcome, StoreError>, Option<Cooldown>) {
        let location = self.store.location(instrument);

        let mut series = match self.store.load(instrument) {
            Ok(Some(series)) => series,
            Ok(None) => {
                warn!(
                    "Series not found for {}. Run the backfill first to create {}",
                    instrument.ticker, location
                );
                return (Ok(SyncOutcome::NotInitialized), None);
            }
            Err(e) => return (Err(e), None),
        };
        info!("Read {} existing bars for {} from {}", series.len(), instrument, location);

        let trimmed = series.trim_after(yesterday);
        if trimmed > 0 {
            warn!(
                "Ignoring {} bars dated after {} in {}",
                trimmed, yesterday, location
            );
        }

        let Some(latest) = series.latest_date() else {
            warn!("No valid data found in {}", location);
            return (Ok(SyncOutcome::UpToDate(NoChange::EmptySeries)), None);
        };
        info!("Latest date in series: {}", latest);

        let Some(gap) = gap_after(latest, yesterday) else {
            info!("{} is already up to date", instrument.ticker);
            return (Ok(SyncOutcome::UpToDate(NoChange::AlreadyCurrent)), None);
        };

        info!("Fetching {} for period: {}", instrument.ticker, gap);
        let fetched = fetch_with_retry(&self.fetcher, instrument, gap, &self.retry).await;
        let cooldown = Some(self.pacer.note_call());

        let bars = match fetched {
            Ok(bars) => bars,
            Err(e) => {
                error!("Fetch failed for {}: {}", instrument.ticker, e);
                return (Ok(SyncOutcome::UpToDate(NoChange::FetchFailed)), cooldown);
            }
        };

        if bars.is_empty() {
            info!("No new data found for {} in {}", instrument.ticker, gap);
            return (Ok(SyncOutcome::UpToDate(NoChange::NoNewData)), cooldown);
        }

        let added = series.merge_new(bars.into_iter().filter(|bar| gap.contains(bar.date)));
        if added == 0 {
            info!("No new unique data to add for {}", instrument.ticker);
            return (Ok(SyncOutcome::UpToDate(NoChange::AllDuplicate)), cooldown);
        }

        if let Err(e) = self.store.save(instrument, &series) {
            return (Err(e), cooldown);
        }

        info!("Added {} new records for {}", added, instrument.ticker);
        if let Some(last) = series.last() {
            info!(
                "Latest bar: {} close={} volume={}",
                last.date, last.close, last.volume
            );
        }
        (Ok(SyncOutcome::Updated(added)), cooldown)
    }
}
