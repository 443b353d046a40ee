//! Incremental scroll-and-collect loop over a virtualized table.
//!
//! Each iteration scrolls the container to its end, lets lazy rows settle,
//! waits out a loading placeholder if one shows up, then reads every rendered
//! row. New rows are deduplicated by `ID` and handed to a [`RecordSink`]
//! immediately, so a crash loses at most the row being read.
//!
//! Surface failures never escape [`Collector::collect`]; the loop stops and
//! returns what it has. Only sink (write) failures are returned as errors.
//!
//! End of data is assumed when two consecutive iterations render the same
//! number of rows and no loader was seen. A stalled network without a loader
//! trips this too.

use crate::config::CollectorSettings;
use crate::error::{SurfaceError, WriteError};
use crate::record::{Record, EXPECTED_COLUMNS};
use crate::surface::{LoaderState, RowSnapshot, Surface, TableRow};
use std::collections::HashSet;
use std::fmt;

/// Durable destination for the accumulated records.
pub trait RecordSink {
    /// Persist the full current snapshot, replacing any previous one.
    fn persist(&mut self, records: &[Record]) -> Result<(), WriteError>;
}

/// In-memory sink keeping only the latest snapshot.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub writes: usize,
    pub latest: Vec<Record>,
}

impl RecordSink for MemorySink {
    fn persist(&mut self, records: &[Record]) -> Result<(), WriteError> {
        self.writes += 1;
        self.latest = records.to_vec();
        Ok(())
    }
}

/// Accumulated state for one collection run.
#[derive(Debug, Default)]
pub struct CollectionState {
    seen_ids: HashSet<String>,
    records: Vec<Record>,
    expected_total: u64,
    consecutive_no_progress_rounds: u32,
}

impl CollectionState {
    /// `expected_total == 0` means the total is unknown.
    pub fn new(expected_total: u64) -> Self {
        Self {
            expected_total,
            ..Default::default()
        }
    }

    pub fn expected_total(&self) -> u64 {
        self.expected_total
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    pub fn consecutive_no_progress_rounds(&self) -> u32 {
        self.consecutive_no_progress_rounds
    }

    pub fn target_reached(&self) -> bool {
        self.expected_total > 0 && self.records.len() as u64 >= self.expected_total
    }

    /// Returns `false` and drops the record when its `ID` was already seen.
    fn accept(&mut self, record: Record) -> bool {
        if !self.seen_ids.insert(record.id.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }
}

/// Why a rendered row did not produce a record.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Not fully rendered yet, or not a data row.
    TooFewCells { found: usize },
    /// At least one cell still shows the loading placeholder.
    Placeholder,
    Duplicate { id: String },
    /// The rating element is present but not a number.
    BadRating { text: String },
    /// Reading the row from the surface failed.
    Extraction { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewCells { found } => {
                write!(f, "{} of {} cells rendered", found, EXPECTED_COLUMNS)
            }
            SkipReason::Placeholder => write!(f, "placeholder row"),
            SkipReason::Duplicate { id } => write!(f, "duplicate id {}", id),
            SkipReason::BadRating { text } => write!(f, "unparseable rating '{}'", text),
            SkipReason::Extraction { message } => write!(f, "read failed: {}", message),
        }
    }
}

/// Result of evaluating one rendered row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(Record),
    Skipped(SkipReason),
}

/// Turn a row snapshot into a record, or explain why not.
///
/// Checks run in order: cell count, placeholder text, duplicate `ID`, rating.
pub fn evaluate_row(snapshot: &RowSnapshot, placeholder: &str, state: &CollectionState) -> RowOutcome {
    let cells = &snapshot.cells;
    if cells.len() < EXPECTED_COLUMNS {
        return RowOutcome::Skipped(SkipReason::TooFewCells { found: cells.len() });
    }

    if cells.iter().any(|c| c.trim() == placeholder) {
        return RowOutcome::Skipped(SkipReason::Placeholder);
    }

    let id = cells[0].trim();
    if state.has_seen(id) {
        return RowOutcome::Skipped(SkipReason::Duplicate { id: id.to_string() });
    }

    let rating = match snapshot.rating.as_deref().map(str::trim) {
        None => 0.0,
        Some(text) => match text.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                return RowOutcome::Skipped(SkipReason::BadRating {
                    text: text.to_string(),
                })
            }
        },
    };

    RowOutcome::Accepted(Record::from_cells(cells, rating))
}

/// Interaction during which the surface became unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Scroll,
    QueryRows,
}

/// Why [`Collector::collect`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `expected_total` records were collected.
    TargetReached,
    /// Render count stopped changing with no loader in sight.
    Exhausted,
    /// The surface stopped answering. `closed` is set when the browser or
    /// tab itself went away rather than a probe failing.
    SurfaceLost { phase: SurfacePhase, closed: bool },
    IterationLimit,
}

/// Counts of skipped rows per [`SkipReason`] kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipTally {
    pub too_few_cells: usize,
    pub placeholder: usize,
    pub duplicate: usize,
    pub bad_rating: usize,
    pub extraction: usize,
}

impl SkipTally {
    fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::TooFewCells { .. } => self.too_few_cells += 1,
            SkipReason::Placeholder => self.placeholder += 1,
            SkipReason::Duplicate { .. } => self.duplicate += 1,
            SkipReason::BadRating { .. } => self.bad_rating += 1,
            SkipReason::Extraction { .. } => self.extraction += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.too_few_cells + self.placeholder + self.duplicate + self.bad_rating + self.extraction
    }
}

/// Outcome of one collection run.
#[derive(Debug)]
pub struct CollectionReport {
    pub records: Vec<Record>,
    pub stop_reason: StopReason,
    /// Scroll iterations started.
    pub iterations: u32,
    pub skipped: SkipTally,
}

/// Drives a [`Surface`] until the table is collected.
pub struct Collector {
    settings: CollectorSettings,
    placeholder: String,
}

impl Collector {
    pub fn new(settings: CollectorSettings, placeholder: impl Into<String>) -> Self {
        Self {
            settings,
            placeholder: placeholder.into(),
        }
    }

    /// Collect rows from `surface` into `state`, persisting through `sink`.
    ///
    /// The sink sees the full snapshot after every accepted row and once more
    /// when the loop exits.
    pub async fn collect<S, K>(
        &self,
        surface: &S,
        mut state: CollectionState,
        sink: &mut K,
    ) -> Result<CollectionReport, WriteError>
    where
        S: Surface,
        K: RecordSink + ?Sized,
    {
        let mut skipped = SkipTally::default();
        let mut previous_rendered = 0usize;
        let mut iterations = 0u32;

        tracing::info!(
            expected_total = state.expected_total(),
            max_iterations = self.settings.max_iterations,
            "Starting to collect product data"
        );

        let stop_reason = 'scroll: loop {
            if iterations >= self.settings.max_iterations {
                tracing::warn!(iterations, "Iteration limit reached");
                break StopReason::IterationLimit;
            }
            iterations += 1;

            if let Err(e) = surface.scroll_to_end().await {
                break surface_lost(SurfacePhase::Scroll, &e);
            }

            tokio::time::sleep(self.settings.settle()).await;

            let loader_seen = self.wait_out_loader(surface).await;

            let rows = match surface.rendered_rows().await {
                Ok(rows) => rows,
                Err(e) => break surface_lost(SurfacePhase::QueryRows, &e),
            };

            let mut new_rows = 0usize;
            for row in &rows {
                let outcome = match row.read().await {
                    Ok(snapshot) => evaluate_row(&snapshot, &self.placeholder, &state),
                    Err(e) => RowOutcome::Skipped(SkipReason::Extraction {
                        message: e.to_string(),
                    }),
                };

                match outcome {
                    RowOutcome::Accepted(record) => {
                        let id = record.id.clone();
                        if !state.accept(record) {
                            continue;
                        }
                        new_rows += 1;
                        sink.persist(state.records())?;
                        tracing::debug!(id = %id, collected = state.records().len(), "Collected row");

                        if state.target_reached() {
                            tracing::info!(total = state.expected_total(), "Reached expected total");
                            break 'scroll StopReason::TargetReached;
                        }
                    }
                    RowOutcome::Skipped(reason) => {
                        if !matches!(reason, SkipReason::Duplicate { .. }) {
                            tracing::debug!(reason = %reason, "Skipped row");
                        }
                        skipped.record(&reason);
                    }
                }
            }

            if new_rows > 0 || loader_seen {
                state.consecutive_no_progress_rounds = 0;
            } else {
                state.consecutive_no_progress_rounds += 1;
            }

            tracing::debug!(
                iteration = iterations,
                rendered = rows.len(),
                new_rows,
                loader_seen,
                collected = state.records().len(),
                "Iteration finished"
            );

            if rows.len() == previous_rendered && !loader_seen {
                tracing::info!("Reached end of table (no more rows)");
                break StopReason::Exhausted;
            }
            previous_rendered = rows.len();
        };

        sink.persist(state.records())?;

        tracing::info!(
            collected = state.records().len(),
            iterations,
            skipped = skipped.total(),
            stop_reason = ?stop_reason,
            "Collection finished"
        );

        Ok(CollectionReport {
            records: state.into_records(),
            stop_reason,
            iterations,
            skipped,
        })
    }

    /// Returns whether a loader row showed up this iteration.
    async fn wait_out_loader<S: Surface>(&self, surface: &S) -> bool {
        let appeared = match surface
            .wait_for_loader(LoaderState::Visible, self.settings.loader_appear())
            .await
        {
            Ok(appeared) => appeared,
            Err(e) => {
                log_probe_error(&e);
                false
            }
        };

        if appeared {
            tracing::info!("Loader appeared, waiting...");
            match surface
                .wait_for_loader(LoaderState::Detached, self.settings.loader_clear())
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::debug!("Loader still present after timeout"),
                Err(e) => log_probe_error(&e),
            }
        }

        appeared
    }
}

fn surface_lost(phase: SurfacePhase, err: &SurfaceError) -> StopReason {
    let closed = err.is_lost();
    if closed {
        tracing::info!(?phase, error = %err, "Browser went away, stopping collection");
    } else {
        tracing::warn!(?phase, error = %err, "Table surface failed, stopping collection");
    }
    StopReason::SurfaceLost { phase, closed }
}

fn log_probe_error(err: &SurfaceError) {
    tracing::debug!(error = %err, "Loader probe failed");
}
