//! The discovery pipeline.
//!
//! [`Collector`] walks every process of a [`ProcessSource`], decodes each
//! socket descriptor, drops what the [`Filter`] rejects and folds the rest
//! into a [`SocketSet`].
//!
//! # Example
//!
//! ```ignore
//! use procsock::{CallerConfig, Collector, Libproc};
//!
//! let collector = Collector::new(Libproc::new()?, &CallerConfig::default());
//!
//! // One process at a time
//! let sockets = collector.collect()?;
//!
//! // Or up to eight processes at a time
//! let sockets = collector.collect_concurrent(8).await?;
//! ```

use crate::decode::decode;
use crate::dedup::SocketSet;
use crate::error::{Error, Result};
use crate::filter::{CallerConfig, Filter};
use crate::layout::SocketLayout;
use crate::record::SocketRecord;
use crate::source::{Pid, ProcessSource, socket_descriptors};
use crate::stats::Summary;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Socket inventory pipeline over a process source.
#[derive(Debug)]
pub struct Collector<S> {
    source: Arc<S>,
    filter: Filter,
    layout: Arc<SocketLayout>,
}

impl<S: ProcessSource> Collector<S> {
    /// Create a collector using the built-in socket layout.
    pub fn new(source: S, config: &CallerConfig) -> Self {
        Self {
            source: Arc::new(source),
            filter: Filter::new(config),
            layout: Arc::new(SocketLayout::darwin()),
        }
    }

    /// Decode metadata buffers with a different layout.
    pub fn with_layout(mut self, layout: SocketLayout) -> Self {
        self.layout = Arc::new(layout);
        self
    }

    /// Get the process source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the resolved filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Get the socket layout.
    pub fn layout(&self) -> &SocketLayout {
        &self.layout
    }

    /// Take a snapshot, one process at a time.
    pub fn collect(&self) -> Result<SocketSet> {
        let mut set = SocketSet::new();
        for pid in self.source.list_process_ids()? {
            if pid == 0 {
                continue;
            }
            set.extend(scan_process(&*self.source, &self.filter, &self.layout, pid));
        }
        tracing::debug!(sockets = set.len(), "snapshot complete");
        Ok(set)
    }

    /// Take a snapshot and count it.
    pub fn summarize(&self) -> Result<Summary> {
        Ok(Summary::from_records(&self.collect()?))
    }
}

impl<S: ProcessSource + Send + Sync + 'static> Collector<S> {
    /// Take a snapshot, scanning up to `workers` processes at a time on the
    /// blocking pool.
    ///
    /// Per-process results are folded in enumeration order, so the set is
    /// the same as the one [`collect`](Self::collect) produces. `workers`
    /// is clamped to at least one and at most one per process.
    pub async fn collect_concurrent(&self, workers: usize) -> Result<SocketSet> {
        let source = Arc::clone(&self.source);
        let pids = tokio::task::spawn_blocking(move || source.list_process_ids())
            .await
            .map_err(|e| Error::Join(e.to_string()))??;

        let workers = workers
            .min(pids.len())
            .clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(workers));
        let mut scans = Vec::with_capacity(pids.len());
        for pid in pids.into_iter().filter(|&pid| pid != 0) {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| Error::Join(e.to_string()))?;
            let source = Arc::clone(&self.source);
            let layout = Arc::clone(&self.layout);
            let filter = self.filter;

            scans.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                scan_process(&*source, &filter, &layout, pid)
            }));
        }

        let mut set = SocketSet::new();
        for scan in scans {
            let records = scan.await.map_err(|e| Error::Join(e.to_string()))?;
            set.extend(records);
        }
        tracing::debug!(sockets = set.len(), workers, "concurrent snapshot complete");
        Ok(set)
    }
}

/// Decode and filter every socket descriptor of one process.
///
/// The process name is looked up at most once, and only if a record
/// survives the filter.
fn scan_process<S: ProcessSource + ?Sized>(
    source: &S,
    filter: &Filter,
    layout: &SocketLayout,
    pid: Pid,
) -> Vec<SocketRecord> {
    let fds = socket_descriptors(source, pid);
    if fds.is_empty() {
        return Vec::new();
    }

    let mut records = Vec::new();
    for fd in fds {
        let Some(buf) = source.socket_metadata(pid, fd) else {
            tracing::trace!(pid, fd, "descriptor gone");
            continue;
        };
        let record = match decode(&buf, layout, filter.style()) {
            Ok(record) => record,
            Err(e) => {
                tracing::trace!(pid, fd, error = %e, "skipping descriptor");
                continue;
            }
        };
        if filter.include(&record) {
            records.push(record.with_owner(pid, fd));
        }
    }

    if filter.wants_processes() && !records.is_empty() {
        let name = source.process_name(pid);
        records = records
            .into_iter()
            .map(|r| r.with_process_name(name.clone()))
            .collect();
    }
    records
}
