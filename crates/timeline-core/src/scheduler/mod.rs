//! Import scheduler (§4.1, §4.2): a FIFO queue with a single active worker
//! and a deferred index/FTS build policy — sort indexes and the full-text
//! index are never built while another import is still queued, only once
//! the import queue drains, and then one tab at a time.

use crate::config::TimelineConfig;
use crate::tab::{TabId, TabRegistry};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Broadcast to anyone watching import/build progress (e.g. a CLI progress
/// bar or a dashboard). Lagging receivers miss events; they should poll
/// [`TabRegistry`] state to resync rather than treat the channel as
/// authoritative.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Queued(TabId),
    ImportStarted(TabId),
    ImportFailed(TabId, String),
    PendingBuildsStarted,
    SortIndexesBuilt(TabId),
    FtsBuilt(TabId),
    AllBuildsComplete,
}

/// Result of running one queued import: success means the tab is ready for
/// its deferred builds, failure carries the reason and the caller is
/// expected to have already torn down the partial tab.
pub enum ImportOutcome {
    Succeeded,
    Failed(String),
}

pub struct Scheduler {
    registry: Arc<TabRegistry>,
    config: TimelineConfig,
    queue: Mutex<VecDeque<TabId>>,
    pending_builds: Mutex<VecDeque<TabId>>,
    draining: AtomicBool,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    pub fn new(registry: Arc<TabRegistry>, config: TimelineConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            registry,
            config,
            queue: Mutex::new(VecDeque::new()),
            pending_builds: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SchedulerEvent) {
        let _ = self.events.send(event);
    }

    /// Enqueues a tab for import. Does not start draining; call
    /// [`Scheduler::drain`] to process the queue (typically from one
    /// long-lived task per process).
    pub fn enqueue_import(&self, tab_id: TabId) {
        self.queue.lock().unwrap().push_back(tab_id);
        self.emit(SchedulerEvent::Queued(tab_id));
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn pop_import(&self) -> Option<TabId> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Drains the import queue, invoking `import_fn` for each tab in FIFO
    /// order, then sequentially builds sort indexes and FTS for every tab
    /// that imported successfully. Only one call to `drain` does real work
    /// at a time; a concurrent call returns immediately (§4.1 "single
    /// active worker").
    pub async fn drain<F, Fut>(&self, mut import_fn: F)
    where
        F: FnMut(TabId) -> Fut,
        Fut: std::future::Future<Output = ImportOutcome>,
    {
        if self.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        while let Some(tab_id) = self.pop_import() {
            if !self.registry.contains(tab_id) {
                continue;
            }
            self.emit(SchedulerEvent::ImportStarted(tab_id));
            if let Ok(tab) = self.registry.get(tab_id) {
                tab.set_building(true);
            }
            match import_fn(tab_id).await {
                ImportOutcome::Succeeded => {
                    self.pending_builds.lock().unwrap().push_back(tab_id);
                }
                ImportOutcome::Failed(reason) => {
                    let _ = self.registry.close(tab_id);
                    self.emit(SchedulerEvent::ImportFailed(tab_id, reason));
                }
            }
        }

        self.run_pending_builds().await;
        self.draining.store(false, Ordering::SeqCst);
    }

    async fn run_pending_builds(&self) {
        if self.pending_builds.lock().unwrap().is_empty() {
            return;
        }
        self.emit(SchedulerEvent::PendingBuildsStarted);

        loop {
            let tab_id = match self.pending_builds.lock().unwrap().pop_front() {
                Some(id) => id,
                None => break,
            };
            let Ok(tab) = self.registry.get(tab_id) else {
                continue;
            };

            let still_present = || {
                let registry = self.registry.clone();
                async move { registry.contains(tab_id) }
            };

            if let Err(err) = tab.store.build_sort_indexes(|| async {
                tokio::task::yield_now().await;
                still_present().await
            }).await {
                tracing::warn!(tab = %tab_id, error = %err, "sort index build failed");
            } else {
                self.emit(SchedulerEvent::SortIndexesBuilt(tab_id));
            }

            if !self.registry.contains(tab_id) {
                continue;
            }

            if let Err(err) = tab.store.build_fts(self.config.fts_chunk_rows, || async {
                tokio::task::yield_now().await;
                still_present().await
            }).await {
                tracing::warn!(tab = %tab_id, error = %err, "fts build failed");
            } else {
                tab.set_fts_ready(true);
                self.emit(SchedulerEvent::FtsBuilt(tab_id));
            }

            tab.set_building(false);
        }

        self.emit(SchedulerEvent::AllBuildsComplete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::Tab;

    #[tokio::test]
    async fn drain_runs_builds_only_after_queue_empties() {
        let registry = Arc::new(TabRegistry::new());
        let tab = Tab::new("t1".into(), vec!["a".into()]).unwrap();
        tab.store.insert_batch(&vec![vec![Some("1".into())]]).unwrap();
        let tab = registry.insert(tab);
        let tab_id = tab.id;

        let scheduler = Scheduler::new(registry.clone(), TimelineConfig::default());
        scheduler.enqueue_import(tab_id);

        scheduler
            .drain(|_id| async { ImportOutcome::Succeeded })
            .await;

        assert!(tab.store.has_sort_index("c0"));
        assert!(tab.fts_ready());
        assert!(tab.is_ready_for_mutation());
    }

    #[tokio::test]
    async fn failed_import_tears_down_tab() {
        let registry = Arc::new(TabRegistry::new());
        let tab = Tab::new("t1".into(), vec!["a".into()]).unwrap();
        let tab_id = tab.id;
        registry.insert(tab);

        let scheduler = Scheduler::new(registry.clone(), TimelineConfig::default());
        scheduler.enqueue_import(tab_id);
        scheduler
            .drain(|_id| async { ImportOutcome::Failed("bad file".into()) })
            .await;

        assert!(!registry.contains(tab_id));
    }
}
