mod availability;
mod conflict;
mod error;
mod holiday;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{evaluate_rule, lookup_keys, merge_overlapping, subtract_windows};
pub use conflict::{find_overlaps, overlap_conflict, resource_conflict};
pub use error::EngineError;
pub use holiday::{first_blocking, HolidayScope};
pub use store::{InMemoryStore, SharedProfessionalState, SharedResourceState};

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use tracing::debug;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

use store::{apply_to_professional, apply_to_resource, event_book_id, event_resource_ids};

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first append, drains whatever else is already queued,
/// then does one flush + fsync for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, &mut batch);
        // Compaction must see every append queued before it.
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush so a failed batch leaves no half-buffered bytes for the next one.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Per-tenant behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub holiday_scope: HolidayScope,
}

/// Scheduling engine for one tenant.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) options: EngineOptions,
    /// Mutations hold this shared; compaction holds it exclusively.
    write_gate: RwLock<()>,
    /// Monotonic within a millisecond, so id order is creation order.
    ids: Mutex<ulid::Generator>,
}

type ResourceReadGuards = Vec<(Ulid, OwnedRwLockReadGuard<ResourceState>)>;
type ResourceWriteGuards = Vec<(Ulid, OwnedRwLockWriteGuard<ResourceState>)>;

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        Self::with_options(wal_path, notify, EngineOptions::default())
    }

    pub fn with_options(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        options: EngineOptions,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            notify,
            options,
            write_gate: RwLock::new(()),
            ids: Mutex::new(ulid::Generator::new()),
        };

        // We are the sole owner of every lock during replay, so try_write always
        // succeeds. Never block here: this may run inside an async context.
        for event in &events {
            engine.store.apply_event(event);
            if let Some(pid) = event_book_id(event)
                && let Some(ps) = engine.store.get_professional(&pid)
                && let Ok(mut guard) = ps.try_write()
            {
                apply_to_professional(&mut guard, event);
            }
            for rid in event_resource_ids(event) {
                if let Some(rs) = engine.store.get_resource(&rid)
                    && let Ok(mut guard) = rs.try_write()
                {
                    apply_to_resource(&mut guard, event);
                }
            }
        }
        debug!("replayed {} events", events.len());

        Ok(engine)
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub(super) fn next_id(&self) -> Ulid {
        self.ids
            .lock()
            .ok()
            .and_then(|mut g| g.generate().ok())
            .unwrap_or_else(Ulid::new)
    }

    /// Taken first by every mutation, before any per-entity lock.
    pub(super) async fn gate_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.write_gate.read().await
    }

    pub(super) async fn gate_exclusive(&self) -> tokio::sync::RwLockWriteGuard<'_, ()> {
        self.write_gate.write().await
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append + map-level apply + notify, for events with no lock-protected state.
    pub(super) async fn commit_catalog(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(event);
        self.publish(event);
        Ok(())
    }

    /// WAL-append + apply to the held book and resource guards + notify.
    pub(super) async fn commit_appointment(
        &self,
        ps: &mut ProfessionalState,
        resources: &mut ResourceWriteGuards,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(event);
        apply_to_professional(ps, event);
        for (_, guard) in resources.iter_mut() {
            apply_to_resource(guard, event);
        }
        self.publish(event);
        Ok(())
    }

    pub(super) fn publish(&self, event: &Event) {
        if let Some(pid) = event.profile_id() {
            self.notify.send(pid, event);
        }
    }

    pub(super) fn professional(&self, id: &Ulid) -> Result<SharedProfessionalState, EngineError> {
        self.store
            .get_professional(id)
            .ok_or(EngineError::NotFound(*id))
    }

    pub(super) fn resource(&self, id: &Ulid) -> Result<SharedResourceState, EngineError> {
        self.store.get_resource(id).ok_or(EngineError::NotFound(*id))
    }

    /// Sorted, de-duplicated resource ids. Locks are always taken in this order.
    fn lock_order(ids: &[Ulid]) -> Result<Vec<Ulid>, EngineError> {
        if ids.len() > crate::limits::MAX_RESOURCES_PER_APPOINTMENT {
            return Err(EngineError::LimitExceeded("too many resources on appointment"));
        }
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        Ok(sorted)
    }

    pub(super) async fn lock_resources_read(&self, ids: &[Ulid]) -> Result<ResourceReadGuards, EngineError> {
        let mut guards = Vec::with_capacity(ids.len());
        for rid in Self::lock_order(ids)? {
            let guard = self.resource(&rid)?.read_owned().await;
            guards.push((rid, guard));
        }
        Ok(guards)
    }

    pub(super) async fn lock_resources_write(&self, ids: &[Ulid]) -> Result<ResourceWriteGuards, EngineError> {
        let mut guards = Vec::with_capacity(ids.len());
        for rid in Self::lock_order(ids)? {
            let guard = self.resource(&rid)?.write_owned().await;
            // Deleted while we waited.
            if !self.store.contains_resource(&rid) {
                return Err(EngineError::NotFound(rid));
            }
            guards.push((rid, guard));
        }
        Ok(guards)
    }
}
