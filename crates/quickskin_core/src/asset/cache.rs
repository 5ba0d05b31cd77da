//! Two-tier image asset cache with non-blocking resolution.
//!
//! # Responsibility
//! - Resolve asset ids to decoded images without blocking the caller.
//! - Fetch and decode misses on the runtime's blocking pool, one task per
//!   miss, and notify observers when a fetch lands.
//! - Write through to the blob store on `set`; delete storage-first.
//!
//! # Invariants
//! - At most one fetch is in flight per asset id.
//! - Every state change takes a fresh ticket; a fetch whose ticket is no longer
//!   current (because `set`/`delete` ran meanwhile) is discarded on completion.
//! - Decoded images are held weakly, plus strongly for the `capacity` most
//!   recently used ids. A reclaimed entry is a plain miss and is pruned once
//!   the strong ring evicts.
//! - At most `capacity` confirmed-absent ids are remembered, oldest first out.

use super::blob_store::BlobStore;
use super::codec::ImageCodec;
use super::AssetResult;
use crate::model::AssetId;
use image::{DynamicImage, RgbaImage};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::runtime::Handle;

const PLACEHOLDER_SIZE: u32 = 100;

/// Receives a signal when the cached value for an asset id changed.
///
/// Called from background threads; implementations should only schedule a
/// re-read, not do the re-read inline.
pub trait AssetObserver: Send + Sync {
    fn asset_changed(&self, id: &AssetId);
}

/// Sentinel images returned instead of real assets.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub loading: Arc<DynamicImage>,
    pub not_found: Arc<DynamicImage>,
}

impl Default for Placeholders {
    fn default() -> Self {
        let blank = || {
            Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(
                PLACEHOLDER_SIZE,
                PLACEHOLDER_SIZE,
            )))
        };
        Self {
            loading: blank(),
            not_found: blank(),
        }
    }
}

/// Result of a non-blocking resolve.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Decoded asset.
    Ready(Arc<DynamicImage>),
    /// Fetch in flight; carries the loading placeholder.
    Loading(Arc<DynamicImage>),
    /// Confirmed absent (or undecodable); carries the not-found placeholder.
    NotFound(Arc<DynamicImage>),
}

impl Resolution {
    /// Image to display: the asset or the matching placeholder.
    pub fn image(&self) -> &Arc<DynamicImage> {
        match self {
            Self::Ready(image) | Self::Loading(image) | Self::NotFound(image) => image,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Observable load state of one asset id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// Never attempted, evicted, or reclaimed.
    Unresolved,
    Loading,
    Ready,
    Absent,
}

enum Slot {
    Loading,
    Ready(Weak<DynamicImage>),
    Absent,
}

struct Entry {
    slot: Slot,
    ticket: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<AssetId, Entry>,
    retained: VecDeque<(AssetId, Arc<DynamicImage>)>,
    absent: VecDeque<AssetId>,
    next_ticket: u64,
}

impl CacheState {
    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn begin_load(&mut self, id: &AssetId) -> u64 {
        let ticket = self.take_ticket();
        self.entries.insert(
            id.clone(),
            Entry {
                slot: Slot::Loading,
                ticket,
            },
        );
        ticket
    }

    fn install(&mut self, id: &AssetId, image: Arc<DynamicImage>, ticket: u64, capacity: usize) {
        self.entries.insert(
            id.clone(),
            Entry {
                slot: Slot::Ready(Arc::downgrade(&image)),
                ticket,
            },
        );
        self.absent.retain(|absent_id| absent_id != id);
        self.retain(id, image, capacity);
    }

    fn retain(&mut self, id: &AssetId, image: Arc<DynamicImage>, capacity: usize) {
        self.retained.retain(|(retained_id, _)| retained_id != id);
        self.retained.push_back((id.clone(), image));
        if self.retained.len() <= capacity {
            return;
        }
        while self.retained.len() > capacity {
            self.retained.pop_front();
        }
        self.prune_reclaimed();
    }

    /// Drops `Ready` slots whose image nobody holds any more.
    fn prune_reclaimed(&mut self) {
        self.entries.retain(|_, entry| match &entry.slot {
            Slot::Ready(weak) => weak.strong_count() > 0,
            Slot::Loading | Slot::Absent => true,
        });
    }

    /// Records `id` as confirmed absent under `ticket`.
    ///
    /// At most `capacity` absent ids are remembered; the oldest falls back to
    /// a plain miss.
    fn mark_absent(&mut self, id: &AssetId, ticket: u64, capacity: usize) {
        self.entries.insert(
            id.clone(),
            Entry {
                slot: Slot::Absent,
                ticket,
            },
        );
        self.retained.retain(|(retained_id, _)| retained_id != id);
        self.absent.retain(|absent_id| absent_id != id);
        self.absent.push_back(id.clone());
        while self.absent.len() > capacity {
            if let Some(oldest) = self.absent.pop_front() {
                if matches!(self.entries.get(&oldest), Some(Entry { slot: Slot::Absent, .. })) {
                    self.entries.remove(&oldest);
                }
            }
        }
    }

    /// Forgets everything known about `id`; the next resolve fetches again.
    fn forget(&mut self, id: &AssetId) {
        self.entries.remove(id);
        self.retained.retain(|(retained_id, _)| retained_id != id);
        self.absent.retain(|absent_id| absent_id != id);
    }
}

struct Shared {
    blobs: Arc<dyn BlobStore>,
    codec: Arc<dyn ImageCodec>,
    placeholders: Placeholders,
    capacity: usize,
    state: Mutex<CacheState>,
    observers: Mutex<Vec<Weak<dyn AssetObserver>>>,
}

impl Shared {
    fn complete_fetch(&self, id: AssetId, ticket: u64) {
        let started_at = Instant::now();
        let image = match self.blobs.load(&id) {
            Ok(Some(bytes)) => match self.codec.decode(&bytes) {
                Ok(image) => Some(Arc::new(image)),
                Err(err) => {
                    warn!("event=asset_fetch module=asset status=corrupt id={id} error={err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("event=asset_fetch module=asset status=error id={id} error={err}");
                None
            }
        };
        let found = image.is_some();

        {
            let mut state = self.state.lock();
            let current = state.entries.get(&id).map(|entry| entry.ticket);
            if current != Some(ticket) {
                debug!("event=asset_fetch module=asset status=superseded id={id}");
                return;
            }
            match image {
                Some(image) => state.install(&id, image, ticket, self.capacity),
                None => state.mark_absent(&id, ticket, self.capacity),
            }
        }

        debug!(
            "event=asset_fetch module=asset status=ok id={id} found={found} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        self.notify(&id);
    }

    fn notify(&self, id: &AssetId) {
        let live: Vec<Arc<dyn AssetObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.asset_changed(id);
        }
    }
}

/// Process-wide asset cache. Construct once and share by reference (`Arc`).
pub struct AssetCache {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl AssetCache {
    /// Creates a cache over `blobs` strongly retaining up to `capacity`
    /// decoded images (at least one).
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        codec: Arc<dyn ImageCodec>,
        runtime: Handle,
        capacity: usize,
    ) -> Self {
        Self::with_placeholders(blobs, codec, runtime, capacity, Placeholders::default())
    }

    pub fn with_placeholders(
        blobs: Arc<dyn BlobStore>,
        codec: Arc<dyn ImageCodec>,
        runtime: Handle,
        capacity: usize,
        placeholders: Placeholders,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                blobs,
                codec,
                placeholders,
                capacity: capacity.max(1),
                state: Mutex::new(CacheState::default()),
                observers: Mutex::new(Vec::new()),
            }),
            runtime,
        }
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.shared.placeholders
    }

    /// Registers an observer; it is dropped automatically once unreachable.
    pub fn subscribe(&self, observer: Weak<dyn AssetObserver>) {
        self.shared.observers.lock().push(observer);
    }

    /// Resolves `id` without blocking.
    ///
    /// A live cached image is returned directly. Otherwise the loading
    /// placeholder is returned and, unless a fetch is already in flight, one
    /// background fetch is scheduled; observers hear about its outcome.
    /// Confirmed-absent ids return the not-found placeholder without
    /// re-fetching.
    pub fn resolve(&self, id: &AssetId) -> Resolution {
        if id.is_empty() {
            return Resolution::NotFound(Arc::clone(&self.shared.placeholders.not_found));
        }

        let ticket = {
            let mut state = self.shared.state.lock();
            let hit = match state.entries.get(id).map(|entry| &entry.slot) {
                Some(Slot::Ready(weak)) => weak.upgrade(),
                Some(Slot::Loading) => {
                    return Resolution::Loading(Arc::clone(&self.shared.placeholders.loading));
                }
                Some(Slot::Absent) => {
                    return Resolution::NotFound(Arc::clone(
                        &self.shared.placeholders.not_found,
                    ));
                }
                None => None,
            };
            match hit {
                Some(image) => {
                    state.retain(id, Arc::clone(&image), self.shared.capacity);
                    return Resolution::Ready(image);
                }
                None => state.forget(id),
            }
            state.begin_load(id)
        };

        debug!("event=asset_fetch module=asset status=start id={id}");
        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        // Detached: fetches are not cancellable; the outcome reaches observers.
        drop(
            self.runtime
                .spawn_blocking(move || shared.complete_fetch(id, ticket)),
        );
        Resolution::Loading(Arc::clone(&self.shared.placeholders.loading))
    }

    /// Resolves an optional reference; `None` is not-found.
    pub fn resolve_optional(&self, id: Option<&AssetId>) -> Resolution {
        match id {
            Some(id) => self.resolve(id),
            None => Resolution::NotFound(Arc::clone(&self.shared.placeholders.not_found)),
        }
    }

    /// Current load state of `id`.
    pub fn state(&self, id: &AssetId) -> AssetState {
        let state = self.shared.state.lock();
        match state.entries.get(id).map(|entry| &entry.slot) {
            None => AssetState::Unresolved,
            Some(Slot::Loading) => AssetState::Loading,
            Some(Slot::Absent) => AssetState::Absent,
            Some(Slot::Ready(weak)) if weak.strong_count() > 0 => AssetState::Ready,
            Some(Slot::Ready(_)) => AssetState::Unresolved,
        }
    }

    /// Stores `image` under `id`: blob table first, then the memory tier.
    ///
    /// Supersedes any fetch for `id` still in flight.
    pub fn set(&self, id: &AssetId, image: DynamicImage) -> AssetResult<Arc<DynamicImage>> {
        let bytes = self.shared.codec.encode(&image)?;
        self.shared.blobs.save(id, &bytes)?;

        let image = Arc::new(image);
        {
            let mut state = self.shared.state.lock();
            let ticket = state.take_ticket();
            state.install(id, Arc::clone(&image), ticket, self.shared.capacity);
        }
        info!(
            "event=asset_store module=asset status=ok id={id} bytes={}",
            bytes.len()
        );
        self.shared.notify(id);
        Ok(image)
    }

    /// Removes `id` from the blob table, then records it as absent.
    ///
    /// A later resolve returns the not-found placeholder without fetching,
    /// and any fetch for `id` still in flight is discarded.
    pub fn delete(&self, id: &AssetId) -> AssetResult<()> {
        self.shared.blobs.delete(id)?;
        {
            let mut state = self.shared.state.lock();
            let ticket = state.take_ticket();
            state.mark_absent(id, ticket, self.shared.capacity);
        }
        info!("event=asset_delete module=asset status=ok count=1 id={id}");
        self.shared.notify(id);
        Ok(())
    }

    /// Batch form of [`AssetCache::delete`].
    ///
    /// When storage fails, every listed id is forgotten from memory before the
    /// error is returned, so no cached image outlives a removed blob.
    pub fn delete_many(&self, ids: &[AssetId]) -> AssetResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.shared.blobs.delete_many(ids) {
            {
                let mut state = self.shared.state.lock();
                for id in ids {
                    state.forget(id);
                }
            }
            warn!(
                "event=asset_delete module=asset status=error count={} error={err}",
                ids.len()
            );
            for id in ids {
                self.shared.notify(id);
            }
            return Err(err.into());
        }
        {
            let mut state = self.shared.state.lock();
            for id in ids {
                let ticket = state.take_ticket();
                state.mark_absent(id, ticket, self.shared.capacity);
            }
        }
        info!(
            "event=asset_delete module=asset status=ok count={}",
            ids.len()
        );
        for id in ids {
            self.shared.notify(id);
        }
        Ok(())
    }

    /// Returns whether the blob table holds a row for `id`.
    pub fn exists(&self, id: &AssetId) -> AssetResult<bool> {
        Ok(self.shared.blobs.exists(id)?)
    }
}
