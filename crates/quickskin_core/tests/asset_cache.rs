use image::{DynamicImage, Rgba, RgbaImage};
use quickskin_core::asset::{
    AssetCache, AssetObserver, AssetState, BlobStore, ImageCodec, PngCodec,
};
use quickskin_core::db::{DbError, DbResult};
use quickskin_core::model::AssetId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;

/// In-memory blob store that counts loads and can hold them at a gate.
#[derive(Default)]
struct InstrumentedBlobs {
    rows: Mutex<HashMap<AssetId, Vec<u8>>>,
    loads_started: AtomicUsize,
    loads_finished: AtomicUsize,
    gate_open: Mutex<bool>,
    gate: Condvar,
    fail_loads: bool,
    fail_batch_after_first: bool,
}

impl InstrumentedBlobs {
    fn gated() -> Self {
        Self::default()
    }

    fn open() -> Self {
        let blobs = Self::default();
        *blobs.gate_open.lock().unwrap() = true;
        blobs
    }

    fn failing() -> Self {
        Self {
            fail_loads: true,
            ..Self::open()
        }
    }

    fn failing_batch_delete() -> Self {
        Self {
            fail_batch_after_first: true,
            ..Self::open()
        }
    }

    fn release(&self) {
        *self.gate_open.lock().unwrap() = true;
        self.gate.notify_all();
    }

    fn started(&self) -> usize {
        self.loads_started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.loads_finished.load(Ordering::SeqCst)
    }
}

impl BlobStore for InstrumentedBlobs {
    fn load(&self, id: &AssetId) -> DbResult<Option<Vec<u8>>> {
        self.loads_started.fetch_add(1, Ordering::SeqCst);
        let mut open = self.gate_open.lock().unwrap();
        while !*open {
            open = self.gate.wait(open).unwrap();
        }
        drop(open);

        let result = if self.fail_loads {
            Err(DbError::InvalidIdentifier("unreachable store".to_string()))
        } else {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        };
        self.loads_finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn save(&self, id: &AssetId, bytes: &[u8]) -> DbResult<()> {
        self.rows.lock().unwrap().insert(id.clone(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, id: &AssetId) -> DbResult<()> {
        self.rows.lock().unwrap().remove(id);
        Ok(())
    }

    fn delete_many(&self, ids: &[AssetId]) -> DbResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for (index, id) in ids.iter().enumerate() {
            if self.fail_batch_after_first && index > 0 {
                return Err(DbError::InvalidIdentifier("store went away".to_string()));
            }
            rows.remove(id);
        }
        Ok(())
    }

    fn exists(&self, id: &AssetId) -> DbResult<bool> {
        Ok(self.rows.lock().unwrap().contains_key(id))
    }
}

struct ChannelObserver(Mutex<Sender<AssetId>>);

impl AssetObserver for ChannelObserver {
    fn asset_changed(&self, id: &AssetId) {
        let _ = self.0.lock().unwrap().send(id.clone());
    }
}

struct Harness {
    _runtime: Runtime,
    blobs: Arc<InstrumentedBlobs>,
    cache: Arc<AssetCache>,
    _observer: Arc<dyn AssetObserver>,
    events: Receiver<AssetId>,
}

fn harness(blobs: InstrumentedBlobs) -> Harness {
    let runtime = Runtime::new().unwrap();
    let blobs = Arc::new(blobs);
    let cache = Arc::new(AssetCache::new(
        blobs.clone(),
        Arc::new(PngCodec),
        runtime.handle().clone(),
        16,
    ));
    let (tx, rx) = channel();
    let observer: Arc<dyn AssetObserver> = Arc::new(ChannelObserver(Mutex::new(tx)));
    cache.subscribe(Arc::downgrade(&observer));
    Harness {
        _runtime: runtime,
        blobs,
        cache,
        _observer: observer,
        events: rx,
    }
}

fn image(value: u8) -> DynamicImage {
    let mut pixels = RgbaImage::new(4, 4);
    pixels.put_pixel(1, 2, Rgba([value, 0, 255 - value, 255]));
    DynamicImage::ImageRgba8(pixels)
}

fn wait_for(events: &Receiver<AssetId>, id: &AssetId) {
    loop {
        let changed = events
            .recv_timeout(Duration::from_secs(5))
            .expect("observer should be notified");
        if &changed == id {
            return;
        }
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached in time");
}

#[test]
fn concurrent_resolves_share_one_backing_fetch() {
    let fx = harness(InstrumentedBlobs::gated());
    let id = AssetId::new("poster");
    fx.blobs
        .save(&id, &PngCodec.encode(&image(9)).unwrap())
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&fx.cache);
            let id = id.clone();
            thread::spawn(move || cache.resolve(&id).is_loading())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(fx.cache.resolve(&id).is_loading());
    assert_eq!(fx.cache.state(&id), AssetState::Loading);

    fx.blobs.release();
    wait_for(&fx.events, &id);

    assert_eq!(fx.blobs.started(), 1);
    let resolved = fx.cache.resolve(&id);
    assert!(resolved.is_ready());
    assert_eq!(resolved.image().to_rgba8(), image(9).to_rgba8());
    assert_eq!(fx.blobs.started(), 1);
}

#[test]
fn set_then_resolve_short_circuits_without_fetch() {
    let fx = harness(InstrumentedBlobs::gated());
    let id = AssetId::new("fresh");

    let stored = fx.cache.set(&id, image(1)).unwrap();
    let resolved = fx.cache.resolve(&id);

    assert!(resolved.is_ready());
    assert!(Arc::ptr_eq(resolved.image(), &stored));
    assert_eq!(fx.blobs.started(), 0);
    assert!(fx.cache.exists(&id).unwrap());
}

#[test]
fn set_during_inflight_fetch_wins_over_stale_result() {
    let fx = harness(InstrumentedBlobs::gated());
    let id = AssetId::new("contested");
    fx.blobs
        .save(&id, &PngCodec.encode(&image(10)).unwrap())
        .unwrap();

    assert!(fx.cache.resolve(&id).is_loading());
    wait_until(|| fx.blobs.started() == 1);

    let newer = fx.cache.set(&id, image(200)).unwrap();
    fx.blobs.release();
    wait_until(|| fx.blobs.finished() == 1);
    thread::sleep(Duration::from_millis(50));

    let resolved = fx.cache.resolve(&id);
    assert!(resolved.is_ready());
    assert!(Arc::ptr_eq(resolved.image(), &newer));
}

#[test]
fn delete_removes_storage_then_resolves_not_found_without_fetch() {
    let fx = harness(InstrumentedBlobs::open());
    let id = AssetId::new("doomed");
    let _held = fx.cache.set(&id, image(3)).unwrap();

    fx.cache.delete(&id).unwrap();
    assert!(!fx.cache.exists(&id).unwrap());
    assert_eq!(fx.cache.state(&id), AssetState::Absent);

    let resolved = fx.cache.resolve(&id);
    assert!(resolved.is_not_found());
    assert!(Arc::ptr_eq(resolved.image(), &fx.cache.placeholders().not_found));
    assert_eq!(fx.blobs.started(), 0);
}

#[test]
fn delete_during_inflight_fetch_discards_the_fetch() {
    let fx = harness(InstrumentedBlobs::gated());
    let id = AssetId::new("raced");
    fx.blobs
        .save(&id, &PngCodec.encode(&image(12)).unwrap())
        .unwrap();

    assert!(fx.cache.resolve(&id).is_loading());
    wait_until(|| fx.blobs.started() == 1);
    fx.cache.delete(&id).unwrap();
    fx.blobs.release();
    wait_until(|| fx.blobs.finished() == 1);
    thread::sleep(Duration::from_millis(50));

    assert_eq!(fx.cache.state(&id), AssetState::Absent);
    assert!(fx.cache.resolve(&id).is_not_found());
}

#[test]
fn delete_many_marks_every_listed_id_absent() {
    let fx = harness(InstrumentedBlobs::open());
    let ids: Vec<AssetId> = ["a", "b", "c"].into_iter().map(AssetId::from).collect();
    for (index, id) in ids.iter().enumerate() {
        fx.cache.set(id, image(index as u8)).unwrap();
    }

    fx.cache.delete_many(&ids[..2]).unwrap();
    assert_eq!(fx.cache.state(&ids[0]), AssetState::Absent);
    assert_eq!(fx.cache.state(&ids[1]), AssetState::Absent);
    assert_eq!(fx.cache.state(&ids[2]), AssetState::Ready);
    assert!(fx.cache.resolve(&ids[0]).is_not_found());
    assert!(!fx.cache.exists(&ids[0]).unwrap());
    assert!(fx.cache.exists(&ids[2]).unwrap());
    assert_eq!(fx.blobs.started(), 0);
}

#[test]
fn failed_batch_delete_leaves_no_stale_hits() {
    let fx = harness(InstrumentedBlobs::failing_batch_delete());
    let ids: Vec<AssetId> = ["kept-a", "kept-b"].into_iter().map(AssetId::from).collect();
    let _held: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| fx.cache.set(id, image(index as u8)).unwrap())
        .collect();

    assert!(fx.cache.delete_many(&ids).is_err());
    assert!(!fx.cache.exists(&ids[0]).unwrap());
    assert!(fx.cache.exists(&ids[1]).unwrap());
    assert_eq!(fx.cache.state(&ids[0]), AssetState::Unresolved);
    assert_eq!(fx.cache.state(&ids[1]), AssetState::Unresolved);

    while fx.events.try_recv().is_ok() {}
    assert!(fx.cache.resolve(&ids[0]).is_loading());
    wait_for(&fx.events, &ids[0]);
    assert!(fx.cache.resolve(&ids[0]).is_not_found());
}

#[test]
fn storage_failure_during_fetch_resolves_as_absent() {
    let fx = harness(InstrumentedBlobs::failing());
    let id = AssetId::new("unreachable");

    assert!(fx.cache.resolve(&id).is_loading());
    wait_for(&fx.events, &id);
    assert_eq!(fx.cache.state(&id), AssetState::Absent);
    assert!(fx.cache.resolve(&id).is_not_found());
    assert_eq!(fx.blobs.started(), 1);
}

#[test]
fn dropped_observers_are_not_called() {
    struct CountingObserver(Arc<AtomicUsize>);

    impl AssetObserver for CountingObserver {
        fn asset_changed(&self, _id: &AssetId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let fx = harness(InstrumentedBlobs::open());
    let calls = Arc::new(AtomicUsize::new(0));
    let transient: Arc<dyn AssetObserver> = Arc::new(CountingObserver(Arc::clone(&calls)));
    fx.cache.subscribe(Arc::downgrade(&transient));

    fx.cache.set(&AssetId::new("first"), image(5)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(transient);
    fx.cache.set(&AssetId::new("second"), image(6)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    wait_for(&fx.events, &AssetId::new("second"));
}
