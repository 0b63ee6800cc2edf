//! Media Resource Pool.
//!
//! A fixed number of media elements is created up front and reused across
//! the whole timeline. Assets are bound to elements on demand; when every
//! element is taken, the least-recently-used one is rebound. The pool is the
//! only code that binds sources or seeks, so element usage stays bounded no
//! matter how many assets the timeline references.
//!
//! Every slot carries a generation counter. `release`, `reset` and `dispose`
//! bump it, and an in-flight load or seek that finishes under an older
//! generation reports [`MediaError::Abandoned`] instead of touching the slot.
//!
//! Whoever binds a slot holds that slot's operation lock until its load has
//! finished, so a concurrent request for the same asset waits for the load
//! instead of seeking an element that has no source yet.

use cutline_core::limits;
use cutline_timeline::{AssetId, AssetLookup, MediaAsset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as OpLock, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::element::MediaElement;
use crate::error::{MediaError, MediaResult};
use crate::handle::PreparedHandle;

/// Claims of a busy slot retried before a request gives up.
const MAX_CLAIM_ATTEMPTS: usize = 4;

/// Pool sizing and seek policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of elements; never changes after construction.
    pub pool_size: usize,
    /// Upcoming assets warmed up per `preload` call.
    pub preload_count: usize,
    /// Upper bound on waiting for one seek.
    pub seek_timeout_ms: u64,
    /// Allowed drift while paused or scrubbing.
    pub paused_tolerance_secs: f64,
    /// Allowed drift while playing; the element's own clock tracks the target.
    pub playing_tolerance_secs: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: limits::POOL_SIZE,
            preload_count: limits::PRELOAD_COUNT,
            seek_timeout_ms: limits::SEEK_TIMEOUT_MS,
            paused_tolerance_secs: 0.01,
            playing_tolerance_secs: 0.1,
        }
    }
}

impl PoolConfig {
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    pub fn drift_tolerance(&self, is_playing: bool) -> f64 {
        if is_playing {
            self.playing_tolerance_secs
        } else {
            self.paused_tolerance_secs
        }
    }
}

/// Aggregate pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub bound: usize,
    pub loading: usize,
    pub prepared: usize,
}

/// Read-only view of one slot, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: usize,
    pub asset: Option<AssetId>,
    pub loading: bool,
    pub prepared: bool,
    /// Logical use clock; 0 means never used since the last unbind.
    pub last_used: u64,
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    asset: Option<AssetId>,
    loading: bool,
    prepared: bool,
    last_used: u64,
    generation: u64,
}

impl SlotState {
    fn is_ready_for(&self, asset: &AssetId, generation: u64) -> bool {
        self.generation == generation
            && self.prepared
            && !self.loading
            && self.asset.as_ref() == Some(asset)
    }
}

struct Slot<E> {
    element: Arc<E>,
    op: Arc<OpLock<()>>,
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<SlotState>,
    clock: u64,
    disposed: bool,
}

impl PoolState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn bound_slot(&self, asset: &AssetId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.asset.as_ref() == Some(asset))
    }
}

enum Claim {
    /// The asset is already bound; wait for the slot and reuse it.
    Bound { index: usize, generation: u64 },
    /// A slot was rebound to the asset and must be loaded.
    Fresh {
        index: usize,
        generation: u64,
        guard: OwnedMutexGuard<()>,
    },
    /// Every slot has an operation in flight.
    Busy { index: usize },
}

/// Bounded pool of reusable media elements.
pub struct MediaPool<E: MediaElement> {
    config: PoolConfig,
    slots: Vec<Slot<E>>,
    state: Mutex<PoolState>,
}

impl<E: MediaElement> MediaPool<E> {
    /// Create a pool, building each element with `make(index)`.
    pub fn new(config: PoolConfig, mut make: impl FnMut(usize) -> E) -> Self {
        let size = config.pool_size.max(1);
        let slots = (0..size)
            .map(|index| Slot {
                element: Arc::new(make(index)),
                op: Arc::new(OpLock::new(())),
            })
            .collect();
        info!(size, preload = config.preload_count, "Media pool created");
        Self {
            config,
            slots,
            state: Mutex::new(PoolState {
                slots: vec![SlotState::default(); size],
                clock: 0,
                disposed: false,
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Get an element bound to `asset` and positioned at `target_secs`.
    ///
    /// Reuses the slot already bound to the asset, otherwise rebinds the
    /// least-recently-used idle slot and loads the source. A failed load
    /// unbinds the slot again. The seek honours the drift tolerance for the
    /// current play state and gives up after the seek timeout, in which case
    /// the handle is marked stale.
    pub async fn acquire(
        &self,
        asset: &MediaAsset,
        target_secs: f64,
        is_playing: bool,
    ) -> MediaResult<PreparedHandle<E>> {
        self.acquire_pinned(asset, target_secs, is_playing, &HashSet::new())
            .await
    }

    /// [`acquire`](Self::acquire) that never rebinds a slot in `pinned`.
    ///
    /// A compositor pass pins every slot it has already handed out, so a
    /// frame with more element-backed clips than slots cannot take an
    /// element away from a layer it just staged. Fails with
    /// [`MediaError::PoolExhausted`] when the asset is unbound and every
    /// slot is pinned.
    pub async fn acquire_pinned(
        &self,
        asset: &MediaAsset,
        target_secs: f64,
        is_playing: bool,
        pinned: &HashSet<usize>,
    ) -> MediaResult<PreparedHandle<E>> {
        if asset.url.is_empty() {
            return Err(MediaError::MissingSource(asset.id.clone()));
        }

        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let (index, generation, _guard) = match self.claim(&asset.id, pinned)? {
                Claim::Fresh {
                    index,
                    generation,
                    guard,
                } => {
                    self.load_slot(index, generation, &asset.id, &asset.url)
                        .await?;
                    (index, generation, guard)
                }
                Claim::Bound { index, generation } => {
                    let guard = Arc::clone(&self.slots[index].op).lock_owned().await;
                    let ready = self.state.lock().slots[index].is_ready_for(&asset.id, generation);
                    if !ready {
                        // The load we were waiting on failed or the slot was repurposed.
                        continue;
                    }
                    (index, generation, guard)
                }
                Claim::Busy { index } => {
                    drop(Arc::clone(&self.slots[index].op).lock_owned().await);
                    continue;
                }
            };

            let stale = self
                .align(index, generation, &asset.id, target_secs, is_playing)
                .await?;
            return Ok(PreparedHandle {
                element: Arc::clone(&self.slots[index].element),
                asset_id: asset.id.clone(),
                slot: index,
                stale,
            });
        }

        Err(MediaError::Abandoned(asset.id.clone()))
    }

    /// Warm up idle slots with the first `preload_count` of `upcoming`.
    ///
    /// Only slots that are unbound and unused are filled. Loads run in the
    /// background; failures are logged and swallowed. Returns the number of
    /// loads started.
    pub fn preload<A>(self: &Arc<Self>, upcoming: &[AssetId], assets: &A) -> usize
    where
        A: AssetLookup + ?Sized,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Preload requested outside of a runtime; skipped");
            return 0;
        };

        let mut state = self.state.lock();
        if state.disposed {
            return 0;
        }

        let mut started = 0;
        for id in upcoming {
            if started >= self.config.preload_count {
                break;
            }
            if state.bound_slot(id).is_some() {
                continue;
            }
            let Some(asset) = assets.get_asset(id) else {
                debug!(asset = %id, "Preload skipped: unknown asset");
                continue;
            };
            if !asset.needs_element() || asset.url.is_empty() {
                continue;
            }

            let idle = (0..self.slots.len())
                .filter(|&i| state.slots[i].asset.is_none() && state.slots[i].last_used == 0)
                .find_map(|i| {
                    Arc::clone(&self.slots[i].op)
                        .try_lock_owned()
                        .ok()
                        .map(|guard| (i, guard))
                });
            let Some((index, guard)) = idle else {
                break;
            };

            let now = state.tick();
            let generation = self.bind(&mut state, index, id, now);
            debug!(asset = %id, slot = index, "Preloading");

            let pool = Arc::clone(self);
            let id = id.clone();
            let url = asset.url.clone();
            runtime.spawn(async move {
                let _guard = guard;
                if let Err(err) = pool.load_slot(index, generation, &id, &url).await {
                    warn!(asset = %id, error = %err, "Preload failed");
                }
            });
            started += 1;
        }
        started
    }

    /// Unbind the slot holding `asset`, if any.
    pub fn release(&self, asset: &AssetId) -> bool {
        let mut state = self.state.lock();
        match state.bound_slot(asset) {
            Some(index) => {
                self.unbind(&mut state, index);
                debug!(asset = %asset, slot = index, "Released");
                true
            }
            None => false,
        }
    }

    /// Unbind every slot and abandon in-flight operations.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for index in 0..self.slots.len() {
            self.unbind(&mut state, index);
        }
        state.clock = 0;
        info!("Media pool reset");
    }

    /// Reset and refuse all further requests.
    pub fn dispose(&self) {
        self.reset();
        self.state.lock().disposed = true;
        info!("Media pool disposed");
    }

    /// Pause every bound element whose asset is not in `active`.
    pub fn pause_except(&self, active: &HashSet<AssetId>) {
        let state = self.state.lock();
        for (slot, slot_state) in self.slots.iter().zip(&state.slots) {
            let Some(asset) = &slot_state.asset else {
                continue;
            };
            if !active.contains(asset) && !slot.element.is_paused() {
                debug!(asset = %asset, "Pausing inactive element");
                slot.element.pause();
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            size: self.slots.len(),
            bound: state.slots.iter().filter(|s| s.asset.is_some()).count(),
            loading: state.slots.iter().filter(|s| s.loading).count(),
            prepared: state.slots.iter().filter(|s| s.prepared).count(),
        }
    }

    pub fn slots(&self) -> Vec<SlotSnapshot> {
        let state = self.state.lock();
        state
            .slots
            .iter()
            .enumerate()
            .map(|(index, s)| SlotSnapshot {
                index,
                asset: s.asset.clone(),
                loading: s.loading,
                prepared: s.prepared,
                last_used: s.last_used,
            })
            .collect()
    }

    fn claim(&self, asset: &AssetId, pinned: &HashSet<usize>) -> MediaResult<Claim> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(MediaError::Disposed);
        }
        let now = state.tick();

        if let Some(index) = state.bound_slot(asset) {
            let slot = &mut state.slots[index];
            slot.last_used = now;
            return Ok(Claim::Bound {
                index,
                generation: slot.generation,
            });
        }

        let mut by_age: Vec<usize> = (0..self.slots.len())
            .filter(|i| !pinned.contains(i))
            .collect();
        if by_age.is_empty() {
            return Err(MediaError::PoolExhausted(asset.clone()));
        }
        by_age.sort_by_key(|&i| (state.slots[i].last_used, i));

        for &index in &by_age {
            if let Ok(guard) = Arc::clone(&self.slots[index].op).try_lock_owned() {
                let generation = self.bind(&mut state, index, asset, now);
                return Ok(Claim::Fresh {
                    index,
                    generation,
                    guard,
                });
            }
        }

        Ok(Claim::Busy { index: by_age[0] })
    }

    /// Point slot `index` at `asset`. Caller holds the slot's operation lock.
    fn bind(&self, state: &mut PoolState, index: usize, asset: &AssetId, now: u64) -> u64 {
        let element = &self.slots[index].element;
        element.pause();
        element.unload();

        let slot = &mut state.slots[index];
        if let Some(evicted) = &slot.asset {
            debug!(slot = index, evicted = %evicted, asset = %asset, "Evicting");
        }
        slot.asset = Some(asset.clone());
        slot.loading = true;
        slot.prepared = false;
        slot.last_used = now;
        slot.generation += 1;
        slot.generation
    }

    fn unbind(&self, state: &mut PoolState, index: usize) {
        let element = &self.slots[index].element;
        element.pause();
        element.unload();

        let slot = &mut state.slots[index];
        *slot = SlotState {
            generation: slot.generation + 1,
            ..SlotState::default()
        };
    }

    async fn load_slot(
        &self,
        index: usize,
        generation: u64,
        asset: &AssetId,
        url: &str,
    ) -> MediaResult<()> {
        let element = &self.slots[index].element;
        let result = element.load(url.to_string()).await;

        let mut state = self.state.lock();
        if state.disposed || state.slots[index].generation != generation {
            debug!(asset = %asset, slot = index, "Load abandoned");
            return Err(MediaError::Abandoned(asset.clone()));
        }

        match result {
            Ok(()) => {
                let slot = &mut state.slots[index];
                slot.loading = false;
                slot.prepared = true;
                debug!(asset = %asset, slot = index, "Loaded");
                Ok(())
            }
            Err(err) => {
                warn!(asset = %asset, slot = index, error = %err, "Load failed; slot unbound");
                self.unbind(&mut state, index);
                Err(err)
            }
        }
    }

    /// Seek the slot's element if it drifted past tolerance. Returns whether
    /// the seek timed out.
    async fn align(
        &self,
        index: usize,
        generation: u64,
        asset: &AssetId,
        target_secs: f64,
        is_playing: bool,
    ) -> MediaResult<bool> {
        let element = &self.slots[index].element;
        let target = target_secs.max(0.0);
        let drift = (element.current_time() - target).abs();
        if drift <= self.config.drift_tolerance(is_playing) {
            return Ok(false);
        }

        debug!(asset = %asset, slot = index, target, drift, "Seeking");
        let stale = match tokio::time::timeout(self.config.seek_timeout(), element.seek(target)).await
        {
            Ok(()) => false,
            Err(_) => {
                warn!(
                    asset = %asset,
                    target,
                    timeout_ms = self.config.seek_timeout_ms,
                    "Seek timed out; frame may be stale"
                );
                true
            }
        };

        let state = self.state.lock();
        if state.disposed || state.slots[index].generation != generation {
            return Err(MediaError::Abandoned(asset.clone()));
        }
        Ok(stale)
    }
}

impl<E: MediaElement> std::fmt::Debug for MediaPool<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPool")
            .field("size", &self.slots.len())
            .field("config", &self.config)
            .finish()
    }
}
