//! Pet Registry
//!
//! Owns the live pets and reconciles them against each config snapshot: new
//! ids spawn a motion engine and its runtime tasks, surviving ids get their
//! sizes updated in place, absent ids are torn down. A snapshot is a full
//! replacement, never a delta.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use roampets_core::{PetData, PetId};

use crate::assets::AssetStore;
use crate::bounds::{LayoutMetrics, PlayArea};
use crate::interaction::{PetRuntime, PetVisual, PointerEvent, SharedSizes};
use crate::motion::MotionEngine;

struct PetHandle {
    data: PetData,
    engine: MotionEngine,
    visual: Arc<Mutex<PetVisual>>,
    sizes: SharedSizes,
    runtime: PetRuntime,
}

/// All live pets on this surface.
pub struct PetRegistry {
    metrics: Arc<RwLock<LayoutMetrics>>,
    store: AssetStore,
    pets: Mutex<HashMap<PetId, PetHandle>>,
}

impl PetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(metrics: Arc<RwLock<LayoutMetrics>>, store: AssetStore) -> Self {
        Self {
            metrics,
            store,
            pets: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile against a full snapshot.
    pub fn apply_snapshot(&self, snapshot: Vec<PetData>) {
        let mut pets = self.pets.lock();

        pets.retain(|id, handle| {
            let keep = snapshot.iter().any(|p| p.id == *id);
            if !keep {
                tracing::info!(pet = %id, "pet removed");
                handle.runtime.shutdown();
            }
            keep
        });

        let mut rng = StdRng::from_entropy();
        for data in snapshot {
            match pets.get_mut(&data.id) {
                Some(handle) => {
                    if handle.data.sizes != data.sizes {
                        *handle.sizes.write() = data.sizes;
                        let state = handle.visual.lock().state;
                        let height = data.sizes.get(state.sprite());
                        handle.engine.set_size(height, height);
                        tracing::debug!(pet = %data.id, "pet resized");
                    }
                    handle.data = data;
                }
                None => {
                    tracing::info!(pet = %data.id, source = %data.source, kind = %data.kind, "pet adopted");
                    let handle = self.adopt(data, &mut rng);
                    pets.insert(handle.data.id, handle);
                }
            }
        }
    }

    fn adopt(&self, data: PetData, rng: &mut StdRng) -> PetHandle {
        let height = data.sizes.idle;
        let engine = MotionEngine::new(Arc::clone(&self.metrics), height, height);

        // Drop the pet somewhere random along the floor.
        let area = PlayArea::for_pet(&self.metrics.read(), height);
        let span = area.span_x(height);
        if span > 0.0 {
            engine.set_position(rng.gen_range(0.0..span), 0.0);
        }

        let visual = Arc::new(Mutex::new(PetVisual::default()));
        let sizes: SharedSizes = Arc::new(RwLock::new(data.sizes));
        let runtime = PetRuntime::spawn(
            engine.clone(),
            Arc::clone(&visual),
            Arc::clone(&sizes),
            Arc::clone(&self.metrics),
        );
        PetHandle {
            data,
            engine,
            visual,
            sizes,
            runtime,
        }
    }

    /// Re-clamp every pet, after a layout change.
    pub fn clamp_all(&self) {
        for handle in self.pets.lock().values() {
            if handle.engine.clamp_now() {
                tracing::debug!(pet = %handle.data.id, "pet pushed back in bounds");
            }
        }
    }

    /// Pointer-event inlet for one pet.
    #[must_use]
    pub fn pointer(&self, id: PetId) -> Option<mpsc::Sender<PointerEvent>> {
        self.pets.lock().get(&id).map(|h| h.runtime.pointer())
    }

    /// Copy of one pet's visual state.
    #[must_use]
    pub fn visual(&self, id: PetId) -> Option<PetVisual> {
        self.pets.lock().get(&id).map(|h| *h.visual.lock())
    }

    /// Data URI of the sprite a pet should render right now, if delivered.
    #[must_use]
    pub fn sprite(&self, id: PetId) -> Option<Arc<str>> {
        let pets = self.pets.lock();
        let handle = pets.get(&id)?;
        let state = handle.visual.lock().state.sprite();
        let name = handle.data.asset_name(state)?;
        self.store.try_get(&name)
    }

    /// Ids of all live pets.
    #[must_use]
    pub fn ids(&self) -> Vec<PetId> {
        self.pets.lock().keys().copied().collect()
    }

    /// Number of live pets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pets.lock().len()
    }

    /// Whether no pets are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pets.lock().is_empty()
    }
}
