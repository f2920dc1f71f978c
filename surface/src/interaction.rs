//! Pet Interaction
//!
//! Two tasks per pet:
//!
//! - The autonomy loop: waits out any tracked user interactions, sleeps a
//!   random while, then walks a random horizontal offset if it is far enough
//!   to bother.
//! - The event loop: consumes pointer events in order. Hovering pauses the
//!   current walk without cancelling it; pressing cancels outright and turns
//!   the pet into a pointer follower; releasing throws it with the recent
//!   pointer velocity.
//!
//! A throw runs as its own task so pointer events stay live during the
//! flight; pressing the pet mid-flight preempts the throw and starts a new
//! drag immediately. Stale drag moves are dropped because no drag is active
//! when they arrive.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use roampets_core::{StateName, StateSizes};

use crate::bounds::{LayoutMetrics, PlayArea};
use crate::interrupt::{interruption, InterruptHandle, InterruptToken};
use crate::motion::{MotionEngine, VelocitySamples};

/// Idle pause between autonomous walks, lower bound.
const IDLE_SLEEP_MIN_MS: u64 = 1000;
/// Idle pause between autonomous walks, upper bound.
const IDLE_SLEEP_MAX_MS: u64 = 3000;
/// Largest autonomous walk offset per axis.
const WANDER_RANGE: f64 = 400.0;
/// Autonomous offsets below this are not worth walking.
const WANDER_THRESHOLD: f64 = 100.0;
/// Hover release delay, lower bound.
const HOVER_LINGER_MIN_MS: u64 = 200;
/// Hover release delay, upper bound.
const HOVER_LINGER_MAX_MS: u64 = 700;

/// What a pet is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PetState {
    /// Standing around.
    Idle,
    /// Autonomous walk in progress.
    Walk,
    /// Pointer resting on the pet.
    Hovered,
    /// Following the pointer.
    Dragging,
    /// Ballistic flight after a release.
    Throwing,
}

impl PetState {
    /// Which sprite renders this state.
    #[must_use]
    pub fn sprite(self) -> StateName {
        match self {
            PetState::Idle | PetState::Hovered | PetState::Dragging => StateName::Idle,
            PetState::Walk | PetState::Throwing => StateName::Walk,
        }
    }
}

/// Renderer-facing view of one pet.
#[derive(Clone, Copy, Debug)]
pub struct PetVisual {
    /// Current behavioral state.
    pub state: PetState,
    /// Whether the hover icon shows.
    pub hover_icon: bool,
}

impl Default for PetVisual {
    fn default() -> Self {
        Self {
            state: PetState::Idle,
            hover_icon: false,
        }
    }
}

/// Pointer events as reported by the embedding shell, in viewport
/// coordinates (origin top-left, y down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    /// Pointer entered the pet's box.
    Enter,
    /// Pointer left the pet's box.
    Leave,
    /// Primary button pressed on the pet.
    Down {
        /// Pointer x.
        x: f64,
        /// Pointer y.
        y: f64,
    },
    /// Pointer moved while pressed.
    Move {
        /// Pointer x.
        x: f64,
        /// Pointer y.
        y: f64,
    },
    /// Primary button released.
    Up,
}

/// Per-state sprite heights, shared so reconfiguration can update them while
/// the pet's loops keep running.
pub type SharedSizes = Arc<RwLock<StateSizes>>;

/// The spawned tasks and event inlet for one pet.
pub struct PetRuntime {
    events: mpsc::Sender<PointerEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl PetRuntime {
    /// Spawn the autonomy and event loops for one pet.
    #[must_use]
    pub fn spawn(
        engine: MotionEngine,
        visual: Arc<Mutex<PetVisual>>,
        sizes: SharedSizes,
        metrics: Arc<RwLock<LayoutMetrics>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(32);
        let interactions: Arc<Mutex<Vec<InterruptToken>>> = Arc::new(Mutex::new(Vec::new()));

        let autonomy = tokio::spawn(run_autonomy(
            engine.clone(),
            Arc::clone(&visual),
            Arc::clone(&sizes),
            Arc::clone(&interactions),
        ));
        let events = tokio::spawn(run_events(
            events_rx,
            engine,
            visual,
            sizes,
            metrics,
            interactions,
        ));

        Self {
            events: events_tx,
            tasks: vec![autonomy, events],
        }
    }

    /// Inlet for pointer events.
    #[must_use]
    pub fn pointer(&self) -> mpsc::Sender<PointerEvent> {
        self.events.clone()
    }

    /// Abort both loops.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn apply_state(
    visual: &Mutex<PetVisual>,
    engine: &MotionEngine,
    sizes: &SharedSizes,
    state: PetState,
) {
    visual.lock().state = state;
    let height = sizes.read().get(state.sprite());
    engine.set_size(height, height);
}

async fn run_autonomy(
    engine: MotionEngine,
    visual: Arc<Mutex<PetVisual>>,
    sizes: SharedSizes,
    interactions: Arc<Mutex<Vec<InterruptToken>>>,
) {
    let mut rng = StdRng::from_entropy();
    loop {
        let pending: Vec<InterruptToken> = interactions.lock().drain(..).collect();
        if !pending.is_empty() {
            for mut token in pending {
                token.wait().await;
            }
            continue;
        }

        let nap = Duration::from_millis(rng.gen_range(IDLE_SLEEP_MIN_MS..=IDLE_SLEEP_MAX_MS));
        tokio::time::sleep(nap).await;
        if !interactions.lock().is_empty() {
            continue;
        }

        let offset = rng.gen_range(-WANDER_RANGE..=WANDER_RANGE);
        if offset.abs() <= WANDER_THRESHOLD {
            continue;
        }

        apply_state(&visual, &engine, &sizes, PetState::Walk);
        engine.walk(offset, 0.0).await;
        // A preempting drag already owns the state by now; only a walk that
        // ended on its own falls back to idle.
        let ended_idle = {
            let mut v = visual.lock();
            if v.state == PetState::Walk {
                v.state = PetState::Idle;
                true
            } else {
                false
            }
        };
        if ended_idle {
            let height = sizes.read().get(StateName::Idle);
            engine.set_size(height, height);
        }
    }
}

struct DragContext {
    handle: InterruptHandle,
    last: (f64, f64),
}

struct ThrowContext {
    task: JoinHandle<bool>,
    handle: InterruptHandle,
}

async fn run_events(
    mut events: mpsc::Receiver<PointerEvent>,
    engine: MotionEngine,
    visual: Arc<Mutex<PetVisual>>,
    sizes: SharedSizes,
    metrics: Arc<RwLock<LayoutMetrics>>,
    interactions: Arc<Mutex<Vec<InterruptToken>>>,
) {
    let mut rng = StdRng::from_entropy();
    let mut samples = VelocitySamples::default();
    let mut drag: Option<DragContext> = None;
    let mut hover: Option<InterruptHandle> = None;
    let mut linger: Option<JoinHandle<()>> = None;
    let mut throw: Option<ThrowContext> = None;

    loop {
        let event = if let Some(mut ctx) = throw.take() {
            tokio::select! {
                outcome = &mut ctx.task => {
                    ctx.handle.release();
                    // A preempted throw means something else owns the pet now.
                    if matches!(outcome, Ok(false)) {
                        apply_state(&visual, &engine, &sizes, PetState::Idle);
                    }
                    continue;
                }
                event = events.recv() => {
                    throw = Some(ctx);
                    event
                }
            }
        } else {
            events.recv().await
        };
        let Some(event) = event else { break };

        match event {
            PointerEvent::Enter => {
                if drag.is_some() || visual.lock().state == PetState::Throwing {
                    continue;
                }
                // Re-entering during the linger supersedes the pending hide.
                if let Some(task) = linger.take() {
                    task.abort();
                }
                let (handle, token) = interruption();
                engine.interrupt(token);
                hover = Some(handle);
                let mut v = visual.lock();
                v.hover_icon = true;
                v.state = PetState::Hovered;
            }
            PointerEvent::Leave => {
                let Some(handle) = hover.take() else { continue };
                // The icon and the pause both outlive the pointer by the
                // linger; hiding and releasing happen together.
                let delay =
                    Duration::from_millis(rng.gen_range(HOVER_LINGER_MIN_MS..=HOVER_LINGER_MAX_MS));
                let visual = Arc::clone(&visual);
                linger = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    {
                        let mut v = visual.lock();
                        v.hover_icon = false;
                        if v.state == PetState::Hovered {
                            v.state = PetState::Idle;
                        }
                    }
                    handle.release();
                }));
            }
            PointerEvent::Down { x, y } => {
                if drag.is_some() {
                    continue;
                }
                if let Some(handle) = hover.take() {
                    handle.release();
                }
                visual.lock().hover_icon = false;
                let (handle, token) = interruption();
                interactions.lock().push(token);
                engine.preempt();
                samples.clear();
                apply_state(&visual, &engine, &sizes, PetState::Dragging);
                follow_pointer(&engine, &metrics, x, y);
                drag = Some(DragContext { handle, last: (x, y) });
            }
            PointerEvent::Move { x, y } => {
                let Some(ctx) = drag.as_mut() else { continue };
                // Deltas go in position space: y flips from screen-down to up.
                samples.push(x - ctx.last.0, ctx.last.1 - y);
                ctx.last = (x, y);
                follow_pointer(&engine, &metrics, x, y);
            }
            PointerEvent::Up => {
                let Some(ctx) = drag.take() else { continue };
                apply_state(&visual, &engine, &sizes, PetState::Throwing);
                let seed = samples.seed();
                let thrower = engine.clone();
                throw = Some(ThrowContext {
                    task: tokio::spawn(async move { thrower.throw(seed).await }),
                    handle: ctx.handle,
                });
            }
        }
    }
}

/// Center the pet under the pointer, converted into position space.
fn follow_pointer(engine: &MotionEngine, metrics: &RwLock<LayoutMetrics>, x: f64, y: f64) {
    let m = *metrics.read();
    let (width, height) = engine.size();
    let area = PlayArea::for_pet(&m, height);
    let px = x - width / 2.0 - area.min_left;
    let py = m.viewport_height - y - height / 2.0 - area.min_bottom;
    engine.set_position(px, py);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup_in(width: f64, height: f64) -> (PetRuntime, MotionEngine, Arc<Mutex<PetVisual>>) {
        let metrics = Arc::new(RwLock::new(LayoutMetrics::unobstructed(width, height)));
        let engine = MotionEngine::new(Arc::clone(&metrics), 40.0, 40.0);
        let visual = Arc::new(Mutex::new(PetVisual::default()));
        let sizes = Arc::new(RwLock::new(StateSizes {
            idle: 40.0,
            walk: 40.0,
        }));
        let runtime = PetRuntime::spawn(engine.clone(), Arc::clone(&visual), sizes, metrics);
        (runtime, engine, visual)
    }

    fn setup() -> (PetRuntime, MotionEngine, Arc<Mutex<PetVisual>>) {
        setup_in(2000.0, 1000.0)
    }

    async fn wait_for_state(visual: &Mutex<PetVisual>, state: PetState) {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if visual.lock().state == state {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {state:?}"));
    }

    #[tokio::test]
    async fn test_hover_shows_icon_and_pauses() {
        tokio::time::pause();
        let (runtime, _engine, visual) = setup();
        let events = runtime.pointer();

        events.send(PointerEvent::Enter).await.unwrap();
        wait_for_state(&visual, PetState::Hovered).await;
        assert!(visual.lock().hover_icon);

        events.send(PointerEvent::Leave).await.unwrap();
        // The icon outlives the pointer by the linger (at least 200ms).
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(visual.lock().hover_icon, "icon lingers after leave");

        wait_for_state(&visual, PetState::Idle).await;
        assert!(!visual.lock().hover_icon);
        runtime.shutdown();
    }

    #[tokio::test]
    async fn test_drag_follows_pointer() {
        tokio::time::pause();
        let (runtime, engine, visual) = setup();
        let events = runtime.pointer();

        events.send(PointerEvent::Down { x: 500.0, y: 500.0 }).await.unwrap();
        wait_for_state(&visual, PetState::Dragging).await;
        // Centered under the pointer: x = 500 - 20, y = 1000 - 500 - 20.
        assert_eq!(engine.position(), (480.0, 480.0));

        events.send(PointerEvent::Move { x: 600.0, y: 400.0 }).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while engine.position() != (580.0, 580.0) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        runtime.shutdown();
    }

    #[tokio::test]
    async fn test_release_throws_then_idles() {
        tokio::time::pause();
        let (runtime, engine, visual) = setup();
        let events = runtime.pointer();

        events.send(PointerEvent::Down { x: 500.0, y: 900.0 }).await.unwrap();
        for step in 1..=5 {
            let x = 500.0 + f64::from(step) * 30.0;
            events.send(PointerEvent::Move { x, y: 900.0 }).await.unwrap();
        }
        events.send(PointerEvent::Up).await.unwrap();

        wait_for_state(&visual, PetState::Throwing).await;
        wait_for_state(&visual, PetState::Idle).await;
        let (x, y) = engine.position();
        assert_eq!(y, 0.0, "pet should rest on the floor after a throw");
        assert!(x > 630.0, "rightward fling should carry it further right");
        runtime.shutdown();
    }

    #[tokio::test]
    async fn test_pointer_down_preempts_throw() {
        tokio::time::pause();
        // A huge play area keeps the throw airborne for several seconds.
        let (runtime, _engine, visual) = setup_in(100_000.0, 50_000.0);
        let events = runtime.pointer();

        events.send(PointerEvent::Down { x: 500.0, y: 49_500.0 }).await.unwrap();
        for step in 1..=4 {
            let x = 500.0 + f64::from(step) * 140.0;
            events.send(PointerEvent::Move { x, y: 49_500.0 }).await.unwrap();
        }
        events.send(PointerEvent::Up).await.unwrap();
        wait_for_state(&visual, PetState::Throwing).await;

        let pressed = tokio::time::Instant::now();
        events.send(PointerEvent::Down { x: 700.0, y: 49_500.0 }).await.unwrap();
        wait_for_state(&visual, PetState::Dragging).await;
        assert!(
            pressed.elapsed() < Duration::from_secs(1),
            "a press must seize the pet mid-flight, not wait out the throw"
        );

        // The cancelled throw settles without yanking the pet back to idle.
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(visual.lock().state, PetState::Dragging);
        runtime.shutdown();
    }
}
