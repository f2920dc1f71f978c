//! Pet Motion Engine
//!
//! Positions are offsets from the play area's bottom-left corner, y pointing
//! up. A walk is a sequence of capped steps, each rendered as a timed glide;
//! a throw is tick-integrated ballistics with wall bounces. Exactly one
//! motion runs per pet at a time; [`MotionEngine::preempt`] tears the current
//! one down and [`MotionEngine::interrupt`] pauses it until released.
//!
//! Locks are never held across an await: every await sits between short
//! critical sections, and the glide abstraction lets readers compute the
//! rendered position at any instant without the motion task's involvement.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use crate::bounds::{LayoutMetrics, PlayArea};
use crate::interrupt::{cancel_pair, CancelHandle, InterruptToken};

/// Largest horizontal distance one walk step may cover, in pixels.
pub const STEP_CAP_X: f64 = 50.0;
/// Largest vertical distance one walk step may cover, in pixels.
pub const STEP_CAP_Y: f64 = 30.0;
/// Downward acceleration per throw tick.
pub const GRAVITY: f64 = -0.6;
/// Velocity retained per throw tick.
pub const AIR_DRAG: f64 = 0.98;
/// Velocity retained (and reversed) on a wall bounce.
pub const BOUNCE: f64 = 0.3;
/// Below this speed on both axes, a grounded throw comes to rest.
pub const REST_SPEED: f64 = 0.5;
/// Throw seed velocity is clamped to this magnitude per axis.
pub const MAX_INITIAL_SPEED: f64 = 150.0;
/// Throw integration step.
pub const THROW_TICK: Duration = Duration::from_millis(10);
/// A throw that has not rested after this many ticks is abandoned.
const MAX_THROW_TICKS: u32 = 6000;

/// Which way the sprite faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facing {
    /// Sprite mirrored.
    Left,
    /// Sprite in its natural orientation.
    Right,
}

/// One in-flight glide from one point to another.
#[derive(Clone, Copy, Debug)]
struct Glide {
    from: (f64, f64),
    to: (f64, f64),
    started: Instant,
    duration: Duration,
}

impl Glide {
    fn at(&self, now: Instant) -> (f64, f64) {
        if self.duration.is_zero() {
            return self.to;
        }
        let t = (now.saturating_duration_since(self.started).as_secs_f64()
            / self.duration.as_secs_f64())
        .clamp(0.0, 1.0);
        (
            self.from.0 + (self.to.0 - self.from.0) * t,
            self.from.1 + (self.to.1 - self.from.1) * t,
        )
    }
}

struct MotionState {
    position: (f64, f64),
    glide: Option<Glide>,
    facing: Facing,
    queue: VecDeque<InterruptToken>,
    cancel: Option<CancelHandle>,
    width: f64,
    height: f64,
}

impl MotionState {
    fn rendered_at(&self, now: Instant) -> (f64, f64) {
        self.glide.map_or(self.position, |g| g.at(now))
    }

    /// Stop rendering motion: snap the stored position from the live glide,
    /// drop the glide, reset facing, and re-clamp.
    fn snap_here(&mut self, metrics: &LayoutMetrics) {
        let now = Instant::now();
        if let Some(glide) = self.glide.take() {
            self.position = glide.at(now);
        }
        self.facing = Facing::Right;
        let area = PlayArea::for_pet(metrics, self.height);
        let (cx, cy, _) = area.clamp(self.position.0, self.position.1, self.width);
        self.position = (cx, cy);
    }
}

/// Shared motion state for one pet.
#[derive(Clone)]
pub struct MotionEngine {
    inner: Arc<Mutex<MotionState>>,
    metrics: Arc<RwLock<LayoutMetrics>>,
}

enum WalkPhase {
    Done,
    Step(Duration),
}

impl MotionEngine {
    /// Create an engine for a pet of the given size, parked at the origin.
    #[must_use]
    pub fn new(metrics: Arc<RwLock<LayoutMetrics>>, width: f64, height: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MotionState {
                position: (0.0, 0.0),
                glide: None,
                facing: Facing::Right,
                queue: VecDeque::new(),
                cancel: None,
                width,
                height,
            })),
            metrics,
        }
    }

    /// Logical target position.
    #[must_use]
    pub fn position(&self) -> (f64, f64) {
        self.inner.lock().position
    }

    /// Position as currently rendered, mid-glide included.
    #[must_use]
    pub fn rendered(&self) -> (f64, f64) {
        self.inner.lock().rendered_at(Instant::now())
    }

    /// Current sprite orientation.
    #[must_use]
    pub fn facing(&self) -> Facing {
        self.inner.lock().facing
    }

    /// Current rendered size as (width, height).
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        let st = self.inner.lock();
        (st.width, st.height)
    }

    /// Update the pet's rendered size and re-clamp.
    pub fn set_size(&self, width: f64, height: f64) {
        {
            let mut st = self.inner.lock();
            st.width = width;
            st.height = height;
        }
        self.clamp_now();
    }

    /// Place the pet directly (pointer following during a drag).
    pub fn set_position(&self, x: f64, y: f64) {
        let mut st = self.inner.lock();
        st.glide = None;
        let area = PlayArea::for_pet(&self.metrics.read(), st.height);
        let (cx, cy, _) = area.clamp(x, y, st.width);
        st.position = (cx, cy);
    }

    /// Re-clamp against the current play area. If the pet was out of bounds,
    /// any glide is discarded and the position snapped inside. Returns whether
    /// a violation was corrected; calling again right away is a no-op.
    pub fn clamp_now(&self) -> bool {
        let mut st = self.inner.lock();
        let now = Instant::now();
        let rendered = st.rendered_at(now);
        let area = PlayArea::for_pet(&self.metrics.read(), st.height);
        let (cx, cy, violated) = area.clamp(rendered.0, rendered.1, st.width);
        if violated {
            st.glide = None;
            st.position = (cx, cy);
        }
        violated
    }

    /// Queue an interruption: rendering freezes where the pet is right now,
    /// and the current (or next) walk pauses before its next step until the
    /// token is released.
    pub fn interrupt(&self, token: InterruptToken) {
        let mut st = self.inner.lock();
        st.queue.push_back(token);
        st.snap_here(&self.metrics.read());
    }

    /// Cancel the running motion, clear pending interruptions, and snap the
    /// position to wherever the pet is rendered right now.
    pub fn preempt(&self) {
        let mut st = self.inner.lock();
        if let Some(handle) = st.cancel.take() {
            handle.request();
        }
        st.queue.clear();
        st.snap_here(&self.metrics.read());
    }

    /// Walk by the given offset, step by capped step.
    ///
    /// The destination is fixed up front (clamped into the play area); each
    /// iteration recomputes what remains from the rendered position, so an
    /// interruption that moved the pet does not desynchronize the walk. The
    /// walk ends naturally when the remainder is below half a step cap on
    /// both axes; a zero-length walk ends before the first step.
    ///
    /// Returns `true` iff the walk was preempted.
    pub async fn walk(&self, dx: f64, dy: f64) -> bool {
        let (handle, mut cancel) = cancel_pair();
        let dest = {
            let mut st = self.inner.lock();
            st.cancel = Some(handle);
            let area = PlayArea::for_pet(&self.metrics.read(), st.height);
            let (x, y, _) = area.clamp(st.position.0 + dx, st.position.1 + dy, st.width);
            (x, y)
        };

        loop {
            if cancel.is_cancelled() {
                return true;
            }

            let pending: Vec<InterruptToken> = {
                let mut st = self.inner.lock();
                st.queue.drain(..).collect()
            };
            if !pending.is_empty() {
                for mut token in pending {
                    tokio::select! {
                        () = token.wait() => {}
                        () = cancel.cancelled() => return true,
                    }
                }
                // Remaining distance is stale after a pause.
                continue;
            }

            let phase = {
                let mut st = self.inner.lock();
                let now = Instant::now();
                let rendered = st.rendered_at(now);
                let remaining = (dest.0 - rendered.0, dest.1 - rendered.1);

                if remaining.0.abs() < STEP_CAP_X / 2.0 && remaining.1.abs() < STEP_CAP_Y / 2.0 {
                    st.glide = None;
                    st.position = rendered;
                    st.cancel = None;
                    WalkPhase::Done
                } else {
                    let step = (
                        remaining.0.clamp(-STEP_CAP_X, STEP_CAP_X),
                        remaining.1.clamp(-STEP_CAP_Y, STEP_CAP_Y),
                    );
                    if step.0 < 0.0 {
                        st.facing = Facing::Left;
                    } else if step.0 > 0.0 {
                        st.facing = Facing::Right;
                    }

                    let secs = if step.0 != 0.0 {
                        step.0.abs() / STEP_CAP_X
                    } else {
                        step.1.abs() / STEP_CAP_Y
                    };
                    let duration = Duration::from_secs_f64(secs);

                    let area = PlayArea::for_pet(&self.metrics.read(), st.height);
                    let (tx, ty, _) =
                        area.clamp(rendered.0 + step.0, rendered.1 + step.1, st.width);
                    if (tx, ty) == rendered {
                        // The play area shrank under us and the destination is
                        // unreachable; walking in place forever helps nobody.
                        st.glide = None;
                        st.position = rendered;
                        st.cancel = None;
                        WalkPhase::Done
                    } else {
                        st.position = (tx, ty);
                        st.glide = Some(Glide {
                            from: rendered,
                            to: (tx, ty),
                            started: now,
                            duration,
                        });
                        WalkPhase::Step(duration)
                    }
                }
            };

            match phase {
                WalkPhase::Done => return false,
                WalkPhase::Step(duration) => {
                    tokio::select! {
                        () = tokio::time::sleep(duration) => {
                            self.inner.lock().glide = None;
                        }
                        () = cancel.cancelled() => return true,
                    }
                }
            }
        }
    }

    /// Ballistic throw from the current rendered position.
    ///
    /// Integrates at a fixed tick until the pet rests on the floor, the
    /// motion is preempted, or the safety bound trips.
    ///
    /// Returns `true` iff the throw was preempted.
    pub async fn throw(&self, seed: (f64, f64)) -> bool {
        let (handle, mut cancel) = cancel_pair();
        {
            let mut st = self.inner.lock();
            let now = Instant::now();
            if let Some(glide) = st.glide.take() {
                st.position = glide.at(now);
            }
            st.cancel = Some(handle);
            if seed.0 < 0.0 {
                st.facing = Facing::Left;
            } else if seed.0 > 0.0 {
                st.facing = Facing::Right;
            }
        }

        let (mut vx, mut vy) = seed;
        let mut interval = tokio::time::interval(THROW_TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for tick in 0..=MAX_THROW_TICKS {
            tokio::select! {
                _ = interval.tick() => {}
                () = cancel.cancelled() => return true,
            }

            let rested = {
                let mut st = self.inner.lock();
                let area = PlayArea::for_pet(&self.metrics.read(), st.height);
                let span = (area.span_x(st.width), area.span_y());

                vy += GRAVITY;
                let (mut x, mut y) = (st.position.0 + vx, st.position.1 + vy);
                if x < 0.0 {
                    x = 0.0;
                    vx = -vx * BOUNCE;
                } else if x > span.0 {
                    x = span.0;
                    vx = -vx * BOUNCE;
                }
                if y < 0.0 {
                    y = 0.0;
                    vy = -vy * BOUNCE;
                } else if y > span.1 {
                    y = span.1;
                    vy = -vy * BOUNCE;
                }
                vx *= AIR_DRAG;
                vy *= AIR_DRAG;
                // Bounces reverse travel; the sprite flips with it.
                if vx < 0.0 {
                    st.facing = Facing::Left;
                } else if vx > 0.0 {
                    st.facing = Facing::Right;
                }
                st.position = (x, y);

                let rested = vx.abs() < REST_SPEED && vy.abs() < REST_SPEED && y == 0.0;
                if rested {
                    st.cancel = None;
                }
                rested
            };
            if rested {
                return false;
            }
            if tick == MAX_THROW_TICKS {
                tracing::warn!("throw did not settle within the tick bound, landing it");
                self.inner.lock().cancel = None;
                return false;
            }
        }
        false
    }
}

/// Ring buffer of recent pointer deltas, used to seed a throw.
#[derive(Debug, Default)]
pub struct VelocitySamples {
    deltas: VecDeque<(f64, f64)>,
}

/// Pointer deltas retained while dragging.
const VELOCITY_WINDOW: usize = 7;
/// Most recent deltas averaged into the throw seed.
const SEED_WINDOW: usize = 3;

impl VelocitySamples {
    /// Record one pointer delta.
    pub fn push(&mut self, dx: f64, dy: f64) {
        if self.deltas.len() == VELOCITY_WINDOW {
            self.deltas.pop_front();
        }
        self.deltas.push_back((dx, dy));
    }

    /// Forget everything (a new drag started).
    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    /// Seed velocity: the mean of the most recent deltas, clamped per axis.
    #[must_use]
    pub fn seed(&self) -> (f64, f64) {
        let recent: Vec<_> = self.deltas.iter().rev().take(SEED_WINDOW).collect();
        if recent.is_empty() {
            return (0.0, 0.0);
        }
        let n = recent.len() as f64;
        let sx: f64 = recent.iter().map(|d| d.0).sum();
        let sy: f64 = recent.iter().map(|d| d.1).sum();
        (
            (sx / n).clamp(-MAX_INITIAL_SPEED, MAX_INITIAL_SPEED),
            (sy / n).clamp(-MAX_INITIAL_SPEED, MAX_INITIAL_SPEED),
        )
    }
}
