//! roampets-surface: the render-surface runtime for desktop pets.
//!
//! A surface discovers its host through the workspace-derived port, receives
//! the pet snapshot and sprite assets over a dedicated session, and runs each
//! pet's autonomy and interaction loops locally. Actual pixel output is left
//! to the embedding shell, which reads [`interaction::PetVisual`] and the
//! motion engine's rendered positions.
//!
//! Modules:
//! - [`interrupt`]: cancel and interruption primitives.
//! - [`bounds`]: play-area geometry and debounced layout updates.
//! - [`motion`]: walks, throws, and the per-pet motion engine.
//! - [`assets`]: session-scoped store of delivered sprites and icons.
//! - [`interaction`]: autonomy loop and pointer handling.
//! - [`registry`]: snapshot reconciliation and pet lifecycle.
//! - [`client`]: discovery and session connection to the host.

#![deny(missing_docs)]

pub mod assets;
pub mod bounds;
pub mod client;
pub mod interaction;
pub mod interrupt;
pub mod motion;
pub mod registry;

pub use assets::AssetStore;
pub use bounds::{LayoutMetrics, PlayArea};
pub use client::SurfaceClient;
pub use interaction::{PetRuntime, PetState, PetVisual, PointerEvent};
pub use motion::{Facing, MotionEngine, VelocitySamples};
pub use registry::PetRegistry;
