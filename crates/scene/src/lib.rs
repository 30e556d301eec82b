//! Scene data consumed by the geometry pass.
//!
//! # Invariants
//! - Drawables enumerate in insertion order.
//! - Rendering only reads the world; all mutation goes through explicit operations.

pub mod camera;
pub mod world;

pub use camera::Camera;
pub use world::{DrawItem, Drawable, DrawableId, World};

pub fn crate_info() -> &'static str {
    "lumen-scene v0.1.0"
}
