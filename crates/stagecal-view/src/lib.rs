//! Display-side coordinate handling.
//!
//! Machine coordinates reach the screen in three stages:
//!
//! ```text
//! machine (mm) ──(− reference)──► relative mm ──M──► image pixel ──zoom, pan──► screen
//! ```
//!
//! - [`CoordinateTransformChain`] owns `M` and its cached inverse,
//! - [`ScreenTransform`] holds the view's zoom and pan,
//! - [`primitive`] decides which overlay batches are worth drawing.
//!
//! The reference machine position is passed to every call; nothing here
//! tracks the stage.

mod chain;
pub mod primitive;
mod screen;

pub use chain::CoordinateTransformChain;
pub use primitive::{DisplayBounds, Primitive, PrimitiveKind, ProjectedPrimitive};
pub use screen::ScreenTransform;
