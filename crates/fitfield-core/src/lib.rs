//! # Core types for fitfield
//!
//! Small, host-agnostic building blocks shared by the widget crate and the
//! demo host:
//!
//! - `Size` / `Vec2` / `Rect`: plain f32 geometry. `Size::ceiled` is the
//!   rounding rule every cached measurement goes through.
//! - `Color`: sRGB u8 quadruple; `Color::TRANSPARENT` is what the caret is
//!   recolored to during the reflow workaround.
//! - `input`: pointer, key, text, and IME events the host loop translates
//!   platform events into. Pointer events carry a pressure stage so
//!   force-press capable devices can be distinguished from plain clicks.
//! - `UiQueue`: the single-threaded deferred task queue. A task posted
//!   during event dispatch runs after that dispatch completes:
//!
//! ```rust
//! use fitfield_core::UiQueue;
//!
//! let queue = UiQueue::new();
//! queue.post(|| log::debug!("runs on the next turn"));
//! queue.drain();
//! ```

pub mod color;
pub mod geometry;
pub mod input;
pub mod queue;

pub use color::*;
pub use geometry::*;
pub use queue::*;
