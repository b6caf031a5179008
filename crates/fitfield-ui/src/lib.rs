//! # Fitting text field
//!
//! A single-line text-input widget whose preferred width tracks its content
//! or, when the content is empty, its placeholder. The widget owns an
//! explicit editing state: it enters editing on user intent (double-click,
//! force click, `begin_editing`) rather than on every focus change, and it
//! leaves editing asynchronously: the state flip is posted to the host's
//! `UiQueue` and runs after the triggering event dispatch completes.
//!
//! The host event loop drives the widget through plain method calls:
//!
//! - translate platform input into `insert_text` / `delete_backward` /
//!   IME composition calls while an edit session is live;
//! - grant focus when `take_focus_request` reports one;
//! - answer layout queries with `intrinsic_size()`.
//!
//! Gesture disambiguation lives in [`gestures::GestureArena`]: recognizers
//! are registered with a click count and explicit exclusion declarations, so
//! a double-click is never misdelivered as two single clicks.

pub mod editor;
pub mod gestures;
pub mod textfield;

pub use editor::LiveEditor;
pub use gestures::{GestureArena, GestureError, RecognizerId};
pub use textfield::{EngineMeasure, FieldHandle, FittingTextField, Measure, TF_FONT_PX};
