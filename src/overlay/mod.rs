//! The overlay controller core: shared state, render adapter, animation
//! driver, and hotkey dispatcher.

pub mod dispatch;
pub mod driver;
pub mod render;
pub mod state;

pub use dispatch::{CueSources, HotkeyAction};
pub use driver::{AnimKind, OverlayController, OverlaySettings, Timing, TICK_INTERVAL};
pub use render::{RenderAdapter, FILTER_CONTAINER, FILTER_CROP, FILTER_OPACITY};
pub use state::OverlayState;
