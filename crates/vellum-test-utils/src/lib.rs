//! Test utilities for the Vellum 2D renderer.
//!
//! The main components are:
//!
//! - [`DeviceCall`] / [`CallLog`] - a shared, inspectable record of device calls
//! - `MockDevice2D` - a [`RenderDevice2D`](vellum_render::RenderDevice2D) that
//!   records instead of drawing (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use vellum_render::{Color, FRect, Renderer2D, Renderer2DConfig};
//! use vellum_test_utils::{DeviceCall, MockDevice2D};
//!
//! let device = MockDevice2D::new();
//! let log = device.log();
//! let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());
//!
//! renderer.add_rect(FRect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
//! renderer.flush();
//!
//! assert_eq!(log.draw_indexed_calls().len(), 1);
//! # }
//! ```
//!
//! # Interior Mutability
//!
//! The renderer takes ownership of its device, so the log is shared through
//! an `Arc<parking_lot::Mutex<..>>`. Tests keep a [`CallLog`] clone and read
//! it after the renderer has run.

mod call_log;
#[cfg(feature = "mock")]
mod mock_device;

pub use call_log::*;
#[cfg(feature = "mock")]
pub use mock_device::*;
