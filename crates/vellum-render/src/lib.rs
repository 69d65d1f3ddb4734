//! Vellum Render
//!
//! A deferred 2D command pipeline. Shape calls write geometry into a
//! [`Vertex2DBatch`] and record the render state they need in a
//! [`CommandManager`], which coalesces redundant state changes and merges
//! consecutive draws that share state. Once per frame [`Renderer2D::flush`]
//! replays the command list against a [`RenderDevice2D`].
//!
//! ```ignore
//! use vellum_render::*;
//!
//! let context = GraphicsContext::new_owned_sync()?;
//! let device = WgpuDevice2D::new(context, wgpu::TextureFormat::Bgra8UnormSrgb, BatchConfig::default())?;
//! let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());
//!
//! renderer.device_mut().begin_frame(surface_view, size, Some(Color::BLACK));
//! renderer.add_rect(FRect::new(10.0, 10.0, 100.0, 50.0), Color::RED);
//! renderer.add_circle(Vec2::new(200.0, 200.0), 40.0, Color::CYAN);
//! renderer.flush();
//! renderer.device_mut().submit();
//! ```

mod batch;
mod builder;
mod color;
mod command;
mod context;
mod device;
mod error;
mod renderer;
mod resource;
mod state;
mod vertex;
mod wgpu_device;

pub use batch::*;
pub use color::*;
pub use command::*;
pub use context::*;
pub use device::*;
pub use error::*;
pub use renderer::*;
pub use resource::*;
pub use state::*;
pub use vertex::*;
pub use wgpu_device::*;

pub use vellum_core::geometry::{FRect, IRect, Rect, Size};
pub use vellum_core::math::{Affine2, UVec2, Vec2, Vec4};

// Re-export wgpu so downstream crates use the same version.
pub use wgpu;
