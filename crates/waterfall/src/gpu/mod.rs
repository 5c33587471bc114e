//! wgpu backend.
//!
//! - `context` owns instance/device/surface wiring and rebuilds the
//!   swapchain when the window resizes or the surface is lost.
//! - `resources` allocates the ring texture, gradient table, draw surface,
//!   per-slot vertex buffers and both pipelines once at start-up.
//! - `backend` drives them through the [`WaterfallBackend`](crate::backend::WaterfallBackend) calls.

mod backend;
mod context;
mod resources;

pub use backend::GpuBackend;
