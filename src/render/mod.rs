//! GPU side of the frame loop.

mod native;

pub use native::Renderer;
