//! ash implementation of [`texquad_render::PresentBackend`]: instance and
//! device setup, the swapchain stages and the per-slot frame resources.

mod backend;
mod context;
mod error;
mod frames;
mod memory;
mod one_shot;
mod pipeline;
mod selection;
mod shader;
mod swapchain;
mod texture;
mod transition;

pub use backend::{VkBackend, VkOptions};
pub use error::{SurfaceError, TransitionError};
pub use selection::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
pub use texture::TexturePixels;
pub use transition::{LayoutTransition, LAYOUT_TRANSITIONS};
