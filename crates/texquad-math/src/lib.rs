// SPDX-License-Identifier: CEPL-1.0
//! Math and geometry shared between the frame loop and the Vulkan backend.

mod geometry;
mod transform;

pub use geometry::{Vertex, QUAD_INDICES, QUAD_VERTICES};
pub use transform::{aspect_ratio, Transform, SPIN_DEGREES_PER_SEC};

pub use glam;
