// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::time::Duration;

pub const SPIN_DEGREES_PER_SEC: f32 = 90.0;

const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);
const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 10.0;

/// Uniform block written once per frame: `layout(set = 0, binding = 0)`.
///
/// Column-major `mat4`s, matching std140 without padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Transform {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    /// Quad spinning about +Z, seen from above at an angle.
    pub fn spinning(elapsed: Duration, aspect: f32) -> Self {
        let angle = (elapsed.as_secs_f32() * SPIN_DEGREES_PER_SEC).to_radians();
        let model = Mat4::from_rotation_z(angle);
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Z);

        let mut proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        // Vulkan clip space has Y pointing down.
        proj.y_axis.y = -proj.y_axis.y;

        Self { model, view, proj }
    }
}

/// Width over height; a degenerate height yields a square aspect.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn model_starts_unrotated() {
        let t = Transform::spinning(Duration::ZERO, 1.0);
        assert!(t.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn one_second_turns_quarter() {
        let t = Transform::spinning(Duration::from_secs(1), 1.0);
        let x = t.model.transform_vector3(Vec3::X);
        assert!(close(x, Vec3::Y), "got {x:?}");
    }

    #[test]
    fn view_moves_eye_to_origin() {
        let t = Transform::spinning(Duration::ZERO, 1.0);
        assert!(close(t.view.transform_point3(EYE), Vec3::ZERO));
    }

    #[test]
    fn projection_is_flipped_for_vulkan() {
        let t = Transform::spinning(Duration::ZERO, 4.0 / 3.0);
        assert!(t.proj.y_axis.y < 0.0);
        assert!(t.proj.x_axis.x > 0.0);
    }

    #[test]
    fn block_is_three_mat4() {
        let t = Transform::default();
        assert_eq!(bytemuck::bytes_of(&t).len(), 3 * 64);
    }

    #[test]
    fn aspect_handles_zero_height() {
        assert_eq!(aspect_ratio(800, 600), 800.0 / 600.0);
        assert_eq!(aspect_ratio(800, 0), 1.0);
    }
}
