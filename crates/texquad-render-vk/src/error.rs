use ash::vk;
use thiserror::Error;

/// Requested layout change has no row in the transition table.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unsupported layout transition {old:?} -> {new:?}")]
    Unsupported {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface reports no formats")]
    NoFormats,
    #[error("surface reports no present modes")]
    NoPresentModes,
}
