// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;
use thiserror::Error;

/// Per-frame results that end the run. Out-of-date and suboptimal are not errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("acquire_next_image failed: {0}")]
    Acquire(String),
    #[error("queue_submit failed: {0}")]
    Submit(String),
    #[error("queue_present failed: {0}")]
    Present(String),
    #[error("{what} did not complete within {timeout:?}")]
    Timeout { what: &'static str, timeout: Duration },
}
