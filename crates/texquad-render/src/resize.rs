// SPDX-License-Identifier: CEPL-1.0
use std::{cell::Cell, rc::Rc};

/// Resize request owned by the presenter.
///
/// The event layer only ever sees a [`ResizeNotifier`], which can raise the
/// flag but not read or clear it.
#[derive(Debug, Default)]
pub struct ResizeFlag(Rc<Cell<bool>>);

/// Raise-only handle to a [`ResizeFlag`].
#[derive(Clone, Debug)]
pub struct ResizeNotifier(Rc<Cell<bool>>);

impl ResizeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifier(&self) -> ResizeNotifier {
        ResizeNotifier(Rc::clone(&self.0))
    }

    pub fn is_raised(&self) -> bool {
        self.0.get()
    }

    /// Returns the current state and clears it.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

impl ResizeNotifier {
    pub fn notify(&self) {
        self.0.set(true);
    }
}
