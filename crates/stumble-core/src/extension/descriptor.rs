//! Static, `Copy` handles to extensions.

use super::Extension;

/// A static, `Copy` descriptor that identifies and instantiates an extension.
///
/// Descriptors can be stored in `static` items and tables, which lets a
/// runtime decide whether a name refers to a known extension without
/// building it.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionDescriptor {
    /// Extension handle (used in logs, `needs` lists and settings lookup).
    pub handle: &'static str,

    /// Factory function that creates the live [`Extension`].
    pub create: fn() -> Extension,
}

impl ExtensionDescriptor {
    pub const fn new(handle: &'static str, create: fn() -> Extension) -> Self {
        Self { handle, create }
    }

    /// Creates the live extension from the factory function.
    #[inline]
    pub fn instantiate(&self) -> Extension {
        (self.create)()
    }
}
