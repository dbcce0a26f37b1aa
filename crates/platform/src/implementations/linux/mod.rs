//! Linux platform implementation

pub mod process;

/// Linux platform implementation
pub struct LinuxPlatform;

impl LinuxPlatform {
    /// Create a new Linux platform instance
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new() -> crate::core::Platform {
        crate::core::Platform::new(Box::new(process::LinuxProcessOperations::new()))
    }
}
