//! Host-specific implementations of the platform traits

pub mod linux;
