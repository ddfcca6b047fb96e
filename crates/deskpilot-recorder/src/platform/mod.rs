//! Platform input hooks for recording

#[cfg(feature = "native")]
pub mod native;

#[cfg(not(feature = "native"))]
pub mod unsupported;

// Re-export the current platform
#[cfg(feature = "native")]
pub use native as current;

#[cfg(not(feature = "native"))]
pub use unsupported as current;
