//! PyPI access for PyConflict
//!
//! This crate implements [`pyconflict_core::PackageSource`] over the PyPI
//! JSON API with retry logic, backed by an optional on-disk response cache.

pub mod api;
pub mod cache;
pub mod client;

// Re-export main types
pub use api::{PackageInfo, PackageResponse, ReleaseFile};
pub use cache::{CacheEntry, CacheStats, DiskCache, DEFAULT_MAX_SIZE_MB};
pub use client::{ClientConfig, PypiClient, RetryConfig, DEFAULT_CACHE_TTL, DEFAULT_INDEX_URL};
