//! # Storage Layer
//!
//! Uploads are persisted across two storage facilities with very different
//! characteristics:
//!
//! 1. **Large-quota** ([`backend::ObjectBackend`]): asynchronous, effectively
//!    unbounded. Holds the full snapshot, blobs included.
//! 2. **Small-quota** ([`backend::KeyValueBackend`]): synchronous, a few megabytes.
//!    Holds the metadata projection of the snapshot, favorites, and whatever legacy
//!    data older builds left behind.
//!
//! [`capacity::CapacityStore`] is the only component that talks to the backends
//! directly. Everything else (registry, recovery, favorites) goes through it.
//!
//! ## Rules
//!
//! - Blobs never go to the small-quota backend. A handful of PDFs is enough to
//!   exhaust it, and the write then fails silently for everything after.
//! - Reads prefer full fidelity: large-quota snapshot, then a legacy full snapshot
//!   in the small-quota backend, then metadata only.
//! - Removals are best-effort on both backends and succeed if either does.
//!
//! ## Implementations
//!
//! - [`mem_backend`]: in-memory backends with quota, availability and
//!   failure switches. Used by tests and by ephemeral sessions.
//! - [`fs_backend`]: on-disk backends.
//!
//! ## Storage Layout (on disk)
//!
//! ```text
//! <data dir>/
//! ├── objects/                      # large-quota, one file per key
//! │   └── uploadedDocuments.json
//! └── kv/
//!     └── kv.json                   # small-quota map: <key>.meta, <key>.favorites, ...
//! ```

pub mod backend;
pub mod capacity;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::{BackendKind, KeyValueBackend, ObjectBackend, Usage};
pub use capacity::{CapacityReport, CapacityStore, Loaded};
