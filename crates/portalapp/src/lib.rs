//! # portalapp
//!
//! Persistence, catalog and recovery core of a locally stored quality-document
//! portal. A static manifest describes chapters and their published documents;
//! users add their own uploads on top. This crate keeps those uploads safe across
//! sessions using two storage facilities of very different capacity, merges them
//! with the manifest into one catalog, and rebuilds a consistent registry from
//! whatever storage still holds after failures.
//!
//! ## Architecture
//!
//! ```text
//! client (crates/portal)
//!     │
//!     ▼
//! api::PortalApi ──► commands::* ──► registry ──► store::CapacityStore ──► backends
//!                        │               │
//!                        ▼               └──► notice (failures the user sees)
//!                     catalog ◄── manifest
//! ```
//!
//! - [`store`]: backend traits, in-memory and on-disk implementations, and the
//!   capacity-aware store that splits snapshots across them.
//! - [`snapshot`]: versioned on-storage formats.
//! - [`registry`]: the in-memory set of uploads, with serialized background flushes.
//! - [`recovery`]: startup reconciliation and background blob patching.
//! - [`manifest`] and [`catalog`]: the static taxonomy and its merge with uploads.
//! - [`commands`] and [`api`]: user actions and the application context.
//!
//! ## Failure Model
//!
//! Once a mutation is applied in memory it is never rolled back. Storage failures
//! become [`notice::Notice`]s and log events; the metadata cache is written
//! synchronously on every mutation so a later session can at least list what
//! was uploaded.

pub mod api;
pub mod catalog;
pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod favorites;
pub mod init;
pub mod manifest;
pub mod model;
pub mod notice;
pub mod recovery;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod tags;

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures;
