//! # CLI Layer
//!
//! - [`setup`]: clap argument definitions
//! - [`commands`]: opens the portal and dispatches each subcommand to [`portalapp::api::PortalApi`]
//! - [`render`]: turns a [`portalapp::commands::CmdResult`] into terminal text or JSON
//! - [`styles`]: the terminal palette

pub mod commands;
pub mod render;
pub mod setup;
pub mod styles;

pub use commands::run;
