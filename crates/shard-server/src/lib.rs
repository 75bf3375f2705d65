//! HTTP server for the shard remote protocol
//!
//! Exposes existence probes, uploads, and downloads for blocks and
//! manifests over the same fan-out store layout the client uses locally.
//! The server performs no hash verification on PUT; consumers verify on
//! GET by recomputing SHA-256 against the identity in the URL.

pub mod server;

pub use server::{app, serve, ServerState};
