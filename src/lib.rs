//! Storj Worker - Authenticated note storage over S3
//!
//! A small HTTP service that keeps text notes in an S3-compatible bucket
//! (Storj) and exposes them through a handful of JSON endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - liveness and storage location, no authentication
//! - `GET /listNotes` - keys in the bucket
//! - `POST /readNote` - content of one note
//! - `POST /writeNote` - create or overwrite a note
//!
//! The note endpoints require `Authorization: Bearer <BACKEND_TOKEN>` when a
//! token is configured.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod storage;

pub use config::WorkerConfig;
pub use error::{Error, Result};

