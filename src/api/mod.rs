//! HTTP API Module
//!
//! Provides the note endpoints and bearer-token authentication.

mod auth;
mod http;

pub use auth::check_auth;
pub use http::{
    AppState, ErrorResponse, HealthResponse, HttpServer, ListNotesResponse, ReadNoteRequest,
    ReadNoteResponse, WriteNoteRequest, WriteNoteResponse,
};
