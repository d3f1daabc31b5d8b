//! API routes and handlers

mod analyze;
pub mod internal;
mod models;
mod payload;
mod rewrite;
mod router;

pub use router::create_router;
