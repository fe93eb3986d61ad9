//! Request handler module
//!
//! Responsible for request routing dispatch and the page operations
//! behind each route.

pub mod pages;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
