//! HTTP protocol layer module
//!
//! Response builders and URL/form encoding, decoupled from page handling.

pub mod form;
pub mod response;

// Re-export commonly used types
pub use form::{encode_path_segment, percent_decode_path, FormValues, RequestForm};
pub use response::{
    build_400_response, build_404_response, build_413_response, build_500_response,
    build_html_response, build_redirect_response,
};
