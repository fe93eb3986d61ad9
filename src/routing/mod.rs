//! Routing module
//!
//! Provides the fixed route table of the page editor:
//! - Literal routes: `/`, `/menu`, `/new`
//! - Page routes: `/view|edit|save|delete/<title>`

mod matcher;

pub use matcher::{match_route, PageRoute, Route, Verb};
