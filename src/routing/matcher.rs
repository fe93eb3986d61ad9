//! Route matching module
//!
//! Maps a decoded request path onto the fixed route table. Page routes have
//! the shape `/<verb>/<title>` where the title is one or more ASCII
//! letters, digits or spaces. This grammar is the only title validation;
//! the page store trusts whatever passes it.

/// Operation bound to a page route verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    View,
    Edit,
    Save,
    Delete,
}

impl Verb {
    pub const ALL: [Self; 4] = [Self::View, Self::Edit, Self::Save, Self::Delete];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Save => "save",
            Self::Delete => "delete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == s)
    }
}

/// A matched `/<verb>/<title>` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub verb: Verb,
    pub title: String,
}

/// Outcome of matching a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`
    Root,
    /// `/menu`
    Menu,
    /// `/new`
    New,
    Page(PageRoute),
    NotFound,
}

/// Whether `title` is a legal page title
pub fn is_valid_title(title: &str) -> bool {
    !title.is_empty() && title.bytes().all(|b| b.is_ascii_alphanumeric() || b == b' ')
}

/// Match a page route on an already decoded path
pub fn match_page_route(path: &str) -> Option<PageRoute> {
    let rest = path.strip_prefix('/')?;
    let (verb, title) = rest.split_once('/')?;
    let verb = Verb::parse(verb)?;
    is_valid_title(title).then(|| PageRoute {
        verb,
        title: title.to_string(),
    })
}

/// Match a decoded path against the whole route table
pub fn match_route(path: &str) -> Route {
    match path {
        "/" => Route::Root,
        "/menu" => Route::Menu,
        "/new" => Route::New,
        _ => match_page_route(path).map_or(Route::NotFound, Route::Page),
    }
}
