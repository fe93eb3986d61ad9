//! Page template module
//!
//! A named set of HTML templates, loaded once at startup and shared
//! read-only by all requests. Handlers only see the [`Render`] trait so a
//! stub renderer can stand in for the real set.
//!
//! Templates are Jinja2 via minijinja. `.html` names are auto-escaped and
//! titles placed in URLs go through the `urlencode` filter. Page templates
//! see `title` and `body`, the menu sees `titles`.

use crate::store::Page;
use minijinja::{context, path_loader, Environment, UndefinedBehavior, Value};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// The templates every renderer must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Root,
    Menu,
    View,
    Edit,
    Ok,
}

impl TemplateName {
    pub const ALL: [Self; 5] = [Self::Root, Self::Menu, Self::View, Self::Edit, Self::Ok];

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Root => "root.html",
            Self::Menu => "menu.html",
            Self::View => "view.html",
            Self::Edit => "edit.html",
            Self::Ok => "ok.html",
        }
    }

    const fn builtin_source(self) -> &'static str {
        match self {
            Self::Root => include_str!("html/root.html"),
            Self::Menu => include_str!("html/menu.html"),
            Self::View => include_str!("html/view.html"),
            Self::Edit => include_str!("html/edit.html"),
            Self::Ok => include_str!("html/ok.html"),
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Data handed to a template
#[derive(Debug, Clone, Copy)]
pub enum RenderData<'a> {
    None,
    Page(&'a Page),
    Titles(&'a [String]),
}

impl RenderData<'_> {
    fn context(self) -> Value {
        match self {
            Self::None => context!(),
            Self::Page(page) => context! {
                title => &page.title,
                // Bodies are opaque bytes; invalid UTF-8 is shown lossily
                body => String::from_utf8_lossy(&page.body),
            },
            Self::Titles(titles) => context! { titles => titles },
        }
    }
}

/// A template failed to load or render
#[derive(Debug, Error)]
#[error("template {name}: {source}")]
pub struct RenderError {
    name: TemplateName,
    #[source]
    source: minijinja::Error,
}

impl RenderError {
    pub const fn new(name: TemplateName, source: minijinja::Error) -> Self {
        Self { name, source }
    }
}

/// Produces an HTML document from a named template
pub trait Render: Send + Sync {
    fn render(&self, name: TemplateName, data: RenderData<'_>) -> Result<String, RenderError>;
}

/// The five page templates in one minijinja environment
#[derive(Debug)]
pub struct TemplateSet {
    env: Environment<'static>,
}

impl TemplateSet {
    /// Templates compiled into the binary
    pub fn builtin() -> Result<Self, RenderError> {
        let mut env = new_environment();
        for name in TemplateName::ALL {
            env.add_template(name.file_name(), name.builtin_source())
                .map_err(|e| RenderError::new(name, e))?;
        }
        Ok(Self { env })
    }

    /// Templates read from `dir`; all five must exist and parse
    pub fn load_dir(dir: &Path) -> Result<Self, RenderError> {
        let mut env = new_environment();
        env.set_loader(path_loader(dir));
        let set = Self { env };
        // Load each one now so a broken directory stops startup
        for name in TemplateName::ALL {
            set.env
                .get_template(name.file_name())
                .map_err(|e| RenderError::new(name, e))?;
        }
        Ok(set)
    }
}

fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    // A page template rendered without page data is an error, not blank output
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

impl Render for TemplateSet {
    fn render(&self, name: TemplateName, data: RenderData<'_>) -> Result<String, RenderError> {
        self.env
            .get_template(name.file_name())
            .and_then(|template| template.render(data.context()))
            .map_err(|e| RenderError::new(name, e))
    }
}
