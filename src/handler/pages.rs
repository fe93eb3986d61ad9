//! Page operation handlers
//!
//! One function per route. Storage results are folded into responses here:
//! a page that cannot be loaded sends the user to the editor, while failed
//! writes and deletes surface the raw storage error as a 500.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::config::AppState;
use crate::http::{self, RequestForm};
use crate::logger;
use crate::routing::Verb;
use crate::store::{LoadOutcome, Page};
use crate::templates::{RenderData, TemplateName};

/// URL of a page route, title percent-encoded
pub fn page_url(verb: Verb, title: &str) -> String {
    format!("/{}/{}", verb.as_str(), http::encode_path_segment(title))
}

/// `/` - landing page
pub fn root(state: &AppState) -> Response<Full<Bytes>> {
    render(state, TemplateName::Root, RenderData::None)
}

/// `/menu` - list every stored page
pub async fn menu(state: &AppState) -> Response<Full<Bytes>> {
    match state.store.enumerate().await {
        Ok(titles) => render(state, TemplateName::Menu, RenderData::Titles(&titles)),
        Err(e) => {
            logger::log_error(&format!("Failed to list pages: {e}"));
            http::build_500_response(&e.to_string())
        }
    }
}

/// `/new` - jump to the editor for the submitted `name`
pub fn new_page(form: &RequestForm) -> Response<Full<Bytes>> {
    let name = form.text("name");
    if name.is_empty() {
        logger::log_warning("New page requested without a name, redirecting to /");
        return http::build_redirect_response("/");
    }
    http::build_redirect_response(&page_url(Verb::Edit, &name))
}

/// `/view/<title>` - show a page, or go create it
pub async fn view(title: &str, state: &AppState) -> Response<Full<Bytes>> {
    match state.store.load(title).await {
        LoadOutcome::Found(page) => render(state, TemplateName::View, RenderData::Page(&page)),
        LoadOutcome::NotFound => http::build_redirect_response(&page_url(Verb::Edit, title)),
        LoadOutcome::StorageFault(e) => {
            logger::log_storage_fault(title, &e);
            http::build_redirect_response(&page_url(Verb::Edit, title))
        }
    }
}

/// `/edit/<title>` - editor for the stored body, or an empty one
pub async fn edit(title: &str, state: &AppState) -> Response<Full<Bytes>> {
    let page = match state.store.load(title).await {
        LoadOutcome::Found(page) => page,
        LoadOutcome::NotFound => Page::empty(title),
        LoadOutcome::StorageFault(e) => {
            logger::log_storage_fault(title, &e);
            Page::empty(title)
        }
    };
    render(state, TemplateName::Edit, RenderData::Page(&page))
}

/// `/save/<title>` - overwrite the page with the raw bytes of the `body` field
pub async fn save(title: &str, form: &RequestForm, state: &AppState) -> Response<Full<Bytes>> {
    let page = Page::new(title, form.bytes("body"));
    match state.store.save(&page).await {
        Ok(()) => {
            logger::log_page_saved(title, page.body.len());
            http::build_redirect_response(&page_url(Verb::View, title))
        }
        Err(e) => {
            logger::log_error(&format!("Failed to save page {title:?}: {e}"));
            http::build_500_response(&e.to_string())
        }
    }
}

/// `/delete/<title>` - remove the page and confirm
pub async fn delete(title: &str, state: &AppState) -> Response<Full<Bytes>> {
    match state.store.delete(title).await {
        Ok(()) => {
            logger::log_page_deleted(title);
            render(state, TemplateName::Ok, RenderData::Page(&Page::empty(title)))
        }
        Err(e) => {
            if e.is_not_found() {
                logger::log_warning(&format!("Delete of missing page {title:?}"));
            } else {
                logger::log_error(&format!("Failed to delete page {title:?}: {e}"));
            }
            http::build_500_response(&e.to_string())
        }
    }
}

fn render(state: &AppState, name: TemplateName, data: RenderData<'_>) -> Response<Full<Bytes>> {
    match state.templates.render(name, data) {
        Ok(html) => http::build_html_response(html),
        Err(e) => {
            logger::log_error(&format!("Failed to render {name}: {e}"));
            http::build_500_response(&e.to_string())
        }
    }
}
