#![forbid(unsafe_code)]

use poem::web::Html;
use poem::{IntoResponse, Request, Response};
use serde::Serialize;

use crate::utils::db_types::{BlogEntry, IndexEntry};
use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{self, RequestDebug};
use crate::wiki::render::INDEX_TEMPLATE;
use crate::wiki::AppState;

struct ReqIndex;

impl RequestDebug for ReqIndex {
    fn get_request_info(&self) -> String {
        "  Request:\n    route: index".to_string()
    }
}

#[derive(Serialize)]
struct IndexPage {
    articles_enabled: bool,
    articles: Vec<IndexEntry>,
    posts: Vec<BlogEntry>,
}

// ---------------------------------------------------------------------------
// handle:
// ---------------------------------------------------------------------------
/** List the articles, when an article store is configured, and the files in
 * the blog directory.
 */
pub async fn handle(http_req: &Request, state: &AppState) -> Result<Response, WikiError> {
    wiki_utils::debug_request(http_req, &ReqIndex);

    let articles = match &state.articles {
        Some(store) => state.with_deadline("list", store.list_all()).await?,
        None => vec!(),
    };
    let posts = state.with_deadline("list blog", state.blog.list()).await?;

    let page = IndexPage {articles_enabled: state.articles.is_some(), articles, posts};
    let html = state.renderer.render(INDEX_TEMPLATE, &page)?;
    Ok(Html(html).into_response())
}
