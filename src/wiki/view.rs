#![forbid(unsafe_code)]

use poem::web::Html;
use poem::{IntoResponse, Request, Response};
use serde::Serialize;

use crate::utils::db_types::Article;
use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{self, RequestDebug};
use crate::wiki::render::VIEW_TEMPLATE;
use crate::wiki::AppState;

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
struct ReqView {
    id: i64,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqView {
    fn get_request_info(&self) -> String {
        format!("  Request:\n    route: view\n    id: {}", self.id)
    }
}

#[derive(Serialize)]
struct ViewPage<'a> {
    article: &'a Article,
}

// ---------------------------------------------------------------------------
// handle:
// ---------------------------------------------------------------------------
/** Render an existing article.  Unknown ids are not found. */
pub async fn handle(http_req: &Request, state: &AppState, id: i64) -> Result<Response, WikiError> {
    wiki_utils::debug_request(http_req, &ReqView {id});

    let store = state.articles()?;
    let article = state.with_deadline("load", store.load(id)).await?;
    let html = state.renderer.render(VIEW_TEMPLATE, &ViewPage {article: &article})?;
    Ok(Html(html).into_response())
}
