#![forbid(unsafe_code)]

use poem::web::Html;
use poem::{IntoResponse, Request, Response};
use serde::Serialize;

use crate::utils::db_types::Article;
use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{self, RequestDebug};
use crate::wiki::render::EDIT_TEMPLATE;
use crate::wiki::AppState;

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
struct ReqEdit {
    id: i64,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqEdit {
    fn get_request_info(&self) -> String {
        format!("  Request:\n    route: edit\n    id: {}", self.id)
    }
}

#[derive(Serialize)]
struct EditPage {
    article: Article,
    exists: bool,
}

// ---------------------------------------------------------------------------
// handle:
// ---------------------------------------------------------------------------
/** Render the edit form.  An id that was never saved gets a blank form
 * rather than an error.
 */
pub async fn handle(http_req: &Request, state: &AppState, id: i64) -> Result<Response, WikiError> {
    wiki_utils::debug_request(http_req, &ReqEdit {id});

    let store = state.articles()?;
    let page = match state.with_deadline("load", store.load(id)).await {
        Ok(article) => EditPage {article, exists: true},
        Err(WikiError::NotFound(_)) => EditPage {article: Article::blank(id), exists: false},
        Err(e) => return Err(e),
    };

    let html = state.renderer.render(EDIT_TEMPLATE, &page)?;
    Ok(Html(html).into_response())
}
