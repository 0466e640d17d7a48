#![forbid(unsafe_code)]

use poem::web::Html;
use poem::{IntoResponse, Request, Response};
use serde::Serialize;

use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{self, RequestDebug};
use crate::wiki::render::BLOG_TEMPLATE;
use crate::wiki::AppState;

struct ReqBlog<'a> {
    path: &'a str,
}

impl RequestDebug for ReqBlog<'_> {
    fn get_request_info(&self) -> String {
        format!("  Request:\n    route: blog\n    path: {}", self.path)
    }
}

#[derive(Serialize)]
struct BlogPage<'a> {
    name: &'a str,
    body: String,
    trusted: bool,
}

// ---------------------------------------------------------------------------
// handle:
// ---------------------------------------------------------------------------
/** Render a file from the blog directory.  Its contents are emitted as
 * markup only when the directory is configured as trusted.
 */
pub async fn handle(http_req: &Request, state: &AppState, rel: &str) -> Result<Response, WikiError> {
    wiki_utils::debug_request(http_req, &ReqBlog {path: rel});

    let body = state.with_deadline("read blog", state.blog.read(rel)).await?;
    let page = BlogPage {name: rel, body, trusted: state.trust_blog_html};
    let html = state.renderer.render(BLOG_TEMPLATE, &page)?;
    Ok(Html(html).into_response())
}
