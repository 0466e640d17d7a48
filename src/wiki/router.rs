#![forbid(unsafe_code)]

use percent_encoding::percent_decode_str;
use poem::http::Method;

use crate::utils::blog_store::is_safe_relative_path;

// ***************************************************************************
//                                  Routes
// ***************************************************************************
/// The operations reachable through the wiki's path router.  Static assets
/// are mounted separately and never reach this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WikiRoute {
    Index,
    View(i64),
    Edit(i64),
    Save(i64),
    Blog(String),
}

impl WikiRoute {
    /// Save only accepts POST; everything else is read only.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            WikiRoute::Save(_) => method == Method::POST,
            _ => method == Method::GET || method == Method::HEAD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WikiRoute::Index => "index",
            WikiRoute::View(_) => "view",
            WikiRoute::Edit(_) => "edit",
            WikiRoute::Save(_) => "save",
            WikiRoute::Blog(_) => "blog",
        }
    }
}

// ---------------------------------------------------------------------------
// match_route:
// ---------------------------------------------------------------------------
/** Map a request path to a route.  Per-id routes must be exactly
 * /(view|edit|save)/<digits>.  Blog routes must be /blog/<rest> where the
 * percent-decoded rest stays inside the blog directory.  None means not found.
 */
pub fn match_route(path: &str) -> Option<WikiRoute> {
    if path == "/" {
        return Some(WikiRoute::Index);
    }

    let rest = path.strip_prefix('/')?;
    let (head, tail) = rest.split_once('/')?;
    match head {
        "view" => parse_id(tail).map(WikiRoute::View),
        "edit" => parse_id(tail).map(WikiRoute::Edit),
        "save" => parse_id(tail).map(WikiRoute::Save),
        "blog" => parse_blog_path(tail).map(WikiRoute::Blog),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// parse_blog_path:
// ---------------------------------------------------------------------------
/** The traversal check runs on the decoded path, so %2e%2e is rejected the
 * same as a literal parent component.
 */
fn parse_blog_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if is_safe_relative_path(&decoded) {
        Some(decoded.into_owned())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// parse_id:
// ---------------------------------------------------------------------------
/** Ascii digits only, so signs and whitespace are rejected.  Values that
 * overflow i64 are rejected as well.
 */
fn parse_id(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok()
}
