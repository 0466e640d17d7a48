// This file contains the wiki database structs and related definitions.
#![forbid(unsafe_code)]

use serde::Serialize;

// ---------------------------------------------------------------------------
// Article:
// ---------------------------------------------------------------------------
/// A wiki page.  The id comes from the url and is never generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub text: String,
}

impl Article {
    pub fn new(id: i64, title: String, text: String) -> Self {
        Self {id, title, text}
    }

    /// An unsaved article with empty title and text.
    pub fn blank(id: i64) -> Self {
        Self {id, ..Default::default()}
    }
}

// ---------------------------------------------------------------------------
// IndexEntry:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub id: i64,
    pub title: String,
}

impl IndexEntry {
    pub fn new(id: i64, title: String) -> Self {
        Self {id, title}
    }
}

// ---------------------------------------------------------------------------
// BlogEntry:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogEntry {
    pub name: String,
    pub href: String,
}
