#![forbid(unsafe_code)]

use std::io;
use std::path::{Component, Path, PathBuf};

use log::warn;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::utils::db_types::BlogEntry;
use crate::utils::errors::StoreError;
use crate::utils::wiki_utils::get_files_in_dir;

const BLOG_PREFIX: &str = "/blog/";

// Characters escaped when a file name becomes a single url path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

// ---------------------------------------------------------------------------
// is_safe_relative_path:
// ---------------------------------------------------------------------------
/** Lexical check on a path taken from a url.  The path must be relative,
 * non-empty, and free of parent directory components, backslashes and nul
 * characters.
 */
pub fn is_safe_relative_path(rel: &str) -> bool {
    if rel.is_empty() || rel.contains('\\') || rel.contains('\0') {
        return false;
    }

    let mut normal = 0;
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => (),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal > 0
}

// ***************************************************************************
//                                BlogStore
// ***************************************************************************
/** Read-only access to the files under the blog directory. */
#[derive(Debug, Clone)]
pub struct BlogStore {
    root: PathBuf,
}

impl BlogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {root: root.into()}
    }

    // -----------------------------------------------------------------------
    // read:
    // -----------------------------------------------------------------------
    /** Read the file at rel under the root.  Symlinks are resolved before the
     * containment check, so a link pointing outside the root is rejected.
     */
    pub async fn read(&self, rel: &str) -> Result<String, StoreError> {
        if !is_safe_relative_path(rel) {
            return Err(StoreError::PathRejected(rel.to_string()));
        }

        let root = canonical_or_not_found(&self.root, rel).await?;
        let path = canonical_or_not_found(&self.root.join(rel), rel).await?;
        if !path.starts_with(&root) {
            warn!("Blog path {} resolves outside of {:?}", rel, root);
            return Err(StoreError::PathRejected(rel.to_string()));
        }
        if !tokio::fs::metadata(&path).await?.is_file() {
            return Err(StoreError::FileNotFound(rel.to_string()));
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // -----------------------------------------------------------------------
    // list:
    // -----------------------------------------------------------------------
    /** The regular files directly under the root.  A missing root directory
     * is an empty listing.  The directory scan runs on the blocking pool.
     */
    pub async fn list(&self) -> Result<Vec<BlogEntry>, StoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_dir(&root))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?
    }
}

// ---------------------------------------------------------------------------
// list_dir:
// ---------------------------------------------------------------------------
fn list_dir(root: &Path) -> Result<Vec<BlogEntry>, StoreError> {
    if !root.is_dir() {
        return Ok(vec!());
    }

    let dir = root.to_string_lossy();
    let files = get_files_in_dir(&dir).map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?;
    Ok(files.iter()
        .filter_map(|f| f.file_name().and_then(|n| n.to_str()))
        .map(|name| BlogEntry {name: name.to_string(), href: blog_href(name)})
        .collect())
}

// ---------------------------------------------------------------------------
// blog_href:
// ---------------------------------------------------------------------------
/** The url for a file directly under the blog root. */
fn blog_href(name: &str) -> String {
    format!("{}{}", BLOG_PREFIX, utf8_percent_encode(name, SEGMENT))
}

// ---------------------------------------------------------------------------
// canonical_or_not_found:
// ---------------------------------------------------------------------------
async fn canonical_or_not_found(path: &Path, rel: &str) -> Result<PathBuf, StoreError> {
    match tokio::fs::canonicalize(path).await {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::FileNotFound(rel.to_string())),
        Err(e) => Err(StoreError::Io(e)),
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lexical_guard() {
        assert!(is_safe_relative_path("post.html"));
        assert!(is_safe_relative_path("2024/post.html"));
        assert!(is_safe_relative_path("./post.html"));
        assert!(!is_safe_relative_path(""));
        assert!(!is_safe_relative_path("."));
        assert!(!is_safe_relative_path("../../etc/passwd"));
        assert!(!is_safe_relative_path("a/../../b"));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("..\\secret"));
    }

    #[tokio::test]
    async fn reads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("2024")).unwrap();
        fs::write(dir.path().join("2024/hello.html"), "<p>hi</p>").unwrap();

        let store = BlogStore::new(dir.path());
        assert_eq!(store.read("2024/hello.html").await.unwrap(), "<p>hi</p>");
        assert!(matches!(store.read("2024/missing.html").await, Err(StoreError::FileNotFound(_))));
        assert!(matches!(store.read("2024").await, Err(StoreError::FileNotFound(_))));
        assert!(matches!(store.read("../x").await, Err(StoreError::PathRejected(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt")).unwrap();

        let store = BlogStore::new(dir.path());
        assert!(matches!(store.read("link.txt").await, Err(StoreError::PathRejected(_))));
    }

    #[tokio::test]
    async fn list_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("first.html"), "1").unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();

        let store = BlogStore::new(dir.path());
        assert_eq!(store.list().await.unwrap(), vec![BlogEntry {
            name: "first.html".to_string(),
            href: "/blog/first.html".to_string(),
        }]);

        let missing = BlogStore::new(dir.path().join("nope"));
        assert!(missing.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_encodes_hrefs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("my post.html"), "1").unwrap();

        let store = BlogStore::new(dir.path());
        let entries = store.list().await.unwrap();
        assert_eq!(entries[0].name, "my post.html");
        assert_eq!(entries[0].href, "/blog/my%20post.html");
        assert_eq!(blog_href("a#b?c%d.html"), "/blog/a%23b%3Fc%25d.html");
        assert_eq!(blog_href("café.html"), "/blog/caf%C3%A9.html");
    }

    #[tokio::test]
    async fn reads_file_names_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("my post.html"), "spaced").unwrap();

        let store = BlogStore::new(dir.path());
        assert_eq!(store.read("my post.html").await.unwrap(), "spaced");
    }
}
