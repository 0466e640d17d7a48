#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use poem::endpoint::StaticFilesEndpoint;
use poem::web::Data;
use poem::{handler, Body, Endpoint, EndpointExt, Request, Response, Route};

use crate::utils::article_store::ArticleStore;
use crate::utils::blog_store::BlogStore;
use crate::utils::errors::{StoreError, WikiError};

pub mod blog;
pub mod edit;
pub mod index;
pub mod render;
pub mod router;
pub mod save;
pub mod view;

use render::Renderer;
use router::{match_route, WikiRoute};

// Static asset mount points.
pub const ASSETS_PREFIX: &str = "/assets";
pub const FUN_PREFIX: &str = "/fun";

// ***************************************************************************
//                                 AppState
// ***************************************************************************
/** Everything a request handler needs.  Built once in main and shared
 * read-only across requests through poem's Data extractor.
 */
pub struct AppState {
    pub articles: Option<Arc<dyn ArticleStore>>,
    pub blog: BlogStore,
    pub renderer: Renderer,
    pub trust_blog_html: bool,
    pub request_timeout: Duration,
}

impl AppState {
    /// The article store, or not found when the files backend is in use.
    pub fn articles(&self) -> Result<&dyn ArticleStore, WikiError> {
        match &self.articles {
            Some(store) => Ok(store.as_ref()),
            None => Err(WikiError::NotFound("articles are not enabled".to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // with_deadline:
    // -----------------------------------------------------------------------
    /** Run a store operation under the request timeout.  Backend failures
     * and timeouts are logged here; not found is left to the caller.
     */
    pub async fn with_deadline<T, F>(&self, op: &str, fut: F) -> Result<T, WikiError>
    where F: Future<Output = Result<T, StoreError>>
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                match &e {
                    StoreError::Backend(_) | StoreError::Io(_) => error!("{} failed: {}", op, e),
                    _ => debug!("{}: {}", op, e),
                }
                Err(e.into())
            },
            Err(_) => {
                let msg = format!("{} exceeded {:?}", op, self.request_timeout);
                error!("{}", msg);
                Err(WikiError::Timeout(msg))
            },
        }
    }
}

// ***************************************************************************
//                               Application
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_app:
// ---------------------------------------------------------------------------
/** Static directories are served with their prefix stripped; every other
 * path goes through the wiki router.
 */
pub fn build_app(state: Arc<AppState>, assets_dir: &str, fun_dir: &str) -> impl Endpoint {
    Route::new()
        .nest(ASSETS_PREFIX, StaticFilesEndpoint::new(assets_dir))
        .nest(FUN_PREFIX, StaticFilesEndpoint::new(fun_dir))
        .at("/", dispatch)
        .at("/*path", dispatch)
        .data(state)
}

// ---------------------------------------------------------------------------
// dispatch:
// ---------------------------------------------------------------------------
#[handler]
async fn dispatch(req: &Request, body: Body, Data(state): Data<&Arc<AppState>>) -> poem::Result<Response> {
    let path = req.uri().path();
    let route = match match_route(path) {
        Some(r) => r,
        None => {
            debug!("No route for {} {}", req.method(), path);
            return Err(WikiError::NotFound(path.to_string()).into());
        },
    };

    if !route.accepts(req.method()) {
        let msg = format!("{} does not accept {}", route.name(), req.method());
        return Err(WikiError::MethodNotAllowed(msg).into());
    }

    let result = match route {
        WikiRoute::Index => index::handle(req, state).await,
        WikiRoute::View(id) => view::handle(req, state, id).await,
        WikiRoute::Edit(id) => edit::handle(req, state, id).await,
        WikiRoute::Save(id) => save::handle(req, body, state, id).await,
        WikiRoute::Blog(rel) => blog::handle(req, state, &rel).await,
    };
    Ok(result?)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
pub mod tests {
    use super::*;
    use async_trait::async_trait;
    use poem::http::{header, StatusCode};
    use poem::test::TestClient;
    use tera::Tera;
    use crate::utils::article_store::tests::memory_store;
    use crate::utils::db_types::{Article, IndexEntry};

    pub struct Fixture {
        pub blog_dir: tempfile::TempDir,
        pub assets_dir: tempfile::TempDir,
        pub state: Arc<AppState>,
    }

    pub async fn fixture(trust_blog_html: bool) -> Fixture {
        let blog_dir = tempfile::tempdir().unwrap();
        let assets_dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            articles: Some(Arc::new(memory_store().await)),
            blog: BlogStore::new(blog_dir.path()),
            renderer: Renderer::embedded("Test Wiki").unwrap(),
            trust_blog_html,
            request_timeout: Duration::from_secs(5),
        });
        Fixture {blog_dir, assets_dir, state}
    }

    pub fn client(f: &Fixture) -> TestClient<impl Endpoint> {
        let assets = f.assets_dir.path().to_str().unwrap();
        TestClient::new(build_app(f.state.clone(), assets, assets))
    }

    pub async fn body_text(resp: poem::test::TestResponse) -> String {
        resp.0.into_body().into_string().await.unwrap()
    }

    fn client_for(articles: Arc<dyn ArticleStore>, renderer: Renderer, request_timeout: Duration)
        -> (tempfile::TempDir, TestClient<impl Endpoint>)
    {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            articles: Some(articles),
            blog: BlogStore::new(dir.path()),
            renderer,
            trust_blog_html: false,
            request_timeout,
        });
        let path = dir.path().to_str().unwrap().to_string();
        (dir, TestClient::new(build_app(state, &path, &path)))
    }

    // Answers every call after a fixed delay.
    struct SlowStore(Duration);

    #[async_trait]
    impl ArticleStore for SlowStore {
        async fn load(&self, id: i64) -> Result<Article, StoreError> {
            tokio::time::sleep(self.0).await;
            Ok(Article::blank(id))
        }
        async fn save(&self, _article: &Article) -> Result<(), StoreError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
        async fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
            tokio::time::sleep(self.0).await;
            Ok(vec!())
        }
    }

    // Fails every call the way a dropped database connection would.
    struct BrokenStore;

    #[async_trait]
    impl ArticleStore for BrokenStore {
        async fn load(&self, _id: i64) -> Result<Article, StoreError> {
            Err(StoreError::Backend(sqlx::Error::Protocol("connection reset by db.internal".to_string())))
        }
        async fn save(&self, _article: &Article) -> Result<(), StoreError> {
            Err(StoreError::Backend(sqlx::Error::PoolTimedOut))
        }
        async fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
            Err(StoreError::Backend(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn save_then_view() {
        let f = fixture(false).await;
        let cli = client(&f);

        let resp = cli.post("/save/1")
            .form(&[("title", "Hello"), ("text", "World")])
            .send()
            .await;
        resp.assert_status(StatusCode::FOUND);
        resp.assert_header(header::LOCATION, "/view/1");

        let resp = cli.get("/view/1").send().await;
        resp.assert_status_is_ok();
        let body = body_text(resp).await;
        assert!(body.contains("Hello"));
        assert!(body.contains("World"));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let f = fixture(false).await;
        let cli = client(&f);
        for path in ["/nonexistent/path", "/view/abc", "/view/-1", "/view/12a",
                     "/blog/../../etc/passwd", "/view/1/extra"] {
            cli.get(path).send().await.assert_status(StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn view_missing_is_not_found() {
        let f = fixture(false).await;
        client(&f).get("/view/0").send().await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let f = fixture(false).await;
        let cli = client(&f);
        cli.get("/save/1").send().await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        cli.post("/view/1").send().await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn static_assets_are_served() {
        let f = fixture(false).await;
        std::fs::write(f.assets_dir.path().join("style.css"), "body{}").unwrap();
        let cli = client(&f);

        let resp = cli.get("/assets/style.css").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("body{}").await;
        cli.get("/fun/style.css").send().await.assert_status_is_ok();
        cli.get("/assets/missing.css").send().await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn files_backend_disables_articles() {
        let blog_dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            articles: None,
            blog: BlogStore::new(blog_dir.path()),
            renderer: Renderer::embedded("Files").unwrap(),
            trust_blog_html: false,
            request_timeout: Duration::from_secs(5),
        });
        let dir = blog_dir.path().to_str().unwrap();
        let cli = TestClient::new(build_app(state, dir, dir));

        cli.get("/view/1").send().await.assert_status(StatusCode::NOT_FOUND);
        cli.get("/edit/1").send().await.assert_status(StatusCode::NOT_FOUND);
        cli.get("/").send().await.assert_status_is_ok();
    }

    #[tokio::test]
    async fn slow_store_is_unavailable() {
        let store = Arc::new(SlowStore(Duration::from_millis(500)));
        let renderer = Renderer::embedded("Slow").unwrap();
        let (_dir, cli) = client_for(store, renderer, Duration::from_millis(20));

        cli.get("/view/1").send().await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        cli.get("/edit/1").send().await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        cli.get("/").send().await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        cli.post("/save/1")
            .form(&[("title", "t"), ("text", "x")])
            .send()
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn backend_failure_is_internal_error() {
        let renderer = Renderer::embedded("Broken").unwrap();
        let (_dir, cli) = client_for(Arc::new(BrokenStore), renderer, Duration::from_secs(5));

        let resp = cli.get("/view/1").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(resp).await;
        assert!(!body.contains("db.internal"), "{}", body);

        cli.get("/").send().await.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        cli.post("/save/1")
            .form(&[("title", "t"), ("text", "x")])
            .send()
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn broken_template_is_internal_error() {
        let store = Arc::new(memory_store().await);
        store.save(&Article::new(1, "Hello".to_string(), "World".to_string())).await.unwrap();
        let mut tera = Tera::default();
        tera.add_raw_template("view.html", "{{ article.missing.deeper }}").unwrap();
        let (_dir, cli) = client_for(store, Renderer::with_tera(tera, "Broken"), Duration::from_secs(5));

        let resp = cli.get("/view/1").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(resp).await;
        assert!(!body.contains("missing"), "{}", body);
    }
}
