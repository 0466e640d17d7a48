#![forbid(unsafe_code)]

use log::info;
use poem::http::{header, StatusCode};
use poem::web::Form;
use poem::{Body, FromRequest, Request, RequestBody, Response};
use serde::Deserialize;

use crate::utils::db_types::Article;
use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{self, RequestDebug};
use crate::wiki::AppState;

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
/// The posted form.  Older forms send the article text as body.
#[derive(Debug, Deserialize)]
struct SaveForm {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "body")]
    text: String,
}

struct ReqSave<'a> {
    id: i64,
    form: &'a SaveForm,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqSave<'_> {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    id: ");
        s.push_str(&self.id.to_string());
        s.push_str("\n    title: ");
        s.push_str(&self.form.title);
        s.push_str("\n    text length: ");
        s.push_str(&self.form.text.len().to_string());
        s
    }
}

// ---------------------------------------------------------------------------
// handle:
// ---------------------------------------------------------------------------
/** Upsert the article from the form and redirect to its view page. */
pub async fn handle(http_req: &Request, body: Body, state: &AppState, id: i64) -> Result<Response, WikiError> {
    let store = state.articles()?;

    let Form(form) = Form::<SaveForm>::from_request(http_req, &mut RequestBody::new(body))
        .await
        .map_err(|e| WikiError::Validation(e.to_string()))?;
    wiki_utils::debug_request(http_req, &ReqSave {id, form: &form});

    let article = Article::new(id, form.title, form.text);
    state.with_deadline("save", store.save(&article)).await?;
    info!("Saved article {}", id);

    Ok(Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, format!("/view/{}", id))
        .finish())
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::http::StatusCode;
    use crate::utils::db_types::Article;
    use crate::wiki::tests::{client, fixture};

    #[tokio::test]
    async fn save_replaces_existing_article() {
        let f = fixture(false).await;
        let cli = client(&f);
        for (title, text) in [("First", "one"), ("Second", "two"), ("Second", "two")] {
            cli.post("/save/8")
                .form(&[("title", title), ("text", text)])
                .send()
                .await
                .assert_status(StatusCode::FOUND);
        }

        let store = f.state.articles().unwrap();
        assert_eq!(store.load(8).await.unwrap(),
                   Article::new(8, "Second".to_string(), "two".to_string()));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn body_field_is_accepted_as_text() {
        let f = fixture(false).await;
        client(&f).post("/save/2")
            .form(&[("body", "only a body")])
            .send()
            .await
            .assert_status(StatusCode::FOUND);

        let article = f.state.articles().unwrap().load(2).await.unwrap();
        assert_eq!(article, Article::new(2, String::new(), "only a body".to_string()));
    }

    #[tokio::test]
    async fn non_form_body_is_a_bad_request() {
        let f = fixture(false).await;
        client(&f).post("/save/3")
            .content_type("application/json")
            .body("{\"title\": \"x\"}")
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert!(f.state.articles().unwrap().load(3).await.is_err());
    }
}
