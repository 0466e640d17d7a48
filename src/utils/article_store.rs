#![forbid(unsafe_code)]

use async_trait::async_trait;
use sqlx::{MySql, Pool, Row, Sqlite};

use crate::utils::db_statements::{GET_ARTICLE, LIST_ARTICLES, UPSERT_ARTICLE_MYSQL, UPSERT_ARTICLE_SQLITE};
use crate::utils::db_types::{Article, IndexEntry};
use crate::utils::errors::StoreError;

// ***************************************************************************
//                                  Trait
// ***************************************************************************
/** Persistence for articles.  Implementations own their connection pool and
 * must be safe to share across concurrently running requests.
 */
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Point lookup by id.  Absence is reported as StoreError::NotFound.
    async fn load(&self, id: i64) -> Result<Article, StoreError>;

    /// Insert or replace the article keyed by its id.  Saving the same
    /// article twice leaves the same stored state as saving it once.
    async fn save(&self, article: &Article) -> Result<(), StoreError>;

    /// All articles projected to (id, title), ordered by id.
    async fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError>;
}

// ***************************************************************************
//                                  SQLite
// ***************************************************************************
pub struct SqliteArticleStore {
    db: Pool<Sqlite>,
}

impl SqliteArticleStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self {db}
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn load(&self, id: i64) -> Result<Article, StoreError> {
        let result = sqlx::query(GET_ARTICLE)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match result {
            Some(row) => Ok(Article::new(
                row.try_get(0)?,
                row.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
                row.try_get::<Option<String>, _>(2)?.unwrap_or_default())),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn save(&self, article: &Article) -> Result<(), StoreError> {
        sqlx::query(UPSERT_ARTICLE_SQLITE)
            .bind(article.id)
            .bind(&article.title)
            .bind(&article.text)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let rows = sqlx::query(LIST_ARTICLES)
            .fetch_all(&self.db)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(IndexEntry::new(
                row.try_get(0)?,
                row.try_get::<Option<String>, _>(1)?.unwrap_or_default()));
        }
        Ok(entries)
    }
}

// ***************************************************************************
//                                  MySQL
// ***************************************************************************
pub struct MySqlArticleStore {
    db: Pool<MySql>,
}

impl MySqlArticleStore {
    pub fn new(db: Pool<MySql>) -> Self {
        Self {db}
    }
}

#[async_trait]
impl ArticleStore for MySqlArticleStore {
    async fn load(&self, id: i64) -> Result<Article, StoreError> {
        let result = sqlx::query(GET_ARTICLE)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match result {
            Some(row) => Ok(Article::new(
                row.try_get(0)?,
                row.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
                row.try_get::<Option<String>, _>(2)?.unwrap_or_default())),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn save(&self, article: &Article) -> Result<(), StoreError> {
        sqlx::query(UPSERT_ARTICLE_MYSQL)
            .bind(article.id)
            .bind(&article.title)
            .bind(&article.text)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
        let rows = sqlx::query(LIST_ARTICLES)
            .fetch_all(&self.db)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(IndexEntry::new(
                row.try_get(0)?,
                row.try_get::<Option<String>, _>(1)?.unwrap_or_default()));
        }
        Ok(entries)
    }
}
