// This file contains all SQL statements issued by the wiki.
#![forbid(unsafe_code)]

// ========================= Articles table =========================
// BIGINT keeps the full i64 id range on both sqlite and mysql.
pub const CREATE_ARTICLES: &str = concat!(
    "CREATE TABLE IF NOT EXISTS Articles (",
    "ArticleId BIGINT PRIMARY KEY, ",
    "ArticleTitle TEXT, ",
    "ArticleText TEXT)",
);

pub const GET_ARTICLE: &str = concat!(
    "SELECT ArticleId, ArticleTitle, ArticleText ",
    "FROM Articles WHERE ArticleId = ?",
);

pub const LIST_ARTICLES: &str = concat!(
    "SELECT ArticleId, ArticleTitle ",
    "FROM Articles ORDER BY ArticleId",
);

// The upsert syntax differs between the two engines.
pub const UPSERT_ARTICLE_SQLITE: &str = concat!(
    "INSERT INTO Articles (ArticleId, ArticleTitle, ArticleText) ",
    "VALUES (?, ?, ?) ",
    "ON CONFLICT(ArticleId) DO UPDATE SET ",
    "ArticleTitle = excluded.ArticleTitle, ArticleText = excluded.ArticleText",
);

pub const UPSERT_ARTICLE_MYSQL: &str = concat!(
    "INSERT INTO Articles (ArticleId, ArticleTitle, ArticleText) ",
    "VALUES (?, ?, ?) ",
    "ON DUPLICATE KEY UPDATE ",
    "ArticleTitle = VALUES(ArticleTitle), ArticleText = VALUES(ArticleText)",
);
