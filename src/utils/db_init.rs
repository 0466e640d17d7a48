#![forbid(unsafe_code)]

use sqlx::{migrate::MigrateDatabase, MySql, Pool, Sqlite};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, error};
use crate::utils::article_store::{ArticleStore, MySqlArticleStore, SqliteArticleStore};
use crate::utils::config::{Backend, Config, MySqlSettings};
use crate::utils::db_statements::CREATE_ARTICLES;
use crate::utils::errors::Errors;

// Database constants.
const SQLITE_PROTOCOL: &str = "sqlite://";
const CLOUDSQL_SOCKET_DIR: &str = "/cloudsql/";
const MYSQL_PORT: u16 = 3306;
const POOL_MIN_CONNECTIONS: u32 = 2;
const POOL_MAX_CONNECTIONS: u32 = 8;

// ---------------------------------------------------------------------------
// init_store:
// ---------------------------------------------------------------------------
/** Connect the article store selected by the configuration.  The files
 * backend has no article store.  Connection failures are fatal to the caller.
 */
pub async fn init_store(config: &Config, mysql: Option<&MySqlSettings>)
    -> Result<Option<Arc<dyn ArticleStore>>, Errors>
{
    match config.backend {
        Backend::Files => {
            info!("Using the files backend, article routes are disabled.");
            Ok(None)
        },
        Backend::Sqlite => {
            let url = config.sqlite_url.clone()
                .ok_or_else(|| Errors::ConfigError("sqlite_url not set".to_string()))?;
            let pool = init_sqlite(&url).await?;
            Ok(Some(Arc::new(SqliteArticleStore::new(pool))))
        },
        Backend::Mysql => {
            let settings = mysql
                .ok_or_else(|| Errors::ConfigError("mysql settings not available".to_string()))?;
            let pool = init_mysql(settings).await?;
            Ok(Some(Arc::new(MySqlArticleStore::new(pool))))
        },
    }
}

// ---------------------------------------------------------------------------
// init_sqlite:
// ---------------------------------------------------------------------------
pub async fn init_sqlite(url: &str) -> Result<Pool<Sqlite>, Errors> {
    // Make sure the parent directory of a file database exists.
    if let Some(file) = url.strip_prefix(SQLITE_PROTOCOL) {
        if let Some(parent) = Path::new(file).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Creating database {}", url);
        if let Err(e) = Sqlite::create_database(url).await {
            let msg = Errors::ConnectError(format!("database {} create error: {}", url, e));
            error!("{}", msg);
            return Err(msg);
        }
    } else {
        info!("Database already exists");
    }

    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| Errors::ConfigError(format!("invalid sqlite url {}: {}", url, e)))?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);

    // Create the database connection pool.
    let db = SqlitePoolOptions::new()
        .min_connections(POOL_MIN_CONNECTIONS)
        .max_connections(POOL_MAX_CONNECTIONS)
        .connect_with(options).await
        .map_err(|e| Errors::ConnectError(format!("{}: {}", url, e)))?;

    sqlx::query(CREATE_ARTICLES)
        .execute(&db)
        .await
        .map_err(|e| Errors::ConnectError(format!("unable to create Articles table: {}", e)))?;
    info!("Articles table ready");
    Ok(db)
}

// ---------------------------------------------------------------------------
// mysql_connect_options:
// ---------------------------------------------------------------------------
/** With PRIVATE_IP set we dial its value over tcp, otherwise we use the
 * Cloud SQL unix socket for the instance.
 */
pub fn mysql_connect_options(settings: &MySqlSettings) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .username(&settings.user)
        .password(&settings.pass)
        .database(&settings.name);

    match &settings.private_ip {
        Some(ip) => options.host(ip).port(MYSQL_PORT),
        None => options.socket(format!("{}{}", CLOUDSQL_SOCKET_DIR, settings.instance_connection_name)),
    }
}

// ---------------------------------------------------------------------------
// init_mysql:
// ---------------------------------------------------------------------------
pub async fn init_mysql(settings: &MySqlSettings) -> Result<Pool<MySql>, Errors> {
    let db = MySqlPoolOptions::new()
        .min_connections(POOL_MIN_CONNECTIONS)
        .max_connections(POOL_MAX_CONNECTIONS)
        .connect_with(mysql_connect_options(settings)).await
        .map_err(|e| {
            let msg = Errors::ConnectError(format!("{}: {}", settings.instance_connection_name, e));
            error!("{}", msg);
            msg
        })?;

    sqlx::query(CREATE_ARTICLES)
        .execute(&db)
        .await
        .map_err(|e| Errors::ConnectError(format!("unable to create Articles table: {}", e)))?;
    info!("Articles table ready");
    Ok(db)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    fn settings(private_ip: Option<&str>) -> MySqlSettings {
        MySqlSettings {
            user: "wiki".to_string(),
            pass: "secret".to_string(),
            name: "articles".to_string(),
            instance_connection_name: "proj:region:inst".to_string(),
            private_ip: private_ip.map(str::to_string),
        }
    }

    #[test]
    fn mysql_socket_and_private_ip() {
        let socket = mysql_connect_options(&settings(None));
        assert_eq!(socket.get_socket().and_then(|p| p.to_str()), Some("/cloudsql/proj:region:inst"));
        assert_eq!(socket.get_database(), Some("articles"));

        let tcp = mysql_connect_options(&settings(Some("10.0.0.5")));
        assert_eq!(tcp.get_host(), "10.0.0.5");
        assert_eq!(tcp.get_port(), 3306);
        assert!(tcp.get_socket().is_none());
    }

    #[tokio::test]
    async fn sqlite_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/database/wiki.db", dir.path().display());
        let db = init_sqlite(&url).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Articles")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
