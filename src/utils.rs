pub mod article_store;
pub mod blog_store;
pub mod config;
pub mod db_init;
pub mod db_statements;
pub mod db_types;
pub mod errors;
pub mod wiki_utils;
