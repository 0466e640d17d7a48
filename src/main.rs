#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use poem::listener::TcpListener;

// Wiki Utilities
use crate::utils::config::{init_log, init_root_dir, init_runtime_context, RuntimeCtx};
use crate::utils::blog_store::BlogStore;
use crate::utils::db_init;
use crate::utils::errors::Errors;
use crate::wiki::render::Renderer;
use crate::wiki::{build_app, AppState};

// Modules
mod utils;
mod wiki;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "WikiServer"; // for poem logging

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() {
    // Announce ourselves.
    println!("Starting wiki_server!");

    // Startup errors are fatal.
    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("wiki_server terminated: {:#}", e);
        std::process::exit(1);
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// run:
// ---------------------------------------------------------------------------
async fn run() -> Result<()> {
    // --------------- Initialize the Wiki ------------
    let ctx = wiki_init()?;
    let state = Arc::new(build_state(&ctx).await?);

    // --------------- Main Loop Set Up ---------------
    let config = &ctx.parms.config;
    let app = build_app(state, &config.assets_dir, &config.fun_dir);
    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    info!("listening on {}", addr);

    // ------------------ Main Loop -------------------
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run_with_graceful_shutdown(app, shutdown_signal(), Some(shutdown_timeout))
        .await?;

    info!("{} stopped", SERVER_NAME);
    Ok(())
}

// ---------------------------------------------------------------------------
// wiki_init:
// ---------------------------------------------------------------------------
/** Initialize logging and read the configuration. */
fn wiki_init() -> Result<RuntimeCtx> {
    // Configure our log.
    let root_dir = init_root_dir();
    init_log(&root_dir)?;

    // Read input parameters and resolve the runtime context.
    let ctx = init_runtime_context(root_dir)?;
    info!("{}", Errors::InputParms(format!("{:#?}", ctx)));

    // Log build info.
    print_version_info();
    Ok(ctx)
}

// ---------------------------------------------------------------------------
// build_state:
// ---------------------------------------------------------------------------
/** Connect the article store and load the templates. */
async fn build_state(ctx: &RuntimeCtx) -> Result<AppState> {
    let config = &ctx.parms.config;
    let articles = db_init::init_store(config, ctx.mysql.as_ref()).await?;

    let renderer = match &config.templates_dir {
        Some(dir) => Renderer::from_dir(dir, &config.title),
        None => Renderer::embedded(&config.title),
    }.map_err(|e| Errors::TemplateLoad(e.to_string()))?;

    Ok(AppState {
        articles,
        blog: BlogStore::new(&config.blog_dir),
        renderer,
        trust_blog_html: config.trust_blog_html,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    })
}

// ---------------------------------------------------------------------------
// shutdown_signal:
// ---------------------------------------------------------------------------
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => (),
                    _ = term.recv() => (),
                }
            },
            Err(e) => {
                error!("Unable to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    info!("Shutdown signal received");
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running WIKI={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
