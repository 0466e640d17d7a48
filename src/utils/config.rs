#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// Wiki Utilities
use crate::utils::{wiki_utils, errors::Errors};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_WIKI_ROOT_DIR    : &str = "WIKI_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = ".";
const CONFIG_DIR           : &str = "/config";
const DATABASE_DIR         : &str = "/database";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml"; // relative to config dir
const WIKI_CONFIG_FILE     : &str = "/wiki.toml";  // relative to config dir
const DEFAULT_LOG_PATTERN  : &str = "{d} {l} {t} - {m}{n}";

// Networking.
const ENV_PORT             : &str = "PORT";
const DEFAULT_HTTP_ADDR    : &str = "0.0.0.0";
const DEFAULT_HTTP_PORT    : u16  = 8080;

// Content directories.
const DEFAULT_BLOG_DIR     : &str = "blog";
const DEFAULT_ASSETS_DIR   : &str = "assets";
const DEFAULT_FUN_DIR      : &str = "fun";

// Timeouts in seconds.
const DEFAULT_REQUEST_TIMEOUT  : u64 = 10;
const DEFAULT_SHUTDOWN_TIMEOUT : u64 = 5;

// MySQL environment variables.
pub const ENV_DB_USER      : &str = "DB_USER";
pub const ENV_DB_PASS      : &str = "DB_PASS";
pub const ENV_DB_NAME      : &str = "DB_NAME";
pub const ENV_INSTANCE_CONNECTION_NAME : &str = "INSTANCE_CONNECTION_NAME";
pub const ENV_PRIVATE_IP   : &str = "PRIVATE_IP";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE the runtime context is initialized in main.
lazy_static! {
    pub static ref WIKI_ARGS: WikiArgs = init_wiki_args();
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// WikiArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "wiki_args", about = "Command line arguments for the wiki server.")]
pub struct WikiArgs {
    /// Specify the wiki's root data directory.
    ///
    /// The root directory is calculated using the following priority order:
    ///
    ///   1. If set, the value of the WIKI_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, the current directory.
    ///
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Path to the TOML configuration file.
    ///
    /// Defaults to config/wiki.toml under the root directory.
    #[structopt(short, long)]
    pub config_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend:
// ---------------------------------------------------------------------------
/// Which store holds the articles.  The blog directory is always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Mysql,
    Files,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
/** Everything main needs to build the application state.  Directory values
 * in the config have already been resolved against the root directory.
 */
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub root_dir: String,
    pub mysql: Option<MySqlSettings>,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub backend: Backend,
    pub sqlite_url: Option<String>,
    pub blog_dir: String,
    pub assets_dir: String,
    pub fun_dir: String,
    pub templates_dir: Option<String>,
    pub trust_blog_html: bool,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Wiki".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            backend: Backend::Sqlite,
            sqlite_url: None,
            blog_dir: DEFAULT_BLOG_DIR.to_string(),
            assets_dir: DEFAULT_ASSETS_DIR.to_string(),
            fun_dir: DEFAULT_FUN_DIR.to_string(),
            templates_dir: None,
            trust_blog_html: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// MySqlSettings:
// ---------------------------------------------------------------------------
/** Connection settings for the MySQL backend, read from the environment. */
pub struct MySqlSettings {
    pub user: String,
    pub pass: String,
    pub name: String,
    pub instance_connection_name: String,
    pub private_ip: Option<String>,
}

// The password is never written to the log.
impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("user", &self.user)
            .field("pass", &"********")
            .field("name", &self.name)
            .field("instance_connection_name", &self.instance_connection_name)
            .field("private_ip", &self.private_ip)
            .finish()
    }
}

impl MySqlSettings {
    /** Read the required variables using the lookup function.  A missing or
     * empty required variable is a configuration error.
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Errors>
    where F: Fn(&str) -> Option<String>
    {
        let must_get = |k: &str| -> Result<String, Errors> {
            match lookup(k) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(Errors::ConfigError(format!("{} environment variable not set.", k))),
            }
        };

        Ok(MySqlSettings {
            user: must_get(ENV_DB_USER)?,
            pass: must_get(ENV_DB_PASS)?,
            name: must_get(ENV_DB_NAME)?,
            instance_connection_name: must_get(ENV_INSTANCE_CONNECTION_NAME)?,
            private_ip: lookup(ENV_PRIVATE_IP).filter(|v| !v.is_empty()),
        })
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_wiki_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_wiki_args() -> WikiArgs {
    WikiArgs::from_args()
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_WIKI_ROOT_DIR).unwrap_or_else(
        |_| {
            match WIKI_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    wiki_utils::get_absolute_path(&root_dir)
}

// ---------------------------------------------------------------------------
// resolve_dir:
// ---------------------------------------------------------------------------
/** Relative directories are interpreted relative to the root directory. */
pub fn resolve_dir(root_dir: &str, dir: &str) -> String {
    let expanded = wiki_utils::get_absolute_path_from(root_dir, dir);
    expanded.trim_end_matches('/').to_string()
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the config directory's log4rs.yml if it exists,
 * otherwise log to the console at info level.
 */
pub fn init_log(root_dir: &str) -> Result<(), Errors> {
    let logconfig = init_log_config(root_dir);
    if Path::new(&logconfig).is_file() {
        if let Err(e) = log4rs::init_file(&logconfig, Default::default()) {
            println!("{}", e);
            return Err(Errors::Log4rsInitialization(logconfig));
        }
        info!("Log4rs initialized using: {}", logconfig);
        return Ok(());
    }

    // Fall back to a console logger.
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .map_err(|e| Errors::Log4rsInitialization(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| Errors::Log4rsInitialization(e.to_string()))?;
    info!("Log4rs initialized with console defaults, {} not found.", logconfig);
    Ok(())
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config(root_dir: &str) -> String {
    root_dir.to_string() + CONFIG_DIR + LOG4RS_CONFIG_FILE
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file specified
 * on the command line or, if not specified, from the root directory's config
 * subdirectory.  A missing file yields the default configuration.
 */
fn get_parms(root_dir: &str) -> Result<Parms> {
    let config_file = match &WIKI_ARGS.config_file {
        Some(f) => f.clone(),
        None => root_dir.to_string() + CONFIG_DIR + WIKI_CONFIG_FILE,
    };

    // Read the configuration file.
    let config_file_abs = wiki_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file_abs);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    // Parse the toml configuration.
    let config = parse_config(&contents).map_err(|e| {
        let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs.clone()), e);
        error!("{}", msg);
        anyhow!(msg)
    })?;

    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

// ---------------------------------------------------------------------------
// apply_env_overrides:
// ---------------------------------------------------------------------------
/** Environment values take precedence over the configuration file. */
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), Errors>
where F: Fn(&str) -> Option<String>
{
    if let Some(port) = lookup(ENV_PORT).filter(|p| !p.is_empty()) {
        config.http_port = port.parse::<u16>().map_err(|_| {
            Errors::ConfigError(format!("{} is not a valid port number: {}", ENV_PORT, port))
        })?;
    } else {
        info!("{} not set, using port {}", ENV_PORT, config.http_port);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// resolve_config_dirs:
// ---------------------------------------------------------------------------
/** Make all directory and sqlite file references absolute. */
pub fn resolve_config_dirs(config: &mut Config, root_dir: &str) {
    config.blog_dir = resolve_dir(root_dir, &config.blog_dir);
    config.assets_dir = resolve_dir(root_dir, &config.assets_dir);
    config.fun_dir = resolve_dir(root_dir, &config.fun_dir);
    config.templates_dir = config.templates_dir.as_ref().map(|d| resolve_dir(root_dir, d));
    if config.sqlite_url.is_none() {
        config.sqlite_url = Some(format!("sqlite://{}{}/wiki.db", root_dir, DATABASE_DIR));
    }
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_root_dir:
// ---------------------------------------------------------------------------
/** Calculate the root directory.  Called before logging is initialized. */
pub fn init_root_dir() -> String {
    get_root_dir()
}

// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
/** Read the configuration, apply environment overrides and, for the MySQL
 * backend, collect the required connection settings.  Any error is fatal.
 */
pub fn init_runtime_context(root_dir: String) -> Result<RuntimeCtx> {
    let mut parms = get_parms(&root_dir)?;
    let lookup = |k: &str| env::var(k).ok();
    apply_env_overrides(&mut parms.config, lookup)?;
    resolve_config_dirs(&mut parms.config, &root_dir);

    let mysql = match parms.config.backend {
        Backend::Mysql => Some(MySqlSettings::from_lookup(lookup)?),
        _ => None,
    };

    Ok(RuntimeCtx {parms, root_dir, mysql})
}
