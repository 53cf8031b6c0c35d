use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::workflow::retention::RetentionPolicy;

/// Worker configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DevTools port of an already running browser; `None` launches a headless one
    pub browser_debug_port: Option<u16>,
    /// Browser executable used when launching
    pub chrome_executable: Option<PathBuf>,
    /// Page opened in the primary tab at startup
    pub start_url: String,
    /// Tabs used when a command does not say `tabsNum`
    pub default_tabs: usize,
    /// Macros saved per form submission in `create_assets`
    pub create_batch_size: usize,
    /// Directory holding one JSON document per report; in-memory when unset
    pub store_dir: Option<PathBuf>,
    /// TOML file describing the macro edit/create form fields
    pub form_spec_path: Option<PathBuf>,
    /// Cleanup plan reported by the status check
    pub retention_policy: RetentionPolicy,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
    pub timings: Timings,
}

/// Every wait and delay used while driving a tab, in milliseconds
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Poll interval for element and row waits
    pub poll_interval_ms: u64,
    /// Full table render wait
    pub table_ready_timeout_ms: u64,
    /// Wait for the sub-page "next" control to show up
    pub next_button_timeout_ms: u64,
    /// Wait for the table to redraw after clicking "next"
    pub redraw_timeout_ms: u64,
    /// Delay after navigation so page scripts settle
    pub settle_delay_ms: u64,
    /// Delay between rows appearing and reading them
    pub render_delay_ms: u64,
    /// Wait for a form anchor element
    pub element_timeout_ms: u64,
    /// Wait for the submit button
    pub submit_timeout_ms: u64,
    /// Delay after clicking submit
    pub submit_settle_ms: u64,
    /// Pause polling interval of the control token
    pub control_poll_ms: u64,
    /// Backoff before the fallback navigation attempt
    pub navigation_backoff_ms: u64,
    /// Hard cap on sub-pages walked for one outer page
    pub max_sub_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: None,
            chrome_executable: None,
            start_url: "https://qima.taqeem.sa".to_string(),
            default_tabs: 3,
            create_batch_size: 10,
            store_dir: Some(PathBuf::from("data/reports")),
            form_spec_path: None,
            retention_policy: RetentionPolicy::default(),
            log_filter: "info".to_string(),
            timings: Timings::default(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            table_ready_timeout_ms: 100_000,
            next_button_timeout_ms: 5_000,
            redraw_timeout_ms: 6_000,
            settle_delay_ms: 2_000,
            render_delay_ms: 3_000,
            element_timeout_ms: 30_000,
            submit_timeout_ms: 10_000,
            submit_settle_ms: 2_000,
            control_poll_ms: 500,
            navigation_backoff_ms: 600,
            max_sub_pages: 500,
        }
    }
}

impl Timings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn table_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.table_ready_timeout_ms)
    }
    pub fn next_button_timeout(&self) -> Duration {
        Duration::from_millis(self.next_button_timeout_ms)
    }
    pub fn redraw_timeout(&self) -> Duration {
        Duration::from_millis(self.redraw_timeout_ms)
    }
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
    pub fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }
    pub fn control_poll(&self) -> Duration {
        Duration::from_millis(self.control_poll_ms)
    }
    pub fn navigation_backoff(&self) -> Duration {
        Duration::from_millis(self.navigation_backoff_ms)
    }
}

impl Config {
    /// Load `TAQEEM_CONFIG` (if set) and apply environment overrides on top
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("TAQEEM_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    fn with_env(self) -> Result<Self, ConfigError> {
        let default = self;
        Ok(Self {
            browser_debug_port: match env_parse::<u16>("BROWSER_DEBUG_PORT")? {
                Some(port) => Some(port),
                None => default.browser_debug_port,
            },
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .map(PathBuf::from)
                .or(default.chrome_executable),
            start_url: std::env::var("START_URL").unwrap_or(default.start_url),
            default_tabs: env_parse("DEFAULT_TABS")?.unwrap_or(default.default_tabs),
            create_batch_size: env_parse("CREATE_BATCH_SIZE")?.unwrap_or(default.create_batch_size),
            store_dir: std::env::var("STORE_DIR")
                .ok()
                .map(PathBuf::from)
                .or(default.store_dir),
            form_spec_path: std::env::var("FORM_SPEC_PATH")
                .ok()
                .map(PathBuf::from)
                .or(default.form_spec_path),
            retention_policy: default.retention_policy,
            log_filter: std::env::var("LOG_FILTER").unwrap_or(default.log_filter),
            timings: default.timings,
        })
    }
}

fn env_parse<T: std::str::FromStr>(var_name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected: std::any::type_name::<T>(),
            }),
        Err(_) => Ok(None),
    }
}
