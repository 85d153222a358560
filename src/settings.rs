use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sink::SinkFormat;

const CONFIG_FILE: &str = "quotes";
const ENV_PREFIX: &str = "QUOTES";

const DEFAULT_URLS: &[&str] = &[
    "http://quotes.toscrape.com/page/1/",
    "http://quotes.toscrape.com/page/2/",
];
const DEFAULT_USER_AGENT: &str = "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub urls: Vec<String>,
    pub fetch: FetchSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// 1 fetches strictly in order; larger values fetch concurrently.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub stem: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            urls: DEFAULT_URLS.iter().map(|u| u.to_string()).collect(),
            fetch: FetchSettings::default(),
            output: OutputSettings {
                dir: PathBuf::from("data"),
                stem: "quotes".into(),
            },
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout_secs: 30,
            concurrency: 1,
        }
    }
}

impl Settings {
    /// Defaults, then `quotes.toml` if present, then `QUOTES__*` variables.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn sink_path(&self, format: SinkFormat) -> PathBuf {
        self.output
            .dir
            .join(format!("{}.{}", self.output.stem, format.extension()))
    }

    pub fn snapshot_path(&self, format: SinkFormat) -> PathBuf {
        self.output
            .dir
            .join(format!("{}.{}.table", self.output.stem, format.extension()))
    }
}
