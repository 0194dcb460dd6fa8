use crate::runtime::loader::FileSystemLoader;
use std::{env, path::PathBuf};

pub const HOME_ENV: &str = "SAUROS_HOME";
pub const LOG_ENV: &str = "SAUROS_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Runtime settings, each taken from its command-line flag first and the
/// environment second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub home: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home: None,
            search_paths: Vec::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_flags_or_env(
        home: Option<PathBuf>,
        search_paths: Vec<PathBuf>,
        log_filter: Option<String>,
    ) -> Self {
        Self::resolve(home, search_paths, log_filter, |key| env::var(key).ok())
    }

    fn resolve(
        home: Option<PathBuf>,
        search_paths: Vec<PathBuf>,
        log_filter: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let home = home
            .or_else(|| {
                lookup(HOME_ENV)
                    .filter(|value| !value.trim().is_empty())
                    .map(PathBuf::from)
            })
            .or_else(|| {
                lookup("HOME")
                    .map(|user_home| PathBuf::from(user_home).join(".sauros"))
                    .filter(|path| path.is_dir())
            });
        let log_filter = log_filter
            .or_else(|| lookup(LOG_ENV))
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Self {
            home,
            search_paths,
            log_filter,
        }
    }

    /// Import roots in lookup order: the home directory, then extra paths.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        self.home
            .iter()
            .chain(self.search_paths.iter())
            .cloned()
            .collect()
    }

    pub fn loader(&self) -> FileSystemLoader {
        FileSystemLoader::new(self.search_roots())
    }
}
