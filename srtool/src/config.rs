use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "srtool.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DiscoverConfig {
    pub host: Option<String>,
    pub ports: Option<String>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ConsoleConfig {
    pub reconnect: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ProfileConfig {
    pub history: Option<usize>,
    pub frames: Option<usize>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct StringsConfig {
    /// String table used to resolve id tags and span names.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub discover: Option<DiscoverConfig>,
    pub console: Option<ConsoleConfig>,
    pub profile: Option<ProfileConfig>,
    pub strings: Option<StringsConfig>,
}

impl Config {
    pub fn strings_path(&self) -> Option<&Path> {
        self.strings.as_ref()?.path.as_deref()
    }
}

/// Load `path`, or `./srtool.yaml` when no path is given and the file exists.
/// An unreadable or malformed file is reported and ignored.
pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    let s = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read config");
            return None;
        }
    };
    parse_config(&s).map_err(|e| tracing::warn!(path = %path.display(), error = %e, "invalid config")).ok()
}

pub fn parse_config(s: &str) -> Result<Config, serde_yaml::Error> {
    serde_yaml::from_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections() {
        let cfg = parse_config(
            "discover:\n  ports: 14000-14030,14032\n  interval_ms: 250\nprofile:\n  history: 50\nstrings:\n  path: data/strings.txt\n",
        )
        .unwrap();
        let d = cfg.discover.clone().unwrap();
        assert_eq!(d.ports.as_deref(), Some("14000-14030,14032"));
        assert_eq!(d.interval_ms, Some(250));
        assert_eq!(d.timeout_ms, None);
        assert_eq!(cfg.profile.as_ref().unwrap().history, Some(50));
        assert!(cfg.console.is_none());
        assert_eq!(cfg.strings_path(), Some(Path::new("data/strings.txt")));
    }

    #[test]
    fn missing_file_is_none() {
        assert!(load_config(Some(Path::new("/nonexistent/srtool.yaml"))).is_none());
    }
}
