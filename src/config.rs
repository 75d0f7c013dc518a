use crate::cli::CliArgs;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
pub const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Effective settings after merging the config file under CLI flags.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub server: String,
    pub namespace: String,
    pub timeout: Duration,
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct KubedeckConfigFile {
    #[serde(default, alias = "base_url", alias = "url")]
    server: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default, alias = "timeout", alias = "timeout_s")]
    timeout_secs: Option<u64>,
    #[serde(default)]
    session_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let (source, file) = match discover_config_path() {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                let parsed = parse_config(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?;
                (Some(path.display().to_string()), parsed)
            }
            None => (None, KubedeckConfigFile::default()),
        };
        Ok(Self::merge(args, source, file))
    }

    fn merge(args: &CliArgs, source: Option<String>, file: KubedeckConfigFile) -> Self {
        let server = args
            .server
            .clone()
            .or(file.server)
            .filter(|server| !server.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let namespace = args
            .namespace
            .clone()
            .or(file.namespace)
            .filter(|namespace| !namespace.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let timeout_secs = args
            .timeout_secs
            .or(file.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            source,
            server: server.trim_end_matches('/').to_string(),
            namespace,
            timeout: Duration::from_secs(timeout_secs),
            session_dir: file.session_dir,
        }
    }
}

fn parse_config(raw: &str) -> Result<KubedeckConfigFile> {
    if raw.trim().is_empty() {
        return Ok(KubedeckConfigFile::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubedeck.yaml"),
        PathBuf::from("kubedeck.yml"),
        PathBuf::from(".kubedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kubedeck/config.yaml"),
            PathBuf::from(&home).join(".config/kubedeck/config.yml"),
            PathBuf::from(&home).join(".kubedeck.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_NAMESPACE, DEFAULT_SERVER, Settings, parse_config};
    use crate::cli::CliArgs;
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn file_values_fill_unset_flags() {
        let file = parse_config(
            "server: http://dash.local:8080/\nnamespace: apps\ntimeout: 4\nsession_dir: /run/kd\n",
        )
        .expect("config");
        let args = CliArgs::parse_from(["kubedeck", "-n", "kube-system"]);

        let settings = Settings::merge(&args, Some("kubedeck.yaml".to_string()), file);
        assert_eq!(settings.server, "http://dash.local:8080");
        assert_eq!(settings.namespace, "kube-system");
        assert_eq!(settings.timeout, Duration::from_secs(4));
        assert_eq!(settings.session_dir, Some(PathBuf::from("/run/kd")));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = parse_config("").expect("config");
        let args = CliArgs::parse_from(["kubedeck"]);

        let settings = Settings::merge(&args, None, file);
        assert_eq!(settings.server, DEFAULT_SERVER);
        assert_eq!(settings.namespace, DEFAULT_NAMESPACE);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert!(settings.session_dir.is_none());
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        assert!(parse_config("server: [unterminated").is_err());
    }
}
