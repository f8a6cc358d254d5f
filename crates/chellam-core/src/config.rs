//! Configuration — YAML config + env var overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do with a submission that arrives while a turn is still busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Hold it and run it after the current turn finishes revealing
    #[default]
    Queue,
    /// Drop it and tell the frontend
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name of the bot
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Session id passed to the reply engine
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Directory of YAML brain files (relative to the config file)
    #[serde(default = "default_brain_dir")]
    pub brain_dir: String,

    /// Opening line revealed when the session starts
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,

    /// Revealed when an exit keyword is submitted
    #[serde(default = "default_farewell")]
    pub farewell: String,

    /// Shown instead of a reply when the engine fails
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Matched case-insensitively against the whole trimmed input
    #[serde(default = "default_exit_keywords")]
    pub exit_keywords: Vec<String>,

    /// Delay between typing indicator frames
    #[serde(default = "default_typing_interval")]
    pub typing_interval_ms: u64,

    /// Base delay between revealed chars
    #[serde(default = "default_reveal_base_delay")]
    pub reveal_base_delay_ms: u64,

    /// Symmetric jitter added to the base delay
    #[serde(default = "default_reveal_jitter")]
    pub reveal_jitter_ms: u64,

    /// Floor for the jittered delay
    #[serde(default = "default_reveal_min_delay")]
    pub reveal_min_delay_ms: u64,

    /// Simulated thinking time before the engine is called
    #[serde(default = "default_think_min")]
    pub think_min_ms: u64,

    #[serde(default = "default_think_max")]
    pub think_max_ms: u64,

    /// Delay between the farewell and shutdown
    #[serde(default = "default_exit_delay")]
    pub exit_delay_ms: u64,

    /// Engine calls slower than this get the fallback reply (null = wait forever)
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_ms: Option<u64>,

    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Fixed seed for jitter and think latency (unset = entropy)
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Resolved project root (set at load time, not serialized from YAML)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_bot_name() -> String {
    "Chellam".into()
}
fn default_session_id() -> String {
    "localuser".into()
}
fn default_brain_dir() -> String {
    "brain".into()
}
fn default_greeting() -> Option<String> {
    Some("Hello! I'm your smart assistant. How can I help you today? 😊".into())
}
fn default_farewell() -> String {
    "Goodbye! Take care".into()
}
fn default_fallback_reply() -> String {
    "Sorry, something went wrong on my side. Could you say that again?".into()
}
fn default_exit_keywords() -> Vec<String> {
    vec!["quit".into(), "exit".into(), "bye".into()]
}
fn default_typing_interval() -> u64 {
    400
}
fn default_reveal_base_delay() -> u64 {
    10
}
fn default_reveal_jitter() -> u64 {
    3
}
fn default_reveal_min_delay() -> u64 {
    5
}
fn default_think_min() -> u64 {
    500
}
fn default_think_max() -> u64 {
    1500
}
fn default_exit_delay() -> u64 {
    1500
}
fn default_reply_timeout() -> Option<u64> {
    Some(30_000)
}

impl Config {
    /// Load config from a YAML file with env var overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        config.project_root = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
            .canonicalize()
            .unwrap_or_else(|_| {
                config_path
                    .parent()
                    .unwrap_or(Path::new("."))
                    .to_path_buf()
            });

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the default location (project_root/config.yaml)
    pub fn load_from_dir(project_root: &Path) -> Result<Self> {
        Self::load(&project_root.join("config.yaml"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CHELLAM_BRAIN_DIR") {
            self.brain_dir = dir;
        }
        if let Ok(id) = std::env::var("CHELLAM_SESSION_ID") {
            self.session_id = id;
        }
        if let Ok(seed) = std::env::var("CHELLAM_SEED") {
            let seed = seed
                .parse()
                .with_context(|| format!("CHELLAM_SEED is not a number: {}", seed))?;
            self.rng_seed = Some(seed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.think_min_ms > self.think_max_ms {
            anyhow::bail!(
                "think_min_ms ({}) must not exceed think_max_ms ({})",
                self.think_min_ms,
                self.think_max_ms
            );
        }
        if self.typing_interval_ms == 0 {
            anyhow::bail!("typing_interval_ms must be positive");
        }
        if self.reveal_min_delay_ms == 0 {
            anyhow::bail!("reveal_min_delay_ms must be positive");
        }
        if self.exit_keywords.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("exit_keywords must name at least one keyword");
        }
        Ok(())
    }

    /// Resolve the brain directory against the project root
    pub fn resolve_brain_dir(&self) -> PathBuf {
        let p = Path::new(&self.brain_dir);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }

    pub fn is_exit_keyword(&self, input: &str) -> bool {
        let input = input.trim();
        self.exit_keywords
            .iter()
            .any(|k| k.trim().eq_ignore_ascii_case(input))
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            session_id: default_session_id(),
            brain_dir: default_brain_dir(),
            greeting: default_greeting(),
            farewell: default_farewell(),
            fallback_reply: default_fallback_reply(),
            exit_keywords: default_exit_keywords(),
            typing_interval_ms: default_typing_interval(),
            reveal_base_delay_ms: default_reveal_base_delay(),
            reveal_jitter_ms: default_reveal_jitter(),
            reveal_min_delay_ms: default_reveal_min_delay(),
            think_min_ms: default_think_min(),
            think_max_ms: default_think_max(),
            exit_delay_ms: default_exit_delay(),
            reply_timeout_ms: default_reply_timeout(),
            busy_policy: BusyPolicy::default(),
            rng_seed: None,
            project_root: PathBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "bot_name: Chellam").unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.bot_name, "Chellam");
        assert_eq!(config.typing_interval_ms, 400);
        assert_eq!(config.reveal_base_delay_ms, 10);
        assert_eq!(config.reveal_jitter_ms, 3);
        assert_eq!(config.reveal_min_delay_ms, 5);
        assert_eq!(config.exit_delay_ms, 1500);
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
        assert_eq!(config.farewell, "Goodbye! Take care");
    }

    #[test]
    fn test_load_config_custom_values() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "greeting: null\nbusy_policy: reject\nthink_min_ms: 0\nthink_max_ms: 0\nreply_timeout_ms: null"
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.greeting, None);
        assert_eq!(config.busy_policy, BusyPolicy::Reject);
        assert_eq!(config.think_max_ms, 0);
        assert_eq!(config.reply_timeout(), None);
    }

    #[test]
    fn test_inverted_think_range_fails() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "think_min_ms: 900\nthink_max_ms: 100").unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn test_zero_typing_interval_fails() {
        let config = Config {
            typing_interval_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exit_keywords_case_insensitive() {
        let config = Config::default();
        assert!(config.is_exit_keyword("BYE"));
        assert!(config.is_exit_keyword("Bye"));
        assert!(config.is_exit_keyword("  bye "));
        assert!(config.is_exit_keyword("Quit"));
        assert!(!config.is_exit_keyword("goodbye"));
        assert!(!config.is_exit_keyword("bye now"));
    }

    #[test]
    fn test_brain_dir_relative_to_root() {
        let config = Config {
            project_root: PathBuf::from("/srv/chellam"),
            ..Config::default()
        };
        assert_eq!(config.resolve_brain_dir(), PathBuf::from("/srv/chellam/brain"));
    }
}
