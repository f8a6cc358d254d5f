//! Reply engines — the trait the worker calls, plus a small pattern-script
//! engine loaded from a directory of YAML brain files.
//!
//! Brain file format:
//!
//! ```yaml
//! rules:
//!   - pattern: "hello *"
//!     replies: ["Hi! What's new?", "Hello there!"]
//!   - pattern: "my name is *"
//!     replies: ["Nice to meet you, <star>!"]
//! fallback: ["I'm not sure I follow."]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Maps (session, input) to a reply. Called from the blocking pool, never
/// from the UI loop, so implementations may be slow.
pub trait ReplyEngine: Send + Sync {
    fn reply(&self, session_id: &str, text: &str) -> anyhow::Result<String>;
}

impl<F> ReplyEngine for F
where
    F: Fn(&str, &str) -> anyhow::Result<String> + Send + Sync,
{
    fn reply(&self, session_id: &str, text: &str) -> anyhow::Result<String> {
        self(session_id, text)
    }
}

#[derive(Debug, Error)]
pub enum BrainError {
    #[error("failed to read brain at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse brain file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no rules found in {0}")]
    Empty(PathBuf),

    #[error("rule in {path} has {problem}: {pattern:?}")]
    BadRule {
        path: PathBuf,
        pattern: String,
        problem: &'static str,
    },

    #[error("no reply matched {0:?}")]
    NoMatch(String),
}

#[derive(Debug, Deserialize)]
struct BrainFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
    #[serde(default)]
    fallback: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleSpec {
    pattern: String,
    replies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Star,
}

#[derive(Debug)]
struct Rule {
    tokens: Vec<Token>,
    replies: Vec<String>,
}

impl Rule {
    /// Number of literal words; more specific rules are tried first.
    fn literal_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, Token::Word(_)))
            .count()
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|w| w.trim_matches('\'').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn parse_pattern(pattern: &str) -> Vec<Token> {
    pattern
        .split_whitespace()
        .flat_map(|part| {
            if part == "*" {
                vec![Token::Star]
            } else {
                normalize(part).into_iter().map(Token::Word).collect()
            }
        })
        .collect()
}

/// Match `words` against `tokens`. A star takes one or more words. Returns
/// the words captured by each star.
fn match_tokens(tokens: &[Token], words: &[String]) -> Option<Vec<String>> {
    match tokens.split_first() {
        None => words.is_empty().then(Vec::new),
        Some((Token::Word(w), rest)) => {
            let (first, tail) = words.split_first()?;
            if first != w {
                return None;
            }
            match_tokens(rest, tail)
        }
        Some((Token::Star, rest)) => {
            // Shortest capture first so later literals anchor as early as possible
            for take in 1..=words.len() {
                if let Some(mut captures) = match_tokens(rest, &words[take..]) {
                    captures.insert(0, words[..take].join(" "));
                    return Some(captures);
                }
            }
            None
        }
    }
}

/// Pattern/reply engine in the spirit of a chat-script brain.
pub struct ScriptEngine {
    rules: Vec<Rule>,
    fallback: Vec<String>,
    /// Last reply per session, so the same line is not picked twice in a row
    last_reply: Mutex<HashMap<String, String>>,
}

impl ScriptEngine {
    /// Load every `*.yaml` / `*.yml` file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, BrainError> {
        let entries = std::fs::read_dir(dir).map_err(|source| BrainError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        files.sort();

        let mut rules = Vec::new();
        let mut fallback = Vec::new();
        for path in &files {
            let content = std::fs::read_to_string(path).map_err(|source| BrainError::Io {
                path: path.clone(),
                source,
            })?;
            let brain: BrainFile =
                serde_yaml::from_str(&content).map_err(|source| BrainError::Parse {
                    path: path.clone(),
                    source,
                })?;
            for raw in brain.rules {
                rules.push(compile_rule(path, raw)?);
            }
            fallback.extend(brain.fallback);
        }

        if rules.is_empty() {
            return Err(BrainError::Empty(dir.to_path_buf()));
        }
        info!(
            "Loaded {} rule(s) from {} brain file(s) in {}",
            rules.len(),
            files.len(),
            dir.display()
        );
        Ok(Self::from_rules(rules, fallback))
    }

    fn from_rules(mut rules: Vec<Rule>, fallback: Vec<String>) -> Self {
        // Stable sort keeps file order among equally specific rules
        rules.sort_by_key(|r| std::cmp::Reverse(r.literal_count()));
        Self {
            rules,
            fallback,
            last_reply: Mutex::new(HashMap::new()),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn pick(&self, session_id: &str, candidates: &[String]) -> String {
        let mut last = self
            .last_reply
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = last.get(session_id);
        let fresh: Vec<&String> = candidates
            .iter()
            .filter(|c| Some(*c) != previous)
            .collect();
        let pool: Vec<&String> = if fresh.is_empty() {
            candidates.iter().collect()
        } else {
            fresh
        };
        let choice = pool[rand::thread_rng().gen_range(0..pool.len())].clone();
        last.insert(session_id.to_string(), choice.clone());
        choice
    }
}

fn compile_rule(path: &Path, raw: RuleSpec) -> Result<Rule, BrainError> {
    let tokens = parse_pattern(&raw.pattern);
    let problem = if tokens.is_empty() {
        Some("an empty pattern")
    } else if raw.replies.is_empty() {
        Some("no replies")
    } else {
        None
    };
    if let Some(problem) = problem {
        return Err(BrainError::BadRule {
            path: path.to_path_buf(),
            pattern: raw.pattern,
            problem,
        });
    }
    Ok(Rule {
        tokens,
        replies: raw.replies,
    })
}

impl ReplyEngine for ScriptEngine {
    fn reply(&self, session_id: &str, text: &str) -> anyhow::Result<String> {
        let words = normalize(text);
        for rule in &self.rules {
            if let Some(captures) = match_tokens(&rule.tokens, &words) {
                let reply = self.pick(session_id, &rule.replies);
                let star = captures.first().map(String::as_str).unwrap_or("");
                return Ok(reply.replace("<star>", star));
            }
        }
        debug!("No rule matched {:?}", text);
        if self.fallback.is_empty() {
            return Err(BrainError::NoMatch(text.to_string()).into());
        }
        Ok(self.pick(session_id, &self.fallback))
    }
}
