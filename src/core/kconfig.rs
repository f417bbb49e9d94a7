//! Kconfig assignment file editing
//!
//! Edits a `.config` in place. Every recognized symbol already appears in a
//! normalized `.config`, either as `CONFIG_X=...` or `# CONFIG_X is not set`,
//! so that file doubles as the schema: keys it does not mention are rejected.
//!
//! Writes go through [`filesystem::write_atomic`] and only happen when a
//! value actually changes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::defaults::{DEFAULT_MAKE, DEFAULT_NORMALIZE_TARGET, KCONFIG_PREFIX, MENUCONFIG_TARGET};
use crate::core::environment::Environment;
use crate::error::{KconfigError, NtxError};
use crate::infra::filesystem;
use crate::infra::process::{BuildResult, CommandSpec, ProcessRunner};

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(CONFIG_[A-Za-z0-9_]+)=(.*)$").expect("valid assignment pattern"));

static NOT_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^# (CONFIG_[A-Za-z0-9_]+) is not set$").expect("valid not-set pattern")
});

static SYMBOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid symbol pattern"));

/// Current value of one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KconfigValue {
    /// `y` or `n` (`# ... is not set`)
    Bool(bool),
    /// Tristate `m`
    Module,
    /// Quoted string, unescaped
    String(String),
    /// Int or hex literal, kept as written
    Number(String),
}

impl KconfigValue {
    fn parse(raw: &str) -> Self {
        match raw {
            "y" => Self::Bool(true),
            "n" => Self::Bool(false),
            "m" => Self::Module,
            _ if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') => {
                Self::String(unescape(&raw[1..raw.len() - 1]))
            }
            _ => Self::Number(raw.to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) | Self::Module => "bool",
            Self::String(_) => "string",
            Self::Number(n) if is_hex(n) => "hex",
            Self::Number(_) => "int",
        }
    }

    /// Line as it appears in `.config`
    fn render(&self, key: &str) -> String {
        match self {
            Self::Bool(true) => format!("{key}=y"),
            Self::Bool(false) => format!("# {key} is not set"),
            Self::Module => format!("{key}=m"),
            Self::String(s) => format!("{key}=\"{}\"", escape(s)),
            Self::Number(n) => format!("{key}={n}"),
        }
    }
}

impl fmt::Display for KconfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("y"),
            Self::Bool(false) => f.write_str("n"),
            Self::Module => f.write_str("m"),
            Self::String(s) | Self::Number(s) => f.write_str(s),
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn is_hex(value: &str) -> bool {
    value.starts_with("0x") || value.starts_with("0X")
}

/// `0x` followed by hex digits, or decimal digits with an optional `-`
fn is_number_literal(value: &str) -> bool {
    if is_hex(value) {
        let digits = &value[2..];
        return !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_hexdigit())
            && u64::from_str_radix(digits, 16).is_ok();
    }
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && value.parse::<i64>().is_ok()
}

/// Canonical `CONFIG_`-prefixed key
pub fn normalize_key(key: &str) -> Result<String, KconfigError> {
    let name = key.trim();
    let name = name.strip_prefix(KCONFIG_PREFIX).unwrap_or(name);
    if !SYMBOL_NAME.is_match(name) {
        return Err(KconfigError::UnknownConfigKey {
            key: key.to_string(),
        });
    }
    Ok(format!("{KCONFIG_PREFIX}{name}"))
}

/// Parse `(key, value)` pairs from `.config` content, in file order
pub fn parse_assignments(content: &str) -> Vec<(String, KconfigValue)> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, KconfigValue)> {
    let line = line.trim_end();
    if let Some(caps) = ASSIGNMENT.captures(line) {
        return Some((caps[1].to_string(), KconfigValue::parse(&caps[2])));
    }
    NOT_SET
        .captures(line)
        .map(|caps| (caps[1].to_string(), KconfigValue::Bool(false)))
}

/// Line-preserving view of a `.config`
struct ConfigDocument {
    lines: Vec<String>,
    index: BTreeMap<String, usize>,
    trailing_newline: bool,
}

impl ConfigDocument {
    fn parse(content: &str) -> Self {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut index = BTreeMap::new();
        for (i, line) in lines.iter().enumerate() {
            if let Some((key, _)) = parse_line(line) {
                index.insert(key, i);
            }
        }
        Self {
            lines,
            index,
            trailing_newline: content.is_empty() || content.ends_with('\n'),
        }
    }

    fn get(&self, key: &str) -> Option<KconfigValue> {
        self.index
            .get(key)
            .and_then(|&i| parse_line(&self.lines[i]))
            .map(|(_, value)| value)
    }

    /// Replace the assignment of a known key; `true` when the value changed
    fn set(&mut self, key: &str, value: &KconfigValue) -> bool {
        let Some(&i) = self.index.get(key) else {
            return false;
        };
        if self.get(key).as_ref() == Some(value) {
            return false;
        }
        self.lines[i] = value.render(key);
        true
    }

    fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Edits and normalizes one Kconfig assignment file
#[derive(Debug, Clone)]
pub struct KconfigManager {
    target: PathBuf,
    nuttx_path: PathBuf,
    make: String,
    normalize_target: String,
    runner: ProcessRunner,
}

impl KconfigManager {
    /// Manager for the primary `.config` of `env`
    pub fn new(env: &Environment, runner: ProcessRunner) -> Self {
        Self {
            target: env.config_path(),
            nuttx_path: env.nuttx_path(),
            make: DEFAULT_MAKE.to_string(),
            normalize_target: DEFAULT_NORMALIZE_TARGET.to_string(),
            runner,
        }
    }

    /// Edit a different assignment file
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    /// Build tool used by `apply` and `menuconfig`
    #[must_use]
    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.make = make.into();
        self
    }

    /// Make target that resolves dependent options
    #[must_use]
    pub fn with_normalize_target(mut self, target: impl Into<String>) -> Self {
        self.normalize_target = target.into();
        self
    }

    /// File being edited
    pub fn target(&self) -> &Path {
        &self.target
    }

    fn load(&self) -> Result<ConfigDocument, KconfigError> {
        match std::fs::read_to_string(&self.target) {
            Ok(content) => Ok(ConfigDocument::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(KconfigError::ConfigNotFound {
                path: self.target.clone(),
            }),
            Err(e) => Err(KconfigError::Io {
                path: self.target.clone(),
                error: e.to_string(),
            }),
        }
    }

    fn store(&self, doc: &ConfigDocument) -> Result<(), KconfigError> {
        filesystem::write_atomic(&self.target, doc.render().as_bytes()).map_err(|e| KconfigError::Io {
            path: self.target.clone(),
            error: e.to_string(),
        })
    }

    fn current(doc: &ConfigDocument, key: &str) -> Result<KconfigValue, KconfigError> {
        doc.get(key).ok_or_else(|| KconfigError::UnknownConfigKey {
            key: key.to_string(),
        })
    }

    fn assign(&self, key: &str, value: KconfigValue, expected: &[&str]) -> Result<bool, KconfigError> {
        let mut doc = self.load()?;
        let current = Self::current(&doc, key)?;
        if !expected.contains(&current.kind()) {
            return Err(KconfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: format!("option is a {} symbol", current.kind()),
            });
        }

        if !doc.set(key, &value) {
            debug!("{key} already {value}, nothing to write");
            return Ok(false);
        }
        self.store(&doc)?;
        info!("Kconfig set: {key}={value}");
        Ok(true)
    }

    /// Enable or disable a bool/tristate option; `true` when the file changed
    pub fn set_value(&self, key: &str, value: bool) -> Result<bool, KconfigError> {
        let key = normalize_key(key)?;
        self.assign(&key, KconfigValue::Bool(value), &["bool"])
    }

    /// Set a string option; `true` when the file changed
    pub fn set_string(&self, key: &str, value: &str) -> Result<bool, KconfigError> {
        let key = normalize_key(key)?;
        if value.contains(['\n', '\r']) {
            return Err(KconfigError::InvalidValue {
                key,
                value: value.to_string(),
                reason: "strings cannot span lines".to_string(),
            });
        }
        self.assign(&key, KconfigValue::String(value.to_string()), &["string"])
    }

    /// Set an int or hex option; the literal must keep the option's base
    pub fn set_number(&self, key: &str, value: &str) -> Result<bool, KconfigError> {
        let key = normalize_key(key)?;
        let value = value.trim();
        let invalid = |reason: &str| KconfigError::InvalidValue {
            key: key.clone(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if !is_number_literal(value) {
            return Err(invalid("expected a decimal or 0x-prefixed hexadecimal number"));
        }

        let doc = self.load()?;
        match (Self::current(&doc, &key)?.kind(), is_hex(value)) {
            ("int", true) => return Err(invalid("int option requires a decimal value")),
            ("hex", false) => return Err(invalid("hex option requires a 0x-prefixed value")),
            _ => {}
        }
        self.assign(&key, KconfigValue::Number(value.to_string()), &["int", "hex"])
    }

    /// Current value of one option
    pub fn get(&self, key: &str) -> Result<KconfigValue, KconfigError> {
        let key = normalize_key(key)?;
        let value = Self::current(&self.load()?, &key)?;
        debug!("Kconfig read: {key}={value}");
        Ok(value)
    }

    /// Every assignment in the file, `# ... is not set` included as `n`
    pub fn read(&self) -> Result<BTreeMap<String, KconfigValue>, KconfigError> {
        let doc = self.load()?;
        Ok(doc
            .index
            .keys()
            .filter_map(|key| doc.get(key).map(|value| (key.clone(), value)))
            .collect())
    }

    /// Apply every assignment from `fragment` in one write
    ///
    /// Returns the number of options that changed. Nothing is written if the
    /// fragment names an option the target does not know.
    pub fn merge(&self, fragment: &Path) -> Result<usize, KconfigError> {
        let content = std::fs::read_to_string(fragment).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KconfigError::ConfigNotFound {
                path: fragment.to_path_buf(),
            },
            _ => KconfigError::Io {
                path: fragment.to_path_buf(),
                error: e.to_string(),
            },
        })?;

        let mut doc = self.load()?;
        let assignments = parse_assignments(&content);
        if let Some((key, _)) = assignments.iter().find(|(key, _)| !doc.index.contains_key(key)) {
            return Err(KconfigError::UnknownConfigKey { key: key.clone() });
        }

        let changed = assignments
            .iter()
            .filter(|(key, value)| doc.set(key, value))
            .count();
        if changed > 0 {
            self.store(&doc)?;
        }
        info!(
            "Merged {} into {}: {changed} option(s) changed",
            fragment.display(),
            self.target.display()
        );
        Ok(changed)
    }

    /// Run the normalization target so dependent options settle
    pub async fn apply(&self) -> Result<BuildResult, NtxError> {
        self.load()?;
        let spec = CommandSpec::from_line(&self.make, &self.nuttx_path).arg(&self.normalize_target);
        info!("Normalizing {}", self.target.display());
        Ok(self.runner.run(&spec).await?)
    }

    /// Open the curses configurator on the terminal
    pub async fn menuconfig(&self) -> Result<BuildResult, NtxError> {
        self.load()?;
        let spec = CommandSpec::from_line(&self.make, &self.nuttx_path)
            .arg(MENUCONFIG_TARGET)
            .interactive();
        Ok(self.runner.run(&spec).await?)
    }
}
