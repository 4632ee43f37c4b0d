use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_JOURNAL_FILE: &str = "journal.jsonl";
const DEFAULT_DESCRIPTION_WIDTH: usize = 40;
const MIN_DESCRIPTION_WIDTH: usize = 8;

/// Top-level configuration loaded from `<data dir>/config.toml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Journal location and retention.
    #[serde(default)]
    pub journal: JournalConfig,
    /// Presentation settings handed to the renderer.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl ProjectConfig {
    /// Load configuration from a data directory; a missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = dir.as_ref().join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse {}", config_path.display()))
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    /// Returns an error for malformed TOML or out-of-range values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Where the journal lives for a given data directory.
    #[must_use]
    pub fn journal_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(&self.journal.file)
    }

    fn validate(&self) -> Result<()> {
        self.journal.validate()?;
        self.display.validate()
    }
}

/// `[journal]` block.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    /// Journal file name, relative to the data directory.
    pub file: PathBuf,
    /// Undo depth kept when compacting; `None` keeps the whole history.
    pub history_limit: Option<usize>,
    /// Compact when the engine opens.
    pub compact_on_open: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_JOURNAL_FILE),
            history_limit: None,
            compact_on_open: true,
        }
    }
}

impl JournalConfig {
    fn validate(&self) -> Result<()> {
        if self.file.as_os_str().is_empty() {
            bail!("journal.file must not be empty");
        }
        if !self
            .file
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            bail!(
                "journal.file must be a relative path inside the data directory: {}",
                self.file.display()
            );
        }
        if self.history_limit == Some(0) {
            bail!("journal.history_limit must be at least 1 (omit it to keep everything)");
        }
        Ok(())
    }
}

/// How instants are written in listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ClockStyle {
    /// `14:30`
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
    /// `2:30 PM`
    #[serde(rename = "12h")]
    TwelveHour,
}

/// `[display]` block.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Time display style.
    pub clock: ClockStyle,
    /// Maximum description column width, in grapheme clusters.
    pub description_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            clock: ClockStyle::default(),
            description_width: DEFAULT_DESCRIPTION_WIDTH,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<()> {
        if self.description_width < MIN_DESCRIPTION_WIDTH {
            bail!(
                "display.description_width must be at least {MIN_DESCRIPTION_WIDTH}, got {}",
                self.description_width
            );
        }
        Ok(())
    }
}
