//! Flag files: saved CLI defaults.
//!
//! Both the global file and the local `.novelreaderrc` hold plain CLI
//! tokens, one or more per line, with `#` comments. They are merged
//! global, then local, then the actual command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const APP_DIR: &str = "novel-reader";
const LOCAL_RC: &str = ".novelreaderrc";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_toc: bool,
    pub toc: bool,
    pub perf: bool,
    pub window: Option<usize>,
    pub wrap_width: Option<u16>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge `other` over `self`: switches accumulate, valued options from
    /// `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_toc: self.no_toc || other.no_toc,
            toc: self.toc || other.toc,
            perf: self.perf || other.perf,
            window: other.window.or(self.window),
            wrap_width: other.wrap_width.or(self.wrap_width),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }

    /// Whether the catalog sidebar starts visible.
    pub const fn toc_visible(&self) -> bool {
        !self.no_toc || self.toc
    }
}

/// Per-user configuration directory for this application.
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR);
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR);
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR);
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR);
        }
    }

    PathBuf::from(".").join(APP_DIR)
}

pub fn global_config_path() -> PathBuf {
    config_dir().join("config")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_RC)
}

/// Read flags from `path`; a missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Write `flags` to `path` as CLI tokens.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# novel-reader defaults (saved with --save)".to_string()];
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.no_toc {
        lines.push("--no-toc".to_string());
    }
    if flags.toc {
        lines.push("--toc".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(window) = flags.window {
        lines.push(format!("--window {window}"));
    }
    if let Some(width) = flags.wrap_width {
        lines.push(format!("--wrap-width {width}"));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// Remove the flag file at `path`, if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick known flags out of a token list. Unknown tokens and unparsable
/// values are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        };
        let mut value = || {
            inline.map(ToOwned::to_owned).or_else(|| {
                let next = tokens.get(i + 1).cloned();
                if next.is_some() {
                    i += 1;
                }
                next
            })
        };
        match name {
            "--watch" => flags.watch = true,
            "--no-toc" => flags.no_toc = true,
            "--toc" => flags.toc = true,
            "--perf" => flags.perf = true,
            "--window" => flags.window = value().and_then(|v| v.parse().ok()).map(|n: usize| n.max(1)),
            "--wrap-width" => flags.wrap_width = value().and_then(|v| v.parse().ok()),
            "--render-debug-log" => flags.render_debug_log = value().map(PathBuf::from),
            _ => {}
        }
        i += 1;
    }
    flags
}
