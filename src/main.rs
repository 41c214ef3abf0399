//! Novel Reader - a terminal reader for large plain-text novels.
//!
//! # Usage
//!
//! ```bash
//! novel-reader book.txt
//! novel-reader --watch book.txt
//! novel-reader                     # reopen the last novel where you left off
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use novel_reader::app::App;
use novel_reader::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use novel_reader::perf;
use novel_reader::settings::{self, MAX_FONT_SIZE, MIN_FONT_SIZE};

/// A terminal reader for large plain-text novels
#[derive(Parser, Debug)]
#[command(name = "novel-reader", version, about, long_about = None)]
struct Cli {
    /// Novel to open; defaults to the one in the settings record
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Reload when the novel file changes on disk
    #[arg(short, long)]
    watch: bool,

    /// Hide the chapter catalog sidebar
    #[arg(long)]
    no_toc: bool,

    /// Start with the chapter catalog visible
    #[arg(long)]
    toc: bool,

    /// Maximum number of chapters kept in memory
    #[arg(long, value_name = "N")]
    window: Option<usize>,

    /// Wrap text at most this many columns wide
    #[arg(long, value_name = "COLS")]
    wrap_width: Option<u16>,

    /// Store a font size in the settings record for graphical front ends
    #[arg(long, value_name = "PT", value_parser = clap::value_parser!(u16).range(i64::from(MIN_FONT_SIZE)..=i64::from(MAX_FONT_SIZE)))]
    font_size: Option<u16>,

    /// Use this settings file instead of the per-user one
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Enable timing logs
    #[arg(long)]
    perf: bool,

    /// Write detailed loading/render debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = perf::debug_log_path(effective.render_debug_log.as_deref());
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize debug log {}: {}",
            debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    let settings_path = cli.settings.clone().unwrap_or_else(settings::settings_path);
    let mut record = settings::load_or_default(&settings_path);
    let before = record.clone();
    if let Some(file) = &cli.file {
        if !file.is_file() {
            anyhow::bail!("File not found: {}", file.display());
        }
        let file = file.canonicalize().unwrap_or_else(|_| file.clone());
        record.set_novel_path(&file);
    }
    if let Some(size) = cli.font_size {
        record.font_size = size;
    }
    if record != before {
        settings::save(&settings_path, &record).context("Failed to update settings")?;
    }

    let mut app = App::new(settings_path)
        .with_watch(effective.watch)
        .with_toc_visible(effective.toc_visible())
        .with_wrap_width(effective.wrap_width)
        .with_config_paths(
            Some(global_path.clone()),
            if local_path.exists() {
                Some(local_path.clone())
            } else {
                None
            },
        );
    if let Some(window) = effective.window {
        app = app.with_max_chapters(window);
    }

    app.run().context("Application error")
}
