//! Instaview - inspect how an instant view page flattens.
//!
//! # Usage
//!
//! ```bash
//! instaview page.json
//! instaview --open-all --search "climate" page.json
//! instaview --anchor footnotes page.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use instaview::config::{
    FontFamily, ViewerFlags, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use instaview::document::{Navigation, Page, PageSession, RowDelta, RowType, get_plain_text};
use instaview::perf;
use instaview::search::SearchMatch;
use instaview::search::worker::{SearchController, search_blocking};

/// Flatten an instant view page and print its visible rows
#[derive(Parser, Debug)]
#[command(name = "instaview", version, about, long_about = None)]
struct Cli {
    /// Page JSON file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Search the page and list matches
    #[arg(short, long, value_name = "QUERY")]
    search: Option<String>,

    /// Jump to an anchor, opening sections that hide it
    #[arg(short, long, value_name = "NAME")]
    anchor: Option<String>,

    /// Start with every collapsible section open
    #[arg(long)]
    open_all: bool,

    /// Number ordered lists right-to-left
    #[arg(long)]
    rtl: bool,

    /// Font size change in points
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    font_size: Option<i32>,

    /// Font family
    #[arg(long, value_enum)]
    font_family: Option<FontFamily>,

    /// Layout width class
    #[arg(long, value_name = "PX", default_value_t = 360)]
    width_class: u32,

    /// Search debounce in milliseconds
    #[arg(long, value_name = "MS")]
    search_debounce: Option<u64>,

    /// Print the outline instead of rows
    #[arg(long)]
    outline: bool,

    /// Print links found in the page
    #[arg(long)]
    links: bool,

    /// Enable performance logging
    #[arg(long)]
    perf: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn row_marker(session: &PageSession, id: usize, row_type: RowType) -> &'static str {
    match row_type {
        RowType::Details if session.visibility().is_open(id) => "▾ ",
        RowType::Details => "▸ ",
        RowType::ListItem => "• ",
        _ => "",
    }
}

fn print_rows(session: &PageSession) {
    for (index, (id, row)) in session.visible_rows().enumerate() {
        let row_type = row.row_type();
        let indent = "  ".repeat(row.level);
        println!(
            "{index:>4} {id:>4} {indent}{}{row_type:?} {}",
            row_marker(session, id, row_type),
            session.page().row_text(id)
        );
    }
}

fn print_deltas(deltas: &[RowDelta]) {
    for delta in deltas {
        match delta {
            RowDelta::Inserted { start, count } => println!("  + {count} rows at {start}"),
            RowDelta::Removed { start, count } => println!("  - {count} rows at {start}"),
        }
    }
}

fn run_search(session: &PageSession, query: &str, debounce_ms: u64) -> Vec<SearchMatch> {
    let fragments = session.search_fragments();
    match SearchController::new(debounce_ms) {
        Ok(mut controller) => {
            controller.dispatch(fragments, query.to_string());
            if controller.wait(Duration::from_secs(10)) {
                return controller.state().matches().to_vec();
            }
            tracing::warn!("search worker did not answer, searching inline");
        }
        Err(err) => tracing::warn!(%err, "could not start search worker"),
    }
    search_blocking(fragments, query)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
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
        ViewerFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags).union(&ViewerFlags {
        font_size_delta: cli.font_size,
        font_family: cli.font_family,
        rtl: cli.rtl,
        open_all: cli.open_all,
        perf: cli.perf,
        search_debounce_ms: cli.search_debounce,
    });
    perf::set_enabled(effective.perf);

    let page = Page::load(&cli.file)
        .with_context(|| format!("Failed to load page {}", cli.file.display()))?;
    let mut session = PageSession::open(&page, &effective, cli.width_class);

    if cli.outline {
        for entry in session.page().outline() {
            println!("{}{}", "  ".repeat(usize::from(entry.level)), entry.text);
        }
        return Ok(());
    }

    if cli.links {
        for link in session.page().links() {
            println!("{:>4} {} -> {}", link.row, link.text, link.target.as_str());
        }
        return Ok(());
    }

    if let Some(name) = &cli.anchor {
        match session.navigate_to_anchor(name) {
            Ok(Navigation::Overlay(text)) => println!("#{name}: {}", get_plain_text(&text)),
            Ok(Navigation::Scroll { target, deltas }) => {
                println!("#{name} -> visible row {}", target.visible_row);
                print_deltas(&deltas);
            }
            Err(err) => println!("{err}; staying at top"),
        }
    }

    if let Some(query) = &cli.search {
        let matches = run_search(&session, query, effective.search_debounce_ms());
        println!("{} matches for {query:?}", matches.len());
        for found in &matches {
            match session.scroll_target_for_match(found) {
                Ok((target, deltas)) => {
                    println!(
                        "  row {} (visible {}) at {}",
                        found.owner, target.visible_row, found.start
                    );
                    print_deltas(&deltas);
                }
                Err(err) => println!("  {err}"),
            }
        }
    }

    print_rows(&session);
    Ok(())
}
