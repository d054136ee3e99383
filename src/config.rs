use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::document::LayoutKey;

/// Debounce used for search when no rc file or flag sets one.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(clap::ValueEnum, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    #[default]
    Sans,
    Serif,
    Mono,
}

impl FontFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sans => "sans",
            Self::Serif => "serif",
            Self::Mono => "mono",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ViewerFlags {
    pub font_size_delta: Option<i32>,
    pub font_family: Option<FontFamily>,
    pub rtl: bool,
    pub open_all: bool,
    pub perf: bool,
    pub search_debounce_ms: Option<u64>,
}

impl ViewerFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            font_size_delta: other.font_size_delta.or(self.font_size_delta),
            font_family: other.font_family.or(self.font_family),
            rtl: self.rtl || other.rtl,
            open_all: self.open_all || other.open_all,
            perf: self.perf || other.perf,
            search_debounce_ms: other.search_debounce_ms.or(self.search_debounce_ms),
        }
    }

    pub fn font_size_delta(&self) -> i32 {
        self.font_size_delta.unwrap_or(0)
    }

    pub fn font_family(&self) -> FontFamily {
        self.font_family.unwrap_or_default()
    }

    pub fn search_debounce_ms(&self) -> u64 {
        self.search_debounce_ms.unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS)
    }

    /// Layout inputs that, when changed, invalidate cached offsets.
    pub fn layout_key(&self, width_class: u32) -> LayoutKey {
        LayoutKey {
            width_class,
            font_size_delta: self.font_size_delta(),
            font_family: self.font_family(),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("instaview").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("instaview")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("instaview").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("instaview")
                .join("config");
        }
    }

    PathBuf::from(".instaviewrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".instaviewrc")
}

pub fn load_config_flags(path: &Path) -> Result<ViewerFlags> {
    if !path.exists() {
        return Ok(ViewerFlags::default());
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

pub fn save_config_flags(path: &Path, flags: &ViewerFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# instaview defaults (saved with --save)".to_string());
    if let Some(delta) = flags.font_size_delta {
        lines.push(format!("--font-size {delta}"));
    }
    if let Some(family) = flags.font_family {
        lines.push(format!("--font-family {}", family.as_str()));
    }
    if flags.rtl {
        lines.push("--rtl".to_string());
    }
    if flags.open_all {
        lines.push("--open-all".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(ms) = flags.search_debounce_ms {
        lines.push(format!("--search-debounce {ms}"));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the viewer flags out of a CLI-style token list. Unknown tokens are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ViewerFlags {
    let mut flags = ViewerFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        };
        match name {
            "--rtl" => flags.rtl = true,
            "--open-all" => flags.open_all = true,
            "--perf" => flags.perf = true,
            "--font-size" | "--font-family" | "--search-debounce" => {
                let value = match inline {
                    Some(value) => Some(value),
                    None => {
                        let next = tokens.get(i + 1).map(String::as_str);
                        if next.is_some() {
                            i += 1;
                        }
                        next
                    }
                };
                if let Some(value) = value {
                    apply_valued_flag(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_valued_flag(flags: &mut ViewerFlags, name: &str, value: &str) {
    match name {
        "--font-size" => flags.font_size_delta = value.parse().ok(),
        "--font-family" => flags.font_family = parse_font_family(value),
        "--search-debounce" => flags.search_debounce_ms = value.parse().ok(),
        _ => {}
    }
}

fn parse_font_family(s: &str) -> Option<FontFamily> {
    match s {
        "sans" => Some(FontFamily::Sans),
        "serif" => Some(FontFamily::Serif),
        "mono" => Some(FontFamily::Mono),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = tokens(&[
            "instaview",
            "--rtl",
            "--open-all",
            "--font-size",
            "-2",
            "--font-family=serif",
            "--search-debounce",
            "150",
            "page.json",
        ]);
        let flags = parse_flag_tokens(&args);
        assert!(flags.rtl);
        assert!(flags.open_all);
        assert!(!flags.perf);
        assert_eq!(flags.font_size_delta, Some(-2));
        assert_eq!(flags.font_family, Some(FontFamily::Serif));
        assert_eq!(flags.search_debounce_ms, Some(150));
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let flags = parse_flag_tokens(&tokens(&["--font-size", "big", "--font-family=comic"]));
        assert_eq!(flags.font_size_delta, None);
        assert_eq!(flags.font_family, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ViewerFlags {
            rtl: true,
            font_size_delta: Some(2),
            font_family: Some(FontFamily::Mono),
            ..ViewerFlags::default()
        };
        let cli = ViewerFlags {
            open_all: true,
            font_size_delta: Some(-1),
            ..ViewerFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.rtl);
        assert!(merged.open_all);
        assert_eq!(merged.font_size_delta, Some(-1));
        assert_eq!(merged.font_family, Some(FontFamily::Mono));
    }

    #[test]
    fn test_layout_key_tracks_font_settings() {
        let flags = ViewerFlags::default();
        let key = flags.layout_key(360);
        assert_eq!(key.font_size_delta, 0);
        assert_eq!(key.font_family, FontFamily::Sans);

        let bigger = ViewerFlags {
            font_size_delta: Some(3),
            ..ViewerFlags::default()
        };
        assert_ne!(bigger.layout_key(360), key);
        assert_ne!(flags.layout_key(640), key);
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".instaviewrc");
        let flags = ViewerFlags {
            font_size_delta: Some(4),
            font_family: Some(FontFamily::Serif),
            rtl: true,
            open_all: true,
            perf: true,
            search_debounce_ms: Some(120),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempdir().unwrap();
        let loaded = load_config_flags(&dir.path().join("absent")).unwrap();
        assert_eq!(loaded, ViewerFlags::default());
    }
}
