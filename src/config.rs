//! Manager configuration: geometry defaults, fonts, and the focus policy
//! choice. Loading this from a config file is plumbing outside the core;
//! this module only defines the shape and sane defaults, as a plain data
//! struct the rest of the crate reads from.
use serde::{Deserialize, Serialize};

use crate::client::{DEFAULT_BORDER, DEFAULT_TITLEBAR_HEIGHT};
use crate::movresize::SNAP_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusPolicyKind {
    Sloppy,
    ClickToFocus,
}

impl Default for FocusPolicyKind {
    fn default() -> Self {
        FocusPolicyKind::Sloppy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colors {
    pub focused_border: u32,
    pub unfocused_border: u32,
    pub focused_bg: u32,
    pub unfocused_bg: u32,
    pub focused_fg: u32,
    pub unfocused_fg: u32,
}

impl Default for Colors {
    fn default() -> Self {
        Colors {
            focused_border: 0x458588,
            unfocused_border: 0x3c3836,
            focused_bg: 0x282828,
            unfocused_bg: 0x282828,
            focused_fg: 0xf2e5bc,
            unfocused_fg: 0xa89984,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub border_px: u32,
    pub titlebar_height: u32,
    pub snap_threshold: i32,
    pub focus_policy: FocusPolicyKind,
    pub focus_new_windows: bool,
    pub fonts: Vec<String>,
    pub colors: Colors,
    /// Path to an executable run once at startup.
    pub startup_script: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            border_px: DEFAULT_BORDER,
            titlebar_height: DEFAULT_TITLEBAR_HEIGHT,
            snap_threshold: SNAP_THRESHOLD,
            focus_policy: FocusPolicyKind::default(),
            focus_new_windows: false,
            fonts: vec!["fixed".to_string()],
            colors: Colors::default(),
            startup_script: None,
        }
    }
}

impl Config {
    /// Parse a TOML config file's contents. Unknown keys are ignored so
    /// configs stay forward-compatible; missing keys fall back to
    /// [`Config::default`] via `#[serde(default)]` equivalents baked into
    /// each field's type here by round-tripping through a partial struct.
    pub fn from_toml(input: &str) -> crate::error::Result<Config> {
        #[derive(Deserialize)]
        struct Partial {
            border_px: Option<u32>,
            titlebar_height: Option<u32>,
            snap_threshold: Option<i32>,
            focus_policy: Option<FocusPolicyKind>,
            focus_new_windows: Option<bool>,
            fonts: Option<Vec<String>>,
            colors: Option<Colors>,
            startup_script: Option<String>,
        }

        let partial: Partial = toml::from_str(input)?;
        let default = Config::default();
        Ok(Config {
            border_px: partial.border_px.unwrap_or(default.border_px),
            titlebar_height: partial.titlebar_height.unwrap_or(default.titlebar_height),
            snap_threshold: partial.snap_threshold.unwrap_or(default.snap_threshold),
            focus_policy: partial.focus_policy.unwrap_or(default.focus_policy),
            focus_new_windows: partial.focus_new_windows.unwrap_or(default.focus_new_windows),
            fonts: partial.fonts.unwrap_or(default.fonts),
            colors: partial.colors.unwrap_or(default.colors),
            startup_script: partial.startup_script.or(default.startup_script),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let cfg = Config::default();
        assert!(cfg.titlebar_height > 0);
        assert_eq!(cfg.focus_policy, FocusPolicyKind::Sloppy);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = Config::from_toml("border_px = 4\n").unwrap();
        assert_eq!(cfg.border_px, 4);
        assert_eq!(cfg.titlebar_height, Config::default().titlebar_height);
    }

    #[test]
    fn focus_policy_parses_from_toml() {
        let cfg = Config::from_toml("focus_policy = \"ClickToFocus\"\n").unwrap();
        assert_eq!(cfg.focus_policy, FocusPolicyKind::ClickToFocus);
    }
}
