//! Accelerator strings such as `CommandOrControl+L`.
//!
//! Parsing is platform-free; the native shell maps a [`Shortcut`] onto the
//! hotkey backend through [`Shortcut::code_name`] and the modifier flags.

use std::fmt;

use crate::AppError;

/// Default global shortcut.
pub const DEFAULT_SHORTCUT: &str = "CommandOrControl+L";

/// Non-modifier key of a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    /// `A`..`Z`, stored uppercase.
    Letter(char),
    /// `0`..`9`.
    Digit(char),
    /// `F1`..`F12`.
    Function(u8),
    /// Space bar.
    Space,
}

/// Parsed global shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    /// Command on macOS, Control elsewhere.
    pub primary: bool,
    /// Control.
    pub control: bool,
    /// Alt / Option.
    pub alt: bool,
    /// Shift.
    pub shift: bool,
    /// Command / Windows key.
    pub super_key: bool,
    /// Key pressed together with the modifiers.
    pub key: ShortcutKey,
}

impl Shortcut {
    /// Parses an accelerator; tokens are `+`-separated and case-insensitive.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for unknown tokens, a missing key or more
    /// than one key.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut shortcut_key = None;
        let mut primary = false;
        let mut control = false;
        let mut alt = false;
        let mut shift = false;
        let mut super_key = false;

        for token in raw.split('+').map(str::trim) {
            match token.to_ascii_lowercase().as_str() {
                "commandorcontrol" | "cmdorctrl" | "cmdorcontrol" | "commandorctrl" => {
                    primary = true
                }
                "ctrl" | "control" => control = true,
                "alt" | "option" => alt = true,
                "shift" => shift = true,
                "super" | "cmd" | "command" | "meta" | "win" => super_key = true,
                _ => {
                    if shortcut_key.is_some() {
                        return Err(AppError::Config(format!(
                            "shortcut {raw:?} names more than one key"
                        )));
                    }
                    shortcut_key = Some(parse_key(token).ok_or_else(|| {
                        AppError::Config(format!("unknown key {token:?} in shortcut {raw:?}"))
                    })?);
                }
            }
        }

        let key = shortcut_key
            .ok_or_else(|| AppError::Config(format!("shortcut {raw:?} has no key")))?;
        if !(primary || control || alt || super_key) && matches!(key, ShortcutKey::Letter(_)) {
            return Err(AppError::Config(format!(
                "shortcut {raw:?} needs a modifier for a letter key"
            )));
        }

        Ok(Self {
            primary,
            control,
            alt,
            shift,
            super_key,
            key,
        })
    }

    /// Control resolved for the current platform.
    pub fn uses_control(&self) -> bool {
        self.control || (self.primary && !cfg!(target_os = "macos"))
    }

    /// Command / Windows key resolved for the current platform.
    pub fn uses_super(&self) -> bool {
        self.super_key || (self.primary && cfg!(target_os = "macos"))
    }

    /// W3C `KeyboardEvent.code` name of the key, e.g. `KeyL`.
    pub fn code_name(&self) -> String {
        match self.key {
            ShortcutKey::Letter(letter) => format!("Key{letter}"),
            ShortcutKey::Digit(digit) => format!("Digit{digit}"),
            ShortcutKey::Function(number) => format!("F{number}"),
            ShortcutKey::Space => "Space".to_string(),
        }
    }

    /// Short human label: `⌘L` on macOS, `Ctrl+L` elsewhere.
    pub fn label(&self) -> String {
        let key = match self.key {
            ShortcutKey::Letter(value) | ShortcutKey::Digit(value) => value.to_string(),
            ShortcutKey::Function(number) => format!("F{number}"),
            ShortcutKey::Space => "Space".to_string(),
        };

        if cfg!(target_os = "macos") {
            let mut label = String::new();
            if self.uses_control() {
                label.push('⌃');
            }
            if self.alt {
                label.push('⌥');
            }
            if self.shift {
                label.push('⇧');
            }
            if self.uses_super() {
                label.push('⌘');
            }
            label.push_str(&key);
            return label;
        }

        let mut parts = Vec::new();
        if self.uses_control() {
            parts.push("Ctrl".to_string());
        }
        if self.alt {
            parts.push("Alt".to_string());
        }
        if self.shift {
            parts.push("Shift".to_string());
        }
        if self.uses_super() {
            parts.push("Win".to_string());
        }
        parts.push(key);
        parts.join("+")
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn parse_key(token: &str) -> Option<ShortcutKey> {
    let upper = token.to_ascii_uppercase();
    let mut chars = upper.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        if only.is_ascii_alphabetic() {
            return Some(ShortcutKey::Letter(only));
        }
        if only.is_ascii_digit() {
            return Some(ShortcutKey::Digit(only));
        }
        return None;
    }
    if upper == "SPACE" {
        return Some(ShortcutKey::Space);
    }
    upper
        .strip_prefix('F')
        .and_then(|number| number.parse::<u8>().ok())
        .filter(|number| (1..=12).contains(number))
        .map(ShortcutKey::Function)
}

/// Tray tooltip naming the active shortcut.
pub fn tray_tooltip(shortcut: &Shortcut) -> String {
    format!("Quick by Leonel ({shortcut})")
}

#[cfg(test)]
mod tests {
    //! Unit tests for accelerator parsing.

    use super::*;

    #[test]
    fn default_shortcut_parses_to_primary_l() {
        let shortcut = Shortcut::parse(DEFAULT_SHORTCUT).expect("default should parse");
        assert!(shortcut.primary);
        assert_eq!(shortcut.key, ShortcutKey::Letter('L'));
        assert_eq!(shortcut.code_name(), "KeyL");
    }

    #[test]
    fn primary_resolves_per_platform() {
        let shortcut = Shortcut::parse("CmdOrCtrl+L").expect("should parse");
        if cfg!(target_os = "macos") {
            assert!(shortcut.uses_super());
            assert_eq!(shortcut.label(), "⌘L");
        } else {
            assert!(shortcut.uses_control());
            assert_eq!(shortcut.label(), "Ctrl+L");
        }
    }

    #[test]
    fn tooltip_includes_label() {
        let shortcut = Shortcut::parse("ctrl+shift+F5").expect("should parse");
        assert_eq!(shortcut.key, ShortcutKey::Function(5));
        assert!(tray_tooltip(&shortcut).starts_with("Quick by Leonel ("));
    }

    #[test]
    fn rejects_bad_accelerators() {
        assert!(Shortcut::parse("Ctrl+L+K").is_err());
        assert!(Shortcut::parse("Ctrl+Shift").is_err());
        assert!(Shortcut::parse("Ctrl+Banana").is_err());
        assert!(Shortcut::parse("L").is_err());
        assert!(Shortcut::parse("Ctrl+F13").is_err());
    }
}
