//! Modifier sets and key codes for global shortcuts
//!
//! Key codes use the virtual-key numbering (letters and digits map to their
//! ASCII upper-case values), which backends translate to their host's codes.

use std::fmt;
use std::str::FromStr;

/// Set of modifier keys that must be held for a shortcut to fire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Control key is held
    pub control: bool,
    /// Alt/Option key is held
    pub alt: bool,
    /// Shift key is held
    pub shift: bool,
    /// Windows/Command/Super key is held
    pub win: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        control: false,
        alt: false,
        shift: false,
        win: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        control: true,
        ..Modifiers::NONE
    };
    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };
    pub const WIN: Modifiers = Modifiers {
        win: true,
        ..Modifiers::NONE
    };

    /// Combine two modifier sets
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers {
            control: self.control || other.control,
            alt: self.alt || other.alt,
            shift: self.shift || other.shift,
            win: self.win || other.win,
        }
    }

    /// Check if no modifier is part of the set
    pub fn is_empty(&self) -> bool {
        !self.control && !self.alt && !self.shift && !self.win
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        self.union(rhs)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if self.control {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        if self.win {
            parts.push("Win");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// A single non-modifier key, in virtual-key numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PAGE_UP: KeyCode = KeyCode(0x21);
    pub const PAGE_DOWN: KeyCode = KeyCode(0x22);
    pub const END: KeyCode = KeyCode(0x23);
    pub const HOME: KeyCode = KeyCode(0x24);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const INSERT: KeyCode = KeyCode(0x2D);
    pub const DELETE: KeyCode = KeyCode(0x2E);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const BACKQUOTE: KeyCode = KeyCode(0xC0);

    /// Key code for an ASCII letter or digit
    pub fn from_char(c: char) -> Option<KeyCode> {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            Some(KeyCode(c as u32))
        } else if c == '`' {
            Some(KeyCode::BACKQUOTE)
        } else {
            None
        }
    }

    /// Function key `F<n>` for n in 1..=24
    pub fn function(n: u32) -> Option<KeyCode> {
        (1..=24)
            .contains(&n)
            .then(|| KeyCode(KeyCode::F1.0 + n - 1))
    }

    /// The letter or digit this code stands for, if any
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.0).filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }

    fn name(&self) -> Option<&'static str> {
        let name = match *self {
            KeyCode::BACKSPACE => "Backspace",
            KeyCode::TAB => "Tab",
            KeyCode::ENTER => "Enter",
            KeyCode::ESCAPE => "Escape",
            KeyCode::SPACE => "Space",
            KeyCode::PAGE_UP => "PageUp",
            KeyCode::PAGE_DOWN => "PageDown",
            KeyCode::END => "End",
            KeyCode::HOME => "Home",
            KeyCode::LEFT => "Left",
            KeyCode::UP => "Up",
            KeyCode::RIGHT => "Right",
            KeyCode::DOWN => "Down",
            KeyCode::INSERT => "Insert",
            KeyCode::DELETE => "Delete",
            KeyCode::BACKQUOTE => "`",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = self.as_char() {
            return write!(f, "{}", c);
        }
        if let Some(name) = self.name() {
            return write!(f, "{}", name);
        }
        if (KeyCode::F1.0..KeyCode::F1.0 + 24).contains(&self.0) {
            return write!(f, "F{}", self.0 - KeyCode::F1.0 + 1);
        }
        write!(f, "0x{:02X}", self.0)
    }
}

impl FromStr for KeyCode {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return KeyCode::from_char(c).ok_or_else(|| KeyParseError::UnknownKey(s.to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        let key = match lower.as_str() {
            "backspace" => KeyCode::BACKSPACE,
            "tab" => KeyCode::TAB,
            "enter" | "return" => KeyCode::ENTER,
            "esc" | "escape" => KeyCode::ESCAPE,
            "space" => KeyCode::SPACE,
            "pageup" => KeyCode::PAGE_UP,
            "pagedown" => KeyCode::PAGE_DOWN,
            "end" => KeyCode::END,
            "home" => KeyCode::HOME,
            "left" => KeyCode::LEFT,
            "up" => KeyCode::UP,
            "right" => KeyCode::RIGHT,
            "down" => KeyCode::DOWN,
            "insert" => KeyCode::INSERT,
            "delete" | "del" => KeyCode::DELETE,
            "backquote" | "grave" => KeyCode::BACKQUOTE,
            other => other
                .strip_prefix('f')
                .and_then(|n| n.parse::<u32>().ok())
                .and_then(KeyCode::function)
                .ok_or_else(|| KeyParseError::UnknownKey(s.to_string()))?,
        };
        Ok(key)
    }
}

/// A parsed `Modifier+...+Key` combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

impl FromStr for KeyCombo {
    type Err = KeyParseError;

    /// Parse strings such as `"Alt+R"` or `"ctrl + shift + F5"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let (key_part, modifier_parts) = match parts.split_last() {
            Some((key, mods)) if !key.is_empty() => (*key, mods),
            _ => return Err(KeyParseError::MissingKey(s.to_string())),
        };

        let mut modifiers = Modifiers::NONE;
        for part in modifier_parts {
            let modifier = match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => Modifiers::CTRL,
                "alt" | "option" => Modifiers::ALT,
                "shift" => Modifiers::SHIFT,
                "win" | "super" | "cmd" | "command" | "meta" => Modifiers::WIN,
                _ => return Err(KeyParseError::UnknownModifier(part.to_string())),
            };
            modifiers = modifiers | modifier;
        }

        Ok(KeyCombo {
            modifiers,
            key: key_part.parse()?,
        })
    }
}

/// Errors from parsing textual key combinations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    #[error("unknown modifier: {0:?}")]
    UnknownModifier(String),

    #[error("no key in combination: {0:?}")]
    MissingKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_modifiers() {
        assert!(Modifiers::default().is_empty());
        assert!(!Modifiers::ALT.is_empty());
    }

    #[test]
    fn test_modifier_union() {
        let mods = Modifiers::CTRL | Modifiers::ALT;
        assert!(mods.control);
        assert!(mods.alt);
        assert!(!mods.shift);
        assert!(!mods.win);
        assert_eq!(mods.to_string(), "Ctrl+Alt");
    }

    #[test]
    fn test_letter_keys_use_ascii_codes() {
        assert_eq!(KeyCode::from_char('r'), Some(KeyCode(0x52)));
        assert_eq!(KeyCode::from_char('B'), Some(KeyCode(0x42)));
        assert_eq!(KeyCode::from_char('7'), Some(KeyCode(0x37)));
        assert_eq!(KeyCode::from_char('-'), None);
    }

    #[test]
    fn test_function_key_range() {
        assert_eq!(KeyCode::function(1), Some(KeyCode::F1));
        assert_eq!(KeyCode::function(24), Some(KeyCode(0x87)));
        assert_eq!(KeyCode::function(0), None);
        assert_eq!(KeyCode::function(25), None);
        assert_eq!(KeyCode::function(12).map(|k| k.to_string()), Some("F12".to_string()));
    }

    #[test]
    fn test_parse_simple_combo() {
        let combo: KeyCombo = "Alt+R".parse().unwrap();
        assert_eq!(combo.modifiers, Modifiers::ALT);
        assert_eq!(combo.key, KeyCode(0x52));
    }

    #[test]
    fn test_parse_is_case_and_space_insensitive() {
        let combo: KeyCombo = "ctrl + ALT + b".parse().unwrap();
        assert_eq!(combo.modifiers, Modifiers::CTRL | Modifiers::ALT);
        assert_eq!(combo.key, KeyCode(0x42));
        assert_eq!(combo.to_string(), "Ctrl+Alt+B");
    }

    #[test]
    fn test_parse_named_keys() {
        let combo: KeyCombo = "Super+Shift+F5".parse().unwrap();
        assert_eq!(combo.modifiers, Modifiers::WIN | Modifiers::SHIFT);
        assert_eq!(combo.key, KeyCode::function(5).unwrap());

        let combo: KeyCombo = "Escape".parse().unwrap();
        assert!(combo.modifiers.is_empty());
        assert_eq!(combo.key, KeyCode::ESCAPE);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "Hyper+R".parse::<KeyCombo>(),
            Err(KeyParseError::UnknownModifier("Hyper".to_string()))
        );
        assert!(matches!(
            "Alt+".parse::<KeyCombo>(),
            Err(KeyParseError::MissingKey(_))
        ));
        assert!(matches!(
            "Alt+Banana".parse::<KeyCombo>(),
            Err(KeyParseError::UnknownKey(_))
        ));
    }
}
