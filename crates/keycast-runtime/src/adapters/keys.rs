//! Logical key names understood by the input workers.

use std::fmt;

/// Non-printable keys with a fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Space,
    Backspace,
    Tab,
    Shift,
    Ctrl,
    Alt,
    Esc,
    Left,
    Up,
    Right,
    Down,
}

impl NamedKey {
    const ALL: [(&'static str, NamedKey, u16); 12] = [
        ("Enter", NamedKey::Enter, 0x0D),
        ("Space", NamedKey::Space, 0x20),
        ("Backspace", NamedKey::Backspace, 0x08),
        ("Tab", NamedKey::Tab, 0x09),
        ("Shift", NamedKey::Shift, 0x10),
        ("Ctrl", NamedKey::Ctrl, 0x11),
        ("Alt", NamedKey::Alt, 0x12),
        ("Esc", NamedKey::Esc, 0x1B),
        ("Left", NamedKey::Left, 0x25),
        ("Up", NamedKey::Up, 0x26),
        ("Right", NamedKey::Right, 0x27),
        ("Down", NamedKey::Down, 0x28),
    ];

    fn entry(self) -> (&'static str, u16) {
        Self::ALL
            .iter()
            .find(|(_, key, _)| *key == self)
            .map(|(name, _, code)| (*name, *code))
            .unwrap_or(("", 0))
    }
}

/// A validated key: a named key, an uppercase letter or a digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Char(char),
}

impl KeyCode {
    /// Parse a key name. Single letters are case-insensitive; named keys
    /// are matched exactly.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some((_, key, _)) = NamedKey::ALL.iter().find(|(n, _, _)| *n == name) {
            return Some(Self::Named(*key));
        }

        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(Self::Char(c.to_ascii_uppercase())),
            (Some(c), None) if c.is_ascii_digit() => Some(Self::Char(c)),
            _ => None,
        }
    }

    /// Virtual-key code as used by desktop input APIs.
    #[must_use]
    pub fn virtual_code(self) -> u16 {
        match self {
            Self::Named(key) => key.entry().1,
            Self::Char(c) => c as u16,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(key) => f.write_str(key.entry().0),
            Self::Char(c) => write!(f, "{c}"),
        }
    }
}
