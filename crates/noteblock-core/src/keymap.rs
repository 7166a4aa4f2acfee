use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shortcut {
    NewBlockBelow,
    NewBlockAbove,
    Duplicate,
    Delete,
    MoveUp,
    MoveDown,
    ToggleLock,
}

impl Shortcut {
    /// Global shortcuts run without an active block and while locked.
    pub fn is_global(&self) -> bool {
        matches!(self, Shortcut::ToggleLock)
    }
}

const DEFAULT_BINDINGS: &[(&str, Shortcut)] = &[
    ("mod+enter", Shortcut::NewBlockBelow),
    ("mod+shift+enter", Shortcut::NewBlockAbove),
    ("mod+d", Shortcut::Duplicate),
    ("mod+backspace", Shortcut::Delete),
    ("mod+shift+up", Shortcut::MoveUp),
    ("mod+shift+down", Shortcut::MoveDown),
    ("mod+shift+l", Shortcut::ToggleLock),
];

const MODIFIER_ORDER: [&str; 3] = ["mod", "alt", "shift"];

/// Canonical `mod+alt+shift+key` form of a chord written with `+` or `-`
/// separators. `ctrl`, `cmd` and `meta` all map to `mod`.
pub fn normalize_chord(chord: &str) -> Option<String> {
    let mut modifiers: Vec<&'static str> = Vec::new();
    let mut key: Option<String> = None;
    for part in chord.split(['+', '-']) {
        let part = part.trim().to_ascii_lowercase();
        if part.is_empty() {
            return None;
        }
        let modifier = match part.as_str() {
            "mod" | "ctrl" | "control" | "cmd" | "command" | "meta" | "super" => Some("mod"),
            "alt" | "option" | "opt" => Some("alt"),
            "shift" => Some("shift"),
            _ => None,
        };
        match modifier {
            Some(modifier) => {
                if !modifiers.contains(&modifier) {
                    modifiers.push(modifier);
                }
            }
            None if key.is_none() => key = Some(part),
            None => return None,
        }
    }
    let key = key?;
    let mut parts: Vec<&str> = MODIFIER_ORDER
        .iter()
        .copied()
        .filter(|modifier| modifiers.contains(modifier))
        .collect();
    parts.push(&key);
    Some(parts.join("+"))
}

#[derive(Clone, Debug)]
pub struct Keymap {
    bindings: HashMap<String, Shortcut>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut keymap = Self::empty();
        for (chord, shortcut) in DEFAULT_BINDINGS {
            keymap.bind(chord, *shortcut);
        }
        keymap
    }
}

impl Keymap {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Binds `chord`, replacing any earlier binding. False if unparseable.
    pub fn bind(&mut self, chord: &str, shortcut: Shortcut) -> bool {
        let Some(chord) = normalize_chord(chord) else {
            return false;
        };
        self.bindings.insert(chord, shortcut);
        true
    }

    pub fn resolve(&self, chord: &str) -> Option<Shortcut> {
        self.bindings.get(&normalize_chord(chord)?).copied()
    }

    pub fn bindings(&self) -> Vec<(String, Shortcut)> {
        let mut list: Vec<_> = self
            .bindings
            .iter()
            .map(|(chord, shortcut)| (chord.clone(), *shortcut))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_chord, Keymap, Shortcut};

    #[test]
    fn normalizes_platform_modifiers_and_order() {
        assert_eq!(normalize_chord("Cmd-Shift-Up").as_deref(), Some("mod+shift+up"));
        assert_eq!(normalize_chord("shift+ctrl+enter").as_deref(), Some("mod+shift+enter"));
        assert_eq!(normalize_chord("alt-cmd-down").as_deref(), Some("mod+alt+down"));
        assert_eq!(normalize_chord("shift"), None);
        assert_eq!(normalize_chord("mod+a+b"), None);
        assert_eq!(normalize_chord("mod++"), None);
    }

    #[test]
    fn default_keymap_covers_block_shortcuts() {
        let keymap = Keymap::default();
        assert_eq!(keymap.resolve("ctrl+enter"), Some(Shortcut::NewBlockBelow));
        assert_eq!(keymap.resolve("cmd-shift-enter"), Some(Shortcut::NewBlockAbove));
        assert_eq!(keymap.resolve("meta+d"), Some(Shortcut::Duplicate));
        assert_eq!(keymap.resolve("mod+backspace"), Some(Shortcut::Delete));
        assert_eq!(keymap.resolve("mod+shift+up"), Some(Shortcut::MoveUp));
        assert_eq!(keymap.resolve("mod+shift+down"), Some(Shortcut::MoveDown));
        assert_eq!(keymap.resolve("mod+shift+l"), Some(Shortcut::ToggleLock));
        assert_eq!(keymap.resolve("mod+x"), None);
        assert_eq!(keymap.bindings().len(), 7);
    }

    #[test]
    fn rebinding_replaces_previous_action() {
        let mut keymap = Keymap::default();
        assert!(keymap.bind("alt-up", Shortcut::MoveUp));
        assert!(!keymap.bind("", Shortcut::MoveUp));
        assert_eq!(keymap.resolve("option+up"), Some(Shortcut::MoveUp));
        assert!(Shortcut::ToggleLock.is_global());
        assert!(!Shortcut::Delete.is_global());
    }
}
