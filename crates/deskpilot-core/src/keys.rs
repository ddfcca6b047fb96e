//! Key names
//!
//! Recorded and planned key names come in many spellings (`ctrl_l`, `Esc`,
//! `Return`, `page_down`). Everything is folded to one canonical vocabulary
//! before it reaches an input backend.

/// Canonical names understood by every [`crate::input::DesktopInput`].
pub const NAMED_KEYS: &[&str] = &[
    "ctrl", "alt", "shift", "cmd", "escape", "enter", "tab", "space", "backspace", "delete",
    "up", "down", "left", "right", "home", "end", "pageup", "pagedown", "insert", "capslock",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
];

/// Fold a key name into the canonical vocabulary.
///
/// Single characters are returned untouched so that `"A"` still types a
/// capital letter. Applying this twice gives the same result as once.
pub fn canonical_key(name: &str) -> String {
    if name.chars().count() == 1 {
        return name.to_string();
    }
    let trimmed = name.trim();
    if trimmed.chars().count() == 1 {
        return trimmed.to_string();
    }
    let lower = trimmed.to_lowercase();
    let mapped = match lower.as_str() {
        "ctrl_l" | "ctrl_r" | "control" | "control_l" | "control_r" => "ctrl",
        "alt_l" | "alt_r" | "alt_gr" | "altgr" | "option" => "alt",
        "shift_l" | "shift_r" => "shift",
        "cmd_l" | "cmd_r" | "command" | "super" | "win" | "windows" | "meta" => "cmd",
        "esc" => "escape",
        "return" => "enter",
        "del" => "delete",
        "back_space" => "backspace",
        "page_up" | "pgup" => "pageup",
        "page_down" | "pgdn" => "pagedown",
        "arrow_up" => "up",
        "arrow_down" => "down",
        "arrow_left" => "left",
        "arrow_right" => "right",
        "caps_lock" => "capslock",
        "ins" => "insert",
        other => other,
    };
    mapped.to_string()
}

/// True when `name` (already canonical) is a key rather than text.
pub fn is_named_key(name: &str) -> bool {
    NAMED_KEYS.contains(&name)
}

/// True for keys that are held while another key is tapped.
pub fn is_modifier(name: &str) -> bool {
    matches!(name, "ctrl" | "alt" | "shift" | "cmd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_left_right_variants() {
        assert_eq!(canonical_key("ctrl_l"), "ctrl");
        assert_eq!(canonical_key("ctrl_r"), "ctrl");
        assert_eq!(canonical_key("alt_l"), "alt");
        assert_eq!(canonical_key("alt_r"), "alt");
        assert_eq!(canonical_key("shift_l"), "shift");
        assert_eq!(canonical_key("shift_r"), "shift");
        assert_eq!(canonical_key("cmd"), "cmd");
        assert_eq!(canonical_key("esc"), "escape");
        assert_eq!(canonical_key("Enter"), "enter");
        assert_eq!(canonical_key("Return"), "enter");
    }

    #[test]
    fn single_characters_keep_case() {
        assert_eq!(canonical_key("A"), "A");
        assert_eq!(canonical_key("a"), "a");
        assert_eq!(canonical_key(" "), " ");
    }

    #[test]
    fn mapping_is_idempotent() {
        let samples = [
            "ctrl_l", "CTRL_R", "alt_gr", "shift_r", "cmd_r", "Win", "esc", "Escape", "return",
            "page_up", "arrow_left", "del", "F5", "x", "Q", "tab", "space", "backspace",
            "something_else",
        ];
        for s in samples {
            let once = canonical_key(s);
            assert_eq!(canonical_key(&once), once, "not idempotent for {:?}", s);
        }
        for k in NAMED_KEYS {
            assert_eq!(canonical_key(k), *k);
        }
    }

    #[test]
    fn modifiers_are_named_keys() {
        for m in ["ctrl", "alt", "shift", "cmd"] {
            assert!(is_modifier(m));
            assert!(is_named_key(m));
        }
        assert!(!is_modifier("enter"));
    }
}
