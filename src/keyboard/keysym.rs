// Copyright 2026 The xkbwin Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keysym classification: Unicode conversion, dead-key decomposition and
//! human-readable key names.

/// An X keysym value. 0 is NoSymbol.
pub type Keysym = u32;

pub const NO_SYMBOL: Keysym = 0;

pub const XK_BACKSPACE: Keysym = 0xff08;
pub const XK_TAB: Keysym = 0xff09;
pub const XK_RETURN: Keysym = 0xff0d;
pub const XK_PAUSE: Keysym = 0xff13;
pub const XK_SCROLL_LOCK: Keysym = 0xff14;
pub const XK_ESCAPE: Keysym = 0xff1b;
pub const XK_HOME: Keysym = 0xff50;
pub const XK_LEFT: Keysym = 0xff51;
pub const XK_UP: Keysym = 0xff52;
pub const XK_RIGHT: Keysym = 0xff53;
pub const XK_DOWN: Keysym = 0xff54;
pub const XK_PRIOR: Keysym = 0xff55;
pub const XK_NEXT: Keysym = 0xff56;
pub const XK_END: Keysym = 0xff57;
pub const XK_INSERT: Keysym = 0xff63;
pub const XK_MENU: Keysym = 0xff67;
pub const XK_NUM_LOCK: Keysym = 0xff7f;
pub const XK_KP_ENTER: Keysym = 0xff8d;
pub const XK_KP_MULTIPLY: Keysym = 0xffaa;
pub const XK_KP_ADD: Keysym = 0xffab;
pub const XK_KP_SEPARATOR: Keysym = 0xffac;
pub const XK_KP_SUBTRACT: Keysym = 0xffad;
pub const XK_KP_DECIMAL: Keysym = 0xffae;
pub const XK_KP_DIVIDE: Keysym = 0xffaf;
pub const XK_KP_0: Keysym = 0xffb0;
pub const XK_KP_9: Keysym = 0xffb9;
pub const XK_F1: Keysym = 0xffbe;
pub const XK_F24: Keysym = 0xffd5;
pub const XK_SHIFT_L: Keysym = 0xffe1;
pub const XK_SHIFT_R: Keysym = 0xffe2;
pub const XK_CONTROL_L: Keysym = 0xffe3;
pub const XK_CONTROL_R: Keysym = 0xffe4;
pub const XK_CAPS_LOCK: Keysym = 0xffe5;
pub const XK_META_L: Keysym = 0xffe7;
pub const XK_META_R: Keysym = 0xffe8;
pub const XK_ALT_L: Keysym = 0xffe9;
pub const XK_ALT_R: Keysym = 0xffea;
pub const XK_SUPER_L: Keysym = 0xffeb;
pub const XK_SUPER_R: Keysym = 0xffec;
pub const XK_DELETE: Keysym = 0xffff;
pub const XK_ISO_LEVEL3_SHIFT: Keysym = 0xfe03;

const XK_DEAD_FIRST: Keysym = 0xfe50;
const XK_DEAD_LAST: Keysym = 0xfe6f;

// Dead keysyms in xkb order starting at XK_dead_grave (0xfe50), mapped to
// the combining character they stand for.
static DEAD_COMBINING: &[char] = &[
    '\u{0300}', // grave
    '\u{0301}', // acute
    '\u{0302}', // circumflex
    '\u{0303}', // tilde
    '\u{0304}', // macron
    '\u{0306}', // breve
    '\u{0307}', // abovedot
    '\u{0308}', // diaeresis
    '\u{030a}', // abovering
    '\u{030b}', // doubleacute
    '\u{030c}', // caron
    '\u{0327}', // cedilla
    '\u{0328}', // ogonek
    '\u{0345}', // iota
    '\u{3099}', // voiced_sound
    '\u{309a}', // semivoiced_sound
    '\u{0323}', // belowdot
    '\u{0309}', // hook
    '\u{031b}', // horn
    '\u{0335}', // stroke
    '\u{0313}', // abovecomma
    '\u{0314}', // abovereversedcomma
    '\u{030f}', // doublegrave
    '\u{0325}', // belowring
    '\u{0331}', // belowmacron
    '\u{032d}', // belowcircumflex
    '\u{0330}', // belowtilde
    '\u{032e}', // belowbreve
    '\u{0324}', // belowdiaeresis
    '\u{0313}', // invertedbreve (approximated)
    '\u{0326}', // belowcomma
    '\u{0315}', // currency (approximated)
];

/// Returns the combining character for a dead keysym, None for live ones.
pub fn dead_key_combining(keysym: Keysym) -> Option<char> {
    if (XK_DEAD_FIRST..=XK_DEAD_LAST).contains(&keysym) {
        DEAD_COMBINING.get((keysym - XK_DEAD_FIRST) as usize).copied()
    } else {
        None
    }
}

/// Converts a keysym to the character it produces, if any.
///
/// Latin-1 keysyms are their own character, keysyms above 0x01000000 encode
/// a Unicode code point directly, and a handful of function-key keysyms have
/// ASCII control equivalents. Dead keysyms are not characters; see
/// [`dead_key_combining`].
pub fn keysym_to_unicode(keysym: Keysym) -> Option<char> {
    match keysym {
        0x20..=0x7e | 0xa0..=0xff => char::from_u32(keysym),
        0x0100_0000..=0x0110_ffff => char::from_u32(keysym & 0x00ff_ffff),
        XK_BACKSPACE => Some('\u{8}'),
        XK_TAB => Some('\t'),
        XK_RETURN | XK_KP_ENTER => Some('\r'),
        XK_ESCAPE => Some('\u{1b}'),
        XK_KP_MULTIPLY => Some('*'),
        XK_KP_ADD => Some('+'),
        XK_KP_SEPARATOR => Some(','),
        XK_KP_SUBTRACT => Some('-'),
        XK_KP_DECIMAL => Some('.'),
        XK_KP_DIVIDE => Some('/'),
        XK_KP_0..=XK_KP_9 => char::from_u32('0' as u32 + (keysym - XK_KP_0)),
        _ => None,
    }
}

/// Composes a dead-key combining character with a base character into a
/// single precomposed character, if such a composition exists.
pub fn compose_dead_key(combining: char, base: char) -> Option<char> {
    // The usual Latin compositions; anything else falls back to the caller
    // emitting the two characters separately.
    static COMPOSITIONS: &[(char, char, char)] = &[
        ('\u{0300}', 'a', 'à'),
        ('\u{0300}', 'e', 'è'),
        ('\u{0300}', 'i', 'ì'),
        ('\u{0300}', 'o', 'ò'),
        ('\u{0300}', 'u', 'ù'),
        ('\u{0300}', 'A', 'À'),
        ('\u{0300}', 'E', 'È'),
        ('\u{0300}', 'I', 'Ì'),
        ('\u{0300}', 'O', 'Ò'),
        ('\u{0300}', 'U', 'Ù'),
        ('\u{0301}', 'a', 'á'),
        ('\u{0301}', 'e', 'é'),
        ('\u{0301}', 'i', 'í'),
        ('\u{0301}', 'o', 'ó'),
        ('\u{0301}', 'u', 'ú'),
        ('\u{0301}', 'y', 'ý'),
        ('\u{0301}', 'A', 'Á'),
        ('\u{0301}', 'E', 'É'),
        ('\u{0301}', 'I', 'Í'),
        ('\u{0301}', 'O', 'Ó'),
        ('\u{0301}', 'U', 'Ú'),
        ('\u{0301}', 'Y', 'Ý'),
        ('\u{0302}', 'a', 'â'),
        ('\u{0302}', 'e', 'ê'),
        ('\u{0302}', 'i', 'î'),
        ('\u{0302}', 'o', 'ô'),
        ('\u{0302}', 'u', 'û'),
        ('\u{0302}', 'A', 'Â'),
        ('\u{0302}', 'E', 'Ê'),
        ('\u{0302}', 'I', 'Î'),
        ('\u{0302}', 'O', 'Ô'),
        ('\u{0302}', 'U', 'Û'),
        ('\u{0303}', 'a', 'ã'),
        ('\u{0303}', 'n', 'ñ'),
        ('\u{0303}', 'o', 'õ'),
        ('\u{0303}', 'A', 'Ã'),
        ('\u{0303}', 'N', 'Ñ'),
        ('\u{0303}', 'O', 'Õ'),
        ('\u{0308}', 'a', 'ä'),
        ('\u{0308}', 'e', 'ë'),
        ('\u{0308}', 'i', 'ï'),
        ('\u{0308}', 'o', 'ö'),
        ('\u{0308}', 'u', 'ü'),
        ('\u{0308}', 'y', 'ÿ'),
        ('\u{0308}', 'A', 'Ä'),
        ('\u{0308}', 'E', 'Ë'),
        ('\u{0308}', 'I', 'Ï'),
        ('\u{0308}', 'O', 'Ö'),
        ('\u{0308}', 'U', 'Ü'),
        ('\u{030a}', 'a', 'å'),
        ('\u{030a}', 'A', 'Å'),
        ('\u{0327}', 'c', 'ç'),
        ('\u{0327}', 'C', 'Ç'),
    ];

    // Dead key followed by space yields the spacing form of the accent.
    if base == ' ' {
        return spacing_accent(combining);
    }

    COMPOSITIONS
        .iter()
        .find(|&&(c, b, _)| c == combining && b == base)
        .map(|&(_, _, composed)| composed)
}

fn spacing_accent(combining: char) -> Option<char> {
    match combining {
        '\u{0300}' => Some('`'),
        '\u{0301}' => Some('\u{b4}'),
        '\u{0302}' => Some('^'),
        '\u{0303}' => Some('~'),
        '\u{0308}' => Some('\u{a8}'),
        '\u{0327}' => Some('\u{b8}'),
        '\u{030a}' => Some('\u{b0}'),
        _ => None,
    }
}

/// Returns the display name for a keysym, used to build per-layout key-name
/// tables. Printable keysyms are named by their (uppercased) character.
pub fn keysym_name(keysym: Keysym) -> Option<String> {
    if let Some(ch) = keysym_to_unicode(keysym)
        && !ch.is_control()
    {
        return Some(ch.to_uppercase().to_string());
    }

    if (XK_F1..=XK_F24).contains(&keysym) {
        return Some(format!("F{}", keysym - XK_F1 + 1));
    }

    let name = match keysym {
        XK_BACKSPACE => "Backspace",
        XK_TAB => "Tab",
        XK_RETURN => "Enter",
        XK_PAUSE => "Pause",
        XK_SCROLL_LOCK => "Scroll Lock",
        XK_ESCAPE => "Esc",
        XK_HOME => "Home",
        XK_LEFT => "Left",
        XK_UP => "Up",
        XK_RIGHT => "Right",
        XK_DOWN => "Down",
        XK_PRIOR => "Page Up",
        XK_NEXT => "Page Down",
        XK_END => "End",
        XK_INSERT => "Insert",
        XK_DELETE => "Delete",
        XK_MENU => "Application",
        XK_NUM_LOCK => "Num Lock",
        XK_KP_ENTER => "Num Enter",
        XK_SHIFT_L => "Shift",
        XK_SHIFT_R => "Right Shift",
        XK_CONTROL_L => "Ctrl",
        XK_CONTROL_R => "Right Ctrl",
        XK_CAPS_LOCK => "Caps Lock",
        XK_ALT_L | XK_META_L => "Alt",
        XK_ALT_R | XK_META_R | XK_ISO_LEVEL3_SHIFT => "Right Alt",
        XK_SUPER_L => "Left Windows",
        XK_SUPER_R => "Right Windows",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_passthrough() {
        assert_eq!(keysym_to_unicode('a' as u32), Some('a'));
        assert_eq!(keysym_to_unicode(0xe9), Some('é'));
        assert_eq!(keysym_to_unicode(0x1f), None);
    }

    #[test]
    fn test_direct_unicode_keysyms() {
        assert_eq!(keysym_to_unicode(0x0100_20ac), Some('€'));
        assert_eq!(keysym_to_unicode(0x0100_0416), Some('Ж'));
    }

    #[test]
    fn test_keypad() {
        assert_eq!(keysym_to_unicode(XK_KP_0), Some('0'));
        assert_eq!(keysym_to_unicode(XK_KP_9), Some('9'));
        assert_eq!(keysym_to_unicode(XK_KP_DIVIDE), Some('/'));
    }

    #[test]
    fn test_dead_keys_are_not_characters() {
        assert_eq!(keysym_to_unicode(0xfe50), None);
        assert_eq!(dead_key_combining(0xfe50), Some('\u{0300}'));
        assert_eq!(dead_key_combining(0xfe51), Some('\u{0301}'));
        assert_eq!(dead_key_combining('a' as u32), None);
    }

    #[test]
    fn test_composition() {
        assert_eq!(compose_dead_key('\u{0301}', 'a'), Some('á'));
        assert_eq!(compose_dead_key('\u{0308}', 'U'), Some('Ü'));
        assert_eq!(compose_dead_key('\u{0301}', ' '), Some('\u{b4}'));
        assert_eq!(compose_dead_key('\u{0301}', 'q'), None);
    }

    #[test]
    fn test_keysym_names() {
        assert_eq!(keysym_name('q' as u32).as_deref(), Some("Q"));
        assert_eq!(keysym_name(XK_F1 + 11).as_deref(), Some("F12"));
        assert_eq!(keysym_name(XK_ESCAPE).as_deref(), Some("Esc"));
        assert_eq!(keysym_name(NO_SYMBOL), None);
    }
}
