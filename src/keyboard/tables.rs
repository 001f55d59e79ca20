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

//! Per-family base scancode to virtual-key tables.
//!
//! One table spans the whole normalized scancode space: the T series
//! (0x000..0x0ff), the E0 series (0x100..0x1ff) and the E1 series
//! (0x200..0x27f). Regional families are expressed as override lists on top
//! of the QWERTY base, the same way keyboard vendors document them.

use crate::keyboard::langid::Langid;
use crate::keyboard::vk::*;

pub const SCAN2VK_LEN: usize = 0x280;

pub type Scan2Vk = [u16; SCAN2VK_LEN];

const fn base_qwerty() -> Scan2Vk {
    let mut t = [0u16; SCAN2VK_LEN];

    t[0x01] = VK_ESCAPE;
    t[0x02] = b'1' as u16;
    t[0x03] = b'2' as u16;
    t[0x04] = b'3' as u16;
    t[0x05] = b'4' as u16;
    t[0x06] = b'5' as u16;
    t[0x07] = b'6' as u16;
    t[0x08] = b'7' as u16;
    t[0x09] = b'8' as u16;
    t[0x0a] = b'9' as u16;
    t[0x0b] = b'0' as u16;
    t[0x0c] = VK_OEM_MINUS;
    t[0x0d] = VK_OEM_PLUS;
    t[0x0e] = VK_BACK;
    t[0x0f] = VK_TAB;
    t[0x10] = b'Q' as u16;
    t[0x11] = b'W' as u16;
    t[0x12] = b'E' as u16;
    t[0x13] = b'R' as u16;
    t[0x14] = b'T' as u16;
    t[0x15] = b'Y' as u16;
    t[0x16] = b'U' as u16;
    t[0x17] = b'I' as u16;
    t[0x18] = b'O' as u16;
    t[0x19] = b'P' as u16;
    t[0x1a] = VK_OEM_4;
    t[0x1b] = VK_OEM_6;
    t[0x1c] = VK_RETURN;
    t[0x1d] = VK_LCONTROL;
    t[0x1e] = b'A' as u16;
    t[0x1f] = b'S' as u16;
    t[0x20] = b'D' as u16;
    t[0x21] = b'F' as u16;
    t[0x22] = b'G' as u16;
    t[0x23] = b'H' as u16;
    t[0x24] = b'J' as u16;
    t[0x25] = b'K' as u16;
    t[0x26] = b'L' as u16;
    t[0x27] = VK_OEM_1;
    t[0x28] = VK_OEM_7;
    t[0x29] = VK_OEM_3;
    t[0x2a] = VK_LSHIFT;
    t[0x2b] = VK_OEM_5;
    t[0x2c] = b'Z' as u16;
    t[0x2d] = b'X' as u16;
    t[0x2e] = b'C' as u16;
    t[0x2f] = b'V' as u16;
    t[0x30] = b'B' as u16;
    t[0x31] = b'N' as u16;
    t[0x32] = b'M' as u16;
    t[0x33] = VK_OEM_COMMA;
    t[0x34] = VK_OEM_PERIOD;
    t[0x35] = VK_OEM_2;
    t[0x36] = VK_RSHIFT;
    t[0x37] = VK_MULTIPLY;
    t[0x38] = VK_LMENU;
    t[0x39] = VK_SPACE;
    t[0x3a] = VK_CAPITAL;
    t[0x3b] = VK_F1;
    t[0x3c] = VK_F2;
    t[0x3d] = VK_F3;
    t[0x3e] = VK_F4;
    t[0x3f] = VK_F5;
    t[0x40] = VK_F6;
    t[0x41] = VK_F7;
    t[0x42] = VK_F8;
    t[0x43] = VK_F9;
    t[0x44] = VK_F10;
    t[0x45] = VK_NUMLOCK;
    t[0x46] = VK_SCROLL;
    t[0x47] = VK_NUMPAD7;
    t[0x48] = VK_NUMPAD8;
    t[0x49] = VK_NUMPAD9;
    t[0x4a] = VK_SUBTRACT;
    t[0x4b] = VK_NUMPAD4;
    t[0x4c] = VK_NUMPAD5;
    t[0x4d] = VK_NUMPAD6;
    t[0x4e] = VK_ADD;
    t[0x4f] = VK_NUMPAD1;
    t[0x50] = VK_NUMPAD2;
    t[0x51] = VK_NUMPAD3;
    t[0x52] = VK_NUMPAD0;
    t[0x53] = VK_DECIMAL;
    t[0x54] = VK_SNAPSHOT;
    t[0x56] = VK_OEM_102;
    t[0x57] = VK_F11;
    t[0x58] = VK_F12;
    t[0x59] = VK_CLEAR;
    t[0x5c] = VK_SEPARATOR;
    t[0x64] = VK_F13;
    t[0x65] = VK_F14;
    t[0x66] = VK_F15;
    t[0x67] = VK_F16;
    t[0x68] = VK_F17;
    t[0x69] = VK_F18;
    t[0x6a] = VK_F19;
    t[0x6b] = VK_F20;
    t[0x6c] = VK_F21;
    t[0x6d] = VK_F22;
    t[0x6e] = VK_F23;
    t[0x70] = VK_KANA;
    t[0x71] = VK_HANJA;
    t[0x72] = VK_HANGUL;
    t[0x73] = VK_ABNT_C1;
    t[0x76] = VK_F24;
    t[0x77] = VK_KANA;
    t[0x79] = VK_CONVERT;
    t[0x7b] = VK_NONCONVERT;
    t[0x7d] = VK_OEM_5;
    t[0x7e] = VK_ABNT_C2;

    // E0 series: navigation cluster, right-hand modifiers, media keys.
    t[0x110] = VK_MEDIA_PREV_TRACK;
    t[0x119] = VK_MEDIA_NEXT_TRACK;
    t[0x11c] = VK_RETURN;
    t[0x11d] = VK_RCONTROL;
    t[0x120] = VK_VOLUME_MUTE;
    t[0x121] = VK_LAUNCH_APP2;
    t[0x122] = VK_MEDIA_PLAY_PAUSE;
    t[0x124] = VK_MEDIA_STOP;
    t[0x12e] = VK_VOLUME_DOWN;
    t[0x130] = VK_VOLUME_UP;
    t[0x132] = VK_BROWSER_HOME;
    t[0x135] = VK_DIVIDE;
    t[0x137] = VK_SNAPSHOT;
    t[0x138] = VK_RMENU;
    t[0x146] = VK_CANCEL;
    t[0x147] = VK_HOME;
    t[0x148] = VK_UP;
    t[0x149] = VK_PRIOR;
    t[0x14b] = VK_LEFT;
    t[0x14d] = VK_RIGHT;
    t[0x14f] = VK_END;
    t[0x150] = VK_DOWN;
    t[0x151] = VK_NEXT;
    t[0x152] = VK_INSERT;
    t[0x153] = VK_DELETE;
    t[0x15b] = VK_LWIN;
    t[0x15c] = VK_RWIN;
    t[0x15d] = VK_APPS;
    t[0x15f] = VK_SLEEP;
    t[0x165] = VK_BROWSER_SEARCH;
    t[0x166] = VK_BROWSER_FAVORITES;
    t[0x167] = VK_BROWSER_REFRESH;
    t[0x168] = VK_BROWSER_STOP;
    t[0x169] = VK_BROWSER_FORWARD;
    t[0x16a] = VK_BROWSER_BACK;
    t[0x16b] = VK_LAUNCH_APP1;
    t[0x16c] = VK_LAUNCH_MAIL;
    t[0x16d] = VK_LAUNCH_MEDIA_SELECT;

    // E1 series.
    t[0x21d] = VK_PAUSE;

    t
}

const fn with_overrides(mut t: Scan2Vk, overrides: &[(u16, u16)]) -> Scan2Vk {
    let mut i = 0;
    while i < overrides.len() {
        t[overrides[i].0 as usize] = overrides[i].1;
        i += 1;
    }
    t
}

pub static SCAN2VK_QWERTY: Scan2Vk = base_qwerty();

pub static SCAN2VK_AZERTY: Scan2Vk = with_overrides(
    base_qwerty(),
    &[
        (0x10, b'A' as u16),
        (0x11, b'Z' as u16),
        (0x1e, b'Q' as u16),
        (0x27, b'M' as u16),
        (0x28, VK_OEM_3),
        (0x29, VK_OEM_7),
        (0x2c, b'W' as u16),
        (0x32, VK_OEM_COMMA),
        (0x33, VK_OEM_PERIOD),
        (0x34, VK_OEM_2),
        (0x35, VK_OEM_8),
    ],
);

pub static SCAN2VK_QWERTZ: Scan2Vk = with_overrides(
    base_qwerty(),
    &[
        (0x0c, VK_OEM_4),
        (0x0d, VK_OEM_6),
        (0x15, b'Z' as u16),
        (0x1a, VK_OEM_1),
        (0x1b, VK_OEM_PLUS),
        (0x27, VK_OEM_3),
        (0x28, VK_OEM_7),
        (0x29, VK_OEM_5),
        (0x2b, VK_OEM_2),
        (0x2c, b'Y' as u16),
        (0x35, VK_OEM_MINUS),
    ],
);

pub static SCAN2VK_DVORAK: Scan2Vk = with_overrides(
    base_qwerty(),
    &[
        (0x0c, VK_OEM_4),
        (0x0d, VK_OEM_6),
        (0x10, VK_OEM_7),
        (0x11, VK_OEM_COMMA),
        (0x12, VK_OEM_PERIOD),
        (0x13, b'P' as u16),
        (0x14, b'Y' as u16),
        (0x15, b'F' as u16),
        (0x16, b'G' as u16),
        (0x17, b'C' as u16),
        (0x18, b'R' as u16),
        (0x19, b'L' as u16),
        (0x1a, VK_OEM_2),
        (0x1b, VK_OEM_PLUS),
        (0x1e, b'A' as u16),
        (0x1f, b'O' as u16),
        (0x20, b'E' as u16),
        (0x21, b'U' as u16),
        (0x22, b'I' as u16),
        (0x23, b'D' as u16),
        (0x24, b'H' as u16),
        (0x25, b'T' as u16),
        (0x26, b'N' as u16),
        (0x27, b'S' as u16),
        (0x28, VK_OEM_MINUS),
        (0x2c, VK_OEM_1),
        (0x2d, b'Q' as u16),
        (0x2e, b'J' as u16),
        (0x2f, b'K' as u16),
        (0x30, b'X' as u16),
        (0x31, b'B' as u16),
        (0x32, b'M' as u16),
        (0x33, b'W' as u16),
        (0x34, b'V' as u16),
        (0x35, b'Z' as u16),
    ],
);

pub static SCAN2VK_SWEDISH: Scan2Vk = with_overrides(
    base_qwerty(),
    &[
        (0x0c, VK_OEM_PLUS),
        (0x0d, VK_OEM_4),
        (0x1a, VK_OEM_6),
        (0x1b, VK_OEM_1),
        (0x27, VK_OEM_3),
        (0x28, VK_OEM_7),
        (0x29, VK_OEM_5),
        (0x2b, VK_OEM_2),
        (0x35, VK_OEM_MINUS),
    ],
);

pub static SCAN2VK_JP106: Scan2Vk = with_overrides(
    base_qwerty(),
    &[
        (0x0d, VK_OEM_7),
        (0x1a, VK_OEM_3),
        (0x1b, VK_OEM_4),
        (0x27, VK_OEM_PLUS),
        (0x28, VK_OEM_1),
        (0x29, VK_OEM_AUTO),
        (0x2b, VK_OEM_6),
    ],
);

/// Selects the base table for a resolved language.
///
/// A "dvorak" substring in the raw layout name beats the language family:
/// `us::dvorak` is Dvorak even though the language is English.
pub fn scan2vk_for(lang: Langid, layout_name: &str) -> &'static Scan2Vk {
    if layout_name.contains("dvorak") {
        return &SCAN2VK_DVORAK;
    }
    match lang {
        // French and Belgian French; Canadian French keyboards are QWERTY.
        0x040c | 0x080c => &SCAN2VK_AZERTY,
        // German, Swiss German, Austrian German.
        0x0407 | 0x0807 | 0x0c07 => &SCAN2VK_QWERTZ,
        0x041d => &SCAN2VK_SWEDISH,
        0x0411 => &SCAN2VK_JP106,
        _ => &SCAN2VK_QWERTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_rows() {
        assert_eq!(SCAN2VK_QWERTY[0x10], b'Q' as u16);
        assert_eq!(SCAN2VK_AZERTY[0x10], b'A' as u16);
        assert_eq!(SCAN2VK_QWERTZ[0x15], b'Z' as u16);
        assert_eq!(SCAN2VK_DVORAK[0x27], b'S' as u16);
    }

    #[test]
    fn test_family_selection() {
        assert!(std::ptr::eq(scan2vk_for(0x040c, "fr"), &SCAN2VK_AZERTY));
        assert!(std::ptr::eq(scan2vk_for(0x0807, "ch:de"), &SCAN2VK_QWERTZ));
        assert!(std::ptr::eq(scan2vk_for(0x041d, "se"), &SCAN2VK_SWEDISH));
        assert!(std::ptr::eq(scan2vk_for(0x0411, "jp"), &SCAN2VK_JP106));
        assert!(std::ptr::eq(scan2vk_for(0x0409, "us"), &SCAN2VK_QWERTY));
        // Canadian French stays QWERTY.
        assert!(std::ptr::eq(scan2vk_for(0x0c0c, "ca"), &SCAN2VK_QWERTY));
    }

    #[test]
    fn test_dvorak_substring_beats_language() {
        assert!(std::ptr::eq(
            scan2vk_for(0x0409, "us::dvorak"),
            &SCAN2VK_DVORAK
        ));
        assert!(std::ptr::eq(
            scan2vk_for(0x040c, "fr:dvorak:"),
            &SCAN2VK_DVORAK
        ));
    }

    #[test]
    fn test_extended_entries_shared_across_families() {
        for table in [&SCAN2VK_QWERTY, &SCAN2VK_AZERTY, &SCAN2VK_DVORAK] {
            assert_eq!(table[0x11c], VK_RETURN);
            assert_eq!(table[0x138], VK_RMENU);
            assert_eq!(table[0x21d], VK_PAUSE);
        }
    }

    #[test]
    fn test_unassigned_slots_are_zero() {
        assert_eq!(SCAN2VK_QWERTY[0x55], 0);
        assert_eq!(SCAN2VK_QWERTY[0x27f], 0);
    }
}
