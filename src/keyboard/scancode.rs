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

//! Raw-keycode to PC-scancode normalization.
//!
//! X keycodes are linux input-event codes offset by 8. The first block of
//! event codes (up to the keypad dot) is numerically identical to the PC
//! scancode set, everything past that needs an explicit mapping onto the
//! extended-scancode convention: `0x100 | x` for an E0-prefixed code,
//! `0x200 | x` for an E1-prefixed code.

/// E0-prefix marker in a normalized scancode.
pub const SCAN_E0: u16 = 0x100;
/// E1-prefix marker in a normalized scancode.
pub const SCAN_E1: u16 = 0x200;

// Linux input-event codes for the keys past the directly-mapped block.
pub const KEY_KPDOT: u32 = 83;
const KEY_ZENKAKUHANKAKU: u32 = 85;
const KEY_102ND: u32 = 86;
const KEY_F11: u32 = 87;
const KEY_F12: u32 = 88;
const KEY_RO: u32 = 89;
const KEY_KATAKANA: u32 = 90;
const KEY_HIRAGANA: u32 = 91;
const KEY_HENKAN: u32 = 92;
const KEY_KATAKANAHIRAGANA: u32 = 93;
const KEY_MUHENKAN: u32 = 94;
const KEY_KPJPCOMMA: u32 = 95;
const KEY_KPENTER: u32 = 96;
const KEY_RIGHTCTRL: u32 = 97;
const KEY_KPSLASH: u32 = 98;
const KEY_SYSRQ: u32 = 99;
const KEY_RIGHTALT: u32 = 100;
const KEY_HOME: u32 = 102;
const KEY_UP: u32 = 103;
const KEY_PAGEUP: u32 = 104;
const KEY_LEFT: u32 = 105;
const KEY_RIGHT: u32 = 106;
const KEY_END: u32 = 107;
const KEY_DOWN: u32 = 108;
const KEY_PAGEDOWN: u32 = 109;
const KEY_INSERT: u32 = 110;
const KEY_DELETE: u32 = 111;
const KEY_MUTE: u32 = 113;
const KEY_VOLUMEDOWN: u32 = 114;
const KEY_VOLUMEUP: u32 = 115;
const KEY_POWER: u32 = 116;
const KEY_KPEQUAL: u32 = 117;
const KEY_PAUSE: u32 = 119;
const KEY_KPCOMMA: u32 = 121;
const KEY_HANGEUL: u32 = 122;
const KEY_HANJA: u32 = 123;
const KEY_YEN: u32 = 124;
const KEY_LEFTMETA: u32 = 125;
const KEY_RIGHTMETA: u32 = 126;
const KEY_COMPOSE: u32 = 127;
const KEY_STOP: u32 = 128;
const KEY_CALC: u32 = 140;
const KEY_SLEEP: u32 = 142;
const KEY_WAKEUP: u32 = 143;
const KEY_MAIL: u32 = 155;
const KEY_BOOKMARKS: u32 = 156;
const KEY_COMPUTER: u32 = 157;
const KEY_BACK: u32 = 158;
const KEY_FORWARD: u32 = 159;
const KEY_NEXTSONG: u32 = 163;
const KEY_PLAYPAUSE: u32 = 164;
const KEY_PREVIOUSSONG: u32 = 165;
const KEY_STOPCD: u32 = 166;
const KEY_HOMEPAGE: u32 = 172;
const KEY_REFRESH: u32 = 173;
const KEY_F13: u32 = 183;
const KEY_F14: u32 = 184;
const KEY_F15: u32 = 185;
const KEY_F16: u32 = 186;
const KEY_F17: u32 = 187;
const KEY_F18: u32 = 188;
const KEY_F19: u32 = 189;
const KEY_F20: u32 = 190;
const KEY_F21: u32 = 191;
const KEY_F22: u32 = 192;
const KEY_F23: u32 = 193;
const KEY_F24: u32 = 194;
const KEY_SEARCH: u32 = 217;
const KEY_MEDIA: u32 = 226;

/// Normalizes a raw X keycode to a PC scancode.
///
/// Total over the whole input domain: unknown keys get a synthetic
/// E1-prefixed code derived from the low 7 bits rather than failing, so a
/// translation miss can never block input delivery.
pub fn keyc2scan(keycode: u32) -> u16 {
    let key = keycode.wrapping_sub(8);

    if key <= KEY_KPDOT {
        return key as u16;
    }

    match key {
        KEY_ZENKAKUHANKAKU => 0x29,
        KEY_102ND => 0x56,
        KEY_F11 => 0x57,
        KEY_F12 => 0x58,
        KEY_RO => 0x73,
        KEY_KATAKANA => 0x70,
        KEY_HIRAGANA => 0x77,
        KEY_HENKAN => 0x79,
        KEY_KATAKANAHIRAGANA => 0x70,
        KEY_MUHENKAN => 0x7b,
        KEY_KPJPCOMMA => 0x5c,
        KEY_KPENTER => SCAN_E0 | 0x1c,
        KEY_RIGHTCTRL => SCAN_E0 | 0x1d,
        KEY_KPSLASH => SCAN_E0 | 0x35,
        KEY_SYSRQ => 0x54,
        KEY_RIGHTALT => SCAN_E0 | 0x38,
        KEY_HOME => SCAN_E0 | 0x47,
        KEY_UP => SCAN_E0 | 0x48,
        KEY_PAGEUP => SCAN_E0 | 0x49,
        KEY_LEFT => SCAN_E0 | 0x4b,
        KEY_RIGHT => SCAN_E0 | 0x4d,
        KEY_END => SCAN_E0 | 0x4f,
        KEY_DOWN => SCAN_E0 | 0x50,
        KEY_PAGEDOWN => SCAN_E0 | 0x51,
        KEY_INSERT => SCAN_E0 | 0x52,
        KEY_DELETE => SCAN_E0 | 0x53,
        KEY_MUTE => SCAN_E0 | 0x20,
        KEY_VOLUMEDOWN => SCAN_E0 | 0x2e,
        KEY_VOLUMEUP => SCAN_E0 | 0x30,
        KEY_POWER => SCAN_E0 | 0x5e,
        KEY_KPEQUAL => 0x59,
        KEY_PAUSE => SCAN_E1 | 0x1d,
        KEY_KPCOMMA => 0x7e,
        KEY_HANGEUL => 0x72,
        KEY_HANJA => 0x71,
        KEY_YEN => 0x7d,
        KEY_LEFTMETA => SCAN_E0 | 0x5b,
        KEY_RIGHTMETA => SCAN_E0 | 0x5c,
        KEY_COMPOSE => SCAN_E0 | 0x5d,
        KEY_STOP => SCAN_E0 | 0x68,
        KEY_CALC => SCAN_E0 | 0x21,
        KEY_SLEEP => SCAN_E0 | 0x5f,
        KEY_WAKEUP => SCAN_E0 | 0x63,
        KEY_MAIL => SCAN_E0 | 0x6c,
        KEY_BOOKMARKS => SCAN_E0 | 0x66,
        KEY_COMPUTER => SCAN_E0 | 0x6b,
        KEY_BACK => SCAN_E0 | 0x6a,
        KEY_FORWARD => SCAN_E0 | 0x69,
        KEY_NEXTSONG => SCAN_E0 | 0x19,
        KEY_PLAYPAUSE => SCAN_E0 | 0x22,
        KEY_PREVIOUSSONG => SCAN_E0 | 0x10,
        KEY_STOPCD => SCAN_E0 | 0x24,
        KEY_HOMEPAGE => SCAN_E0 | 0x32,
        KEY_REFRESH => SCAN_E0 | 0x67,
        KEY_F13 => 0x64,
        KEY_F14 => 0x65,
        KEY_F15 => 0x66,
        KEY_F16 => 0x67,
        KEY_F17 => 0x68,
        KEY_F18 => 0x69,
        KEY_F19 => 0x6a,
        KEY_F20 => 0x6b,
        KEY_F21 => 0x6c,
        KEY_F22 => 0x6d,
        KEY_F23 => 0x6e,
        KEY_F24 => 0x76,
        KEY_SEARCH => SCAN_E0 | 0x65,
        KEY_MEDIA => SCAN_E0 | 0x6d,
        _ => SCAN_E1 | (key & 0x7f) as u16,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_base_keys_pass_through() {
        // 'Q' on a 101-key layout.
        assert_eq!(keyc2scan(8 + 0x10), 0x10);
        assert_eq!(keyc2scan(8), 0);
        assert_eq!(keyc2scan(8 + KEY_KPDOT), KEY_KPDOT as u16);
    }

    #[test]
    fn test_extended_keys() {
        assert_eq!(keyc2scan(8 + KEY_KPENTER), 0x11c);
        assert_eq!(keyc2scan(8 + KEY_LEFTMETA), 0x15b);
        assert_eq!(keyc2scan(8 + KEY_PAUSE), 0x21d);
        assert_eq!(keyc2scan(8 + KEY_F11), 0x57);
    }

    #[test]
    fn test_unknown_keys_get_synthetic_scancodes() {
        // 248 is past every mapped key; 248 & 0x7f == 0x78.
        assert_eq!(keyc2scan(8 + 248), 0x278);
        // Keycodes below the X offset wrap and also hit the fallback.
        assert_eq!(keyc2scan(0), 0x200 | ((0u32.wrapping_sub(8) & 0x7f) as u16));
    }

    proptest! {
        #[test]
        fn proptest_total_over_fuzzed_input(keycode in 0u32..512) {
            let scan = keyc2scan(keycode);
            // Every result lands in the T, E0 or E1 series.
            prop_assert!(scan & !0x3ff == 0);
        }
    }
}
