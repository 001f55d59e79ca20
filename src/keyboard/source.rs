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

//! The seam between layout construction and the platform: anything that can
//! report a keycode range, the rules-names property and per-group keysyms
//! can drive the layout engine. The live X11 source (feature `x11`) and the
//! synthetic source below both implement this.

use std::collections::HashMap;

use crate::keyboard::keysym;
use crate::keyboard::keysym::Keysym;
use crate::keyboard::langid;
use crate::keyboard::rules::RulesNames;
use crate::keyboard::scancode::keyc2scan;
use crate::keyboard::tables;
use crate::keyboard::vk::*;

pub trait KeymapSource {
    /// Inclusive (min, max) keycode range.
    fn keycode_range(&self) -> (u32, u32);

    fn rules_names(&self) -> RulesNames;

    /// The keysym produced by a keycode under a group at a shift level
    /// (0 = base, 1 = shift, 2 = altgr, 3 = shift+altgr), or NoSymbol.
    fn keysym(&self, keycode: u32, group: u8, level: u8) -> Keysym;
}

/// A display-less keymap: symbols are derived from the family table that the
/// group's language selects, so `us` produces QWERTY symbols and `fr` AZERTY
/// ones. Individual keys can be overridden for odd layouts.
#[derive(Debug, Clone)]
pub struct StaticKeymap {
    rules: RulesNames,
    min_keycode: u32,
    max_keycode: u32,
    overrides: HashMap<(u32, u8, u8), Keysym>,
}

impl StaticKeymap {
    pub fn new(rules: RulesNames) -> Self {
        Self {
            rules,
            min_keycode: 8,
            max_keycode: 255,
            overrides: HashMap::new(),
        }
    }

    /// Convenience for `setxkbmap`-style specs: `["us(dvorak)", "de"]`.
    pub fn with_layouts(specs: &[&str]) -> Self {
        Self::new(RulesNames::from_layout_specs(specs, ""))
    }

    pub fn set_keysym(&mut self, keycode: u32, group: u8, level: u8, ks: Keysym) {
        self.overrides.insert((keycode, group, level), ks);
    }

    fn synthesize(&self, keycode: u32, group: u8, level: u8) -> Keysym {
        let scan = keyc2scan(keycode);
        let name = self.rules.layout_name(group);
        let lang = langid::langid_from_xkb_layout(self.rules.layout(group));
        let vk = tables::scan2vk_for(lang, &name)[scan as usize];
        keysym_for_vk(vk, level)
    }
}

impl KeymapSource for StaticKeymap {
    fn keycode_range(&self) -> (u32, u32) {
        (self.min_keycode, self.max_keycode)
    }

    fn rules_names(&self) -> RulesNames {
        self.rules.clone()
    }

    fn keysym(&self, keycode: u32, group: u8, level: u8) -> Keysym {
        if let Some(&ks) = self.overrides.get(&(keycode, group, level)) {
            return ks;
        }
        self.synthesize(keycode, group, level)
    }
}

// US-style shifted digit row, used for every synthetic family; regional
// punctuation fidelity doesn't matter to table construction.
const SHIFTED_DIGITS: &[u8; 10] = b")!@#$%^&*(";

fn keysym_for_vk(vk: u16, level: u8) -> Keysym {
    let shifted = level & 1 != 0;
    match vk {
        0 => keysym::NO_SYMBOL,
        vk @ 0x41..=0x5a => {
            // Letters: lowercase at the base level.
            if shifted { vk as Keysym } else { (vk + 0x20) as Keysym }
        },
        vk @ 0x30..=0x39 => {
            if shifted {
                SHIFTED_DIGITS[(vk - 0x30) as usize] as Keysym
            } else {
                vk as Keysym
            }
        },
        VK_NUMPAD0..=VK_NUMPAD9 => keysym::XK_KP_0 + (vk - VK_NUMPAD0) as Keysym,
        VK_F1..=VK_F24 => keysym::XK_F1 + (vk - VK_F1) as Keysym,
        VK_SPACE => ' ' as Keysym,
        VK_RETURN => keysym::XK_RETURN,
        VK_BACK => keysym::XK_BACKSPACE,
        VK_TAB => keysym::XK_TAB,
        VK_ESCAPE => keysym::XK_ESCAPE,
        VK_LSHIFT => keysym::XK_SHIFT_L,
        VK_RSHIFT => keysym::XK_SHIFT_R,
        VK_LCONTROL => keysym::XK_CONTROL_L,
        VK_RCONTROL => keysym::XK_CONTROL_R,
        VK_LMENU => keysym::XK_ALT_L,
        VK_RMENU => keysym::XK_ISO_LEVEL3_SHIFT,
        VK_CAPITAL => keysym::XK_CAPS_LOCK,
        VK_NUMLOCK => keysym::XK_NUM_LOCK,
        VK_SCROLL => keysym::XK_SCROLL_LOCK,
        VK_PAUSE => keysym::XK_PAUSE,
        VK_HOME => keysym::XK_HOME,
        VK_UP => keysym::XK_UP,
        VK_PRIOR => keysym::XK_PRIOR,
        VK_LEFT => keysym::XK_LEFT,
        VK_RIGHT => keysym::XK_RIGHT,
        VK_END => keysym::XK_END,
        VK_DOWN => keysym::XK_DOWN,
        VK_NEXT => keysym::XK_NEXT,
        VK_INSERT => keysym::XK_INSERT,
        VK_DELETE => keysym::XK_DELETE,
        VK_LWIN => keysym::XK_SUPER_L,
        VK_RWIN => keysym::XK_SUPER_R,
        VK_APPS => keysym::XK_MENU,
        VK_MULTIPLY => keysym::XK_KP_MULTIPLY,
        VK_ADD => keysym::XK_KP_ADD,
        VK_SUBTRACT => keysym::XK_KP_SUBTRACT,
        VK_DECIMAL => keysym::XK_KP_DECIMAL,
        VK_DIVIDE => keysym::XK_KP_DIVIDE,
        VK_SEPARATOR => keysym::XK_KP_SEPARATOR,
        VK_OEM_1 => pick(shifted, b';', b':'),
        VK_OEM_PLUS => pick(shifted, b'=', b'+'),
        VK_OEM_COMMA => pick(shifted, b',', b'<'),
        VK_OEM_MINUS => pick(shifted, b'-', b'_'),
        VK_OEM_PERIOD => pick(shifted, b'.', b'>'),
        VK_OEM_2 => pick(shifted, b'/', b'?'),
        VK_OEM_3 => pick(shifted, b'`', b'~'),
        VK_OEM_4 => pick(shifted, b'[', b'{'),
        VK_OEM_5 => pick(shifted, b'\\', b'|'),
        VK_OEM_6 => pick(shifted, b']', b'}'),
        VK_OEM_7 => pick(shifted, b'\'', b'"'),
        VK_OEM_102 => pick(shifted, b'<', b'>'),
        _ => keysym::NO_SYMBOL,
    }
}

fn pick(shifted: bool, base: u8, shift: u8) -> Keysym {
    if shifted { shift as Keysym } else { base as Keysym }
}
