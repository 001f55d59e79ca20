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

//! Live keymap source backed by an X11 display.
//!
//! Snapshots the core-protocol keyboard mapping and the `_XKB_RULES_NAMES`
//! root-window property. The core mapping flattens xkb groups into keysym
//! columns, two per group, so only the base and shift levels are available
//! here; a key's altgr levels fall back to its base levels.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::AtomEnum;
use x11rb::protocol::xproto::ConnectionExt;

use crate::keyboard::keysym::Keysym;
use crate::keyboard::rules::RulesNames;
use crate::keyboard::source::KeymapSource;
use crate::prelude::*;

const RULES_PROPERTY: &[u8] = b"_XKB_RULES_NAMES";

#[derive(Debug, Clone)]
pub struct X11Keymap {
    min_keycode: u32,
    max_keycode: u32,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
    rules: RulesNames,
}

impl X11Keymap {
    /// Connects to the default display and snapshots its configuration.
    pub fn from_display() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).location(loc!())?;
        Self::from_connection(&conn, screen_num)
    }

    pub fn from_connection(conn: &impl Connection, screen_num: usize) -> Result<Self> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;

        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)
            .location(loc!())?
            .reply()
            .location(loc!())?;

        let root = setup.roots[screen_num].root;
        let atom = conn
            .intern_atom(false, RULES_PROPERTY)
            .location(loc!())?
            .reply()
            .location(loc!())?
            .atom;
        let property = conn
            .get_property(false, root, atom, AtomEnum::STRING, 0, 4096)
            .location(loc!())?
            .reply()
            .location(loc!())?;
        let rules = RulesNames::parse(&property.value);
        debug!(
            "keymap snapshot: keycodes {min_keycode}-{max_keycode}, layouts {:?}",
            rules.layouts
        );

        Ok(Self {
            min_keycode: min_keycode.into(),
            max_keycode: max_keycode.into(),
            keysyms_per_keycode: mapping.keysyms_per_keycode as usize,
            keysyms: mapping.keysyms,
            rules,
        })
    }
}

impl KeymapSource for X11Keymap {
    fn keycode_range(&self) -> (u32, u32) {
        (self.min_keycode, self.max_keycode)
    }

    fn rules_names(&self) -> RulesNames {
        self.rules.clone()
    }

    fn keysym(&self, keycode: u32, group: u8, level: u8) -> Keysym {
        if keycode < self.min_keycode || keycode > self.max_keycode {
            return 0;
        }
        let mut column = group as usize * 2 + (level as usize & 1);
        if column >= self.keysyms_per_keycode {
            column = level as usize & 1;
        }
        let base = (keycode - self.min_keycode) as usize * self.keysyms_per_keycode;
        self.keysyms.get(base + column).copied().unwrap_or(0)
    }
}
