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

//! The keyboard layout engine.
//!
//! [`KeyboardLayoutRegistry`] owns every layout detected on the keymap
//! source, one per distinct `"<layout>:<variant>:<options>"` configuration.
//! A rescan detaches all layouts and then revives or creates one per
//! reported group; translation always goes through the layout selected by
//! [`KeyboardLayoutRegistry::set_current_group`]. Translation misses degrade
//! to sentinels instead of failing: a miss must never block input delivery.

pub mod keysym;
pub mod langid;
pub mod rules;
pub mod scancode;
pub mod source;
pub mod tables;
pub mod vk;

use std::sync::Mutex;

use bitflags::bitflags;

use crate::keyboard::keysym::Keysym;
use crate::keyboard::keysym::NO_SYMBOL;
use crate::keyboard::langid::Langid;
use crate::keyboard::langid::langid_from_xkb_layout;
use crate::keyboard::scancode::SCAN_E0;
use crate::keyboard::scancode::SCAN_E1;
use crate::keyboard::scancode::keyc2scan;
use crate::keyboard::source::KeymapSource;
use crate::keyboard::tables::Scan2Vk;
use crate::keyboard::vk::*;
use crate::prelude::*;

bitflags! {
    /// X-style modifier state. Bits 13-14 carry the xkb group.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
    pub struct ModMask: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const GROUP = 3 << 13;
    }
}

impl ModMask {
    pub fn group(self) -> u8 {
        ((self.bits() >> 13) & 3) as u8
    }

    pub fn with_group(group: u8) -> Self {
        Self::from_bits_retain(((group as u32) & 3) << 13)
    }
}

bitflags! {
    /// Shift state reported by reverse character lookup; AltGr is Ctrl+Alt.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
    pub struct ShiftState: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
    }
}

pub type WindowId = u64;

pub const KEYEVENTF_EXTENDEDKEY: u32 = 0x1;
pub const KEYEVENTF_KEYUP: u32 = 0x2;

/// One raw key event from the display server.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub window: WindowId,
    pub keycode: u32,
    pub state: ModMask,
    pub pressed: bool,
    pub time_ms: u32,
}

/// A translated keyboard event, ready for hardware-input injection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyInput {
    pub vkey: u16,
    pub scan: u16,
    pub flags: u32,
    pub time_ms: u32,
}

/// Downstream input pipeline. Everything behind this trait is outside the
/// engine: event injection, Windows-side toggle state, layout-change
/// notification delivery.
pub trait InputSink {
    fn send_input(&mut self, input: &KeyInput);
    fn toggle_state(&mut self, vkey: u16) -> bool;
    fn set_toggle_state(&mut self, vkey: u16, on: bool);
    fn notify_layout_change(&mut self, window: WindowId, hkl: u32);
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ToUnicodeResult {
    /// The key produces no character under the given state.
    None,
    /// A dead key; the combining character is retained for the next call.
    Dead(char),
    Text(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MapType {
    VkToVsc,
    VscToVk,
    VkToChar,
    VscToVkEx,
    VkToVscEx,
}

const NUM_LEVELS: usize = 4;

/// One detected keyboard layout with its translation tables.
///
/// `index` is dense per language in detection order and `layout_id` is
/// assigned from a process-wide monotonic counter for every layout after the
/// first of its language. Both are therefore session-local: a different
/// detection order on the next run may pair them differently.
struct Layout {
    xkb_group: Option<u8>,
    xkb_layout: String,
    lang: Langid,
    index: usize,
    layout_id: u16,
    scan2vk: &'static Scan2Vk,
    min_keycode: u32,
    keysyms: Vec<[Keysym; NUM_LEVELS]>,
    vkey_base: [u16; 0x100],
    vkey_e0: Vec<(u8, u16)>,
    vkey_e1: Vec<(u8, u16)>,
    key_names: Vec<(u16, String)>,
    key_names_ext: Vec<(u16, String)>,
}

impl Layout {
    /// The externally visible layout handle: low word is the locale, high
    /// word is the language again or a synthetic `0xfnnn` id for secondary
    /// layouts of a language.
    fn handle(&self) -> u32 {
        let high = if self.layout_id != 0 {
            0xf000 | self.layout_id as u32
        } else {
            self.lang as u32
        };
        (high << 16) | self.lang as u32
    }

    fn vkey_from_scan(&self, scan: u16) -> u16 {
        if scan < 0x100 {
            self.vkey_base[scan as usize]
        } else if scan & SCAN_E0 != 0 {
            lookup_pair(&self.vkey_e0, (scan & 0xff) as u8)
        } else {
            lookup_pair(&self.vkey_e1, (scan & 0xff) as u8)
        }
    }

    fn keysym(&self, keycode: u32, level: u8) -> Keysym {
        let Some(idx) = keycode.checked_sub(self.min_keycode) else {
            return NO_SYMBOL;
        };
        let Some(syms) = self.keysyms.get(idx as usize) else {
            return NO_SYMBOL;
        };
        let sym = syms[(level as usize).min(NUM_LEVELS - 1)];
        // Keys with fewer levels fall back to their base symbol.
        if sym == NO_SYMBOL { syms[0] } else { sym }
    }

    fn keycodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.min_keycode..self.min_keycode + self.keysyms.len() as u32
    }

    fn keycode_for_scan(&self, scan: u16) -> Option<u32> {
        self.keycodes().find(|&kc| keyc2scan(kc) == scan)
    }

    fn keycode_for_vkey(&self, vkey: u16) -> Option<u32> {
        self.keycodes()
            .find(|&kc| self.vkey_from_scan(keyc2scan(kc)) == vkey)
    }
}

fn lookup_pair(pairs: &[(u8, u16)], scan: u8) -> u16 {
    pairs
        .iter()
        .find(|&&(s, _)| s == scan)
        .map_or(0, |&(_, v)| v)
}

/// Public, cloneable summary of one layout, for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LayoutInfo {
    pub xkb_layout: String,
    pub xkb_group: Option<u8>,
    pub lang: Langid,
    pub index: usize,
    pub layout_id: u16,
    pub handle: u32,
}

#[derive(Default)]
struct RegistryInner {
    layouts: Vec<Layout>,
    active: Option<usize>,
    next_layout_id: u16,
    last_notified: Option<u32>,
    mod_state: ModMask,
    pending_dead: Option<char>,
}

/// The engine context: layout list, active table and id counter, guarded by
/// one coarse mutex. Translation operations are table lookups, so a single
/// lock beats a reader-writer scheme for a rarely-written structure.
#[derive(Default)]
pub struct KeyboardLayoutRegistry {
    inner: Mutex<RegistryInner>,
}

impl KeyboardLayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-detects the keymap configuration. All layouts are detached first;
    /// each reported group then revives its existing layout or creates a new
    /// one. Layouts are never destroyed, only detached.
    #[instrument(skip(self, keymap))]
    pub fn rescan(&self, keymap: &dyn KeymapSource) {
        let rules = keymap.rules_names();
        let mut inner = self.inner.lock().unwrap();

        for layout in &mut inner.layouts {
            layout.xkb_group = None;
        }

        for group in 0..rules.num_groups() {
            let name = rules.layout_name(group);
            let lang = langid_from_xkb_layout(rules.layout(group));
            inner.create_layout(keymap, group, name, lang);
        }

        debug!(
            "keymap rescan found {} group(s), {} layout(s) known",
            rules.num_groups(),
            inner.layouts.len()
        );
    }

    /// Switches the active layout to the one attached to `group`. Posts an
    /// input-language-changed notification when the visible handle changes.
    /// An unknown group leaves the active table untouched.
    pub fn set_current_group(&self, window: WindowId, group: u8, sink: &mut dyn InputSink) {
        let mut inner = self.inner.lock().unwrap();
        let Some(idx) = inner
            .layouts
            .iter()
            .position(|l| l.xkb_group == Some(group))
        else {
            warn!("no layout attached to xkb group {group}");
            return;
        };

        inner.active = Some(idx);
        let hkl = inner.layouts[idx].handle();
        let changed = inner.last_notified != Some(hkl);
        inner.last_notified = Some(hkl);
        drop(inner);

        if changed {
            sink.notify_layout_change(window, hkl);
        }
    }

    /// Translates one raw key event and injects it into the sink. Returns
    /// false when the key has no virtual-key mapping; unmapped keys produce
    /// no synthesized input.
    pub fn key_event(&self, event: &KeyEvent, sink: &mut dyn InputSink) -> bool {
        let mut inner = self.inner.lock().unwrap();

        // Reverse-translation calls have no access to the raw event, so the
        // effective modifier mask is cached here.
        inner.mod_state = event.state & ModMask::all();

        let Some(layout) = inner.active.map(|i| &inner.layouts[i]) else {
            trace!("key event with no active layout");
            return false;
        };
        let scan = keyc2scan(event.keycode);
        let vkey = layout.vkey_from_scan(scan);
        // State mutation and notification happen after the lock is dropped;
        // sink callbacks may re-enter the translation surface.
        drop(inner);

        if vkey == 0 {
            trace!("unmapped keycode {}", event.keycode);
            return false;
        }

        self.sync_lock_keys(event, vkey, sink);

        let mut flags = 0;
        if scan & SCAN_E0 != 0 {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if !event.pressed {
            flags |= KEYEVENTF_KEYUP;
        }
        sink.send_input(&KeyInput {
            vkey,
            scan: scan & 0xff,
            flags,
            time_ms: event.time_ms,
        });
        true
    }

    /// Brings the Windows-side Caps/Num/Scroll Lock toggle state in line
    /// with the state the X server reports. A user-mode hook may swallow the
    /// synthesized toggle, so the state is re-read afterwards and forced if
    /// it still diverges.
    fn sync_lock_keys(&self, event: &KeyEvent, event_vkey: u16, sink: &mut dyn InputSink) {
        const LOCKS: [(u16, u16, ModMask); 3] = [
            (VK_CAPITAL, 0x3a, ModMask::LOCK),
            (VK_NUMLOCK, 0x45, ModMask::MOD2),
            (VK_SCROLL, 0x46, ModMask::MOD3),
        ];

        for (vkey, scan, mask) in LOCKS {
            // The event's own key reports pre-transition state; skip it.
            if vkey == event_vkey {
                continue;
            }
            let x_on = event.state.contains(mask);
            if sink.toggle_state(vkey) == x_on {
                continue;
            }

            debug!("resyncing toggle state of vkey {vkey:#04x}");
            let input = KeyInput {
                vkey,
                scan,
                flags: 0,
                time_ms: event.time_ms,
            };
            sink.send_input(&input);
            sink.send_input(&KeyInput {
                flags: KEYEVENTF_KEYUP,
                ..input
            });

            if sink.toggle_state(vkey) != x_on {
                sink.set_toggle_state(vkey, x_on);
            }
        }
    }

    /// Translates a virtual key plus keyboard state to the character(s) it
    /// produces, tracking dead-key state across calls.
    pub fn to_unicode(&self, vkey: u16, scan: u16, keystate: &[u8; 256]) -> ToUnicodeResult {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(layout) = inner.active.map(|i| &inner.layouts[i]) else {
            return ToUnicodeResult::None;
        };

        let Some(keycode) = layout
            .keycode_for_scan(scan)
            .or_else(|| layout.keycode_for_vkey(vkey))
        else {
            return ToUnicodeResult::None;
        };

        let shift = keystate[VK_SHIFT as usize] & 0x80 != 0;
        let control = keystate[VK_CONTROL as usize] & 0x80 != 0;
        let menu = keystate[VK_MENU as usize] & 0x80 != 0;
        let altgr = (control && menu)
            || keystate[VK_RMENU as usize] & 0x80 != 0
            || inner.mod_state.contains(ModMask::MOD5);
        let level = shift as u8 | (altgr as u8) << 1;

        let ks = layout.keysym(keycode, level);
        if let Some(combining) = keysym::dead_key_combining(ks) {
            inner.pending_dead = Some(combining);
            return ToUnicodeResult::Dead(combining);
        }

        // Dead-key state survives non-character keys (shift presses and the
        // like); it is only consumed by the next character.
        let Some(mut ch) = keysym::keysym_to_unicode(ks) else {
            return ToUnicodeResult::None;
        };

        if keystate[VK_CAPITAL as usize] & 1 != 0 && ch.is_alphabetic() {
            ch = if shift {
                ch.to_lowercase().next().unwrap_or(ch)
            } else {
                ch.to_uppercase().next().unwrap_or(ch)
            };
        }

        if control && !altgr {
            // Only the control-code range survives under Ctrl.
            if !ch.is_ascii_alphabetic() {
                return ToUnicodeResult::None;
            }
            ch = (ch.to_ascii_uppercase() as u8 & 0x1f) as char;
        }

        match inner.pending_dead.take() {
            Some(combining) => match keysym::compose_dead_key(combining, ch) {
                Some(composed) => ToUnicodeResult::Text(composed.to_string()),
                // Failed composition emits the accent and the character.
                None => ToUnicodeResult::Text([combining, ch].iter().collect()),
            },
            None => ToUnicodeResult::Text(ch.to_string()),
        }
    }

    /// Reverse lookup: which key and shift state produce this character.
    pub fn vkey_scan(&self, ch: char) -> Option<(u16, ShiftState)> {
        let inner = self.inner.lock().unwrap();
        let layout = inner.active.map(|i| &inner.layouts[i])?;

        for level in 0..NUM_LEVELS as u8 {
            for keycode in layout.keycodes() {
                if keysym::keysym_to_unicode(layout.keysym(keycode, level)) != Some(ch) {
                    continue;
                }
                let vkey = layout.vkey_from_scan(keyc2scan(keycode));
                if vkey == 0 {
                    continue;
                }
                let mut state = ShiftState::empty();
                if level & 1 != 0 {
                    state |= ShiftState::SHIFT;
                }
                if level & 2 != 0 {
                    state |= ShiftState::CTRL | ShiftState::ALT;
                }
                return Some((vkey, state));
            }
        }
        None
    }

    /// The documented MapVirtualKey surface. Returns 0 for any miss.
    pub fn map_virtual_key(&self, code: u32, map_type: MapType) -> u32 {
        let inner = self.inner.lock().unwrap();
        let Some(layout) = inner.active.map(|i| &inner.layouts[i]) else {
            return 0;
        };

        match map_type {
            MapType::VkToVsc | MapType::VkToVscEx => {
                let vkey = match code as u16 {
                    VK_SHIFT => VK_LSHIFT,
                    VK_CONTROL => VK_LCONTROL,
                    VK_MENU => VK_LMENU,
                    vk => vk,
                };
                for (scan, &slot) in layout.scan2vk.iter().enumerate() {
                    if slot != vkey || layout.vkey_from_scan(scan as u16) != vkey {
                        continue;
                    }
                    let scan = scan as u32;
                    return if scan < 0x100 {
                        scan
                    } else if map_type == MapType::VkToVscEx && scan & u32::from(SCAN_E0) != 0 {
                        0xe000 | (scan & 0xff)
                    } else if map_type == MapType::VkToVscEx {
                        0xe100 | (scan & 0xff)
                    } else {
                        0
                    };
                }
                0
            },
            MapType::VscToVk | MapType::VscToVkEx => {
                let vkey = layout.vkey_from_scan(code as u16);
                if map_type == MapType::VscToVkEx {
                    return vkey as u32;
                }
                // The non-Ex variant folds left/right pairs.
                match vkey {
                    VK_LSHIFT | VK_RSHIFT => VK_SHIFT as u32,
                    VK_LCONTROL | VK_RCONTROL => VK_CONTROL as u32,
                    VK_LMENU | VK_RMENU => VK_MENU as u32,
                    vk => vk as u32,
                }
            },
            MapType::VkToChar => {
                let Some(keycode) = layout.keycode_for_vkey(code as u16) else {
                    return 0;
                };
                keysym::keysym_to_unicode(layout.keysym(keycode, 0))
                    .map(|ch| ch.to_uppercase().next().unwrap_or(ch) as u32)
                    .unwrap_or(0)
            },
        }
    }

    /// Human-readable name for a normalized scancode, from the active
    /// layout's name tables.
    pub fn key_name_text(&self, scan: u16) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let layout = inner.active.map(|i| &inner.layouts[i])?;
        let table = if scan & (SCAN_E0 | SCAN_E1) != 0 {
            &layout.key_names_ext
        } else {
            &layout.key_names
        };
        table
            .iter()
            .find(|&&(s, _)| s == scan)
            .map(|(_, name)| name.clone())
    }

    pub fn layouts(&self) -> Vec<LayoutInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .layouts
            .iter()
            .map(|l| LayoutInfo {
                xkb_layout: l.xkb_layout.clone(),
                xkb_group: l.xkb_group,
                lang: l.lang,
                index: l.index,
                layout_id: l.layout_id,
                handle: l.handle(),
            })
            .collect()
    }

    pub fn active_handle(&self) -> Option<u32> {
        let inner = self.inner.lock().unwrap();
        inner.active.map(|i| inner.layouts[i].handle())
    }
}

impl RegistryInner {
    /// Builds the translation tables for one detected group, or revives the
    /// matching existing layout. One layout exists per distinct
    /// configuration string, ever.
    fn create_layout(
        &mut self,
        keymap: &dyn KeymapSource,
        group: u8,
        xkb_layout: String,
        lang: Langid,
    ) {
        if let Some(layout) = self.layouts.iter_mut().find(|l| l.xkb_layout == xkb_layout) {
            trace!("reattaching layout {xkb_layout:?} to group {group}");
            layout.xkb_group = Some(group);
            return;
        }

        let (min_keycode, max_keycode) = keymap.keycode_range();
        let scan2vk = tables::scan2vk_for(lang, &xkb_layout);

        let mut layout = Layout {
            xkb_group: Some(group),
            xkb_layout,
            lang,
            index: self.layouts.iter().filter(|l| l.lang == lang).count(),
            layout_id: 0,
            scan2vk,
            min_keycode,
            keysyms: Vec::with_capacity((max_keycode - min_keycode + 1) as usize),
            vkey_base: [0; 0x100],
            vkey_e0: Vec::new(),
            vkey_e1: Vec::new(),
            key_names: Vec::new(),
            key_names_ext: Vec::new(),
        };

        // Secondary layouts of a language need a synthetic id; the first one
        // is identified by the language alone. Ids are never reused.
        if layout.index != 0 {
            self.next_layout_id += 1;
            layout.layout_id = self.next_layout_id;
        }

        for keycode in min_keycode..=max_keycode {
            let mut syms = [NO_SYMBOL; NUM_LEVELS];
            for (level, sym) in syms.iter_mut().enumerate() {
                *sym = keymap.keysym(keycode, group, level as u8);
            }
            layout.keysyms.push(syms);

            let scan = keyc2scan(keycode);
            let vkey = scan2vk[scan as usize];
            if scan & 0xff != 0 && vkey != 0 {
                if scan < 0x100 {
                    layout.vkey_base[scan as usize] = vkey;
                } else if scan & SCAN_E0 != 0 {
                    layout.vkey_e0.push(((scan & 0xff) as u8, vkey));
                } else {
                    layout.vkey_e1.push(((scan & 0xff) as u8, vkey));
                }
            }

            if scan & 0xff != 0
                && let Some(name) = keysym::keysym_name(syms[0])
            {
                if scan < 0x100 {
                    layout.key_names.push((scan, name));
                } else {
                    layout.key_names_ext.push((scan, name));
                }
            }
        }

        trace!(
            "created layout {:?} lang {:#06x} index {} id {}",
            layout.xkb_layout, layout.lang, layout.index, layout.layout_id
        );
        self.layouts.push(layout);
    }
}
