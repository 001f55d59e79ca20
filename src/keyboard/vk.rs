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

//! Virtual-key codes, following the documented Win32 numbering. Letter and
//! digit keys use their ASCII values and have no named constant.

pub const VK_CANCEL: u16 = 0x03;
pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_CLEAR: u16 = 0x0c;
pub const VK_RETURN: u16 = 0x0d;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_PAUSE: u16 = 0x13;
pub const VK_CAPITAL: u16 = 0x14;
pub const VK_KANA: u16 = 0x15;
pub const VK_HANGUL: u16 = 0x15;
pub const VK_HANJA: u16 = 0x19;
pub const VK_KANJI: u16 = 0x19;
pub const VK_ESCAPE: u16 = 0x1b;
pub const VK_CONVERT: u16 = 0x1c;
pub const VK_NONCONVERT: u16 = 0x1d;
pub const VK_SPACE: u16 = 0x20;
pub const VK_PRIOR: u16 = 0x21;
pub const VK_NEXT: u16 = 0x22;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_SNAPSHOT: u16 = 0x2c;
pub const VK_INSERT: u16 = 0x2d;
pub const VK_DELETE: u16 = 0x2e;
pub const VK_HELP: u16 = 0x2f;
pub const VK_LWIN: u16 = 0x5b;
pub const VK_RWIN: u16 = 0x5c;
pub const VK_APPS: u16 = 0x5d;
pub const VK_SLEEP: u16 = 0x5f;
pub const VK_NUMPAD0: u16 = 0x60;
pub const VK_NUMPAD1: u16 = 0x61;
pub const VK_NUMPAD2: u16 = 0x62;
pub const VK_NUMPAD3: u16 = 0x63;
pub const VK_NUMPAD4: u16 = 0x64;
pub const VK_NUMPAD5: u16 = 0x65;
pub const VK_NUMPAD6: u16 = 0x66;
pub const VK_NUMPAD7: u16 = 0x67;
pub const VK_NUMPAD8: u16 = 0x68;
pub const VK_NUMPAD9: u16 = 0x69;
pub const VK_MULTIPLY: u16 = 0x6a;
pub const VK_ADD: u16 = 0x6b;
pub const VK_SEPARATOR: u16 = 0x6c;
pub const VK_SUBTRACT: u16 = 0x6d;
pub const VK_DECIMAL: u16 = 0x6e;
pub const VK_DIVIDE: u16 = 0x6f;
pub const VK_F1: u16 = 0x70;
pub const VK_F2: u16 = 0x71;
pub const VK_F3: u16 = 0x72;
pub const VK_F4: u16 = 0x73;
pub const VK_F5: u16 = 0x74;
pub const VK_F6: u16 = 0x75;
pub const VK_F7: u16 = 0x76;
pub const VK_F8: u16 = 0x77;
pub const VK_F9: u16 = 0x78;
pub const VK_F10: u16 = 0x79;
pub const VK_F11: u16 = 0x7a;
pub const VK_F12: u16 = 0x7b;
pub const VK_F13: u16 = 0x7c;
pub const VK_F14: u16 = 0x7d;
pub const VK_F15: u16 = 0x7e;
pub const VK_F16: u16 = 0x7f;
pub const VK_F17: u16 = 0x80;
pub const VK_F18: u16 = 0x81;
pub const VK_F19: u16 = 0x82;
pub const VK_F20: u16 = 0x83;
pub const VK_F21: u16 = 0x84;
pub const VK_F22: u16 = 0x85;
pub const VK_F23: u16 = 0x86;
pub const VK_F24: u16 = 0x87;
pub const VK_NUMLOCK: u16 = 0x90;
pub const VK_SCROLL: u16 = 0x91;
pub const VK_LSHIFT: u16 = 0xa0;
pub const VK_RSHIFT: u16 = 0xa1;
pub const VK_LCONTROL: u16 = 0xa2;
pub const VK_RCONTROL: u16 = 0xa3;
pub const VK_LMENU: u16 = 0xa4;
pub const VK_RMENU: u16 = 0xa5;
pub const VK_BROWSER_BACK: u16 = 0xa6;
pub const VK_BROWSER_FORWARD: u16 = 0xa7;
pub const VK_BROWSER_REFRESH: u16 = 0xa8;
pub const VK_BROWSER_STOP: u16 = 0xa9;
pub const VK_BROWSER_SEARCH: u16 = 0xaa;
pub const VK_BROWSER_FAVORITES: u16 = 0xab;
pub const VK_BROWSER_HOME: u16 = 0xac;
pub const VK_VOLUME_MUTE: u16 = 0xad;
pub const VK_VOLUME_DOWN: u16 = 0xae;
pub const VK_VOLUME_UP: u16 = 0xaf;
pub const VK_MEDIA_NEXT_TRACK: u16 = 0xb0;
pub const VK_MEDIA_PREV_TRACK: u16 = 0xb1;
pub const VK_MEDIA_STOP: u16 = 0xb2;
pub const VK_MEDIA_PLAY_PAUSE: u16 = 0xb3;
pub const VK_LAUNCH_MAIL: u16 = 0xb4;
pub const VK_LAUNCH_MEDIA_SELECT: u16 = 0xb5;
pub const VK_LAUNCH_APP1: u16 = 0xb6;
pub const VK_LAUNCH_APP2: u16 = 0xb7;
pub const VK_OEM_1: u16 = 0xba;
pub const VK_OEM_PLUS: u16 = 0xbb;
pub const VK_OEM_COMMA: u16 = 0xbc;
pub const VK_OEM_MINUS: u16 = 0xbd;
pub const VK_OEM_PERIOD: u16 = 0xbe;
pub const VK_OEM_2: u16 = 0xbf;
pub const VK_OEM_3: u16 = 0xc0;
pub const VK_ABNT_C1: u16 = 0xc1;
pub const VK_ABNT_C2: u16 = 0xc2;
pub const VK_OEM_4: u16 = 0xdb;
pub const VK_OEM_5: u16 = 0xdc;
pub const VK_OEM_6: u16 = 0xdd;
pub const VK_OEM_7: u16 = 0xde;
pub const VK_OEM_8: u16 = 0xdf;
pub const VK_OEM_AX: u16 = 0xe1;
pub const VK_OEM_102: u16 = 0xe2;
pub const VK_PROCESSKEY: u16 = 0xe5;
pub const VK_OEM_RESET: u16 = 0xe9;
pub const VK_OEM_JUMP: u16 = 0xea;
pub const VK_OEM_PA1: u16 = 0xeb;
pub const VK_OEM_PA2: u16 = 0xec;
pub const VK_OEM_PA3: u16 = 0xed;
pub const VK_OEM_WSCTRL: u16 = 0xee;
pub const VK_OEM_CUSEL: u16 = 0xef;
pub const VK_OEM_ATTN: u16 = 0xf0;
pub const VK_OEM_FINISH: u16 = 0xf1;
pub const VK_OEM_COPY: u16 = 0xf2;
pub const VK_OEM_AUTO: u16 = 0xf3;
pub const VK_OEM_ENLW: u16 = 0xf4;
pub const VK_OEM_BACKTAB: u16 = 0xf5;
pub const VK_ATTN: u16 = 0xf6;
pub const VK_CRSEL: u16 = 0xf7;
pub const VK_EXSEL: u16 = 0xf8;
pub const VK_EREOF: u16 = 0xf9;
pub const VK_PLAY: u16 = 0xfa;
pub const VK_ZOOM: u16 = 0xfb;
pub const VK_PA1: u16 = 0xfd;
pub const VK_OEM_CLEAR: u16 = 0xfe;
