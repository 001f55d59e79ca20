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

//! Xkb layout-name to Windows language-identifier resolution.

use crate::prelude::*;

/// A packed Windows language identifier: `(sublang << 10) | lang`.
pub type Langid = u16;

/// Sentinel for layouts whose name resolves to no known language:
/// `MAKELANGID(LANG_NEUTRAL, SUBLANG_CUSTOM_UNSPECIFIED)`.
pub const LANGID_CUSTOM_UNSPECIFIED: Langid = 0x1000;

// Two-letter xkb layout names, sorted for binary search. Values are full
// langids, i.e. the sublanguage is already folded in for the entries that
// don't use SUBLANG_DEFAULT (gb, ch, br, ...).
static LANGIDS: &[(&str, Langid)] = &[
    ("al", 0x041c), // Albanian
    ("am", 0x042b), // Armenian
    ("at", 0x0c07), // German (Austria)
    ("az", 0x042c), // Azerbaijani
    ("ba", 0x141a), // Bosnian (Latin)
    ("bd", 0x0445), // Bengali
    ("be", 0x0813), // Dutch (Belgium)
    ("bg", 0x0402), // Bulgarian
    ("br", 0x0416), // Portuguese (Brazil)
    ("bw", 0x0432), // Setswana
    ("by", 0x0423), // Belarusian
    ("ca", 0x0c0c), // French (Canada)
    ("ch", 0x0807), // German (Switzerland)
    ("cn", 0x0804), // Chinese (PRC)
    ("cz", 0x0405), // Czech
    ("de", 0x0407), // German
    ("dk", 0x0406), // Danish
    ("ee", 0x0425), // Estonian
    ("es", 0x040a), // Spanish
    ("et", 0x045e), // Amharic
    ("fi", 0x040b), // Finnish
    ("fo", 0x0438), // Faroese
    ("fr", 0x040c), // French
    ("gb", 0x0809), // English (UK)
    ("ge", 0x0437), // Georgian
    ("gr", 0x0408), // Greek
    ("hr", 0x041a), // Croatian
    ("hu", 0x040e), // Hungarian
    ("ie", 0x1809), // English (Ireland)
    ("il", 0x040d), // Hebrew
    ("in", 0x0439), // Hindi
    ("iq", 0x0801), // Arabic (Iraq)
    ("ir", 0x0429), // Persian
    ("is", 0x040f), // Icelandic
    ("it", 0x0410), // Italian
    ("jp", 0x0411), // Japanese
    ("ke", 0x0441), // Swahili
    ("kg", 0x0440), // Kyrgyz
    ("kh", 0x0453), // Khmer
    ("kr", 0x0412), // Korean
    ("kz", 0x043f), // Kazakh
    ("la", 0x0454), // Lao
    ("lk", 0x045b), // Sinhala
    ("lt", 0x0427), // Lithuanian
    ("lv", 0x0426), // Latvian
    ("ma", 0x1801), // Arabic (Morocco)
    ("mk", 0x042f), // Macedonian
    ("mn", 0x0450), // Mongolian
    ("mt", 0x043a), // Maltese
    ("mv", 0x0465), // Dhivehi
    ("my", 0x043e), // Malay
    ("nl", 0x0413), // Dutch
    ("no", 0x0414), // Norwegian
    ("np", 0x0461), // Nepali
    ("ph", 0x0464), // Filipino
    ("pk", 0x0420), // Urdu
    ("pl", 0x0415), // Polish
    ("pt", 0x0816), // Portuguese
    ("ro", 0x0418), // Romanian
    ("rs", 0x081a), // Serbian (Latin)
    ("ru", 0x0419), // Russian
    ("se", 0x041d), // Swedish
    ("si", 0x0424), // Slovenian
    ("sk", 0x041b), // Slovak
    ("th", 0x041e), // Thai
    ("tj", 0x0428), // Tajik
    ("tm", 0x0442), // Turkmen
    ("tr", 0x041f), // Turkish
    ("tw", 0x0404), // Chinese (Taiwan)
    ("ua", 0x0422), // Ukrainian
    ("us", 0x0409), // English (US)
    ("uz", 0x0443), // Uzbek
    ("vn", 0x042a), // Vietnamese
    ("za", 0x1c09), // English (South Africa)
];

/// Resolves an xkb layout name to a language identifier.
///
/// Unknown names degrade to [`LANGID_CUSTOM_UNSPECIFIED`] with a diagnostic;
/// a resolution miss must never abort layout construction.
pub fn langid_from_xkb_layout(layout: &str) -> Langid {
    if layout.len() == 2
        && let Ok(idx) = LANGIDS.binary_search_by_key(&layout, |&(name, _)| name)
    {
        return LANGIDS[idx].1;
    }

    match layout {
        "ara" => 0x0401,                      // Arabic (Saudi Arabia)
        "epo" => LANGID_CUSTOM_UNSPECIFIED,   // Esperanto has no langid
        "mao" => 0x0481,                      // Maori
        "brai" => LANGID_CUSTOM_UNSPECIFIED,  // braille
        "latam" => 0x080a,                    // Spanish (Latin America)
        _ => {
            debug!("unknown layout language {layout:?}");
            LANGID_CUSTOM_UNSPECIFIED
        },
    }
}
