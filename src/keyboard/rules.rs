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

//! The `_XKB_RULES_NAMES` root-window property: a NUL-separated sequence of
//! five strings (rules, model, comma-separated layouts, comma-separated
//! variants, options) describing the server's keyboard configuration.

use itertools::EitherOrBoth;
use itertools::Itertools;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RulesNames {
    pub rules: String,
    pub model: String,
    pub layouts: Vec<String>,
    pub variants: Vec<String>,
    pub options: String,
}

impl RulesNames {
    /// Parses the raw property blob. Missing trailing fields are empty, never
    /// an error: a server with no rules property still has layout group 0.
    pub fn parse(blob: &[u8]) -> Self {
        let mut fields = blob
            .split(|&b| b == 0)
            .map(|f| String::from_utf8_lossy(f).into_owned());

        let rules = fields.next().unwrap_or_default();
        let model = fields.next().unwrap_or_default();
        let layouts = split_list(&fields.next().unwrap_or_default());
        let variants = split_list(&fields.next().unwrap_or_default());
        let options = fields.next().unwrap_or_default();

        Self {
            rules,
            model,
            layouts,
            variants,
            options,
        }
    }

    /// Builds one from explicit layout specs of the form `layout(variant)`,
    /// the same shape setxkbmap accepts. Used by synthetic keymap sources.
    pub fn from_layout_specs(specs: &[&str], options: &str) -> Self {
        let mut layouts = Vec::new();
        let mut variants = Vec::new();
        for spec in specs {
            match spec.split_once('(') {
                Some((layout, rest)) => {
                    layouts.push(layout.to_string());
                    variants.push(rest.trim_end_matches(')').to_string());
                },
                None => {
                    layouts.push(spec.to_string());
                    variants.push(String::new());
                },
            }
        }
        Self {
            rules: "evdev".to_string(),
            model: "pc105".to_string(),
            layouts,
            variants,
            options: options.to_string(),
        }
    }

    pub fn num_groups(&self) -> u8 {
        self.layouts.len().min(4) as u8
    }

    /// The canonical `"<layout>:<variant>:<options>"` key for a group. The
    /// variant list may be shorter than the layout list; missing variants are
    /// empty, and options apply to every group.
    pub fn layout_name(&self, group: u8) -> String {
        let (layout, variant) = self
            .layouts
            .iter()
            .zip_longest(self.variants.iter())
            .nth(group as usize)
            .map(|pair| match pair {
                EitherOrBoth::Both(l, v) => (l.as_str(), v.as_str()),
                EitherOrBoth::Left(l) => (l.as_str(), ""),
                EitherOrBoth::Right(v) => ("", v.as_str()),
            })
            .unwrap_or_default();
        format!("{}:{}:{}", layout, variant, self.options)
    }

    /// The bare layout component for a group, fed to langid resolution.
    pub fn layout(&self, group: u8) -> &str {
        self.layouts
            .get(group as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_blob() {
        let blob = b"evdev\0pc105\0us,de\0,neo\0grp:alt_shift_toggle\0";
        let names = RulesNames::parse(blob);
        assert_eq!(names.rules, "evdev");
        assert_eq!(names.model, "pc105");
        assert_eq!(names.layouts, vec!["us", "de"]);
        assert_eq!(names.variants, vec!["", "neo"]);
        assert_eq!(names.options, "grp:alt_shift_toggle");
    }

    #[test]
    fn test_parse_short_blob() {
        let names = RulesNames::parse(b"evdev\0pc105");
        assert_eq!(names.model, "pc105");
        assert!(names.layouts.is_empty());
        assert_eq!(names.options, "");

        let names = RulesNames::parse(b"");
        assert!(names.layouts.is_empty());
    }

    #[test]
    fn test_layout_name_composition() {
        let names = RulesNames::parse(b"evdev\0pc105\0us,de\0,neo\0opt\0");
        assert_eq!(names.layout_name(0), "us::opt");
        assert_eq!(names.layout_name(1), "de:neo:opt");
        // Out-of-range groups degrade to an empty key, not a panic.
        assert_eq!(names.layout_name(3), "::opt");
    }

    #[test]
    fn test_uneven_variant_list() {
        let names = RulesNames::parse(b"evdev\0pc105\0us,fr,de\0dvorak\0\0");
        assert_eq!(names.layout_name(0), "us:dvorak:");
        assert_eq!(names.layout_name(1), "fr::");
        assert_eq!(names.layout_name(2), "de::");
    }

    #[test]
    fn test_from_layout_specs() {
        let names = RulesNames::from_layout_specs(&["us(dvorak)", "de"], "");
        assert_eq!(names.layouts, vec!["us", "de"]);
        assert_eq!(names.variants, vec!["dvorak", ""]);
        assert_eq!(names.layout_name(0), "us:dvorak:");
    }
}
