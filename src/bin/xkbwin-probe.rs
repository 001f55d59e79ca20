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

//! Diagnostic tool: builds layout translation tables for a keymap
//! configuration and dumps what the engine resolved. Without a display it
//! runs against a synthetic keymap constructed from `--layout` specs.

use std::path::PathBuf;

use clap::Parser;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tracing::Level;
use xkbwin::config;
use xkbwin::config::SerializableLevel;
use xkbwin::keyboard::InputSink;
use xkbwin::keyboard::KeyInput;
use xkbwin::keyboard::KeyboardLayoutRegistry;
use xkbwin::keyboard::MapType;
use xkbwin::keyboard::WindowId;
use xkbwin::keyboard::source::KeymapSource;
use xkbwin::keyboard::source::StaticKeymap;
use xkbwin::prelude::*;
use xkbwin::utils;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
struct ProbeConfig {
    layouts: Vec<String>,
    log_file: Option<PathBuf>,
    stderr_log_level: SerializableLevel,
    file_log_level: SerializableLevel,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            layouts: vec!["us".to_string()],
            log_file: None,
            stderr_log_level: SerializableLevel(Level::INFO),
            file_log_level: SerializableLevel(Level::TRACE),
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Dump the keyboard layouts the translation engine builds")]
struct Args {
    /// Print a configuration file with default values to stdout.
    #[arg(long)]
    print_default_config_and_exit: bool,

    /// Path to the config file to use.
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Layout spec in setxkbmap form, e.g. "us(dvorak)"; repeatable.
    #[arg(long = "layout")]
    layouts: Vec<String>,

    /// Snapshot the keymap of the running X server instead.
    #[cfg(feature = "x11")]
    #[arg(long)]
    x11: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    stderr_log_level: Option<SerializableLevel>,

    #[arg(long)]
    file_log_level: Option<SerializableLevel>,
}

/// Sink that just narrates what the engine would hand to the input pipeline.
#[derive(Debug, Default)]
struct ProbeSink;

impl InputSink for ProbeSink {
    fn send_input(&mut self, input: &KeyInput) {
        println!(
            "input: vkey {:#04x} scan {:#04x} flags {:#x}",
            input.vkey, input.scan, input.flags
        );
    }

    fn toggle_state(&mut self, _vkey: u16) -> bool {
        false
    }

    fn set_toggle_state(&mut self, _vkey: u16, _on: bool) {}

    fn notify_layout_change(&mut self, _window: WindowId, hkl: u32) {
        println!("active layout changed, handle {hkl:#010x}");
    }
}

fn init_config(args: &Args) -> Result<ProbeConfig> {
    let mut config = ProbeConfig::default();

    let config_file = args
        .config_file
        .clone()
        .unwrap_or_else(|| config::default_config_file("xkbwin-probe"));
    if let Some(from_file) = config::maybe_read_ron_file::<ProbeConfig>(&config_file)? {
        config = from_file;
    }

    if !args.layouts.is_empty() {
        config.layouts = args.layouts.clone();
    }
    if let Some(log_file) = &args.log_file {
        config.log_file = Some(log_file.clone());
    }
    if let Some(level) = &args.stderr_log_level {
        config.stderr_log_level = level.clone();
    }
    if let Some(level) = &args.file_log_level {
        config.file_log_level = level.clone();
    }

    Ok(config)
}

fn keymap_source(args: &Args, config: &ProbeConfig) -> Result<Box<dyn KeymapSource>> {
    #[cfg(feature = "x11")]
    if args.x11 {
        return Ok(Box::new(xkbwin::x11::X11Keymap::from_display()?));
    }
    let _ = args;

    let specs: Vec<&str> = config.layouts.iter().map(String::as_str).collect();
    Ok(Box::new(StaticKeymap::with_layouts(&specs)))
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.print_default_config_and_exit {
        config::print_default_config_and_exit::<ProbeConfig>();
    }
    let config = init_config(&args).location(loc!())?;

    utils::configure_tracing(
        config.stderr_log_level.0,
        config.log_file.as_ref(),
        config.file_log_level.0,
    )
    .location(loc!())?;
    utils::exit_on_thread_panic();

    let keymap = keymap_source(&args, &config).location(loc!())?;
    let registry = KeyboardLayoutRegistry::new();
    registry.rescan(keymap.as_ref());

    for layout in registry.layouts() {
        println!(
            "layout {:<24} group {:<4} lang {:#06x} index {} id {:<4} handle {:#010x}",
            layout.xkb_layout,
            layout
                .xkb_group
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string()),
            layout.lang,
            layout.index,
            layout.layout_id,
            layout.handle,
        );
    }

    let mut sink = ProbeSink;
    registry.set_current_group(0, 0, &mut sink);

    // A few round trips through the active tables, as a smoke check.
    for vkey in [b'A' as u32, b'Q' as u32, 0x0d] {
        let scan = registry.map_virtual_key(vkey, MapType::VkToVsc);
        let back = registry.map_virtual_key(scan, MapType::VscToVk);
        let name = registry
            .key_name_text(scan as u16)
            .unwrap_or_else(|| "?".to_string());
        println!("vkey {vkey:#04x} -> scan {scan:#04x} ({name}) -> vkey {back:#04x}");
    }

    Ok(())
}
