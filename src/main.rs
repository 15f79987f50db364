//! Kessler - headless debris cascade engine
//!
//! Runs the simulation loop without a window. An optional TOML configuration
//! path may be passed as the first argument.

use std::process::ExitCode;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use kessler::config::KesslerConfig;
use kessler::plugin::KesslerPlugin;

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => match KesslerConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("kessler: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => KesslerConfig::default(),
    };

    let exit = App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(KesslerPlugin::new(config))
        .run();

    if exit.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
