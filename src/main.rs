use std::process::ExitCode;

use anyhow::Result;
use ecn_deploy::{app::App, cmd::Command, config::Config, logging::Logger};

fn main() -> Result<ExitCode> {
    let cmd = Command::init();

    let config = Config::load(cmd.config_load_option()?)?
        .override_with(cmd.controller_url.clone(), cmd.token.clone());

    if cmd.logging {
        Logger::init(&config.logging)?;
    }

    let success = App::run(cmd, config)?;

    if success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
