//! `ntxbuild kconfig` subcommands

use anyhow::Result;

use super::KconfigCommands;
use crate::cli::output;

/// Parse a bool option value as given on the command line
pub fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "false" | "off" | "0" => Ok(false),
        other => Err(format!("expected y or n, got '{other}'")),
    }
}

fn report_change(changed: bool, key: &str, value: &str) {
    if changed {
        output::success(format!("{key} set to {value}"));
    } else {
        output::info(format!("{key} already {value}"));
    }
}

/// Execute a kconfig subcommand
pub async fn execute(ctx: &super::Context, command: KconfigCommands) -> Result<()> {
    let manager = ctx.kconfig()?;

    match command {
        KconfigCommands::Read { key: Some(key) } => {
            // Values go to stdout even under --quiet; they are the output
            println!("{}", manager.get(&key)?);
        }
        KconfigCommands::Read { key: None } => {
            for (key, value) in manager.read()? {
                println!("{key}={value}");
            }
        }
        KconfigCommands::SetValue { key, value } => {
            let changed = manager.set_value(&key, value)?;
            report_change(changed, &key, if value { "y" } else { "n" });
        }
        KconfigCommands::SetStr { key, value } => {
            let changed = manager.set_string(&key, &value)?;
            report_change(changed, &key, &format!("\"{value}\""));
        }
        KconfigCommands::SetNum { key, value } => {
            let changed = manager.set_number(&key, &value)?;
            report_change(changed, &key, &value);
        }
        KconfigCommands::Merge { file } => {
            let changed = manager.merge(&file)?;
            output::success(format!(
                "Merged {}: {changed} option(s) changed",
                file.display()
            ));
        }
        KconfigCommands::Apply => {
            let result = manager.apply().await?;
            if let Some(err) = result.failure() {
                return Err(err.into());
            }
            output::success("Configuration normalized");
        }
        KconfigCommands::Menuconfig => {
            let result = manager.menuconfig().await?;
            if let Some(err) = result.failure() {
                return Err(err.into());
            }
        }
    }
    Ok(())
}
