use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

pub fn config_path_from_args() -> Result<Option<PathBuf>> {
    parse_config_path(env::args().skip(1))
}

fn parse_config_path<I>(mut args: I) -> Result<Option<PathBuf>>
where
    I: Iterator<Item = String>,
{
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other}. usage: syrinx [--config <path>]"
                ));
            }
        }
    }

    Ok(config_path)
}
