use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use env_logger::Env;
use log::info;

use earth_demo::config::{Config, DEFAULT_CONFIG_FILE};

const USAGE: &str = "Usage: earth-demo [--config <file.ron>] [--assets <dir>] [--print-config]";

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = options.resolve_config()?;

    if options.print_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(&config.debug.log_level))
        .init();
    info!(
        "starting {}x{} window, assets from {}",
        config.window.width,
        config.window.height,
        config.assets.root.display()
    );
    earth_demo::app::run(config)
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    assets: Option<PathBuf>,
    print_config: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--config expects a file path\n{USAGE}"))?;
                    options.config = Some(PathBuf::from(path));
                }
                "--assets" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| anyhow!("--assets expects a directory\n{USAGE}"))?;
                    options.assets = Some(PathBuf::from(dir));
                }
                "--print-config" => options.print_config = true,
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other => return Err(anyhow!("Unknown argument: {other}\n{USAGE}")),
            }
        }
        Ok(options)
    }

    /// An explicit `--config` must load; the default file is optional.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        if let Some(assets) = &self.assets {
            config.assets.root = assets.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn no_arguments_use_defaults() {
        assert_eq!(parse(&[]).unwrap(), CliOptions::default());
    }

    #[test]
    fn flags_are_collected() {
        let options = parse(&["--assets", "/data", "--print-config", "--config", "a.ron"]).unwrap();
        assert_eq!(options.assets, Some(PathBuf::from("/data")));
        assert_eq!(options.config, Some(PathBuf::from("a.ron")));
        assert!(options.print_config);
    }

    #[test]
    fn missing_values_and_unknown_flags_fail() {
        assert!(parse(&["--config"]).is_err());
        let err = parse(&["--fullscreen"]).unwrap_err();
        assert!(err.to_string().contains("Unknown argument: --fullscreen"));
    }

    #[test]
    fn assets_flag_overrides_config() {
        let options = CliOptions {
            assets: Some(PathBuf::from("elsewhere")),
            ..CliOptions::default()
        };
        let config = options.resolve_config().unwrap();
        assert_eq!(config.assets.root, PathBuf::from("elsewhere"));
    }
}
