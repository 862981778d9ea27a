use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "stevedore", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Node configuration: store, run and cache roots plus retry settings.
    #[arg(long, short, global = true, default_value = "stevedore.toml")]
    pub config:  PathBuf,
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd:     Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "a", name = "app", about = "Download an application and its service packages")]
    App(AppArg),
    #[command(alias = "up", name = "upgrade", about = "Download a platform code and config version")]
    Upgrade(UpgradeArg),
    #[command(alias = "m", name = "manifest", about = "Pre-deploy a service manifest into the image cache")]
    Manifest(ManifestArg),
    #[command(name = "layout", about = "Print the resolved node layout")]
    Layout,
}

#[derive(Args, Clone, Debug)]
pub struct AppArg {
    /// Application download spec (TOML).
    pub spec: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct UpgradeArg {
    #[arg(long)]
    pub code:   String,
    #[arg(id = "config_version", long = "config-version", alias = "cfg")]
    pub config: String,
}

#[derive(Args, Clone, Debug)]
pub struct ManifestArg {
    /// Service manifest request (TOML).
    pub spec: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() { App::command().debug_assert(); }

    #[test]
    fn test_parse_upgrade() {
        let app = App::try_parse_from([
            "stevedore",
            "--config",
            "node.toml",
            "upgrade",
            "--code",
            "7.1",
            "--config-version",
            "3",
        ])
        .unwrap();
        assert_eq!(app.config, PathBuf::from("node.toml"));
        match app.cmd {
            Commands::Upgrade(arg) => {
                assert_eq!(arg.code, "7.1");
                assert_eq!(arg.config, "3");
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let app = App::try_parse_from(["stevedore", "app", "calc.toml", "-v"]).unwrap();
        assert!(app.verbose);
        assert_eq!(app.config, PathBuf::from("stevedore.toml"));
    }
}
