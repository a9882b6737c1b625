#[macro_use]
extern crate log;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use git_backup::{Config, Driver, SyncFailure};
use log::LevelFilter;
use structopt::StructOpt;

fn main() {
    let args = Args::from_args();

    if args.generate_config {
        println!("{}", Config::template().as_json());
        return;
    }

    if let Err(e) = run(&args) {
        if let Some(sync_failure) = e.downcast_ref::<SyncFailure>() {
            let mut stderr = io::stderr();
            sync_failure.display(&mut stderr).unwrap();
        } else {
            eprintln!("Error: {}", e);

            for cause in e.iter_causes() {
                eprintln!("\tCaused By: {}", cause);
            }

            eprintln!("{}", e.backtrace());
        }

        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;
    let cfg = args.config()?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    let driver = Driver::with_config(cfg);

    driver.run()?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
struct Args {
    #[structopt(short = "t", long = "token", help = "A GitHub access token.")]
    token: Option<String>,
    #[structopt(
        short = "u",
        long = "user",
        requires = "password",
        help = "The GitHub user to authenticate as."
    )]
    user: Option<String>,
    #[structopt(
        short = "p",
        long = "password",
        requires = "user",
        help = "The password for the GitHub user."
    )]
    password: Option<String>,
    #[structopt(
        short = "o",
        long = "output",
        default_value = ".",
        parse(from_os_str),
        help = "The directory mirrors are placed in."
    )]
    output: PathBuf,
    #[structopt(
        short = "c",
        long = "config",
        help = "Take all settings from a JSON config file instead of the command line."
    )]
    config_file: Option<Option<String>>,
    #[structopt(
        long = "generate-config",
        help = "Print a template config file and immediately exit."
    )]
    generate_config: bool,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)."
    )]
    verbosity: u64,
    #[structopt(help = "The repositories to mirror.")]
    repositories: Vec<String>,
}

impl Args {
    pub fn config(&self) -> Result<Config, Error> {
        match self.config_file {
            Some(ref explicit) => {
                let raw = explicit
                    .as_ref()
                    .map(|s| s.as_str())
                    .unwrap_or(Config::DEFAULT_PATH);
                let path =
                    shellexpand::full(raw).context("Unable to expand the config path")?;

                Config::from_file(&*path)
                    .context("Couldn't load the config")
                    .map_err(Into::into)
            }
            None => {
                let mut cfg = Config::default();
                cfg.github_token = self.token.clone().unwrap_or_default();
                cfg.github_user = self.user.clone().unwrap_or_default();
                cfg.github_password = self.password.clone().unwrap_or_default();
                cfg.output_directory = self.output.clone();
                cfg.repositories = self.repositories.clone();

                Ok(cfg)
            }
        }
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };

    if let Some(lvl) = level {
        builder.filter(Some("git_backup"), lvl);
    }

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}
