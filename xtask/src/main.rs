use anyhow::Result as AnyResult;
use clap::{Parser, Subcommand, ValueEnum};

use duct::{cmd, Expression};

const AVR_TARGET: &str = "avr-unknown-gnu-atmega328";

/// Crates that are tested on the host.
const HOST_PACKAGES: &[&str] = &[
    "battery_module_fw",
    "device-descriptor",
    "max17263",
    "register-access",
    "twi",
];

#[derive(Debug, Subcommand)]
pub enum Subcommands {
    /// Runs tests.
    Test {
        /// Runs the tests with `log` output enabled.
        #[clap(long)]
        log: bool,
    },

    /// Checks the project for errors.
    Check {
        /// Which target to check for.
        target: Option<Target>,
    },

    /// Builds the documentation.
    Doc {
        /// Whether to open the documentation in a browser.
        #[clap(long)]
        open: bool,
    },

    /// Runs extra checks (fmt, clippy).
    ExtraCheck {
        /// Which target to check for.
        target: Option<Target>,
    },
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    #[default]
    Host,
    Avr,
}

impl Target {
    fn args(&self) -> &'static [&'static str] {
        match self {
            Target::Host => &[],
            Target::Avr => &[
                "--target",
                AVR_TARGET,
                "-Zbuild-std=core",
                "-p",
                "battery_module_fw",
            ],
        }
    }

    fn toolchain(&self) -> Option<&'static str> {
        match self {
            Target::Host => None,
            Target::Avr => Some("+nightly"),
        }
    }
}

#[derive(Debug, Parser)]
#[clap(about, version, propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub subcommand: Subcommands,
}

fn cargo(target: Target, args: &[&str]) -> Expression {
    let mut args_vec = Vec::new();
    args_vec.extend(target.toolchain());
    args_vec.extend_from_slice(args);
    args_vec.extend_from_slice(target.args());

    println!("🛠️  Running command: cargo {}", args_vec.join(" "));

    cmd("cargo", args_vec)
}

fn checks(target: Target) -> AnyResult<()> {
    cargo(target, &["check"]).run()?;

    if target == Target::Host {
        cargo(target, &["check", "--features=log"]).run()?;
        cargo(target, &["check", "--features=defmt"]).run()?;
    }

    Ok(())
}

fn docs(open: bool) -> AnyResult<()> {
    let mut args = vec!["doc", "--no-deps"];

    if open {
        args.push("--open");
    }

    cargo(Target::Host, &args).run()?;

    Ok(())
}

fn extra_checks(target: Target) -> AnyResult<()> {
    cargo(Target::Host, &["fmt", "--check"]).run()?;
    cargo(target, &["clippy"]).run()?;

    Ok(())
}

fn test(log: bool) -> AnyResult<()> {
    let mut args = vec!["test"];

    for p in HOST_PACKAGES {
        args.push("-p");
        args.push(p);
    }

    if log {
        args.push("--features=battery_module_fw/log");
    }

    cargo(Target::Host, &args).run()?;

    Ok(())
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();

    match cli.subcommand {
        Subcommands::Test { log } => test(log),
        Subcommands::Check { target } => checks(target.unwrap_or_default()),
        Subcommands::Doc { open } => docs(open),
        Subcommands::ExtraCheck { target } => extra_checks(target.unwrap_or_default()),
    }
}
