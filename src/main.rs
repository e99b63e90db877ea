use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{ArgGroup, Parser, Subcommand};

use gvm::commands::setup::ConfigAction;
use gvm::commands::uninstall::{BatchOptions, BatchSelector};
use gvm::commands::{self, Context};
use gvm::error::{GvmError, Severity};
use gvm::toolchain::installer::InstallOptions;
use gvm::toolchain::paths::GvmPaths;
use gvm::version::{Version, VersionSpecifier};

#[derive(Parser)]
#[command(name = "gvm")]
#[command(version, about = "Go Version Manager: install and switch between Go toolchains")]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install a Go version (`1.21.3`, `1.21`, `>=1.20`, `latest`, `stable`, `system`)
    Install {
        spec: String,
        /// Reinstall even if already installed
        #[arg(long)]
        force: bool,
    },
    /// Activate a version, installing it first if needed; without a version
    /// the project pin (.go-version or go.mod) is used
    Use { spec: Option<String> },
    /// List installed versions
    List {
        /// List versions available for download instead
        #[arg(long)]
        remote: bool,
        #[arg(long, default_value_t = commands::query::REMOTE_LIST_LIMIT)]
        limit: usize,
    },
    /// Search available versions (`1.21` lists every 1.21 patch)
    Search { query: String },
    /// Show the active version
    Current,
    /// Remove the active version pointer
    Deactivate,
    /// Uninstall one version or a batch of versions
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["version", "below", "pattern", "keep", "all"])
    ))]
    Uninstall {
        version: Option<String>,
        /// Versions strictly lower than this one
        #[arg(long)]
        below: Option<String>,
        /// Versions matching a pattern such as `1.21.*`
        #[arg(long)]
        pattern: Option<String>,
        /// Keep only the newest N versions
        #[arg(long)]
        keep: Option<usize>,
        /// Every installed version
        #[arg(long)]
        all: bool,
        /// Never remove the active version in a batch
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        keep_current: bool,
    },
    /// Install the newest patch of a minor line
    Upgrade {
        line: String,
        /// Activate the upgraded version
        #[arg(long = "use")]
        activate: bool,
    },
    /// Register a Go SDK installed elsewhere (GOROOT or go binary)
    Link { path: PathBuf },
    /// Write a .go-version file in the current directory
    Pin { spec: String },
    /// Write the env script and hook it into the shell rc file
    Init,
    /// Show or change download sources
    Config {
        /// Archive download base URL
        #[arg(long)]
        source: Option<String>,
        /// JSON release index URL
        #[arg(long)]
        json_source: Option<String>,
        /// Print the configuration (the default)
        #[arg(long, conflicts_with_all = ["source", "json_source", "reset"])]
        show: bool,
        /// Restore defaults
        #[arg(long, conflicts_with_all = ["source", "json_source"])]
        reset: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = GvmPaths::from_env();
    let _log_guard = gvm::logging::init(&paths.log_file(), cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, paths)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run(command: Command, paths: GvmPaths) -> anyhow::Result<()> {
    match command {
        Command::Install { spec, force } => {
            let specifier = VersionSpecifier::parse(&spec)?;
            let mut ctx = Context::load(paths)?;
            let toolchain =
                commands::install::install(&mut ctx, &specifier, InstallOptions { force })
                    .await
                    .with_context(|| format!("install {}", spec))?;
            println!(
                "Installed go{} in {}",
                toolchain.version,
                toolchain.location.display()
            );
        }
        Command::Use { spec } => {
            let specifier = match &spec {
                Some(spec) => VersionSpecifier::parse(spec)?,
                None => VersionSpecifier::Pinned(std::env::current_dir()?),
            };
            let mut ctx = Context::load(paths)?;
            let outcome = commands::install::use_version(&mut ctx, &specifier)
                .await
                .with_context(|| format!("use {}", specifier))?;
            if outcome.installed_now {
                println!("Installed go{}", outcome.toolchain.version);
            }
            println!("Now using go{}", outcome.toolchain.version);
        }
        Command::List { remote: false, .. } => {
            let ctx = Context::load(paths)?;
            let listed = commands::query::list_installed(&ctx);
            if listed.is_empty() {
                println!("No Go versions installed");
            }
            for entry in listed {
                println!(
                    "{} {:<14} {:<10} {}",
                    if entry.active { "*" } else { " " },
                    entry.toolchain.version,
                    format!("{:?}", entry.toolchain.origin).to_lowercase(),
                    entry.toolchain.location.display()
                );
            }
        }
        Command::List {
            remote: true,
            limit,
        } => {
            let ctx = Context::load(paths)?;
            print_remote(&commands::query::list_remote(&ctx, limit).await?);
        }
        Command::Search { query } => {
            let ctx = Context::load(paths)?;
            print_remote(&commands::query::search(&ctx, &query).await?);
        }
        Command::Current => {
            let ctx = Context::load(paths)?;
            let toolchain = commands::query::current(&ctx)?;
            println!(
                "go{} ({})",
                toolchain.version,
                toolchain.location.display()
            );
        }
        Command::Deactivate => {
            let mut ctx = Context::load(paths)?;
            match commands::setup::deactivate(&mut ctx)? {
                Some(version) => println!("Deactivated go{}", version),
                None => println!("No active version"),
            }
        }
        Command::Uninstall {
            version,
            below,
            pattern,
            keep,
            all: _,
            keep_current,
        } => {
            let mut ctx = Context::load(paths)?;
            let selector = match (version, below, pattern, keep) {
                (Some(version), ..) => {
                    let version = Version::parse(&version)?;
                    let uninstalled = commands::uninstall::uninstall(&mut ctx, &version)
                        .with_context(|| format!("uninstall {}", version))?;
                    println!("Uninstalled go{}", uninstalled.toolchain.version);
                    if let Some(warning) = uninstalled.warning {
                        print_warning(&warning);
                    }
                    return Ok(());
                }
                (_, Some(below), ..) => BatchSelector::Below(Version::parse(&below)?),
                (_, _, Some(pattern), _) => {
                    BatchSelector::Pattern(VersionSpecifier::parse(&pattern)?)
                }
                (_, _, _, Some(keep)) => BatchSelector::Keep(keep),
                // clap's target group leaves only --all
                (None, None, None, None) => BatchSelector::All,
            };

            let report = commands::uninstall::uninstall_batch(
                &mut ctx,
                &BatchOptions {
                    selector,
                    keep_current,
                },
            )?;
            for uninstalled in &report.removed {
                println!("Uninstalled go{}", uninstalled.toolchain.version);
                if let Some(warning) = &uninstalled.warning {
                    print_warning(warning);
                }
            }
            for (version, error) in &report.failed {
                eprintln!(
                    "error[{}]: go{} was not uninstalled: {}",
                    error.kind(),
                    version,
                    error
                );
            }
            println!(
                "{} uninstalled, {} failed",
                report.removed.len(),
                report.failed.len()
            );
        }
        Command::Upgrade { line, activate } => {
            let mut ctx = Context::load(paths)?;
            let outcome = commands::install::upgrade(&mut ctx, &line, activate)
                .await
                .with_context(|| format!("upgrade {}", line))?;
            match (&outcome.previous, outcome.upgraded) {
                (Some(previous), true) => {
                    println!("Upgraded go{} -> go{}", previous, outcome.latest)
                }
                (None, true) => println!("Installed go{}", outcome.latest),
                (_, false) => println!("go{} is already the newest patch", outcome.latest),
            }
            if let Some(version) = &outcome.activated {
                println!("Now using go{}", version);
            }
        }
        Command::Link { path } => {
            let mut ctx = Context::load(paths)?;
            let toolchain = commands::setup::link(&mut ctx, &path)?;
            println!(
                "Linked go{} at {}",
                toolchain.version,
                toolchain.location.display()
            );
        }
        Command::Pin { spec } => {
            let path = commands::setup::pin(&paths, &std::env::current_dir()?, &spec)?;
            println!("Wrote {}", path.display());
        }
        Command::Init => {
            let home = dirs::home_dir();
            let setup = commands::setup::init(&paths, home.as_deref())?;
            println!("Wrote {}", setup.env_file.display());
            match (&setup.rc_file, setup.hooked) {
                (Some(rc), true) => println!("Added gvm to {}; restart your shell", rc.display()),
                (Some(rc), false) => println!("{} already loads gvm", rc.display()),
                (None, _) => println!(
                    "No .zshrc or .bashrc found; add `. \"{}\"` to your shell profile",
                    setup.env_file.display()
                ),
            }
        }
        Command::Config {
            source,
            json_source,
            show: _,
            reset,
        } => {
            let action = if reset {
                ConfigAction::Reset
            } else if source.is_some() || json_source.is_some() {
                ConfigAction::Set {
                    source,
                    json_source,
                }
            } else {
                ConfigAction::Show
            };
            let config = commands::setup::config(&paths, action)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn print_remote(versions: &[commands::query::RemoteVersion]) {
    for entry in versions {
        let mut tags = Vec::new();
        if !entry.stable {
            tags.push("unstable");
        }
        if entry.installed {
            tags.push("installed");
        }
        if tags.is_empty() {
            println!("{}", entry.version);
        } else {
            println!("{:<14} ({})", entry.version, tags.join(", "));
        }
    }
}

fn print_warning(warning: &GvmError) {
    eprintln!("warning[{}]: {}", warning.kind(), warning);
}

fn report(error: &anyhow::Error) -> ExitCode {
    let Some(gvm_error) = error.downcast_ref::<GvmError>() else {
        eprintln!("error: {:#}", error);
        return ExitCode::FAILURE;
    };

    let label = match gvm_error.severity() {
        Severity::Warning => "warning",
        Severity::Error => "error",
        Severity::Fatal => "fatal",
    };
    eprintln!("{}[{}]: {:#}", label, gvm_error.kind(), error);
    if gvm_error.is_retryable() {
        eprintln!("  (this may succeed if retried)");
    }

    ExitCode::from(gvm_error.exit_code())
}
