use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use dex_actions::ActionKind;
use dex_app_core::{AppSettings, FilePersistence};
use dex_cli::commands::{self, SetRequest};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about = "Inspect and edit schema models from the command line")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory holding settings.json (defaults to the platform config dir)
    #[arg(long, global = true, env = "DEX_CONFIG_DIR")]
    config_dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the members of a model
    Members { model: Utf8PathBuf },
    /// Validate every member of a model
    Validate { model: Utf8PathBuf },
    /// Report type references that name no member of the model
    Resolve { model: Utf8PathBuf },
    /// Apply one field edit
    Set {
        model: Utf8PathBuf,
        #[arg(long)]
        member: String,
        #[arg(long, help = "Edit to apply, e.g. set-min-length (see `dex kinds`)")]
        action: ActionKind,
        #[arg(long, allow_hyphen_values = true)]
        value: String,
        #[arg(long, help = "Undo the edit after applying it")]
        undo: bool,
        #[arg(long, help = "Write the model back to its file")]
        save: bool,
    },
    /// List the available edits
    Kinds,
}

fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn load_settings(config_dir: Option<Utf8PathBuf>) -> anyhow::Result<AppSettings> {
    let persistence = match config_dir {
        Some(dir) => FilePersistence::in_dir(dir.into_std_path_buf()),
        None => FilePersistence::new(),
    };
    persistence.load_settings()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Kinds => commands::cmd_kinds(&mut out)?,
        Commands::Members { model } => {
            let settings = load_settings(cli.config_dir)?;
            commands::cmd_members(&model, &settings, &mut out)?;
        }
        Commands::Validate { model } => {
            let settings = load_settings(cli.config_dir)?;
            let errors = commands::cmd_validate(&model, &settings, &mut out)?;
            if errors > 0 {
                anyhow::bail!("{model} has {errors} validation error(s)");
            }
        }
        Commands::Resolve { model } => {
            let settings = load_settings(cli.config_dir)?;
            let unresolved = commands::cmd_resolve(&model, &settings, &mut out)?;
            if unresolved > 0 {
                anyhow::bail!("{model} has {unresolved} unresolved type reference(s)");
            }
        }
        Commands::Set {
            model,
            member,
            action,
            value,
            undo,
            save,
        } => {
            let settings = load_settings(cli.config_dir)?;
            let request = SetRequest {
                member: &member,
                action,
                value: &value,
                undo,
                save,
            };
            commands::cmd_set(&model, &settings, request, &mut out)?;
        }
    }

    Ok(())
}
