use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use lexicon_pm_core::{Nsid, OutputTarget};
use lexicon_pm_registry::{
    CONFIG_FILE_NAME, DEFAULT_SCHEMA_DIR, FileDiff, HttpFetcher, InstallObserver, InstallOutcome, Installer,
    LexiconChange, LexiconsModuleGenerator, MANIFEST_FILE_NAME, Manifest, Registry, Resolution, ResolveEvent,
    ResolverConfig, Stage, infer_registry, load_project_manifest, parse_lexicon_arg,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lexpm")]
#[command(about = "Package manager for lexicon schemas", version)]
struct Cli {
    /// Project directory containing lexpm.json.
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,
    /// Apply changes without asking for confirmation.
    #[arg(short, long, global = true)]
    yes: bool,
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new lexpm.json in the project directory.
    Init(InitArgs),
    /// Add lexicons to the manifest and install.
    Add(AddArgs),
    /// Remove lexicons from the manifest and install.
    Remove(RemoveArgs),
    /// Fetch schemas, generate code and write both trees.
    Install,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Generate a client; optionally give its output directory.
    #[arg(long, num_args = 0..=1, value_name = "DIR")]
    client: Option<Option<String>>,
    /// Generate a server; optionally give its output directory.
    #[arg(long, num_args = 0..=1, value_name = "DIR")]
    server: Option<Option<String>>,
    /// Directory holding schema files.
    #[arg(long, default_value = DEFAULT_SCHEMA_DIR)]
    schema_dir: String,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Lexicons as `[registry:]nsid`, e.g. `app.bsky.feed.post` or `local:com.example.foo`.
    #[arg(required = true)]
    lexicons: Vec<String>,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Lexicon identifiers to remove.
    #[arg(required = true)]
    lexicons: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Init(args) => run_init(&cli.dir, args),
        Command::Add(args) => run_add(&cli.dir, args, cli.yes).await,
        Command::Remove(args) => run_remove(&cli.dir, args, cli.yes).await,
        Command::Install => run_install(&cli.dir, cli.yes).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_init(dir: &Path, args: InitArgs) -> Result<(), String> {
    let path = dir.join(MANIFEST_FILE_NAME);
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }

    let both = args.client.is_some() && args.server.is_some();
    let mut targets = BTreeMap::new();
    if let Some(client) = args.client.clone() {
        let default = if both { "./src/lexicon/client" } else { "./src/client" };
        targets.insert(OutputTarget::Client, client.unwrap_or_else(|| default.to_string()));
    }
    if let Some(server) = args.server {
        let default = if both { "./src/lexicon/server" } else { "./src/lexicon" };
        targets.insert(OutputTarget::Server, server.unwrap_or_else(|| default.to_string()));
    }
    if targets.is_empty() {
        targets.insert(OutputTarget::Client, "./src/client".to_string());
    }

    std::fs::create_dir_all(dir).map_err(|err| format!("Failed to create '{}': {err}", dir.display()))?;
    Manifest::new(targets, args.schema_dir)
        .save(&path)
        .map_err(|err| err.to_string())?;
    println!("Wrote to {}", path.display());
    Ok(())
}

async fn run_add(dir: &Path, args: AddArgs, yes: bool) -> Result<(), String> {
    let mut manifest = load_project_manifest(dir).map_err(|err| err.to_string())?;
    let config = load_config(dir)?;
    let fetcher = HttpFetcher::from_config(&config).map_err(|err| err.to_string())?;
    let schema_dir = manifest.schema_path(dir);

    println!("lexicons:");
    for arg in &args.lexicons {
        let (explicit, id) = parse_lexicon_arg(arg);
        let nsid = match Nsid::parse(id) {
            Ok(nsid) => nsid,
            Err(err) => {
                eprintln!("{id}: {err}");
                continue;
            }
        };
        let registry = match explicit {
            Some(descriptor) => descriptor.parse::<Registry>(),
            None => infer_registry(&nsid, fetcher.identity(), &schema_dir, &config.schema_extension).await,
        };
        let registry = match registry {
            Ok(registry) => registry,
            Err(err) => {
                eprintln!("{nsid}: {err}");
                continue;
            }
        };

        match manifest.set_lexicon(nsid.as_str(), registry.descriptor()) {
            LexiconChange::Added => println!(" + {nsid}: {registry}"),
            LexiconChange::Changed { previous } => {
                debug!(nsid = %nsid, previous = %previous, "Replacing registry");
                println!(" * {nsid}: {registry}");
            }
            LexiconChange::Unchanged => {}
        }
    }

    save_manifest(dir, &manifest)?;
    run_install(dir, yes).await
}

async fn run_remove(dir: &Path, args: RemoveArgs, yes: bool) -> Result<(), String> {
    let mut manifest = load_project_manifest(dir).map_err(|err| err.to_string())?;

    println!("lexicons:");
    for id in &args.lexicons {
        match manifest.remove_lexicon(id) {
            Some(registry) => println!(" - {id}: {registry}"),
            None => eprintln!("{id} is not in lexicons"),
        }
    }

    save_manifest(dir, &manifest)?;
    run_install(dir, yes).await
}

async fn run_install(dir: &Path, yes: bool) -> Result<(), String> {
    let manifest = load_project_manifest(dir).map_err(|err| err.to_string())?;
    let config = load_config(dir)?;
    let fetcher = HttpFetcher::from_config(&config).map_err(|err| err.to_string())?;
    let installer = Installer::new(dir, &manifest, &config, &fetcher, &LexiconsModuleGenerator);

    let mut observer = Console { yes };
    match installer.run(&mut observer).await.map_err(|err| err.to_string())? {
        InstallOutcome::Completed { digest } => {
            println!("Schema set {digest}");
            println!("Done!");
        }
        InstallOutcome::Aborted { .. } => println!("Aborted."),
    }
    Ok(())
}

fn load_config(dir: &Path) -> Result<ResolverConfig, String> {
    let path = dir.join(CONFIG_FILE_NAME);
    ResolverConfig::load_or_default(&path).map_err(|err| format!("Failed to load '{}': {err}", path.display()))
}

fn save_manifest(dir: &Path, manifest: &Manifest) -> Result<(), String> {
    let path = dir.join(MANIFEST_FILE_NAME);
    manifest.save(&path).map_err(|err| err.to_string())?;
    println!("Wrote to {}", path.display());
    Ok(())
}

/// Renders install progress on the terminal.
struct Console {
    yes: bool,
}

impl InstallObserver for Console {
    fn resolved(&mut self, resolution: &Resolution) {
        for event in &resolution.events {
            match event {
                ResolveEvent::InvalidIdentifier { id, error } => eprintln!("{id}: {error}; skipped"),
                ResolveEvent::InvalidRegistry { nsid, error } => eprintln!("{nsid}: {error}; skipped"),
                ResolveEvent::ResolvingRoot { nsid, registry } => println!("Resolving {nsid} from {registry}"),
                ResolveEvent::RootFailed { nsid, registry, error } => {
                    eprintln!("{nsid}: failed to load from {registry}: {error}")
                }
                ResolveEvent::ResolvingDependencies => println!("Resolving dependencies..."),
                ResolveEvent::AttemptFailed { .. } => {}
                ResolveEvent::Resolved { nsid, registry } => println!("  {nsid} ({registry})"),
                ResolveEvent::Unresolvable { nsid, failures } => {
                    eprintln!("{nsid} could not be loaded in any registry:");
                    for (registry, error) in failures {
                        let reason = error.to_string().replace('\n', "\n    ");
                        eprintln!("  {registry}: {reason}");
                    }
                }
            }
        }
    }

    fn confirm(&mut self, stage: Stage, changes: &[FileDiff]) -> bool {
        println!("Changes to {stage}:");
        for change in changes {
            println!("  {change}");
        }
        if self.yes {
            return true;
        }
        prompt_yes_no("Are you sure you want to continue? [y/N] ")
    }

    fn applied(&mut self, stage: Stage, _changes: &[FileDiff]) {
        match stage {
            Stage::Schemas => println!("All schemas wrote."),
            Stage::Output(target) => println!("{target} output wrote."),
        }
    }
}

fn prompt_yes_no(question: &str) -> bool {
    print!("{question}");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
