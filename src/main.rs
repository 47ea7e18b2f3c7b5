use anyhow::Result;
use clap::{Parser, Subcommand};
use locheal::config::HealConfig;
use locheal::record::Confidence;
use locheal::resolve::SourceResolver;
use locheal::store::FailureStore;
use locheal::{github, heal, patch};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "locheal",
    about = "Heal broken UI locators from captured test failures",
    version
)]
struct Args {
    /// Path to the project root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Path to the captured-failures store
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply captured locator fixes and print a summary
    Heal {
        /// Open a pull request for the applied fixes
        #[arg(long)]
        create_pr: bool,

        /// Base branch for the pull request
        #[arg(long, default_value = "main")]
        base: String,

        /// Head branch holding the fixes (defaults to a generated name)
        #[arg(long)]
        head: Option<String>,
    },
    /// Locate the declaration site of a locator string
    Resolve {
        /// The locator to search for
        locator: String,
    },
    /// Truncate the captured-failures store (start of a per-run session)
    Reset,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let root = args.root.canonicalize()?;

    let mut config = HealConfig::from_env();
    if let Some(store) = args.store {
        config.store_path = store;
    }
    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    let store = FailureStore::new(store_path);

    match args.command {
        Command::Heal {
            create_pr,
            base,
            head,
        } => {
            let engine = patch::PatchEngine::new(&root);
            let summary = heal::run(&store, &engine)?;
            print!("{}", summary.render());

            if create_pr {
                if summary.applied == 0 {
                    eprintln!("  Nothing applied; skipping pull request.");
                    return Ok(());
                }
                let (owner, repo) = github::get_remote_info(&root)?;
                let head = head.unwrap_or_else(github::branch_name);
                let url = github::create_pull_request(
                    &owner,
                    &repo,
                    &base,
                    &head,
                    &summary.pr_title(),
                    &summary.pr_body(),
                )?;
                println!("  Pull request created: {}", url);
            }
        }
        Command::Resolve { locator } => {
            let resolver = SourceResolver::new(&root, config.search_roots.clone());
            match resolver.resolve_any(&locator) {
                Some(site) => {
                    let confidence = match site.confidence {
                        Confidence::Exact => "exact",
                        Confidence::Heuristic => "heuristic",
                    };
                    println!(
                        "{}:{} ({})\n  {}",
                        site.file_path.display(),
                        site.line_number,
                        confidence,
                        site.line_text.trim_end()
                    );
                }
                None => {
                    eprintln!("No declaration found for '{}'", locator);
                    std::process::exit(1);
                }
            }
        }
        Command::Reset => {
            store.reset()?;
            println!("Store reset: {}", store.path().display());
        }
    }

    Ok(())
}
