// CLI module
// Argument parsing and dispatch for the `prism` binary

mod status_view;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{find_config_path, load_config, LoadedConfig};
use crate::init::init_knowledge_base;
use crate::kb::get_status;
use crate::perspective::{expand_key_line, fill_perspective, new_perspective, FillOutcome, FillStage};
use crate::pipeline::{run_pipeline, ConsoleReporter, PipelineOptions};
use crate::providers::{HttpCaller, HttpCallerConfig};

pub use status_view::render_status;

#[derive(Debug, Parser)]
#[command(name = "prism")]
#[command(
    author,
    version,
    about = "Knowledge prism: distil journals into atoms, groups and synthesis"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scaffold a knowledge base in a directory
    Init {
        /// Target directory (created if missing)
        dir: PathBuf,
        /// Display name of the knowledge base
        #[arg(long)]
        name: Option<String>,
    },

    /// Run the incremental pipeline (atoms -> groups -> synthesis)
    Process {
        /// Build prompts without calling the model or writing files
        #[arg(long)]
        dry_run: bool,
        /// Let the groups and synthesis stages write their output
        #[arg(long)]
        auto_write: bool,
        /// Last stage to run
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=3))]
        stage: u8,
        /// Only extract atoms from this journal file name
        #[arg(long)]
        file: Option<String>,
        /// Print prompt previews
        #[arg(long)]
        verbose: bool,
    },

    /// Show counts and outstanding journals
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a perspective from the structure template
    NewPerspective {
        /// Short name, used in the directory name `P{NN}-{slug}`
        slug: String,
        /// Display name for the structure index
        #[arg(long)]
        name: Option<String>,
        /// Knowledge base root (default: located from the current directory)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Generate the SCQA or Key Line table of a perspective
    FillPerspective {
        /// Perspective directory name, e.g. P01-blog-post
        dir: String,
        #[arg(long)]
        stage: FillStage,
        /// Print the generated content instead of writing it
        #[arg(long)]
        no_write: bool,
    },

    /// Expand one Key Line into its own file
    ExpandKl {
        /// Perspective directory name, e.g. P01-blog-post
        dir: String,
        /// Key Line id, e.g. KL01
        kl_id: String,
        #[arg(long)]
        no_write: bool,
    },
}

impl Cli {
    pub fn verbose(&self) -> bool {
        matches!(self.command, Commands::Process { verbose: true, .. })
    }
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init { dir, name } => {
            let report = init_knowledge_base(&dir, name.as_deref(), today)?;
            println!("Initialised knowledge base \"{}\" at {}", report.name, report.base_dir.display());
            for file in &report.files {
                println!("  + {file}");
            }
            println!("\nNext: add journals under journal/YYYY-MM-DD/ and run `prism process`.");
        }

        Commands::Process {
            dry_run,
            auto_write,
            stage,
            file,
            verbose,
        } => {
            let loaded = load_config(&cwd)?;
            let caller = http_caller(&loaded)?;
            let mut options = PipelineOptions::new(&loaded.base_dir, loaded.config);
            options.dry_run = dry_run;
            options.auto_write = auto_write;
            options.max_stage = stage;
            options.only_file = file;
            options.verbose = verbose;

            let summary = run_pipeline(&options, &caller, &ConsoleReporter).await?;
            println!(
                "\nDone: {} atoms, {} groups written, {} groups updated, synthesis {}, {} warnings",
                summary.atoms_processed,
                summary.groups_written,
                summary.groups_updated,
                if summary.synthesis_updated { "updated" } else { "unchanged" },
                summary.warnings
            );
        }

        Commands::Status { json } => {
            let loaded = load_config(&cwd)?;
            let status = get_status(&loaded.base_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", render_status(&loaded.config.name, &loaded.base_dir, &status));
            }
        }

        Commands::NewPerspective { slug, name, base_dir } => {
            let base_dir = match base_dir {
                Some(dir) => dir,
                None => locate_base_dir(&cwd),
            };
            let created = new_perspective(&base_dir, &slug, name.as_deref(), today)?;
            println!("Created {}", created.path.display());
            for file in &created.files {
                println!("  + {file}");
            }
            if !created.index_updated {
                println!("  (no pyramid/structure/INDEX.md to update)");
            }
        }

        Commands::FillPerspective { dir, stage, no_write } => {
            let loaded = load_config(&cwd)?;
            let caller = http_caller(&loaded)?;
            let perspective = perspective_name(&dir);
            let outcome = fill_perspective(&loaded.base_dir, &perspective, stage, !no_write, &caller).await?;
            print_outcome(&outcome);
        }

        Commands::ExpandKl { dir, kl_id, no_write } => {
            let loaded = load_config(&cwd)?;
            let caller = http_caller(&loaded)?;
            let perspective = perspective_name(&dir);
            let outcome = expand_key_line(&loaded.base_dir, &perspective, &kl_id, !no_write, &caller).await?;
            print_outcome(&outcome);
        }
    }
    Ok(())
}

fn http_caller(loaded: &LoadedConfig) -> Result<HttpCaller> {
    HttpCaller::new(HttpCallerConfig::from_config(&loaded.config))
}

fn locate_base_dir(cwd: &Path) -> PathBuf {
    find_config_path(cwd)
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| cwd.to_path_buf())
}

/// Accept `P01-x`, `P01-x/` or `pyramid/structure/P01-x`.
fn perspective_name(arg: &str) -> String {
    Path::new(arg.trim_end_matches('/'))
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg.to_string())
}

fn print_outcome(outcome: &FillOutcome) {
    if outcome.written {
        println!("Wrote {}", outcome.path.display());
    } else {
        println!("--- {} (not written) ---\n{}", outcome.path.display(), outcome.content);
    }
}
