use clap::Parser;
use colored::Colorize;

use gitgraft::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Rewrite(args) => run_rewrite(args).await,
        Commands::Merge(args) => {
            let err = gitgraft::cli::merge_not_implemented(&args);
            eprintln!("{}", format!("fatal: {err}").red());
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run_rewrite(args: gitgraft::cli::RewriteArgs) -> i32 {
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format!("fatal: {e}").red());
            return e.exit_code();
        }
    };

    match gitgraft::coordinator::run(&config).await {
        Ok(report) => {
            println!(
                "rewrote {} commits, {} trees, {} blobs -- new head {}",
                report.commits_rewritten,
                report.trees_rewritten,
                report.blobs_transformed,
                report.head
            );
            if report.missing_parent_count > 0 {
                eprintln!(
                    "{}",
                    format!(
                        "warning: {} commit parent(s) predated the rewritten range",
                        report.missing_parent_count
                    )
                    .yellow()
                );
            }
            0
        }
        Err(e) => {
            eprintln!("{}", format!("fatal: {e}").red());
            e.exit_code()
        }
    }
}
