use clap::Args;
use forkcompare_core::config::PageRequest;
use tracing::{info, instrument};

use crate::commands::{build_service, print_json, resolve_actor, split_repository};
use crate::config::AppConfig;
use crate::errors::CliError;

/// Arguments for the compare command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Base repository as owner/name
    pub repository: String,

    /// Compare path, for example `main...bob:feature` or `v1.0...alice/proj:dev`
    pub path: String,

    /// Login of the acting account; anonymous when neither this nor a default is set
    #[arg(short, long)]
    pub actor: Option<String>,

    /// Commit page to return, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: i64,

    /// Commits per page; out of range values fall back to the configured maximum
    #[arg(long, default_value_t = 0)]
    pub limit: i64,

    /// Print only the raw diff text instead of the JSON response
    #[arg(long)]
    pub raw: bool,
}

/// Execute the compare command
#[instrument(skip(config))]
pub async fn execute(args: CompareArgs, config: &AppConfig) -> Result<(), CliError> {
    let (owner, name) = split_repository(&args.repository)?;
    let service = build_service(config)?;
    let actor = resolve_actor(&service, args.actor.as_deref(), config).await?;

    let response = service
        .compare(
            owner,
            name,
            &args.path,
            actor.as_ref(),
            PageRequest {
                page: args.page,
                page_size: args.limit,
            },
        )
        .await?;

    info!(
        repository_owner = owner,
        repository = name,
        commits = response.commit_count,
        no_relation = response.result.no_relation,
        nothing_to_compare = response.result.nothing_to_compare,
        "Comparison complete",
    );

    if args.raw {
        print!("{}", String::from_utf8_lossy(&response.result.diff_raw));
        return Ok(());
    }
    print_json(&response)
}
