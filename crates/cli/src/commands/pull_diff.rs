use clap::Args;
use forkcompare_developer_platforms::RepositoryStore;
use tracing::{info, instrument};

use crate::commands::{build_service, print_json, resolve_actor, split_repository};
use crate::config::AppConfig;
use crate::errors::CliError;

/// Arguments for the pull-diff command
#[derive(Args, Debug)]
pub struct PullDiffArgs {
    /// Base repository as owner/name
    pub repository: String,

    /// Pull request number within the base repository
    pub index: u64,

    /// Login of the acting account
    #[arg(short, long)]
    pub actor: Option<String>,

    /// What to print
    #[arg(long, value_enum, default_value_t = PullDiffFormat::Json)]
    pub format: PullDiffFormat,
}

/// Output format of the pull-diff command
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullDiffFormat {
    /// The full response as JSON
    Json,
    /// Only the unified diff
    Diff,
    /// Only the mailbox formatted patch series
    Patch,
}

/// Execute the pull-diff command
#[instrument(skip(config))]
pub async fn execute(args: PullDiffArgs, config: &AppConfig) -> Result<(), CliError> {
    let (owner, name) = split_repository(&args.repository)?;
    let service = build_service(config)?;
    let actor = resolve_actor(&service, args.actor.as_deref(), config).await?;

    let base_repo = service
        .catalog()
        .get_repository_by_owner_and_name(owner, name)
        .await
        .map_err(forkcompare_core::errors::CompareError::from)?;

    let diff = service
        .pull_request_diff(&base_repo, args.index, actor.as_ref())
        .await?;

    info!(
        repository_owner = owner,
        repository = name,
        pull_request = args.index,
        commits = diff.commits_count,
        "Pull request diff complete",
    );

    match args.format {
        PullDiffFormat::Json => print_json(&diff),
        PullDiffFormat::Diff => {
            print!("{}", String::from_utf8_lossy(&diff.diff_raw));
            Ok(())
        }
        PullDiffFormat::Patch => {
            print!("{}", String::from_utf8_lossy(&diff.patch_raw));
            Ok(())
        }
    }
}
