//! Git repository synchronization

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::exec::command::CommandSpec;
use crate::exec::runner::CommandRunner;
use crate::filesys::dir::Dir;
use crate::models::descriptor::{BuildDescriptor, ContainerizationMode};
use crate::models::outcome::StageOutcome;
use crate::models::repository::RepositorySpec;
use crate::pipeline::fsm::Stage;

/// State of the working copy after a sync
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub working_copy: PathBuf,
    pub descriptor: BuildDescriptor,
    /// True when an existing checkout was updated, false for a fresh clone
    pub updated: bool,
}

impl SyncResult {
    /// Stage outcome; a missing build descriptor degrades to a warning
    pub fn outcome(&self) -> StageOutcome {
        let action = if self.updated { "Updated" } else { "Cloned" };
        match (self.descriptor.mode(), self.descriptor.file_name()) {
            (ContainerizationMode::None, _) => StageOutcome::warning(
                Stage::RepositorySync,
                format!(
                    "{} {}; no Dockerfile or compose file found, nothing can be deployed",
                    action,
                    self.working_copy.display()
                ),
            ),
            (mode, file) => StageOutcome::succeeded(
                Stage::RepositorySync,
                format!(
                    "{} {} ({} via {})",
                    action,
                    self.working_copy.display(),
                    mode,
                    file.unwrap_or_default()
                ),
            ),
        }
    }
}

/// Git invocation that never prompts and, when a token is in play, never
/// hands credentials to a credential helper
fn git(repo: &RepositorySpec, dir: Option<&Path>) -> CommandSpec {
    let mut cmd = CommandSpec::new("git").env("GIT_TERMINAL_PROMPT", "0");
    if repo.has_token() {
        cmd = cmd.args(["-c", "credential.helper="]);
    }
    if let Some(dir) = dir {
        cmd = cmd.arg("-C").arg(dir.display().to_string());
    }
    if let Some(mask) = repo.token_mask() {
        cmd = cmd.mask(mask);
    }
    cmd
}

/// Append the remote to fetch from: the token-bearing URL as a secret
/// argument, or the bare URL as a plain one
fn with_remote(cmd: CommandSpec, repo: &RepositorySpec) -> Result<CommandSpec, DeployError> {
    Ok(match repo.authenticated_url()? {
        Some(url) => cmd.secret_arg(url),
        None => cmd.arg(repo.url()),
    })
}

async fn run_git(
    runner: &dyn CommandRunner,
    cmd: CommandSpec,
    what: &str,
) -> Result<(), DeployError> {
    let output = runner.run(&cmd).await;
    if output.success() {
        Ok(())
    } else {
        Err(DeployError::RepositorySync(format!(
            "{} failed: {}",
            what,
            output.last_line()
        )))
    }
}

/// Sync a git repository (clone or update) into `<work_dir>/<app_id>` and
/// detect how it is containerized.
///
/// The access token, if any, only ever appears in command arguments; the
/// stored `origin` URL is always the bare one.
pub async fn sync_repository(
    runner: &dyn CommandRunner,
    repo: &RepositorySpec,
    work_dir: &Path,
) -> Result<SyncResult, DeployError> {
    let base = Dir::new(work_dir);
    base.create().await.map_err(|e| {
        DeployError::RepositorySync(format!(
            "Cannot create work directory {}: {}",
            work_dir.display(),
            e
        ))
    })?;

    let checkout = base.subdir(repo.app_id().as_str());
    let path = checkout.path().to_path_buf();
    info!(
        "Syncing Git repository: {} (branch: {}) to {}",
        repo.url(),
        repo.branch(),
        path.display()
    );

    let updated = if checkout.is_git_checkout().await {
        update_checkout(runner, repo, &path).await?;
        true
    } else if checkout.is_empty().await? {
        clone_fresh(runner, repo, &path).await?;
        false
    } else {
        return Err(DeployError::RepositorySync(format!(
            "{} exists but is not a git checkout; remove it and re-run",
            path.display()
        )));
    };

    let descriptor = BuildDescriptor::detect(&checkout).await.map_err(|e| {
        DeployError::RepositorySync(format!("Cannot inspect {}: {}", path.display(), e))
    })?;
    match descriptor.file_name() {
        Some(file) => info!("Detected {} deployment ({})", descriptor.mode(), file),
        None => warn!(
            "No Dockerfile or compose file in {}; deployment will be skipped",
            path.display()
        ),
    }

    info!("Successfully synced Git repository");
    Ok(SyncResult {
        working_copy: path,
        descriptor,
        updated,
    })
}

async fn clone_fresh(
    runner: &dyn CommandRunner,
    repo: &RepositorySpec,
    path: &Path,
) -> Result<(), DeployError> {
    debug!("Cloning repository to {}...", path.display());
    let clone = with_remote(
        git(repo, None).args(["clone", "--branch", repo.branch(), "--single-branch"]),
        repo,
    )?
    .arg(path.display().to_string());
    run_git(runner, clone, "git clone").await?;

    let reset_url = git(repo, Some(path)).args(["remote", "set-url", "origin", repo.url()]);
    run_git(runner, reset_url, "git remote set-url").await
}

async fn update_checkout(
    runner: &dyn CommandRunner,
    repo: &RepositorySpec,
    path: &Path,
) -> Result<(), DeployError> {
    debug!("Working copy exists, fetching updates...");
    let branch = repo.branch();
    let tracking = format!("origin/{}", branch);
    let refspec = format!("+refs/heads/{}:refs/remotes/origin/{}", branch, branch);

    let reset_url = git(repo, Some(path)).args(["remote", "set-url", "origin", repo.url()]);
    run_git(runner, reset_url, "git remote set-url").await?;

    let fetch = with_remote(git(repo, Some(path)).arg("fetch"), repo)?.arg(refspec);
    run_git(runner, fetch, "git fetch").await?;

    let checkout = git(repo, Some(path)).args(["checkout", branch]);
    if runner.run(&checkout).await.success() {
        debug!("Switched to existing branch {}", branch);
    } else {
        let create = git(repo, Some(path)).args([
            "checkout",
            "-b",
            branch,
            "--track",
            tracking.as_str(),
        ]);
        run_git(runner, create, "git checkout").await?;
    }

    let merge = git(repo, Some(path)).args(["merge", "--ff-only", tracking.as_str()]);
    run_git(runner, merge, "git merge --ff-only").await
}
