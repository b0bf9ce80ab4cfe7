//! `clean`: bulk removal of a task output directory's subdirectories

use crate::cli::context::CommandContext;
use crate::error::CrabError;
use crate::storage::{join_remote, RemoteStorage};
use anyhow::Result;
use std::io::{self, BufRead, Write};

pub async fn run_clean(ctx: &CommandContext, remote_dir: &str, yes: bool) -> Result<()> {
    let storage = RemoteStorage::new(ctx.subprocess.clone(), ctx.config.storage.clone());

    let entries = storage.list(remote_dir).await?;
    let targets = deletion_targets(&storage, remote_dir, entries).await?;
    if targets.is_empty() {
        println!("Nothing to delete under {}", remote_dir);
        return Ok(());
    }

    println!("The following directories will be permanently deleted:");
    for target in &targets {
        println!("  {}", target);
    }
    if !yes && !confirm_deletion(&mut io::stdin().lock())? {
        println!("Deletion cancelled");
        return Ok(());
    }

    let mut removed = 0;
    for target in &targets {
        ctx.interrupt.check()?;
        match storage.remove_dir(target).await {
            Ok(()) => {
                tracing::info!("Deleted {}", target);
                removed += 1;
            }
            Err(e) => tracing::error!("Could not delete {}: {}", target, e.developer_message()),
        }
    }
    println!("Deleted {}/{} directories", removed, targets.len());

    if removed < targets.len() {
        return Err(CrabError::io(
            format!("{} directories under {} could not be deleted", targets.len() - removed, remote_dir),
            None,
        )
        .into());
    }
    Ok(())
}

/// Entries of the listing that storage reports as directories
///
/// Files stay where they are whatever their name; a `stat` that cannot run
/// aborts before anything is listed for deletion.
async fn deletion_targets(
    storage: &RemoteStorage,
    remote_dir: &str,
    entries: Vec<String>,
) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    for entry in entries {
        let path = join_remote(remote_dir, &entry);
        if storage.is_dir(&path).await? {
            targets.push(path);
        } else {
            tracing::debug!("Keeping {}: not a directory", path);
        }
    }
    Ok(targets)
}

/// Only the literal answer `yes` confirms
fn confirm_deletion(input: &mut impl BufRead) -> Result<bool> {
    print!("Type 'yes' to confirm deletion: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::subprocess::SubprocessManager;

    fn entries(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_only_directories_are_targeted() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("eos")
            .with_args(|args| {
                args.get(1).map(String::as_str) == Some("stat")
                    && args.get(2).map(String::as_str) == Some("-d")
                    && args.last().is_some_and(|p| p.ends_with("/0000") || p.ends_with("/0001"))
            })
            .returns_success()
            .finish();
        mock.expect_command("eos")
            .with_args(|args| args.get(1).map(String::as_str) == Some("stat"))
            .returns_exit_code(1)
            .finish();
        let storage = RemoteStorage::new(manager, StorageConfig::default());

        let targets = deletion_targets(
            &storage,
            "/store/out/",
            entries(&["0000", "0001", "crab.log.tar.gz", "notes", "merged_A_hist.root"]),
        )
        .await
        .unwrap();

        assert_eq!(targets, vec!["/store/out/0000", "/store/out/0001"]);
        assert_eq!(mock.calls_with_subcommand("eos", "stat").len(), 5);
        assert!(mock.calls_with_subcommand("eos", "rm").is_empty());
    }

    #[tokio::test]
    async fn test_stat_failure_aborts() {
        let (manager, _mock) = SubprocessManager::mock();
        let storage = RemoteStorage::new(manager, StorageConfig::default());

        let result = deletion_targets(&storage, "/store/out", entries(&["0000"])).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_confirmation_needs_full_word() {
        assert!(confirm_deletion(&mut "yes\n".as_bytes()).unwrap());
        assert!(!confirm_deletion(&mut "y\n".as_bytes()).unwrap());
        assert!(!confirm_deletion(&mut "YES please\n".as_bytes()).unwrap());
        assert!(!confirm_deletion(&mut "".as_bytes()).unwrap());
    }
}
