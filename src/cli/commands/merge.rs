//! `merge`: consolidate one task output directory

use crate::cli::context::CommandContext;
use crate::consolidate::{ConsolidateOptions, ConsolidationReport, OutputKind};
use crate::error::CrabError;
use anyhow::Result;

pub async fn run_merge(
    ctx: &CommandContext,
    output_root: &str,
    kind: OutputKind,
    group: bool,
    copy_back: bool,
    cleanup: bool,
) -> Result<()> {
    let options = ConsolidateOptions {
        kind,
        group_by_selection: group,
        copy_back,
        cleanup,
    };
    let report = ctx.consolidator().consolidate(output_root, options).await?;
    print_report(&report);

    let skipped = report.skipped().count();
    ctx.notify(
        "Crab merge",
        &format!(
            "{} of {} groups under {} merged",
            report.groups.len() - skipped,
            report.groups.len(),
            report.root
        ),
    )
    .await;

    if ctx.interrupt.is_set() {
        return Err(CrabError::interrupted().into());
    }
    if skipped > 0 {
        anyhow::bail!("{} of {} groups were skipped", skipped, report.groups.len());
    }
    Ok(())
}

fn print_report(report: &ConsolidationReport) {
    if report.groups.is_empty() {
        println!("Nothing to merge under {}", report.root);
        return;
    }
    for group in &report.groups {
        match &group.skipped {
            Some(reason) => println!("  {:<30} {} files  SKIPPED: {}", group.label, group.files, reason),
            None => {
                println!(
                    "  {:<30} {} files -> {}",
                    group.label,
                    group.files,
                    group.output.display()
                );
                if let Some(destination) = &group.copied_to {
                    println!("  {:<30} copied to {}", "", destination);
                }
                if group.deleted > 0 {
                    println!("  {:<30} {} source files deleted", "", group.deleted);
                }
            }
        }
    }
}
