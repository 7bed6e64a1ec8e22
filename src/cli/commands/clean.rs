//! Clean Command
//!
//! Removes stored sessions and their uploaded datasets.

use std::fs;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::data::cleanup_file;
use crate::types::Result;

pub fn run() -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();

    for session in ctx.store.unfinished()? {
        if let Some(upload) = &session.upload {
            cleanup_file(&upload.path);
        }
    }
    let removed = ctx.store.delete_all()?;

    // Uploads left behind by interrupted runs
    let mut orphans = 0;
    let upload_dir = &ctx.config.workflow.upload_dir;
    if upload_dir.is_dir() {
        for entry in fs::read_dir(upload_dir)?.flatten() {
            if entry.path().is_file() {
                cleanup_file(&entry.path());
                orphans += 1;
            }
        }
    }

    if removed == 0 && orphans == 0 {
        output.info("Nothing to clean");
        return Ok(());
    }
    output.success(&format!("Removed {} sessions", removed));
    if orphans > 0 {
        output.success(&format!("Removed {} orphaned uploads", orphans));
    }
    Ok(())
}
