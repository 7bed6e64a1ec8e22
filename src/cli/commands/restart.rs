//! Restart Command
//!
//! Drops the session and its uploaded dataset.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub fn run(session: Option<&str>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let report = ctx.workflow().restart(session)?;
    Output::new().notices(&report.notices);
    Ok(())
}
