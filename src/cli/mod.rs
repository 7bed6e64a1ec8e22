pub mod commands;
pub mod render;
pub mod report;
pub mod ui;
pub mod util;

pub use util::{CommandContext, block_on};
