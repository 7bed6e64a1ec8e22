use console::style;

use crate::types::{Notice, NoticeLevel};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn hint(&self, message: &str) {
        println!("  {}", style(message).dim());
    }

    pub fn notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Success => self.success(&notice.message),
            NoticeLevel::Info => self.info(&notice.message),
            NoticeLevel::Warning => self.warning(&notice.message),
            NoticeLevel::Danger => self.error(&notice.message),
        }
    }

    pub fn notices(&self, notices: &[Notice]) {
        for notice in notices {
            self.notice(notice);
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
