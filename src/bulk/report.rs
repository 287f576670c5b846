//! The `report.txt` inside every zip archive.

/// File name of the report inside the archive.
pub const REPORT_FILENAME: &str = "report.txt";

const REPORT_HEADER: &str = "The following files were requested:";

/// One line per requested URL, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipReport {
    lines: Vec<String>,
}

impl ZipReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn included(&mut self, filename: &str) {
        self.lines.push(format!("{}: included", filename));
    }

    pub fn excluded(&mut self, filename: &str, reason: &str) {
        self.lines.push(format!(
            "{}: Not included in this zip because {}",
            filename, reason
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut text = String::from(REPORT_HEADER);
        text.push('\n');
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}
