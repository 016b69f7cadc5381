//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Input path does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The specified input path does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Verify you have read permissions for this path".to_string(),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Input file cannot be opened
    pub fn cannot_read_file(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot read file: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check file permissions: ls -la {}", path.display()),
                "TRY: Inputs must be XML, optionally gzip-compressed (.xml.gz)".to_string(),
            ])
    }

    /// No inputs matched under a directory
    pub fn no_inputs(path: &Path, extensions: &[String]) -> Self {
        Self::new(format!("No input files found under {}", path.display()))
            .with_context(format!("Looking for files ending in: {}", extensions.join(", ")))
            .with_suggestions([
                format!("TRY: List the directory: ls {}", path.display()),
                "TRY: Set `extensions` in ~/.citeflow/config.toml".to_string(),
            ])
    }

    /// Database file missing for a read-only command
    pub fn database_not_found(path: &Path) -> Self {
        Self::new(format!("Database not found: {}", path.display()))
            .with_context("Nothing has been ingested into this database yet")
            .with_suggestions([
                "TRY: Ingest some files first: citeflow ingest <path>".to_string(),
                "TRY: Point at another database with --db or CITEFLOW_DB".to_string(),
            ])
    }

    /// Schema file is missing or invalid
    pub fn invalid_schema(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid record schema: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Start from the built-in schema: citeflow schema > my_schema.toml".to_string(),
                "TRY: Paths use tag steps like MedlineCitation/PMID with an optional [@Attr='value']"
                    .to_string(),
            ])
    }

    /// Config file is missing or invalid
    pub fn invalid_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid config: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestion("TRY: Print a valid starting point: citeflow config > ~/.citeflow/config.toml")
    }

    /// No stored record for an identifier
    pub fn record_not_found(identifier: &str) -> Self {
        Self::new(format!("No record stored for identifier '{}'", identifier))
            .with_suggestions([
                "TRY: Check which files were ingested: citeflow ledger".to_string(),
                "TRY: Inspect a source file directly: citeflow parse <file> | grep <identifier>"
                    .to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_path_not_found() {
        let path = PathBuf::from("/nonexistent/baseline");
        let display = format!("{}", HelpfulError::path_not_found(&path));
        assert!(display.contains("/nonexistent/baseline"));
        assert!(display.contains("TRY:"));
    }

    #[test]
    fn test_no_inputs_lists_extensions() {
        let err = HelpfulError::no_inputs(Path::new("/data"), &["xml".to_string(), "gz".to_string()]);
        assert_eq!(err.context.as_deref(), Some("Looking for files ending in: xml, gz"));
    }

    #[test]
    fn test_record_not_found_has_no_context() {
        let err = HelpfulError::record_not_found("12345");
        assert!(err.message.contains("12345"));
        assert!(err.context.is_none());
        assert_eq!(err.suggestions.len(), 2);
    }
}
