//! Conflict resolution strategies.

use std::io::{self, BufRead, Write};

use crate::error::Result;
use crate::sync::types::{ConflictRecord, ConflictStrategy, Resolution, SyncError};

/// Source of per-conflict decisions for the manual strategy.
pub trait ConflictPrompt {
    /// Decide one conflict.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be obtained.
    fn choose(&mut self, conflict: &ConflictRecord) -> Result<Resolution>;
}

/// Decide which side wins a conflict.
///
/// # Errors
///
/// Returns `SyncError::PromptUnavailable` for the manual strategy when no
/// prompt is supplied, or whatever the prompt returns.
pub fn resolve(
    strategy: ConflictStrategy,
    conflict: &ConflictRecord,
    prompt: Option<&mut (dyn ConflictPrompt + '_)>,
) -> Result<Resolution> {
    match strategy {
        ConflictStrategy::FileWins => Ok(Resolution::File),
        ConflictStrategy::DbWins => Ok(Resolution::Database),
        ConflictStrategy::NewerWins => Ok(if conflict.file_mtime > conflict.db_updated_at {
            Resolution::File
        } else {
            Resolution::Database
        }),
        ConflictStrategy::Manual => prompt.ok_or(SyncError::PromptUnavailable)?.choose(conflict),
    }
}

/// Line-oriented prompt: shows the conflict on `output` and reads
/// `f`/`d`/`s` answers from `input`. End of input skips.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on the terminal. Questions go to stderr so stdout stays
    /// clean for the report.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

fn parse_answer(answer: &str) -> Option<Resolution> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "f" | "file" => Some(Resolution::File),
        "d" | "db" | "database" => Some(Resolution::Database),
        "s" | "skip" => Some(Resolution::Skipped),
        _ => None,
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for LinePrompt<R, W> {
    fn choose(&mut self, conflict: &ConflictRecord) -> Result<Resolution> {
        writeln!(
            self.output,
            "\nConflict in {} {} ({})",
            conflict.kind, conflict.key, conflict.file_path
        )?;
        writeln!(self.output, "  Field:    {}", conflict.field)?;
        writeln!(
            self.output,
            "  Database: {:?}",
            conflict.db_value.as_deref().unwrap_or_default()
        )?;
        writeln!(self.output, "  File:     {:?}", conflict.file_value)?;

        loop {
            write!(self.output, "Keep [f]ile, [d]atabase or [s]kip? ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(Resolution::Skipped);
            }
            if let Some(resolution) = parse_answer(&line) {
                return Ok(resolution);
            }
            writeln!(self.output, "Please answer f, d or s.")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::EntityKind;
    use std::io::Cursor;

    fn conflict(file_mtime: i64, db_updated_at: i64) -> ConflictRecord {
        ConflictRecord {
            key: "T-E01-F01-001".to_string(),
            kind: EntityKind::Task,
            file_path: "docs/plan/t.md".to_string(),
            field: "title".to_string(),
            file_value: "From file".to_string(),
            db_value: Some("From db".to_string()),
            file_mtime,
            db_updated_at,
            resolution: None,
            strategy: ConflictStrategy::Manual,
        }
    }

    #[test]
    fn test_fixed_strategies() {
        let c = conflict(10, 20);
        assert_eq!(resolve(ConflictStrategy::FileWins, &c, None).unwrap(), Resolution::File);
        assert_eq!(resolve(ConflictStrategy::DbWins, &c, None).unwrap(), Resolution::Database);
    }

    #[test]
    fn test_newer_wins() {
        assert_eq!(
            resolve(ConflictStrategy::NewerWins, &conflict(30, 20), None).unwrap(),
            Resolution::File
        );
        assert_eq!(
            resolve(ConflictStrategy::NewerWins, &conflict(20, 20), None).unwrap(),
            Resolution::Database
        );
    }

    #[test]
    fn test_manual_without_prompt() {
        let err = resolve(ConflictStrategy::Manual, &conflict(1, 1), None).unwrap_err();
        assert!(matches!(err, Error::Sync(SyncError::PromptUnavailable)));
    }

    #[test]
    fn test_line_prompt_retries_then_accepts() {
        let mut output = Vec::new();
        let mut prompt = LinePrompt::new(Cursor::new("maybe\nDB\n"), &mut output);
        let resolution = resolve(ConflictStrategy::Manual, &conflict(1, 1), Some(&mut prompt)).unwrap();
        assert_eq!(resolution, Resolution::Database);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("T-E01-F01-001"));
        assert!(shown.contains("\"From db\""));
        assert!(shown.contains("Please answer"));
    }

    #[test]
    fn test_line_prompt_eof_skips() {
        let mut prompt = LinePrompt::new(Cursor::new(""), Vec::new());
        assert_eq!(prompt.choose(&conflict(1, 1)).unwrap(), Resolution::Skipped);
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer(" file \n"), Some(Resolution::File));
        assert_eq!(parse_answer("s"), Some(Resolution::Skipped));
        assert_eq!(parse_answer("database"), Some(Resolution::Database));
        assert_eq!(parse_answer("x"), None);
    }
}
