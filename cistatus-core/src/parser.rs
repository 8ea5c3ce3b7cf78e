//! CI table parser
//!
//! A CI comment carries a Markdown pipe table whose header is a configured
//! title, for example:
//!
//! ```text
//! | job name | result | detail |
//! | --- | --- | --- |
//! | test     | success | link   |
//! ```
//!
//! The parser isolates the data rows, classifies the result column of each
//! row against the status registry and reduces the classified statuses to a
//! single label.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::config::{CiLabelConfig, StatusDescriptor};

const CELL_SEPARATOR: char = '|';
const ROW_SEPARATOR: char = '\n';

/// Index of the result cell after splitting a row on `|`
const RESULT_CELL: usize = 2;

/// Why a comment could not be read as a CI table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The title line is missing or appears more than once
    #[error("not a CI table: title found {occurrences} times")]
    NotCiTable { occurrences: usize },

    /// Nothing follows the title line
    #[error("invalid table: no rows after the title")]
    InvalidTable,

    /// No line after the title parses as a table row
    #[error("empty table")]
    EmptyTable,
}

/// Why a single row was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// Wrong column count, or the row does not start with `|`
    #[error("invalid job row")]
    InvalidRow,

    /// The result text matched no status descriptor
    #[error("unknown job description: {0:?}")]
    UnknownDescription(String),
}

/// Statuses classified from one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedTable {
    /// Status label per successfully classified row, in table order
    pub statuses: Vec<String>,
    /// Rows that failed to parse or classify
    pub dropped_rows: usize,
}

impl ClassifiedTable {
    /// Distinct labels across all classified rows
    pub fn status_set(&self) -> BTreeSet<String> {
        self.statuses.iter().cloned().collect()
    }
}

/// Parser bound to one table title and status registry
#[derive(Debug, Clone)]
pub struct CiParser {
    title: String,
    columns: usize,
    descriptors: Vec<StatusDescriptor>,
}

impl CiParser {
    /// Create a parser for a table title and an ordered registry
    pub fn new(title: impl Into<String>, descriptors: Vec<StatusDescriptor>) -> Self {
        let title = title.into();
        let columns = title.split(CELL_SEPARATOR).count();

        Self {
            title,
            columns,
            descriptors,
        }
    }

    /// Build a parser from repository CI settings
    pub fn from_config(config: &CiLabelConfig) -> Self {
        Self::new(config.title_of_ci_table.clone(), config.descriptors())
    }

    /// The table title this parser looks for
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of `|`-separated parts a valid row splits into
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The status registry in configuration order
    pub fn descriptors(&self) -> &[StatusDescriptor] {
        &self.descriptors
    }

    /// Whether the comment contains exactly one title line
    pub fn is_ci_comment(&self, comment: &str) -> bool {
        is_ci_comment(&self.title, comment)
    }

    /// Isolate the candidate data rows of the table
    ///
    /// The last line after the title that parses as a row ends the table, so
    /// trailing prose is tolerated. The separator line right after the title
    /// is skipped. Rows in between are returned as-is, valid or not.
    pub fn extract_rows<'a>(&self, comment: &'a str) -> Result<Vec<&'a str>, ExtractError> {
        let header = title_line(&self.title);
        let occurrences = comment.matches(header.as_str()).count();
        if occurrences != 1 {
            return Err(ExtractError::NotCiTable { occurrences });
        }

        let after = comment
            .split_once(header.as_str())
            .map(|(_, after)| after)
            .ok_or(ExtractError::NotCiTable { occurrences: 0 })?;

        let lines: Vec<&str> = after.split(ROW_SEPARATOR).collect();
        if lines.len() < 2 {
            return Err(ExtractError::InvalidTable);
        }

        (1..lines.len())
            .rev()
            .find(|&i| parse_job_result(lines[i], self.columns).is_ok())
            .map(|last| lines[1..=last].to_vec())
            .ok_or(ExtractError::EmptyTable)
    }

    /// Classify one row into a status label
    pub fn classify_row(&self, row: &str) -> Result<&str, RowError> {
        let description = parse_job_result(row, self.columns)?;
        self.classify_description(description)
    }

    /// Map a result description to the first matching descriptor's label
    pub fn classify_description(&self, description: &str) -> Result<&str, RowError> {
        self.descriptors
            .iter()
            .find(|d| d.matches(description))
            .map(|d| d.label.as_str())
            .ok_or_else(|| RowError::UnknownDescription(description.to_string()))
    }

    /// Extract and classify every row of the table in a comment
    pub fn parse_comment(&self, comment: &str) -> Result<ClassifiedTable, ExtractError> {
        let rows = self.extract_rows(comment)?;

        let mut table = ClassifiedTable::default();
        for row in rows {
            match self.classify_row(row) {
                Ok(label) => table.statuses.push(label.to_string()),
                Err(e) => {
                    debug!(row = %row, error = %e, "Dropping CI table row");
                    table.dropped_rows += 1;
                }
            }
        }

        Ok(table)
    }

    /// Reduce a set of labels to the one with the highest priority
    ///
    /// Ties keep the descriptor registered first. Labels not in the
    /// registry are ignored; `None` if nothing is left.
    pub fn aggregate(&self, statuses: &BTreeSet<String>) -> Option<&str> {
        let mut best: Option<&StatusDescriptor> = None;

        for descriptor in self.descriptors.iter().filter(|d| statuses.contains(&d.label)) {
            match best {
                Some(b) if descriptor.priority <= b.priority => {}
                _ => best = Some(descriptor),
            }
        }

        best.map(|d| d.label.as_str())
    }
}

fn title_line(title: &str) -> String {
    format!("{}{}", title, ROW_SEPARATOR)
}

/// Whether `title` followed by a line break occurs exactly once in `comment`
pub fn is_ci_comment(title: &str, comment: &str) -> bool {
    comment.matches(title_line(title).as_str()).count() == 1
}

/// Return the result cell of a row split into exactly `columns` parts
///
/// The row must start with `|`. The cell text is returned untrimmed.
pub fn parse_job_result(row: &str, columns: usize) -> Result<&str, RowError> {
    let cells: Vec<&str> = row.split(CELL_SEPARATOR).collect();

    if cells.len() == columns && cells[0].is_empty() {
        cells.get(RESULT_CELL).copied().ok_or(RowError::InvalidRow)
    } else {
        Err(RowError::InvalidRow)
    }
}
