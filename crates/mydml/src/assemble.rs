//! Record-driven argument assembly.
//!
//! Deferred values come from an [`ArgumentAssembler`] implemented by the
//! caller's record type. SET and VALUES parts are assembled in place, because
//! at that point the argument list ends exactly where the record's values
//! belong. Deferred WHERE conditions are scattered between directly bound
//! arguments, so the argument pass plants a staging marker at each of their
//! positions, asks the assembler once for all of them, and [`backfill`] swaps
//! the appended values into the recorded positions.

use crate::arg::{Argument, Arguments};
use crate::error::{DmlError, DmlResult};
use std::sync::Arc;

/// Statement kind passed to an assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// Statement part whose values are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// `UPDATE ... SET` columns registered with `add_columns`.
    Set,
    /// Deferred WHERE (or JOIN/HAVING) conditions.
    Where,
    /// One `INSERT ... VALUES` row.
    Values,
}

/// Identifies which part of which statement an assembler call serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtPart {
    pub stmt: StmtKind,
    pub part: PartKind,
}

impl StmtPart {
    pub const fn new(stmt: StmtKind, part: PartKind) -> Self {
        Self { stmt, part }
    }
}

/// Supplies the values of one record.
///
/// The implementation appends exactly one value per entry of `columns`, in
/// that order, and returns the extended list.
///
/// ```
/// use mydml::{Arguments, ArgumentAssembler, DmlError, DmlResult, PartKind, StmtPart};
///
/// struct Person { id: i64, name: String }
///
/// impl ArgumentAssembler for Person {
///     fn assemble_arguments(
///         &self,
///         _part: StmtPart,
///         mut args: Arguments,
///         columns: &[String],
///     ) -> DmlResult<Arguments> {
///         for c in columns {
///             match c.as_str() {
///                 "id" => args.push(self.id),
///                 "name" => args.push(self.name.as_str()),
///                 other => return Err(DmlError::not_supported(format!("column {other}"))),
///             }
///         }
///         Ok(args)
///     }
/// }
/// ```
pub trait ArgumentAssembler: Send + Sync {
    fn assemble_arguments(
        &self,
        part: StmtPart,
        args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments>;
}

impl std::fmt::Debug for dyn ArgumentAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<record>")
    }
}

impl<T: ArgumentAssembler + ?Sized> ArgumentAssembler for &T {
    fn assemble_arguments(
        &self,
        part: StmtPart,
        args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments> {
        (**self).assemble_arguments(part, args, columns)
    }
}

impl<T: ArgumentAssembler + ?Sized> ArgumentAssembler for Arc<T> {
    fn assemble_arguments(
        &self,
        part: StmtPart,
        args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments> {
        (**self).assemble_arguments(part, args, columns)
    }
}

impl<T: ArgumentAssembler + ?Sized> ArgumentAssembler for Box<T> {
    fn assemble_arguments(
        &self,
        part: StmtPart,
        args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments> {
        (**self).assemble_arguments(part, args, columns)
    }
}

/// Swap assembler-produced values into their recorded positions.
///
/// `args[len_before..]` holds the values the assembler appended, one per entry
/// of `positions`, in the same order. Each value is swapped into
/// `positions[j]` and the staging tail is truncated. Positions must point
/// below `len_before`.
pub fn backfill(args: &mut Arguments, positions: &[usize], len_before: usize) -> DmlResult<()> {
    let produced = args.len().checked_sub(len_before).ok_or_else(|| {
        DmlError::mismatch(format!(
            "assembler shrank the argument list from {len_before} to {}",
            args.len()
        ))
    })?;
    if produced != positions.len() {
        return Err(DmlError::mismatch(format!(
            "assembler produced {produced} values for {} deferred placeholders",
            positions.len()
        )));
    }
    let v = args.as_mut_vec();
    for (j, &pos) in positions.iter().enumerate() {
        if pos >= len_before {
            return Err(DmlError::mismatch(format!(
                "deferred position {pos} lies outside the assembled range {len_before}"
            )));
        }
        v.swap(pos, len_before + j);
    }
    v.truncate(len_before);
    Ok(())
}

/// State of one argument pass over a statement tree.
///
/// Holds the collected arguments, the recorded positions of deferred
/// conditions and, when binding a record, the record itself.
pub struct ArgPass<'a> {
    pub(crate) args: Arguments,
    pending: Vec<usize>,
    pending_columns: Vec<String>,
    record: Option<&'a dyn ArgumentAssembler>,
    aliases: Option<&'a [String]>,
    bind_row: bool,
}

impl<'a> ArgPass<'a> {
    pub(crate) fn new(
        record: Option<&'a dyn ArgumentAssembler>,
        aliases: Option<&'a [String]>,
    ) -> Self {
        Self {
            args: Arguments::new(),
            pending: Vec::new(),
            pending_columns: Vec::new(),
            record,
            aliases,
            bind_row: false,
        }
    }

    /// A pass binding the statement to one record, including an INSERT row.
    pub(crate) fn for_record(
        record: &'a dyn ArgumentAssembler,
        aliases: Option<&'a [String]>,
    ) -> Self {
        let mut pass = Self::new(Some(record), aliases);
        pass.bind_row = true;
        pass
    }

    /// True when the record supplies one INSERT row.
    pub(crate) fn binds_row(&self) -> bool {
        self.bind_row
    }

    pub(crate) fn push(&mut self, arg: Argument) {
        self.args.push(arg);
    }

    /// Plant a staging marker for a deferred condition on `column`.
    pub(crate) fn defer(&mut self, column: &str) {
        self.pending.push(self.args.len());
        self.pending_columns.push(column.to_string());
        self.args.push(Argument::Pending);
    }

    /// Append the values for `columns` from the pass's record. Without a
    /// record, staging markers hold the places.
    pub(crate) fn assemble_in_place(&mut self, part: StmtPart, columns: &[String]) -> DmlResult<()> {
        if columns.is_empty() {
            return Ok(());
        }
        let Some(record) = self.record else {
            for _ in columns {
                self.args.push(Argument::Pending);
            }
            return Ok(());
        };
        let columns = match self.aliases {
            Some(aliases) if part.part == PartKind::Set => aliases,
            _ => columns,
        };
        self.assemble_with(record, part, columns)
    }

    /// Append the values for `columns` from `record`.
    pub(crate) fn assemble_with(
        &mut self,
        record: &dyn ArgumentAssembler,
        part: StmtPart,
        columns: &[String],
    ) -> DmlResult<()> {
        let before = self.args.len();
        let args = std::mem::take(&mut self.args);
        self.args = record.assemble_arguments(part, args, columns)?;
        let produced = self.args.len().saturating_sub(before);
        if self.args.len() < before || produced != columns.len() {
            return Err(DmlError::mismatch(format!(
                "assembler produced {produced} values for {} columns",
                columns.len()
            )));
        }
        Ok(())
    }

    /// Resolve deferred conditions with the record and return the arguments.
    pub(crate) fn finish(self, stmt: StmtKind) -> DmlResult<Arguments> {
        let Some(record) = self.record.filter(|_| !self.pending.is_empty()) else {
            return Ok(self.args);
        };
        let len_before = self.args.len();
        let mut args = record.assemble_arguments(
            StmtPart::new(stmt, PartKind::Where),
            self.args,
            &self.pending_columns,
        )?;
        backfill(&mut args, &self.pending, len_before)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &[i64]) -> Arguments {
        v.iter().copied().map(Argument::Int).collect()
    }

    #[test]
    fn test_backfill_swaps_into_positions() {
        // direct 10, deferred, direct 30, deferred ; assembler appended 20, 40
        let mut args: Arguments = vec![
            Argument::Int(10),
            Argument::Pending,
            Argument::Int(30),
            Argument::Pending,
            Argument::Int(20),
            Argument::Int(40),
        ]
        .into();
        backfill(&mut args, &[1, 3], 4).unwrap();
        assert_eq!(args, ints(&[10, 20, 30, 40]));
    }

    #[test]
    fn test_backfill_adjacent_positions() {
        let mut args: Arguments = vec![
            Argument::Pending,
            Argument::Pending,
            Argument::Pending,
            Argument::Int(1),
            Argument::Int(2),
            Argument::Int(3),
        ]
        .into();
        backfill(&mut args, &[0, 1, 2], 3).unwrap();
        assert_eq!(args, ints(&[1, 2, 3]));
    }

    #[test]
    fn test_backfill_count_mismatch() {
        let mut args: Arguments = vec![Argument::Pending, Argument::Int(1), Argument::Int(2)].into();
        assert!(backfill(&mut args, &[0], 1).unwrap_err().is_mismatch());
        let mut args: Arguments = vec![Argument::Pending].into();
        assert!(backfill(&mut args, &[0], 1).unwrap_err().is_mismatch());
    }

    #[test]
    fn test_backfill_nothing_pending() {
        let mut args = ints(&[1, 2]);
        backfill(&mut args, &[], 2).unwrap();
        assert_eq!(args, ints(&[1, 2]));
    }
}
