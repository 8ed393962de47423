//! INSERT statement builder.

use crate::arg::{Argument, Arguments};
use crate::assemble::{ArgPass, ArgumentAssembler, PartKind, StmtKind, StmtPart};
use crate::condition::Condition;
use crate::error::{DmlError, DmlResult};
use crate::interpolate::write_template;
use crate::qb::select::SelectQb;
use crate::qb::traits::{BuildCache, MutationQb, SqlQb};
use crate::quote::{write_name, write_name_list};
use std::sync::Arc;

/// Value assigned by `ON DUPLICATE KEY UPDATE`.
#[derive(Debug, Clone)]
pub enum OnDuplicate {
    /// `` `col`=VALUES(`col`) ``: the value the row tried to insert.
    Values,
    /// `` `col`=? ``
    Value(Argument),
    /// `` `col`=<sql> `` with the expression's own arguments.
    Expr(String, Arguments),
}

/// INSERT builder.
#[derive(Clone, Debug)]
pub struct InsertQb {
    table: String,
    columns: Vec<String>,
    /// Directly bound rows
    rows: Vec<Arguments>,
    /// Records supplying one row each
    records: Vec<Arc<dyn ArgumentAssembler>>,
    /// Placeholder rows to write when no values are bound yet
    row_count: Option<usize>,
    select: Option<Box<SelectQb>>,
    ignore: bool,
    on_duplicate: Vec<(String, OnDuplicate)>,
    interpolate: bool,
    cache: BuildCache,
    build_error: Option<DmlError>,
}

impl InsertQb {
    /// Create a new INSERT builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            records: Vec::new(),
            row_count: None,
            select: None,
            ignore: false,
            on_duplicate: Vec::new(),
            interpolate: false,
            cache: BuildCache::default(),
            build_error: None,
        }
    }

    fn mutate(mut self, f: impl FnOnce(&mut Self) -> DmlResult<()>) -> Self {
        if self.build_error.is_none() {
            self.cache.invalidate();
            if let Err(e) = f(&mut self) {
                self.build_error = Some(e);
            }
        }
        self
    }

    /// Set the column list.
    pub fn columns(self, cols: &[&str]) -> Self {
        self.mutate(|s| {
            s.columns = cols.iter().map(|c| c.to_string()).collect();
            Ok(())
        })
    }

    /// Add values. With a column list they are split into rows of that
    /// width, so several rows can be added at once.
    pub fn add_values(self, values: Arguments) -> Self {
        self.mutate(|s| {
            if let Some(list) = values.iter().find(|a| a.is_list()) {
                return Err(DmlError::not_supported(format!(
                    "list {list} as an INSERT value"
                )));
            }
            if values.is_empty() {
                return Err(DmlError::empty("insert values"));
            }
            let width = match s.columns.len() {
                0 => s.rows.first().map_or(values.len(), Arguments::len),
                n => n,
            };
            if values.len() % width != 0 {
                return Err(DmlError::mismatch(format!(
                    "{} values do not fill rows of {width} columns",
                    values.len()
                )));
            }
            let mut row = Arguments::with_capacity(width);
            for v in values {
                row.push(v);
                if row.len() == width {
                    s.rows.push(std::mem::replace(&mut row, Arguments::with_capacity(width)));
                }
            }
            Ok(())
        })
    }

    /// Add one row from column/value conditions, e.g.
    /// `[column("id").int(1), column("name").str("a")]`. The first row
    /// defines the column list, later rows must repeat it.
    pub fn pair(self, row: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| {
            let mut cols = Vec::new();
            let mut values = Arguments::new();
            for c in row {
                let (col, value) = c.into_pair()?;
                if value.is_list() {
                    return Err(DmlError::not_supported(format!(
                        "list {value} as an INSERT value"
                    )));
                }
                cols.push(col);
                values.push(value);
            }
            if s.columns.is_empty() && s.rows.is_empty() {
                s.columns = cols;
            } else if s.columns != cols {
                return Err(DmlError::mismatch(format!(
                    "pair columns {cols:?} differ from {:?}",
                    s.columns
                )));
            }
            s.rows.push(values);
            Ok(())
        })
    }

    /// Write `n` placeholder rows; for prepared statements whose values are
    /// bound at execution.
    pub fn set_row_count(self, n: usize) -> Self {
        self.mutate(|s| {
            s.row_count = Some(n);
            Ok(())
        })
    }

    /// Add rows supplied by records. Requires a column list.
    pub fn add_records(self, records: impl IntoIterator<Item = Arc<dyn ArgumentAssembler>>) -> Self {
        self.mutate(|s| {
            s.records.extend(records);
            Ok(())
        })
    }

    /// `INSERT INTO t [(cols)] SELECT ...`
    pub fn from_select(self, select: SelectQb) -> Self {
        self.mutate(|s| {
            s.select = Some(Box::new(select));
            Ok(())
        })
    }

    /// `INSERT IGNORE`.
    pub fn ignore(self) -> Self {
        self.mutate(|s| {
            s.ignore = true;
            Ok(())
        })
    }

    /// Add an `ON DUPLICATE KEY UPDATE` assignment.
    pub fn on_duplicate_key(self, col: &str, value: OnDuplicate) -> Self {
        self.mutate(|s| {
            if let OnDuplicate::Value(v) = &value {
                if v.is_list() {
                    return Err(DmlError::not_supported(format!(
                        "list {v} in ON DUPLICATE KEY UPDATE"
                    )));
                }
            }
            s.on_duplicate.push((col.to_string(), value));
            Ok(())
        })
    }

    /// `` `col`=VALUES(`col`) `` for each column.
    pub fn on_duplicate_key_values(self, cols: &[&str]) -> Self {
        cols.iter()
            .fold(self, |s, c| s.on_duplicate_key(c, OnDuplicate::Values))
    }

    pub fn interpolate(self) -> Self {
        self.mutate(|s| {
            s.interpolate = true;
            Ok(())
        })
    }

    pub fn use_build_cache(self) -> Self {
        self.mutate(|s| {
            s.cache.enable();
            Ok(())
        })
    }

    fn row_width(&self) -> usize {
        match self.columns.len() {
            0 => self.rows.first().map_or(0, Arguments::len),
            n => n,
        }
    }

    /// Write the statement with `extra_rows` additional placeholder rows.
    fn write_statement(&self, w: &mut String, extra_rows: usize) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        if self.table.is_empty() {
            return Err(DmlError::empty("insert table"));
        }
        w.push_str(if self.ignore {
            "INSERT IGNORE INTO "
        } else {
            "INSERT INTO "
        });
        write_name(w, &self.table, false)?;
        if !self.columns.is_empty() {
            w.push_str(" (");
            write_name_list(w, &self.columns)?;
            w.push(')');
        }

        if let Some(select) = &self.select {
            if !self.rows.is_empty() || !self.records.is_empty() || extra_rows > 0 {
                return Err(DmlError::not_supported(
                    "INSERT ... SELECT combined with VALUES",
                ));
            }
            w.push(' ');
            select.write_sql(w).map_err(|e| e.context("insert select"))?;
        } else {
            if !self.records.is_empty() && self.columns.is_empty() {
                return Err(DmlError::empty("insert columns for records"));
            }
            let width = self.row_width();
            if width == 0 {
                return Err(DmlError::empty("insert columns or values"));
            }
            if let Some(row) = self.rows.iter().find(|r| r.len() != width) {
                return Err(DmlError::mismatch(format!(
                    "row of {} values for {width} columns",
                    row.len()
                )));
            }
            let bound = self.rows.len() + self.records.len();
            let rows = self.row_count.unwrap_or(0).max(bound) + extra_rows;
            if rows == 0 {
                return Err(DmlError::empty("insert values"));
            }
            w.push_str(" VALUES ");
            for r in 0..rows {
                if r > 0 {
                    w.push(',');
                }
                w.push('(');
                for c in 0..width {
                    if c > 0 {
                        w.push(',');
                    }
                    w.push('?');
                }
                w.push(')');
            }
        }

        if !self.on_duplicate.is_empty() {
            w.push_str(" ON DUPLICATE KEY UPDATE ");
            for (i, (col, value)) in self.on_duplicate.iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                write_name(w, col, false)?;
                w.push('=');
                match value {
                    OnDuplicate::Values => {
                        w.push_str("VALUES(");
                        write_name(w, col, false)?;
                        w.push(')');
                    }
                    OnDuplicate::Value(_) => w.push('?'),
                    OnDuplicate::Expr(sql, args) => write_template(w, sql, args)?,
                }
            }
        }
        Ok(())
    }
}

impl SqlQb for InsertQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        self.write_statement(w, 0)
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        let part = StmtPart::new(StmtKind::Insert, PartKind::Values);
        for row in &self.rows {
            for v in row {
                pass.push(v.clone());
            }
        }
        for record in &self.records {
            pass.assemble_with(record.as_ref(), part, &self.columns)?;
        }
        if pass.binds_row() {
            pass.assemble_in_place(part, &self.columns)?;
        }
        if let Some(select) = &self.select {
            select.append_args(pass)?;
        }
        for (_, value) in &self.on_duplicate {
            match value {
                OnDuplicate::Values => {}
                OnDuplicate::Value(v) => pass.push(v.clone()),
                OnDuplicate::Expr(_, args) => {
                    for a in args {
                        pass.push(a.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Insert
    }

    fn build_error(&self) -> Option<&DmlError> {
        self.build_error.as_ref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn build_cache(&self) -> Option<&BuildCache> {
        Some(&self.cache)
    }
}

impl MutationQb for InsertQb {
    fn record_sql(&self) -> DmlResult<String> {
        self.validate()?;
        let mut w = String::with_capacity(128);
        self.write_statement(&mut w, 1)?;
        Ok(w)
    }

    fn record_columns(&self) -> &[String] {
        &self.columns
    }
}
