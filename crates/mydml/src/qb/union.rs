//! UNION statement builder.
//!
//! Members are parenthesized and joined by `UNION` or `UNION ALL`. Two
//! extras:
//!
//! - **Preserve result set**: every member gets a constant column
//!   `_preserve_result_set` holding its index, and the final ORDER BY sorts
//!   by it first, so each member's rows stay together.
//! - **Templates**: a single member whose text contains a key, instantiated
//!   once per replacement value. Useful for attribute tables that share one
//!   shape, like `catalog_product_entity_$type$`.

use crate::assemble::{ArgPass, StmtKind};
use crate::error::{DmlError, DmlResult};
use crate::qb::select::{PRESERVE_RESULT_SET, SelectQb};
use crate::qb::traits::{BuildCache, SqlQb};
use crate::qb::{Term, write_limit, write_terms};

/// UNION builder.
#[derive(Clone, Debug)]
pub struct UnionQb {
    selects: Vec<SelectQb>,
    all: bool,
    preserve: bool,
    /// `(key, values)`; every entry has the same number of values
    replacements: Vec<(String, Vec<String>)>,
    order_by: Vec<Term>,
    limit: Option<u64>,
    offset: Option<u64>,
    interpolate: bool,
    cache: BuildCache,
    build_error: Option<DmlError>,
}

impl UnionQb {
    pub fn new(selects: impl IntoIterator<Item = SelectQb>) -> Self {
        Self {
            selects: selects.into_iter().collect(),
            all: false,
            preserve: false,
            replacements: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
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

    /// Add members.
    pub fn append(self, selects: impl IntoIterator<Item = SelectQb>) -> Self {
        self.mutate(|u| {
            u.selects.extend(selects);
            Ok(())
        })
    }

    /// `UNION ALL` instead of `UNION`.
    pub fn all(self) -> Self {
        self.mutate(|u| {
            u.all = true;
            Ok(())
        })
    }

    /// `UNION` (the default).
    pub fn distinct(self) -> Self {
        self.mutate(|u| {
            u.all = false;
            Ok(())
        })
    }

    /// Keep each member's rows together in the result, see the module docs.
    pub fn preserve_result_set(self) -> Self {
        self.mutate(|u| {
            u.preserve = true;
            Ok(())
        })
    }

    /// Instantiate the single template member once per value, replacing
    /// `key` in its text. Repeated calls must pass the same number of values.
    pub fn string_replace<S: Into<String>>(
        self,
        key: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.mutate(|u| {
            if key.is_empty() {
                return Err(DmlError::empty("union template key"));
            }
            let values: Vec<String> = values.into_iter().map(Into::into).collect();
            if values.is_empty() {
                return Err(DmlError::empty(format!("values for template key {key:?}")));
            }
            if let Some((first, prev)) = u.replacements.first() {
                if prev.len() != values.len() {
                    return Err(DmlError::mismatch(format!(
                        "template key {key:?} has {} values, {first:?} has {}",
                        values.len(),
                        prev.len()
                    )));
                }
            }
            u.replacements.push((key.to_string(), values));
            Ok(())
        })
    }

    pub fn order_by(self, col: &str) -> Self {
        self.mutate(|u| {
            u.order_by.push(Term::asc(col));
            Ok(())
        })
    }

    pub fn order_by_desc(self, col: &str) -> Self {
        self.mutate(|u| {
            u.order_by.push(Term::desc(col));
            Ok(())
        })
    }

    pub fn limit(self, n: u64) -> Self {
        self.mutate(|u| {
            u.limit = Some(n);
            Ok(())
        })
    }

    pub fn offset(self, n: u64) -> Self {
        self.mutate(|u| {
            u.offset = Some(n);
            Ok(())
        })
    }

    pub fn interpolate(self) -> Self {
        self.mutate(|u| {
            u.interpolate = true;
            Ok(())
        })
    }

    pub fn use_build_cache(self) -> Self {
        self.mutate(|u| {
            u.cache.enable();
            Ok(())
        })
    }

    /// Number of members after template expansion.
    fn member_count(&self) -> usize {
        match self.replacements.first() {
            Some((_, values)) => values.len(),
            None => self.selects.len(),
        }
    }

    /// The select producing member `i`.
    fn member(&self, i: usize) -> DmlResult<&SelectQb> {
        let index = if self.replacements.is_empty() { i } else { 0 };
        self.selects
            .get(index)
            .ok_or_else(|| DmlError::empty("union selects"))
    }

    fn check(&self) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        if self.selects.is_empty() {
            return Err(DmlError::empty("union selects"));
        }
        if !self.replacements.is_empty() && self.selects.len() != 1 {
            return Err(DmlError::not_supported(format!(
                "a union template takes exactly one select, got {}",
                self.selects.len()
            )));
        }
        Ok(())
    }
}

impl SqlQb for UnionQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        self.check()?;
        for i in 0..self.member_count() {
            if i > 0 {
                w.push_str(if self.all {
                    "\nUNION ALL\n"
                } else {
                    "\nUNION\n"
                });
            }
            let mut member = self.member(i)?.clone();
            if self.preserve {
                member = member.preserve_index(i);
            }
            let mut text = String::with_capacity(128);
            member
                .write_sql(&mut text)
                .map_err(|e| e.context(&format!("union member {i}")))?;
            for (key, values) in &self.replacements {
                text = text.replace(key.as_str(), &values[i]);
            }
            w.push('(');
            w.push_str(&text);
            w.push(')');
        }

        let mut order = Vec::with_capacity(self.order_by.len() + 1);
        if self.preserve {
            order.push(Term::asc(PRESERVE_RESULT_SET));
        }
        order.extend(self.order_by.iter().cloned());
        write_terms(w, "\nORDER BY ", &order, false)?;
        write_limit(w, self.limit, self.offset);
        Ok(())
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        self.check()?;
        for i in 0..self.member_count() {
            self.member(i)?
                .append_args(pass)
                .map_err(|e| e.context(&format!("union member {i}")))?;
        }
        Ok(())
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Select
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
