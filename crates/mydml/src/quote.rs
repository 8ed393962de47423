//! MySQL identifier quoting.
//!
//! [`Ident`] represents a table, column or alias reference, supporting dotted
//! notation and backtick quoted parts.
//!
//! - Unquoted parts are validated against letters, digits, `_` and `$`
//! - Quoted parts allow any character except NUL and escape `` ` `` as ``` `` ```
//! - The last part may be `*` (`t.*`)
//!
//! # Example
//! ```
//! use mydml::Ident;
//!
//! assert_eq!(Ident::parse("alias.column")?.to_sql(), "`alias`.`column`");
//! assert_eq!(Ident::parse("`odd name`.*")?.to_sql(), "`odd name`.*");
//! # Ok::<(), mydml::DmlError>(())
//! ```

use crate::error::{DmlError, DmlResult};

/// A part of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Name(String),
    /// `*`, only valid as the last part.
    Star,
}

/// A MySQL identifier (database, table, column or alias).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string: `col`, `t.col`, `` `t`.`odd name` ``, `t.*`.
    pub fn parse(s: &str) -> DmlResult<Self> {
        if s.is_empty() {
            return Err(DmlError::empty("identifier"));
        }
        if s.contains('\0') {
            return Err(invalid(s, "NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_some() => {}
                    Some('.') => return Err(invalid(s, "trailing '.'")),
                    Some(c) => return Err(invalid(s, &format!("unexpected '{c}'"))),
                    None => break,
                }
            }
            if matches!(parts.last(), Some(IdentPart::Star)) {
                return Err(invalid(s, "'*' must be the last part"));
            }

            match chars.peek() {
                Some('`') => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('`') if chars.peek() == Some(&'`') => {
                                chars.next();
                                name.push('`');
                            }
                            Some('`') => break,
                            Some(c) => name.push(c),
                            None => return Err(invalid(s, "unclosed backtick")),
                        }
                    }
                    if name.is_empty() {
                        return Err(invalid(s, "empty quoted part"));
                    }
                    parts.push(IdentPart::Name(name));
                }
                Some('*') => {
                    chars.next();
                    parts.push(IdentPart::Star);
                }
                _ => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' {
                            break;
                        }
                        if !(c == '_' || c == '$' || c.is_alphanumeric()) {
                            return Err(invalid(s, &format!("invalid character '{c}'")));
                        }
                        name.push(c);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(invalid(s, "empty part"));
                    }
                    parts.push(IdentPart::Name(name));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Render the identifier with every name part in backticks.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Star => out.push('*'),
                IdentPart::Name(name) => {
                    out.push('`');
                    for ch in name.chars() {
                        if ch == '`' {
                            out.push('`');
                        }
                        out.push(ch);
                    }
                    out.push('`');
                }
            }
        }
    }
}

fn invalid(s: &str, why: &str) -> DmlError {
    DmlError::not_supported(format!(
        "invalid identifier {s:?} ({why}); use an expression or unsafe mode for raw SQL"
    ))
}

/// Quote `name` as an identifier.
pub fn quote(name: &str) -> DmlResult<String> {
    Ident::parse(name).map(|id| id.to_sql())
}

/// Write `name` quoted. With `raw_ok`, a name that is not an identifier is
/// written verbatim instead of failing.
pub(crate) fn write_name(w: &mut String, name: &str, raw_ok: bool) -> DmlResult<()> {
    if name == "*" {
        w.push('*');
        return Ok(());
    }
    match Ident::parse(name) {
        Ok(id) => {
            id.write_sql(w);
            Ok(())
        }
        Err(_) if raw_ok && !name.is_empty() => {
            w.push_str(name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// ` AS alias`, alias always quoted.
pub(crate) fn write_alias(w: &mut String, alias: Option<&str>) -> DmlResult<()> {
    if let Some(alias) = alias.filter(|a| !a.is_empty()) {
        w.push_str(" AS ");
        write_name(w, alias, false)?;
    }
    Ok(())
}

/// Comma separated quoted names without spaces: `` `a`,`b` ``.
pub(crate) fn write_name_list(w: &mut String, names: &[String]) -> DmlResult<()> {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            w.push(',');
        }
        write_name(w, name, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_quote() {
        assert_eq!(quote("a").unwrap(), "`a`");
        assert_eq!(quote("t.c").unwrap(), "`t`.`c`");
        assert_eq!(quote("db.t.c").unwrap(), "`db`.`t`.`c`");
        assert_eq!(quote("t.*").unwrap(), "`t`.*");
        assert_eq!(quote("catalog_product_entity_$type$").unwrap(), "`catalog_product_entity_$type$`");
        assert_eq!(quote("`product_id`").unwrap(), "`product_id`");
        assert_eq!(quote("`we``ird`").unwrap(), "`we``ird`");
        assert_eq!(quote("2fa").unwrap(), "`2fa`");
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(quote("COUNT(*)").unwrap_err().is_not_supported());
        assert!(quote("a b").is_err());
        assert!(quote("t.").is_err());
        assert!(quote("*.c").is_err());
        assert!(quote("`open").is_err());
        assert!(quote("").unwrap_err().is_empty_input());
    }

    #[test]
    fn test_write_name_raw() {
        let mut w = String::new();
        write_name(&mut w, "Month(day_of_sale)", true).unwrap();
        assert_eq!(w, "Month(day_of_sale)");
        let mut w = String::new();
        write_name(&mut w, "SUM(t3.qty_ordered)", true).unwrap();
        write_alias(&mut w, Some("total_qty")).unwrap();
        assert_eq!(w, "SUM(t3.qty_ordered) AS `total_qty`");
        let mut w = String::new();
        assert!(write_name(&mut w, "Month(day_of_sale)", false).is_err());
    }
}
