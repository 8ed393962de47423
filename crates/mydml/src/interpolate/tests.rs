use super::*;
use crate::arg::DriverValue;
use chrono::NaiveDate;
use std::sync::Arc;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// Inverse of [`escape_string`] for one quoted literal.
fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('Z') => out.push('\x1a'),
            Some(other) => out.push(other),
            None => panic!("dangling backslash in {literal}"),
        }
    }
    out
}

#[test]
fn test_interpolate_lists_and_strings() {
    let sql = interpolate(
        "SELECT * FROM x WHERE a IN (?) AND b IN (?) AND c NOT IN (?) AND d BETWEEN ? AND ?",
    )
    .ints([1])
    .ints([1, 2, 3])
    .ints([5, 6, 7])
    .str("wat")
    .str("ok")
    .to_sql()
    .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM x WHERE a IN (1) AND b IN (1,2,3) AND c NOT IN (5,6,7) AND d BETWEEN 'wat' AND 'ok'"
    );
}

#[test]
fn test_element_wise_binding() {
    // one list feeding a run of placeholders
    let args = Arguments::new().ints([3, 4, 5]).int(6);
    let sql = render("qty+? | qty+? | qty+? | w = ?", &args).unwrap();
    assert_eq!(sql, "qty+3 | qty+4 | qty+5 | w = 6");
}

#[test]
fn test_list_outside_parens() {
    let args = Arguments::new().ints([1, 2]);
    assert_eq!(render("a IN ?", &args).unwrap(), "a IN (1,2)");
    let args = Arguments::new().ints(Vec::new());
    assert_eq!(render("a IN (?)", &args).unwrap(), "a IN (NULL)");
    assert_eq!(render("a IN ?", &args).unwrap(), "a IN (NULL)");
}

#[test]
fn test_scalar_literals() {
    let args = Arguments::new()
        .null()
        .bool(true)
        .bool(false)
        .int(-7)
        .float(3.14156)
        .time(at(2009, 11, 11, 0, 0, 0));
    let sql = render("?,?,?,?,?,?", &args).unwrap();
    assert_eq!(sql, "NULL,1,0,-7,3.14156,'2009-11-11 00:00:00'");
}

#[test]
fn test_bytes_utf8_and_binary() {
    let args = Arguments::new()
        .bytes(b"it's".to_vec())
        .bytes(vec![0xff_u8, 0x00, 0x10]);
    assert_eq!(render("? ?", &args).unwrap(), r"'it\'s' X'ff0010'");
}

#[test]
fn test_non_finite_float_rejected() {
    let err = render("?", &Arguments::new().float(f64::NAN)).unwrap_err();
    assert!(err.is_not_supported());
}

#[test]
fn test_placeholders_inside_quotes_ignored() {
    let sql = "SELECT '?', \"a?\", `we?rd`, 'it\\'s ?' FROM t WHERE a = ?";
    assert_eq!(count_placeholders(sql), 1);
    let out = render(sql, &Arguments::new().int(1)).unwrap();
    assert!(out.ends_with("WHERE a = 1"));
    assert!(out.starts_with("SELECT '?', \"a?\", `we?rd`"));
}

#[test]
fn test_count_mismatch() {
    let err = render("a = ? AND b = ?", &Arguments::new().int(1)).unwrap_err();
    assert!(err.is_mismatch());
}

#[test]
fn test_pending_cannot_be_interpolated() {
    let args: Arguments = vec![Argument::Pending].into();
    assert!(render("a = ?", &args).unwrap_err().is_mismatch());
}

#[test]
fn test_escape_round_trip() {
    for s in [
        "b'%",
        "Pik'e",
        "back\\slash",
        "quote\"double",
        "nul\0byte",
        "line\nbreak\r",
        "ctrl\x1az",
        "plain",
        "",
    ] {
        let mut lit = String::new();
        escape_string(&mut lit, s);
        assert_eq!(unescape(&lit), s, "literal {lit}");
    }
    let mut lit = String::new();
    escape_string(&mut lit, "b'%");
    assert_eq!(lit, r"'b\'%'");
}

#[derive(Debug)]
struct Decimal(&'static str);

impl DriverValue for Decimal {
    fn to_argument(&self) -> DmlResult<Argument> {
        Ok(Argument::String(self.0.to_string()))
    }
}

#[derive(Debug)]
struct Broken;

impl DriverValue for Broken {
    fn to_argument(&self) -> DmlResult<Argument> {
        Ok(Argument::Ints(vec![1, 2]))
    }
}

#[derive(Debug)]
struct Latin1(Vec<u8>);

impl DriverValue for Latin1 {
    fn to_argument(&self) -> DmlResult<Argument> {
        String::from_utf8(self.0.clone())
            .map(Argument::String)
            .map_err(|e| DmlError::encoding(format!("latin1 column value: {e}")))
    }
}

#[test]
fn test_driver_value_encoding_error() {
    let args = Arguments::new().arg(Arc::new(Latin1(vec![b'c', 0xe9])) as Arc<dyn DriverValue>);
    assert!(render("name = ?", &args).unwrap_err().is_encoding());
    let args = Arguments::new().arg(Arc::new(Latin1(b"cafe".to_vec())) as Arc<dyn DriverValue>);
    assert_eq!(render("name = ?", &args).unwrap(), "name = 'cafe'");
}

#[test]
fn test_driver_value_resolves() {
    let args = Arguments::new().arg(Arc::new(Decimal("12.50")) as Arc<dyn DriverValue>);
    assert_eq!(render("price = ?", &args).unwrap(), "price = '12.50'");
    let args = Arguments::new().arg(Arc::new(Broken) as Arc<dyn DriverValue>);
    assert!(render("x = ?", &args).unwrap_err().is_not_supported());
}

#[test]
fn test_repeat() {
    let args = Arguments::new()
        .ints([5, 7, 9])
        .strs(["a", "b", "c", "d", "e"]);
    assert_eq!(
        repeat("SELECT * FROM `table` WHERE id IN (?) AND name IN (?)", &args).unwrap(),
        "SELECT * FROM `table` WHERE id IN (?,?,?) AND name IN (?,?,?,?,?)"
    );
    let args = Arguments::new().int(1).ints(Vec::new());
    assert_eq!(repeat("a = ? AND b IN (?)", &args).unwrap(), "a = ? AND b IN (NULL)");
    assert!(repeat("a = ?", &Arguments::new()).unwrap_err().is_mismatch());
}

#[test]
fn test_write_template_modes() {
    let mut w = String::new();
    write_template(&mut w, "id IN (?)", &Arguments::new().ints([1, 2])).unwrap();
    assert_eq!(w, "id IN (?,?)");
    let mut w = String::new();
    write_template(&mut w, "a = ? OR b = ?", &Arguments::new().ints([1, 2])).unwrap();
    assert_eq!(w, "a = ? OR b = ?");
}
