//! Argument model: the values bound to `?` placeholders.
//!
//! [`Argument`] is a closed tagged union over the scalar kinds a MySQL
//! statement can bind (null, bool, integer, float, string, bytes, timestamp),
//! their list forms and a driver-specific wrapper. Every argument reports a
//! [`len`](Argument::len) which the operator engine uses to decide how many
//! placeholders a condition needs.

use crate::error::{DmlError, DmlResult};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use std::fmt;
use std::sync::Arc;

/// A driver specific value which resolves to a scalar [`Argument`] on demand.
///
/// This is the escape hatch for types the builder does not know about, for
/// example a decimal or a custom enum. The value is resolved when the
/// arguments get flattened for the driver or interpolated into SQL text.
pub trait DriverValue: fmt::Debug + Send + Sync {
    /// Resolve into a scalar argument.
    fn to_argument(&self) -> DmlResult<Argument>;
}

/// A value bound to one or more placeholders.
#[derive(Clone, Debug)]
pub enum Argument {
    /// SQL NULL. Occupies one slot in VALUES/SET, no slot in a comparison.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw bytes. Valid UTF-8 interpolates as a string, anything else as a hex literal.
    Bytes(Bytes),
    /// Timestamp without time zone.
    Time(NaiveDateTime),
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
    BytesList(Vec<Bytes>),
    Times(Vec<NaiveDateTime>),
    /// Driver specific value.
    Value(Arc<dyn DriverValue>),
    /// Staging marker for a deferred condition whose value comes from an
    /// [`ArgumentAssembler`](crate::ArgumentAssembler). Never leaves a
    /// successful build with an assembler.
    #[doc(hidden)]
    Pending,
}

impl Argument {
    /// Number of placeholder slots this argument fills: 1 for scalars, N for
    /// lists, 0 for NULL.
    pub fn len(&self) -> usize {
        match self {
            Argument::Null => 0,
            Argument::Bools(v) => v.len(),
            Argument::Ints(v) => v.len(),
            Argument::Floats(v) => v.len(),
            Argument::Strings(v) => v.len(),
            Argument::BytesList(v) => v.len(),
            Argument::Times(v) => v.len(),
            _ => 1,
        }
    }

    /// True for NULL and for empty lists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the list variants.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Argument::Bools(_)
                | Argument::Ints(_)
                | Argument::Floats(_)
                | Argument::Strings(_)
                | Argument::BytesList(_)
                | Argument::Times(_)
        )
    }

    /// True for [`Argument::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Argument::Null)
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Argument::Pending)
    }

    /// Split into scalar arguments: lists expand element-wise, driver values
    /// resolve, NULL stays one NULL.
    pub fn scalars(&self) -> DmlResult<Vec<Argument>> {
        Ok(match self {
            Argument::Bools(v) => v.iter().copied().map(Argument::Bool).collect(),
            Argument::Ints(v) => v.iter().copied().map(Argument::Int).collect(),
            Argument::Floats(v) => v.iter().copied().map(Argument::Float).collect(),
            Argument::Strings(v) => v.iter().cloned().map(Argument::String).collect(),
            Argument::BytesList(v) => v.iter().cloned().map(Argument::Bytes).collect(),
            Argument::Times(v) => v.iter().copied().map(Argument::Time).collect(),
            Argument::Value(v) => {
                let resolved = v.to_argument()?;
                if resolved.is_list() || matches!(resolved, Argument::Value(_)) {
                    return Err(DmlError::not_supported(format!(
                        "driver value {v:?} must resolve to a scalar"
                    )));
                }
                vec![resolved]
            }
            Argument::Pending => {
                return Err(DmlError::mismatch(
                    "deferred placeholder has not been assembled from a record",
                ));
            }
            scalar => vec![scalar.clone()],
        })
    }
}

impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        use Argument::*;
        match (self, other) {
            (Null, Null) | (Pending, Pending) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Bools(a), Bools(b)) => a == b,
            (Ints(a), Ints(b)) => a == b,
            (Floats(a), Floats(b)) => a == b,
            (Strings(a), Strings(b)) => a == b,
            (BytesList(a), BytesList(b)) => a == b,
            (Times(a), Times(b)) => a == b,
            (Value(a), Value(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: &[T]) -> fmt::Result {
            for (i, x) in v.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{x}")?;
            }
            Ok(())
        }
        match self {
            Argument::Null => f.write_str("<nil>"),
            Argument::Bool(b) => write!(f, "{b}"),
            Argument::Int(i) => write!(f, "{i}"),
            Argument::Float(x) => write!(f, "{x}"),
            Argument::String(s) => f.write_str(s),
            Argument::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Argument::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Argument::Bools(v) => list(f, v),
            Argument::Ints(v) => list(f, v),
            Argument::Floats(v) => list(f, v),
            Argument::Strings(v) => list(f, v),
            Argument::BytesList(v) => {
                let v: Vec<_> = v.iter().map(|b| String::from_utf8_lossy(b)).collect();
                list(f, &v)
            }
            Argument::Times(v) => {
                let v: Vec<_> = v.iter().map(|t| t.format("%Y-%m-%d %H:%M:%S")).collect();
                list(f, &v)
            }
            Argument::Value(v) => write!(f, "{v:?}"),
            Argument::Pending => f.write_str("<pending>"),
        }
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Argument {
            fn from(v: $t) -> Self {
                Argument::Int(i64::from(v))
            }
        }
    )*};
}

// `Vec<u8>` is bytes, not a list of integers.
macro_rules! from_int_list {
    ($($t:ty),*) => {$(
        impl From<Vec<$t>> for Argument {
            fn from(v: Vec<$t>) -> Self {
                Argument::Ints(v.into_iter().map(i64::from).collect())
            }
        }
    )*};
}

// Wider integers bind only when the value fits the signed 64 bit range.
macro_rules! try_from_wide_int {
    ($($t:ty),*) => {$(
        impl TryFrom<$t> for Argument {
            type Error = DmlError;

            fn try_from(v: $t) -> DmlResult<Self> {
                i64::try_from(v).map(Argument::Int).map_err(|_| {
                    DmlError::not_supported(format!(
                        "integer {v} exceeds the signed 64 bit range"
                    ))
                })
            }
        }

        impl TryFrom<Vec<$t>> for Argument {
            type Error = DmlError;

            fn try_from(v: Vec<$t>) -> DmlResult<Self> {
                v.into_iter()
                    .map(|n| match Argument::try_from(n)? {
                        Argument::Int(i) => Ok(i),
                        _ => Err(DmlError::not_supported("integer list")),
                    })
                    .collect::<DmlResult<Vec<_>>>()
                    .map(Argument::Ints)
            }
        }
    )*};
}

from_int!(i8, i16, i32, i64, u8, u16, u32);
from_int_list!(i8, i16, i32, i64, u16, u32);
try_from_wide_int!(u64, usize, isize);

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<Vec<bool>> for Argument {
    fn from(v: Vec<bool>) -> Self {
        Argument::Bools(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Float(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(f64::from(v))
    }
}

impl From<Vec<f64>> for Argument {
    fn from(v: Vec<f64>) -> Self {
        Argument::Floats(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<Vec<String>> for Argument {
    fn from(v: Vec<String>) -> Self {
        Argument::Strings(v)
    }
}

impl From<Vec<&str>> for Argument {
    fn from(v: Vec<&str>) -> Self {
        Argument::Strings(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Bytes> for Argument {
    fn from(v: Bytes) -> Self {
        Argument::Bytes(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for Argument {
    fn from(v: &[u8]) -> Self {
        Argument::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Vec<Bytes>> for Argument {
    fn from(v: Vec<Bytes>) -> Self {
        Argument::BytesList(v)
    }
}

impl From<NaiveDateTime> for Argument {
    fn from(v: NaiveDateTime) -> Self {
        Argument::Time(v)
    }
}

impl From<Vec<NaiveDateTime>> for Argument {
    fn from(v: Vec<NaiveDateTime>) -> Self {
        Argument::Times(v)
    }
}

/// Timestamps render in the wall-clock time of their own zone.
impl<Tz: TimeZone> From<DateTime<Tz>> for Argument {
    fn from(v: DateTime<Tz>) -> Self {
        Argument::Time(v.naive_local())
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(v: Option<T>) -> Self {
        v.map_or(Argument::Null, Into::into)
    }
}

impl From<Arc<dyn DriverValue>> for Argument {
    fn from(v: Arc<dyn DriverValue>) -> Self {
        Argument::Value(v)
    }
}

impl TryFrom<serde_json::Value> for Argument {
    type Error = DmlError;

    fn try_from(value: serde_json::Value) -> DmlResult<Self> {
        use serde_json::Value;

        fn number(n: &serde_json::Number) -> DmlResult<Argument> {
            if let Some(i) = n.as_i64() {
                Ok(Argument::Int(i))
            } else if n.is_u64() {
                Err(DmlError::not_supported(format!(
                    "unsigned integer {n} exceeds the signed 64 bit range"
                )))
            } else {
                n.as_f64()
                    .map(Argument::Float)
                    .ok_or_else(|| DmlError::not_supported(format!("number {n}")))
            }
        }

        match value {
            Value::Null => Ok(Argument::Null),
            Value::Bool(b) => Ok(Argument::Bool(b)),
            Value::Number(n) => number(&n),
            Value::String(s) => Ok(Argument::String(s)),
            Value::Array(items) => {
                let scalars = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Array(_) | Value::Object(_) | Value::Null => Err(
                            DmlError::not_supported("nested or null JSON array elements"),
                        ),
                        other => Argument::try_from(other),
                    })
                    .collect::<DmlResult<Vec<_>>>()?;
                collect_list(scalars)
            }
            Value::Object(_) => Err(DmlError::not_supported(
                "JSON objects cannot be bound as an argument",
            )),
        }
    }
}

/// Fold homogeneous scalars into one list argument.
fn collect_list(scalars: Vec<Argument>) -> DmlResult<Argument> {
    let Some(first) = scalars.first() else {
        return Ok(Argument::Ints(Vec::new()));
    };
    macro_rules! fold {
        ($variant:ident, $list:ident) => {
            scalars
                .into_iter()
                .map(|a| match a {
                    Argument::$variant(v) => Ok(v),
                    other => Err(DmlError::not_supported(format!(
                        "mixed kinds in list: {other:?}"
                    ))),
                })
                .collect::<DmlResult<Vec<_>>>()
                .map(Argument::$list)
        };
    }
    match first {
        Argument::Bool(_) => fold!(Bool, Bools),
        Argument::Int(_) => fold!(Int, Ints),
        Argument::Float(_) => fold!(Float, Floats),
        Argument::String(_) => fold!(String, Strings),
        other => Err(DmlError::not_supported(format!("list of {other:?}"))),
    }
}

/// An ordered sequence of arguments, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    /// Create an empty list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty list with capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self(Vec::with_capacity(cap))
    }

    /// Append an argument.
    pub fn push(&mut self, arg: impl Into<Argument>) {
        self.0.push(arg.into());
    }

    /// Append an argument (consuming version for chaining).
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub fn null(self) -> Self {
        self.arg(Argument::Null)
    }

    pub fn bool(self, v: bool) -> Self {
        self.arg(v)
    }

    pub fn int(self, v: i64) -> Self {
        self.arg(v)
    }

    pub fn ints(self, v: impl IntoIterator<Item = i64>) -> Self {
        self.arg(Argument::Ints(v.into_iter().collect()))
    }

    pub fn float(self, v: f64) -> Self {
        self.arg(v)
    }

    pub fn floats(self, v: impl IntoIterator<Item = f64>) -> Self {
        self.arg(Argument::Floats(v.into_iter().collect()))
    }

    pub fn str(self, v: impl Into<String>) -> Self {
        self.arg(Argument::String(v.into()))
    }

    pub fn strs<S: Into<String>>(self, v: impl IntoIterator<Item = S>) -> Self {
        self.arg(Argument::Strings(v.into_iter().map(Into::into).collect()))
    }

    pub fn bytes(self, v: impl Into<Bytes>) -> Self {
        self.arg(Argument::Bytes(v.into()))
    }

    pub fn time(self, v: NaiveDateTime) -> Self {
        self.arg(v)
    }

    pub fn times(self, v: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        self.arg(Argument::Times(v.into_iter().collect()))
    }

    /// Number of argument entries (a list counts once).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of `?` placeholders these arguments fill when every list binds
    /// element-wise and NULL binds one slot.
    pub fn slot_count(&self) -> usize {
        self.0
            .iter()
            .map(|a| if a.is_list() { a.len() } else { 1 })
            .sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Argument] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Argument> {
        self.0
    }

    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<Argument> {
        &mut self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Scalar bind values for a driver: lists expand element-wise.
    pub fn flatten(&self) -> DmlResult<Vec<Argument>> {
        let mut out = Vec::with_capacity(self.0.len());
        for arg in &self.0 {
            out.extend(arg.scalars()?);
        }
        Ok(out)
    }

    /// True while a deferred placeholder still waits for its value.
    pub fn has_pending(&self) -> bool {
        self.0.iter().any(Argument::is_pending)
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{a}")?;
        }
        f.write_str("]")
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(v: Vec<Argument>) -> Self {
        Self(v)
    }
}

impl FromIterator<Argument> for Arguments {
    fn from_iter<I: IntoIterator<Item = Argument>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Argument> for Arguments {
    fn extend<I: IntoIterator<Item = Argument>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Arguments {
    type Item = Argument;
    type IntoIter = std::vec::IntoIter<Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Argument;
    type IntoIter = std::slice::Iter<'a, Argument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Arguments {
    type Output = Argument;

    fn index(&self, idx: usize) -> &Argument {
        &self.0[idx]
    }
}
