//! Typed containers for tag values and the string grammar they are written in.
//!
//! Every value has a canonical encoding (its `Display`) and is parsed from raw
//! tag text through a [`ValueKind`]. Arrays split on `;`, double arrays split
//! on `|` first and then parse every part as an array.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::errors::{Error, Result};

pub const ARRAY_DELIMITER: char = ';';
pub const DOUBLE_ARRAY_DELIMITER: char = '|';

const TRUE_TOKEN: &str = "yes";
const FALSE_TOKEN: &str = "no";

lazy_static! {
    static ref UINT_PATTERN: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// Non-negative integer. Arithmetic that would leave the non-negative range
/// fails with an encoding error, as constructing a negative value does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UInt(u32);

impl UInt {
    pub const ZERO: UInt = UInt(0);

    pub fn new(value: i64) -> Result<Self> {
        u32::try_from(value)
            .map(UInt)
            .map_err(|_| {
                Error::invalid_encoding(format!("{} is not a valid unsigned integer", value))
            })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if !UINT_PATTERN.is_match(raw) {
            return Err(Error::invalid_encoding(format!("'{}' is not an unsigned integer", raw)));
        }
        Ok(UInt(raw.parse()?))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Saturates at `u32::MAX`.
    pub fn add(self, other: UInt) -> UInt {
        UInt(self.0.saturating_add(other.0))
    }

    pub fn subtract(self, other: UInt) -> Result<UInt> {
        UInt::new(i64::from(self.0) - i64::from(other.0))
    }

    /// Saturates at `u32::MAX`.
    pub fn multiply(self, other: UInt) -> UInt {
        UInt(self.0.saturating_mul(other.0))
    }

    pub fn divide(self, other: UInt) -> Result<UInt> {
        self.0
            .checked_div(other.0)
            .map(UInt)
            .ok_or_else(|| Error::invalid_encoding(format!("cannot divide {} by zero", self.0)))
    }

    pub fn modulo(self, other: UInt) -> Result<UInt> {
        self.0
            .checked_rem(other.0)
            .map(UInt)
            .ok_or_else(|| Error::invalid_encoding(format!("cannot take {} modulo zero", self.0)))
    }
}

impl From<u32> for UInt {
    fn from(value: u32) -> Self {
        UInt(value)
    }
}

impl fmt::Display for UInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn parse_bool(raw: &str) -> Result<bool> {
    match raw {
        TRUE_TOKEN => Ok(true),
        FALSE_TOKEN => Ok(false),
        _ => Err(Error::invalid_encoding(format!(
            "'{}' is neither '{}' nor '{}'",
            raw, TRUE_TOKEN, FALSE_TOKEN
        ))),
    }
}

/// Delimited list of values. Never empty: splitting the empty string yields a
/// single empty element, which is how "present but unmarked" is written.
#[derive(Debug, Clone)]
pub struct Array {
    items: Vec<Value>,
    delimiter: char,
}

impl Array {
    pub fn new(items: Vec<Value>) -> Result<Self> {
        Array::with_delimiter(items, ARRAY_DELIMITER)
    }

    pub fn with_delimiter(items: Vec<Value>, delimiter: char) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::invalid_encoding("an array needs at least one element"));
        }
        if let Some(item) = items.iter().find(|item| item.to_string().contains(delimiter)) {
            return Err(Error::invalid_encoding(format!(
                "array element '{}' contains the delimiter '{}'",
                item, delimiter
            )));
        }
        Ok(Array { items, delimiter })
    }

    pub fn parse(raw: &str, element: &ValueKind, delimiter: char) -> Result<Self> {
        let items = raw
            .split(delimiter)
            .map(|part| element.parse(part))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array { items, delimiter })
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Array {}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.items.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", self.delimiter)?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// List of arrays, e.g. one array of turn markings per lane. Unlike [`Array`]
/// it may hold no rows at all; that encodes to (and decodes from) the empty
/// string.
#[derive(Debug, Clone)]
pub struct DoubleArray {
    rows: Vec<Array>,
    delimiter: char,
}

impl DoubleArray {
    pub fn new(rows: Vec<Array>) -> Result<Self> {
        DoubleArray::with_delimiter(rows, DOUBLE_ARRAY_DELIMITER)
    }

    pub fn with_delimiter(rows: Vec<Array>, delimiter: char) -> Result<Self> {
        if rows.len() == 1 && rows[0].to_string().is_empty() {
            return Err(Error::invalid_encoding(
                "a single row without content cannot be told apart from no rows",
            ));
        }
        if let Some(row) = rows.iter().find(|row| row.to_string().contains(delimiter)) {
            return Err(Error::invalid_encoding(format!(
                "row '{}' contains the delimiter '{}'",
                row, delimiter
            )));
        }
        Ok(DoubleArray { rows, delimiter })
    }

    pub fn empty() -> Self {
        DoubleArray {
            rows: Vec::new(),
            delimiter: DOUBLE_ARRAY_DELIMITER,
        }
    }

    pub fn parse(raw: &str, element: &ValueKind, outer: char, inner: char) -> Result<Self> {
        if raw.is_empty() {
            return Ok(DoubleArray {
                rows: Vec::new(),
                delimiter: outer,
            });
        }
        let rows = raw
            .split(outer)
            .map(|part| Array::parse(part, element, inner))
            .collect::<Result<Vec<_>>>()?;
        Ok(DoubleArray { rows, delimiter: outer })
    }

    pub fn rows(&self) -> &[Array] {
        &self.rows
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PartialEq for DoubleArray {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl Eq for DoubleArray {}

impl fmt::Display for DoubleArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.rows.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", self.delimiter)?;
            }
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    UInt(UInt),
    Str(String),
    Array(Array),
    DoubleArray(DoubleArray),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<UInt> {
        match self {
            Value::UInt(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_double_array(&self) -> Option<&DoubleArray> {
        match self {
            Value::DoubleArray(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "{}", TRUE_TOKEN),
            Value::Bool(false) => write!(f, "{}", FALSE_TOKEN),
            Value::UInt(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::Array(value) => write!(f, "{}", value),
            Value::DoubleArray(value) => write!(f, "{}", value),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<UInt> for Value {
    fn from(value: UInt) -> Self {
        Value::UInt(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Value::Array(value)
    }
}

impl From<DoubleArray> for Value {
    fn from(value: DoubleArray) -> Self {
        Value::DoubleArray(value)
    }
}

/// Shape of a value: tells how raw text is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    UInt,
    Str,
    Array {
        element: Box<ValueKind>,
        delimiter: char,
    },
    DoubleArray {
        element: Box<ValueKind>,
        outer: char,
        inner: char,
    },
}

impl ValueKind {
    pub fn array(element: ValueKind) -> Self {
        ValueKind::Array {
            element: Box::new(element),
            delimiter: ARRAY_DELIMITER,
        }
    }

    pub fn double_array(element: ValueKind) -> Self {
        ValueKind::DoubleArray {
            element: Box::new(element),
            outer: DOUBLE_ARRAY_DELIMITER,
            inner: ARRAY_DELIMITER,
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Value> {
        match self {
            ValueKind::Bool => Ok(Value::Bool(parse_bool(raw)?)),
            ValueKind::UInt => Ok(Value::UInt(UInt::parse(raw)?)),
            ValueKind::Str => Ok(Value::Str(raw.to_string())),
            ValueKind::Array { element, delimiter } => {
                Ok(Value::Array(Array::parse(raw, element, *delimiter)?))
            }
            ValueKind::DoubleArray { element, outer, inner } => {
                Ok(Value::DoubleArray(DoubleArray::parse(raw, element, *outer, *inner)?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "a boolean",
            ValueKind::UInt => "an unsigned integer",
            ValueKind::Str => "a string",
            ValueKind::Array { .. } => "an array",
            ValueKind::DoubleArray { .. } => "a double array",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Bool, Value::Bool(_)) => true,
            (ValueKind::UInt, Value::UInt(_)) => true,
            (ValueKind::Str, Value::Str(_)) => true,
            (ValueKind::Array { element, .. }, Value::Array(array)) => {
                array.items().iter().all(|item| element.matches(item))
            }
            (ValueKind::DoubleArray { element, .. }, Value::DoubleArray(double_array)) => {
                double_array
                    .rows()
                    .iter()
                    .flat_map(|row| row.items())
                    .all(|item| element.matches(item))
            }
            _ => false,
        }
    }
}
