use std::{fmt, io, num::ParseIntError, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

use crate::data::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A raw string does not match the grammar of its value type.
    InvalidEncoding,
    /// A tag expected to carry a value has none.
    MissingTag,
    /// A tag's value was read as a type it does not have.
    TypeMismatch,
    Io,
    Other,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_encoding(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidEncoding, message)
    }

    pub fn missing_tag(tag: Tag) -> Self {
        Error::new(ErrorKind::MissingTag, format!("Tag '{}' has no value", tag.key()))
    }

    pub fn type_mismatch(tag: Tag, expected: &str) -> Self {
        Error::new(
            ErrorKind::TypeMismatch,
            format!("Tag '{}' does not hold {}", tag.key(), expected),
        )
    }

    pub fn is_invalid_encoding(&self) -> bool {
        self.kind == ErrorKind::InvalidEncoding
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::new(ErrorKind::Io, value.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::new(ErrorKind::Other, value.to_string())
    }
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error::invalid_encoding(value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::new(ErrorKind::Other, value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::invalid_encoding(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::new(ErrorKind::Other, value.to_string())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
