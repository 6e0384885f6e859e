use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// A dot separated route to a nested property, e.g. `progress.completed_unit_count`.
///
/// A `KeyPath` is only checked for shape. Whether it names something observable
/// is decided by [`Watchable::resolve`](crate::Watchable::resolve).
///
/// # Examples
/// ```
/// use watchbox::KeyPath;
///
/// let path = KeyPath::parse("progress.completed_unit_count").unwrap();
/// assert_eq!(vec!["progress", "completed_unit_count"], path.segments().collect::<Vec<_>>());
///
/// assert!(KeyPath::parse("progress..total").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath(String);

impl KeyPath {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidKeyPath {
            path: text.to_owned(),
            reason,
        };

        if text.is_empty() {
            return Err(invalid("path is empty"));
        }

        for segment in text.split('.') {
            if segment.is_empty() {
                return Err(invalid("path contains an empty segment"));
            }
            if !segment.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid("segments may only contain alphanumerics and '_'"));
            }
        }

        Ok(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Splits off the first segment, returning it together with the rest of the path (if any).
    ///
    /// ```
    /// use watchbox::KeyPath;
    ///
    /// let path: KeyPath = "document.progress.total".parse().unwrap();
    /// let (head, rest) = path.split_first();
    /// assert_eq!("document", head);
    /// assert_eq!("progress.total", rest.unwrap().as_str());
    /// ```
    pub fn split_first(&self) -> (&str, Option<KeyPath>) {
        match self.0.split_once('.') {
            Some((head, rest)) => (head, Some(Self(rest.to_owned()))),
            None => (&self.0, None),
        }
    }
}

impl FromStr for KeyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
