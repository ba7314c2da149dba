//! Operator keyword arguments.
//!
//! Operators are configured with string keys mapped to string values, the same
//! way they would be written on a command line (`lr=0.01`, `act_type=tanh`).
//! Insertion order is kept so argument dumps read the way they were written.
//!
//! Two keys are reserved for the executor: [`FWD_OP_NAME_KEY`] names the
//! operator to construct and [`BWD_OP_NAME_KEY`] selects its backward pass.

use core::fmt;
use core::str::FromStr;

use crate::error::{OpError, Result};

/// Reserved key holding the forward operator name.
pub const FWD_OP_NAME_KEY: &str = "fwd_op_name";

/// Reserved key holding the backward operator name.
pub const BWD_OP_NAME_KEY: &str = "bwd_op_name";

/// Backward name meaning "run forward only".
pub const BWD_OP_NAME_NONE: &str = "[none]";

/// How the backward pass of an operator is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackwardOp {
    /// Use the operator's own gradient.
    Inferred,
    /// Forward only.
    Disabled,
    /// A specific backward operator, which must match the forward operator's.
    Named(String),
}

/// Ordered string → string operator arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kwargs {
    entries: Vec<(String, String)>,
}

impl Kwargs {
    /// An empty argument set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// The raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The arguments meant for the operator itself.
    #[must_use]
    pub fn without_reserved(&self) -> Self {
        self.entries
            .iter()
            .filter(|(k, _)| k != FWD_OP_NAME_KEY && k != BWD_OP_NAME_KEY)
            .cloned()
            .collect()
    }

    /// The forward operator name, if set.
    #[must_use]
    pub fn op_name(&self) -> Option<&str> {
        self.get(FWD_OP_NAME_KEY)
    }

    /// The backward selection encoded in these arguments.
    #[must_use]
    pub fn backward_op(&self) -> BackwardOp {
        match self.get(BWD_OP_NAME_KEY) {
            None | Some("") => BackwardOp::Inferred,
            Some(BWD_OP_NAME_NONE) => BackwardOp::Disabled,
            Some(name) => BackwardOp::Named(name.to_owned()),
        }
    }

    /// Parses a required argument.
    ///
    /// # Errors
    /// [`OpError::MissingArgument`] or [`OpError::InvalidArgument`].
    pub fn require<T>(&self, op: &str, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(key).ok_or_else(|| OpError::MissingArgument {
            op: op.to_owned(),
            key: key.to_owned(),
        })?;
        parse_value(op, key, raw)
    }

    /// Parses an optional argument, falling back to `default`.
    ///
    /// # Errors
    /// [`OpError::InvalidArgument`] if the value is present but unparsable.
    pub fn parse_or<T>(&self, op: &str, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => parse_value(op, key, raw),
            None => Ok(default),
        }
    }

    /// Parses an optional boolean (`true/false/1/0`, any case).
    ///
    /// # Errors
    /// [`OpError::InvalidArgument`] for anything else.
    pub fn flag_or(&self, op: &str, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        parse_flag(raw).ok_or_else(|| OpError::InvalidArgument {
            op: op.to_owned(),
            key: key.to_owned(),
            value: raw.to_owned(),
            reason: "expected a boolean".to_owned(),
        })
    }

    /// Rejects keys the operator does not declare.
    ///
    /// # Errors
    /// [`OpError::UnknownArgument`] naming the first unexpected key.
    pub fn ensure_known(&self, op: &str, allowed: &[&str]) -> Result<()> {
        match self.iter().find(|(k, _)| !allowed.contains(k)) {
            Some((key, _)) => Err(OpError::UnknownArgument {
                op: op.to_owned(),
                key: key.to_owned(),
            }),
            None => Ok(()),
        }
    }
}

/// Copies `kwargs` and records the forward and backward operator names.
///
/// An empty `backward_op_name` leaves the backward pass to be inferred.
#[must_use]
pub fn args_with_op_name(kwargs: &Kwargs, op_name: &str, backward_op_name: &str) -> Kwargs {
    let mut out = kwargs.clone();
    out.set(FWD_OP_NAME_KEY, op_name);
    if !backward_op_name.is_empty() {
        out.set(BWD_OP_NAME_KEY, backward_op_name);
    }
    out
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_value<T>(op: &str, key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| OpError::InvalidArgument {
        op: op.to_owned(),
        key: key.to_owned(),
        value: raw.to_owned(),
        reason: e.to_string(),
    })
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kwargs = Self::new();
        for (k, v) in iter {
            kwargs.set(k, v);
        }
        kwargs
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Kwargs {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for Kwargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
