use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters exchanged with an environment through
/// [`Environment::recv_parameters`](super::Environment::recv_parameters) and
/// [`Environment::send_parameters`](super::Environment::send_parameters).
pub type Parameters = BTreeMap<String, ParamValue>;

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Integer.
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Boolean.
    Bool(bool),

    /// Text.
    Text(String),

    /// List of values.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns the integer if the value is [`ParamValue::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the flag if the value is [`ParamValue::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
