//! Typed parameter slots for operations.
//!
//! A descriptor validates and normalizes one parameter value at operation
//! construction time. The canonical value is stored inside the operation and
//! is hashable, which is what both caches key on.

use std::fmt;

use crate::error::CircuitError;

/// Integer parameter with optional bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntParam {
    min: Option<i64>,
    max: Option<i64>,
}

impl IntParam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, value: i64) -> Self {
        self.min = Some(value);
        self
    }

    pub fn max(mut self, value: i64) -> Self {
        self.max = Some(value);
        self
    }

    pub fn create(&self, value: i64) -> Result<i64, CircuitError> {
        if let Some(min) = self.min {
            if value < min {
                return Err(CircuitError::Parameter(format!(
                    "integer value {value} is smaller than {min}"
                )));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(CircuitError::Parameter(format!(
                    "integer value {value} is greater than {max}"
                )));
            }
        }
        Ok(value)
    }
}

/// Boolean parameter; accepts 0/1 integers as well.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolParam;

impl BoolParam {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, value: i64) -> Result<bool, CircuitError> {
        match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CircuitError::Parameter(format!(
                "boolean value can only be 0 or 1, given {other}"
            ))),
        }
    }
}

/// String parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrParam;

impl StrParam {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, value: impl Into<String>) -> Result<String, CircuitError> {
        Ok(value.into())
    }
}

/// Finite ordered sequence parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct TupleParam {
    min_len: usize,
}

impl TupleParam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn non_empty() -> Self {
        Self { min_len: 1 }
    }

    pub fn create<T>(&self, values: impl IntoIterator<Item = T>) -> Result<Box<[T]>, CircuitError> {
        let values: Box<[T]> = values.into_iter().collect();
        if values.len() < self.min_len {
            return Err(CircuitError::Parameter(format!(
                "sequence of {} elements is shorter than {}",
                values.len(),
                self.min_len
            )));
        }
        Ok(values)
    }
}

/// Name of an input node: a string, an integer, or a nested sequence of those.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InputName {
    Text(String),
    Index(i64),
    Seq(Vec<InputName>),
}

impl fmt::Display for InputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Seq(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for InputName {
    fn from(name: &str) -> Self {
        Self::Text(name.to_string())
    }
}

impl From<String> for InputName {
    fn from(name: String) -> Self {
        Self::Text(name)
    }
}

impl From<i64> for InputName {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<Vec<InputName>> for InputName {
    fn from(parts: Vec<InputName>) -> Self {
        Self::Seq(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bounds() {
        let param = IntParam::new().min(0).max(7);
        assert_eq!(param.create(0).unwrap(), 0);
        assert_eq!(param.create(7).unwrap(), 7);
        assert!(param.create(-1).is_err());
        assert!(param.create(8).is_err());
    }

    #[test]
    fn test_bool_accepts_bits_only() {
        assert!(!BoolParam::new().create(0).unwrap());
        assert!(BoolParam::new().create(1).unwrap());
        assert!(BoolParam::new().create(2).is_err());
    }

    #[test]
    fn test_str_passthrough() {
        assert_eq!(StrParam::new().create("round").unwrap(), "round");
    }

    #[test]
    fn test_tuple_non_empty() {
        assert!(TupleParam::non_empty().create(Vec::<i64>::new()).is_err());
        assert_eq!(&*TupleParam::new().create([1, 2, 3]).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_input_name_display() {
        assert_eq!(InputName::from("x").to_string(), "x");
        assert_eq!(InputName::from(3).to_string(), "3");
        let name = InputName::Seq(vec![InputName::from("k"), InputName::from(1)]);
        assert_eq!(name.to_string(), "(k,1)");
    }
}
