//! Source-level tags attached to nodes at creation time.

use std::fmt;
use std::rc::Rc;

/// A stack of tokens describing where in the building code a node was created.
///
/// Cheap to clone; every node holds the location that was current when it was
/// appended to the circuit.
#[derive(Clone, Debug, Default)]
pub struct Location {
    segments: Rc<[String]>,
}

impl Location {
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a location with `token` appended.
    pub fn child(&self, token: &str) -> Self {
        let mut segments: Vec<String> = self.segments.to_vec();
        segments.push(token.to_string());
        Self {
            segments: segments.into(),
        }
    }

    /// Returns the location with the last token removed.
    pub fn parent(&self) -> Self {
        let mut segments: Vec<String> = self.segments.to_vec();
        segments.pop();
        Self {
            segments: segments.into(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Location {}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_display() {
        let loc = Location::root().child("round").child("sbox");
        assert_eq!(loc.to_string(), "round:sbox");
        assert_eq!(loc.parent().to_string(), "round");
        assert!(Location::root().is_empty());
    }
}
