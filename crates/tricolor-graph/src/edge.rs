use std::fmt;
use std::str::FromStr;

/// An undirected edge between two node ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Edge {
    pub first: u32,
    pub second: u32,
}

impl Edge {
    pub const fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }

    pub fn is_self_loop(&self) -> bool {
        self.first == self.second
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// A token that is not of the form `<digits>-<digits>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEdgeError {
    token: String,
    reason: &'static str,
}

impl ParseEdgeError {
    fn new(token: &str, reason: &'static str) -> Self {
        Self {
            token: token.to_owned(),
            reason,
        }
    }

    /// The rejected input.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for ParseEdgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid edge `{}`: {} (expected `a-b` with non-negative integers, e.g. `0-1`)",
            self.token, self.reason
        )
    }
}

impl std::error::Error for ParseEdgeError {}

fn parse_endpoint(token: &str, part: &str) -> Result<u32, ParseEdgeError> {
    if part.is_empty() {
        return Err(ParseEdgeError::new(token, "missing node id"));
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseEdgeError::new(token, "node ids must be decimal digits"));
    }
    part.parse()
        .map_err(|_| ParseEdgeError::new(token, "node id out of range"))
}

impl FromStr for Edge {
    type Err = ParseEdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (first, second) = s
            .split_once('-')
            .ok_or_else(|| ParseEdgeError::new(s, "missing `-` separator"))?;
        Ok(Self {
            first: parse_endpoint(s, first)?,
            second: parse_endpoint(s, second)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs() {
        assert_eq!("0-1".parse::<Edge>().unwrap(), Edge::new(0, 1));
        assert_eq!("12-007".parse::<Edge>().unwrap(), Edge::new(12, 7));
        assert!("3-3".parse::<Edge>().unwrap().is_self_loop());
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["", "-", "1", "1-", "-2", "a-b", "1-2-3", "+1-2", " 1-2", "1--2"] {
            let err = bad.parse::<Edge>().unwrap_err();
            assert_eq!(err.token(), bad);
        }
    }

    #[test]
    fn rejects_ids_beyond_u32() {
        let err = "4294967296-0".parse::<Edge>().unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        assert_eq!(
            "4294967295-0".parse::<Edge>().unwrap(),
            Edge::new(u32::MAX, 0)
        );
    }

    #[test]
    fn displays_as_parsed() {
        assert_eq!(Edge::new(4, 2).to_string(), "4-2");
    }
}
