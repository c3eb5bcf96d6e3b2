//! # Path Parameters
//!
//! Member routes are declared as `/{resource}/{id:int}/`. The `:int` suffix
//! asks the router to hand the segment over as an integer; a parameter
//! without a suffix stays text.

/// Declared type of a path parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    /// Passed through unchanged
    #[default]
    String,
    /// Parsed as `i64`
    Int,
}

impl ParamType {
    /// The type named after the colon in `{name:type}`
    ///
    /// Anything other than `int` is treated as text.
    #[must_use]
    pub fn from_specifier(spec: &str) -> Self {
        if spec.eq_ignore_ascii_case("int") {
            Self::Int
        } else {
            Self::String
        }
    }

    /// Convert a matched segment
    ///
    /// A segment that does not parse keeps its text, leaving the handler to
    /// decide how to answer it.
    #[must_use]
    pub fn convert(self, raw: &str) -> ParamValue {
        match self {
            Self::Int => raw
                .parse()
                .map_or_else(|_| ParamValue::String(raw.to_string()), ParamValue::Int),
            Self::String => ParamValue::String(raw.to_string()),
        }
    }
}

/// A path parameter after conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Text, either declared so or failed to convert
    String(String),
    /// Integer
    Int(i64),
}

impl ParamValue {
    /// The integer, if this is one
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }
}

/// Name and type of a `{name}` or `{name:type}` segment
///
/// `None` for a literal segment.
#[must_use]
pub fn parse_segment(segment: &str) -> Option<(&str, ParamType)> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    Some(match inner.split_once(':') {
        Some((name, spec)) => (name, ParamType::from_specifier(spec)),
        None => (inner, ParamType::String),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_specifier() {
        assert_eq!(ParamType::from_specifier("int"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("INT"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("slug"), ParamType::String);
    }

    #[test]
    fn test_convert_id() {
        assert_eq!(ParamType::Int.convert("42"), ParamValue::Int(42));
        assert_eq!(ParamType::Int.convert("42").as_int(), Some(42));
        assert_eq!(
            ParamType::Int.convert("1.5"),
            ParamValue::String("1.5".to_string())
        );
        // past i64::MAX
        assert_eq!(ParamType::Int.convert("99999999999999999999").as_int(), None);
    }

    #[test]
    fn test_convert_text() {
        assert_eq!(
            ParamType::String.convert("42"),
            ParamValue::String("42".to_string())
        );
    }

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment("{id}"), Some(("id", ParamType::String)));
        assert_eq!(parse_segment("{id:int}"), Some(("id", ParamType::Int)));
        assert_eq!(parse_segment("movies"), None);
        assert_eq!(parse_segment(""), None);
    }
}
