//! Bounds checks for caller-supplied parameters.
//!
//! Every check fails with [`Error::InvalidRequest`] naming the field.

use anyhow::Result;

use crate::error::Error;

/// `value` must be `min..=max` characters long after trimming.
pub fn text_len(field: &str, value: &str, min: usize, max: Option<usize>) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(Error::invalid(format!(
            "{} must be at least {} characters (got {})",
            field, min, len
        ))
        .into());
    }
    if let Some(max) = max {
        if len > max {
            return Err(Error::invalid(format!(
                "{} must be at most {} characters (got {})",
                field, max, len
            ))
            .into());
        }
    }
    Ok(())
}

/// `value` must lie in `min..=max`.
pub fn range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(Error::invalid(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, value
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    #[test]
    fn test_text_len_bounds() {
        assert!(text_len("topic", "abc", 3, Some(500)).is_ok());
        assert!(text_len("topic", "  ab  ", 3, Some(500)).is_err());
        assert!(text_len("topic", &"x".repeat(501), 3, Some(500)).is_err());
        assert!(text_len("content", &"x".repeat(10_000), 10, None).is_ok());
    }

    #[test]
    fn test_range_reports_field() {
        let err = range("word_count", 499u32, 500, 10_000).unwrap_err();
        assert_eq!(classify(&err).map(|e| e.kind()), Some("invalid_request"));
        assert!(err.to_string().contains("word_count"));
        assert!(range("top_k", 20usize, 1, 20).is_ok());
    }
}
