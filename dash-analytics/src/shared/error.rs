use thiserror::Error;

/// All errors generated while normalizing raw records.
///
/// None of these abort a batch: the normalizer recovers each one locally by
/// substituting the field default or skipping the entry.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum NormalizeError {
    #[error("malformed number: {raw}")]
    MalformedNumber { raw: String },

    #[error("expected a JSON object for {kind} record, found: {found}")]
    NotAnObject { kind: &'static str, found: String },
}

impl NormalizeError {
    pub(crate) fn malformed(raw: impl Into<String>) -> Self {
        Self::MalformedNumber { raw: raw.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        struct TestCase {
            input: NormalizeError,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: malformed number carries the raw text
                input: NormalizeError::malformed("$abc"),
                expected: "malformed number: $abc",
            },
            TestCase {
                // TC1: non-object entry names the record kind
                input: NormalizeError::NotAnObject {
                    kind: "trade",
                    found: "42".to_string(),
                },
                expected: "expected a JSON object for trade record, found: 42",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.to_string(), test.expected, "TC{} failed", index);
        }
    }
}
