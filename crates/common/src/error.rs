use thiserror::Error;

/// Terminal failures of a pipeline run. Anything else surfaces as a plain `anyhow` IO/parse error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no {column} column found in {dataset} data")]
    MissingColumn {
        dataset: &'static str,
        column: &'static str,
    },
    #[error("{dataset} data has no usable rows")]
    EmptyInput { dataset: &'static str },
    #[error("malformed {dataset} row {row}: expected {expected} fields, saw {found}")]
    TooManyFields {
        dataset: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let err = PipelineError::MissingColumn {
            dataset: "trader",
            column: "Timestamp",
        };
        assert_eq!(err.to_string(), "no Timestamp column found in trader data");
    }

    #[test]
    fn test_too_many_fields_message() {
        let err = PipelineError::TooManyFields {
            dataset: "trader",
            row: 3,
            expected: 2,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "malformed trader row 3: expected 2 fields, saw 3"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = PipelineError::EmptyInput {
            dataset: "sentiment",
        }
        .into();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyInput { dataset: "sentiment" })
        ));
    }
}
