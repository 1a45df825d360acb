//! Garde validation utilities.

use crate::error::DomainError;
use garde::{Report, Validate};

/// Convert garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct TestRequest {
        #[garde(length(min = 1))]
        site_id: String,
    }

    #[test]
    fn test_validate_success() {
        let request = TestRequest {
            site_id: "site-1".to_string(),
        };
        assert!(validate_struct(&request).is_ok());
    }

    #[test]
    fn test_validate_failure_names_field() {
        let request = TestRequest {
            site_id: "".to_string(),
        };
        let result = validate_struct(&request);
        match result {
            Err(DomainError::ValidationError(msg)) => assert!(msg.contains("site_id")),
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }
}
