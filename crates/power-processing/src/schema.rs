//! Column presence checks for configured feature and target columns.

use crate::error::SchemaError;

/// Validates that a dataset exposes the columns a configuration requires.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Check `available` against `required` features and, when given, a target.
    ///
    /// Missing features are reported before a missing target, in the order
    /// they were configured.
    pub fn validate(
        available: &[String],
        required: &[String],
        target: Option<&str>,
    ) -> Result<(), SchemaError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !available.contains(name))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(SchemaError::MissingFeatureColumns {
                missing,
                available: available.to_vec(),
            });
        }

        if let Some(target) = target
            && !available.iter().any(|name| name == target)
        {
            return Err(SchemaError::MissingTargetColumn {
                target: target.to_string(),
                available: available.to_vec(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_all_present() {
        let available = names(&["power", "cadence", "label"]);
        let required = names(&["power", "cadence"]);
        assert!(SchemaValidator::validate(&available, &required, Some("label")).is_ok());
        assert!(SchemaValidator::validate(&available, &required, None).is_ok());
    }

    #[test]
    fn test_missing_features_in_configured_order() {
        let available = names(&["power", "label"]);
        let required = names(&["speed", "power", "heart_rate"]);
        let err = SchemaValidator::validate(&available, &required, Some("label")).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingFeatureColumns {
                missing: names(&["speed", "heart_rate"]),
                available: names(&["power", "label"]),
            }
        );
    }

    #[test]
    fn test_missing_target_only_when_required() {
        let available = names(&["power", "cadence"]);
        let required = names(&["power"]);
        let err = SchemaValidator::validate(&available, &required, Some("label")).unwrap_err();
        assert!(matches!(err, SchemaError::MissingTargetColumn { ref target, .. } if target == "label"));
        assert!(SchemaValidator::validate(&available, &required, None).is_ok());
    }

    #[test]
    fn test_features_reported_before_target() {
        let available = names(&["cadence"]);
        let required = names(&["power"]);
        let err = SchemaValidator::validate(&available, &required, Some("label")).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FEATURE_COLUMNS");
    }
}
