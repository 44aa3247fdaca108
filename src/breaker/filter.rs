//! Failure classification.
//!
//! Two predicate lists decide whether an operation error counts as a
//! failure: `ignore` wins over `record`, and an empty `record` list
//! means every non-ignored error is recorded. The "ancestor" check of
//! dynamically typed hosts maps to walking the error's `source()` chain:
//! a predicate matching any link in the chain matches the error.

use std::error::Error;
use std::sync::Arc;

/// A classification predicate over one link of an error chain.
pub type ErrorPredicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Decides which operation errors are recorded as failures.
///
/// The default filter records everything. Ignored errors pass through
/// the breaker as if no call had occurred: no counter change, no
/// transition, no failure event.
#[derive(Clone, Default)]
pub struct ErrorFilter {
    ignore: Vec<ErrorPredicate>,
    record: Vec<ErrorPredicate>,
}

impl std::fmt::Debug for ErrorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorFilter")
            .field("ignore", &self.ignore.len())
            .field("record", &self.record.len())
            .finish()
    }
}

impl ErrorFilter {
    /// Creates a filter that records every error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores errors whose chain contains type `E`.
    pub fn ignore_type<E: Error + 'static>(self) -> Self {
        self.ignore_if(|e| e.is::<E>())
    }

    /// Ignores errors whose chain matches `predicate`.
    pub fn ignore_if(
        mut self,
        predicate: impl Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.ignore.push(Arc::new(predicate));
        self
    }

    /// Restricts recording to errors whose chain contains type `E`.
    pub fn record_type<E: Error + 'static>(self) -> Self {
        self.record_if(|e| e.is::<E>())
    }

    /// Restricts recording to errors whose chain matches `predicate`.
    pub fn record_if(
        mut self,
        predicate: impl Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.record.push(Arc::new(predicate));
        self
    }

    /// Returns `true` if `error` should be recorded as a failure.
    pub fn should_record(&self, error: &(dyn Error + 'static)) -> bool {
        if self.matches_chain(&self.ignore, error) {
            return false;
        }
        self.record.is_empty() || self.matches_chain(&self.record, error)
    }

    fn matches_chain(&self, predicates: &[ErrorPredicate], error: &(dyn Error + 'static)) -> bool {
        let mut link: Option<&(dyn Error + 'static)> = Some(error);
        while let Some(current) = link {
            if predicates.iter().any(|predicate| predicate(current)) {
                return true;
            }
            link = current.source();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("validation failed")]
    struct ValidationError;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct ConnectionError;

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct RequestError {
        #[source]
        source: ConnectionError,
    }

    #[test]
    fn test_default_records_everything() {
        let filter = ErrorFilter::new();
        assert!(filter.should_record(&ValidationError));
        assert!(filter.should_record(&ConnectionError));
    }

    #[test]
    fn test_ignore_wins() {
        let filter = ErrorFilter::new()
            .ignore_type::<ValidationError>()
            .record_type::<ValidationError>();
        assert!(!filter.should_record(&ValidationError));
    }

    #[test]
    fn test_record_whitelist() {
        let filter = ErrorFilter::new().record_type::<ConnectionError>();
        assert!(filter.should_record(&ConnectionError));
        assert!(!filter.should_record(&ValidationError));
    }

    #[test]
    fn test_chain_walk_matches_source() {
        let filter = ErrorFilter::new().record_type::<ConnectionError>();
        let wrapped = RequestError {
            source: ConnectionError,
        };
        // The predicate matches a link deeper in the chain.
        assert!(filter.should_record(&wrapped));
    }

    #[test]
    fn test_ignore_by_source_chain() {
        let filter = ErrorFilter::new().ignore_type::<ConnectionError>();
        let wrapped = RequestError {
            source: ConnectionError,
        };
        assert!(!filter.should_record(&wrapped));
        assert!(filter.should_record(&ValidationError));
    }

    #[test]
    fn test_predicate_form() {
        let filter =
            ErrorFilter::new().ignore_if(|e| e.to_string().contains("validation"));
        assert!(!filter.should_record(&ValidationError));
        assert!(filter.should_record(&ConnectionError));
    }
}
