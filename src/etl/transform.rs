//! Transformer trait for data transformation

use eyre::Result;

/// Transformer trait for transforming data items
///
/// Implementors define how to transform items:
/// - Type normalization
/// - Format conversion
/// - Validation
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::etl::Transformer;
/// use eyre::Result;
///
/// struct Upper;
///
/// impl Transformer for Upper {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input.to_uppercase())
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items (default batch implementation)
    ///
    /// Override this for optimized batch processing
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl Transformer for Doubler {
        type Input = i32;
        type Output = i32;

        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            Ok(input * 2)
        }
    }

    struct RejectNegative;

    impl Transformer for RejectNegative {
        type Input = i32;
        type Output = i32;

        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            if input < 0 {
                eyre::bail!("negative input: {}", input);
            }
            Ok(input)
        }
    }

    #[test]
    fn test_transform_many_keeps_order() {
        let output = Doubler.transform_many(vec![1, 2, 3]).unwrap();
        assert_eq!(output, vec![2, 4, 6]);
    }

    #[test]
    fn test_transform_many_stops_on_error() {
        let result = RejectNegative.transform_many(vec![1, -2, 3]);
        assert!(result.unwrap_err().to_string().contains("negative input: -2"));
    }
}
