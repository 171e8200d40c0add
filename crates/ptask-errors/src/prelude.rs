//! Prelude module for convenient error handling imports.

pub use crate::PtaskResult;
pub use crate::error::{ErrorKind, PtaskError, Resource};

/// Return early with [`PtaskError::InvalidArgument`] unless `$cond` holds.
///
/// # Example
///
/// ```
/// use ptask_errors::prelude::*;
/// use ptask_errors::ensure_arg;
///
/// fn check(n: usize) -> PtaskResult {
///     ensure_arg!(n > 0, "buffer count must be non-zero");
///     Ok(())
/// }
/// assert!(check(0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_arg {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::PtaskError::InvalidArgument($msg));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(v: i64) -> PtaskResult<i64> {
        ensure_arg!(v > 0, "value must be positive");
        Ok(v)
    }

    #[test]
    fn test_ensure_arg_macro() {
        assert_eq!(positive(3), Ok(3));
        assert_eq!(
            positive(-1),
            Err(PtaskError::InvalidArgument("value must be positive"))
        );
    }
}
