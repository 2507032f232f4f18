use thiserror::Error;

/// Errors raised when binding caller storage to an engine vector.
///
/// Every variant is a configuration error: the caller handed over storage the
/// binding cannot describe. None of them is retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    #[error("state buffer has no elements")]
    Empty,

    #[error("expected a {expected} buffer, got a {found} buffer")]
    LayoutMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(
        "buffer holds {found_local} local / {found_global} global elements, \
         binding expects {expected_local} / {expected_global}"
    )]
    SizeMismatch {
        expected_local: usize,
        expected_global: usize,
        found_local: usize,
        found_global: usize,
    },

    #[error("partition descriptor was already taken and does not describe this buffer")]
    DescriptorUnavailable,
}
