use thiserror::Error;

/// An error returned from a memo cache lookup.
///
/// Apart from [`Closed`](Self::Closed), all of these are memoized for the key they occurred on,
/// and will be returned again for every further request of that key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError<E> {
    /// The generator returned an error for this key.
    #[error("{0}")]
    Generator(E),
    /// The cache was closed and does not accept requests anymore.
    #[error("memo cache is closed")]
    Closed,
    /// The computation for this key ended without producing a result.
    ///
    /// This happens when the generator panics, or when the future computing the value is dropped
    /// before it finishes.
    #[error("computation was abandoned before producing a result")]
    Abandoned,
}

impl<E> MemoError<E> {
    /// Returns the generator error, if this is one.
    pub fn generator_error(&self) -> Option<&E> {
        match self {
            MemoError::Generator(err) => Some(err),
            _ => None,
        }
    }
}
