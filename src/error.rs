use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StripError {
    #[error("expected argument to be a `{expected}`, got `{found}`")]
    InvalidArgument {
        expected: &'static str,
        found: String,
    },
}

impl StripError {
    pub(crate) fn not_text(found: impl Into<String>) -> Self {
        StripError::InvalidArgument {
            expected: "string",
            found: found.into(),
        }
    }
}
