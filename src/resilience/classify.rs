//! Failure classification.

/// How the retry policy treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Retrying cannot help (duplicate key, no selectable server).
    Permanent,
    /// Likely to clear on its own (dropped connection, failed operation).
    Transient,
    /// Not a store condition the policy knows about.
    Unclassified,
}

impl FailureClass {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Permanent => "permanent",
            FailureClass::Transient => "transient",
            FailureClass::Unclassified => "unclassified",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that know which [`FailureClass`] they belong to.
pub trait Classify {
    fn failure_class(&self) -> FailureClass;
}

impl<T: Classify + ?Sized> Classify for &T {
    fn failure_class(&self) -> FailureClass {
        (**self).failure_class()
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn failure_class(&self) -> FailureClass {
        (**self).failure_class()
    }
}
