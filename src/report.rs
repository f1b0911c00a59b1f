//! Error reporting sink.
//!
//! Operations that catch a failure, report it, and hand it back unchanged
//! (the part resolver and the BOM aggregator) send the error here first.

use std::error::Error;
use std::fmt::Write as _;

/// Receives errors for out-of-band reporting.
pub trait ErrorSink {
    /// Records an error. Must not fail or panic.
    fn capture(&self, error: &(dyn Error + 'static));
}

/// Default sink: logs the error and its source chain through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn capture(&self, error: &(dyn Error + 'static)) {
        tracing::error!(error = %error, chain = %error_chain(error), "Captured error");
    }
}

/// Renders an error followed by each `source()` on one line.
#[must_use]
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(out, ": {cause}");
        source = cause.source();
    }
    out
}

/// Reports an error to the sink and returns it unchanged.
pub fn capture<E>(sink: &dyn ErrorSink, error: E) -> E
where
    E: Error + 'static,
{
    sink.capture(&error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;

    #[derive(Default)]
    struct Recording(RefCell<Vec<String>>);

    impl ErrorSink for Recording {
        fn capture(&self, error: &(dyn Error + 'static)) {
            self.0.borrow_mut().push(error.to_string());
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] io::Error);

    #[test]
    fn chain_includes_sources() {
        let err = Outer(io::Error::new(io::ErrorKind::Other, "inner"));
        assert_eq!(error_chain(&err), "outer: inner");
    }

    #[test]
    fn capture_returns_same_error() {
        let sink = Recording::default();
        let err = capture(&sink, Outer(io::Error::new(io::ErrorKind::Other, "inner")));
        assert_eq!(err.0.to_string(), "inner");
        assert_eq!(sink.0.borrow().as_slice(), ["outer"]);
    }
}
