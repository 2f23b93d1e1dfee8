//! Common helpers shared by the compiler crates: option-string parsing and
//! error reporting. Re-exports `thiserror` so dependent crates derive their
//! error types against one version.

use std::fmt::Display;

use backtrace::Backtrace;

pub use ahash;
pub use thiserror;

///Splits a comma separated option string (e.g. a disable-pass list) into a
/// set of names. Empty segments are dropped, so trailing commas and empty
/// strings are harmless.
pub fn split_string_into_set(list: &str) -> ahash::AHashSet<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_owned())
        .collect()
}

///Wraps an error with an optionally captured backtrace. Capture is gated by
/// the `FORMA_BACKTRACE` env var, since walking the stack is expensive and
/// only interesting when hunting an internal compiler error.
#[derive(Debug)]
pub struct ReportedError<E: std::error::Error> {
    pub source: E,
    pub backtrace: Option<Backtrace>,
}

impl<E: std::error::Error> ReportedError<E> {
    pub fn new(source: E) -> Self {
        ReportedError {
            source,
            backtrace: if std::env::var("FORMA_BACKTRACE").is_ok() {
                Some(Backtrace::new())
            } else {
                None
            },
        }
    }
}

impl<E: std::error::Error> Display for ReportedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(bt) = &self.backtrace {
            write!(f, "\nBacktrace:\n{:?}", bt)
        } else {
            write!(
                f,
                "\n`FORMA_BACKTRACE=1` to print the backtrace of the error occurrence"
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::split_string_into_set;

    #[test]
    fn split_handles_empty_and_trailing() {
        assert!(split_string_into_set("").is_empty());
        let set = split_string_into_set("a,b,,c,");
        assert_eq!(set.len(), 3);
        assert!(set.contains("a") && set.contains("b") && set.contains("c"));
    }
}
