use std::borrow::Cow;
use vain_derive::vain_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Missing,
    Broken,
}

#[vain_error(kind = Category)]
pub enum DemoError {
    #[kind(Missing)]
    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[kind(Broken)]
    #[error("I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[kind(Broken)]
    #[error("Internal fault{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn failing_io() -> Result<(), std::io::Error> {
    Err(std::io::Error::other("disk gone"))
}

#[test]
fn test_kind_follows_markers() {
    let err = DemoError::NotFound { message: "a/b".into(), context: None };
    assert_eq!(err.kind(), Category::Missing);

    let err: DemoError = std::io::Error::other("boom").into();
    assert_eq!(err.kind(), Category::Broken);
}

#[test]
fn test_context_is_rendered() {
    let err = failing_io().context("Flushing snapshot").unwrap_err();
    assert_eq!(err.to_string(), "I/O failure (Flushing snapshot): disk gone");

    let err: Result<(), DemoError> =
        Err(DemoError::NotFound { message: "a/b".into(), context: None });
    let err = err.context("lookup").unwrap_err();
    assert_eq!(err.to_string(), "Not found (lookup): a/b");
}

#[test]
fn test_internal_from_strings() {
    let err: DemoError = "bad state".into();
    assert!(matches!(err, DemoError::Internal { .. }));

    let err: DemoError = String::from("worse state").into();
    assert_eq!(err.to_string(), "Internal fault: worse state");
}
