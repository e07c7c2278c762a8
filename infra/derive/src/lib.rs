#![allow(unreachable_pub)]

//! # Derive
//!
//! Procedural macros shared by the workspace crates.
//!
//! The only macro today is [`vain_error`], which turns a plain enum into a fully wired
//! error type: `thiserror` display/source plumbing, a `.context(...)` extension trait,
//! `From` conversions for wrapped upstream errors, and an optional status category
//! accessor used by the HTTP boundary.

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for declaring a crate's error enum.
///
/// # Generated items
///
/// * `#[derive(Debug, thiserror::Error)]`, unless already derived.
/// * `<Name>Ext<T>` trait with `.context(...)` for `Result<T, Name>` and, for every variant
///   wrapping a `source`, for `Result<T, Source>` as well.
/// * `From<Source>` for every variant with a `source` field.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * With `kind = path::To::Kind`, a `pub const fn kind(&self) -> Kind` built from the
///   `#[kind(Variant)]` attribute every variant must carry.
///
/// # Requirements
///
/// * Only enums with named-field variants are accepted.
/// * Context fields are spelled `context: Option<Cow<'static, str>>`.
/// * A variant wrapping a source must also carry a context field.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum ErrorKind { NotFound, Persistence }
///
/// #[vain_derive::vain_error(kind = ErrorKind)]
/// pub enum StoreError {
///     #[kind(NotFound)]
///     #[error("Missing{}: {message}", format_context(.context))]
///     NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[kind(Persistence)]
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
/// }
///
/// fn read() -> Result<Vec<u8>, StoreError> {
///     std::fs::read("state.json").context("Reading snapshot")
/// }
/// ```
#[proc_macro_attribute]
pub fn vain_error(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as error::ErrorArgs);
    let input = parse_macro_input!(item as DeriveInput);
    error::expand(args, input).into()
}
