use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod statement;

/// Forwards `Statement` to the single field of a newtype, or to the field marked `#[statement]`.
///
/// Supports `#[statement(crate = "...")]` to override the path of the runtime crate and
/// `#[statement(bound = "...")]` to add predicates to the generated impl.
#[proc_macro_derive(Statement, attributes(statement))]
pub fn derive_statement(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = statement::derive_statement(input);
    expanded.into()
}
