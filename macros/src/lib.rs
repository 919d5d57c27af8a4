//! Procedural macros for testing the strata crates.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, AttributeArgs, Error, ItemFn, Lit, Meta, NestedMeta};

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Parses the optional log level of [test_traced].
///
/// Accepts nothing, a bare string (`"DEBUG"`), or `level = "DEBUG"`.
fn parse_level(args: AttributeArgs) -> Result<proc_macro2::Ident, Error> {
    let level = match args.as_slice() {
        [] => return Ok(proc_macro2::Ident::new("DEBUG", Span::call_site())),
        [NestedMeta::Lit(Lit::Str(level))] => level.clone(),
        [NestedMeta::Meta(Meta::NameValue(pair))] if pair.path.is_ident("level") => {
            match &pair.lit {
                Lit::Str(level) => level.clone(),
                other => return Err(Error::new_spanned(other, "level must be a string")),
            }
        }
        [first, ..] => {
            return Err(Error::new_spanned(
                first,
                "expected a log level such as \"DEBUG\" or level = \"DEBUG\"",
            ))
        }
    };
    let value = level.value().to_uppercase();
    if !LEVELS.contains(&value.as_str()) {
        return Err(Error::new_spanned(
            &level,
            format!("unknown log level, expected one of {LEVELS:?}"),
        ));
    }
    Ok(proc_macro2::Ident::new(&value, level.span()))
}

/// Run a test with a `tracing` subscriber that writes to the test output.
///
/// The subscriber records events at the given level and above (`DEBUG` when omitted) and is
/// installed only for the duration of the test. Crates using this macro must depend on `tracing`
/// and `tracing-subscriber`.
///
/// # Example
/// ```rust,ignore
/// use strata_macros::test_traced;
///
/// #[test_traced("INFO")]
/// fn test_with_logs() {
///     tracing::info!("visible with --nocapture");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input = parse_macro_input!(item as ItemFn);
    let level = match parse_level(args) {
        Ok(level) => level,
        Err(err) => return err.to_compile_error().into(),
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let body = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let subscriber = ::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(::tracing::Level::#level)
                .with_line_number(true)
                .finish();
            let _guard = ::tracing::subscriber::set_default(subscriber);
            #body
        }
    };
    TokenStream::from(expanded)
}
