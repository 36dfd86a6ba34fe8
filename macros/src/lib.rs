//! Procedural macros for testing wireform crates.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, AttributeArgs, Ident, ItemFn, Lit, LitStr, Meta, NestedMeta};

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

fn parse_level(literal: &LitStr) -> Result<Ident, syn::Error> {
    let level = literal.value().to_uppercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(syn::Error::new(
            literal.span(),
            format!("unknown log level `{}`; expected one of {:?}", literal.value(), LEVELS),
        ));
    }
    Ok(Ident::new(&level, Span::call_site()))
}

fn parse_args(args: AttributeArgs) -> Result<Ident, syn::Error> {
    let mut level = Ident::new("DEBUG", Span::call_site());
    for arg in args {
        match arg {
            NestedMeta::Lit(Lit::Str(literal)) => level = parse_level(&literal)?,
            NestedMeta::Meta(Meta::NameValue(pair)) if pair.path.is_ident("level") => {
                match &pair.lit {
                    Lit::Str(literal) => level = parse_level(literal)?,
                    other => return Err(syn::Error::new_spanned(other, "expected a string")),
                }
            }
            other => return Err(syn::Error::new_spanned(other, "unsupported argument")),
        }
    }
    Ok(level)
}

/// Run a test with a `tracing` subscriber that writes to the test harness output.
///
/// The optional argument sets the most verbose level shown (`DEBUG` if omitted).
///
/// # Example
///
/// ```ignore
/// use wireform_macros::test_traced;
///
/// #[test_traced("INFO")]
/// fn test_decode() {
///     tracing::info!("shown");
///     tracing::debug!("hidden");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input = parse_macro_input!(item as ItemFn);
    let level = match parse_args(args) {
        Ok(level) => level,
        Err(err) => return err.to_compile_error().into(),
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let subscriber = ::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(::tracing::Level::#level)
                .with_line_number(true)
                .finish();
            let dispatcher = ::tracing::Dispatch::new(subscriber);
            ::tracing::dispatcher::with_default(&dispatcher, || #block)
        }
    };
    TokenStream::from(expanded)
}
