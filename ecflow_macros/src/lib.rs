//! Derive macros for `ecflow`'s marker traits.
//!
//! There's no attribute macro for system filters or scheduling metadata --
//! that's all assembled at runtime through `SystemDescriptor`'s builder
//! methods, since world construction takes an explicit, ordered system
//! list instead of scanning loaded code for implementors (see
//! `DESIGN.md`, "reflection-based discovery"). These two derives just
//! paste in the boilerplate impl for types that don't need any custom
//! behavior out of `Component` or `Message`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Derive a no-op `Component` impl: no handlers, default registry
/// placement, no carrier interface.
#[proc_macro_derive(Component)]
pub fn derive_component(input: TokenStream) -> TokenStream {
  let input = parse_macro_input!(input as DeriveInput);
  let struct_name = input.ident;
  let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

  let expanded = quote! {
    impl #impl_generics ::ecflow::component::Component for #struct_name #ty_generics #where_clause {}
  };

  TokenStream::from(expanded)
}

/// Derive a no-op `Message` impl.
#[proc_macro_derive(Message)]
pub fn derive_message(input: TokenStream) -> TokenStream {
  let input = parse_macro_input!(input as DeriveInput);
  let struct_name = input.ident;
  let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

  let expanded = quote! {
    impl #impl_generics ::ecflow::message::Message for #struct_name #ty_generics #where_clause {}
  };

  TokenStream::from(expanded)
}
