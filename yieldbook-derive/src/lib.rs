use proc_macro::TokenStream;
use syn::{Data, DeriveInput, Fields};

fn impl_from_trait(ast: DeriveInput) -> TokenStream {
    let ident = ast.ident;

    let variants = match ast.data {
        Data::Enum(data) => data.variants,
        Data::Struct(_) => panic!("Structs are not supported by From"),
        Data::Union(_) => panic!("Unions are not supported by From"),
    };

    let mut tokens = quote::quote!();
    for variant in variants {
        let name = variant.ident;
        let ty = match variant.fields {
            Fields::Unnamed(ref fields) if fields.unnamed.len() == 1 => fields.unnamed[0].ty.clone(),
            _ => panic!("From needs every variant to wrap exactly one value, {name} does not"),
        };
        // each wrapped type must be distinct or the impls collide
        tokens.extend(quote::quote! {
            impl From<#ty> for #ident {
                fn from(e: #ty) -> Self {
                    #ident::#name(e)
                }
            }
        });
    }
    tokens.into()
}

/// Implements `From<T>` for every single-field tuple variant `Variant(T)` of an enum.
#[proc_macro_derive(From)]
pub fn from_derive_macro(item: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(item as DeriveInput);
    impl_from_trait(ast)
}
