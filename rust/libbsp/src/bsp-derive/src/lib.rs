extern crate proc_macro;
extern crate quote;
extern crate syn;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

// #[derive(Readable)] implements io::Readable<T> for a record struct T whose body
// reads (in declaration order) all the members of T and returns Ok(T {members})
#[proc_macro_derive(Readable)]
pub fn record_read_fn(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);

    let name = &ast.ident;
    let body = match read_generate_fields(&ast.data) {
        Ok(body) => body,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote! {
        impl Readable<#name> for #name {
            fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<#name> {
                Ok(#name #body)
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

// #[derive(Writable)] implements io::Writable<T> for a record struct T whose body
// writes (in declaration order) all the members of T and returns Ok
#[proc_macro_derive(Writable)]
pub fn record_write_fn(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);

    let name = &ast.ident;
    let body = match write_generate_fields(&ast.data) {
        Ok(body) => body,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote! {
        impl Writable<#name> for #name {
            fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
                #body
                Ok(())
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

// Generate `{ field: <FType as Readable<FType>>::read(from, version)?, ... }` for named
// structs and `( <FType as Readable<FType>>::read(from, version)?, ... )` for tuple structs.
// The qualified form keeps generic and array field types valid in expression position.
fn read_generate_fields(data: &Data) -> syn::Result<TokenStream> {
    match data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => {
                let field_reads = fields.named.iter().map(|f| {
                    let name = &f.ident;
                    let ftype = &f.ty;
                    quote! {
                        #name: <#ftype as Readable<#ftype>>::read(from, version)?
                    }
                });
                Ok(quote! {
                    { #(#field_reads, )* }
                })
            }
            Fields::Unnamed(ref fields) => {
                let field_reads = fields.unnamed.iter().map(|f| {
                    let ftype = &f.ty;
                    quote! {
                        <#ftype as Readable<#ftype>>::read(from, version)?
                    }
                });
                Ok(quote! {
                    ( #(#field_reads, )* )
                })
            }
            Fields::Unit => Ok(quote! {}),
        },
        Data::Enum(ref e) => Err(syn::Error::new(
            e.enum_token.span,
            "Readable can only be derived for structs",
        )),
        Data::Union(ref u) => Err(syn::Error::new(
            u.union_token.span,
            "Readable can only be derived for structs",
        )),
    }
}

// Generate `self.field.write(to, version)?;` for each field.
fn write_generate_fields(data: &Data) -> syn::Result<TokenStream> {
    match data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => {
                let field_writes = fields.named.iter().map(|f| {
                    let name = &f.ident;
                    quote! {
                        self.#name.write(to, version)?
                    }
                });
                Ok(quote! {
                    #(#field_writes;)*
                })
            }
            Fields::Unnamed(ref fields) => {
                let field_writes = fields.unnamed.iter().enumerate().map(|(i, _)| {
                    let index = syn::Index::from(i);
                    quote! {
                        self.#index.write(to, version)?
                    }
                });
                Ok(quote! {
                    #(#field_writes;)*
                })
            }
            Fields::Unit => Ok(quote! {}),
        },
        Data::Enum(ref e) => Err(syn::Error::new(
            e.enum_token.span,
            "Writable can only be derived for structs",
        )),
        Data::Union(ref u) => Err(syn::Error::new(
            u.union_token.span,
            "Writable can only be derived for structs",
        )),
    }
}
