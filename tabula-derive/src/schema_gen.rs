use crate::attrs::{ContainerAttrs, FieldAttrs, OnDelete};
use crate::type_utils::{field_name, infer_kind, unwrap_option, Kind};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, Result};

pub struct Expanded {
    pub schema: TokenStream,
    /// The `#[tabula(meta)]` field, if any.
    pub meta: Option<Ident>,
}

pub fn expand_schema(input: &DeriveInput) -> Result<Expanded> {
    let container = ContainerAttrs::parse(&input.attrs)?;
    let ident = &input.ident;
    let name = container.name.unwrap_or_else(|| ident.to_string());

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(ident, "tabula schemas must be structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(ident, "tabula schemas need named fields"));
    };

    let mut meta = None;
    let mut statements = Vec::new();
    for field in &fields.named {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        let Some(field_ident) = &field.ident else {
            continue;
        };
        if attrs.skip {
            continue;
        }
        if attrs.meta {
            if meta.is_some() {
                return Err(syn::Error::new_spanned(field_ident, "only one #[tabula(meta)] field is allowed"));
            }
            meta = Some(field_ident.clone());
            continue;
        }
        if attrs.mixin {
            let ty = &field.ty;
            let designated = attrs.designated;
            statements.push(quote! { fields.mixin::<#ty>(#designated); });
            continue;
        }
        statements.push(field_statement(field_ident, &field.ty, &attrs)?);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let schema = quote! {
        impl #impl_generics ::tabula::Schema for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;

            fn describe(fields: &mut ::tabula::FieldSet) {
                #(#statements)*
            }
        }
    };
    Ok(Expanded { schema, meta })
}

fn field_statement(ident: &Ident, ty: &syn::Type, attrs: &FieldAttrs) -> Result<TokenStream> {
    let name = attrs.rename.clone().unwrap_or_else(|| field_name(ident));
    let (inner, optional) = unwrap_option(ty);

    let field_type = match (&attrs.variant, &attrs.discriminant) {
        (Some(set), Some(discriminant)) => quote! {
            ::tabula::FieldType::Variant { set: #set, discriminant: #discriminant }
        },
        (Some(_), None) | (None, Some(_)) => {
            return Err(syn::Error::new_spanned(
                ident,
                "variant fields need both `variant` and `discriminant`",
            ))
        }
        (None, None) => match &attrs.foreign {
            Some(foreign) => Kind::Foreign(foreign.clone()).to_tokens(),
            None => infer_kind(inner)
                .ok_or_else(|| {
                    syn::Error::new_spanned(ty, "cannot infer a field type; add #[tabula(foreign = \"...\")]")
                })?
                .to_tokens(),
        },
    };

    let mut modifiers = Vec::new();
    if optional || attrs.nullable {
        modifiers.push(quote! { .nullable() });
    }
    if attrs.unique {
        modifiers.push(quote! { .unique() });
    }
    if let Some(inherit) = attrs.inherit {
        modifiers.push(quote! { .inherit(#inherit) });
    }
    if let Some(inline) = attrs.inline {
        modifiers.push(quote! { .inlineable(#inline) });
    }
    if let Some(default) = &attrs.migration_default {
        modifiers.push(quote! { .migration_default(#default) });
    }
    match (&attrs.references, attrs.on_delete) {
        (Some(target), on_delete) => {
            let policy = match on_delete.unwrap_or(OnDelete::Restrict) {
                OnDelete::Cascade => quote! { ::tabula::OnDelete::Cascade },
                OnDelete::SetNull => quote! { ::tabula::OnDelete::SetNull },
                OnDelete::Restrict => quote! { ::tabula::OnDelete::Restrict },
            };
            modifiers.push(quote! { .references(#target, #policy) });
        }
        (None, Some(_)) => {
            return Err(syn::Error::new_spanned(ident, "on_delete requires references"));
        }
        (None, None) => {}
    }

    Ok(quote! {
        fields.field(::tabula::FieldDescriptor::new(#name, #field_type) #(#modifiers)*);
    })
}

pub fn expand_model(input: &DeriveInput) -> Result<TokenStream> {
    let Expanded { schema, meta } = expand_schema(input)?;
    let ident = &input.ident;
    let meta = meta.ok_or_else(|| {
        syn::Error::new_spanned(
            ident,
            "models need a `#[tabula(meta)]` field of type tabula::ModelMeta",
        )
    })?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #schema

        impl #impl_generics ::tabula::Model for #ident #ty_generics #where_clause {
            fn meta(&self) -> &::tabula::ModelMeta {
                &self.#meta
            }

            fn meta_mut(&mut self) -> &mut ::tabula::ModelMeta {
                &mut self.#meta
            }
        }
    })
}
