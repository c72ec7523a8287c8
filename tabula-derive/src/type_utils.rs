use heck::ToLowerCamelCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Semantic kind inferred from a Rust field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Uuid,
    String,
    Bool,
    Int,
    Long,
    Double,
    Float,
    Timestamp,
    /// Not directly storable; looked up among registered transformers.
    Foreign(String),
}

impl Kind {
    pub fn to_tokens(&self) -> TokenStream {
        match self {
            Kind::Uuid => quote! { ::tabula::FieldType::Uuid },
            Kind::String => quote! { ::tabula::FieldType::String },
            Kind::Bool => quote! { ::tabula::FieldType::Bool },
            Kind::Int => quote! { ::tabula::FieldType::Int },
            Kind::Long => quote! { ::tabula::FieldType::Long },
            Kind::Double => quote! { ::tabula::FieldType::Double },
            Kind::Float => quote! { ::tabula::FieldType::Float },
            Kind::Timestamp => quote! { ::tabula::FieldType::Timestamp },
            Kind::Foreign(name) => quote! { ::tabula::FieldType::Foreign(#name) },
        }
    }
}

/// `Option<T>` yields `T` and `true`.
pub fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Some((ident, inner)) = last_segment(ty) {
        if ident == "Option" {
            if let Some(inner) = inner {
                return (inner, true);
            }
        }
    }
    (ty, false)
}

pub fn infer_kind(ty: &Type) -> Option<Kind> {
    let (ident, _) = last_segment(ty)?;
    Some(match ident.as_str() {
        "Uuid" => Kind::Uuid,
        "String" | "str" => Kind::String,
        "bool" => Kind::Bool,
        "i8" | "i16" | "i32" | "u8" | "u16" => Kind::Int,
        "i64" | "u32" => Kind::Long,
        "f64" => Kind::Double,
        "f32" => Kind::Float,
        "DateTime" => Kind::Timestamp,
        other => Kind::Foreign(other.to_string()),
    })
}

/// Serde camelCase name of a Rust field identifier.
pub fn field_name(ident: &syn::Ident) -> String {
    let raw = ident.to_string();
    raw.trim_start_matches("r#").to_lower_camel_case()
}

fn last_segment(ty: &Type) -> Option<(String, Option<&Type>)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let inner = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    };
    Some((segment.ident.to_string(), inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_primitive_kinds() {
        let cases: Vec<(Type, Kind)> = vec![
            (parse_quote!(uuid::Uuid), Kind::Uuid),
            (parse_quote!(String), Kind::String),
            (parse_quote!(bool), Kind::Bool),
            (parse_quote!(i32), Kind::Int),
            (parse_quote!(i64), Kind::Long),
            (parse_quote!(f64), Kind::Double),
            (parse_quote!(f32), Kind::Float),
            (parse_quote!(chrono::DateTime<chrono::Utc>), Kind::Timestamp),
        ];
        for (ty, kind) in cases {
            assert_eq!(infer_kind(&ty), Some(kind));
        }
    }

    #[test]
    fn test_unknown_types_are_foreign() {
        let ty: Type = parse_quote!(crate::geo::Location);
        assert_eq!(infer_kind(&ty), Some(Kind::Foreign("Location".into())));
    }

    #[test]
    fn test_option_is_nullable() {
        let ty: Type = parse_quote!(Option<i32>);
        let (inner, nullable) = unwrap_option(&ty);
        assert!(nullable);
        assert_eq!(infer_kind(inner), Some(Kind::Int));

        let ty: Type = parse_quote!(String);
        assert!(!unwrap_option(&ty).1);
    }

    #[test]
    fn test_field_names() {
        let ident: syn::Ident = parse_quote!(spawn_point);
        assert_eq!(field_name(&ident), "spawnPoint");
        let ident: syn::Ident = syn::parse_str("r#type").unwrap();
        assert_eq!(field_name(&ident), "type");
    }
}
