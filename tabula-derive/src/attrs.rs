use syn::{Attribute, Lit, LitStr, Result};

/// Struct-level `#[tabula(...)]` options.
#[derive(Debug, Default)]
pub struct ContainerAttrs {
    pub name: Option<String>,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = ContainerAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("tabula")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    out.name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unknown tabula container attribute"))
                }
            })?;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

/// Field-level `#[tabula(...)]` options.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    pub meta: bool,
    pub skip: bool,
    pub mixin: bool,
    pub designated: bool,
    pub rename: Option<String>,
    pub unique: bool,
    pub nullable: bool,
    pub inherit: Option<bool>,
    pub inline: Option<bool>,
    pub foreign: Option<String>,
    pub variant: Option<String>,
    pub discriminant: Option<String>,
    pub references: Option<String>,
    pub on_delete: Option<OnDelete>,
    pub migration_default: Option<Lit>,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut out = FieldAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("tabula")) {
            attr.parse_nested_meta(|meta| {
                let path = &meta.path;
                if path.is_ident("meta") {
                    out.meta = true;
                } else if path.is_ident("skip") {
                    out.skip = true;
                } else if path.is_ident("mixin") {
                    out.mixin = true;
                } else if path.is_ident("designated") {
                    out.designated = true;
                } else if path.is_ident("unique") {
                    out.unique = true;
                } else if path.is_ident("nullable") {
                    out.nullable = true;
                } else if path.is_ident("rename") {
                    out.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if path.is_ident("inherit") {
                    out.inherit = Some(meta.value()?.parse::<syn::LitBool>()?.value);
                } else if path.is_ident("inline") {
                    out.inline = Some(meta.value()?.parse::<syn::LitBool>()?.value);
                } else if path.is_ident("foreign") {
                    out.foreign = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if path.is_ident("variant") {
                    out.variant = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if path.is_ident("discriminant") {
                    out.discriminant = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if path.is_ident("references") {
                    out.references = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if path.is_ident("on_delete") {
                    let value: LitStr = meta.value()?.parse()?;
                    out.on_delete = Some(match value.value().as_str() {
                        "cascade" => OnDelete::Cascade,
                        "set_null" => OnDelete::SetNull,
                        "restrict" => OnDelete::Restrict,
                        _ => {
                            return Err(syn::Error::new(
                                value.span(),
                                "on_delete must be \"cascade\", \"set_null\" or \"restrict\"",
                            ))
                        }
                    });
                } else if path.is_ident("migration_default") {
                    out.migration_default = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("unknown tabula field attribute"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}
