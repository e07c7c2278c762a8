use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Data, DeriveInput, Fields, Ident, Path, Token, Type, Variant};

/// Arguments accepted by `#[vain_error(...)]`.
pub(crate) struct ErrorArgs {
    kind: Option<Path>,
}

impl Parse for ErrorArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(Self { kind: None });
        }

        let key: Ident = input.parse()?;
        if key != "kind" {
            return Err(syn::Error::new_spanned(key, "expected `kind = <path to category enum>`"));
        }
        input.parse::<Token![=]>()?;
        let kind: Path = input.parse()?;
        Ok(Self { kind: Some(kind) })
    }
}

struct VariantMeta {
    ident: Ident,
    source: Option<(Ident, Type)>,
    has_context: bool,
    kind: Option<Ident>,
    cfg_attrs: Vec<Attribute>,
}

impl VariantMeta {
    /// Reads the variant and strips the `#[kind(..)]` marker, which is not a real attribute.
    fn take(variant: &mut Variant) -> syn::Result<Self> {
        let (markers, kept): (Vec<Attribute>, Vec<Attribute>) =
            std::mem::take(&mut variant.attrs).into_iter().partition(|a| a.path().is_ident("kind"));
        variant.attrs = kept;

        let kind = match markers.as_slice() {
            [] => None,
            [single] => Some(single.parse_args::<Ident>()?),
            [_, extra, ..] => {
                return Err(syn::Error::new_spanned(extra, "duplicate #[kind(..)] marker"));
            },
        };

        let Fields::Named(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "vain_error requires named fields so source/context can be wired",
            ));
        };

        let mut has_context = false;
        let mut source = None;
        for field in &fields.named {
            let Some(ident) = &field.ident else { continue };
            if ident == "context" {
                if !is_context_type(&field.ty) {
                    return Err(syn::Error::new_spanned(
                        &field.ty,
                        "context field must be Option<Cow<'static, str>>",
                    ));
                }
                has_context = true;
            } else if ident == "source" || has_attr(&field.attrs, "source") || has_attr(&field.attrs, "from")
            {
                source = Some((ident.clone(), field.ty.clone()));
            }
        }

        if source.is_some() && !has_context {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "variants wrapping a source need `context: Option<Cow<'static, str>>`",
            ));
        }

        let cfg_attrs = variant.attrs.iter().filter(|a| a.path().is_ident("cfg")).cloned().collect();

        Ok(Self { ident: variant.ident.clone(), source, has_context, kind, cfg_attrs })
    }
}

pub(crate) fn expand(args: ErrorArgs, mut input: DeriveInput) -> TokenStream {
    let name = input.ident.clone();
    let ext = format_ident!("{}Ext", name);

    let Data::Enum(data) = &mut input.data else {
        return syn::Error::new_spanned(&input.ident, "vain_error can only be applied to enums")
            .to_compile_error();
    };

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &mut data.variants {
        match VariantMeta::take(variant) {
            Ok(meta) => variants.push(meta),
            Err(err) => return err.to_compile_error(),
        }
    }

    let derives = missing_derives(&input.attrs);
    let context_trait = context_trait(&name, &ext, &variants);
    let from_impls = variants.iter().filter_map(|v| from_impl(&name, &ext, v));
    let internal_impls = internal_impls(&name, &variants);
    let kind_impl = match kind_impl(&name, args.kind.as_ref(), &variants) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error(),
    };

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #context_trait
        #(#from_impls)*
        #internal_impls
        #kind_impl

        #[allow(dead_code)]
        fn format_context(
            context: &Option<std::borrow::Cow<'static, str>>,
        ) -> std::borrow::Cow<'static, str> {
            context
                .as_ref()
                .map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
        }
    }
}

fn missing_derives(attrs: &[Attribute]) -> TokenStream {
    let mut has_debug = false;
    let mut has_error = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                has_debug |= last.ident == "Debug";
                has_error |= last.ident == "Error";
            }
            Ok(())
        });
    }

    let mut derives = Vec::new();
    if !has_debug {
        derives.push(quote! { Debug });
    }
    if !has_error {
        derives.push(quote! { ::thiserror::Error });
    }
    if derives.is_empty() { quote! {} } else { quote! { #[derive(#(#derives),*)] } }
}

fn context_trait(name: &Ident, ext: &Ident, variants: &[VariantMeta]) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let ident = &v.ident;
        let cfg_attrs = &v.cfg_attrs;
        quote! { #(#cfg_attrs)* #name::#ident { context: slot, .. } => *slot = Some(context.into()), }
    });

    quote! {
        pub trait #ext<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut err| {
                    match &mut err {
                        #(#arms)*
                        #[allow(unreachable_patterns)]
                        _ => {},
                    }
                    err
                })
            }
        }
    }
}

fn from_impl(name: &Ident, ext: &Ident, v: &VariantMeta) -> Option<TokenStream> {
    if v.ident == "Internal" {
        return None;
    }
    let (field, ty) = v.source.as_ref()?;
    let ident = &v.ident;
    let cfg_attrs = &v.cfg_attrs;

    Some(quote! {
        #(#cfg_attrs)*
        #[automatically_derived]
        impl From<#ty> for #name {
            #[inline]
            fn from(#field: #ty) -> Self {
                Self::#ident { #field, context: None }
            }
        }

        #(#cfg_attrs)*
        impl<T> #ext<T> for std::result::Result<T, #ty> {
            #[inline]
            fn context(
                self,
                context: impl Into<std::borrow::Cow<'static, str>>,
            ) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
            }
        }
    })
}

fn internal_impls(name: &Ident, variants: &[VariantMeta]) -> TokenStream {
    let Some(internal) = variants.iter().find(|v| v.ident == "Internal") else {
        return quote! {};
    };
    let cfg_attrs = &internal.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self {
                Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None }
            }
        }

        #(#cfg_attrs)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self {
                Self::Internal { message: std::borrow::Cow::Owned(s), context: None }
            }
        }
    }
}

fn kind_impl(name: &Ident, kind: Option<&Path>, variants: &[VariantMeta]) -> syn::Result<TokenStream> {
    let Some(kind) = kind else {
        if let Some(stray) = variants.iter().find(|v| v.kind.is_some()) {
            return Err(syn::Error::new_spanned(
                &stray.ident,
                "#[kind(..)] needs #[vain_error(kind = <path>)] on the enum",
            ));
        }
        return Ok(quote! {});
    };

    let mut arms = Vec::with_capacity(variants.len());
    for v in variants {
        let Some(category) = &v.kind else {
            return Err(syn::Error::new_spanned(&v.ident, "missing #[kind(..)] marker"));
        };
        let ident = &v.ident;
        let cfg_attrs = &v.cfg_attrs;
        arms.push(quote! { #(#cfg_attrs)* Self::#ident { .. } => #kind::#category, });
    }

    Ok(quote! {
        #[automatically_derived]
        impl #name {
            /// Stable category of this error, independent of its message.
            #[must_use]
            pub const fn kind(&self) -> #kind {
                match self {
                    #(#arms)*
                }
            }
        }
    })
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|a| a.path().is_ident(name))
}

fn is_context_type(ty: &Type) -> bool {
    let rendered: String = quote!(#ty).to_string().chars().filter(|c| !c.is_whitespace()).collect();
    (rendered.starts_with("Option<") || rendered.starts_with("std::option::Option<"))
        && rendered.ends_with("Cow<'static,str>>")
}
