//! Derive macro for pageview views.
//!
//! `#[derive(View)]` turns a struct of widgets into a view: it writes the
//! `Widget`, `View` and `CreateView` impls that bind every field under the
//! view's node in declaration order.
//!
//! ```ignore
//! use pageview::widgets::{Button, Select, TextInput};
//! use pageview::{Node, View};
//!
//! #[derive(View)]
//! #[view(locator = ".//form[@id='credential']", fill_strategy = "wait")]
//! struct CredentialForm {
//!     node: Node,
//!     #[widget(TextInput::by_name("name"))]
//!     name: TextInput,
//!     #[widget(Select::by_id("type"))]
//!     kind: Select,
//!     // nested view bound with its own root locator
//!     details: DetailsView,
//!     // children spliced into this view
//!     #[view(include)]
//!     buttons: FormButtons,
//! }
//! ```
//!
//! # Attributes
//!
//! On the struct, inside `#[view(...)]`:
//!
//! - `locator = <expr>` - root locator (anything convertible into a `Locator`)
//! - `fill_strategy = "wait"` and optionally `wait_timeout_ms = N`
//! - `is_displayed = "method"`, `before_fill = "method"`, `after_fill = "method"`
//!
//! On fields:
//!
//! - `#[widget(<expr>)]` - a declaration bound with `Bind::bind`
//! - `#[view(include)]` - a view created on this view's node whose children are
//!   listed in place of the field; names declared directly on this view win
//! - `#[view(node)]` - the `Node` field (a field called `node` is picked up
//!   without the attribute)
//! - `#[view(skip)]` - not a widget; initialised with `Default::default()`
//!
//! Fields without attributes are nested views bound through
//! `CreateView::placeholder()`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::spanned::Spanned;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, LitInt, LitStr, Type};

/// Derive `Widget`, `View` and `CreateView` for a struct of widgets.
///
/// See the crate documentation for the accepted attributes.
#[proc_macro_derive(View, attributes(view, widget))]
pub fn derive_view(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_view(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// ============================================================================
// Parsed model
// ============================================================================

#[derive(Default)]
struct ViewOptions {
    locator: Option<Expr>,
    wait: bool,
    wait_timeout_ms: Option<u64>,
    is_displayed: Option<Ident>,
    before_fill: Option<Ident>,
    after_fill: Option<Ident>,
}

enum FieldKind {
    Node,
    Widget(Expr),
    Nested,
    Include,
    Skip,
}

struct ViewField {
    ident: Ident,
    ty: Type,
    kind: FieldKind,
}

fn expand_view(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let options = parse_view_options(&input.attrs)?;
    let fields = parse_fields(input)?;
    let node_field = fields
        .iter()
        .find(|f| matches!(f.kind, FieldKind::Node))
        .map(|f| &f.ident)
        .ok_or_else(|| syn::Error::new(input.ident.span(), "a view needs a `node: Node` field or a #[view(node)] field"))?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let widget_impl = widget_impl(&options, node_field);
    let widgets_body = widgets_body(&fields);
    let fill_strategy = fill_strategy(&options);
    let root_locator = match &options.locator {
        Some(locator) => quote! { ::core::option::Option::Some(::pageview::Locator::from(#locator)) },
        None => quote! { ::core::option::Option::None },
    };
    let create_body = create_body(&fields, node_field);

    Ok(quote! {
        impl #impl_generics ::pageview::Widget for #name #ty_generics #where_clause {
            #widget_impl
        }

        impl #impl_generics ::pageview::View for #name #ty_generics #where_clause {
            fn widgets(&self) -> ::std::vec::Vec<(&'static str, &dyn ::pageview::Widget)> {
                #widgets_body
            }

            #fill_strategy
        }

        impl #impl_generics ::pageview::CreateView for #name #ty_generics #where_clause {
            fn root_locator() -> ::core::option::Option<::pageview::Locator> {
                #root_locator
            }

            fn create(node: ::pageview::Node) -> Self {
                #create_body
            }
        }
    })
}

// ============================================================================
// Code generation
// ============================================================================

fn widget_impl(options: &ViewOptions, node_field: &Ident) -> TokenStream2 {
    let is_displayed = options.is_displayed.as_ref().map(|method| {
        quote! {
            fn is_displayed(&self) -> bool {
                self.#method()
            }
        }
    });
    let before_fill = options.before_fill.as_ref().map(|method| {
        quote! {
            fn before_fill(&self, value: &::pageview::__private::Value) -> ::pageview::ViewResult<()> {
                self.#method(value)
            }
        }
    });
    let after_fill = options.after_fill.as_ref().map(|method| {
        quote! {
            fn after_fill(&self, changed: bool) -> ::pageview::ViewResult<bool> {
                self.#method(changed)
            }
        }
    });
    quote! {
        fn node(&self) -> &::pageview::Node {
            &self.#node_field
        }

        fn read(&self) -> ::pageview::ViewResult<::pageview::__private::Value> {
            ::pageview::read_view(self)
        }

        fn fill_value(&self, value: &::pageview::__private::Value) -> ::pageview::ViewResult<bool> {
            ::pageview::fill_view(self, value)
        }

        #is_displayed
        #before_fill
        #after_fill
    }
}

fn widgets_body(fields: &[ViewField]) -> TokenStream2 {
    let own: Vec<String> = fields
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::Widget(_) | FieldKind::Nested))
        .map(|f| widget_name(&f.ident))
        .collect();
    let pushes = fields.iter().filter_map(|field| {
        let ident = &field.ident;
        let name = widget_name(ident);
        match field.kind {
            FieldKind::Widget(_) | FieldKind::Nested => Some(quote! {
                widgets.push((#name, &self.#ident as &dyn ::pageview::Widget));
            }),
            FieldKind::Include => Some(quote! {
                for (name, widget) in ::pageview::View::widgets(&self.#ident) {
                    if !OWN.contains(&name) {
                        widgets.push((name, widget));
                    }
                }
            }),
            FieldKind::Node | FieldKind::Skip => None,
        }
    });
    quote! {
        #[allow(unused)]
        const OWN: &[&str] = &[#(#own),*];
        #[allow(unused_mut, clippy::vec_init_then_push)]
        let mut widgets: ::std::vec::Vec<(&'static str, &dyn ::pageview::Widget)> = ::std::vec::Vec::new();
        #(#pushes)*
        widgets
    }
}

fn fill_strategy(options: &ViewOptions) -> Option<TokenStream2> {
    if !options.wait {
        return None;
    }
    let timeout = match options.wait_timeout_ms {
        Some(ms) => quote! { ::core::option::Option::Some(#ms) },
        None => quote! { ::core::option::Option::None },
    };
    Some(quote! {
        fn fill_strategy(&self) -> ::pageview::FillStrategy {
            ::pageview::FillStrategy::Wait { timeout_ms: #timeout }
        }
    })
}

fn create_body(fields: &[ViewField], node_field: &Ident) -> TokenStream2 {
    let bindings = fields.iter().filter_map(|field| {
        let local = format_ident!("__view_{}", field.ident);
        let name = widget_name(&field.ident);
        let ty = &field.ty;
        let value = match &field.kind {
            FieldKind::Node => return None,
            FieldKind::Widget(expr) => quote! { ::pageview::Bind::bind(#expr, &node, #name) },
            FieldKind::Nested => quote! {
                ::pageview::Bind::bind(<#ty as ::pageview::CreateView>::placeholder(), &node, #name)
            },
            FieldKind::Include => quote! { <#ty as ::pageview::CreateView>::create(node.clone()) },
            FieldKind::Skip => quote! { ::core::default::Default::default() },
        };
        Some(quote! { let #local: #ty = #value; })
    });
    let inits = fields.iter().map(|field| {
        let ident = &field.ident;
        if ident == node_field {
            quote! { #ident: node }
        } else {
            let local = format_ident!("__view_{}", ident);
            quote! { #ident: #local }
        }
    });
    quote! {
        #(#bindings)*
        Self { #(#inits),* }
    }
}

/// Widget name of a field: the identifier without a raw prefix
fn widget_name(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map_or_else(|| name.clone(), ToString::to_string)
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_view_options(attrs: &[Attribute]) -> syn::Result<ViewOptions> {
    let mut options = ViewOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("view")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("locator") {
                options.locator = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("fill_strategy") {
                let strategy: LitStr = meta.value()?.parse()?;
                match strategy.value().as_str() {
                    "wait" => options.wait = true,
                    "eager" => options.wait = false,
                    other => {
                        return Err(meta.error(format!("unknown fill strategy `{other}`, expected \"eager\" or \"wait\"")))
                    }
                }
            } else if meta.path.is_ident("wait_timeout_ms") {
                let ms: LitInt = meta.value()?.parse()?;
                options.wait_timeout_ms = Some(ms.base10_parse()?);
                options.wait = true;
            } else if meta.path.is_ident("is_displayed") {
                options.is_displayed = Some(method_name(&meta)?);
            } else if meta.path.is_ident("before_fill") {
                options.before_fill = Some(method_name(&meta)?);
            } else if meta.path.is_ident("after_fill") {
                options.after_fill = Some(method_name(&meta)?);
            } else {
                return Err(meta.error("unknown view option"));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn method_name(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Ident> {
    let name: LitStr = meta.value()?.parse()?;
    name.parse()
}

fn parse_fields(input: &DeriveInput) -> syn::Result<Vec<ViewField>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "#[derive(View)] only supports structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(data.fields.span(), "#[derive(View)] needs named fields"));
    };
    named
        .named
        .iter()
        .map(|field| {
            let ident = field
                .ident
                .clone()
                .ok_or_else(|| syn::Error::new(field.span(), "unnamed field"))?;
            let kind = field_kind(&field.attrs, &ident)?;
            Ok(ViewField {
                ident,
                ty: field.ty.clone(),
                kind,
            })
        })
        .collect()
}

fn field_kind(attrs: &[Attribute], ident: &Ident) -> syn::Result<FieldKind> {
    let mut kind = None;
    for attr in attrs {
        let parsed = if attr.path().is_ident("widget") {
            FieldKind::Widget(attr.parse_args()?)
        } else if attr.path().is_ident("view") {
            let flag: Ident = attr.parse_args()?;
            match flag.to_string().as_str() {
                "node" => FieldKind::Node,
                "include" => FieldKind::Include,
                "skip" => FieldKind::Skip,
                other => {
                    return Err(syn::Error::new(
                        flag.span(),
                        format!("unknown field option `{other}`, expected node, include or skip"),
                    ))
                }
            }
        } else {
            continue;
        };
        if kind.is_some() {
            return Err(syn::Error::new(attr.span(), "a field takes one #[widget] or #[view] attribute"));
        }
        kind = Some(parsed);
    }
    Ok(kind.unwrap_or_else(|| if ident == "node" { FieldKind::Node } else { FieldKind::Nested }))
}
