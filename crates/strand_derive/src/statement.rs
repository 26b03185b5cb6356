use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    DeriveInput, Fields, GenericParam, LitStr, Path, Token, WherePredicate,
    punctuated::Punctuated, spanned::Spanned,
};

pub fn derive_statement(input: DeriveInput) -> TokenStream {
    let fields = match &input.data {
        syn::Data::Struct(data_struct) => &data_struct.fields,
        _ => {
            return syn::Error::new(input.span(), "`Statement` can only be derived for structs")
                .to_compile_error();
        }
    };

    // the forwarded field and its type
    let (forward_access, forward_ty) = match fields {
        Fields::Unnamed(fields_unnamed) => {
            if fields_unnamed.unnamed.len() != 1 {
                return syn::Error::new(
                    fields_unnamed.span(),
                    "tuple structs must have exactly one field",
                )
                .to_compile_error();
            }
            let ty = &fields_unnamed.unnamed[0].ty;
            (quote! { self.0 }, ty.clone())
        }
        Fields::Named(fields_named) => {
            let marked_fields: Vec<_> = fields_named
                .named
                .iter()
                .filter(|f| f.attrs.iter().any(|a| a.path().is_ident("statement")))
                .collect();

            if marked_fields.len() != 1 {
                let msg = match marked_fields.len() {
                    0 => "no field marked with #[statement] attribute",
                    _ => "multiple fields marked with #[statement] attribute",
                };
                return syn::Error::new(fields_named.span(), msg).to_compile_error();
            }

            let field = marked_fields[0];
            let field_ident = &field.ident;
            (quote! { self.#field_ident }, field.ty.clone())
        }
        Fields::Unit => {
            return syn::Error::new(
                input.span(),
                "unit structs are not supported by `Statement` derive",
            )
            .to_compile_error();
        }
    };

    let name = &input.ident;

    let mut crate_name = None;
    let mut user_bounds = Punctuated::<WherePredicate, Token![,]>::new();
    for attr in &input.attrs {
        if !attr.path().is_ident("statement") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                crate_name = Some(s.parse::<Path>()?);
                Ok(())
            } else if meta.path.is_ident("bound") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                let predicates =
                    s.parse_with(Punctuated::<WherePredicate, Token![,]>::parse_terminated)?;
                user_bounds.extend(predicates);
                Ok(())
            } else {
                Err(meta.error("unexpected attribute; supported are `crate` and `bound`"))
            }
        });

        if let Err(err) = result {
            return err.to_compile_error();
        }
    }
    let base_path = match crate_name {
        Some(path) => quote!(#path::loom::statement),
        None => quote!(::strand::loom::statement),
    };

    let (_, ty_generics, _) = input.generics.split_for_impl();

    // the impl is generic over the iteration data as well
    let mut generics = input.generics.clone();
    generics
        .params
        .push(GenericParam::Type(syn::parse_quote!(__D)));
    let where_clause = generics.make_where_clause();
    where_clause
        .predicates
        .push(syn::parse_quote!(__D: #base_path::Data));
    where_clause
        .predicates
        .push(syn::parse_quote!(#forward_ty: #base_path::Statement<__D>));
    where_clause.predicates.extend(user_bounds);

    let (impl_generics, _, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics #base_path::Statement<__D> for #name #ty_generics #where_clause {
            #[inline]
            fn exec(&self, data: &mut __D, active: bool) {
                #base_path::Statement::<__D>::exec(&#forward_access, data, active)
            }

            #[inline]
            fn request(&self, data: &__D, request: &mut #base_path::LaunchRequest) {
                #base_path::Statement::<__D>::request(&#forward_access, data, request)
            }
        }
    }
}
