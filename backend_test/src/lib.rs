use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat,
    PathArguments, Signature, Type,
};

/// Roles a test may sign in as.
const ROLES: [&str; 4] = ["voter", "inspector", "admin", "developer"];

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the data directory is removed regardless of how the test
/// terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::model::store::Store<T>`]. An optional role argument, e.g.
/// `#[backend_test(admin)]`, signs the client in as `test-admin` holding
/// that role on top of `voter`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (call_args, store_idents, store_types) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Sign the client in if a role was requested.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(role) if ROLES.contains(&role.to_string().as_str()) => {
            let username = format!("test-{role}");
            let variant = format_ident!("{}", capitalise(&role.to_string()));
            quote! {
                crate::test_login(
                    &rocket_client,
                    #username,
                    &[
                        crate::model::common::role::Role::Voter,
                        crate::model::common::role::Role::#variant,
                    ],
                )
                .await;
            }
        }
        Some(other) => {
            return syn::Error::new(
                other.span(),
                format!("Expected one of {}", ROLES.join(", ")),
            )
            .into_compile_error()
            .into();
        }
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(data_dir: &std::path::Path) -> rocket::local::asynchronous::Client {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["univote_backend"],
                    None,
                    None,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_data_dir(data_dir),
                )
                .await
                .unwrap();

                #maybe_login

                rocket_client
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            fn cleanup(data_dir: &std::path::Path) {
                if let Err(err) = std::fs::remove_dir_all(data_dir) {
                    eprintln!("Failed to remove {}: {err}", data_dir.display());
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let data_dir = crate::test_data_dir();
            let rocket_client = outer_runtime.block_on(setup(&data_dir));

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #store_idents = rocket_client
                        .rocket()
                        .state::<crate::model::store::Store<#store_types>>()
                        .expect("store is managed")
                        .clone();
                )*

                runtime.block_on(#new_name(#(#call_args),*));
            });

            // Run the cleanup.
            cleanup(&data_dir);

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
/// Returns the call arguments in declaration order, plus the stores to fetch.
#[allow(clippy::type_complexity)]
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Vec<Ident>, Vec<Type>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut args = vec![];
    let mut store_idents = vec![];
    let mut store_types = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                                ));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        }
                    } else if let Some(last) = type_path.path.segments.last() {
                        // Valid as the last path segment for any type is itself.
                        if last.ident == "Store" {
                            if let PathArguments::AngleBracketed(generics) = &last.arguments {
                                if let Some(GenericArgument::Type(document)) = generics.args.first()
                                {
                                    let ident = pat_ident.ident.clone();
                                    args.push(quote! { #ident });
                                    store_idents.push(ident);
                                    store_types.push(document.clone());
                                    continue;
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: Store<T>`",
        ));
    }

    Ok((args, store_idents, store_types))
}
