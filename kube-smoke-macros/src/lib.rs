//! Proc macros for kube-smoke
//!
//! Provides the `#[kube_smoke::test]` attribute for tests that run against a
//! live cluster.

use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, ItemFn, Pat, PatType};

/// Attribute macro for cluster smoke tests.
///
/// Wraps the function in `#[tokio::test]`, routes `tracing` output through the
/// test harness, and, when the function takes a parameter named `cluster`,
/// connects a `kube_smoke::Cluster` from the ambient kubeconfig and injects
/// it.
///
/// # Example
///
/// ```ignore
/// use kube_smoke::Cluster;
///
/// #[kube_smoke::test]
/// #[ignore] // Requires real cluster
/// async fn test_api_working(cluster: Cluster) {
///     let nodes = kube_smoke::checks::api_working(&cluster).await.unwrap();
///     assert!(nodes >= 1);
/// }
/// ```
///
/// # With Result Return Type
///
/// ```ignore
/// #[kube_smoke::test]
/// async fn test_pods(cluster: Cluster) -> Result<(), Box<dyn std::error::Error>> {
///     kube_smoke::checks::api_working(&cluster).await?;
///     Ok(())
/// }
/// ```
///
/// A connection failure panics before the body runs, so it shows up as a
/// failed test rather than being mistaken for an assertion in the body.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = syn::parse_macro_input!(item as ItemFn);
    test_impl(&input_fn).into()
}

/// Check if a function has a parameter named "cluster"
fn has_cluster_param(input_fn: &ItemFn) -> bool {
    input_fn.sig.inputs.iter().any(|arg| {
        if let FnArg::Typed(PatType { pat, .. }) = arg {
            if let Pat::Ident(ident) = pat.as_ref() {
                return ident.ident == "cluster";
            }
        }
        false
    })
}

/// Inner implementation that works with `proc_macro2` types for testability
fn test_impl(input_fn: &ItemFn) -> proc_macro2::TokenStream {
    let fn_name = &input_fn.sig.ident;
    let fn_block = &input_fn.block;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;
    let fn_output = &input_fn.sig.output;

    let connect = if has_cluster_param(input_fn) {
        quote! {
            let cluster = ::kube_smoke::Cluster::connect()
                .await
                .unwrap_or_else(|e| panic!("Failed to connect to cluster: {}", e));
        }
    } else {
        quote! {}
    };

    quote! {
        #(#fn_attrs)*
        #[tokio::test]
        #fn_vis async fn #fn_name() #fn_output {
            ::kube_smoke::telemetry::init_test_logging();
            #connect
            #fn_block
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{has_cluster_param, test_impl};
    use syn::ItemFn;

    fn parse_fn(code: &str) -> ItemFn {
        syn::parse_str(code).expect("Failed to parse test function")
    }

    #[test]
    fn test_has_cluster_param_with_cluster() {
        let f = parse_fn("async fn test_it(cluster: Cluster) {}");
        assert!(has_cluster_param(&f));
    }

    #[test]
    fn test_has_cluster_param_without_cluster() {
        let f = parse_fn("async fn test_it() {}");
        assert!(!has_cluster_param(&f));
    }

    #[test]
    fn test_has_cluster_param_different_name() {
        let f = parse_fn("async fn test_it(kube: Cluster) {}");
        assert!(!has_cluster_param(&f), "Only 'cluster' name should match");
    }

    #[test]
    fn test_impl_with_cluster_connects() {
        let f = parse_fn("async fn test_nodes(cluster: Cluster) { check(&cluster).await; }");
        let output = test_impl(&f).to_string();

        assert!(output.contains("Cluster :: connect"), "Should connect a Cluster");
        assert!(output.contains("tokio :: test"), "Should have tokio::test");
        assert!(output.contains("init_test_logging"), "Should set up logging");
        assert!(
            output.contains("async fn test_nodes ()"),
            "Generated test should take no parameters"
        );
    }

    #[test]
    fn test_impl_keeps_result_return_type() {
        let f = parse_fn(
            "async fn test_nodes(cluster: Cluster) -> Result<(), Box<dyn std::error::Error>> { Ok(()) }",
        );
        let output = test_impl(&f).to_string();

        assert!(output.contains("-> Result"), "Should keep the return type");
    }

    #[test]
    fn test_impl_without_cluster_generates_simple_wrapper() {
        let f = parse_fn("async fn test_simple() { assert!(true); }");
        let output = test_impl(&f).to_string();

        assert!(output.contains("tokio :: test"), "Should have tokio::test");
        assert!(
            !output.contains("Cluster :: connect"),
            "Should NOT connect without cluster param"
        );
    }

    #[test]
    fn test_impl_preserves_attributes_and_name() {
        let f = parse_fn("#[ignore] async fn my_smoke_test(cluster: Cluster) {}");
        let output = test_impl(&f).to_string();

        assert!(output.contains("my_smoke_test"), "Should preserve function name");
        assert!(output.contains("# [ignore]"), "Should preserve attributes");
    }
}
