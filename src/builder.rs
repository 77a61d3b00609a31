//! Building custom upstream resolvers.
//!
//! This module contains the one place where a client's upstream spec and
//! the common configuration meet: [`build_custom_resolver`] combines the
//! two into the inputs for the [`UpstreamFactory`] collaborator and
//! drives its parse and build steps. The manager is the only caller; it
//! caches what comes out.

use crate::conf::{
    ClientUpstreamSpec, CommonUpstreamConfig, UPSTREAM_TIMEOUT,
};
use crate::resolver::{
    http_versions, CachePolicy, UpstreamFactory, UpstreamOptions,
};
use crate::utils::is_comment_or_empty;

//------------ build_custom_resolver -----------------------------------------

/// Builds the custom upstream resolver for a client.
///
/// Returns `None` if the client's upstream list is empty once comment
/// and blank entries are filtered out; such a client uses the service's
/// default resolver rather than a custom one. Otherwise the common
/// configuration is turned into [`UpstreamOptions`], the factory parses
/// the remaining upstream addresses, and the resolver is built with the
/// client's own cache policy.
///
/// # Panics
///
/// Panics if the factory fails to parse the upstream addresses. The
/// addresses are validated when the client record is stored, so a parse
/// failure here means the validation layer is broken and the process
/// must not continue handing out resolvers built from partial state.
///
/// Also panics if a resolver needs to be built before the common
/// configuration has been set for the first time.
pub fn build_custom_resolver<F: UpstreamFactory>(
    factory: &F,
    spec: &ClientUpstreamSpec,
    common: Option<&CommonUpstreamConfig>,
) -> Option<F::Resolver> {
    let upstreams = spec
        .upstreams()
        .iter()
        .filter(|entry| !is_comment_or_empty(entry.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if upstreams.is_empty() {
        return None;
    }

    let common = match common {
        Some(common) => common,
        None => panic!(
            "custom upstream resolver requested before the common \
             configuration was set"
        ),
    };

    let options = UpstreamOptions {
        bootstrap: common.bootstrap.clone(),
        timeout: UPSTREAM_TIMEOUT.clamp(common.upstream_timeout),
        http_versions: http_versions(common.use_http3_upstreams),
        prefer_ipv6: common.bootstrap_prefer_ipv6,
    };

    let config = match factory.parse(&upstreams, &options) {
        Ok(config) => config,
        // Upstream addresses are validated when the client record is
        // stored, so a failure here means the validation layer is
        // broken.
        Err(err) => {
            panic!("parsing validated upstream addresses: {err}")
        }
    };

    Some(factory.build(
        config,
        CachePolicy {
            enabled: spec.cache_enabled(),
            size: spec.cache_size(),
        },
        common.edns_client_subnet_enabled,
    ))
}

//============ Tests =========================================================
