//! End-to-end behavior of the upstream manager.

use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use upstream_manager::{
    BootstrapResolver, CachePolicy, ClientId, ClientUpstreamSpec,
    CloseError, CommonUpstreamConfig, CustomResolver, ParseError,
    UpstreamFactory, UpstreamManager, UpstreamOptions,
};

//------------ Mock collaborator ---------------------------------------------

/// A bootstrap resolver that never finds anything.
#[derive(Debug)]
struct NoBootstrap;

impl BootstrapResolver for NoBootstrap {
    fn lookup_ip(&self, _host: &str) -> Result<Vec<IpAddr>, io::Error> {
        Ok(Vec::new())
    }
}

/// A resolver that records its configuration and what is done to it.
struct MockResolver {
    /// The upstream addresses the resolver was built from.
    upstreams: Vec<String>,

    /// The query timeout the resolver was built with.
    timeout: Duration,

    /// The cache policy the resolver was built with.
    cache: CachePolicy,

    /// How often the answer cache was cleared.
    cleared: AtomicUsize,

    /// How often the resolver was closed.
    closed: AtomicUsize,

    /// Whether closing should fail.
    fail_close: bool,
}

impl CustomResolver for MockResolver {
    fn clear_cache(&self) {
        self.cleared.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&self) -> Result<(), CloseError> {
        self.closed.fetch_add(1, Ordering::Relaxed);
        if self.fail_close {
            Err(CloseError::Connection(Arc::new(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset during teardown",
            ))))
        } else {
            Ok(())
        }
    }
}

/// A factory producing mock resolvers.
#[derive(Default)]
struct MockFactory {
    /// Upstream lists that produce a resolver whose close fails.
    ///
    /// Keyed by the first upstream address in the list.
    fail_close_for: Vec<String>,
}

impl UpstreamFactory for MockFactory {
    type Config = Vec<String>;
    type Resolver = MockResolver;

    fn parse(
        &self,
        upstreams: &[String],
        _options: &UpstreamOptions,
    ) -> Result<Self::Config, ParseError> {
        Ok(upstreams.to_vec())
    }

    fn build(
        &self,
        config: Self::Config,
        cache: CachePolicy,
        _edns_client_subnet: bool,
    ) -> Self::Resolver {
        let fail_close = config
            .first()
            .map(|first| self.fail_close_for.contains(first))
            .unwrap_or(false);
        MockResolver {
            upstreams: config,
            timeout: Duration::ZERO,
            cache,
            cleared: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            fail_close,
        }
    }
}

/// A factory that also records the shared options it was given.
///
/// Separate from [`MockFactory`] because most tests do not care about
/// the options and the plumbing would get in their way.
struct OptionsFactory;

impl UpstreamFactory for OptionsFactory {
    type Config = (Vec<String>, Duration);
    type Resolver = MockResolver;

    fn parse(
        &self,
        upstreams: &[String],
        options: &UpstreamOptions,
    ) -> Result<Self::Config, ParseError> {
        Ok((upstreams.to_vec(), options.timeout))
    }

    fn build(
        &self,
        config: Self::Config,
        cache: CachePolicy,
        _edns_client_subnet: bool,
    ) -> Self::Resolver {
        let (upstreams, timeout) = config;
        MockResolver {
            upstreams,
            timeout,
            cache,
            cleared: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            fail_close: false,
        }
    }
}

fn common_config() -> CommonUpstreamConfig {
    CommonUpstreamConfig::new(Arc::new(NoBootstrap))
}

//------------ Tests ---------------------------------------------------------

#[test]
fn lifecycle_of_a_single_client() {
    let mut manager = UpstreamManager::new(OptionsFactory);

    let mut first_config = common_config();
    first_config.upstream_timeout = Duration::from_secs(10);
    manager.update_common_config(first_config);
    let v1 = manager.config_version();

    let client = ClientId::allocate();
    let mut spec = ClientUpstreamSpec::new(vec!["1.1.1.1".into()]);
    spec.set_cache_enabled(true);
    spec.set_cache_size(256);

    // First lookup builds the resolver.
    let h1 = manager.get_or_build(client, &spec).unwrap();
    assert_eq!(h1.upstreams, ["1.1.1.1".to_string()]);
    assert_eq!(h1.timeout, Duration::from_secs(10));
    assert_eq!(
        h1.cache,
        CachePolicy {
            enabled: true,
            size: 256
        }
    );

    // Updating the common configuration advances the version and makes
    // the next lookup rebuild against the new settings.
    let mut second_config = common_config();
    second_config.upstream_timeout = Duration::from_secs(30);
    manager.update_common_config(second_config);
    assert!(v1 < manager.config_version());

    let h2 = manager.get_or_build(client, &spec).unwrap();
    assert!(!Arc::ptr_eq(&h1, &h2));
    assert_eq!(h2.timeout, Duration::from_secs(30));

    // Flushing the answer caches leaves the resolver itself alone.
    manager.clear_upstream_cache();
    assert_eq!(h2.cleared.load(Ordering::Relaxed), 1);
    let same = manager.get_or_build(client, &spec).unwrap();
    assert!(Arc::ptr_eq(&h2, &same));

    // Removing the client closes its resolver.
    manager.remove(client).unwrap();
    assert_eq!(h2.closed.load(Ordering::Relaxed), 1);
    let h3 = manager.get_or_build(client, &spec).unwrap();
    assert!(!Arc::ptr_eq(&h2, &h3));
}

#[test]
fn clients_without_custom_upstreams() {
    let mut manager = UpstreamManager::new(MockFactory::default());
    manager.update_common_config(common_config());

    let client = ClientId::allocate();
    let spec = ClientUpstreamSpec::new(vec![
        "# forwarded through the default resolver".into(),
        "".into(),
    ]);

    assert!(manager.get_or_build(client, &spec).is_none());
    assert!(manager.get_or_build(client, &spec).is_none());

    // Removing such a client has nothing to close.
    assert!(manager.remove(client).is_ok());
}

#[test]
fn shutdown_reports_exactly_the_failing_resolvers() {
    let mut manager = UpstreamManager::new(MockFactory {
        fail_close_for: vec!["9.9.9.9".into()],
    });
    manager.update_common_config(common_config());

    let fine = ClientId::allocate();
    let failing = ClientId::allocate();
    let absent = ClientId::allocate();

    let fine_resolver = manager
        .get_or_build(
            fine,
            &ClientUpstreamSpec::new(vec!["1.1.1.1".into()]),
        )
        .unwrap();
    let failing_resolver = manager
        .get_or_build(
            failing,
            &ClientUpstreamSpec::new(vec!["9.9.9.9".into()]),
        )
        .unwrap();
    assert!(manager
        .get_or_build(absent, &ClientUpstreamSpec::new(Vec::new()))
        .is_none());

    let errors = manager.close().unwrap_err();

    // Every resolver was closed despite the failure.
    assert_eq!(fine_resolver.closed.load(Ordering::Relaxed), 1);
    assert_eq!(failing_resolver.closed.load(Ordering::Relaxed), 1);

    // The aggregate names the failing client and nothing else.
    let clients: Vec<_> =
        errors.errors().iter().map(|(client, _)| *client).collect();
    assert_eq!(clients, [failing]);
    assert!(errors.to_string().contains("upstream connections"));
}
