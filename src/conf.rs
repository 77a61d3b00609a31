//! Configuration for custom upstream resolvers.
//!
//! There are two parts to the configuration of a client's custom upstream
//! resolver: the settings shared by every client of the service, collected
//! in [`CommonUpstreamConfig`] and owned by the manager, and the inputs a
//! single client contributes, collected in [`ClientUpstreamSpec`] and
//! owned by whatever keeps the client records.
//!
//! Successive instances of the common configuration are told apart by a
//! [`ConfigVersion`], a logical clock the manager advances on every
//! update. Clients themselves are identified by a [`ClientId`], an opaque
//! value that stays stable for the lifetime of a client record no matter
//! how its name or addresses change.

use crate::resolver::BootstrapResolver;
use crate::utils::config::Bounds;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

//------------ Module Configuration ------------------------------------------

/// Bounds for the number of answers a client's resolver may cache.
pub(crate) const CACHE_SIZE: Bounds<u32> = Bounds::new(1_000, 1, 1_000_000);

/// Bounds for the timeout applied to each query sent upstream.
pub(crate) const UPSTREAM_TIMEOUT: Bounds<Duration> = Bounds::new(
    Duration::from_secs(10),
    Duration::from_secs(1),
    Duration::from_secs(5 * 60),
);

//------------ ClientId ------------------------------------------------------

/// The identity of a client record.
///
/// A client id is handed out once for a client record and never changes,
/// even when the client's mutable attributes -- its name, its set of
/// addresses, its upstream list -- are edited. The manager keys its cache
/// by this value so that editing a client can never silently re-associate
/// it with another client's resolver.
///
/// New ids are handed out by [`allocate`][Self::allocate]. Code that
/// persists client records can store the raw value via
/// [`into_raw`][Self::into_raw] and recreate the id with
/// [`from_raw`][Self::from_raw].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ClientId(u64);

impl ClientId {
    /// Hands out the next unused client id.
    pub fn allocate() -> Self {
        /// The id to be handed out next.
        static NEXT: AtomicU64 = AtomicU64::new(0);

        ClientId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Recreates a client id from its raw value.
    pub const fn from_raw(id: u64) -> Self {
        ClientId(id)
    }

    /// Returns the raw value of the client id.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ ConfigVersion -------------------------------------------------

/// Identifies one instance of the common upstream configuration.
///
/// Every update of the common configuration produces a strictly greater
/// version. A cached resolver remembers the version it was built against;
/// comparing that against the manager's current version decides whether
/// the resolver is still fresh or must be rebuilt.
///
/// The default value is the version before any configuration has been
/// set.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConfigVersion(u64);

impl ConfigVersion {
    /// Returns the version following this one.
    #[must_use]
    pub fn next(self) -> Self {
        ConfigVersion(self.0 + 1)
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ CommonUpstreamConfig ------------------------------------------

/// Settings shared by all clients' custom upstream resolvers.
///
/// A value of this type is handed to
/// [`UpstreamManager::update_common_config`][update] whenever the
/// service-wide upstream settings change, typically on an administrative
/// configuration reload. The manager owns the value exclusively and
/// replaces it wholesale; it is never mutated in place, so resolver
/// construction happening concurrently with an update only ever sees a
/// complete configuration.
///
/// [update]: crate::manager::UpstreamManager::update_common_config
#[derive(Clone, Debug)]
pub struct CommonUpstreamConfig {
    /// The resolver used to look up the addresses of the configured
    /// upstream servers themselves.
    pub bootstrap: Arc<dyn BootstrapResolver>,

    /// Timeout for each query sent to an upstream server.
    pub upstream_timeout: Duration,

    /// Prefer IPv6 addresses when the bootstrap resolver returns both
    /// address families.
    pub bootstrap_prefer_ipv6: bool,

    /// Attach the EDNS client-subnet option to upstream queries.
    pub edns_client_subnet_enabled: bool,

    /// Allow HTTP/3 as a transport for DNS-over-HTTPS upstreams.
    pub use_http3_upstreams: bool,
}

impl CommonUpstreamConfig {
    /// Creates a new configuration with default settings.
    ///
    /// Everything except the bootstrap resolver starts out with its
    /// default: a ten second upstream timeout and all flags disabled.
    pub fn new(bootstrap: Arc<dyn BootstrapResolver>) -> Self {
        CommonUpstreamConfig {
            bootstrap,
            upstream_timeout: UPSTREAM_TIMEOUT.default_value(),
            bootstrap_prefer_ipv6: false,
            edns_client_subnet_enabled: false,
            use_http3_upstreams: false,
        }
    }
}

//------------ ClientUpstreamSpec --------------------------------------------

/// The per-client inputs to building a custom upstream resolver.
///
/// The upstream list keeps the order in which the servers were
/// configured. Comment lines and blank lines are tolerated in the list;
/// the builder filters them out. A spec whose list is empty after
/// filtering describes a client without a custom resolver.
///
/// Editing a client's spec does not invalidate a resolver already built
/// for it. A caller that changes a client's upstream settings must
/// [`remove`][crate::manager::UpstreamManager::remove] the client from
/// the manager first, the same way deleting the client record would.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ClientUpstreamSpec {
    /// The upstream servers to forward this client's queries to.
    upstreams: Vec<String>,

    /// Whether this client's resolver caches DNS answers.
    cache_enabled: bool,

    /// The maximum number of answers this client's resolver caches.
    cache_size: u32,
}

impl ClientUpstreamSpec {
    /// Creates a new spec for the given upstream servers.
    ///
    /// Answer caching starts out disabled with the default cache size.
    pub fn new(upstreams: Vec<String>) -> Self {
        ClientUpstreamSpec {
            upstreams,
            cache_enabled: false,
            cache_size: CACHE_SIZE.default_value(),
        }
    }

    /// Returns the configured upstream servers.
    pub fn upstreams(&self) -> &[String] {
        &self.upstreams
    }

    /// Replaces the configured upstream servers.
    pub fn set_upstreams(&mut self, upstreams: Vec<String>) {
        self.upstreams = upstreams;
    }

    /// Returns whether this client's resolver caches DNS answers.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Sets whether this client's resolver caches DNS answers.
    pub fn set_cache_enabled(&mut self, value: bool) {
        self.cache_enabled = value;
    }

    /// Returns the maximum number of answers this client's resolver
    /// caches.
    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    /// Sets the maximum number of answers this client's resolver caches.
    ///
    /// Values outside the supported range are silently trimmed to the
    /// nearest supported value.
    pub fn set_cache_size(&mut self, value: u32) {
        self.cache_size = CACHE_SIZE.clamp(value);
    }
}

impl Default for ClientUpstreamSpec {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

//============ Tests =========================================================
