//! The interface to the resolver collaborator.
//!
//! This crate manages custom upstream resolvers but does not construct or
//! operate them itself. Both jobs belong to a collaborator that
//! implements the traits in this module: [`UpstreamFactory`] turns a
//! client's upstream addresses into a resolver, and the resolvers it
//! produces implement [`CustomResolver`] so that the manager can flush
//! their answer caches and release their resources.
//!
//! The factory receives the shared part of a resolver's configuration as
//! an [`UpstreamOptions`] value derived from the current
//! [`CommonUpstreamConfig`][crate::conf::CommonUpstreamConfig] and the
//! client's own caching preferences as a [`CachePolicy`].

use crate::error::CloseError;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

//------------ BootstrapResolver ---------------------------------------------

/// A resolver for the addresses of upstream servers themselves.
///
/// Upstream servers configured by name, such as a DNS-over-TLS server
/// given as `tls://dns.example.com`, need their own addresses resolved
/// before they can be used. The bootstrap resolver does that. It is part
/// of the common configuration and handed through to the factory; this
/// crate never queries it itself. Built resolvers are expected to invoke
/// it lazily on first use rather than at construction time.
pub trait BootstrapResolver: fmt::Debug + Send + Sync {
    /// Looks up the addresses for the given upstream server name.
    fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, io::Error>;
}

//------------ HttpVersion ---------------------------------------------------

/// An HTTP protocol version usable for DNS-over-HTTPS upstreams.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.1.
    H1,

    /// HTTP/2.
    H2,

    /// HTTP/3.
    H3,
}

/// The HTTP versions offered to upstreams when HTTP/3 is allowed.
///
/// Order expresses preference.
const HTTP_VERSIONS_H3: &[HttpVersion] =
    &[HttpVersion::H3, HttpVersion::H2, HttpVersion::H1];

/// The HTTP versions offered to upstreams by default.
const HTTP_VERSIONS_DEFAULT: &[HttpVersion] =
    &[HttpVersion::H2, HttpVersion::H1];

/// Returns the set of HTTP versions to offer to upstream servers.
///
/// The returned slice is ordered by preference. HTTP/3 is only included
/// when `use_http3` is set.
pub fn http_versions(use_http3: bool) -> &'static [HttpVersion] {
    if use_http3 {
        HTTP_VERSIONS_H3
    } else {
        HTTP_VERSIONS_DEFAULT
    }
}

//------------ UpstreamOptions -----------------------------------------------

/// The shared part of a resolver's configuration.
///
/// A value of this type is derived from the current common configuration
/// each time a resolver is built and handed to
/// [`UpstreamFactory::parse`].
#[derive(Clone, Debug)]
pub struct UpstreamOptions {
    /// The resolver for the addresses of the upstream servers.
    pub bootstrap: Arc<dyn BootstrapResolver>,

    /// Timeout for each query sent to an upstream server.
    pub timeout: Duration,

    /// HTTP versions to offer to DNS-over-HTTPS upstreams, ordered by
    /// preference.
    pub http_versions: &'static [HttpVersion],

    /// Prefer IPv6 addresses returned by the bootstrap resolver.
    pub prefer_ipv6: bool,
}

//------------ CachePolicy ---------------------------------------------------

/// A client's preferences for its resolver's answer cache.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CachePolicy {
    /// Whether the resolver caches DNS answers at all.
    pub enabled: bool,

    /// The maximum number of answers the resolver caches.
    pub size: u32,
}

//------------ CustomResolver ------------------------------------------------

/// A built custom upstream resolver.
///
/// The manager only ever interacts with the resolvers it caches through
/// this trait. Everything else -- sending queries, pooling connections,
/// filling the answer cache -- happens behind the collaborator's own
/// interface.
///
/// A resolver may still be serving in-flight queries when the manager
/// stops referencing it, so implementations must make [`close`] safe to
/// call while queries are outstanding, for instance by deferring the
/// actual teardown until the last query completes.
///
/// [`close`]: Self::close
pub trait CustomResolver {
    /// Drops all DNS answers cached inside this resolver.
    ///
    /// The resolver itself stays usable and keeps its configuration.
    fn clear_cache(&self);

    /// Releases the resources held by this resolver.
    ///
    /// This tears down pooled connections and drops the answer cache.
    /// The resolver must not be used afterwards.
    fn close(&self) -> Result<(), CloseError>;
}

impl<R: CustomResolver> CustomResolver for Arc<R> {
    fn clear_cache(&self) {
        (**self).clear_cache()
    }

    fn close(&self) -> Result<(), CloseError> {
        (**self).close()
    }
}

//------------ UpstreamFactory -----------------------------------------------

/// A constructor for custom upstream resolvers.
///
/// Construction happens in two steps mirroring the two kinds of input: a
/// parse step that turns the client's upstream address strings and the
/// shared options into a resolver configuration, and a build step that
/// combines that configuration with the client's caching preferences
/// into a live resolver.
///
/// Neither step may perform network I/O; resolving upstream server names
/// through the bootstrap resolver is deferred until the built resolver
/// first uses them.
pub trait UpstreamFactory {
    /// The parsed upstream configuration produced by [`parse`].
    ///
    /// [`parse`]: Self::parse
    type Config;

    /// The resolver produced by [`build`].
    ///
    /// [`build`]: Self::build
    type Resolver: CustomResolver;

    /// Parses upstream address strings into a resolver configuration.
    ///
    /// The `upstreams` slice is non-empty and free of comment and blank
    /// entries.
    fn parse(
        &self,
        upstreams: &[String],
        options: &UpstreamOptions,
    ) -> Result<Self::Config, ParseError>;

    /// Builds a resolver from a parsed configuration.
    fn build(
        &self,
        config: Self::Config,
        cache: CachePolicy,
        edns_client_subnet: bool,
    ) -> Self::Resolver;
}

//------------ ParseError ----------------------------------------------------

/// An upstream address string could not be parsed.
///
/// Within this crate such an error is always a programming error:
/// upstream addresses are validated when the client record is stored,
/// long before they reach the resolver builder.
#[derive(Clone, Debug)]
pub struct ParseError {
    /// Description of the offending input.
    message: String,
}

impl ParseError {
    /// Creates a new parse error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn http_versions_without_http3() {
        assert_eq!(
            http_versions(false),
            &[HttpVersion::H2, HttpVersion::H1]
        );
    }

    #[test]
    fn http_versions_with_http3() {
        assert_eq!(
            http_versions(true),
            &[HttpVersion::H3, HttpVersion::H2, HttpVersion::H1]
        );
    }
}
