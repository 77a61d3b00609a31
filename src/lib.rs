//! Per-client custom upstream resolver management.
//!
//! A DNS resolution service may allow individual clients to override the
//! set of upstream servers their queries are forwarded to. Constructing
//! the resolver that speaks to such a set is expensive: it parses the
//! configured upstream addresses, sets up connection handling, and owns a
//! cache of DNS answers. This crate provides the bookkeeping around those
//! resolvers: it builds them lazily on first use, caches them per client,
//! rebuilds them transparently when the service-wide upstream settings
//! change, and releases their resources deterministically when a client
//! is deleted or the service shuts down.
//!
//! The crate does not talk DNS itself. The actual parsing of upstream
//! addresses and the construction of resolvers is left to a collaborator
//! implementing the [`UpstreamFactory`] trait, and the resolvers it
//! produces are only required to implement [`CustomResolver`] so that
//! their answer caches can be flushed and their resources released.
//!
//! # Overview
//!
//! The central type is [`UpstreamManager`]. It owns the
//! [`CommonUpstreamConfig`] shared by all clients' custom resolvers and a
//! map from [`ClientId`] to the resolver built for that client. Each
//! cached resolver is tagged with the [`ConfigVersion`] it was built
//! against; when the common configuration is replaced via
//! [`update_common_config`], the version advances and cached resolvers
//! become stale. Staleness is resolved lazily: the next
//! [`get_or_build`] for a client rebuilds its resolver against the
//! current configuration, while clients that never look up again cost
//! nothing.
//!
//! A client with no upstream addresses of its own (or only comments and
//! blank lines in its upstream list) has no custom resolver at all.
//! This outcome is cached, too, so repeated lookups for such a client do
//! not repeatedly attempt construction.
//!
//! All operations are synchronous and complete quickly except for the
//! rare construction path, which performs parsing but no network I/O.
//! The manager performs no locking of its own; the owning layer
//! serializes access, which the mutable receivers on the lookup and
//! mutation operations enforce at compile time.
//!
//! [`update_common_config`]: UpstreamManager::update_common_config
//! [`get_or_build`]: UpstreamManager::get_or_build

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod builder;
pub mod conf;
pub mod error;
pub mod manager;
pub mod resolver;
pub mod utils;

pub use self::builder::build_custom_resolver;
pub use self::conf::{
    ClientId, ClientUpstreamSpec, CommonUpstreamConfig, ConfigVersion,
};
pub use self::error::{CloseError, CloseErrors};
pub use self::manager::UpstreamManager;
pub use self::resolver::{
    http_versions, BootstrapResolver, CachePolicy, CustomResolver,
    HttpVersion, ParseError, UpstreamFactory, UpstreamOptions,
};
