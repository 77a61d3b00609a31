//! Caching custom upstream resolvers per client.
//!
//! This module provides [`UpstreamManager`], the owner of everything this
//! crate is about: the common upstream configuration, the logical clock
//! that versions it, and the per-client cache of built resolvers. The
//! manager is handed to the layers that need it by reference; there is
//! deliberately no process-wide instance.
//!
//! The manager performs no locking. Lookups and mutations take the
//! manager mutably, so the owning layer decides how access is
//! serialized -- typically by wrapping the manager in a mutex at the
//! service boundary.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::builder::build_custom_resolver;
use crate::conf::{
    ClientId, ClientUpstreamSpec, CommonUpstreamConfig, ConfigVersion,
};
use crate::error::{CloseError, CloseErrors};
use crate::resolver::{CustomResolver, UpstreamFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

//------------ CachedResolver ------------------------------------------------

/// A cached association between a client and its built resolver.
///
/// Entries are replaced wholesale when a client's resolver is rebuilt;
/// they are never edited in place.
struct CachedResolver<R> {
    /// The built resolver.
    ///
    /// `None` if the client had no custom upstreams when the entry was
    /// created. Caching that outcome keeps repeated lookups for such a
    /// client from attempting construction over and over.
    resolver: Option<Arc<R>>,

    /// The configuration version the resolver was built against.
    built_against: ConfigVersion,
}

//------------ UpstreamManager -----------------------------------------------

/// A cache of custom upstream resolvers, one per client.
///
/// The manager lazily builds a resolver for a client the first time
/// [`get_or_build`] is called for it and keeps handing out that same
/// resolver until the common configuration changes. An update via
/// [`update_common_config`] advances the configuration version without
/// touching any cached resolver; each client's resolver is rebuilt on
/// its next lookup instead. Clients that never look up again pay
/// nothing for an update.
///
/// Resolvers hold external resources, so their release is explicit:
/// [`remove`] closes a single client's resolver when the client record
/// is deleted and [`close`] closes all of them on shutdown. A closed
/// manager refuses further lookups and updates.
///
/// [`get_or_build`]: Self::get_or_build
/// [`update_common_config`]: Self::update_common_config
/// [`remove`]: Self::remove
/// [`close`]: Self::close
pub struct UpstreamManager<F: UpstreamFactory> {
    /// The factory that parses upstream addresses and builds resolvers.
    factory: F,

    /// The common upstream configuration.
    ///
    /// Unset until the first call to
    /// [`update_common_config`][Self::update_common_config]. Kept
    /// behind an arc and replaced wholesale so a factory holding a
    /// clone mid-build never observes a half-updated configuration.
    common: Option<Arc<CommonUpstreamConfig>>,

    /// The version of the current common configuration.
    version: ConfigVersion,

    /// Maps a client to the resolver cached for it.
    entries: HashMap<ClientId, CachedResolver<F::Resolver>>,

    /// Whether the manager has been closed.
    closed: bool,
}

impl<F: UpstreamFactory> UpstreamManager<F> {
    /// Creates a new manager building resolvers with the given factory.
    ///
    /// The manager starts out without a common configuration. The
    /// owning layer must call
    /// [`update_common_config`][Self::update_common_config] before the
    /// first lookup for a client that has custom upstreams.
    pub fn new(factory: F) -> Self {
        UpstreamManager {
            factory,
            common: None,
            version: ConfigVersion::default(),
            entries: HashMap::new(),
            closed: false,
        }
    }

    /// Returns the version of the current common configuration.
    pub fn config_version(&self) -> ConfigVersion {
        self.version
    }

    /// Returns whether the manager has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replaces the common upstream configuration.
    ///
    /// Advances the configuration version, which marks every cached
    /// resolver as stale. No resolver is rebuilt here; each client's
    /// resolver is rebuilt on its next lookup. Updates may well be more
    /// frequent than lookups for any particular client, so rebuilding
    /// eagerly would waste the work for every client that stays quiet.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been closed.
    pub fn update_common_config(&mut self, config: CommonUpstreamConfig) {
        assert!(
            !self.closed,
            "upstream manager updated after being closed"
        );

        self.version = self.version.next();
        self.common = Some(Arc::new(config));
        debug!(
            "common upstream configuration updated to version {}",
            self.version
        );
    }

    /// Returns the client's custom resolver, building it if necessary.
    ///
    /// Returns `None` for a client whose upstream list is empty or
    /// contains only comment and blank entries; such a client uses the
    /// service's default resolver. The outcome, resolver or not, is
    /// cached and tagged with the current configuration version, and
    /// stays valid until the version advances.
    ///
    /// When a stale entry is replaced, the superseded resolver is not
    /// closed here; queries may still be in flight on it. The manager
    /// merely stops referencing it and leaves deferred teardown to the
    /// resolver itself. [`remove`][Self::remove] and
    /// [`close`][Self::close] are the deterministic release points.
    ///
    /// The cache is keyed by client id and configuration version only.
    /// A caller that edits a client's upstream spec must remove the
    /// client first, the same way deleting the client record would.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been closed, or if the client has
    /// custom upstreams and no common configuration has been set yet.
    pub fn get_or_build(
        &mut self,
        client: ClientId,
        spec: &ClientUpstreamSpec,
    ) -> Option<Arc<F::Resolver>> {
        assert!(!self.closed, "upstream manager used after being closed");

        if let Some(entry) = self.entries.get(&client) {
            if entry.built_against == self.version {
                trace!("cached custom resolver hit for client {client}");
                return entry.resolver.clone();
            }
        }

        trace!(
            "building custom resolver for client {client} \
             against version {}",
            self.version
        );
        let resolver =
            build_custom_resolver(&self.factory, spec, self.common.as_deref())
                .map(Arc::new);
        self.entries.insert(
            client,
            CachedResolver {
                resolver: resolver.clone(),
                built_against: self.version,
            },
        );

        resolver
    }

    /// Drops the cached DNS answers inside every cached resolver.
    ///
    /// The resolvers themselves stay cached and keep their
    /// configuration; only the answers they have collected are dropped.
    /// Entries for clients without custom upstreams are skipped.
    pub fn clear_upstream_cache(&self) {
        debug!("clearing the answer caches of all custom resolvers");
        for entry in self.entries.values() {
            if let Some(resolver) = &entry.resolver {
                resolver.clear_cache();
            }
        }
    }

    /// Removes the client's cached resolver and releases its resources.
    ///
    /// Called when a client record is deleted. The entry is removed
    /// from the cache in any case, including when closing the resolver
    /// fails -- a failed close must not leave behind an entry the
    /// caller has no other way to reach. The close failure itself is
    /// returned.
    ///
    /// Removing a client without a cached entry does nothing.
    pub fn remove(&mut self, client: ClientId) -> Result<(), CloseError> {
        let entry = match self.entries.remove(&client) {
            Some(entry) => entry,
            None => return Ok(()),
        };

        debug!("removing the custom resolver of client {client}");
        match entry.resolver {
            Some(resolver) => resolver.close(),
            None => Ok(()),
        }
    }

    /// Closes every cached resolver and shuts the manager down.
    ///
    /// Every resolver's close is attempted no matter how many of them
    /// fail; the failures are collected and returned together with the
    /// clients they belong to. After closing, the manager refuses
    /// further lookups and updates. Closing an already closed manager
    /// does nothing.
    pub fn close(&mut self) -> Result<(), CloseErrors> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!(
            "closing the upstream manager with {} cached entries",
            self.entries.len()
        );
        let mut errors = CloseErrors::new();
        for (client, entry) in self.entries.drain() {
            if let Some(resolver) = entry.resolver {
                if let Err(err) = resolver.close() {
                    errors.push(client, err);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

//============ Tests =========================================================
