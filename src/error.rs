//! Errors for releasing resolver resources.
//!
//! Closing a custom upstream resolver tears down external resources --
//! pooled connections, the answer cache -- and any of that can fail.
//! Such failures are reported, never swallowed: [`CloseError`] describes
//! why a single resolver failed to close, and [`CloseErrors`] collects
//! every failure encountered while shutting the manager down so that
//! operational monitoring can detect leak-prone shutdowns.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::conf::ClientId;
use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

//------------ CloseError ----------------------------------------------------

/// A custom upstream resolver failed to release its resources.
#[derive(Clone, Debug)]
pub enum CloseError {
    /// Tearing down the resolver's upstream connections failed.
    Connection(Arc<io::Error>),

    /// Dropping the resolver's answer cache failed.
    Cache(Arc<io::Error>),
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseError::Connection(_) => {
                write!(f, "error tearing down upstream connections")
            }
            CloseError::Cache(_) => {
                write!(f, "error dropping the answer cache")
            }
        }
    }
}

impl error::Error for CloseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CloseError::Connection(err) => Some(err.as_ref()),
            CloseError::Cache(err) => Some(err.as_ref()),
        }
    }
}

//------------ CloseErrors ---------------------------------------------------

/// The failures collected while closing all cached resolvers.
///
/// Shutting the manager down attempts to close every cached resolver no
/// matter how many of the closes fail. Each failure is recorded together
/// with the id of the client whose resolver it was. A value of this type
/// therefore reflects exactly the set of resolvers whose resources may
/// have leaked.
#[derive(Clone, Debug)]
pub struct CloseErrors {
    /// The individual failures, keyed by the client they belong to.
    errors: Vec<(ClientId, CloseError)>,
}

impl CloseErrors {
    /// Creates a new, empty collection.
    pub(crate) fn new() -> Self {
        CloseErrors { errors: Vec::new() }
    }

    /// Records the failure to close the given client's resolver.
    pub(crate) fn push(&mut self, client: ClientId, error: CloseError) {
        self.errors.push((client, error));
    }

    /// Returns whether no failure has been recorded.
    pub(crate) fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the individual failures.
    pub fn errors(&self) -> &[(ClientId, CloseError)] {
        &self.errors
    }

    /// Converts the collection into the individual failures.
    pub fn into_errors(self) -> Vec<(ClientId, CloseError)> {
        self.errors
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "closing {} custom upstream resolver{} failed",
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" }
        )?;
        let mut sep = ": ";
        for (client, error) in &self.errors {
            write!(f, "{sep}client {client}: {error}")?;
            sep = "; ";
        }
        Ok(())
    }
}

impl error::Error for CloseErrors {}

//============ Tests =========================================================
