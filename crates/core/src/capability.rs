//! Capability injection for tool implementations.
//!
//! The composition root fills a [`Capabilities`] bag with concrete
//! implementations (auth, clock, ...). The orchestrator only passes the
//! bag through; tools look up what they declared they need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ToolError;

/// Capability name for [`ClockCapability`].
pub const CLOCK: &str = "clock";

/// Capability name for [`AuthCapability`].
pub const AUTH: &str = "auth";

/// Source of the current time.
pub trait ClockCapability: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockCapability for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Resolves access tokens for a connection without exposing how they
/// are stored.
#[async_trait]
pub trait AuthCapability: Send + Sync {
    async fn access_token(&self, connection_id: &str) -> Result<String, ToolError>;
}

/// An opaque, immutable bag of named capabilities.
#[derive(Clone, Default)]
pub struct Capabilities {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an arbitrary capability value under `name`.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.entries.insert(name.into(), Arc::new(value));
        self
    }

    pub fn with_clock(self, clock: Arc<dyn ClockCapability>) -> Self {
        self.with(CLOCK, clock)
    }

    pub fn with_auth(self, auth: Arc<dyn AuthCapability>) -> Self {
        self.with(AUTH, auth)
    }

    /// Look up a capability by name and type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.entries.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn clock(&self) -> Option<Arc<dyn ClockCapability>> {
        self.get::<Arc<dyn ClockCapability>>(CLOCK).cloned()
    }

    pub fn auth(&self) -> Option<Arc<dyn AuthCapability>> {
        self.get::<Arc<dyn AuthCapability>>(AUTH).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names of every registered capability, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// Only names are printed; values may hold credentials.
impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("names", &self.names())
            .finish()
    }
}
