use std::collections::BTreeMap;
use std::fmt;

use opchild_state::{Storage, WorkingSet};

use crate::capabilities::Context;
use crate::OpChildError;

/// Handler of one legacy governance route.
pub type LegacyHandler<S> =
    Box<dyn Fn(&Context, &[u8], &mut WorkingSet<S>) -> anyhow::Result<()> + Send + Sync>;

/// Boxes a closure as a [`LegacyHandler`].
pub fn legacy_handler<S, F>(handler: F) -> LegacyHandler<S>
where
    S: Storage,
    F: Fn(&Context, &[u8], &mut WorkingSet<S>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Box::new(handler)
}

/// Route string to handler. Once sealed, no route can be added.
pub struct LegacyRouter<S: Storage> {
    routes: BTreeMap<String, LegacyHandler<S>>,
    sealed: bool,
}

impl<S: Storage> Default for LegacyRouter<S> {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
            sealed: false,
        }
    }
}

impl<S: Storage> fmt::Debug for LegacyRouter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyRouter")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl<S: Storage> LegacyRouter<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self,
        route: &str,
        handler: LegacyHandler<S>,
    ) -> Result<&mut Self, OpChildError> {
        if self.sealed {
            return Err(OpChildError::InvalidRoute(format!(
                "router is sealed, cannot add {route}"
            )));
        }
        if route.is_empty() || !route.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(OpChildError::InvalidRoute(format!("malformed route {route:?}")));
        }
        if self.routes.contains_key(route) {
            return Err(OpChildError::InvalidRoute(format!("route {route} already registered")));
        }
        self.routes.insert(route.to_owned(), handler);
        Ok(self)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    pub(crate) fn dispatch(
        &self,
        route: &str,
        context: &Context,
        data: &[u8],
        working_set: &mut WorkingSet<S>,
    ) -> Result<(), OpChildError> {
        let handler = self
            .routes
            .get(route)
            .ok_or_else(|| OpChildError::InvalidRoute(format!("no handler for route {route}")))?;
        handler(context, data, working_set)?;
        Ok(())
    }
}
