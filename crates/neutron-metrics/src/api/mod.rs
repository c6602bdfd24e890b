//! Contract of the networking API client consumed by the engine.
//!
//! The engine doesn't know anything about HTTP, authentication or the service catalog. It only
//! requests pages of a certain [`ResourceKind`] and follows [`PageCursor`]s until the client reports
//! that there are no more pages.

use derive_more::Display;
use serde_json::Value;

use std::{borrow::Cow, collections::BTreeMap, error, fmt};

mod fixture;

pub use self::fixture::{FixtureApi, FixtureError};

/// Kind of a remote resource collection.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResourceKind {
    /// Floating IPs (`/v2.0/floatingips`).
    #[display("floating IPs")]
    FloatingIps,
    /// Networks (`/v2.0/networks`).
    #[display("networks")]
    Networks,
    /// Security groups (`/v2.0/security-groups`).
    #[display("security groups")]
    SecurityGroups,
    /// Subnets (`/v2.0/subnets`).
    #[display("subnets")]
    Subnets,
    /// Ports (`/v2.0/ports`).
    #[display("ports")]
    Ports,
    /// Routers (`/v2.0/routers`).
    #[display("routers")]
    Routers,
    /// L3 agents hosting a specific router (`/v2.0/routers/{router_id}/l3-agents`).
    #[display("L3 agents of router `{router_id}`")]
    RouterL3Agents {
        /// ID of the router.
        router_id: String,
    },
    /// Networking agents (`/v2.0/agents`).
    #[display("agents")]
    Agents,
    /// Per-network IP availability (`/v2.0/network-ip-availabilities`).
    #[display("network IP availabilities")]
    NetworkIpAvailabilities,
}

impl ResourceKind {
    /// Returns the path of the collection relative to the networking endpoint.
    pub fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            Self::FloatingIps => "/v2.0/floatingips",
            Self::Networks => "/v2.0/networks",
            Self::SecurityGroups => "/v2.0/security-groups",
            Self::Subnets => "/v2.0/subnets",
            Self::Ports => "/v2.0/ports",
            Self::Routers => "/v2.0/routers",
            Self::RouterL3Agents { router_id } => {
                return Cow::Owned(format!("/v2.0/routers/{router_id}/l3-agents"));
            }
            Self::Agents => "/v2.0/agents",
            Self::NetworkIpAvailabilities => "/v2.0/network-ip-availabilities",
        })
    }

    /// Returns the key in the response body holding the array of records.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::FloatingIps => "floatingips",
            Self::Networks => "networks",
            Self::SecurityGroups => "security_groups",
            Self::Subnets => "subnets",
            Self::Ports => "ports",
            Self::Routers => "routers",
            Self::RouterL3Agents { .. } | Self::Agents => "agents",
            Self::NetworkIpAvailabilities => "network_ip_availabilities",
        }
    }
}

/// Query filters for a list request. Filters are passed to the client as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    params: BTreeMap<String, String>,
}

impl ListFilters {
    /// No filters.
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(field.into(), value.into());
        self
    }

    /// Checks whether there are no filters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over `(field, value)` filter pairs in the lexicographic field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.params
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }
}

/// Opaque position of the next page (e.g., a marker or a `next` link).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wraps a client-specific cursor value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the cursor value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Single page of a resource collection.
#[derive(Debug, Clone)]
pub struct Page {
    body: Value,
    next: Option<PageCursor>,
}

impl Page {
    /// Creates a page from the response body and the cursor of the following page, if any.
    pub fn new(body: Value, next: Option<PageCursor>) -> Self {
        Self { body, next }
    }

    /// Returns the response body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns the cursor of the next page.
    pub fn next(&self) -> Option<&PageCursor> {
        self.next.as_ref()
    }

    /// Checks whether there are more pages after this one.
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Error returned by a [`NetworkingApi`] client.
#[derive(Debug)]
pub struct ApiError {
    message: String,
    status: Option<u16>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl ApiError {
    /// Creates an error with the specified message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Attaches an HTTP status code to this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the underlying cause to this error.
    #[must_use]
    pub fn with_source(mut self, source: impl error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the HTTP status code, if known.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(formatter, "{} (HTTP status {status})", self.message)
        } else {
            formatter.write_str(&self.message)
        }
    }
}

impl error::Error for ApiError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

/// Client of the networking API.
///
/// Implementations are responsible for authentication, timeouts and retries, if any;
/// the engine calls [`Self::list_page()`] from multiple threads concurrently.
pub trait NetworkingApi: fmt::Debug + Send + Sync {
    /// Requests a single page of the specified collection. `cursor` is `None` for the first page;
    /// otherwise, it's the cursor returned by [`Page::next()`] of the previous page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be retrieved.
    fn list_page(
        &self,
        kind: &ResourceKind,
        filters: &ListFilters,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, ApiError>;
}

impl<T: NetworkingApi + ?Sized> NetworkingApi for &T {
    fn list_page(
        &self,
        kind: &ResourceKind,
        filters: &ListFilters,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, ApiError> {
        (**self).list_page(kind, filters, cursor)
    }
}
