//! Collectors deriving metrics from networking resources.

use std::{error, fmt, num::ParseFloatError};

use crate::{
    api::{NetworkingApi, ResourceKind},
    engine::{IdGenerationError, IdGenerator},
    fetch::FetchError,
};

mod neutron;
#[cfg(test)]
mod tests;

pub(crate) use self::neutron::{
    AGENT_STATES, FLOATING_IPS, NETWORKS, NETWORK_IP_AVAILABILITIES, PORTS, ROUTERS,
    SECURITY_GROUPS, SUBNETS,
};

/// Context shared by all collectors during a scrape.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    api: &'a dyn NetworkingApi,
    region: &'a str,
    id_generator: &'a IdGenerator,
}

impl fmt::Debug for CollectContext<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CollectContext")
            .field("api", &self.api)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl<'a> CollectContext<'a> {
    /// Creates a context.
    pub fn new(api: &'a dyn NetworkingApi, region: &'a str, id_generator: &'a IdGenerator) -> Self {
        Self {
            api,
            region,
            id_generator,
        }
    }

    /// Returns the networking API client.
    pub fn api(&self) -> &'a dyn NetworkingApi {
        self.api
    }

    /// Returns the value of the `region_name` label.
    pub fn region(&self) -> &'a str {
        self.region
    }

    /// Generates a substitute unique ID for a resource.
    ///
    /// # Errors
    ///
    /// Proxies generator errors.
    pub fn generate_id(&self) -> Result<String, IdGenerationError> {
        (self.id_generator)()
    }
}

/// Error aborting a collector. Observations staged by the collector are discarded.
#[derive(Debug)]
#[non_exhaustive]
pub enum CollectError {
    /// Error fetching resources.
    Fetch(FetchError),
    /// A numeric field of a resource cannot be parsed.
    ParseNumber {
        /// Kind of the resource.
        kind: ResourceKind,
        /// Name of the field.
        field: &'static str,
        /// Raw field value.
        value: String,
        /// Parsing error.
        source: ParseFloatError,
    },
    /// Error generating a substitute ID for a resource.
    IdGeneration {
        /// Kind of the resource.
        kind: ResourceKind,
        /// Generator error.
        source: IdGenerationError,
    },
}

impl CollectError {
    /// Returns the kind of resources that caused the error.
    pub fn resource_kind(&self) -> &ResourceKind {
        match self {
            Self::Fetch(err) => err.resource_kind(),
            Self::ParseNumber { kind, .. } | Self::IdGeneration { kind, .. } => kind,
        }
    }
}

impl From<FetchError> for CollectError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl fmt::Display for CollectError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => fmt::Display::fmt(err, formatter),
            Self::ParseNumber {
                kind,
                field,
                value,
                source,
            } => write!(
                formatter,
                "failed parsing `{field}` of {kind} as a number (value: {value:?}): {source}"
            ),
            Self::IdGeneration { kind, source } => {
                write!(formatter, "failed generating ID for {kind}: {source}")
            }
        }
    }
}

impl error::Error for CollectError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::ParseNumber { source, .. } => Some(source),
            Self::IdGeneration { source, .. } => Some(source),
        }
    }
}
