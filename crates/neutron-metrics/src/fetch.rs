//! Paginated retrieval of resource collections.

use serde::{de::DeserializeOwned, Deserialize};

use std::{error, fmt};

use crate::{
    api::{ApiError, ListFilters, NetworkingApi, Page, ResourceKind},
    join::{join_records, Join},
};

/// Cause of a [`FetchError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum FetchErrorKind {
    /// The API client failed to return a page.
    Api(ApiError),
    /// A page doesn't contain the collection key.
    MissingCollection,
    /// Records on a page have an unexpected shape.
    Extract(serde_json::Error),
}

/// Error fetching a resource collection. No records are returned if this error occurs.
#[derive(Debug)]
pub struct FetchError {
    kind: ResourceKind,
    source: FetchErrorKind,
}

impl FetchError {
    fn new(kind: &ResourceKind, source: FetchErrorKind) -> Self {
        Self {
            kind: kind.clone(),
            source,
        }
    }

    /// Returns the kind of resources that failed to be fetched.
    pub fn resource_kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Returns the cause of this error.
    pub fn kind(&self) -> &FetchErrorKind {
        &self.source
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        match &self.source {
            FetchErrorKind::Api(err) => write!(formatter, "failed listing {kind}: {err}"),
            FetchErrorKind::MissingCollection => write!(
                formatter,
                "failed listing {kind}: response has no `{}` field",
                kind.collection_key()
            ),
            FetchErrorKind::Extract(err) => {
                write!(formatter, "failed extracting {kind} from response: {err}")
            }
        }
    }
}

impl error::Error for FetchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.source {
            FetchErrorKind::Api(err) => Some(err),
            FetchErrorKind::MissingCollection => None,
            FetchErrorKind::Extract(err) => Some(err),
        }
    }
}

/// Requests all pages of a collection, following cursors until there are no more pages.
///
/// # Errors
///
/// Returns an error on the first failed page request; pages fetched before it are discarded.
pub fn fetch_pages(
    api: &dyn NetworkingApi,
    kind: &ResourceKind,
    filters: &ListFilters,
) -> Result<Vec<Page>, FetchError> {
    let mut pages = vec![];
    loop {
        let cursor = pages.last().and_then(Page::next);
        let page = api
            .list_page(kind, filters, cursor)
            .map_err(|err| FetchError::new(kind, FetchErrorKind::Api(err)))?;
        let has_more = page.has_more();
        pages.push(page);
        if !has_more {
            break;
        }
    }
    tracing::trace!(%kind, page_count = pages.len(), "Fetched all pages");
    Ok(pages)
}

/// Extracts records of the specified type from pages, concatenating them in page order.
///
/// # Errors
///
/// Returns an error if any page lacks the collection key, or has records of an unexpected shape.
pub fn extract_into<T: DeserializeOwned>(
    kind: &ResourceKind,
    pages: &[Page],
) -> Result<Vec<T>, FetchError> {
    let mut records = vec![];
    for page in pages {
        let collection = page
            .body()
            .get(kind.collection_key())
            .filter(|value| !value.is_null())
            .ok_or_else(|| FetchError::new(kind, FetchErrorKind::MissingCollection))?;
        let page_records = Vec::<T>::deserialize(collection)
            .map_err(|err| FetchError::new(kind, FetchErrorKind::Extract(err)))?;
        records.extend(page_records);
    }
    Ok(records)
}

/// Fetches all records of a collection.
///
/// # Errors
///
/// Returns an error if fetching any page or extracting records from it fails. Partial results
/// are never returned.
pub fn fetch_all<T: DeserializeOwned>(
    api: &dyn NetworkingApi,
    kind: &ResourceKind,
    filters: &ListFilters,
) -> Result<Vec<T>, FetchError> {
    let pages = fetch_pages(api, kind, filters)?;
    extract_into(kind, &pages)
}

/// Fetches all records of a collection and joins them with extension attributes read from the same pages.
///
/// # Errors
///
/// Same as for [`fetch_all()`].
pub fn fetch_joined<B: Join>(
    api: &dyn NetworkingApi,
    kind: &ResourceKind,
    filters: &ListFilters,
) -> Result<Vec<B::Joined>, FetchError> {
    let pages = fetch_pages(api, kind, filters)?;
    let base: Vec<B> = extract_into(kind, &pages)?;
    let extensions: Vec<B::Extension> = extract_into(kind, &pages)?;
    Ok(join_records(base, &extensions))
}
