//! In-memory [`NetworkingApi`] implementation.

use serde::Deserialize;
use serde_json::{Map, Value};

use std::{
    collections::HashMap,
    error, fmt,
    sync::Mutex,
    thread,
    time::Duration,
};

use super::{ApiError, ListFilters, NetworkingApi, Page, PageCursor, ResourceKind};

/// Error loading a [`FixtureApi`] from JSON.
#[derive(Debug)]
pub struct FixtureError(serde_json::Error);

impl fmt::Display for FixtureError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "invalid API fixture: {}", self.0)
    }
}

impl error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Serialized form of a fixture.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    page_size: usize,
    /// Records keyed by the collection path, e.g. `/v2.0/ports`.
    #[serde(default)]
    collections: HashMap<String, Vec<Value>>,
    /// Zero-based page indices on which requests fail, keyed by the collection path.
    #[serde(default)]
    failing_pages: HashMap<String, usize>,
}

/// [`NetworkingApi`] serving predefined pages from memory.
///
/// Cursors are page indices. Filters are applied to each page separately by comparing the textual
/// form of record fields with the filter values. Collections that were not configured are served
/// as a single empty page.
///
/// # Examples
///
/// ```
/// use neutron_metrics::api::{FixtureApi, ResourceKind};
/// use serde_json::json;
///
/// let api = FixtureApi::new(2).with_records(
///     &ResourceKind::Subnets,
///     vec![json!({ "id": "s1" }), json!({ "id": "s2" }), json!({ "id": "s3" })],
/// );
/// // Records are split into 2 pages: `[s1, s2]` and `[s3]`.
/// # drop(api);
/// ```
#[derive(Debug, Default)]
pub struct FixtureApi {
    page_size: usize,
    pages: HashMap<String, Vec<Vec<Value>>>,
    failing_pages: HashMap<String, usize>,
    latency: Duration,
    requests: Mutex<HashMap<String, usize>>,
}

impl FixtureApi {
    /// Creates an empty fixture. Records added with [`Self::with_records()`] are split into pages
    /// of `page_size` records; `0` means that all records are served in a single page.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Loads a fixture from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has an unexpected shape.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_json::from_str(json).map_err(FixtureError)?;
        let mut this = Self::new(file.page_size);
        for (path, records) in file.collections {
            let pages = this.paginate(records);
            this.pages.insert(path, pages);
        }
        this.failing_pages = file.failing_pages;
        Ok(this)
    }

    fn paginate(&self, records: Vec<Value>) -> Vec<Vec<Value>> {
        if self.page_size == 0 || records.len() <= self.page_size {
            return vec![records];
        }
        records
            .chunks(self.page_size)
            .map(<[Value]>::to_vec)
            .collect()
    }

    /// Sets records for the specified collection, splitting them into pages.
    #[must_use]
    pub fn with_records(mut self, kind: &ResourceKind, records: Vec<Value>) -> Self {
        let pages = self.paginate(records);
        self.pages.insert(kind.path().into_owned(), pages);
        self
    }

    /// Sets explicit pages for the specified collection. Pages may be empty.
    #[must_use]
    pub fn with_pages(mut self, kind: &ResourceKind, pages: Vec<Vec<Value>>) -> Self {
        self.pages.insert(kind.path().into_owned(), pages);
        self
    }

    /// Makes requests for the specified page of a collection fail.
    #[must_use]
    pub fn with_failing_page(mut self, kind: &ResourceKind, page_index: usize) -> Self {
        self.failing_pages
            .insert(kind.path().into_owned(), page_index);
        self
    }

    /// Sets the artificial latency of each request.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns the number of page requests made for the specified collection.
    pub fn request_count(&self, kind: &ResourceKind) -> usize {
        let requests = self.requests.lock().unwrap_or_else(|err| err.into_inner());
        requests.get(kind.path().as_ref()).copied().unwrap_or(0)
    }

    fn matches(record: &Value, filters: &ListFilters) -> bool {
        filters.iter().all(|(field, expected)| match record.get(field) {
            Some(Value::String(value)) => value == expected,
            Some(Value::Null) | None => expected.is_empty(),
            Some(value) => value.to_string() == expected,
        })
    }
}

impl NetworkingApi for FixtureApi {
    fn list_page(
        &self,
        kind: &ResourceKind,
        filters: &ListFilters,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, ApiError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let path = kind.path();
        {
            let mut requests = self.requests.lock().unwrap_or_else(|err| err.into_inner());
            *requests.entry(path.clone().into_owned()).or_default() += 1;
        }

        let page_index = match cursor {
            None => 0,
            Some(cursor) => cursor.as_str().parse::<usize>().map_err(|err| {
                ApiError::new(format!("malformed cursor `{}`", cursor.as_str()))
                    .with_status(400)
                    .with_source(err)
            })?,
        };
        if self.failing_pages.get(path.as_ref()) == Some(&page_index) {
            return Err(ApiError::new(format!("GET {path} failed (page {page_index})"))
                .with_status(500));
        }

        let pages = self.pages.get(path.as_ref());
        let page_count = pages.map_or(1, Vec::len);
        let records: Vec<_> = pages
            .and_then(|pages| pages.get(page_index))
            .into_iter()
            .flatten()
            .filter(|record| Self::matches(record, filters))
            .cloned()
            .collect();

        let next = (page_index + 1 < page_count)
            .then(|| PageCursor::new((page_index + 1).to_string()));
        let mut body = Map::with_capacity(1);
        body.insert(kind.collection_key().to_owned(), Value::Array(records));
        Ok(Page::new(Value::Object(body), next))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn paginating_records() {
        let records = (0..5).map(|i| json!({ "id": i.to_string() })).collect();
        let api = FixtureApi::new(2).with_records(&ResourceKind::Subnets, records);
        let filters = ListFilters::none();

        let first = api.list_page(&ResourceKind::Subnets, &filters, None).unwrap();
        assert_eq!(first.body()["subnets"].as_array().unwrap().len(), 2);
        let cursor = first.next().unwrap().clone();
        assert_eq!(cursor.as_str(), "1");

        let second = api
            .list_page(&ResourceKind::Subnets, &filters, Some(&cursor))
            .unwrap();
        let third = api
            .list_page(&ResourceKind::Subnets, &filters, second.next())
            .unwrap();
        assert_eq!(third.body()["subnets"], json!([{ "id": "4" }]));
        assert!(!third.has_more());
        assert_eq!(api.request_count(&ResourceKind::Subnets), 3);
    }

    #[test]
    fn unknown_collections_are_empty() {
        let api = FixtureApi::new(0);
        let page = api
            .list_page(&ResourceKind::Agents, &ListFilters::none(), None)
            .unwrap();
        assert_eq!(page.body(), &json!({ "agents": [] }));
        assert!(!page.has_more());
    }

    #[test]
    fn applying_filters() {
        let records = vec![
            json!({ "id": "a", "status": "ACTIVE", "ip_version": 4 }),
            json!({ "id": "b", "status": "DOWN", "ip_version": 6 }),
        ];
        let api = FixtureApi::new(0).with_records(&ResourceKind::Ports, records);

        let filters = ListFilters::none().with("status", "DOWN");
        let page = api.list_page(&ResourceKind::Ports, &filters, None).unwrap();
        assert_eq!(page.body()["ports"], json!([{ "id": "b", "status": "DOWN", "ip_version": 6 }]));

        let filters = ListFilters::none().with("ip_version", "4");
        let page = api.list_page(&ResourceKind::Ports, &filters, None).unwrap();
        assert_eq!(page.body()["ports"][0]["id"], "a");
    }

    #[test]
    fn injecting_failures() {
        let api = FixtureApi::new(1)
            .with_records(&ResourceKind::Networks, vec![json!({}), json!({})])
            .with_failing_page(&ResourceKind::Networks, 1);
        let filters = ListFilters::none();
        let first = api.list_page(&ResourceKind::Networks, &filters, None).unwrap();
        let err = api
            .list_page(&ResourceKind::Networks, &filters, first.next())
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("/v2.0/networks"), "{err}");

        let err = api
            .list_page(&ResourceKind::Networks, &filters, Some(&PageCursor::new("?")))
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn loading_fixture_from_json() {
        let api = FixtureApi::from_json(
            r#"{
                "page_size": 1,
                "collections": {
                    "/v2.0/routers": [{ "id": "r1" }, { "id": "r2" }]
                },
                "failing_pages": { "/v2.0/routers/r2/l3-agents": 0 }
            }"#,
        )
        .unwrap();

        let page = api
            .list_page(&ResourceKind::Routers, &ListFilters::none(), None)
            .unwrap();
        assert!(page.has_more());
        let kind = ResourceKind::RouterL3Agents {
            router_id: "r2".to_owned(),
        };
        api.list_page(&kind, &ListFilters::none(), None).unwrap_err();

        let err = FixtureApi::from_json(r#"{ "pages": 3 }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid API fixture"), "{err}");
    }
}
