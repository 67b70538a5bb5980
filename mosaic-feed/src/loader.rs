//! Page loading contract.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// One page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Items requested per page.
    pub page_size: u32,
}

/// One page of items as returned by a feed backend.
///
/// Deserializes from `{"data" | "items": [...], "hasMore": bool,
/// "isMasonry"?: bool}`.
///
/// # Examples
///
/// ```
/// use mosaic_feed::PageResponse;
///
/// let page: PageResponse<serde_json::Value> = serde_json::from_str(
///     r#"{"data": [{"width": 300, "height": 200}], "hasMore": true, "isMasonry": false}"#,
/// )
/// .unwrap();
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.is_masonry, Some(false));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<R> {
    /// Items in feed order.
    #[serde(alias = "data")]
    pub items: Vec<R>,
    /// Whether another page exists.
    #[serde(default)]
    pub has_more: bool,
    /// Layout hint. Only consulted on the page that resolves the layout mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_masonry: Option<bool>,
}

impl<R> PageResponse<R> {
    /// Creates a response without a layout hint.
    pub fn new(items: Vec<R>, has_more: bool) -> Self {
        Self {
            items,
            has_more,
            is_masonry: None,
        }
    }

    /// Attaches a layout hint.
    pub fn with_is_masonry(mut self, is_masonry: bool) -> Self {
        self.is_masonry = Some(is_masonry);
        self
    }
}

/// Fetches pages for a feed.
///
/// Any `Fn(PageRequest) -> impl Future<Output = Result<PageResponse<R>,
/// LoadError>>` is a loader.
pub trait PageLoader: Send + Sync {
    /// Record type of the feed.
    type Item: Send;

    /// Fetches one page.
    fn load_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<PageResponse<Self::Item>, LoadError>> + Send;
}

impl<F, Fut, R> PageLoader for F
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResponse<R>, LoadError>> + Send,
    R: Send,
{
    type Item = R;

    fn load_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<PageResponse<R>, LoadError>> + Send {
        self(request)
    }
}
