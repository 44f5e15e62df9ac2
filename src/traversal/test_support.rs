//! In-crate test source: the integers `0..len` paged in ascending order.

use super::traversable::{Page, Traversable};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) struct NumberSource {
    len: u32,
    report_has_more: bool,
    over_deliver: bool,
    fail_on_request: Option<usize>,
    requests: Mutex<Vec<(Option<u32>, usize)>>,
}

impl NumberSource {
    pub(crate) fn new(len: u32) -> Self {
        Self {
            len,
            report_has_more: true,
            over_deliver: false,
            fail_on_request: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always report `has_more = true`, forcing a trailing empty page
    pub(crate) fn without_has_more(mut self) -> Self {
        self.report_has_more = false;
        self
    }

    /// Ignore `limit` and return twice as many items
    pub(crate) fn over_delivering(mut self) -> Self {
        self.over_deliver = true;
        self
    }

    /// Fail the n-th `get_page` call (0-based)
    pub(crate) fn failing_on_request(mut self, request: usize) -> Self {
        self.fail_on_request = Some(request);
        self
    }

    pub(crate) fn requests(&self) -> Vec<(Option<u32>, usize)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Traversable for NumberSource {
    type Item = u32;
    type Cursor = u32;

    async fn get_page(&self, after: Option<&u32>, limit: usize) -> anyhow::Result<Page<u32>> {
        let request_number = {
            let mut requests = self.requests.lock();
            requests.push((after.copied(), limit));
            requests.len() - 1
        };
        if self.fail_on_request == Some(request_number) {
            anyhow::bail!("injected failure on request {request_number}");
        }

        let start = after.map_or(0, |cursor| cursor + 1);
        let take = if self.over_deliver { limit * 2 } else { limit };
        let items: Vec<u32> = (start..self.len).take(take).collect();
        let has_more = if self.report_has_more {
            items.last().is_some_and(|last| last + 1 < self.len)
        } else {
            true
        };
        Ok(Page::new(items, has_more))
    }

    fn cursor_of(&self, item: &u32) -> u32 {
        *item
    }
}
