//! Current-page reporting for reading analytics.

pub type PageChangeCallback = Box<dyn FnMut(u32) + Send>;

/// Forwards page changes to a callback, skipping repeats.
#[derive(Default)]
pub struct PageTracker {
    callback: Option<PageChangeCallback>,
    last_reported: Option<u32>,
    reports: u64,
}

impl PageTracker {
    pub fn new(callback: Option<PageChangeCallback>) -> Self {
        Self { callback, last_reported: None, reports: 0 }
    }

    pub fn set_callback(&mut self, callback: PageChangeCallback) {
        self.callback = Some(callback);
    }

    /// Report `page`; the callback runs only if it differs from the last one.
    pub fn report(&mut self, page: u32) -> bool {
        if self.last_reported == Some(page) {
            return false;
        }

        self.last_reported = Some(page);
        self.reports += 1;

        if let Some(callback) = self.callback.as_mut() {
            callback(page);
        }

        true
    }

    /// Forget the last page, e.g. when a new document is loaded.
    pub fn reset(&mut self) {
        self.last_reported = None;
    }

    /// Drop the callback; later reports are recorded but not forwarded.
    pub fn detach(&mut self) {
        self.callback = None;
    }

    pub fn last_reported(&self) -> Option<u32> {
        self.last_reported
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl std::fmt::Debug for PageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTracker")
            .field("has_callback", &self.callback.is_some())
            .field("last_reported", &self.last_reported)
            .field("reports", &self.reports)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (PageTracker, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = PageTracker::new(Some(Box::new(move |page| sink.lock().unwrap().push(page))));
        (tracker, seen)
    }

    #[test]
    fn repeats_are_not_forwarded() {
        let (mut tracker, seen) = recording();

        assert!(tracker.report(1));
        assert!(!tracker.report(1));
        assert!(tracker.report(2));
        assert!(tracker.report(1));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
        assert_eq!(tracker.reports(), 3);
    }

    #[test]
    fn reset_allows_same_page_again() {
        let (mut tracker, seen) = recording();

        tracker.report(4);
        tracker.reset();
        tracker.report(4);

        assert_eq!(*seen.lock().unwrap(), vec![4, 4]);
    }

    #[test]
    fn works_without_callback() {
        let mut tracker = PageTracker::default();
        assert!(tracker.report(3));
        assert_eq!(tracker.last_reported(), Some(3));
    }

    #[test]
    fn detached_callback_is_not_called() {
        let (mut tracker, seen) = recording();
        tracker.detach();
        tracker.report(2);
        assert!(seen.lock().unwrap().is_empty());
    }
}
