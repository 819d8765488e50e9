#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use mnema::capture::snapshot::PageView;
use mnema::capture::PageSource;
use mnema::inject::HostField;
use mnema::retrieval::{RetrievalError, Retriever};

/// A page whose content the test mutates between ticks.
pub struct FakePage {
    view: Mutex<Option<PageView>>,
}

impl FakePage {
    pub fn new(url: &str, title: &str, text: &str) -> Self {
        Self {
            view: Mutex::new(Some(PageView {
                url: url.into(),
                title: title.into(),
                text: text.into(),
            })),
        }
    }

    pub fn set_text(&self, text: &str) {
        if let Some(view) = self.view.lock().unwrap().as_mut() {
            view.text = text.into();
        }
    }

    pub fn navigate(&self, url: &str, title: &str, text: &str) {
        *self.view.lock().unwrap() = Some(PageView {
            url: url.into(),
            title: title.into(),
            text: text.into(),
        });
    }

    /// Make the page unobservable (torn down / mid-navigation).
    pub fn vanish(&self) {
        *self.view.lock().unwrap() = None;
    }
}

impl PageSource for FakePage {
    fn observe(&self) -> Option<PageView> {
        self.view.lock().unwrap().clone()
    }
}

/// An editable field the test types into, recording writes and change
/// notifications.
pub struct FakeField {
    text: Mutex<Option<String>>,
    pub writes: AtomicUsize,
    pub notifications: AtomicUsize,
}

impl FakeField {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
            writes: AtomicUsize::new(0),
            notifications: AtomicUsize::new(0),
        }
    }

    /// Simulate the user replacing the field's text.
    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.into());
    }

    /// Simulate the field being removed from the page.
    pub fn remove(&self) {
        *self.text.lock().unwrap() = None;
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

impl HostField for FakeField {
    fn read_text(&self) -> Option<String> {
        self.text.lock().unwrap().clone()
    }

    fn write_text(&self, text: &str) -> bool {
        let mut slot = self.text.lock().unwrap();
        if slot.is_none() {
            return false;
        }
        *slot = Some(text.into());
        self.writes.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn notify_changed(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// Retriever double: answers after a fixed (virtual) delay and records every
/// query it was asked.
pub struct FakeRetriever {
    pub delay: Duration,
    pub response: Mutex<Option<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn new(delay: Duration, response: Option<&str>) -> Self {
        Self {
            delay,
            response: Mutex::new(response.map(String::from)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, query: &str) -> Result<Option<String>, RetrievalError> {
        self.calls.lock().unwrap().push(query.to_string());
        tokio::time::sleep(self.delay).await;
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Let spawned tasks run up to the current (paused) instant.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time in small steps so loops can re-register their timers
/// between steps.
pub async fn advance_in_steps(total: Duration) {
    let step = Duration::from_millis(500);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        let chunk = remaining.min(step);
        tokio::time::advance(chunk).await;
        settle().await;
        remaining -= chunk;
    }
}
