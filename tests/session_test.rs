mod helpers;

use helpers::{advance_in_steps, settle, FakeField, FakePage, FakeRetriever};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use mnema::capture::sink::{CaptureMessage, ChannelSink};
use mnema::capture::PageSource;
use mnema::config::MnemaConfig;
use mnema::inject::{HostField, INJECTION_MARKER};
use mnema::retrieval::Retriever;
use mnema::session::SessionContext;

struct Rig {
    page: Arc<FakePage>,
    field: Arc<FakeField>,
    retriever: Arc<FakeRetriever>,
    session: SessionContext,
    rx: mpsc::Receiver<CaptureMessage>,
}

fn rig(response: Option<&str>) -> Rig {
    let page = Arc::new(FakePage::new(
        "https://notes.example/drafts",
        "Drafts",
        "a long draft about credential rotation and where the keys live",
    ));
    let field = Arc::new(FakeField::new("how do I rotate api keys"));
    let retriever = Arc::new(FakeRetriever::new(Duration::from_millis(50), response));
    let (sink, rx) = ChannelSink::new(32);

    let session = SessionContext::start_with_retriever(
        &MnemaConfig::default(),
        Arc::clone(&page) as Arc<dyn PageSource>,
        Arc::new(sink),
        Arc::clone(&field) as Arc<dyn HostField>,
        Arc::clone(&retriever) as Arc<dyn Retriever>,
    );
    Rig {
        page,
        field,
        retriever,
        session,
        rx,
    }
}

fn drain(rx: &mut mpsc::Receiver<CaptureMessage>) -> Vec<CaptureMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test(start_paused = true)]
async fn session_captures_the_page_and_injects_into_the_field() {
    let mut rig = rig(Some("Keys rotate from the org settings page."));
    settle().await;

    // Capture side: the first tick ships the page.
    advance_in_steps(Duration::from_secs(10)).await;
    let messages = drain(&mut rig.rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].url, "https://notes.example/drafts");
    assert_eq!(messages[0].page_metadata.session_id, rig.session.session_id());

    // Injection side: a settled query pulls context into the field.
    rig.session.on_input();
    settle().await;
    advance_in_steps(Duration::from_secs(2)).await;

    assert_eq!(rig.retriever.call_count(), 1);
    let text = rig.field.text().unwrap();
    assert!(text.contains(INJECTION_MARKER));
    assert!(text.ends_with("how do I rotate api keys"));

    rig.session.end().await;
}

#[tokio::test(start_paused = true)]
async fn activity_hook_feeds_the_capture_loop() {
    let mut rig = rig(None);
    settle().await;

    advance_in_steps(Duration::from_secs(10)).await;
    assert_eq!(drain(&mut rig.rx).len(), 1);

    // New content lands and the host reports interaction.
    rig.page
        .set_text("an entirely different draft about quarterly planning instead");
    rig.session.mark_activity();
    advance_in_steps(Duration::from_secs(15)).await;

    let messages = drain(&mut rig.rx);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].full_content.contains("quarterly planning"));

    rig.session.end().await;
}

#[tokio::test(start_paused = true)]
async fn hidden_session_captures_nothing() {
    let mut rig = rig(None);
    settle().await;

    rig.session.set_visible(false);
    settle().await;

    rig.page.set_text("content nobody sees while the tab is hidden");
    rig.session.mark_activity();
    advance_in_steps(Duration::from_secs(120)).await;

    assert!(drain(&mut rig.rx).is_empty());

    rig.session.end().await;
}

#[tokio::test(start_paused = true)]
async fn ended_session_goes_fully_quiet() {
    let mut rig = rig(Some("ctx"));
    settle().await;

    advance_in_steps(Duration::from_secs(10)).await;
    assert_eq!(drain(&mut rig.rx).len(), 1);

    rig.session.end().await;

    advance_in_steps(Duration::from_secs(120)).await;
    assert!(drain(&mut rig.rx).is_empty());
    assert_eq!(rig.retriever.call_count(), 0);
    assert_eq!(rig.field.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn watchdog_revives_a_lost_host_handle() {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    let mut rig = rig(None);
    settle().await;

    let alive = Arc::new(AtomicBool::new(true));
    let revivals = Arc::new(AtomicUsize::new(0));
    {
        let alive = Arc::clone(&alive);
        let revivals = Arc::clone(&revivals);
        rig.session.guard_presence(
            Duration::from_secs(5),
            move || alive.load(Ordering::SeqCst),
            move || {
                revivals.fetch_add(1, Ordering::SeqCst);
            },
        );
    }

    advance_in_steps(Duration::from_secs(10)).await;
    assert_eq!(revivals.load(Ordering::SeqCst), 0);

    alive.store(false, Ordering::SeqCst);
    advance_in_steps(Duration::from_secs(5)).await;
    assert!(revivals.load(Ordering::SeqCst) >= 1);

    rig.session.end().await;
}
