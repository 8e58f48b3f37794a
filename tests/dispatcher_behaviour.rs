use async_trait::async_trait;
use bulwark::config::NotificationConfig;
use bulwark::{
    BulwarkError, EnqueueOutcome, NotificationDispatcher, NotificationLevel, NotificationMessage,
    NotificationTransport, Result,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Records every delivered text; optionally fails the first N sends.
#[derive(Default)]
struct RecordingTransport {
    delivered: Mutex<Vec<String>>,
    attempts: AtomicU32,
    fail_first: u32,
}

impl RecordingTransport {
    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, text: &str) -> Result<()> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            return Err(BulwarkError::Delivery("502 Bad Gateway".to_string()));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Never completes a send.
struct StuckTransport;

#[async_trait]
impl NotificationTransport for StuckTransport {
    async fn send(&self, _text: &str) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "stuck"
    }
}

fn config(level: NotificationLevel) -> NotificationConfig {
    NotificationConfig {
        level,
        retry_delay_ms: 10,
        shutdown_grace_ms: 2_000,
        ..Default::default()
    }
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// 150 messages into a 100-slot buffer leaves exactly the 100 most recent.
#[tokio::test]
async fn overflow_evicts_oldest_and_never_blocks() {
    let dispatcher = NotificationDispatcher::new(
        config(NotificationLevel::All),
        Some(Arc::new(StuckTransport)),
    );
    dispatcher.start();

    let started = Instant::now();
    for cycle in 0..150u64 {
        let outcome = dispatcher.enqueue(NotificationMessage::heartbeat(cycle, dec!(1000), "NORMAL"));
        assert!(outcome.is_queued(), "enqueue #{cycle} was {outcome:?}");
    }
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "enqueue must not wait on a stuck transport"
    );

    // The worker holds at most one message in flight
    let pending = dispatcher.pending();
    assert!(pending.len() == 100 || pending.len() == 99, "pending = {}", pending.len());
    assert_eq!(pending.last().and_then(|m| m.field_value("Cycle")), Some("149"));
    assert!(dispatcher.stats().evicted >= 49);

    dispatcher.shutdown_with_grace(Duration::from_millis(50)).await;
}

/// Messages below the configured level are never delivered and never retried.
#[tokio::test]
async fn below_level_messages_are_never_sent() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher =
        NotificationDispatcher::new(config(NotificationLevel::Alerts), Some(transport.clone()));
    dispatcher.start();

    assert_eq!(
        dispatcher.enqueue(NotificationMessage::heartbeat(1, Decimal::ZERO, "NORMAL")),
        EnqueueOutcome::Filtered
    );
    assert_eq!(
        dispatcher.enqueue(NotificationMessage::trade_opened("EURUSD", "put", dec!(2), 0.7, "NORMAL")),
        EnqueueOutcome::Filtered
    );
    dispatcher.enqueue(NotificationMessage::emergency("5 consecutive losses", 5, "CONSERVATIVE"));

    dispatcher.shutdown().await;
    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].contains("EMERGENCY MODE ACTIVATED"));
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.stats().filtered, 2);
}

/// Delivery order matches enqueue order across kinds.
#[tokio::test]
async fn delivery_is_fifo_across_kinds() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher =
        NotificationDispatcher::new(config(NotificationLevel::All), Some(transport.clone()));

    dispatcher.enqueue(NotificationMessage::trade_opened("EURUSD", "call", dec!(2), 0.7, "NORMAL"));
    dispatcher.enqueue(NotificationMessage::heartbeat(7, dec!(1000), "NORMAL"));
    dispatcher.enqueue(NotificationMessage::trade_closed("EURUSD", true, dec!(1.7), 55.0, dec!(1001.7)));
    dispatcher.enqueue(NotificationMessage::daily_summary(3, 1, dec!(3.1), dec!(1003.1), "EURUSD"));
    dispatcher.start();

    eventually("four deliveries", || transport.delivered().len() == 4).await;
    let titles: Vec<String> = transport
        .delivered()
        .iter()
        .map(|t| t.lines().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        titles,
        vec![
            "📈 *TRADE OPENED*",
            "💓 *HEARTBEAT*",
            "✅ *TRADE CLOSED — WIN*",
            "📊 *DAILY SUMMARY*",
        ]
    );
    dispatcher.shutdown().await;
}

/// A message failing every try is dropped after three, and the next one still goes out.
#[tokio::test]
async fn exhausted_retries_drop_and_continue() {
    let transport = Arc::new(RecordingTransport {
        fail_first: 3,
        ..Default::default()
    });
    let dispatcher =
        NotificationDispatcher::new(config(NotificationLevel::All), Some(transport.clone()));
    dispatcher.start();

    dispatcher.enqueue(NotificationMessage::adjustment("3 consecutive losses", 0.6, 3));
    dispatcher.enqueue(NotificationMessage::emergency_cleared(2));

    eventually("second message delivered", || dispatcher.stats().delivered == 1).await;
    let stats = dispatcher.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);
    assert!(transport.delivered()[0].contains("EMERGENCY MODE CLEARED"));
    dispatcher.shutdown().await;
}

/// Shutdown gives the worker a bounded window, then stops regardless.
#[tokio::test]
async fn shutdown_respects_grace_period() {
    let dispatcher = NotificationDispatcher::new(
        config(NotificationLevel::All),
        Some(Arc::new(StuckTransport)),
    );
    dispatcher.start();
    dispatcher.enqueue(NotificationMessage::emergency_cleared(2));

    let started = Instant::now();
    dispatcher.shutdown_with_grace(Duration::from_millis(100)).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        dispatcher.enqueue(NotificationMessage::emergency_cleared(2)),
        EnqueueOutcome::Closed
    );
}
