use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::*;
use crate::traits::{FetchedPage, PageFetcher, RawRecord, SourceAdvancer};

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid RFC 3339 timestamp")
}

fn record(author: &str, at: &str) -> RawRecord {
    RawRecord {
        author: author.to_string(),
        content: format!("post by {author}"),
        source_timestamp: Some(ts(at)),
    }
}

/// Config with no delays and a generous default shape; individual tests
/// override the knobs they exercise.
fn test_config() -> CollectorConfig {
    CollectorConfig {
        max_rounds: 50,
        exhausted_rounds: 3,
        no_growth_limit: 3,
        cutoff_buffer_secs: 600,
        round_delay_min_ms: 0,
        round_delay_max_ms: 0,
        budget: None,
    }
}

/// Window 2026-08-07 10:00 → 11:00 used by most tests.
fn test_window() -> CollectionWindow {
    CollectionWindow::explicit(ts("2026-08-07T10:00:00Z"), ts("2026-08-07T11:00:00Z"))
        .expect("valid window")
}

/// What a scripted fetch round should do.
enum Script {
    Page(FetchedPage),
    Transient,
    Fatal,
}

/// A source that replays a fixed script of pages and growth observations.
/// Once the page script is exhausted the last page repeats; once the growth
/// script is exhausted the source stops growing.
struct ScriptedSource {
    script: Vec<Script>,
    growth: Vec<bool>,
    fetches: AtomicUsize,
    advances: AtomicUsize,
}

impl ScriptedSource {
    fn new(script: Vec<Script>, growth: Vec<bool>) -> Self {
        Self {
            script,
            growth,
            fetches: AtomicUsize::new(0),
            advances: AtomicUsize::new(0),
        }
    }

    fn pages(pages: Vec<FetchedPage>, growth: Vec<bool>) -> Self {
        Self::new(pages.into_iter().map(Script::Page).collect(), growth)
    }
}

#[async_trait]
impl PageFetcher for ScriptedSource {
    async fn fetch(&self, _cursor: Option<&str>) -> Result<FetchedPage, CollectError> {
        let idx = self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .get(idx)
            .or_else(|| self.script.last())
            .expect("script must not be empty");
        match step {
            Script::Page(page) => Ok(page.clone()),
            Script::Transient => Err(CollectError::RateLimited {
                retry_after_secs: 30,
            }),
            Script::Fatal => Err(CollectError::Auth { status: 401 }),
        }
    }
}

#[async_trait]
impl SourceAdvancer for ScriptedSource {
    async fn advance(&self) -> Result<bool, CollectError> {
        let idx = self.advances.fetch_add(1, Ordering::SeqCst);
        Ok(self.growth.get(idx).copied().unwrap_or(false))
    }
}

fn page(records: Vec<RawRecord>) -> FetchedPage {
    FetchedPage {
        records,
        next_cursor: Some("next".to_string()),
    }
}

#[tokio::test]
async fn output_never_contains_duplicate_dedup_keys() {
    // The same two records appear on every page.
    let repeated = page(vec![
        record("user1", "2026-08-07T10:05:00Z"),
        record("user2", "2026-08-07T10:06:00Z"),
        record("user1", "2026-08-07T10:05:00Z"),
    ]);
    let source = ScriptedSource::pages(vec![repeated], vec![true, true, true]);
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 2);
    let keys: HashSet<_> = outcome.items.iter().map(CollectedItem::dedup_key).collect();
    assert_eq!(keys.len(), outcome.items.len(), "dedup keys must be unique");
}

#[tokio::test]
async fn output_only_contains_in_window_timestamps() {
    let mixed = page(vec![
        record("early", "2026-08-07T09:59:59Z"),
        record("in1", "2026-08-07T10:00:00Z"),
        record("in2", "2026-08-07T10:30:00Z"),
        record("late", "2026-08-07T11:00:01Z"),
    ]);
    let source = ScriptedSource::pages(vec![mixed], vec![]);
    let collector = WindowCollector::new(&source, test_config());

    let window = test_window();
    let outcome = collector.collect(&window, "threads", "hyundai").await.unwrap();

    assert_eq!(outcome.items.len(), 2);
    for item in &outcome.items {
        assert!(
            window.contains(item.source_timestamp),
            "item at {} escaped the window",
            item.source_timestamp
        );
    }
}

#[tokio::test]
async fn records_without_timestamps_are_skipped() {
    let no_ts = RawRecord {
        author: "ghost".to_string(),
        content: "undated".to_string(),
        source_timestamp: None,
    };
    let source = ScriptedSource::pages(
        vec![page(vec![no_ts, record("user1", "2026-08-07T10:05:00Z")])],
        vec![],
    );
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].author, "user1");
}

#[tokio::test]
async fn exhausted_window_stops_after_k_quiet_rounds() {
    // Round 1 collects one in-window item; every later round repeats it, so
    // nothing new is added and the source keeps growing (isolates the
    // exhausted-window signal from the no-growth signal).
    let only_page = page(vec![record("user1", "2026-08-07T10:05:00Z")]);
    let source = ScriptedSource::pages(vec![only_page], vec![true; 32]);
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::WindowExhausted);
    // Round 1 adds the item; rounds 2..=4 add nothing — K = 3.
    assert_eq!(outcome.rounds, 4);
    assert_eq!(outcome.items.len(), 1);
}

#[tokio::test]
async fn no_growth_stops_once_an_item_was_seen() {
    let only_page = page(vec![record("user1", "2026-08-07T10:05:00Z")]);
    let mut config = test_config();
    config.no_growth_limit = 2;
    // exhausted_rounds stays at 3, so no-growth fires first.
    let source = ScriptedSource::pages(vec![only_page], vec![false; 32]);
    let collector = WindowCollector::new(&source, config);

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::NoGrowth);
    assert_eq!(outcome.rounds, 2);
}

#[tokio::test]
async fn cold_start_is_not_mistaken_for_exhaustion() {
    // Nothing in-window is ever seen: every quiet signal is guarded, so the
    // loop runs all the way to the round cap.
    let old_page = page(vec![record("old", "2026-08-07T08:00:00Z")]);
    let mut config = test_config();
    config.max_rounds = 7;
    let source = ScriptedSource::pages(vec![old_page], vec![false; 32]);
    let collector = WindowCollector::new(&source, config);

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::MaxRounds);
    assert_eq!(outcome.rounds, 7);
    assert!(outcome.items.is_empty());
}

#[tokio::test]
async fn fell_behind_window_stops_after_first_item_seen() {
    // Page 1 is in-window; page 2 is far older than the window start minus
    // the cutoff buffer. Growth continues so only the cutoff signal fires.
    let pages = vec![
        page(vec![record("user1", "2026-08-07T10:05:00Z")]),
        page(vec![record("ancient", "2026-08-07T08:00:00Z")]),
    ];
    let source = ScriptedSource::pages(pages, vec![true; 32]);
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::FellBehindWindow);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.items.len(), 1);
}

#[tokio::test]
async fn page_just_past_window_start_does_not_trigger_cutoff() {
    // 5 minutes older than the window start is within the 10-minute cutoff
    // buffer, so the run keeps going until the window is exhausted.
    let pages = vec![
        page(vec![record("user1", "2026-08-07T10:05:00Z")]),
        page(vec![record("recent-past", "2026-08-07T09:55:00Z")]),
    ];
    let source = ScriptedSource::pages(pages, vec![true; 32]);
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::WindowExhausted);
}

#[tokio::test]
async fn transient_fetch_error_returns_partial_results() {
    let source = ScriptedSource::new(
        vec![
            Script::Page(page(vec![
                record("user1", "2026-08-07T10:05:00Z"),
                record("user2", "2026-08-07T10:06:00Z"),
            ])),
            Script::Transient,
        ],
        vec![true; 32],
    );
    let collector = WindowCollector::new(&source, test_config());

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::TransientError);
    assert_eq!(outcome.items.len(), 2);
}

#[tokio::test]
async fn fatal_fetch_error_propagates() {
    let source = ScriptedSource::new(
        vec![
            Script::Page(page(vec![record("user1", "2026-08-07T10:05:00Z")])),
            Script::Fatal,
        ],
        vec![true; 32],
    );
    let collector = WindowCollector::new(&source, test_config());

    let result = collector.collect(&test_window(), "threads", "hyundai").await;

    assert!(matches!(result, Err(CollectError::Auth { status: 401 })));
}

#[tokio::test]
async fn exhausted_budget_returns_before_fetching() {
    let source = ScriptedSource::pages(
        vec![page(vec![record("user1", "2026-08-07T10:05:00Z")])],
        vec![true; 32],
    );
    let mut config = test_config();
    config.budget = Some(Duration::ZERO);
    let collector = WindowCollector::new(&source, config);

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(outcome.rounds, 0);
    assert!(outcome.items.is_empty());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn max_rounds_caps_a_source_that_never_quiets() {
    // Ten pages, each with a distinct in-window record, but only five rounds
    // allowed.
    let pages: Vec<FetchedPage> = (0..10)
        .map(|i| {
            page(vec![record(
                &format!("user{i}"),
                &format!("2026-08-07T10:{:02}:00Z", i + 1),
            )])
        })
        .collect();
    let mut config = test_config();
    config.max_rounds = 5;
    let source = ScriptedSource::pages(pages, vec![true; 32]);
    let collector = WindowCollector::new(&source, config);

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::MaxRounds);
    assert_eq!(outcome.rounds, 5);
    assert_eq!(outcome.items.len(), 5);
}

/// The three-page scenario: 5 fresh items, then 2 fresh + 3 stale, then
/// nothing new while the source stops growing. With the quiet-round and
/// no-growth limits both at 1, the run stops right after page 3 with 7
/// unique items.
#[tokio::test]
async fn three_page_collection_scenario() {
    let page1 = page(vec![
        record("a1", "2026-08-07T10:50:00Z"),
        record("a2", "2026-08-07T10:48:00Z"),
        record("a3", "2026-08-07T10:45:00Z"),
        record("a4", "2026-08-07T10:44:00Z"),
        record("a5", "2026-08-07T10:41:00Z"),
    ]);
    let page2 = page(vec![
        record("b1", "2026-08-07T10:20:00Z"),
        record("b2", "2026-08-07T10:10:00Z"),
        record("old1", "2026-08-07T09:58:00Z"),
        record("old2", "2026-08-07T09:57:00Z"),
        record("old3", "2026-08-07T09:55:00Z"),
    ]);
    let page3 = FetchedPage {
        records: vec![],
        next_cursor: None,
    };

    let mut config = test_config();
    config.exhausted_rounds = 1;
    config.no_growth_limit = 1;
    let source = ScriptedSource::pages(vec![page1, page2, page3], vec![true, true, false]);
    let collector = WindowCollector::new(&source, config);

    let outcome = collector
        .collect(&test_window(), "threads", "hyundai")
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.items.len(), 7);
    assert_eq!(outcome.stop_reason, StopReason::WindowExhausted);
    let keys: HashSet<_> = outcome.items.iter().map(CollectedItem::dedup_key).collect();
    assert_eq!(keys.len(), 7);
}
