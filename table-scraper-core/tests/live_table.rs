//! Integration tests against a real browser.
//!
//! These tests launch a headless Chrome/Chromium instance via CDP and build a
//! small infinite-scroll table in the page. They are `#[ignore]` by default
//! because they require a Chrome/Chromium binary installed.
//!
//! Run with:
//!   cargo test -p table-scraper-core --test live_table -- --ignored

use std::collections::HashSet;
use table_scraper_core::browser::{BrowserManager, BrowserManagerConfig};
use table_scraper_core::collector::{CollectionState, Collector, MemorySink, StopReason};
use table_scraper_core::config::{CollectorSettings, TableSelectors};
use table_scraper_core::dom;
use table_scraper_core::surface::ChromeTableSurface;
use table_scraper_core::writer::JsonFileWriter;

/// Create a headless BrowserManager for testing.
fn test_manager() -> BrowserManager {
    BrowserManager::new(BrowserManagerConfig {
        headless: true,
        ..Default::default()
    })
}

/// Builds a table that renders 5 rows at a time, shows a "..." placeholder
/// row for 300ms while "loading", and stops after `total` rows. Row 7 has no
/// rating span.
fn virtual_table_js(total: u32) -> String {
    format!(
        r##"
(() => {{
    const total = {total};
    document.body.innerHTML = `
        <div class="rounded-md border shadow-sm bg-card">
            <div style="height: 200px; overflow-y: auto">
                <table><tbody></tbody></table>
            </div>
        </div>
        <button>Open Menu</button>`;
    const scroller = document.querySelector('div.bg-card > div');
    const body = document.querySelector('tbody');
    let loaded = 0;
    let loading = false;

    const addRows = (n) => {{
        for (let i = 0; i < n && loaded < total; i++) {{
            loaded += 1;
            const tr = document.createElement('tr');
            tr.className = 'infinite-table-row-appear';
            tr.style.height = '40px';
            const rating = loaded === 7 ? '' : `<span>${{(loaded % 5) + 0.5}}</span>`;
            tr.innerHTML = `<td>${{loaded}}</td><td>2024-01-${{loaded}}</td><td>Tools</td>`
                + `<td>Steel</td><td>$${{loaded}}.00</td><td>1.${{loaded}}</td><td>Item ${{loaded}}</td>`
                + `<td>${{rating}}</td><td>Maker ${{loaded}}</td>`;
            body.appendChild(tr);
        }}
    }};

    scroller.addEventListener('scroll', () => {{
        if (loading || loaded >= total) return;
        loading = true;
        const placeholder = document.createElement('tr');
        placeholder.innerHTML = '<td>...</td><td>...</td>';
        body.appendChild(placeholder);
        setTimeout(() => {{
            placeholder.remove();
            addRows(5);
            loading = false;
        }}, 300);
    }});

    addRows(5);
    return true;
}})()
"##
    )
}

fn fast_settings() -> CollectorSettings {
    CollectorSettings {
        max_iterations: 50,
        settle_ms: 100,
        loader_appear_ms: 500,
        loader_clear_ms: 2000,
    }
}

// ---------------------------------------------------------------------------
// Test 1: Full collection of a small virtual table
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn test_collects_virtual_table_until_exhausted() {
    let manager = test_manager();
    let page = manager.page().await.expect("page");

    page.evaluate_expression(virtual_table_js(23))
        .await
        .expect("table setup");

    let surface = ChromeTableSurface::new(page.clone(), TableSelectors::default());
    let tmp = tempfile::tempdir().unwrap();
    let mut writer = JsonFileWriter::new(tmp.path().join("products.json"));

    let report = Collector::new(fast_settings(), "...")
        .collect(&surface, CollectionState::new(0), &mut writer)
        .await
        .expect("collection should not fail");

    manager.shutdown().await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.records.len(), 23);

    let ids: HashSet<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 23);

    let unrated = report.records.iter().find(|r| r.id == "7").unwrap();
    assert_eq!(unrated.rating, 0.0);
    assert_eq!(unrated.item, "Item 7");

    let on_disk = std::fs::read_to_string(writer.path()).unwrap();
    assert!(on_disk.contains("\"Maker 23\""));
}

// ---------------------------------------------------------------------------
// Test 2: Expected total stops early
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn test_expected_total_stops_early() {
    let manager = test_manager();
    let page = manager.page().await.expect("page");

    page.evaluate_expression(virtual_table_js(40))
        .await
        .expect("table setup");

    let surface = ChromeTableSurface::new(page.clone(), TableSelectors::default());
    let mut sink = MemorySink::default();

    let report = Collector::new(fast_settings(), "...")
        .collect(&surface, CollectionState::new(12), &mut sink)
        .await
        .expect("collection should not fail");

    manager.shutdown().await;

    assert_eq!(report.stop_reason, StopReason::TargetReached);
    assert_eq!(report.records.len(), 12);
    assert_eq!(report.records[11].id, "12");
}

// ---------------------------------------------------------------------------
// Test 3: Closing the browser mid-run returns what was collected
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn test_closed_browser_returns_partial_results() {
    let manager = test_manager();
    let page = manager.page().await.expect("page");

    page.evaluate_expression(virtual_table_js(100))
        .await
        .expect("table setup");

    let surface = ChromeTableSurface::new(page.clone(), TableSelectors::default());
    let mut sink = MemorySink::default();

    let closer = async {
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        manager.shutdown().await;
    };
    let collector = Collector::new(fast_settings(), "...");
    let collect = collector.collect(
        &surface,
        CollectionState::new(0),
        &mut sink,
    );

    let (report, _) = tokio::join!(collect, closer);
    let report = report.expect("surface loss must not surface as an error");

    assert!(matches!(report.stop_reason, StopReason::SurfaceLost { .. }));
    assert!(!report.records.is_empty());
    assert!(report.records.len() < 100);
}

// ---------------------------------------------------------------------------
// Test 4: Text lookup used by the navigator
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn test_wait_for_and_click_text() {
    let manager = test_manager();
    let page = manager.page().await.expect("page");

    page.evaluate_expression(virtual_table_js(5))
        .await
        .expect("table setup");

    let poll = std::time::Duration::from_millis(100);
    let found = dom::wait_for_text(&page, "open menu", std::time::Duration::from_secs(1), poll)
        .await
        .unwrap();
    assert!(found);

    let missing = dom::wait_for_text(&page, "Inventory", std::time::Duration::from_millis(300), poll)
        .await
        .unwrap();
    assert!(!missing);

    dom::click_text(&page, "Open Menu").await.unwrap();
    manager.shutdown().await;
}
