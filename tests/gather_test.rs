use std::collections::HashMap;

use async_trait::async_trait;
use rs_mediasweep::{
    sweep_html, sweep_html_with_config, Dimensions, Error, GatherConfig, Host, HtmlPage,
    ResourceProber, Result, Session, SessionConfig, SourceKind, UnavailableProber,
};

fn urls(records: &[rs_mediasweep::AssetRecord]) -> Vec<&str> {
    records.iter().map(|r| r.canonical_url.as_str()).collect()
}

#[tokio::test]
async fn background_image_without_src_yields_one_css_record() {
    let page = HtmlPage::from_html(
        "https://example.com/gallery/index.html",
        r#"<div class="hero" style="background-image: url('b.png')"></div>"#,
    )
    .expect("expected Ok(_)");
    let prober = UnavailableProber;
    let mut session = Session::new(Host::new(&page, &prober), SessionConfig::default());

    let records = session
        .gather_assets(&GatherConfig::default())
        .await
        .expect("expected Ok(_)");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_kind, SourceKind::CssBackground);
    assert!(records[0].canonical_url.as_str().ends_with("/b.png"));
    assert_eq!(records[0].canonical_url.as_str(), "https://example.com/gallery/b.png");
    assert_eq!(records[0].format.as_deref(), Some("png"));
}

#[test]
fn first_seen_wins_when_urls_canonicalize_equal() {
    let html = r#"
        <img id="one" src="/img/a.jpg?b=2&a=1#top" alt="first">
        <img id="two" src="https://example.com/img/a.jpg?a=1&b=2" alt="second">
        <img id="three" src="/img/b.jpg">
    "#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");

    assert_eq!(
        urls(&gathered.records),
        vec!["https://example.com/img/a.jpg?a=1&b=2", "https://example.com/img/b.jpg"]
    );
    assert_eq!(gathered.records[0].metadata.get("alt").map(String::as_str), Some("first"));
    assert_eq!(gathered.stats.duplicates, 1);
}

#[test]
fn deduplication_can_be_disabled() {
    let html = r#"<img src="a.jpg"><img src="a.jpg">"#;
    let config = GatherConfig {
        deduplicate: false,
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", html, &config).expect("expected Ok(_)");
    assert_eq!(gathered.records.len(), 2);
}

#[test]
fn lazy_srcset_and_wrapper_sources() {
    let html = r#"
        <img class="lazy" src="data:image/gif;base64,R0lGODlhAQABAAAAACw=" data-src="/img/lazy.jpg">
        <picture>
            <source srcset="/img/p-480.webp 480w, /img/p-1200.webp 1200w">
            <img src="/img/p-fallback.jpg">
        </picture>
        <figure><img data-original="/img/fig.jpg"><figcaption>Fig</figcaption></figure>
        <video poster="/img/poster.jpg"></video>
    "#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");
    let found: Vec<(&str, SourceKind)> = gathered
        .records
        .iter()
        .map(|r| (r.canonical_url.as_str(), r.source_kind))
        .collect();

    assert!(found.contains(&("https://example.com/img/lazy.jpg", SourceKind::LazyAttribute)));
    assert!(found.contains(&("https://example.com/img/p-1200.webp", SourceKind::Srcset)));
    assert!(found.contains(&("https://example.com/img/p-fallback.jpg", SourceKind::DirectAttribute)));
    assert!(found.contains(&("https://example.com/img/fig.jpg", SourceKind::LazyAttribute)));
    assert!(found.contains(&("https://example.com/img/poster.jpg", SourceKind::DirectAttribute)));
    assert!(!found.iter().any(|(u, _)| u.starts_with("data:")));
}

#[test]
fn multiple_background_layers_and_secondary_sweep() {
    let html = r#"
        <section style="background-image: url(/bg/one.jpg), url('/bg/two.png')"></section>
        <span data-bg="/bg/lazy.jpg"></span>
        <div style="background: none"></div>
    "#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");
    assert_eq!(
        urls(&gathered.records),
        vec![
            "https://example.com/bg/lazy.jpg",
            "https://example.com/bg/one.jpg",
            "https://example.com/bg/two.png",
        ]
    );
}

#[test]
fn video_yields_poster_not_clip() {
    let html = r#"<video src="/media/clip.mp4" poster="/img/poster.jpg"></video>"#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");

    assert_eq!(urls(&gathered.records), vec!["https://example.com/img/poster.jpg"]);
    assert_eq!(gathered.records[0].source_kind, SourceKind::DirectAttribute);
    assert_eq!(gathered.records[0].format.as_deref(), Some("jpg"));
}

#[test]
fn secondary_sweep_covers_asset_bearing_nodes() {
    let html = r#"
        <img src="/img/a.jpg" style="background-image: url('/img/b.png')">
        <img src="/img/c.jpg" style="background-image: url('/img/c.jpg')">
    "#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");

    assert_eq!(
        urls(&gathered.records),
        vec![
            "https://example.com/img/a.jpg",
            "https://example.com/img/c.jpg",
            "https://example.com/img/b.png",
        ]
    );
    assert_eq!(gathered.records[2].source_kind, SourceKind::CssBackground);
    assert_eq!(gathered.stats.nodes_visited, 2);
    assert_eq!(gathered.stats.duplicates, 1);
}

#[test]
fn non_asset_and_invalid_urls_are_counted_not_reported() {
    let html = r#"
        <img src="/track/pixel">
        <img src="javascript:void(0)">
        <img src="/photos/ok.jpg">
    "#;
    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");
    assert_eq!(urls(&gathered.records), vec!["https://example.com/photos/ok.jpg"]);
    assert_eq!(gathered.stats.skipped, 2);
}

#[test]
fn invalid_selectors_are_skipped() {
    let config = GatherConfig {
        selectors: vec!["img[[[".to_string(), "img".to_string()],
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", r#"<img src="a.jpg">"#, &config)
        .expect("expected Ok(_)");
    assert_eq!(gathered.records.len(), 1);
}

#[test]
fn linked_full_size_becomes_canonical() {
    let html = r#"
        <a href="/full/1.jpg"><img src="/thumbs/1.jpg"></a>
        <a href="/about/team"><img src="/thumbs/2.jpg"></a>
    "#;
    let config = GatherConfig {
        follow_links: true,
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", html, &config).expect("expected Ok(_)");

    assert_eq!(gathered.records[0].canonical_url.as_str(), "https://example.com/full/1.jpg");
    assert_eq!(
        gathered.records[0].thumbnail_url.as_ref().map(|u| u.as_str()),
        Some("https://example.com/thumbs/1.jpg")
    );
    // link target is not an asset
    assert_eq!(gathered.records[1].canonical_url.as_str(), "https://example.com/thumbs/2.jpg");
    assert!(gathered.records[1].thumbnail_url.is_none());
}

#[test]
fn container_selector_restricts_gathering() {
    let html = r#"
        <header><img src="/img/logo.png"></header>
        <main id="gallery"><img src="/img/1.jpg"><div style="background-image:url(/img/2.jpg)"></div></main>
    "#;
    let config = GatherConfig {
        container_selector: Some("#gallery".to_string()),
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", html, &config).expect("expected Ok(_)");
    assert_eq!(
        urls(&gathered.records),
        vec!["https://example.com/img/1.jpg", "https://example.com/img/2.jpg"]
    );
}

#[test]
fn format_and_displayed_size_gate() {
    let html = r#"
        <img src="/img/big.jpg" width="800" height="600">
        <img src="/img/small.jpg" width="40" height="40">
        <img src="/img/big.gif" width="800" height="600">
        <img src="/img/unknown" width="800" height="600">
    "#;
    let config = GatherConfig {
        min_width: Some(100),
        min_height: Some(100),
        allowed_formats: vec!["jpg".to_string()],
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", html, &config).expect("expected Ok(_)");

    assert_eq!(
        urls(&gathered.records),
        vec!["https://example.com/img/big.jpg", "https://example.com/img/unknown"]
    );
    assert_eq!(gathered.stats.rejected, 2);
    assert_eq!(gathered.records[0].displayed_dimensions, Dimensions::new(800, 600));
}

struct TableProber(HashMap<String, Dimensions>);

#[async_trait(?Send)]
impl ResourceProber for TableProber {
    async fn probe(&self, url: &str) -> Result<Dimensions> {
        self.0.get(url).copied().ok_or_else(|| Error::ResourceProbeFailed {
            url: url.to_string(),
            reason: "not found".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn probed_dimensions_feed_the_gate() {
    let page = HtmlPage::from_html(
        "https://example.com/",
        r#"<img src="/img/a.jpg" width="100" height="100"><img src="/img/b.jpg"><img src="/img/missing.jpg">"#,
    )
    .expect("expected Ok(_)");
    let prober = TableProber(HashMap::from([
        ("https://example.com/img/a.jpg".to_string(), Dimensions::new(1600, 1200)),
        ("https://example.com/img/b.jpg".to_string(), Dimensions::new(300, 200)),
    ]));
    let mut session = Session::new(Host::new(&page, &prober), SessionConfig::default());

    let config = GatherConfig {
        probe_dimensions: true,
        ..GatherConfig::default()
    };
    let gathered = session.gather_assets_with_stats(&config).await.expect("expected Ok(_)");
    assert_eq!(gathered.records.len(), 3);
    assert_eq!(gathered.records[0].natural_dimensions, Some(Dimensions::new(1600, 1200)));
    assert_eq!(gathered.records[2].natural_dimensions, Some(Dimensions::ZERO));
    assert_eq!(gathered.stats.probe_failures, 1);

    let gated = GatherConfig {
        min_width: Some(500),
        ..config
    };
    let records = session.gather_assets(&gated).await.expect("expected Ok(_)");
    assert_eq!(urls(&records), vec!["https://example.com/img/a.jpg"]);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_aborts_when_not_continuing() {
    let page = HtmlPage::from_html("https://example.com/", r#"<img src="/img/a.jpg">"#).expect("expected Ok(_)");
    let prober = UnavailableProber;
    let mut session = Session::new(Host::new(&page, &prober), SessionConfig::default());

    let mut config = GatherConfig {
        probe_dimensions: true,
        ..GatherConfig::default()
    };
    config.probe_batch.continue_on_error = false;

    let result = session.gather_assets(&config).await;
    assert!(matches!(result, Err(Error::BatchItemFailed { index: 0, .. })));
}

#[test]
fn metadata_can_be_switched_off() {
    let html = r#"<img src="a.jpg" alt="A" data-id="1">"#;
    let config = GatherConfig {
        include_metadata: false,
        ..GatherConfig::default()
    };
    let gathered = sweep_html_with_config("https://example.com/", html, &config).expect("expected Ok(_)");
    assert!(gathered.records[0].metadata.is_empty());

    let gathered = sweep_html("https://example.com/", html).expect("expected Ok(_)");
    assert_eq!(gathered.records[0].metadata.len(), 2);
}
