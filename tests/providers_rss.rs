use buloradar::ingest::providers::RssProvider;
use buloradar::ingest::types::SourceProvider;
use buloradar::ingest::{fetch_all, merge};

const NEWS_XML: &str = include_str!("fixtures/news_rss.xml");
const CHECKS_XML: &str = include_str!("fixtures/factcheck_atom.xml");

#[tokio::test]
async fn rss_fixture_yields_clean_items() {
    let provider = RssProvider::from_fixture("Diario", NEWS_XML, 10);
    let items = provider.fetch_latest().await.expect("rss parse ok");

    assert_eq!(items.len(), 4, "blank title must be skipped");
    assert!(items.iter().all(|i| i.source == "Diario"));
    assert_eq!(items[0].title, "ESTO ES UNA BOMBA!!");
    assert_eq!(items[3].title, r#"La cura milagrosa que "nos ocultan""#);
    assert_eq!(items[3].link, "https://noticia-ab12cd34ef.com/cura");
}

#[tokio::test]
async fn per_feed_limit_applies() {
    let provider = RssProvider::from_fixture("Diario", NEWS_XML, 2);
    let items = provider.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn atom_fixture_yields_entries_with_links() {
    let provider = RssProvider::from_fixture("Verificador", CHECKS_XML, 25);
    let items = provider.fetch_latest().await.expect("atom parse ok");

    let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
    assert_eq!(
        links,
        vec![
            "https://verificador.test/bulo-cura",
            "https://verificador.test/bulo-5g"
        ]
    );
}

#[tokio::test]
async fn broken_feed_is_reported_and_others_survive() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(RssProvider::from_fixture("Diario", NEWS_XML, 10)),
        Box::new(RssProvider::from_fixture("Roto", "<html>502 Bad Gateway</html>", 10)),
        Box::new(RssProvider::from_fixture("Verificador", CHECKS_XML, 25)),
    ];
    let reports = fetch_all(&providers).await;
    assert!(!reports[0].outcome.is_skipped());
    assert!(reports[1].outcome.is_skipped());

    let (items, skipped) = merge(reports);
    assert_eq!(items.len(), 6);
    assert_eq!(items[0].source, "Diario");
    assert_eq!(items[5].source, "Verificador");
    assert_eq!(skipped, vec!["Roto".to_string()]);
}

#[tokio::test]
async fn unreachable_url_is_an_error_not_a_panic() {
    let provider = RssProvider::from_url(
        "Nadie",
        "http://127.0.0.1:9/rss",
        10,
        std::time::Duration::from_millis(300),
    )
    .unwrap();
    assert!(provider.fetch_latest().await.is_err());
}
