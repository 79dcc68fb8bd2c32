//! Integration tests for Sekolah Export
//!
//! These tests drive the paging, enrichment and export pipeline end to end
//! against the in-process mock directory.

use sekolah_export::config::{Config, RateLimitConfig, SAFE_METADATA_WORKERS_MAX};
use sekolah_export::export::{assemble, write_csv_file, CSV_HEADERS};
use sekolah_export::harvest::{
    identifiers_of, CollectError, CollectPolicy, DetailEnricher, HarvestOptions, Harvester,
    PageCollector,
};
use sekolah_export::models::{ListingFilter, SchoolRecord};
use sekolah_export::sources::mock::make_records;
use sekolah_export::sources::{MockDirectory, SchoolDirectory};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit = RateLimitConfig::disabled();
    config.collection.recovery_backoff_ms = 0;
    config
}

fn collector_for(mock: &Arc<MockDirectory>) -> PageCollector {
    PageCollector::new(mock.clone(), CollectPolicy::from_config(&test_config()))
}

#[tokio::test]
async fn test_order_independent_of_completion_order() {
    for workers in 1..=SAFE_METADATA_WORKERS_MAX {
        for count in [1usize, 5, 9, 16] {
            let mock = Arc::new(
                MockDirectory::new(make_records(count)).with_latency(Duration::from_millis(15)),
            );
            let collection = assert_ok!(
                collector_for(&mock)
                    .collect(&ListingFilter::unfiltered(), 2, None, workers)
                    .await
            );

            assert_eq!(collection.total_pages as usize, count.div_ceil(2));
            assert_eq!(
                collection.records,
                make_records(count),
                "workers={} count={}",
                workers,
                count
            );
        }
    }
}

#[tokio::test]
async fn test_page_recovered_after_transient_failures() {
    // Fails the concurrent pass and the first recovery attempt, then succeeds.
    let mock = Arc::new(MockDirectory::new(make_records(9)).with_page_failures(1, 2));
    let collection = assert_ok!(
        collector_for(&mock)
            .collect(&ListingFilter::unfiltered(), 3, None, 2)
            .await
    );

    assert!(collection.is_complete());
    assert_eq!(collection.records, make_records(9));

    let page_one = mock
        .page_requests()
        .iter()
        .filter(|request| request.page == 1)
        .count();
    assert_eq!(page_one, 3);
}

#[tokio::test]
async fn test_page_recovered_on_last_attempt() {
    let mock = Arc::new(MockDirectory::new(make_records(9)).with_page_failures(2, 3));
    let collection = assert_ok!(
        collector_for(&mock)
            .collect(&ListingFilter::unfiltered(), 3, None, 2)
            .await
    );

    assert!(collection.is_complete());
    assert_eq!(collection.records.len(), 9);
}

#[tokio::test]
async fn test_permanent_page_failure_drops_only_that_page() {
    let mock = Arc::new(MockDirectory::new(make_records(9)).with_permanent_page_failure(1));
    let collection = assert_ok!(
        collector_for(&mock)
            .collect(&ListingFilter::unfiltered(), 3, None, 2)
            .await
    );

    assert_eq!(collection.failed_pages, vec![1]);
    assert_eq!(collection.reported_total, 9);
    assert!((collection.records.len() as u64) < collection.reported_total);

    let expected: Vec<SchoolRecord> = make_records(9)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !(3..6).contains(i))
        .map(|(_, record)| record)
        .collect();
    assert_eq!(collection.records, expected);

    // One concurrent attempt plus three recovery attempts
    let page_one = mock
        .page_requests()
        .iter()
        .filter(|request| request.page == 1)
        .count();
    assert_eq!(page_one, 4);
}

#[tokio::test]
async fn test_first_page_failure_aborts() {
    let mock = Arc::new(MockDirectory::new(make_records(9)).with_permanent_page_failure(0));
    let result = collector_for(&mock)
        .collect(&ListingFilter::unfiltered(), 3, None, 2)
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, CollectError::FirstPage(_)));
}

#[tokio::test]
async fn test_seven_records_in_pages_of_three() {
    let mock = Arc::new(MockDirectory::new(make_records(7)));
    let collection = assert_ok!(
        collector_for(&mock)
            .collect(&ListingFilter::unfiltered(), 3, None, 2)
            .await
    );

    assert_eq!(collection.total_pages, 3);
    assert_eq!(collection.records.len(), 7);
    assert_eq!(collection.records.last().and_then(|r| r.identifier()), Some("id-6"));

    let mut pages: Vec<u32> = mock.page_requests().iter().map(|r| r.page).collect();
    pages.sort_unstable();
    assert_eq!(pages, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_auto_page_size_matches_probe_total() {
    let mock = Arc::new(MockDirectory::new(make_records(25)));
    let collector = collector_for(&mock);

    assert_eq!(
        collector.resolve_page_size(&ListingFilter::unfiltered(), 0).await,
        25
    );
    assert_eq!(
        collector.resolve_page_size(&ListingFilter::unfiltered(), -5).await,
        25
    );
    assert_eq!(
        collector.resolve_page_size(&ListingFilter::unfiltered(), 7).await,
        7
    );
}

#[tokio::test]
async fn test_collection_is_idempotent() {
    let mock = Arc::new(
        MockDirectory::new(make_records(11)).with_latency(Duration::from_millis(5)),
    );
    let collector = collector_for(&mock);
    let filter = ListingFilter::unfiltered();

    let first = assert_ok!(collector.collect(&filter, 4, None, 2).await);
    let second = assert_ok!(collector.collect(&filter, 4, None, 2).await);

    assert_eq!(first, second);
    assert_eq!(first.records.len(), 11);
}

#[tokio::test]
async fn test_category_filter_is_or_over_codes() {
    let records = vec![
        SchoolRecord::new("1", "TK Satu").with_category("TK"),
        SchoolRecord::new("2", "SD Dua").with_category("SD"),
        SchoolRecord::new("3", "KB Tiga").with_category("KB"),
        SchoolRecord::new("4", "RA Empat").with_category("RA"),
        SchoolRecord::new("5", "TK Lima").with_category("TK"),
    ];
    let mock = Arc::new(MockDirectory::new(records));
    let filter = ListingFilter::unfiltered().category("TK,KB");

    let collection = assert_ok!(collector_for(&mock).collect(&filter, 2, None, 2).await);

    assert_eq!(identifiers_of(&collection.records), vec!["1", "3", "5"]);
    assert!(collection
        .records
        .iter()
        .all(|r| matches!(r.category.as_deref(), Some("TK") | Some("KB"))));
}

#[tokio::test]
async fn test_enrichment_tolerates_failed_lookup() {
    let mock = Arc::new(
        MockDirectory::new(Vec::new())
            .with_contact("A", "021-100")
            .with_detail_failure("B")
            .with_contact("C", "021-300")
            .with_latency(Duration::from_millis(10)),
    );
    let enricher = DetailEnricher::from_config(mock.clone(), &test_config());

    let enrichment = enricher
        .enrich(vec!["A".into(), "B".into(), "C".into()], 4)
        .await;

    assert_eq!(enrichment.contact("A"), Some("021-100"));
    assert_eq!(enrichment.contact("B"), None);
    assert_eq!(enrichment.contact("C"), Some("021-300"));
    assert_eq!(enrichment.failed, vec!["B".to_string()]);
}

#[tokio::test]
async fn test_region_suggestions_from_mock() {
    let records = vec![
        SchoolRecord::new("1", "TK A").with_location("Kota Bandung", "Jawa Barat"),
        SchoolRecord::new("2", "TK B").with_location("Kota Bogor", "Jawa Barat"),
        SchoolRecord::new("3", "TK C").with_location("Kab. Bandung Barat", "Jawa Barat"),
    ];
    let mock = MockDirectory::new(records);

    let regions = assert_ok!(mock.suggest_regions("bandung").await);
    assert_eq!(regions, vec!["Kab. Bandung Barat", "Kota Bandung"]);
}

#[tokio::test]
async fn test_full_pipeline_to_csv() {
    let mut records = make_records(5);
    for (i, record) in records.iter_mut().enumerate() {
        record.address = Some(format!("Jl. Nomor {}", i));
        record.locality = Some("Kota Bandung".to_string());
        record.region = Some("Jawa Barat".to_string());
    }
    let mock = Arc::new(
        MockDirectory::new(records)
            .with_contact("id-0", "022-000")
            .with_contact("id-3", "022-333")
            .with_detail_failure("id-4")
            .with_latency(Duration::from_millis(5)),
    );

    let config = test_config();
    let harvester = Harvester::new(mock.clone(), &config);
    let options = HarvestOptions {
        page_size: 2,
        ..HarvestOptions::from_config(&config)
    };
    let harvest = assert_ok!(harvester.run(&options).await);

    assert_eq!(harvest.collection.total_pages, 3);
    assert_eq!(harvest.enrichment.contacts.len(), 5);
    assert_eq!(mock.detail_requests().len(), 5);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schools.csv");
    let rows = assemble(&harvest.collection.records, &harvest.enrichment);
    assert_ok!(write_csv_file(&path, &rows));

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        CSV_HEADERS.to_vec()
    );
    let lines: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        vec!["Sekolah 0", "Jl. Nomor 0", "Kota Bandung", "Jawa Barat", "022-000"]
    );
    assert_eq!(lines[3][4], "022-333");
    assert_eq!(lines[1][4], "");
    assert_eq!(lines[4][4], "");
}
