//! Integration tests for the bikewatch search core
//!
//! These run against the public API with the deterministic fixture registry from
//! `bikewatch::data::test_data` and an in-memory geocoder.

use std::{collections::HashSet, time::Duration};

use bikewatch::{
    BikeSearcher, Coordinates, GeocodedPlace, ManufacturerFilter, QueryItemOption,
    RawSearchParams, SearchConfigBuilder, SearchCriteria, StaticGeocoder, Stolenness,
    data::{
        AssetData, RegistryData, TestDataConfig, create_test_data_dir,
        reference::default_colors,
        test_data::{sample_assets_frame, sample_manufacturers},
    },
    polars::prelude::*,
    result_ids,
};
use serde_json::json;

fn setup_test_env() {
    let _ = bikewatch::init_logging(tracing::Level::WARN);
}

fn geocoder() -> StaticGeocoder {
    StaticGeocoder::new()
        .with_place(
            "Oakland, CA",
            GeocodedPlace::new("Oakland, CA", Coordinates::new(37.8044, -122.2712)),
        )
        .with_place(
            "United States, California, Oakland",
            GeocodedPlace::new("Oakland, CA", Coordinates::new(37.8044, -122.2712)),
        )
        .with_place(
            "203.0.113.7",
            GeocodedPlace::new("Oakland", Coordinates::new(37.80, -122.27)).with_components([
                "Oakland",
                "94612",
                "California",
                "United States",
            ]),
        )
}

fn searcher(config: &TestDataConfig) -> BikeSearcher<StaticGeocoder> {
    setup_test_env();
    let registry = RegistryData::new(
        AssetData::from_frame(sample_assets_frame(config).unwrap()).unwrap(),
        sample_manufacturers(),
        default_colors(),
    );
    BikeSearcher::new(registry, geocoder(), SearchConfigBuilder::interactive().build())
        .expect("Should create searcher")
}

async fn interpret(
    searcher: &BikeSearcher<StaticGeocoder>,
    params: serde_json::Value,
) -> SearchCriteria {
    let params: RawSearchParams = serde_json::from_value(params).expect("Params should parse");
    searcher.interpret(&params, None).await
}

fn ids(df: &DataFrame) -> Vec<u64> {
    result_ids(df).unwrap()
}

fn id_set(df: &DataFrame) -> HashSet<u64> {
    ids(df).into_iter().collect()
}

#[tokio::test]
async fn test_full_workflow_from_data_dir() {
    setup_test_env();
    let dir = create_test_data_dir(&TestDataConfig::sample()).unwrap();
    let searcher =
        BikeSearcher::from_dir(dir.path(), geocoder(), SearchConfigBuilder::new().build())
            .expect("Should load registry from directory");

    let info = searcher.info().unwrap();
    assert_eq!(info.total_assets as u64, info.indexed_assets);
    assert!(info.summary().contains("manufacturers"));

    let criteria = interpret(&searcher, json!({"serial": "00111"})).await;
    assert_eq!(ids(&searcher.search(&criteria).unwrap()), vec![1]);
    assert_eq!(ids(&searcher.search_serials_containing(&criteria).unwrap()), vec![3]);
    assert_eq!(ids(&searcher.search_close_serials(&criteria).unwrap()), vec![2]);
}

#[tokio::test]
async fn test_parquet_registry_loads() {
    setup_test_env();
    let dir = create_test_data_dir(&TestDataConfig::minimal()).unwrap();
    let assets = AssetData::from_csv(&dir.path().join("assets.csv")).unwrap();
    assets.write_parquet(&dir.path().join("assets.parquet")).unwrap();

    let searcher =
        BikeSearcher::from_dir(dir.path(), geocoder(), SearchConfigBuilder::bulk().build())
            .unwrap();
    let criteria = SearchCriteria::default().with_stolenness(Stolenness::All);
    assert_eq!(searcher.search(&criteria).unwrap().height(), 8);
}

#[tokio::test]
async fn test_confusable_serial_matches_exactly() {
    let searcher = searcher(&TestDataConfig::minimal());
    for raw in ["O0-II1", "o0 il1", "00111", "0-0-1-1-1"] {
        let criteria = interpret(&searcher, json!({"serial": raw, "stolenness": "all"})).await;
        assert_eq!(criteria.serial.as_deref(), Some("00111"), "{raw}");
        assert_eq!(criteria.raw_serial.as_deref(), Some(raw));
        assert_eq!(ids(&searcher.search(&criteria).unwrap()), vec![1, 4], "{raw}");
    }
}

#[tokio::test]
async fn test_query_items_example() {
    let searcher = searcher(&TestDataConfig::minimal());
    let criteria = interpret(&searcher, json!({"query_items": ["blue bike", "m_14", "c_3"]})).await;
    assert_eq!(criteria.query.as_deref(), Some("blue bike"));
    assert_eq!(criteria.manufacturer, Some(ManufacturerFilter::One(14)));
    assert_eq!(criteria.colors, Some(vec![3]));
    assert!(criteria.has_search_filters());
}

#[tokio::test]
async fn test_interpret_never_fails_and_always_sets_stolenness() {
    let searcher = searcher(&TestDataConfig::minimal());
    let inputs = [
        json!({}),
        json!({"serial": ""}),
        json!({"serial": "!!!"}),
        json!({"manufacturer": "12abc", "colors": ",,,"}),
        json!({"manufacturer": [-1, "", "Nope"], "colors": [0, "c_99"]}),
        json!({"query_items": ["", "m_", "c_", "m_not-a-brand"]}),
        json!({"stolenness": "PROXIMITY", "location": "", "distance": "abc"}),
        json!({"stolenness": "proximity", "location": "Oakland, CA", "distance": -3}),
        json!({"stolenness": "non", "location": "Oakland, CA"}),
        json!({"stolenness": 42}),
        json!({"query": "   ", "distance": 1e308}),
        json!({"serial": 12345, "colors": [1.0, 2.5], "query_items": ["m_3", 5]}),
        json!({"serial": {"nested": true}, "manufacturer": [[14]], "distance": [5]}),
        json!({"stolenness": "proximity", "location": 94612, "distance": {"miles": 3}}),
    ];
    let categories = [
        Stolenness::All,
        Stolenness::Non,
        Stolenness::Stolen,
        Stolenness::Found,
        Stolenness::Proximity,
    ];
    for input in inputs {
        let params = serde_json::from_value::<RawSearchParams>(input.clone())
            .unwrap_or_else(|err| panic!("{input} should deserialize: {err}"));
        let criteria = searcher.interpret(&params, None).await;
        assert!(categories.contains(&criteria.stolenness), "{input}");
        assert_eq!(
            criteria.bounding_box().is_some(),
            criteria.stolenness == Stolenness::Proximity,
            "{input}"
        );
    }
}

#[tokio::test]
async fn test_numeric_serial_and_float_ids() {
    let searcher = searcher(&TestDataConfig::minimal());
    let criteria = interpret(
        &searcher,
        json!({"serial": 5555, "colors": [2.0], "query_items": [14, "c_3"]}),
    )
    .await;
    assert_eq!(criteria.serial.as_deref(), Some("5555"));
    assert_eq!(criteria.colors, Some(vec![2]));
    assert_eq!(criteria.query.as_deref(), Some("14"));
    assert_eq!(criteria.stolenness, Stolenness::Stolen);

    let criteria = interpret(&searcher, json!({"serial": 5555})).await;
    assert_eq!(ids(&searcher.search(&criteria).unwrap()), vec![8]);
}

#[tokio::test]
async fn test_anywhere_falls_back_to_stolen() {
    let searcher = searcher(&TestDataConfig::minimal());
    for distance in [json!(null), json!(0), json!(10), json!("-5")] {
        let criteria = interpret(
            &searcher,
            json!({"stolenness": "proximity", "location": "AnyWhere", "distance": distance}),
        )
        .await;
        assert_eq!(criteria.stolenness, Stolenness::Stolen);
        assert!(criteria.bounding_box().is_none());
        assert!(!criteria.has_search_filters());
    }
}

#[tokio::test]
async fn test_proximity_search() {
    let searcher = searcher(&TestDataConfig::minimal());
    let criteria = interpret(
        &searcher,
        json!({"stolenness": "proximity", "location": "Oakland, CA", "distance": 20}),
    )
    .await;
    assert_eq!(criteria.stolenness, Stolenness::Proximity);
    assert_eq!(criteria.distance(), Some(20.0));
    // Stolen in San Francisco and Oakland, and impounded in San Francisco
    assert_eq!(ids(&searcher.search(&criteria).unwrap()), vec![1, 2, 5]);

    let criteria = interpret(
        &searcher,
        json!({"stolenness": "proximity", "location": "Oakland, CA", "distance": 0}),
    )
    .await;
    assert_eq!(criteria.distance(), Some(100.0));
}

#[tokio::test]
async fn test_proximity_from_client_ip() {
    let searcher = searcher(&TestDataConfig::minimal());
    let params: RawSearchParams =
        serde_json::from_value(json!({"stolenness": "proximity", "location": "you"})).unwrap();

    let criteria = searcher.interpret(&params, Some("203.0.113.7")).await;
    assert_eq!(criteria.stolenness, Stolenness::Proximity);
    assert_eq!(criteria.location(), Some("United States, California, Oakland"));

    let criteria = searcher.interpret(&params, None).await;
    assert_eq!(criteria.stolenness, Stolenness::Stolen);
}

#[tokio::test]
async fn test_result_tiers_are_disjoint() {
    let searcher = searcher(&TestDataConfig::sample());
    for serial in ["00111", "A8C123", "5555", "WTU555", "GEN000010", "X0011"] {
        for stolenness in ["all", "stolen", "non"] {
            let criteria =
                interpret(&searcher, json!({"serial": serial, "stolenness": stolenness})).await;
            let exact = id_set(&searcher.search(&criteria).unwrap());
            let containing = id_set(&searcher.search_serials_containing(&criteria).unwrap());
            let near = id_set(&searcher.search_close_serials(&criteria).unwrap());
            assert!(exact.is_disjoint(&containing), "{serial}/{stolenness}");
            assert!(exact.is_disjoint(&near), "{serial}/{stolenness}");
            assert!(near.is_disjoint(&containing), "{serial}/{stolenness}");
        }
    }
}

#[tokio::test]
async fn test_no_serial_means_no_fuzzy_results() {
    let searcher = searcher(&TestDataConfig::sample());
    let criteria = interpret(&searcher, json!({"query": "blue", "stolenness": "all"})).await;
    assert!(searcher.search_close_serials(&criteria).unwrap().is_empty());
    assert!(searcher.search_serials_containing(&criteria).unwrap().is_empty());
    assert!(!searcher.search(&criteria).unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_distance_boundary() {
    setup_test_env();
    let df = df!(
        "id" => [1u64, 2, 3, 4],
        "serial_normalized" => ["ACDEF", "ACDXY", "AXYWF", "ACDEFG"],
        "manufacturer_id" => [1u32, 1, 1, 1],
        "status" => ["status_stolen"; 4]
    )
    .unwrap();
    let registry = RegistryData::new(
        AssetData::from_frame(df).unwrap(),
        sample_manufacturers(),
        default_colors(),
    );
    let searcher = BikeSearcher::new(
        registry,
        StaticGeocoder::new(),
        SearchConfigBuilder::new()
            .geocode_timeout(Duration::from_millis(100))
            .build(),
    )
    .unwrap();

    let criteria = SearchCriteria::default().with_serial("acdef");
    assert_eq!(ids(&searcher.search(&criteria).unwrap()), vec![1]);
    assert_eq!(ids(&searcher.search_serials_containing(&criteria).unwrap()), vec![4]);
    // Two edits away is near, three is not, and the containing match stays out
    assert_eq!(ids(&searcher.search_close_serials(&criteria).unwrap()), vec![2]);
}

#[tokio::test]
async fn test_selected_query_items_options() {
    let searcher = searcher(&TestDataConfig::minimal());
    let criteria = interpret(
        &searcher,
        json!({"query": "basket", "manufacturer": ["Salsa", 999], "colors": "blue,yellow"}),
    )
    .await;
    assert_eq!(criteria.manufacturer, Some(ManufacturerFilter::Many(vec![14, 999])));

    let options = searcher.selected_query_items_options(&criteria);
    assert_eq!(options.len(), 4, "Unknown manufacturer 999 is skipped");
    assert_eq!(options[0], QueryItemOption::Query("basket".to_string()));

    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(json[0], "basket");
    assert_eq!(json[1]["search_id"], "m_14");
    assert_eq!(json[1]["category"], "frame_mnfg");
    assert_eq!(json[2]["search_id"], "c_2");
    assert_eq!(json[3]["category"], "colors");
}
