//! Integration tests for infradash
//!
//! These tests run against the public API with the synthetic fixtures: a
//! grid of 10 km municipality squares in UTM 34N carrying a handful of roads,
//! rail lines, stations, schools and hospitals. No network access is needed.

use infradash::data_processing::{TEST_MUNICIPALITIES, TestObjectStore};
use infradash::{
    DashboardConfigBuilder, DashboardContext, DataSource, MatchTier, Page, PageKind,
    RoadCategory, SelectionOutcome, hospitals_page, join_municipalities, rails_page, render_page,
    roads_page, schools_page,
};

fn setup_test_env() {
    let _ = infradash::init_logging(tracing::Level::WARN);
}

fn test_context() -> DashboardContext {
    DashboardContext::new(&DataSource::Test, DashboardConfigBuilder::no_cache().build())
        .expect("Should open the test fixtures")
}

fn assert_km(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected} km, got {actual} km"
    );
}

#[test]
fn test_full_workflow() {
    setup_test_env();

    let ctx = test_context();
    let names = ctx.municipalities().expect("Boundaries should load").names();
    let config = &ctx.config().resolver;

    // 1. Starts at the default municipality
    let mut selection = ctx.new_selection();
    assert_eq!(selection.current(), "Veliko Gradište");

    // 2. Ambiguous input keeps the selection and lists candidates
    let outcome = selection.apply("sa", names, config);
    match &outcome {
        SelectionOutcome::Ambiguous(candidates) => {
            assert!(candidates.contains(&"Šabac".to_string()));
            assert!(candidates.contains(&"Novi Sad".to_string()));
        }
        other => panic!("Expected an ambiguous outcome, got {other:?}"),
    }
    assert_eq!(selection.current(), "Veliko Gradište");

    // 3. A unique match moves the selection
    let outcome = selection.apply("nis", names, config);
    assert_eq!(outcome, SelectionOutcome::Selected("Niš".to_string()));
    assert_eq!(
        outcome.message(selection.current()).as_deref(),
        Some("Highlighted municipality: Niš")
    );

    // 4. Pages follow the selection
    let page = roads_page(&ctx, selection.current()).expect("Roads page should render");
    assert_eq!(page.municipality, "Niš");
    assert_km(page.stats.municipality.linear.total_km, 12.0);

    // 5. Nonsense keeps the previous selection
    let outcome = selection.apply("xyz123", names, config);
    assert!(matches!(outcome, SelectionOutcome::NotFound(_)));
    assert_eq!(selection.current(), "Niš");
}

#[test]
fn test_resolution_tiers() {
    setup_test_env();

    let ctx = test_context();
    let names = ctx.municipalities().unwrap().names();
    let config = &ctx.config().resolver;

    let exact = names.resolve_with_tier("NIS", config);
    assert_eq!(exact.tier, MatchTier::Exact);
    assert_eq!(exact.names, vec!["Niš".to_string()]);

    let substring = names.resolve_with_tier("gradiste", config);
    assert_eq!(substring.tier, MatchTier::Substring);
    assert_eq!(substring.names, vec!["Veliko Gradište".to_string()]);

    // One dropped letter: neither exact nor a substring, but close to Kosjerić
    let fuzzy = names.resolve_with_tier("Kosjerc", config);
    assert_eq!(fuzzy.tier, MatchTier::Fuzzy);
    assert_eq!(fuzzy.names, vec!["Kosjerić".to_string()]);

    assert!(names.resolve("xyz123", config).is_empty());
    assert!(names.resolve("   ", config).is_empty());

    // Every canonical name resolves to itself
    for name in TEST_MUNICIPALITIES {
        assert_eq!(names.resolve(name, config), vec![name.to_string()]);
    }
}

#[test]
fn test_roads_national_and_municipality_stats() {
    setup_test_env();

    let ctx = test_context();
    let page = roads_page(&ctx, "Veliko Gradište").unwrap();

    assert_km(page.stats.national.linear.total_km, 20.5);
    assert_km(page.stats.municipality.linear.total_km, 17.5);
    assert_eq!(page.stats.municipality.linear.bridges, 1);
    assert_eq!(page.stats.municipality.linear.tunnels, 1);
    assert_km(page.stats.municipality.category_km(RoadCategory::Primary), 3.0);
    assert_km(page.stats.municipality.category_km(RoadCategory::Local), 4.5);
    assert!(page.stats.national.categorized_km() <= page.stats.national.linear.total_km);

    // National figures do not depend on the selection
    let other = roads_page(&ctx, "Šabac").unwrap();
    assert_eq!(other.stats.national, page.stats.national);
    assert_km(other.stats.municipality.category_km(RoadCategory::Link), 1.0);
}

#[test]
fn test_municipality_without_features() {
    setup_test_env();

    let ctx = test_context();
    let roads = roads_page(&ctx, "Kosjerić").unwrap();
    assert_km(roads.stats.municipality.linear.total_km, 0.0);
    assert_eq!(roads.stats.municipality.linear.bridges, 0);

    let rails = rails_page(&ctx, "Kosjerić").unwrap();
    assert_eq!(rails.stats.municipality.stations, 0);

    let schools = schools_page(&ctx, "Kosjerić").unwrap();
    assert_eq!(schools.stats.municipality.total, 0);
    assert!(schools.layers.iter().skip(1).all(|layer| layer.is_empty()));
}

#[test]
fn test_rails_schools_and_hospitals() {
    setup_test_env();

    let ctx = test_context();

    let nis = rails_page(&ctx, "Niš").unwrap();
    assert_km(nis.stats.municipality.linear.total_km, 2.0);
    assert_eq!(nis.stats.municipality.linear.tunnels, 1);
    assert_eq!(nis.stats.municipality.stations, 1);

    let gradiste = rails_page(&ctx, "Veliko Gradište").unwrap();
    assert_km(gradiste.stats.municipality.linear.total_km, 6.0);
    assert_eq!(gradiste.stats.municipality.linear.bridges, 1);
    assert_eq!(gradiste.stats.municipality.stations, 1);

    let schools = schools_page(&ctx, "Niš").unwrap();
    assert_eq!(schools.stats.municipality.higher_education, 1);
    assert_eq!(schools.stats.municipality.other(), 1);
    let layer_names: Vec<_> = schools.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(layer_names, ["District Boundaries", "Schools", "Universities"]);

    let hospitals = hospitals_page(&ctx, "Veliko Gradište").unwrap();
    assert_eq!(hospitals.stats.municipality.total, 1);
    assert_eq!(hospitals.stats.national.total, 2);
}

#[test]
fn test_map_view_and_layers_are_geographic() {
    setup_test_env();

    let ctx = test_context();
    for kind in PageKind::ALL {
        let page = render_page(&ctx, kind, "Veliko Gradište").unwrap();
        let view = page.view();
        // UTM 34N fixtures sit in northern Serbia / southern Hungary
        assert!((18.0..24.0).contains(&view.center.x), "lon {}", view.center.x);
        assert!((43.0..46.0).contains(&view.center.y), "lat {}", view.center.y);
        assert_eq!(view.zoom, 12);

        let document: serde_json::Value =
            serde_json::from_str(&page.to_map_document().unwrap()).unwrap();
        assert_eq!(document["page"], kind.title());
        assert_eq!(document["layers"][0]["data"]["type"], "FeatureCollection");
    }
}

#[test]
fn test_join_every_municipality() {
    setup_test_env();

    let ctx = test_context();
    let municipalities = ctx.municipalities().unwrap();
    let rows = join_municipalities(ctx.roads().unwrap(), municipalities).unwrap();

    // The trunk road crosses Veliko Gradište and Niš and appears once for each
    let trunk_rows = rows
        .iter()
        .filter(|row| row.feature.attributes.fclass.as_str() == "trunk")
        .count();
    assert_eq!(trunk_rows, 2);
    assert!(rows.iter().all(|row| row.municipality != "Kosjerić"));
}

#[test]
fn test_unknown_municipality_is_an_error() {
    setup_test_env();

    let ctx = test_context();
    let err = roads_page(&ctx, "Atlantis").unwrap_err();
    assert!(err.to_string().contains("Atlantis"));
}

#[test]
fn test_local_directory_source() {
    setup_test_env();

    let dir = tempfile::tempdir().unwrap();
    TestObjectStore::new()
        .unwrap()
        .write_to_dir(dir.path())
        .unwrap();

    let ctx = DashboardContext::new(
        &DataSource::LocalDir(dir.path().to_path_buf()),
        DashboardConfigBuilder::no_cache().build(),
    )
    .unwrap();
    let page = roads_page(&ctx, "Veliko Gradište").unwrap();
    assert_km(page.stats.municipality.linear.total_km, 17.5);
    assert!(ctx.logo().unwrap().starts_with(b"\x89PNG"));
}
