use std::time::Duration;

use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use serde_json::json;
use tempfile::tempdir;

use bd_address_resolver::{
    resolve_batch, AppConfig, GeocodeCache, Mode, ResolverEngine, ResolverOptions, NOT_FOUND,
};

fn server_config(server: &Server) -> AppConfig {
    AppConfig {
        geocoder_endpoint: server.url_str("/search"),
        request_delay: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn resolves_over_http_and_persists_the_cache() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/search"),
            request::query(url_decoded(contains(("q", "Mirpur 10, Dhaka")))),
            request::query(url_decoded(contains(("countrycodes", "bd")))),
            request::query(url_decoded(contains(("limit", "1")))),
            request::query(url_decoded(contains(("addressdetails", "1")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{
            "place_id": 1234,
            "display_name": "Mirpur 10, Dhaka, Bangladesh",
            "address": {
                "suburb": "Mirpur",
                "city": "Dhaka",
                "state_district": "Dhaka District",
                "state": "Dhaka Division",
                "country": "Bangladesh"
            }
        }]))),
    );

    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache_geocode.csv");
    let options = ResolverOptions {
        mode: Mode::Online,
        cache_path: Some(cache_path.clone()),
        ..ResolverOptions::default()
    };

    let addresses = vec!["Mirpur 10, Dhaka".to_string()];
    let results = resolve_batch(&addresses, &server_config(&server), options.clone())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].district, "Dhaka District");
    assert_eq!(results[0].thana, "Mirpur");

    let cache = GeocodeCache::load(&cache_path);
    let cached = cache.get("Mirpur 10, Dhaka").unwrap();
    assert_eq!(cached.district, "Dhaka District");
    assert_eq!(cached.thana, "Mirpur");

    // a fresh engine over the same cache file answers without a request;
    // the server expectation above allows exactly one hit
    let again = resolve_batch(&addresses, &server_config(&server), options)
        .await
        .unwrap();
    assert_eq!(again, results);
}

#[tokio::test]
async fn falls_back_through_query_variants() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/search"),
            request::query(url_decoded(contains(("q", "xyz colony")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([]))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/search"),
            request::query(url_decoded(contains(("q", "xyz colony, Bangladesh")))),
        ])
        .times(1)
        .respond_with(json_encoded(json!([{
            "place_id": 99,
            "address": {
                "county": "Khulna",
                "town": "Daulatpur"
            }
        }]))),
    );

    let mut engine = ResolverEngine::new(
        &server_config(&server),
        ResolverOptions {
            mode: Mode::Online,
            ..ResolverOptions::default()
        },
    )
    .unwrap();

    let results = engine
        .resolve_batch(&["xyz colony".to_string()])
        .await
        .unwrap();
    assert_eq!(results[0].district, "Khulna");
    assert_eq!(results[0].thana, "Daulatpur");
}

#[tokio::test]
async fn server_errors_resolve_to_not_found_and_are_cached() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/search"),
        ])
        .times(1..)
        .respond_with(status_code(503)),
    );

    let mut engine = ResolverEngine::new(
        &server_config(&server),
        ResolverOptions {
            mode: Mode::Online,
            ..ResolverOptions::default()
        },
    )
    .unwrap();

    let results = engine
        .resolve_batch(&["zz plot 7 qrstu".to_string()])
        .await
        .unwrap();
    assert_eq!(results[0].district, NOT_FOUND);
    assert_eq!(results[0].thana, NOT_FOUND);

    let cached = engine.cache().get("zz plot 7 qrstu").unwrap();
    assert_eq!(cached.district, NOT_FOUND);
    assert_eq!(cached.thana, NOT_FOUND);
}
