use carmarket_types::types::{Listing, ListingInput, SpecValue};

#[test]
fn deserialize_listing_full() {
    let json = r#"{
        "id": 42,
        "url": "https://example.com/listing/42",
        "title": "VW Golf 1.6 TDI",
        "price_eur": 12500.0,
        "year": 2017,
        "mileage_km": 98000.0,
        "location": "Ljubljana",
        "model_id": 7,
        "catalog_make": "Volkswagen",
        "catalog_model": "Golf",
        "extracted_make": "VW",
        "extracted_model": "Golf",
        "specs": {"engine": "1.6 TDI", "power": 85, "fuel": "Diesel"}
    }"#;
    let listing: Listing = serde_json::from_str(json).unwrap();
    assert_eq!(listing.id, 42);
    assert_eq!(listing.price(), Some(12500.0));
    assert_eq!(listing.make(), Some("Volkswagen"));
    assert_eq!(listing.specs.digits_or("engine", 0.0), 16.0);
    assert_eq!(listing.specs.number_or("power", 0.0), 85.0);
}

#[test]
fn deserialize_listing_missing_specs_defaults_empty() {
    let json = r#"{
        "id": 1, "url": null, "title": null, "price_eur": null, "year": null,
        "mileage_km": null, "location": null, "model_id": null,
        "catalog_make": null, "catalog_model": null,
        "extracted_make": "Fiat", "extracted_model": "Panda"
    }"#;
    let listing: Listing = serde_json::from_str(json).unwrap();
    assert!(listing.specs.is_empty());
    assert_eq!(listing.price(), None);
    assert_eq!(listing.make(), Some("Fiat"));
}

#[test]
fn deserialize_sparse_listing_input() {
    let input: ListingInput =
        serde_json::from_str(r#"{"year": 2020, "make": "Skoda", "specs": {"transmission": "Manual"}}"#)
            .unwrap();
    assert_eq!(input.year, Some(2020));
    assert_eq!(input.mileage_km, None);
    assert_eq!(
        input.specs.get("transmission"),
        Some(&SpecValue::Text("Manual".to_string()))
    );
}

#[test]
fn listing_input_from_listing_keeps_both_name_sources() {
    let listing = Listing {
        catalog_make: Some("Renault".into()),
        extracted_make: Some("renault".into()),
        year: Some(2015),
        ..Listing::default()
    };
    let input = ListingInput::from(&listing);
    assert_eq!(input.make.as_deref(), Some("Renault"));
    assert_eq!(input.extracted_make.as_deref(), Some("renault"));
    assert_eq!(input.year, Some(2015));
}
