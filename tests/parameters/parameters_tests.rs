//! Integration tests for the Parameters collection
//!
//! These tests verify ordering, lookup, and JSON persistence of snapshots.

use ndarray::array;
use optix_rs::parameters::{Bounds, Parameter, ParameterFlags, Parameters, SerializationError};

fn sample() -> Parameters {
    let mut params = Parameters::new();
    let mut theta = Parameter::scalar(0.0035);
    theta.set_bounds(Bounds::new(-0.01, 0.01).unwrap());
    params.insert("theta", theta);

    let mut distance = Parameter::scalar(12.5);
    distance.set_bounds(Bounds::unbounded());
    params.insert("distance", distance);

    let mut limits = Parameter::new();
    limits.set_array(&array![[-10.0, 10.0], [-5.0, 5.0]]);
    limits.set_flags(ParameterFlags::NOT_OPTIMIZABLE);
    params.insert("surfaceLimits", limits);
    params
}

#[test]
fn test_parameters_basic_operations() {
    let mut params = sample();
    assert_eq!(params.len(), 3);
    assert!(!params.is_empty());
    assert!(params.contains("distance"));
    assert!(params.get("curvature").is_none());

    params.get_mut("distance").unwrap().set_value(15.0);
    assert_eq!(params.get("distance").unwrap().value(), Some(15.0));

    let removed = params.remove("theta").unwrap();
    assert_eq!(removed.value(), Some(0.0035));
    assert_eq!(params.names().collect::<Vec<_>>(), ["distance", "surfaceLimits"]);
}

#[test]
fn test_replacement_keeps_position() {
    let mut params = sample();
    let old = params.insert("theta", Parameter::scalar(0.0));
    assert_eq!(old.unwrap().value(), Some(0.0035));
    assert_eq!(
        params.names().collect::<Vec<_>>(),
        ["theta", "distance", "surfaceLimits"]
    );
}

#[test]
fn test_array_names() {
    assert_eq!(sample().array_names(), ["surfaceLimits"]);
}

#[test]
fn test_collect_from_pairs() {
    let params: Parameters = vec![
        ("a".to_string(), Parameter::scalar(1.0)),
        ("b".to_string(), Parameter::scalar(2.0)),
        ("a".to_string(), Parameter::scalar(3.0)),
    ]
    .into_iter()
    .collect();
    assert_eq!(params.len(), 2);
    assert_eq!(params.get("a").unwrap().value(), Some(3.0));
}

#[test]
fn test_json_string_round_trip() {
    let params = sample();
    let json = params.to_json().unwrap();
    let loaded = Parameters::from_json(&json).unwrap();
    assert_eq!(loaded, params);

    let distance = loaded.get("distance").unwrap();
    assert!(distance.bounds().min.is_infinite());
    assert!(distance.bounds().max.is_infinite());
}

#[test]
fn test_json_file_round_trip() {
    let path = std::env::temp_dir().join(format!("optix-rs-snapshot-{}.json", std::process::id()));
    let params = sample();
    params.save_json(&path).unwrap();
    let loaded = Parameters::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, params);
}

#[test]
fn test_load_errors() {
    let missing = Parameters::load_json("/nonexistent/optix-rs/snapshot.json");
    assert!(matches!(missing, Err(SerializationError::IoError(_))));

    let inverted = r#"{"params":[{"name":"theta","parameter":{
        "value":{"kind":"scalar","data":0.0},
        "bounds":{"min":1.0,"max":-1.0},
        "multiplier":1.0,"type":1,"group":0,"flags":0}}]}"#;
    assert!(matches!(
        Parameters::from_json(inverted),
        Err(SerializationError::JsonError(_))
    ));
}
