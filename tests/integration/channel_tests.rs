//! Fetch and store through a channel
//!
//! These tests verify the typed operations against the simulated engine,
//! including the classification of engine failures.

use approx::assert_relative_eq;
use ndarray::{ArrayD, IxDyn};
use optix_rs::parameters::{ArrayBuffer, Bounds, HostValue, ParameterFlags, ParameterGroup, UnitType};
use optix_rs::{OptixError, Parameter};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::test_helpers::{random_matrix, session};

#[test]
fn test_scalar_metadata_round_trip() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let source = channel
        .create_element("GaussianSource", "source")
        .unwrap()
        .unwrap();

    let mut sigma = channel.get_parameter(source, "sigmaX").unwrap();
    assert_eq!(sigma.unit(), Some(UnitType::Distance));
    assert_eq!(sigma.parameter_group(), Some(ParameterGroup::Source));

    sigma.set_value(2.5e-5);
    sigma.set_bounds(Bounds::new(1e-6, 1e-4).unwrap());
    sigma.set_multiplier(1e6);
    channel.set_parameter(source, "sigmaX", &sigma).unwrap();

    let back = channel.get_parameter(source, "sigmaX").unwrap();
    assert_relative_eq!(back.value().unwrap(), 2.5e-5);
    assert_relative_eq!(back.scaled_value().unwrap(), 25.0, epsilon = 1e-9);
    assert_eq!(*back.bounds(), Bounds::new(1e-6, 1e-4).unwrap());
    assert_eq!(back.multiplier(), 1e6);
}

#[test]
fn test_bounds_are_not_checked_before_store() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();

    let mut theta = channel.get_parameter(mirror, "theta").unwrap();
    theta.set_bounds(Bounds::new(-0.01, 0.01).unwrap());
    theta.set_value(0.5);
    channel.set_parameter(mirror, "theta", &theta).unwrap();
    assert_eq!(channel.get_parameter(mirror, "theta").unwrap().value(), Some(0.5));
}

#[test]
fn test_array_flags_and_size() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("LegendrePolynomialMirror", "LP")
        .unwrap()
        .unwrap();

    let flags = channel.get_flags(mirror, "coefficients").unwrap();
    assert!(flags.contains(ParameterFlags::ARRAY_DATA));
    assert!(flags.contains(ParameterFlags::NOT_OPTIMIZABLE));
    assert_eq!(channel.array_size(mirror, "surfaceLimits").unwrap(), 4);

    let flags = channel.get_flags(mirror, "theta").unwrap();
    assert!(!flags.contains(ParameterFlags::ARRAY_DATA));
    assert!(matches!(
        channel.array_dims(mirror, "theta"),
        Err(OptixError::Engine { operation: "GetParameterArrayDims", .. })
    ));
}

#[test]
fn test_random_arrays_keep_their_shape() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let session = session();
    let mut channel = session.lock().unwrap();
    let film = channel.create_element("PlaneFilm", "film").unwrap().unwrap();

    for (rows, cols) in [(1, 1), (1, 7), (5, 1), (3, 4), (16, 9)] {
        let matrix = random_matrix(&mut rng, rows, cols);
        let data = matrix.iter().copied().collect();
        assert!(channel
            .engine_mut()
            .define_array(film.raw(), "map", [cols as i64, rows as i64], data));

        let param = channel.get_parameter(film, "map").unwrap();
        let array = param.array().unwrap();
        assert_eq!(array.dims(), [cols as i64, rows as i64]);
        assert_eq!(array.view(), matrix.view());
    }
}

#[test]
fn test_manual_read_sequence() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let dims = channel.array_dims(mirror, "coefficients").unwrap();
    let mut buffer = ArrayBuffer::with_dims(dims).unwrap();
    assert_eq!(buffer.capacity(), 1);
    channel
        .copy_array_parameter(mirror, "coefficients", &mut buffer)
        .unwrap();
    assert_eq!(buffer.take().unwrap().as_slice(), &[0.0]);
}

#[test]
fn test_array_fetch_replaces_scalar_target() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let mut target = Parameter::scalar(9.0);
    channel
        .get_parameter_into(mirror, "surfaceLimits", &mut target)
        .unwrap();
    assert!(target.is_array());
    assert_eq!(target.value(), None);
    assert_eq!(target.parameter_group(), Some(ParameterGroup::Shape));
}

#[test]
fn test_installed_host_values_are_stored() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let mut coefficients = channel.get_parameter(mirror, "coefficients").unwrap();
    let ints = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1i64, -2, 3, -4, 5, 1 << 50]).unwrap();
    coefficients.install(&HostValue::I64Array(ints)).unwrap();
    channel
        .set_parameter(mirror, "coefficients", &coefficients)
        .unwrap();

    let back = channel.get_parameter(mirror, "coefficients").unwrap();
    assert_eq!(back.array().unwrap().dims(), [3, 2]);
    assert_eq!(
        back.array().unwrap().as_slice(),
        &[1.0, -2.0, 3.0, -4.0, 5.0, (1u64 << 50) as f64]
    );
}

#[test]
fn test_variant_mismatch_is_reported_by_the_engine() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let err = channel
        .set_parameter(mirror, "surfaceLimits", &Parameter::scalar(1.0))
        .unwrap_err();
    match err {
        OptixError::Engine { operation, message } => {
            assert_eq!(operation, "SetParameter");
            assert_eq!(message, "surfaceLimits must be an array type parameter");
        }
        other => panic!("Expected Engine error, got {:?}", other),
    }

    let mut theta = Parameter::new();
    theta.set_array(&ndarray::array![[1.0]]);
    let err = channel.set_parameter(mirror, "theta", &theta).unwrap_err();
    assert_eq!(err.engine_message(), Some("theta is not an array type parameter"));
}

#[test]
fn test_engine_validation_of_surface_limits() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let mut limits = channel.get_parameter(mirror, "surfaceLimits").unwrap();
    limits.set_array(&ndarray::array![[0.0, 1.0, 2.0]]);
    let err = channel.set_parameter(mirror, "surfaceLimits", &limits).unwrap_err();
    assert!(err.engine_message().unwrap().contains("at least 4"));

    limits.set_array(&ndarray::array![[-1.0, 1.0], [3.0, 3.0]]);
    let err = channel.set_parameter(mirror, "surfaceLimits", &limits).unwrap_err();
    assert!(err.engine_message().unwrap().contains("Y-range"));

    // The rejected stores left the default in place
    let stored = channel.get_parameter(mirror, "surfaceLimits").unwrap();
    assert_eq!(stored.array().unwrap().as_slice(), &[-1.0, 1.0, -1.0, 1.0]);
}

#[test]
fn test_stale_handle_is_invalid_handle() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();
    channel.delete_element(mirror).unwrap();

    assert!(!channel.is_element_valid(mirror));
    match channel.get_parameter(mirror, "theta") {
        Err(OptixError::InvalidHandle { message }) => assert_eq!(message, "invalid element ID"),
        other => panic!("Expected InvalidHandle, got {:?}", other),
    }
    assert!(channel.delete_element(mirror).is_err());
    assert!(channel.element_name(mirror).is_err());
}

#[test]
fn test_failure_message_is_consumed() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();

    assert!(matches!(
        channel.get_parameter(mirror, "radius"),
        Err(OptixError::UnknownParameter { .. })
    ));
    assert_eq!(channel.last_error(), None);
}

#[test]
fn test_long_names_need_a_larger_buffer() {
    let name = "M".repeat(80);
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", &name).unwrap().unwrap();

    let err = channel.element_name(mirror).unwrap_err();
    assert!(err.engine_message().unwrap().contains("too small"));
    drop(channel);

    let config = optix_rs::SessionConfig::default().with_element_name_capacity(128);
    let session = optix_rs::Session::with_config(optix_rs::SimulatedEngine::new(), config).unwrap();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", &name).unwrap().unwrap();
    assert_eq!(channel.element_name(mirror).unwrap(), name);
}
