//! Integration tests for the Parameter record
//!
//! These tests verify variant switching, widening, and metadata handling.

use approx::assert_relative_eq;
use ndarray::{array, Array2, ArrayD, IxDyn};
use optix_rs::parameters::{
    Bounds, HostValue, ParamArray, ParamValue, Parameter, ParameterFlags, ParameterGroup, UnitType,
};
use optix_rs::OptixError;

#[test]
fn test_parameter_default_state() {
    let param = Parameter::default();
    assert!(param.is_scalar());
    assert_eq!(param.value(), Some(0.0));
    assert_eq!(*param.bounds(), Bounds::default());
    assert_eq!(param.multiplier(), 1.0);
    assert_eq!(param.unit(), Some(UnitType::Dimensionless));
    assert_eq!(param.parameter_group(), Some(ParameterGroup::Basic));
    assert!(param.is_optimizable());
}

#[test]
fn test_scaled_value_uses_multiplier() {
    let mut theta = Parameter::scalar(0.0175);
    theta.set_multiplier(1000.0);
    theta.set_unit_type(UnitType::Angle as i32);
    assert_relative_eq!(theta.scaled_value().unwrap(), 17.5, epsilon = 1e-12);

    let array = Parameter::from_array(ParamArray::from_array(Array2::zeros((1, 1))));
    assert_eq!(array.scaled_value(), None);
}

#[test]
fn test_static_widening_from_every_numeric_type() {
    let mut param = Parameter::new();

    param.set_array(&array![[1u8, 2], [3, 4]]);
    assert_eq!(param.array().unwrap().as_slice(), &[1.0, 2.0, 3.0, 4.0]);

    param.set_array(&array![[-1i16, 2, -3]]);
    assert_eq!(param.array().unwrap().dims(), [3, 1]);

    param.set_array(&array![[0.25f32], [0.5]]);
    assert_eq!(param.array().unwrap().dims(), [1, 2]);
    assert_eq!(param.array().unwrap().as_slice(), &[0.25, 0.5]);

    param.set_array(&array![[u32::MAX]]);
    assert_eq!(param.array().unwrap().as_slice(), &[u32::MAX as f64]);
}

#[test]
fn test_set_array_from_a_view() {
    let source = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
    let column = source.slice(ndarray::s![.., 1..2]);

    let mut param = Parameter::new();
    param.set_array(&column);
    let array = param.array().unwrap();
    assert_eq!(array.dims(), [1, 3]);
    assert_eq!(array.as_slice(), &[2.0, 5.0, 8.0]);
}

#[test]
fn test_install_host_values() {
    let mut param = Parameter::new();

    let doubles = HostValue::F64Array(
        ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
    );
    param.install(&doubles).unwrap();
    assert_eq!(param.array().unwrap().dims(), [3, 2]);
    assert_eq!(param.array().unwrap().view()[[1, 0]], 4.0);

    let exact = HostValue::I64Array(
        ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![1i64 << 53, -(1i64 << 53)]).unwrap(),
    );
    param.install(&exact).unwrap();
    assert_eq!(param.array().unwrap().as_slice(), &[9007199254740992.0, -9007199254740992.0]);
}

#[test]
fn test_install_rejects_without_side_effects() {
    let mut param = Parameter::scalar(0.5);
    param.set_flags(ParameterFlags::NOT_OPTIMIZABLE);
    let before = param.clone();

    let rejected = [
        HostValue::Number(2.0),
        HostValue::Bool(false),
        HostValue::Text("[[1, 2]]".to_string()),
        HostValue::I32Array(ArrayD::zeros(IxDyn(&[2, 2, 2]))),
        HostValue::I64Array(ArrayD::from_elem(IxDyn(&[1, 1]), (1i64 << 53) + 1)),
    ];
    for value in &rejected {
        let err = param.install(value).unwrap_err();
        assert!(matches!(err, OptixError::TypeMismatch(_)), "{:?}", value);
        assert!(err.is_local());
        assert_eq!(param, before);
    }
}

#[test]
fn test_switching_variants_keeps_metadata() {
    let mut param = Parameter::scalar(1.0);
    param.set_bounds(Bounds::new(-2.0, 2.0).unwrap());
    param.set_group(ParameterGroup::Shape as i32);
    param.set_flags(ParameterFlags::from_bits(0x40) | ParameterFlags::NOT_OPTIMIZABLE);

    param.set_array(&array![[1.0, 2.0]]);
    assert_eq!(param.flags().bits(), 0x49);
    assert_eq!(param.bounds().max, 2.0);

    param.set_value(3.0);
    assert_eq!(param.flags().bits(), 0x41);
    assert_eq!(param.parameter_group(), Some(ParameterGroup::Shape));
}

#[test]
fn test_array_mut_edits_in_place() {
    let mut param = Parameter::new();
    param.set_array(&array![[0.0, 0.0], [0.0, 0.0]]);
    param.array_mut().unwrap().view_mut()[[1, 1]] = 7.0;
    assert_eq!(param.array().unwrap().as_slice(), &[0.0, 0.0, 0.0, 7.0]);
    assert!(Parameter::scalar(1.0).array_mut().is_none());
}

#[test]
fn test_payload_serialization_shape() {
    let param = Parameter::from_array(ParamArray::from_shape_vec(1, 2, vec![1.0, 2.0]).unwrap());
    let json = serde_json::to_value(&param).unwrap();
    assert_eq!(json["value"]["kind"], "array");

    let scalar = serde_json::to_value(Parameter::scalar(4.0)).unwrap();
    assert_eq!(scalar["value"]["kind"], "scalar");
    assert_eq!(scalar["value"]["data"], 4.0);

    let back: Parameter = serde_json::from_value(json).unwrap();
    assert!(matches!(back.payload(), ParamValue::Array(a) if a.dims() == [2, 1]));
}

#[test]
fn test_display_lists_every_field() {
    let mut param = Parameter::scalar(0.5);
    param.set_bounds(Bounds::new(0.0, 1.0).unwrap());
    param.set_multiplier(2.0);
    let text = param.to_string();
    assert!(text.starts_with("Parameter value 0.5"));
    assert!(text.contains("bounds [0, 1]"));
    assert!(text.contains("multiplier 2"));
    assert!(text.contains("flags 0x0"));
}
