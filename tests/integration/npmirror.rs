//! The polynomial mirror walkthrough
//!
//! Create a natural polynomial mirror, set its surface limits and
//! polynomial coefficients, read them back, and enumerate the element.

use ndarray::{array, Array2};
use optix_rs::parameters::ParameterFlags;

use crate::test_helpers::session;

#[test]
fn test_npmirror_scenario() {
    let session = session();
    let mut channel = session.lock().unwrap();

    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NPmirror")
        .unwrap()
        .expect("engine refused NPmirror");
    assert!(channel.is_element_valid(mirror));
    assert_eq!(channel.element_type(mirror).unwrap(), "NaturalPolynomialMirror");

    // Surface limits
    let mut limits = channel.get_parameter(mirror, "surfaceLimits").unwrap();
    limits.set_array(&array![[-10, 10], [-5, 5]]);
    channel.set_parameter(mirror, "surfaceLimits", &limits).unwrap();

    let back = channel.get_parameter(mirror, "surfaceLimits").unwrap();
    let array = back.array().unwrap();
    assert_eq!(array.dims(), [2, 2]);
    assert_eq!(array.view(), array![[-10.0, 10.0], [-5.0, 5.0]].view());

    // Coefficients
    let mut coefficients = channel.get_parameter(mirror, "coefficients").unwrap();
    let matrix: Array2<f32> = array![[0.0, 1.0e-3, 2.0e-5, 0.5], [1.0, -1.0e-3, 0.25, -0.125]];
    coefficients.set_array(&matrix);
    channel
        .set_parameter(mirror, "coefficients", &coefficients)
        .unwrap();

    let back = channel.get_parameter(mirror, "coefficients").unwrap();
    assert_eq!(back, coefficients);
    assert_eq!(back.array().unwrap().dims(), [4, 2]);
    assert!(back.flags().contains(ParameterFlags::NOT_OPTIMIZABLE));

    // Enumeration
    let snapshot = channel.snapshot(mirror).unwrap();
    assert!(snapshot.contains("surfaceLimits"));
    assert!(snapshot.contains("coefficients"));
    assert_eq!(snapshot.get("coefficients").unwrap(), &coefficients);

    let mut arrays = snapshot.array_names();
    arrays.sort_unstable();
    assert_eq!(arrays, ["coefficients", "surfaceLimits"]);
}
