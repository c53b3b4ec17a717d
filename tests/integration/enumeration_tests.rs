//! Cursor iteration over parameters and elements

use ndarray::array;
use optix_rs::parameters::ParameterFlags;
use optix_rs::OptixError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::test_helpers::{random_element, session};

#[test]
fn test_every_parameter_is_visited_once() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let session = session();
    let mut channel = session.lock().unwrap();

    for k in [0usize, 1, 2, 5, 37] {
        let (element, expected) = random_element(&mut channel, &format!("E{}", k), k, &mut rng);

        let visited: Vec<(String, f64)> = channel
            .parameters(element)
            .map(|item| {
                let (name, param) = item.unwrap();
                (name, param.value().unwrap())
            })
            .collect();
        assert_eq!(visited, expected, "element with {} parameters", k);
        assert_eq!(channel.engine_mut().open_cursors(), 0);
    }
}

#[test]
fn test_abandoned_iteration_releases_the_cursor() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let session = session();
    let mut channel = session.lock().unwrap();
    let (element, expected) = random_element(&mut channel, "E", 10, &mut rng);

    let first_three: Vec<String> = channel
        .parameters(element)
        .take(3)
        .map(|item| item.unwrap().0)
        .collect();
    assert_eq!(first_three, ["p000", "p001", "p002"]);
    assert_eq!(channel.engine_mut().open_cursors(), 0);

    // A new iterator starts over from the first parameter
    let mut first: Vec<String> = channel
        .parameters(element)
        .map(|item| item.unwrap().0)
        .collect();
    let mut second: Vec<String> = channel
        .parameters(element)
        .map(|item| item.unwrap().0)
        .collect();
    first.sort_unstable();
    second.sort_unstable();
    assert_eq!(first.len(), expected.len());
    assert_eq!(first, second);
}

#[test]
fn test_final_array_is_released_with_the_cursor() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let film = channel.create_element("PlaneFilm", "film").unwrap().unwrap();
    assert!(channel.engine_mut().clear_parameters(film.raw()));
    assert!(channel
        .engine_mut()
        .define_array(film.raw(), "map", [2, 1], vec![0.5, -0.5]));

    let items: Vec<_> = channel.parameters(film).map(Result::unwrap).collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].1.array().unwrap().as_slice(), &[0.5, -0.5]);
    assert_eq!(channel.engine_mut().live_arrays(), 0);
    assert_eq!(channel.engine_mut().open_cursors(), 0);
}

#[test]
fn test_enumerating_a_deleted_element_is_invalid_handle() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();
    channel.delete_element(mirror).unwrap();

    let items: Vec<_> = channel.parameters(mirror).collect();
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(OptixError::InvalidHandle { .. })));
}

#[test]
fn test_iteration_is_exhausted_after_the_last_item() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();

    let mut iter = channel.parameters(mirror);
    assert_eq!(iter.element(), mirror);
    assert_eq!(iter.by_ref().count(), 10);
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn test_enumerated_arrays_are_owned_copies() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let mirror = channel
        .create_element("NaturalPolynomialMirror", "NP")
        .unwrap()
        .unwrap();

    let limits = channel
        .parameters(mirror)
        .map(Result::unwrap)
        .find(|(name, _)| name == "surfaceLimits")
        .map(|(_, param)| param)
        .unwrap();
    assert!(limits.flags().contains(ParameterFlags::ARRAY_DATA | ParameterFlags::NOT_OPTIMIZABLE));

    let mut changed = limits.clone();
    changed.set_array(&array![[-3.0, 3.0], [-2.0, 2.0]]);
    channel.set_parameter(mirror, "surfaceLimits", &changed).unwrap();

    // The enumerated copy still holds what the engine had at the time
    assert_eq!(limits.array().unwrap().as_slice(), &[-1.0, 1.0, -1.0, 1.0]);
    assert_eq!(limits.array().unwrap().dims(), [2, 2]);
}

#[test]
fn test_small_name_buffer_fails_once() {
    let config = optix_rs::SessionConfig::default().with_name_buffer_capacity(4);
    let session = optix_rs::Session::with_config(optix_rs::SimulatedEngine::new(), config).unwrap();
    let mut channel = session.lock().unwrap();
    let mirror = channel.create_element("PlaneMirror", "M").unwrap().unwrap();

    let items: Vec<_> = channel.parameters(mirror).collect();
    // "DX", "DY", "DZ" fit in four bytes, "Dphi" does not
    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(|item| item.is_ok()));
    match &items[3] {
        Err(OptixError::Engine { operation, message }) => {
            assert_eq!(*operation, "EnumerateParameters");
            assert_eq!(message, "Buffer too small");
        }
        other => panic!("Expected Engine error, got {:?}", other),
    }
    assert_eq!(channel.engine_mut().open_cursors(), 0);
}

#[test]
fn test_elements_are_enumerated_by_name() {
    let session = session();
    let mut channel = session.lock().unwrap();
    let film = channel.create_element("PlaneFilm", "screen").unwrap().unwrap();
    let source = channel.create_element("GaussianSource", "source").unwrap().unwrap();
    let mirror = channel.create_element("SphericalMirror", "M1").unwrap().unwrap();

    let names: Vec<_> = channel
        .elements()
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            ("M1".to_string(), mirror),
            ("screen".to_string(), film),
            ("source".to_string(), source),
        ]
    );

    let first = channel.elements().next().unwrap().unwrap();
    assert_eq!(first.1, mirror);
    assert_eq!(channel.engine_mut().open_cursors(), 0);
}
