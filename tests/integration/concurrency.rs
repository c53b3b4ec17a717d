//! One session shared between threads
//!
//! Every operation, including the error fetch after a failing call, runs
//! under the session lock, so a diagnostic always belongs to the call that
//! caused it.

use std::sync::Arc;
use std::thread;

use optix_rs::OptixError;

use crate::test_helpers::session;

const THREADS: usize = 8;
const ROUNDS: usize = 25;

#[test]
fn test_threads_share_one_session() {
    let session = Arc::new(session());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    let name = format!("M{}_{}", t, i);
                    let value = (t * ROUNDS + i) as f64 * 1e-3;

                    let element = {
                        let mut channel = session.lock().unwrap();
                        let element = channel
                            .create_element("SphericalMirror", &name)
                            .unwrap()
                            .unwrap();
                        let mut curvature = channel.get_parameter(element, "curvature").unwrap();
                        curvature.set_value(value);
                        channel
                            .set_parameter(element, "curvature", &curvature)
                            .unwrap();
                        element
                    };

                    let mut channel = session.lock().unwrap();
                    let back = channel.get_parameter(element, "curvature").unwrap();
                    assert_eq!(back.value(), Some(value));

                    let missing = format!("missing_{}_{}", t, i);
                    match channel.get_flags(element, &missing) {
                        Err(OptixError::UnknownParameter { name, message }) => {
                            assert_eq!(name, missing);
                            assert!(message.contains(&missing), "{}", message);
                        }
                        other => panic!("Expected UnknownParameter, got {:?}", other),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut channel = session.lock().unwrap();
    assert_eq!(channel.elements().count(), THREADS * ROUNDS);
    assert_eq!(channel.last_error(), None);
}
