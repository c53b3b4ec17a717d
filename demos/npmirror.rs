//! Example of exchanging parameters with a polynomial mirror.
//!
//! This example creates a natural polynomial mirror, sets its surface
//! limits and polynomial coefficients, and lists every parameter of the
//! element. It runs against the native engine when `OPTIX_LIBRARY` names
//! the library, and against the in-process engine otherwise.

use ndarray::array;
use optix_rs::{Channel, Engine, Session, SessionConfig, SimulatedEngine};

fn run<E: Engine>(channel: &mut Channel<'_, E>) -> Result<(), Box<dyn std::error::Error>> {
    let mirror = match channel.create_element("NaturalPolynomialMirror", "NPmirror")? {
        Some(id) => id,
        None => return Err("the engine refused to create NPmirror".into()),
    };
    println!("Created NPmirror as {}", mirror);

    // 1. Surface limits: [[Xmin, Xmax], [Ymin, Ymax]]
    let mut limits = channel.get_parameter(mirror, "surfaceLimits")?;
    limits.set_array(&array![[-10, 10], [-5, 5]]);
    channel.set_parameter(mirror, "surfaceLimits", &limits)?;
    let limits = channel.get_parameter(mirror, "surfaceLimits")?;
    println!("\nsurfaceLimits:\n{}", limits);

    // 2. Polynomial coefficients, 4 in X by 2 in Y
    let mut coefficients = channel.get_parameter(mirror, "coefficients")?;
    coefficients.set_array(&array![[0.0f32, 0.0, 1.0e-4, 0.0], [0.0, 2.0e-5, 0.0, 0.0]]);
    channel.set_parameter(mirror, "coefficients", &coefficients)?;
    let dims = channel.array_dims(mirror, "coefficients")?;
    println!("coefficients dims: {:?}", dims);

    // 3. A rejected store carries the engine's diagnostic
    let mut bad = limits.clone();
    bad.set_array(&array![[1.0, 1.0], [-5.0, 5.0]]);
    if let Err(e) = channel.set_parameter(mirror, "surfaceLimits", &bad) {
        println!("\nRejected as expected: {}", e);
    }

    // 4. Every parameter of the element
    println!("\nParameters of NPmirror:");
    for item in channel.parameters(mirror) {
        let (name, param) = item?;
        match param.array() {
            Some(a) => println!("  {:<14} array {:?}", name, a.dims()),
            None => println!(
                "  {:<14} {} (x{})",
                name,
                param.value().unwrap_or_default(),
                param.multiplier()
            ),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("NPmirror example");
    println!("================\n");

    let config = SessionConfig::from_env()?;
    if config.library_path.is_some() {
        let session = Session::open(config)?;
        let mut channel = session.lock()?;
        run(&mut channel)
    } else {
        let session = Session::with_config(SimulatedEngine::new(), config)?;
        let mut channel = session.lock()?;
        run(&mut channel)
    }
}
