//! Profiling binary for hull construction.
//! Run with: cargo flamegraph --profile release-with-debug --example profile_hull

use hull_surge::QuickHull;
use hull_surge::math::DVec3;
use std::f64::consts::PI;

/// Generate Fibonacci sphere points for an evenly distributed convex cloud
fn fibonacci_sphere_points(n: usize) -> Vec<DVec3> {
    let phi = PI * (5.0_f64.sqrt() - 1.0); // golden angle
    (0..n)
        .map(|i| {
            let y = 1.0 - (i as f64 / (n - 1) as f64) * 2.0;
            let radius = (1.0 - y * y).sqrt();
            let theta = phi * i as f64;
            DVec3::new(theta.cos() * radius, y, theta.sin() * radius)
        })
        .collect()
}

fn main() {
    const N: usize = 5_000;
    const ITERATIONS: usize = 200;

    let points = fibonacci_sphere_points(N);

    // One warm-up build to report hull statistics
    let hull = QuickHull::build(&points).expect("hull construction");
    println!(
        "Built hull with {} faces from {} points (tolerance {:e})",
        hull.face_count(),
        N,
        hull.tolerance()
    );
    println!("Running {} build iterations...", ITERATIONS);

    // Profile construction end to end
    let mut total_triangles = 0;
    for _ in 0..ITERATIONS {
        let hull = QuickHull::build(&points).expect("hull construction");
        total_triangles += hull.triangles().expect("emission").len();
    }

    println!("Done: {} triangles emitted in total", total_triangles);
}
