//! Regime segmentation of a simulated machine run.
//!
//! A press line cycles through idle, ramp-up and pressing phases. Sensor
//! noise makes raw k-means labels flicker at the phase boundaries; short
//! segments are then merged into their neighbours and the cleaned labels
//! are turned into a started/completed event log.
//!
//! Run with: cargo run --release --example segmentation

use regime_rs::{ClusterConfig, Dataset, FeaturizeConfig, Pipeline, PipelineConfig};

fn main() {
    // Phases (speed, force): idle, ramp, press
    let phases = [(0.0, 0.0, 40), (2.5, 3.0, 25), (5.0, 9.0, 35)];

    let mut timestamps = Vec::new();
    let mut rows = Vec::new();
    let mut t = 0.0;
    for cycle in 0..3 {
        for &(speed, force, len) in &phases {
            for i in 0..len {
                let k = (cycle * 100 + i) as f64;
                let noise = (k * 7.1).sin() * (k * 11.3).cos();
                rows.push(vec![speed + noise * 0.9, force + noise * 1.1]);
                timestamps.push(t);
                t += 0.25;
            }
        }
    }
    let dataset = Dataset::from_rows(timestamps, rows, vec!["speed".into(), "force".into()])
        .expect("synthetic dataset is well formed");

    println!("Regime segmentation");
    println!("===================");
    println!("Samples: {}", dataset.len());
    println!("Expected segments: {}\n", 3 * phases.len());

    for min_segment_length in [0, 5] {
        let config = PipelineConfig {
            featurize: FeaturizeConfig {
                dataset: "press_line_demo".into(),
                ..FeaturizeConfig::default()
            },
            cluster: ClusterConfig {
                learning_method: "minibatchkmeans".into(),
                n_clusters: 3,
                min_segment_length,
                ..ClusterConfig::default()
            },
            other: Default::default(),
        };
        let output = Pipeline::new(config)
            .and_then(|p| p.run(&dataset))
            .expect("clustering succeeds");

        println!("min_segment_length = {min_segment_length}");
        println!("  clusters:  {}", output.realized_clusters);
        println!("  segments:  {}", output.segments.len());
        if let Some(smoothing) = &output.smoothing {
            println!(
                "  smoothing: {} iterations, stalled = {}",
                smoothing.iterations, smoothing.stalled
            );
        }
        if let Some(validity) = &output.validity {
            println!(
                "  silhouette {:.3}, calinski-harabasz {:.1}, davies-bouldin {:.3}",
                validity.silhouette, validity.calinski_harabasz, validity.davies_bouldin
            );
        }
        for name in &output.cluster_names {
            println!("  {name}");
        }
        println!();
    }

    // Event log for the smoothed run
    let config = PipelineConfig {
        featurize: FeaturizeConfig {
            dataset: "press_line_demo".into(),
            ..FeaturizeConfig::default()
        },
        cluster: ClusterConfig {
            n_clusters: 3,
            min_segment_length: 5,
            ..ClusterConfig::default()
        },
        other: Default::default(),
    };
    let output = Pipeline::new(config)
        .and_then(|p| p.run(&dataset))
        .expect("clustering succeeds");

    println!("Event log ({}):", output.events.case);
    for event in &output.events.events {
        println!(
            "  t={:>6.2}  regime {}  {:?}",
            event.timestamp, event.label, event.status
        );
    }
}
