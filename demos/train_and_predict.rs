//! Demo: read LIBSVM data, train a multi-class machine, predict and save it

use env_logger::Env;
use log::info;
use ndarray::{Array2, Axis};
use std::io::Write;
use svmachine::{KernelType, LibsvmFile, Machine, ModelFormat, Normalization, Trainer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    println!("=== Train and Predict Demo ===");

    // Three classes in LIBSVM format, features on different scales
    let mut data = tempfile::NamedTempFile::new()?;
    for i in 0..12 {
        let t = i as f64 / 12.0;
        writeln!(data, "1 1:{} 2:{}", 10.0 + t, 200.0 - 30.0 * t)?;
        writeln!(data, "2 1:{} 2:{}", 14.0 + t, 260.0 + 20.0 * t)?;
        writeln!(data, "3 1:{} 3:{}", 12.0 - t, 1.0 + t)?;
    }
    data.flush()?;

    let mut file = LibsvmFile::open(data.path())?;
    println!("Loaded {file}");
    let (labels, rows) = file.read_all()?;

    // One training group per file label
    let mut classes: Vec<i64> = labels.clone();
    classes.sort_unstable();
    classes.dedup();
    let groups: Vec<Array2<f64>> = classes
        .iter()
        .map(|&class| {
            let idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
            rows.select(Axis(0), &idx)
        })
        .collect();

    let normalization = Normalization::fit(rows.view())?;
    let machine = Trainer::new()
        .with_kernel_type(KernelType::Rbf)
        .with_cost(10.0)
        .with_probability(true)
        .train_normalized(&groups, normalization.subtract(), normalization.divide())?;

    println!(
        "Machine: {} classes, labels {:?}, {} support vectors",
        machine.n_classes(),
        machine.labels(),
        machine.n_support_vectors()
    );

    let predicted = machine.predict_classes(rows.view())?;
    // Machine labels are 1..=N in group order, map them back to file labels
    let correct = predicted
        .iter()
        .zip(&labels)
        .filter(|(&p, &l)| classes[(p - 1) as usize] == l)
        .count();
    println!(
        "Training accuracy: {:.1}%",
        100.0 * correct as f64 / labels.len() as f64
    );

    let probe = [11.0, 190.0, 0.0];
    let (label, probabilities) = machine.predict_class_and_probabilities(&probe)?;
    println!("Probe {probe:?} -> class {label}, probabilities {probabilities:.3?}");

    let dir = tempfile::tempdir()?;
    let state_path = dir.path().join("machine.json");
    machine.save(&state_path, ModelFormat::State)?;
    let restored = Machine::from_state_file(&state_path)?;
    info!("Restored machine from {}", state_path.display());
    println!(
        "Restored machine predicts class {}",
        restored.predict_class(&probe)?
    );

    Ok(())
}
