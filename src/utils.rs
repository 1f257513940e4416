//! Console helpers for model and training summaries.
use std::fmt::Write;

use crate::activations::ActivationKind;
use crate::module::{Layer, Module};
use crate::sequential::Sequential;

/// One line per module, indented by nesting depth, plus a parameter total.
pub fn model_summary(model: &Sequential) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model Summary: {}", model);
    let mut stack: Vec<(&Layer, usize)> = model.layers().iter().rev().map(|l| (l, 1)).collect();
    while let Some((layer, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        let line = match layer {
            Layer::Dense(d) => format!(
                "Dense {} -> {} ({} params)",
                d.input_size(),
                d.output_size(),
                d.num_parameters()
            ),
            Layer::Sequential(s) => format!("Sequential ({} modules)", s.len()),
            other => match ActivationKind::of(other) {
                Some(kind) => kind.to_string(),
                None => other.name().to_string(),
            },
        };
        let _ = writeln!(out, "{}{}", indent, line);
        if let Some(children) = layer.submodules() {
            stack.extend(children.iter().rev().map(|c| (c, depth + 1)));
        }
    }
    let _ = write!(out, "Total parameters: {}", model.num_parameters());
    out
}

/// Print model summary
pub fn print_model_summary(model: &Sequential) {
    println!("{}", model_summary(model));
}

/// Print simple table for per-epoch values
pub fn print_summary_table(values: &[f64], title: &str) {
    println!("\n{} Summary Table:", title);
    println!("+----------------+------------+");
    println!("| Epoch Range    | Value      |");
    println!("+----------------+------------+");
    if let (Some(first), Some(last)) = (values.first(), values.last()) {
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        println!("| First Epoch    | {:>10.6} |", first);
        println!("| Last Epoch     | {:>10.6} |", last);
        println!("| All Epochs avg | {:>10.6} |", avg);
    }
    println!("+----------------+------------+");
}
