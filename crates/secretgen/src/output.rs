//! Terminal output utilities

use console::style;
use secretgen_engine::RunSummary;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

pub fn summary(summary: &RunSummary) {
    success(&format!(
        "{} generated, {} unchanged, {} external",
        summary.generated.len(),
        summary.unchanged.len(),
        summary.external.len()
    ));

    if !summary.generated.is_empty() {
        kv("generated", &summary.generated.join(", "));
    }
}
