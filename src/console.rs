//! Colorful console output for optimization runs.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::Duration;

use crate::orchestrator::{ClusterOutcome, OptimizationResult};

/// ASCII art banner for server startup.
pub fn print_banner() {
    let banner = r#"
  ____             _          ___        _   _           _
 |  _ \ ___  _   _| |_ ___   / _ \ _ __ | |_(_)_ __ ___ (_)_______ _ __
 | |_) / _ \| | | | __/ _ \ | | | | '_ \| __| | '_ ` _ \| |_  / _ \ '__|
 |  _ < (_) | |_| | ||  __/ | |_| | |_) | |_| | | | | | | |/ /  __/ |
 |_| \_\___/ \__,_|\__\___|  \___/| .__/ \__|_|_| |_| |_|_/___\___|_|
                                  |_|
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Delivery Route Optimizer".bright_cyan()
    );
}

/// Prints the size of an incoming request.
pub fn print_optimization_started(job_id: &str, stops: usize, vehicles: usize) {
    println!(
        "{} {} {} Optimizing ({}): stops ({}), vehicles ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Optimizer]".bright_cyan(),
        job_id.white(),
        stops.to_formatted_string(&Locale::en).bright_yellow(),
        vehicles.to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints one line per solved cluster.
pub fn print_cluster_outcome(cluster: &ClusterOutcome) {
    let routed: usize = cluster.outcome.tours().iter().map(|t| t.stop_ids.len()).sum();
    let label = match &cluster.city {
        Some(city) => format!("[{} {}]", cluster.cluster_id, city),
        None => format!("[{}]", cluster.cluster_id),
    };
    let mode = match cluster.outcome.degrade_reason() {
        Some(reason) => format!("heuristic: {}", reason).yellow().to_string(),
        None => "remote".bright_green().to_string(),
    };

    println!(
        "    {} {} │ depot {} │ {} routed │ {} unassigned │ {}",
        "→".bright_blue(),
        label.bright_cyan(),
        cluster.depot.source.as_str().white(),
        format!("{:>4}", routed.to_formatted_string(&Locale::en)).bright_magenta().bold(),
        cluster.outcome.unassigned().len().to_formatted_string(&Locale::en).white(),
        mode
    );
}

/// Prints the final summary box.
pub fn print_optimization_ended(total_duration: Duration, result: &OptimizationResult) {
    println!(
        "{} {} {} Optimization ended: time spent ({}), strategy ({}), clusters ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Optimizer]".bright_cyan(),
        format_duration(total_duration).yellow(),
        result.strategy.as_str().white(),
        result.clusters.len().to_string().white()
    );

    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let degraded = result.is_degraded();
    let status_text = if degraded {
        "⚠ HEURISTIC FALLBACK USED"
    } else {
        "✓ ROUTES OPTIMIZED"
    };
    let status_colored = if degraded {
        status_text.yellow().bold().to_string()
    } else {
        status_text.bright_green().bold().to_string()
    };
    let status_padding = 56 - status_text.chars().count();
    let left_pad = status_padding / 2;
    let right_pad = status_padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_colored,
        " ".repeat(right_pad),
        "║".bright_cyan()
    );

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());

    let rows = [
        ("Routes:", result.routes().len().to_formatted_string(&Locale::en)),
        ("Stops Routed:", result.routed_stop_count().to_formatted_string(&Locale::en)),
        ("Unassigned:", result.unassigned().len().to_formatted_string(&Locale::en)),
        ("Excluded:", result.excluded.len().to_formatted_string(&Locale::en)),
        ("Vehicles Left Out:", result.rejected_vehicles.len().to_formatted_string(&Locale::en)),
        ("Total Distance:", format_km(total_distance_km(result))),
        ("Solving Time:", format!("{:.2}s", total_duration.as_secs_f64())),
    ];
    for (label, value) in rows {
        println!(
            "{}  {:<18}{:>36}  {}",
            "║".bright_cyan(),
            label,
            value,
            "║".bright_cyan()
        );
    }

    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn total_distance_km(result: &OptimizationResult) -> f64 {
    result
        .clusters
        .iter()
        .flat_map(|c| c.outcome.tours())
        .filter_map(|t| t.distance_km)
        .sum()
}

fn format_km(km: f64) -> String {
    let whole = km.trunc() as u64;
    let tenths = ((km - km.trunc()) * 10.0).round() as u64;
    if tenths >= 10 {
        return format!("{}.0 km", (whole + 1).to_formatted_string(&Locale::en));
    }
    format!("{}.{} km", whole.to_formatted_string(&Locale::en), tenths)
}

/// Formats a duration nicely.
fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

/// Returns a timestamp string.
fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs();
            let millis = d.subsec_millis();
            format!("{}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "0.000".to_string())
}
