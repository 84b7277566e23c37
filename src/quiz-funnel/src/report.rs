//! Terminal rendering of a funnel report.

use funnel_core::DateFilter;
use funnel_reporting::FunnelReport;

const BAR_WIDTH: usize = 30;

pub fn print_report(report: &FunnelReport) {
    println!();
    println!("=== Quiz Funnel ({}) ===", describe_filter(&report.filter));
    if report.degraded {
        println!("  (statistics unavailable, showing an empty funnel)");
    }
    println!();

    let max = report
        .stats
        .iter()
        .map(|s| s.visitor_count)
        .max()
        .unwrap_or(0);
    for stat in &report.stats {
        println!(
            "  {:<24} {:>7}  {:>7}  {}",
            truncate(&stat.label, 24),
            stat.visitor_count,
            format!("{:.1}%", stat.drop_off_percent),
            bar(stat.visitor_count, max)
        );
    }

    println!();
    println!("  Visitors:          {}", report.summary.total_visitors);
    println!("  Unique visitors:   {}", report.total_unique_visitors);
    println!("  Completion rate:   {:.1}%", report.summary.completion_rate);
    match &report.summary.biggest_drop_off {
        Some(step) => println!(
            "  Biggest drop-off:  {} ({:.1}%)",
            step.label, step.drop_off_percent
        ),
        None => println!("  Biggest drop-off:  -"),
    }
    println!(
        "  Updated:           {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
}

fn describe_filter(filter: &DateFilter) -> String {
    match filter {
        DateFilter::AllTime => "all time".to_string(),
        DateFilter::Day { date } => date.format("%Y-%m-%d").to_string(),
        DateFilter::Range {
            start_date,
            end_date,
        } => format!(
            "{} .. {}",
            start_date.format("%Y-%m-%d"),
            end_date.format("%Y-%m-%d")
        ),
    }
}

fn bar(count: u64, max: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (count as f64 / max as f64 * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled.min(BAR_WIDTH))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
