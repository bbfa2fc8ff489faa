use std::fmt::Write;

use crate::deep_dive::DeepDive;
use crate::matcher::ConfusionMatrix;
use crate::prevention::PreventionStats;
use crate::tally::{NameValue, Tally};

const TOP_PENDING: usize = 10;

fn window_label(start: Option<&str>, end: Option<&str>) -> String {
    match (start, end) {
        (Some(start), Some(end)) => format!("tasks created {start} to {end}"),
        _ => "all time".to_string(),
    }
}

fn write_tally(output: &mut String, title: &str, tally: &Tally) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {title}");
    if tally.is_empty() {
        let _ = writeln!(output, "None recorded.");
        return;
    }
    for entry in tally.ranked() {
        let _ = writeln!(output, "- {}: {}", entry.name, entry.value);
    }
}

fn write_ranked(output: &mut String, title: &str, entries: &[NameValue]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {title}");
    if entries.is_empty() {
        let _ = writeln!(output, "None recorded.");
        return;
    }
    for entry in entries {
        let _ = writeln!(output, "- {}: {}", entry.name, entry.value);
    }
}

fn matrix_row(output: &mut String, label: &str, matrix: &ConfusionMatrix) {
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} | {} |",
        label,
        matrix.confirmed,
        matrix.false_alarm,
        matrix.missed,
        matrix.total()
    );
}

pub fn build_report(
    start: Option<&str>,
    end: Option<&str>,
    stats: &PreventionStats,
    dive: &DeepDive,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Issue Prevention Report");
    let _ = writeln!(output, "Generated for {}", window_label(start, end));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Headline");
    let _ = writeln!(
        output,
        "- {} critical tasks, {} with a customer report on the same site ({}% prevention rate)",
        stats.total_critical_tasks, stats.reported_overlap_count, stats.prevention_rate
    );
    let _ = writeln!(
        output,
        "- Diagnosis accuracy {}% ({} of {} report/task pairs matched)",
        stats.diagnosis_accuracy.rate,
        stats.diagnosis_accuracy.total_matches,
        stats.diagnosis_accuracy.total_comparisons
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Fault Classes");
    let _ = writeln!(output, "| Class | Confirmed | False alarm | Missed | Total |");
    let _ = writeln!(output, "| --- | --- | --- | --- | --- |");
    matrix_row(&mut output, "QoS", &stats.qos_matrix);
    matrix_row(&mut output, "Installation", &stats.installation_matrix);

    let efficiency = &stats.process_efficiency;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Process Efficiency");
    let _ = writeln!(
        output,
        "- Dispatch: {:.1} days avg across {} reports",
        efficiency.avg_dispatch_time, efficiency.count_closure
    );
    let _ = writeln!(
        output,
        "- Field resolution: {:.1} days avg across {} reports",
        efficiency.avg_resolution_time, efficiency.count_resolution
    );
    let _ = writeln!(
        output,
        "- Full lifecycle: {:.1} days avg across {} reports",
        efficiency.avg_lifecycle_time, efficiency.count_lifecycle
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Oldest Open Reports");
    if efficiency.oldest_pending.is_empty() {
        let _ = writeln!(output, "No open reports on critical sites.");
    } else {
        for pending in efficiency.oldest_pending.iter().take(TOP_PENDING) {
            let _ = writeln!(
                output,
                "- {} ({}) {:.1} days, {}",
                pending.report.slid,
                pending.report.reporter_label(),
                pending.age,
                pending.stage.label()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Breakdowns");
    write_tally(&mut output, "Report source", &stats.source_breakdown);
    write_tally(&mut output, "Overlap source", &stats.overlap_main_breakdown);
    write_tally(&mut output, "Reporters", &stats.reporter_stats);
    write_tally(&mut output, "Task reasons", &stats.reason_stats);
    write_tally(&mut output, "Companies", &stats.company_stats);

    let _ = writeln!(output);
    let _ = writeln!(output, "### Monthly overlaps");
    if stats.trend_data.is_empty() {
        let _ = writeln!(output, "None recorded.");
    } else {
        for (month, count) in stats.trend_data.iter() {
            let _ = writeln!(output, "- {month}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Deep Dive");
    let _ = writeln!(output, "{} critical tasks evaluated.", dive.total_tasks);
    write_ranked(&mut output, "Score distribution", &dive.score_distribution);
    write_ranked(&mut output, "Actions taken", &dive.action_taken_stats);
    write_ranked(&mut output, "No-action justifications", &dive.justification_stats);

    output
}
