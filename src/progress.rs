use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const BAR_CHARS: &str = "█▓░";

fn style_or_default(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Progress bar over a known number of layout iterations (or any other
/// counted unit). Hidden when `visible` is false, so library callers and
/// tests stay quiet.
pub fn count_progress_bar(
    label: impl Into<String>,
    unit_label: &str,
    total_items: u64,
    visible: bool,
) -> ProgressBar {
    let pb = ProgressBar::new(total_items);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    let template = format!(
        "{{prefix:.bold.dim}} {{spinner:.green}} [{{elapsed_precise}}] {{wide_bar:.cyan/blue}} {{pos}}/{{len}} {unit_label} ({{eta}} @ {{per_sec}} {unit_label}/s) {{msg}}",
    );
    pb.set_style(style_or_default(&template).progress_chars(BAR_CHARS));
    pb.set_prefix(label.into());
    pb.enable_steady_tick(Duration::from_millis(75));
    pb
}

/// Spinner for steps without a meaningful count, such as the distance matrix.
pub fn spinner_progress(
    label: impl Into<String>,
    message: impl Into<String>,
    visible: bool,
) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    pb.set_style(style_or_default(
        "{prefix:.bold.dim} {spinner:.green} {msg} [{elapsed_precise}]",
    ));
    pb.set_prefix(label.into());
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(75));
    pb
}
