//! Progress reporting for long-running generation tasks.

use gaia_tasks::ProgressSender;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spawn a task that logs every progress update for `label`.
///
/// Repeated identical percentages are logged once. The task ends when the
/// returned sender and all its clones are dropped, which happens once the
/// subscription settles.
pub fn spawn_progress_logger(label: impl Into<String>) -> (ProgressSender, JoinHandle<()>) {
    let label = label.into();
    let (tx, mut rx) = mpsc::unbounded_channel::<f64>();

    let handle = tokio::spawn(async move {
        let mut last = None;
        while let Some(percent) = rx.recv().await {
            if last == Some(percent) {
                continue;
            }
            last = Some(percent);
            tracing::info!(task = %label, percent, "{}", render_bar(percent));
        }
    });

    (tx, handle)
}

/// Width of the rendered progress bar in characters.
const BAR_WIDTH: usize = 20;

/// Render `percent` as a fixed-width text bar, e.g. `[#####...] 25%`.
pub fn render_bar(percent: f64) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        clamped
    )
}
