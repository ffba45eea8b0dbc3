use stream_core::{ConnectionStatus, JobStatus, SessionView};

/// Turns successive session views into terminal lines, printing each item once.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    job_seq: u64,
    shown_items: usize,
    announced: Option<(u64, JobStatus)>,
    connection: ConnectionStatus,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &SessionView) -> Vec<String> {
        let mut lines = Vec::new();

        if view.connection != self.connection {
            self.connection = view.connection;
            lines.push(match view.connection {
                ConnectionStatus::Connected => "[connected]".to_string(),
                ConnectionStatus::Disconnected => {
                    "[disconnected] type :reconnect to retry".to_string()
                }
            });
        }

        if view.job_seq != self.job_seq {
            self.job_seq = view.job_seq;
            self.shown_items = 0;
            lines.push(format!(
                "> job {}: {}",
                view.job_seq,
                view.input.as_deref().unwrap_or_default()
            ));
        }

        for (index, item) in view.results.iter().enumerate().skip(self.shown_items) {
            lines.push(format!("  {:>3}. {}", index + 1, item));
        }
        self.shown_items = self.shown_items.max(view.results.len());

        let terminal = matches!(view.status, JobStatus::Completed | JobStatus::Failed);
        if terminal && self.announced != Some((view.job_seq, view.status)) {
            self.announced = Some((view.job_seq, view.status));
            lines.push(match view.status {
                JobStatus::Failed => format!(
                    "x failed: {}",
                    view.error.as_deref().unwrap_or("unknown error")
                ),
                _ => format!("ok done ({} item(s))", view.results.len()),
            });
        }

        lines
    }
}
