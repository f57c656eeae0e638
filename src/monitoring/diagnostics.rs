use tracing::warn;

/// A record that a batch operation skipped, and why
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub subject: String,
    pub message: String,
}

/// Collects per-record warnings from batch operations so callers can
/// inspect what was dropped without relying on log output.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to the tracing subscriber
    pub fn warn(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let entry = Diagnostic {
            subject: subject.into(),
            message: message.into(),
        };
        warn!("{}: {}", entry.subject, entry.message);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
