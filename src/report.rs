use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One control action or anomaly recorded during a solve.
#[derive(Debug, Clone)]
pub struct Event {
    pub severity: Severity,
    pub message: String,
    /// Bus or branch the action applies to, e.g. "bus 4" or "branch 2".
    pub device: String,
    pub value: f64,
    pub expected: f64,
}

/// Ordered log of every control action taken during a solve: limit hits,
/// bus reclassifications, slack redistribution and skipped islands.
#[derive(Debug, Default, Clone)]
pub struct SolveReport {
    pub events: Vec<Event>,
}

impl SolveReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, severity: Severity, message: &str, device: String, value: f64, expected: f64) {
        self.events.push(Event {
            severity,
            message: message.to_string(),
            device,
            value,
            expected,
        });
    }

    pub fn add_info(&mut self, message: &str, device: String, value: f64, expected: f64) {
        self.add(Severity::Info, message, device, value, expected);
    }

    pub fn add_warning(&mut self, message: &str, device: String, value: f64, expected: f64) {
        self.add(Severity::Warning, message, device, value, expected);
    }

    pub fn add_error(&mut self, message: &str, device: String, value: f64, expected: f64) {
        self.add(Severity::Error, message, device, value, expected);
    }

    pub fn extend(&mut self, other: SolveReport) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.events {
            writeln!(
                f,
                "{}: {} [{}] value={} expected={}",
                e.severity, e.message, e.device, e.value, e.expected
            )?;
        }
        Ok(())
    }
}
