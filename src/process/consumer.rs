//! Line consumers fed by stream drainers

use tracing::debug;

/// Receives decoded output one line at a time.
///
/// A consumer is owned by exactly one drainer for the lifetime of a stream,
/// so implementations need no synchronization.
pub trait LineConsumer: Send + 'static {
    /// Handle a single line, without its trailing newline
    fn consume(&mut self, line: String);
}

/// Accumulates every line in arrival order
#[derive(Debug, Default, Clone)]
pub struct LineCollector {
    lines: Vec<String>,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines collected so far
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Collected lines joined with `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl LineConsumer for LineCollector {
    fn consume(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Forwards each line to a closure
pub struct FnConsumer<F>(pub F);

impl<F> std::fmt::Debug for FnConsumer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FnConsumer").finish_non_exhaustive()
    }
}

impl<F> LineConsumer for FnConsumer<F>
where
    F: FnMut(String) + Send + 'static,
{
    fn consume(&mut self, line: String) {
        (self.0)(line)
    }
}

/// Collects lines and echoes them to the debug log
#[derive(Debug)]
pub struct TeeConsumer {
    label: &'static str,
    inner: LineCollector,
}

impl TeeConsumer {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: LineCollector::new(),
        }
    }

    pub fn into_collector(self) -> LineCollector {
        self.inner
    }
}

impl LineConsumer for TeeConsumer {
    fn consume(&mut self, line: String) {
        debug!("[{}] {}", self.label, line);
        self.inner.consume(line);
    }
}
