//! Readiness detection from free-form server output.

/// Substrings that mark a server as initialized and listening on stdin.
pub const DEFAULT_READY_MARKERS: &[&str] = &[
    "MCP Server running on stdio",
    "MCP server ready",
    "Server listening",
    "server running on stdio",
];

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Classification of one line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Contains a readiness marker.
    Ready,
    /// Ordinary stdout text.
    Output,
    /// Stderr text without a marker; logged, not a failure.
    Diagnostic,
    /// Nothing but whitespace.
    Blank,
}

/// Decides readiness by case-sensitive substring match.
#[derive(Debug, Clone)]
pub struct ReadinessDetector {
    markers: Vec<String>,
}

impl Default for ReadinessDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessDetector {
    /// Detector with the built-in markers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: DEFAULT_READY_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }

    /// Detector with the built-in markers plus `extra`.
    #[must_use]
    pub fn with_markers<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut detector = Self::new();
        detector.markers.extend(
            extra
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty()),
        );
        detector
    }

    /// The markers in use.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether `text` contains any marker.
    #[must_use]
    pub fn is_ready_marker(&self, text: &str) -> bool {
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Classify a line from either stream.
    #[must_use]
    pub fn classify(&self, stream: OutputStream, line: &str) -> LineKind {
        if line.trim().is_empty() {
            LineKind::Blank
        } else if self.is_ready_marker(line) {
            LineKind::Ready
        } else {
            match stream {
                OutputStream::Stdout => LineKind::Output,
                OutputStream::Stderr => LineKind::Diagnostic,
            }
        }
    }
}
