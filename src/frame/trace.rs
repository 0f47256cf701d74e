//! Trace Builder
//!
//! Renders a failure together with the chain of context names it surfaced through.

use crate::frame::Frame;
use std::fmt;

/// Rendered once per failure and shared by every handler in the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    failure: String,
    frames: Vec<String>,
    rendered: String,
}

impl Trace {
    /// Trace from `frame` outward, using the configured banner
    pub fn capture(frame: &Frame, failure: &dyn fmt::Display) -> Self {
        let settings = crate::config::current();
        Self::with_banner(frame, failure, &settings.trace_banner)
    }

    pub fn with_banner(frame: &Frame, failure: &dyn fmt::Display, banner: &str) -> Self {
        let failure = failure.to_string();
        let frames: Vec<String> = frame.ancestors().map(|f| f.name().to_string()).collect();

        let mut rendered = String::with_capacity(
            failure.len() + banner.len() + frames.iter().map(|n| n.len() + 1).sum::<usize>() + 1,
        );
        rendered.push_str(&failure);
        rendered.push('\n');
        rendered.push_str(banner);
        for name in &frames {
            rendered.push('\n');
            rendered.push_str(name);
        }

        Trace {
            failure,
            frames,
            rendered,
        }
    }

    /// Textual form of the failure the trace was built from
    pub fn failure(&self) -> &str {
        &self.failure
    }

    /// Context names, most nested first
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for Trace {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

/// Render the trace for a failure surfacing at `frame`
pub fn build_trace(frame: &Frame, failure: &dyn fmt::Display) -> String {
    Trace::capture(frame, failure).rendered
}
