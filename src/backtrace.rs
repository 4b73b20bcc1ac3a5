//! Backtrace renderer boundary.

/// Produces a formatted call stack on demand.
///
/// Capture is comparatively expensive, so the recorder only asks for it
/// when configuration says so (always by default on the slow path, opt-in
/// on the normal path).
pub trait BacktraceRenderer: Send + Sync {
    fn render(&self) -> String;
}

/// Renderer backed by [`std::backtrace::Backtrace`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdBacktraceRenderer;

impl BacktraceRenderer for StdBacktraceRenderer {
    fn render(&self) -> String {
        std::backtrace::Backtrace::force_capture().to_string()
    }
}
