//! Terminal surface trait

/// The UI's terminal widget, seen from the session core.
///
/// A surface is a sink for shell output. Keystrokes travel the other
/// way through the workspace, so they do not appear here.
pub trait TerminalSurface: Send {
    /// Render bytes received from the remote shell
    fn write(&mut self, data: &[u8]);

    /// The surface was resized; the core does not act on this
    fn resize(&mut self, _cols: u16, _rows: u16) {}
}
