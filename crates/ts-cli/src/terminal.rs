//! Local terminal plumbing for interactive sessions
//!
//! Raw mode handling, a [`TerminalSurface`] that renders to stdout, and
//! translation of crossterm key events into the bytes a remote shell
//! expects.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;

use ts_core::traits::TerminalSurface;

/// Puts the local terminal in raw mode and restores it on drop
pub struct RawModeGuard;

impl RawModeGuard {
    /// Enable raw mode
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Terminal surface that writes shell output to stdout
pub struct StdoutSurface;

impl TerminalSurface for StdoutSurface {
    fn write(&mut self, data: &[u8]) {
        let mut stdout = io::stdout().lock();
        if stdout.write_all(data).and_then(|_| stdout.flush()).is_err() {
            tracing::debug!("Dropped {} bytes of output, stdout closed", data.len());
        }
    }
}

/// What the user did at the local terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalInput {
    /// Bytes to send to the remote shell
    Bytes(Vec<u8>),
    /// Ctrl+] was pressed
    Detach,
    /// The local terminal was resized
    Resize(u16, u16),
}

/// Read terminal events on a blocking thread until the receiver is dropped
pub fn spawn_input_reader() -> (mpsc::Receiver<LocalInput>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<LocalInput>(256);

    let handle = tokio::task::spawn_blocking(move || loop {
        if tx.is_closed() {
            break;
        }
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let input = match event::read() {
            Ok(Event::Key(key)) => match translate_key(key) {
                Some(input) => input,
                None => continue,
            },
            Ok(Event::Paste(text)) => LocalInput::Bytes(text.into_bytes()),
            Ok(Event::Resize(cols, rows)) => LocalInput::Resize(cols, rows),
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Error reading terminal event: {}", e);
                break;
            }
        };
        if tx.blocking_send(input).is_err() {
            break;
        }
    });

    (rx, handle)
}

/// Map a key event to local input, ignoring key releases
pub fn translate_key(key: KeyEvent) -> Option<LocalInput> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(']') {
        return Some(LocalInput::Detach);
    }
    let data = key_to_bytes(key.code, key.modifiers);
    if data.is_empty() {
        None
    } else {
        Some(LocalInput::Bytes(data))
    }
}

/// Convert a key event to the bytes a terminal would send
pub fn key_to_bytes(code: KeyCode, modifiers: KeyModifiers) -> Vec<u8> {
    use KeyCode::*;

    match code {
        Char(c) => {
            if modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+A = 0x01, Ctrl+B = 0x02, etc.
                vec![(c.to_ascii_lowercase() as u8).wrapping_sub(b'a' - 1)]
            } else if modifiers.contains(KeyModifiers::ALT) {
                let mut bytes = vec![0x1b];
                bytes.extend_from_slice(c.to_string().as_bytes());
                bytes
            } else {
                c.to_string().into_bytes()
            }
        }
        Enter => vec![b'\r'],
        Tab => vec![b'\t'],
        BackTab => b"\x1b[Z".to_vec(),
        Backspace => vec![0x7f],
        Esc => vec![0x1b],
        Up => b"\x1b[A".to_vec(),
        Down => b"\x1b[B".to_vec(),
        Right => b"\x1b[C".to_vec(),
        Left => b"\x1b[D".to_vec(),
        Home => b"\x1b[H".to_vec(),
        End => b"\x1b[F".to_vec(),
        PageUp => b"\x1b[5~".to_vec(),
        PageDown => b"\x1b[6~".to_vec(),
        Delete => b"\x1b[3~".to_vec(),
        Insert => b"\x1b[2~".to_vec(),
        F(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => vec![],
        },
        _ => vec![],
    }
}
