//! Keyboard layout group control

use std::io::Write;

use anyhow::{Context, Result};

/// Access to the keyboard's current layout group
pub trait Keyboard {
    /// Group currently in effect
    fn current_group(&self) -> u8;

    /// Record a group change reported by the event source
    fn observe_group(&mut self, group: u8);

    /// Switch the keyboard to `group`
    fn lock_group(&mut self, group: u8) -> Result<()>;
}

/// Keyboard driven over a line protocol
///
/// Group changes arrive as events; switches are written as `lock <n>` lines
/// for the wrapper that owns the real keyboard.
pub struct LineKeyboard<W: Write> {
    out: W,
    current: u8,
}

impl<W: Write> LineKeyboard<W> {
    /// Create a keyboard starting in `initial` group
    pub fn new(out: W, initial: u8) -> Self {
        Self {
            out,
            current: initial,
        }
    }
}

impl<W: Write> Keyboard for LineKeyboard<W> {
    fn current_group(&self) -> u8 {
        self.current
    }

    fn observe_group(&mut self, group: u8) {
        self.current = group;
    }

    fn lock_group(&mut self, group: u8) -> Result<()> {
        writeln!(self.out, "lock {}", group).context("Failed to write lock command")?;
        self.out.flush().context("Failed to flush lock command")?;
        self.current = group;
        Ok(())
    }
}

#[cfg(test)]
impl LineKeyboard<Vec<u8>> {
    /// Everything written so far
    pub fn output(&self) -> &[u8] {
        &self.out
    }
}
