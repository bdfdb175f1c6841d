//! Focus event stream parser
//!
//! One event per line:
//! ```text
//! active <window> [<title>]
//! title <window> [<title>]
//! group <n>
//! destroy <window>
//! ```
//!
//! Window ids are decimal or `0x`-prefixed hex. The title is the rest of the
//! line after one separating space. Blank lines and `#` comments are skipped.

use anyhow::{anyhow, bail, Context, Result};

/// Windowing-system window id
pub type WindowId = u64;

/// Event from the windowing system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The active window changed
    Active {
        /// Newly focused window
        window: WindowId,
        /// Its title, `None` when it could not be read
        title: Option<String>,
    },
    /// A window title changed
    Title {
        /// Window whose title changed
        window: WindowId,
        /// The new title, `None` when it could not be read
        title: Option<String>,
    },
    /// The keyboard layout group changed
    Group(u8),
    /// A window was destroyed
    Destroy(WindowId),
}

impl Event {
    /// Parse one input line; `Ok(None)` for blank lines and comments
    pub fn parse(line: &str) -> Result<Option<Event>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return Ok(None);
        }

        let (command, args) = match line.split_once(' ') {
            Some((command, args)) => (command, args),
            None => (line, ""),
        };

        let event = match command.to_ascii_lowercase().as_str() {
            "active" => {
                let (window, title) = window_and_title(args)?;
                Event::Active { window, title }
            }
            "title" => {
                let (window, title) = window_and_title(args)?;
                Event::Title { window, title }
            }
            "group" => {
                let group = args
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid group '{}'", args.trim()))?;
                Event::Group(group)
            }
            "destroy" => Event::Destroy(parse_window(args.trim())?),
            _ => bail!("unknown event '{}'", command),
        };

        Ok(Some(event))
    }
}

fn window_and_title(args: &str) -> Result<(WindowId, Option<String>)> {
    let (window, title) = match args.split_once(' ') {
        Some((window, title)) => (window, Some(title)),
        None => (args, None),
    };
    let window = parse_window(window)?;
    let title = title.filter(|t| !t.is_empty()).map(str::to_string);

    Ok((window, title))
}

fn parse_window(s: &str) -> Result<WindowId> {
    if s.is_empty() {
        return Err(anyhow!("missing window id"));
    }

    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => WindowId::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("invalid window id '{}'", s))
}
