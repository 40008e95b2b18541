//! Console prompts and the cancel watcher.
//!
//! Prompting is generic over reader and writer so tests drive it with
//! in-memory buffers instead of a terminal.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::thread;

use tracing::info;

use crate::scheduler::CancelFlag;

/// Ask for a value, offering `default` when the operator just hits enter.
///
/// Unparseable input re-asks.  EOF accepts the default so a redirected or
/// closed stdin still produces a usable run.
pub fn ask<T>(
    input: &mut impl BufRead,
    output: &mut impl Write,
    label: &str,
    default: T,
) -> io::Result<T>
where
    T: FromStr + Display,
{
    loop {
        write!(output, "{label} [{default}]: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(default);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(default);
        }
        match trimmed.parse::<T>() {
            Ok(value) => return Ok(value),
            Err(_) => writeln!(output, "invalid value '{trimmed}', try again")?,
        }
    }
}

fn is_cancel_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit")
}

/// Watch stdin for `q` / `quit` on a detached thread and trip `cancel`.
///
/// EOF ends the watcher without cancelling; anything else typed is ignored.
/// The thread is left blocked on stdin when the run finishes first and goes
/// away with the process.
pub fn spawn_cancel_watcher(cancel: CancelFlag) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(text) if is_cancel_command(&text) => {
                    info!("Cancel requested from console");
                    cancel.cancel();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}
