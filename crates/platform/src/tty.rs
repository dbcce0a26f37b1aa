//! Controlling terminal detection

use std::io::IsTerminal;
use std::path::Path;

/// Written to the install lock when stdin is not a terminal
pub const NOT_A_TTY: &str = "/dev/not a tty";

/// Device path of the terminal on stdin, or [`NOT_A_TTY`]
#[must_use]
pub fn controlling_tty() -> String {
    if !std::io::stdin().is_terminal() {
        return NOT_A_TTY.to_string();
    }
    resolve_fd_link(Path::new("/proc/self/fd/0"))
}

fn resolve_fd_link(link: &Path) -> String {
    std::fs::read_link(link).map_or_else(
        |_| NOT_A_TTY.to_string(),
        |path| path.display().to_string(),
    )
}
