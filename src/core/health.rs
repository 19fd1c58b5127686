/// Post-deploy health checks
///
/// Liveness is read from the compose status listing; integrity is a
/// presence check on the application database file.

use std::path::Path;

fn is_up_line(line: &str) -> bool {
    line.split_whitespace().any(|word| word == "Up")
}

/// True if any status line reports a running (`Up`) container
pub fn any_container_up(status: &str) -> bool {
    status.lines().any(is_up_line)
}

/// Lines of the status listing that report a running container
pub fn running_lines(status: &str) -> Vec<&str> {
    status.lines().filter(|line| is_up_line(line)).collect()
}

/// Presence check for the database file
pub fn database_present(path: &Path) -> bool {
    path.is_file()
}
