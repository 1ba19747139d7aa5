use colored::Colorize;
use envkit::Phase;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

// ============================================================================
// Formatting
// ============================================================================

/// Comma-separated identifiers, or "none"
pub fn id_list<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let ids: Vec<&str> = ids.into_iter().collect();
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

/// Lifecycle phase colored by health
pub fn phase(phase: Phase) -> String {
    let label = phase.to_string();
    match phase {
        Phase::Configured => label.green().to_string(),
        Phase::Created | Phase::Updating => label.yellow().to_string(),
        Phase::Absent | Phase::Deleted => label.dimmed().to_string(),
    }
}

/// Print the pulse8 banner
pub fn banner() {
    println!(
        "{}",
        r#"
  ██████╗ ██╗   ██╗██╗     ███████╗███████╗ █████╗
  ██╔══██╗██║   ██║██║     ██╔════╝██╔════╝██╔══██╗
  ██████╔╝██║   ██║██║     ███████╗█████╗  ╚█████╔╝
  ██╔═══╝ ██║   ██║██║     ╚════██║██╔══╝  ██╔══██╗
  ██║     ╚██████╔╝███████╗███████║███████╗╚█████╔╝
  ╚═╝      ╚═════╝ ╚══════╝╚══════╝╚══════╝ ╚════╝
"#
        .cyan()
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list() {
        assert_eq!(id_list(["kafka", "postgresql"]), "kafka, postgresql");
        assert_eq!(id_list(Vec::<&str>::new()), "none");
    }

    #[test]
    fn test_phase_keeps_label() {
        colored::control::set_override(false);
        assert_eq!(phase(Phase::Configured), "configured");
        assert_eq!(phase(Phase::Updating), "updating");
        colored::control::unset_override();
    }
}
