use std::io::{BufRead, StdinLock, Stdout, Write};

use crate::models::TeamProject;

/// Interactive steps of the changeset export. `None` means the user cancelled.
pub trait Prompt {
    fn pick_project(&mut self, projects: &[TeamProject]) -> Option<TeamProject>;

    /// Returns the entered integer, `default` for an empty answer, or `None`
    /// when the input is cancelled or not a number. Range checks are left to
    /// the caller.
    fn ask_positive_integer(&mut self, message: &str, default: i64) -> Option<i64>;
}

pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        write!(self.output, "{question}").ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> Prompt for ConsolePrompt<R, W> {
    fn pick_project(&mut self, projects: &[TeamProject]) -> Option<TeamProject> {
        if projects.is_empty() {
            writeln!(self.output, "No team projects found in this collection.").ok()?;
            return None;
        }

        writeln!(self.output, "Team projects:").ok()?;
        for (i, project) in projects.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, project.name).ok()?;
        }

        let answer = self.ask("Select a project by number or name (empty to cancel): ")?;
        if answer.is_empty() {
            return None;
        }

        if let Ok(number) = answer.parse::<usize>() {
            return projects.get(number.checked_sub(1)?).cloned();
        }

        projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&answer))
            .cloned()
    }

    fn ask_positive_integer(&mut self, message: &str, default: i64) -> Option<i64> {
        let answer = self.ask(&format!("{message} [{default}]: "))?;
        if answer.is_empty() {
            return Some(default);
        }

        answer.parse().ok()
    }
}
