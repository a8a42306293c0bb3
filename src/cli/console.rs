use colored::*;
use std::io::{self, BufRead, Write};

use crate::permissions::{
    PermissionDecision, PermissionOutcome, PermissionRequest, PermissionRule, Policy,
};

/// Console handles all terminal I/O with colored formatting
pub struct Console {
    allow_color: Color,
    deny_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            allow_color: Color::Green,
            deny_color: Color::Red,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(allow_color: Color, deny_color: Color) -> Self {
        Self {
            allow_color,
            deny_color,
        }
    }

    fn policy_label(&self, policy: Policy) -> ColoredString {
        match policy {
            Policy::Allow => "allow".color(self.allow_color).bold(),
            Policy::Deny => "deny".color(self.deny_color).bold(),
        }
    }

    /// Print the result of an evaluation
    pub fn print_outcome(&self, tool_name: &str, origin: &str, outcome: &PermissionOutcome) {
        let verdict = match outcome {
            PermissionOutcome::Allowed => "allowed".color(self.allow_color).bold(),
            PermissionOutcome::Denied => "denied".color(self.deny_color).bold(),
            PermissionOutcome::Request(_) => "needs a decision".yellow().bold(),
        };
        println!("{} @ {}: {}", tool_name.bold(), origin, verdict);
    }

    /// Print a stored rule list
    pub fn print_rules(&self, rules: &[PermissionRule]) {
        if rules.is_empty() {
            self.print_system("No permission rules stored.");
            return;
        }

        for rule in rules {
            println!(
                "  {:<6} {:<32} {:<40} {}",
                self.policy_label(rule.policy),
                rule.tool_pattern,
                rule.origin_pattern,
                rule.updated_at
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
                    .bright_black()
            );
        }
    }

    /// Print a stored rule after it was written
    pub fn print_rule(&self, rule: &PermissionRule) {
        println!(
            "{} {} @ {}",
            self.policy_label(rule.policy),
            rule.tool_pattern.bold(),
            rule.origin_pattern
        );
    }

    /// Print a system message (errors, info, etc.)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Ask the user to decide a permission request
    ///
    /// The prompt goes to stderr so stdout only carries results.
    /// Re-prompts until the answer is one of y/n/a/d.
    pub fn ask_permission(&self, request: &PermissionRequest) -> io::Result<PermissionDecision> {
        let stdin = io::stdin();
        let stderr = io::stderr();
        self.ask_permission_from(request, &mut stdin.lock(), &mut stderr.lock())
    }

    fn ask_permission_from(
        &self,
        request: &PermissionRequest,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> io::Result<PermissionDecision> {
        writeln!(output, "{}", "-".repeat(60).bright_black())?;
        writeln!(
            output,
            "{} {} wants to run on {}",
            "Permission:".yellow().bold(),
            request.tool_name.bold(),
            request.origin
        )?;
        writeln!(
            output,
            "  [y] allow once   [n] deny once   [a] always allow   [d] always deny"
        )?;

        loop {
            write!(output, "{} ", ">".yellow().bold())?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                // EOF: deny rather than hang
                return Ok(PermissionDecision::DenyOnce);
            }

            if let Some(decision) = parse_answer(&line) {
                return Ok(decision);
            }
            writeln!(output, "{} Please answer y, n, a or d", "Error:".red().bold())?;
        }
    }
}

fn parse_answer(answer: &str) -> Option<PermissionDecision> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(PermissionDecision::AllowOnce),
        "n" | "no" => Some(PermissionDecision::DenyOnce),
        "a" | "always" => Some(PermissionDecision::AllowAlways),
        "d" | "never" => Some(PermissionDecision::DenyAlways),
        _ => None,
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
