//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use serde_yml::Value;
use std::io;
use std::path::Path;
use subi_types::{ColorChoice, InstallState};

use crate::network::NetworkView;

/// How the install run ended, as shown after the progress screen
pub struct InstallSummary<'a> {
    pub state: InstallState,
    pub crash_report: Option<&'a Path>,
    pub reboot_requested: bool,
    pub dry_run: bool,
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Color configuration
    color_choice: ColorChoice,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(color_choice: ColorChoice) -> Self {
        Self {
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render the end of an install run
    pub fn render_install_summary(&self, summary: &InstallSummary<'_>) -> io::Result<()> {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("Install").add_attribute(Attribute::Bold),
            Cell::new("").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("State"), self.state_cell(summary.state)]);
        if summary.dry_run {
            table.add_row(vec![Cell::new("Mode"), Cell::new("dry run")]);
        }
        if let Some(path) = summary.crash_report {
            table.add_row(vec![
                Cell::new("Crash report"),
                Cell::new(path.display().to_string()).fg(Color::Red),
            ]);
        }
        table.add_row(vec![
            Cell::new("Reboot"),
            Cell::new(if summary.reboot_requested {
                "requested"
            } else {
                "not requested"
            }),
        ]);

        self.term.write_line(&table.to_string())
    }

    /// Render the network overview
    pub fn render_network(&self, view: &NetworkView) -> io::Result<()> {
        self.term.write_line(&self.heading(
            "Configure at least one interface this server can use to talk to other \
             machines, and which preferably provides sufficient access for updates.",
        ))?;
        self.term.write_line("")?;

        for line in view.body_lines() {
            self.term.write_line(&line)?;
        }

        if !view.routes.is_empty() {
            self.term.write_line("")?;
            for line in &view.routes {
                self.term.write_line(line)?;
            }
        }

        if !view.options.is_empty() {
            self.term.write_line("")?;
            self.term.write_line(&self.heading("Additional options"))?;
            for option in &view.options {
                self.term.write_line(&format!("  • {option}"))?;
            }
        }

        Ok(())
    }

    /// Render the actions accepting the network configuration produces
    pub fn render_actions(&self, actions: &[Value]) -> io::Result<()> {
        let yaml = serde_yml::to_string(actions).map_err(io::Error::other)?;
        self.term.write_str(&yaml)
    }

    fn state_cell(&self, state: InstallState) -> Cell {
        let cell = Cell::new(state.to_string());
        if !self.supports_color() {
            return cell;
        }
        match state {
            InstallState::Done => cell.fg(Color::Green),
            InstallState::Error => cell.fg(Color::Red).add_attribute(Attribute::Bold),
            InstallState::UuCancelling => cell.fg(Color::Yellow),
            _ => cell,
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.supports_color() {
            Style::new().bold().apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Check if color output is supported
    fn supports_color(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}
