use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if !no_color && std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status.to_ascii_uppercase()),
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

pub(crate) fn render_row(style: OutputStyle, columns: &[&str]) -> String {
    match style {
        OutputStyle::Plain => columns.join("\t"),
        OutputStyle::Rich => columns.join("  "),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub(crate) fn start(style: OutputStyle, label: &str) -> Self {
        let bar = (style == OutputStyle::Rich).then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<16} [{bar:24.cyan/blue}] {bytes}/{total_bytes}",
            ) {
                bar.set_style(template.progress_chars("=>-"));
            }
            bar.set_message(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Self { bar }
    }

    pub(crate) fn update(&self, written: u64, total: Option<u64>) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(written);
    }

    pub(crate) fn finish(self, written: u64) -> Option<String> {
        let bar = self.bar?;
        bar.finish_and_clear();
        Some(format!("downloaded {}", HumanBytes(written)))
    }
}
