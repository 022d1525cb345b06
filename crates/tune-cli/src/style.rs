//! Terminal styling for CLI output. Colors only when stdout is a terminal.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

fn paint(text: impl AsRef<str>, colorize: impl FnOnce(&str) -> String) -> String {
    let text = text.as_ref();
    if std::io::stdout().is_terminal() {
        colorize(text)
    } else {
        text.to_string()
    }
}

pub fn ok(text: impl AsRef<str>) -> String {
    paint(text, |text| text.green().to_string())
}

pub fn warn(text: impl AsRef<str>) -> String {
    paint(text, |text| text.yellow().to_string())
}

pub fn error(text: impl AsRef<str>) -> String {
    paint(text, |text| text.red().bold().to_string())
}

pub fn key(text: impl AsRef<str>) -> String {
    paint(text, |text| text.cyan().to_string())
}

pub fn dim(text: impl AsRef<str>) -> String {
    paint(text, |text| text.dimmed().to_string())
}
