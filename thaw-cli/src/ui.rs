//! Everything that ends up on the terminal.
//!
//! Messages are printed with a colored tag in front (`[i]`, `[w]`, ...) and
//! wrapped to the terminal width. Longer running work is shown as a `Task`
//! whose line is rewritten when it makes progress and when it is done.

use std::{
    fmt,
    io::{stdout, Write},
    mem,
    time::Instant,
};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use term_painter::{Color, Style, ToStyle};


macro_rules! info {
    () => { info!("") };
    ($($t:tt)*) => { crate::ui::print_msg(crate::ui::MsgKind::Info, format_args!($($t)*)) };
}

macro_rules! warn {
    () => { warn!("") };
    ($($t:tt)*) => { crate::ui::print_msg(crate::ui::MsgKind::Warning, format_args!($($t)*)) };
}

macro_rules! error {
    () => { error!("") };
    ($($t:tt)*) => { crate::ui::print_msg(crate::ui::MsgKind::Error, format_args!($($t)*)) };
}

/// Runs `$body` as a task labeled with the formatted message. `?` inside the
/// body returns from the surrounding function, leaving the line unfinished.
macro_rules! progress {
    ([$($label:tt)*] => $body:tt) => {{
        let task = crate::ui::Task::start(format!($($label)*));
        let out = $body;
        task.finish();
        out
    }};
}

/// Maximum width of wrapped message lines.
const MAX_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Error,
    Warning,
    Info,
    Debug,
    Task,
}

impl MsgKind {
    fn tag(self) -> char {
        match self {
            MsgKind::Error => '!',
            MsgKind::Warning => 'w',
            MsgKind::Info => 'i',
            MsgKind::Debug => '·',
            MsgKind::Task => '…',
        }
    }

    fn tag_style(self) -> Style {
        let color = match self {
            MsgKind::Error => Color::Red,
            MsgKind::Warning => Color::Yellow,
            MsgKind::Info => Color::Blue,
            MsgKind::Debug => Color::BrightBlack,
            MsgKind::Task => Color::Green,
        };
        color.bold()
    }

    fn text_style(self) -> Style {
        match self {
            MsgKind::Error => Color::BrightRed.to_style(),
            MsgKind::Warning => Color::BrightYellow.to_style(),
            MsgKind::Debug => Color::BrightBlack.to_style(),
            MsgKind::Info | MsgKind::Task => Color::NotSet.to_style(),
        }
    }
}

/// Prints a tagged message, wrapped to the terminal width. Continuation
/// lines are connected to the tag by a line on the left.
pub fn print_msg(kind: MsgKind, msg: fmt::Arguments<'_>) {
    let terminal = term_size::dimensions().map(|(w, _)| w).unwrap_or(80);
    let lines = wrap(&msg.to_string(), terminal.min(MAX_WIDTH).saturating_sub(7));

    let tag = kind.tag_style();
    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        let prefix = match i {
            0 => format!("[{}] ", kind.tag()),
            _ if i == last => "    └ ".to_string(),
            _ => "    │ ".to_string(),
        };
        println!("{}{}", tag.paint(prefix), kind.text_style().paint(line));
    }
}

/// Splits `text` into lines of at most `width` characters, breaking only at
/// whitespace. Words longer than `width` get a line of their own. Always
/// returns at least one line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let len = current.chars().count();
        if len > 0 && len + 1 + word.chars().count() > width {
            lines.push(mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(current);

    lines
}

/// A unit of work shown on a single, rewritten terminal line.
pub struct Task {
    label: String,
    started: Instant,
}

impl Task {
    pub fn start(label: impl Into<String>) -> Self {
        let task = Self {
            label: label.into(),
            started: Instant::now(),
        };
        task.print_line(&MsgKind::Task.tag().to_string(), "");
        task
    }

    /// Shows how many of `total` batches are done.
    pub fn update(&self, done: u32, total: u32) {
        let percent = if total == 0 { 100 } else { u64::from(done) * 100 / u64::from(total) };
        self.print_line(
            &MsgKind::Task.tag().to_string(),
            &format!("{:>3}% ({}/{} batches)", percent, done, total),
        );
    }

    /// Marks the task as done and moves to the next line.
    pub fn finish(self) {
        let elapsed = self.started.elapsed();
        self.print_line("✓", &format!("done (in {:.2?})", elapsed));
        println!();
    }

    fn print_line(&self, tag: &str, status: &str) {
        let style = MsgKind::Task.tag_style();
        print!("\r{} ", style.paint(format!("[{}]", tag)));
        MsgKind::Task.text_style().with(|| print!("{} ... ", self.label));
        // Padded to overwrite longer statuses printed before.
        print!("{}", style.paint(format!("{:<24}", status)));
        let _ = stdout().flush();
    }
}

/// Forwards records of the `thaw` library to `print_msg`.
struct Logger {
    level: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let kind = match record.level() {
            Level::Error => MsgKind::Error,
            Level::Warn => MsgKind::Warning,
            Level::Info => MsgKind::Info,
            Level::Debug | Level::Trace => MsgKind::Debug,
        };
        print_msg(kind, *record.args());
    }

    fn flush(&self) {
        let _ = stdout().flush();
    }
}

/// Installs the logger. `verbose` is the number of `-v` flags.
pub fn init_logger(verbose: u8) -> Result<(), SetLoggerError> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    log::set_boxed_logger(Box::new(Logger { level }))?;
    log::set_max_level(level);
    Ok(())
}

/// Formats the given integer with `,` as thousand separator.
pub fn fmt_with_thousand_sep(v: u64) -> String {
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousand_sep() {
        assert_eq!(fmt_with_thousand_sep(0), "0");
        assert_eq!(fmt_with_thousand_sep(999), "999");
        assert_eq!(fmt_with_thousand_sep(1000), "1,000");
        assert_eq!(fmt_with_thousand_sep(1_050_007), "1,050,007");
    }

    #[test]
    fn wrapping() {
        assert_eq!(wrap("", 10), [""]);
        assert_eq!(wrap("short text", 10), ["short text"]);
        assert_eq!(wrap("a bit  longer text", 10), ["a bit", "longer", "text"]);
        assert_eq!(wrap("unbreakable_word here", 5), ["unbreakable_word", "here"]);
    }
}
