use crossterm::tty::IsTty;
use crossterm::{QueueableCommand, cursor, terminal};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Minimum gap between two redraws of the transient line.
const REDRAW_INTERVAL: Duration = Duration::from_millis(40);
const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl Level {
    fn render(self, message: &str) -> String {
        match self {
            Self::Info => format!("{} {}", "pakt".bright_cyan().bold(), message.white()),
            Self::Success => format!("{} {}", "✓".bright_green().bold(), message.bright_green()),
            Self::Warning => format!("{} {}", "⚠".bright_yellow().bold(), message.bright_yellow()),
            Self::Error => format!("{} {}", "✗".bright_red().bold(), message.bright_red()),
            Self::Debug => format!("{} {}", "•".bright_black().bold(), message.bright_black()),
        }
    }
}

/// The one-line area that status and progress messages overwrite in place.
#[derive(Debug)]
struct Transient {
    visible: bool,
    drawn_at: Option<Instant>,
}

/// Terminal output for one install.
///
/// Status and progress lines are transient: they are redrawn in place on a
/// terminal and dropped entirely when stdout is redirected. Log lines are
/// permanent and first clear whatever transient line is showing.
#[derive(Debug)]
pub struct Logger {
    started: Instant,
    quiet: bool,
    interactive: bool,
    transient: Mutex<Transient>,
}

impl Logger {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            started: Instant::now(),
            quiet,
            interactive: io::stdout().is_tty(),
            transient: Mutex::new(Transient {
                visible: false,
                drawn_at: None,
            }),
        }
    }

    fn transient(&self) -> std::sync::MutexGuard<'_, Transient> {
        self.transient.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(stdout: &mut io::Stdout, transient: &mut Transient) {
        if transient.visible {
            let _ = stdout.queue(cursor::MoveToColumn(0));
            let _ = stdout.queue(terminal::Clear(terminal::ClearType::CurrentLine));
            transient.visible = false;
        }
    }

    /// Redraws the transient line; `force` skips the redraw throttle.
    fn draw(&self, line: &str, force: bool) {
        if self.quiet || !self.interactive {
            return;
        }
        let mut transient = self.transient();
        let now = Instant::now();
        let throttled = transient
            .drawn_at
            .is_some_and(|at| now.duration_since(at) < REDRAW_INTERVAL);
        if throttled && !force {
            return;
        }

        let mut stdout = io::stdout();
        Self::clear(&mut stdout, &mut transient);
        let _ = write!(stdout, "{line}");
        let _ = stdout.flush();
        transient.visible = true;
        transient.drawn_at = Some(now);
    }

    /// Prints a permanent line, replacing the transient one.
    pub fn line(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut transient = self.transient();
        let mut stdout = io::stdout();
        Self::clear(&mut stdout, &mut transient);
        let _ = writeln!(stdout, "{message}");
        let _ = stdout.flush();
    }

    pub fn log(&self, level: Level, message: &str) {
        let rendered = level.render(message);
        if level == Level::Error {
            let mut transient = self.transient();
            Self::clear(&mut io::stdout(), &mut transient);
            let _ = io::stdout().flush();
            eprintln!("{rendered}");
            return;
        }
        self.line(&rendered);
    }

    pub fn status(&self, message: &str) {
        self.draw(
            &format!("{} {}", "◦".bright_cyan(), message.bright_white()),
            true,
        );
    }

    /// `total == 0` means the total is not known yet.
    pub fn progress(&self, message: &str, current: usize, total: usize) {
        let spinner = SPINNER.get(current % SPINNER.len()).copied().unwrap_or("◐");
        let line = if total > 0 {
            format!(
                "{} {} ({}/{})",
                spinner.bright_cyan(),
                message.bright_white(),
                current.to_string().bright_cyan().bold(),
                total.to_string().bright_white()
            )
        } else {
            format!("{} {} ({})", spinner.bright_cyan(), message.bright_white(), current)
        };
        self.draw(&line, total > 0 && current >= total);
    }

    /// Final summary line with the time since the logger was created.
    pub fn finish(&self, message: &str) {
        self.line(&format!(
            "{} {} {}",
            "✓".bright_green().bold(),
            message.bright_green(),
            format!("[{}]", format_elapsed(self.started.elapsed())).bright_black()
        ));
    }
}

#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Sets the process-wide logger. Only the first call has an effect.
pub fn init_logger(quiet: bool) {
    let _ = LOGGER.set(Logger::new(quiet));
}

// Library callers (and tests) that never call `init_logger` get a quiet logger.
fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(true))
}

pub fn status(message: &str) {
    logger().status(message);
}

pub fn info(message: &str) {
    logger().log(Level::Info, message);
}

pub fn success(message: &str) {
    logger().log(Level::Success, message);
}

pub fn warn(message: &str) {
    logger().log(Level::Warning, message);
}

/// Printed to stderr even when quiet.
pub fn error(message: &str) {
    logger().log(Level::Error, message);
}

pub fn debug(message: &str, enabled: bool) {
    if enabled {
        logger().log(Level::Debug, message);
    }
}

pub fn progress(message: &str, current: usize, total: usize) {
    logger().progress(message, current, total);
}

pub fn finish(message: &str) {
    logger().finish(message);
}

/// Logs how long an install phase took when debug output is on.
pub fn phase(name: &str, started: Instant, enabled: bool) {
    debug(
        &format!("{name} finished in {}", format_elapsed(started.elapsed())),
        enabled,
    );
}
