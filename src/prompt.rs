//! Terminal prompts
//!
//! Everything that asks the user a question goes through [`Prompter`], so the
//! credential and menu logic can be driven by scripted answers in tests.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use secrecy::SecretString;
use std::io::{self, BufRead, IsTerminal, Write};

/// Source of user answers
pub trait Prompter {
    /// Read a line with echo disabled
    fn secret(&mut self, prompt: &str) -> io::Result<SecretString>;

    /// Read a visible line, trimmed
    fn line(&mut self, prompt: &str) -> io::Result<String>;

    /// Yes/no question; empty input selects `default`
    fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.line(&format!("{prompt} {hint}"))?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    /// Pick one of `options` by 1-based number; empty input selects `default` (0-based)
    fn choose(&mut self, prompt: &str, options: &[&str], default: usize) -> io::Result<usize> {
        let mut text = String::from(prompt);
        for (i, option) in options.iter().enumerate() {
            let marker = if i == default { " (default)" } else { "" };
            text.push_str(&format!("\n  {}) {}{}", i + 1, option, marker));
        }
        text.push_str("\nChoice");

        loop {
            let answer = self.line(&text)?;
            if answer.is_empty() {
                return Ok(default);
            }
            if let Ok(n) = answer.parse::<usize>()
                && (1..=options.len()).contains(&n)
            {
                return Ok(n - 1);
            }
        }
    }
}

/// Prompter reading from the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Create a terminal prompter
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn secret(&mut self, prompt: &str) -> io::Result<SecretString> {
        read_terminal_line(prompt, false).map(SecretString::from)
    }

    fn line(&mut self, prompt: &str) -> io::Result<String> {
        read_terminal_line(prompt, true)
    }
}

/// Print `prompt` and read one line
///
/// On a terminal the line is read in raw mode so Ctrl-C surfaces as an
/// [`io::ErrorKind::Interrupted`] error instead of a signal the blocking read
/// would never observe. Piped input is read as-is.
fn read_terminal_line(prompt: &str, echo: bool) -> io::Result<String> {
    let mut stdout = io::stdout();
    print!("{prompt}: ");
    stdout.flush()?;

    if !io::stdin().is_terminal() {
        return read_plain_line();
    }

    terminal::enable_raw_mode()?;
    let result = read_raw_line(&mut stdout, echo);
    terminal::disable_raw_mode()?;

    write!(stdout, "\r\n")?;
    stdout.flush()?;
    result
}

fn read_plain_line() -> io::Result<String> {
    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
    }
    let trimmed = input.trim().to_string();
    zeroize::Zeroize::zeroize(&mut input);
    Ok(trimmed)
}

fn read_raw_line(stdout: &mut io::Stdout, echo: bool) -> io::Result<String> {
    let mut input = String::new();

    loop {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            match code {
                KeyCode::Enter => break,
                KeyCode::Backspace => {
                    if input.pop().is_some() && echo {
                        write!(stdout, "\x08 \x08")?;
                        stdout.flush()?;
                    }
                }
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                    zeroize::Zeroize::zeroize(&mut input);
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "Ctrl-C"));
                }
                KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                    if input.is_empty() {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
                    }
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    if echo {
                        write!(stdout, "{c}")?;
                        stdout.flush()?;
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = input.trim().to_string();
    zeroize::Zeroize::zeroize(&mut input);
    Ok(trimmed)
}
