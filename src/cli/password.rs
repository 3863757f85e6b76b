//! Terminal password prompt

use std::io::{BufRead, BufReader, Write};

use crate::common::Result;

/// Prompt on the terminal and read one line with echo disabled
#[cfg(unix)]
pub fn prompt(message: &str) -> Result<String> {
    use std::os::unix::io::AsRawFd;

    let tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")?;
    let fd = tty.as_raw_fd();
    let mut writer = &tty;
    write!(writer, "{}", message)?;
    writer.flush()?;

    // SAFETY: termios is plain data and fd stays open for this scope
    let mut term: libc::termios = unsafe { std::mem::zeroed() };
    let has_termios = unsafe { libc::tcgetattr(fd, &mut term) } == 0;
    let original = term;
    if has_termios {
        term.c_lflag &= !libc::ECHO;
        unsafe { libc::tcsetattr(fd, libc::TCSANOW, &term) };
    }

    let mut line = String::new();
    let read = BufReader::new(&tty).read_line(&mut line);

    if has_termios {
        unsafe { libc::tcsetattr(fd, libc::TCSANOW, &original) };
    }
    writeln!(writer)?;
    read?;

    Ok(strip_line_ending(&line).to_string())
}

#[cfg(not(unix))]
pub fn prompt(message: &str) -> Result<String> {
    eprint!("{}", message);
    std::io::stderr().flush()?;
    let mut line = String::new();
    BufReader::new(std::io::stdin()).read_line(&mut line)?;
    Ok(strip_line_ending(&line).to_string())
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\n' || c == '\r')
}
