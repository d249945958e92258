use crate::error::InputParseError;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

pub fn parse_input<T: FromStr>(
    field: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, InputParseError> {
    value.trim().parse().map_err(|_| InputParseError {
        field,
        value: value.trim().to_string(),
        expected,
    })
}

/// Asks the operator for values on a terminal, one line per answer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Keeps asking until the answer parses. Running out of input is an error.
    pub fn ask<T: FromStr>(
        &mut self,
        field: &'static str,
        question: &str,
        expected: &'static str,
    ) -> io::Result<T> {
        let mut line = String::new();
        loop {
            write!(self.output, "{question}: ")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no answer given for {field}"),
                ));
            }
            match parse_input(field, &line, expected) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(field, value = %e.value, "rejected input");
                    writeln!(self.output, "{e}. Please try again.")?;
                }
            }
        }
    }
}
