use std::io::{self, BufRead, Write};

use colored::Colorize;

/// Line-oriented operator prompts. Invalid answers are re-asked until the
/// input ends.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Ask until `parse` accepts the trimmed answer.
    pub fn ask<T>(
        &mut self,
        question: &str,
        mut parse: impl FnMut(&str) -> Option<T>,
    ) -> io::Result<T> {
        loop {
            write!(self.output, "{question} ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no answer given"));
            }
            if let Some(answer) = parse(line.trim()) {
                return Ok(answer);
            }
            writeln!(self.output, "{}", "Invalid choice, try again.".red())?;
        }
    }

    /// Show `items` numbered from 1 and return the index picked.
    pub fn pick(&mut self, question: &str, items: &[String]) -> io::Result<usize> {
        for (i, item) in items.iter().enumerate() {
            writeln!(self.output, "  {}) {}", (i + 1).to_string().bold(), item)?;
        }
        let count = items.len();
        self.ask(question, |answer| {
            answer
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=count).contains(n))
                .map(|n| n - 1)
        })
    }

    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        self.ask(&format!("{question} [y/n]"), |answer| {
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => Some(true),
                "n" | "no" => Some(false),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn pick_reasks_until_in_range() {
        let mut p = prompter("0\nthree\n4\n2\n");
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(p.pick("Choose:", &items).unwrap(), 1);
        let shown = String::from_utf8(p.output().clone()).unwrap();
        assert_eq!(shown.matches("Invalid choice").count(), 3);
    }

    #[test]
    fn ask_trims_answers() {
        let mut p = prompter("  2 \n");
        let choice = p.ask("?", sarc_registry::ConflictChoice::from_response).unwrap();
        assert_eq!(choice, sarc_registry::ConflictChoice::KeepBoth);
    }

    #[test]
    fn confirm_accepts_words() {
        let mut p = prompter("maybe\nYES\n");
        assert!(p.confirm("Prune?").unwrap());
        let mut p = prompter("n\n");
        assert!(!p.confirm("Prune?").unwrap());
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut p = prompter("x\n");
        let err = p.confirm("Prune?").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
