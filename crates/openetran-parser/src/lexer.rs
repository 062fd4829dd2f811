//! Line-oriented tokenizer.
//!
//! `first_token` advances to the next non-blank, non-comment line and
//! returns its first token; `next_token` and the typed readers walk the
//! remainder of that line. Tokens come back lowercased; `rest_of_line`
//! preserves case for labels.

pub struct Lexer<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
    /// Raw tokens of the current line, already split.
    current: Vec<&'a str>,
    pos: usize,
    /// A line fetched by peeking but not yet consumed.
    pending: Option<(Vec<&'a str>, usize)>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            lines: src.lines(),
            line_no: 0,
            current: Vec::new(),
            pos: 0,
            pending: None,
        }
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn fetch_line(&mut self) -> Option<(Vec<&'a str>, usize)> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('*') {
                continue;
            }
            let toks: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .collect();
            if toks.is_empty() {
                continue;
            }
            return Some((toks, self.line_no));
        }
    }

    /// Advance to the next input line and return its first token.
    pub fn first_token(&mut self) -> Option<String> {
        let (toks, _line) = match self.pending.take() {
            Some(p) => p,
            None => self.fetch_line()?,
        };
        self.current = toks;
        self.pos = 1;
        Some(self.current[0].to_ascii_lowercase())
    }

    /// Look at the first token of the next line without consuming the line.
    pub fn peek_first_token(&mut self) -> Option<String> {
        if self.pending.is_none() {
            self.pending = self.fetch_line();
        }
        self.pending
            .as_ref()
            .map(|(toks, _)| toks[0].to_ascii_lowercase())
    }

    /// Next token on the current line.
    pub fn next_token(&mut self) -> Option<String> {
        let t = self.current.get(self.pos)?;
        self.pos += 1;
        Some(t.to_ascii_lowercase())
    }

    /// Next integer on the current line; unparsable tokens read as zero,
    /// matching the permissive original reader.
    pub fn next_int(&mut self) -> Option<i64> {
        self.next_token().map(|t| t.parse().unwrap_or(0))
    }

    pub fn next_f64(&mut self) -> Option<f64> {
        self.next_token().map(|t| t.parse().unwrap_or(0.0))
    }

    /// The remainder of the current line, original case, for labels.
    pub fn rest_of_line(&mut self) -> String {
        let rest = self.current[self.pos..].join(" ");
        self.pos = self.current.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let mut lex = Lexer::new("* a comment\n\n  \nGround 10.0, 100.0\n");
        assert_eq!(lex.first_token().as_deref(), Some("ground"));
        assert_eq!(lex.next_f64(), Some(10.0));
        assert_eq!(lex.next_f64(), Some(100.0));
        assert_eq!(lex.next_f64(), None);
        assert!(lex.first_token().is_none());
    }

    #[test]
    fn tokens_are_lowercased_but_labels_keep_case() {
        let mut lex = Lexer::new("LabelPole 2 Substation North\n");
        assert_eq!(lex.first_token().as_deref(), Some("labelpole"));
        assert_eq!(lex.next_int(), Some(2));
        assert_eq!(lex.rest_of_line(), "Substation North");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lex = Lexer::new("span 1\nconductor 1 10 0 0.01 0\n");
        assert_eq!(lex.peek_first_token().as_deref(), Some("span"));
        assert_eq!(lex.peek_first_token().as_deref(), Some("span"));
        assert_eq!(lex.first_token().as_deref(), Some("span"));
        assert_eq!(lex.next_int(), Some(1));
        assert_eq!(lex.first_token().as_deref(), Some("conductor"));
    }

    #[test]
    fn commas_separate_tokens() {
        let mut lex = Lexer::new("1, 5, 30.0, 1, 1, 5.0e-9, 5.0e-5\n");
        assert_eq!(lex.first_token().as_deref(), Some("1"));
        let mut vals = Vec::new();
        while let Some(v) = lex.next_f64() {
            vals.push(v);
        }
        assert_eq!(vals.len(), 6);
        assert_eq!(vals[5], 5.0e-5);
    }

    #[test]
    fn unparsable_numbers_read_as_zero() {
        let mut lex = Lexer::new("poles all\n");
        lex.first_token();
        assert_eq!(lex.next_int(), Some(0));
    }
}
