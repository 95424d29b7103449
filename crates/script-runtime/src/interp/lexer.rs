//! Tokenizer for the restricted script grammar.

use tenant_script_core::{Error, Result};

/// Reserved words the parser gives meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Const,
    Let,
    Var,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Finally,
    New,
    Typeof,
    Await,
    True,
    False,
    Null,
    Function,
    Class,
    Async,
    This,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        let keyword = match ident {
            "const" => Self::Const,
            "let" => Self::Let,
            "var" => Self::Var,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "return" => Self::Return,
            "throw" => Self::Throw,
            "try" => Self::Try,
            "catch" => Self::Catch,
            "finally" => Self::Finally,
            "new" => Self::New,
            "typeof" => Self::Typeof,
            "await" => Self::Await,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "function" => Self::Function,
            "class" => Self::Class,
            "async" => Self::Async,
            "this" => Self::This,
            _ => return None,
        };
        Some(keyword)
    }
}

/// Operators and delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Question,
    Colon,
    Assign,
    PlusAssign,
    MinusAssign,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    Nullish,
    PlusPlus,
    MinusMinus,
    Arrow,
}

impl Punct {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Semicolon => ";",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::NotEq => "!=",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Nullish => "??",
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            Self::Arrow => "=>",
        }
    }
}

// Longest spellings first so "===" wins over "==" and "=".
const PUNCTUATORS: &[(&str, Punct)] = &[
    ("===", Punct::StrictEq),
    ("!==", Punct::StrictNotEq),
    ("==", Punct::Eq),
    ("!=", Punct::NotEq),
    ("<=", Punct::LtEq),
    (">=", Punct::GtEq),
    ("&&", Punct::AndAnd),
    ("||", Punct::OrOr),
    ("??", Punct::Nullish),
    ("++", Punct::PlusPlus),
    ("--", Punct::MinusMinus),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("=>", Punct::Arrow),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    (";", Punct::Semicolon),
    (",", Punct::Comma),
    (".", Punct::Dot),
    ("?", Punct::Question),
    (":", Punct::Colon),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("!", Punct::Bang),
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    Punct(Punct),
    Eof,
}

impl TokenKind {
    /// Short rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Str(_) => "string literal".to_string(),
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Keyword(kw) => format!("keyword '{}'", format!("{kw:?}").to_lowercase()),
            Self::Punct(p) => format!("'{}'", p.as_str()),
            Self::Eof => "end of script".to_string(),
        }
    }
}

/// Line/column of a token, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    /// A line terminator precedes this token (drives semicolon insertion).
    pub newline_before: bool,
}

pub fn compile_error(message: impl std::fmt::Display, pos: Position) -> Error {
    Error::CompilationError {
        details: format!("{message} at {pos}"),
    }
}

/// Splits script text into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            source,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let newline_before = self.skip_trivia()?;
            let pos = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                    newline_before,
                });
                break;
            };

            let kind = if c.is_ascii_digit()
                || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
            {
                self.number(pos)?
            } else if c == '"' || c == '\'' {
                self.string(c, pos)?
            } else if c == '`' {
                self.template(pos)?
            } else if is_ident_start(c) {
                self.identifier()
            } else {
                self.punct(pos)?
            };

            tokens.push(Token {
                kind,
                pos,
                newline_before,
            });
        }
        tracing::trace!(
            tokens = tokens.len(),
            bytes = self.source.len(),
            "script tokenized"
        );
        Ok(tokens)
    }

    fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and comments; reports whether a newline was crossed.
    fn skip_trivia(&mut self) -> Result<bool> {
        let mut newline = false;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    newline |= c == '\n';
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(c), _) => {
                                newline |= c == '\n';
                                self.bump();
                            }
                            (None, _) => {
                                return Err(compile_error("Unterminated comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    fn number(&mut self, pos: Position) -> Result<TokenKind> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                digits.push(c);
                self.bump();
            }
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| compile_error("Invalid hexadecimal literal", pos))?;
            #[allow(clippy::cast_precision_loss)]
            return Ok(TokenKind::Number(value as f64));
        }

        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '.') {
            text.push(c);
            self.bump();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            text.push('e');
            self.bump();
            if let Some(sign) = self.peek().filter(|c| *c == '+' || *c == '-') {
                text.push(sign);
                self.bump();
            }
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.bump();
            }
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(compile_error("Invalid or unexpected token", self.pos()));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| compile_error(format!("Invalid number literal '{text}'"), pos))
    }

    fn string(&mut self, quote: char, pos: Position) -> Result<TokenKind> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(compile_error("Unterminated string literal", pos)),
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => value.push(self.escape(pos)?),
                Some(c) => value.push(c),
            }
        }
    }

    fn template(&mut self, pos: Position) -> Result<TokenKind> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(compile_error("Unterminated template literal", pos)),
                Some('`') => return Ok(TokenKind::Str(value)),
                Some('$') if self.peek() == Some('{') => {
                    return Err(compile_error(
                        "Template interpolation is not supported",
                        pos,
                    ));
                }
                Some('\\') => value.push(self.escape(pos)?),
                Some(c) => value.push(c),
            }
        }
    }

    fn escape(&mut self, pos: Position) -> Result<char> {
        let c = self
            .bump()
            .ok_or_else(|| compile_error("Unterminated string literal", pos))?;
        let escaped = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'u' => {
                let mut code = String::with_capacity(4);
                for _ in 0..4 {
                    let digit = self
                        .bump()
                        .filter(char::is_ascii_hexdigit)
                        .ok_or_else(|| compile_error("Invalid Unicode escape sequence", pos))?;
                    code.push(digit);
                }
                u32::from_str_radix(&code, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| compile_error("Invalid Unicode escape sequence", pos))?
            }
            other => other,
        };
        Ok(escaped)
    }

    fn identifier(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_part(*c)) {
            ident.push(c);
            self.bump();
        }
        Keyword::from_ident(&ident).map_or(TokenKind::Ident(ident), TokenKind::Keyword)
    }

    fn punct(&mut self, pos: Position) -> Result<TokenKind> {
        for (spelling, punct) in PUNCTUATORS {
            let matches = spelling
                .chars()
                .enumerate()
                .all(|(offset, expected)| self.peek_at(offset) == Some(expected));
            if matches {
                for _ in 0..spelling.chars().count() {
                    self.bump();
                }
                return Ok(TokenKind::Punct(*punct));
            }
        }
        let c = self.peek().unwrap_or_default();
        Err(compile_error(format!("Invalid or unexpected token '{c}'"), pos))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_capability_call_tokens() {
        let tokens = kinds("ui.setField('country', \"US\");");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("ui".to_string()),
                TokenKind::Punct(Punct::Dot),
                TokenKind::Ident("setField".to_string()),
                TokenKind::Punct(Punct::LParen),
                TokenKind::Str("country".to_string()),
                TokenKind::Punct(Punct::Comma),
                TokenKind::Str("US".to_string()),
                TokenKind::Punct(Punct::RParen),
                TokenKind::Punct(Punct::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_punctuator_wins() {
        let tokens = kinds("a === b !== c ?? d");
        assert!(tokens.contains(&TokenKind::Punct(Punct::StrictEq)));
        assert!(tokens.contains(&TokenKind::Punct(Punct::StrictNotEq)));
        assert!(tokens.contains(&TokenKind::Punct(Punct::Nullish)));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], TokenKind::Number(42.0));
        assert_eq!(kinds("1.5e3")[0], TokenKind::Number(1500.0));
        assert_eq!(kinds("0x1F")[0], TokenKind::Number(31.0));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
    }

    #[test]
    fn test_comments_and_newlines() {
        let tokens = tokenize("// leading\nconst a = 1; /* block\n */ a").unwrap();
        assert!(tokens[0].newline_before);
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Const));
        let last = &tokens[tokens.len() - 2];
        assert_eq!(last.kind, TokenKind::Ident("a".to_string()));
        assert!(last.newline_before);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r"'a\nbA\''")[0],
            TokenKind::Str("a\nbA'".to_string())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("ui.toast('oops);").unwrap_err();
        assert!(err.to_string().starts_with("Compilation error: Unterminated string"));
    }

    #[test]
    fn test_template_interpolation_rejected() {
        assert!(tokenize("`hello ${name}`").is_err());
        assert_eq!(kinds("`plain`")[0], TokenKind::Str("plain".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[1].pos, Position { line: 2, column: 3 });
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("a # b").unwrap_err();
        assert!(err.is_compilation_error());
        assert!(err.to_string().contains("1:3"));
    }
}
