//! 语法分析器的输入: 由外部词法分析器产生的 token 流.

use std::fmt::Display;

use crate::{Grammar, Terminal, error::SyntaxError, token::EOF};

/// 源码位置, 行列均从 1 开始.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 输入流中的一个 token: 终结符类别, 以及可选的词素和位置.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'a> {
    term: Terminal<'a>,
    value: Option<&'a str>,
    position: Option<Position>,
}

impl<'a> From<Terminal<'a>> for Lexeme<'a> {
    fn from(term: Terminal<'a>) -> Self {
        Self::new(term)
    }
}

impl<'a> Lexeme<'a> {
    #[must_use]
    pub fn new(term: Terminal<'a>) -> Self {
        Self {
            term,
            value: None,
            position: None,
        }
    }

    #[must_use]
    pub fn with_value(self, value: &'a str) -> Self {
        Self {
            value: Some(value),
            ..self
        }
    }

    #[must_use]
    pub fn at(self, position: Position) -> Self {
        Self {
            position: Some(position),
            ..self
        }
    }

    #[must_use]
    pub fn term(&self) -> Terminal<'a> {
        self.term
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a str> {
        self.value
    }

    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }
}

/// 把按空白分隔的终结符类别切分成 token 流, 末尾补上 [`EOF`].
///
/// 这只是外部词法分析器的替身: 每个单词本身就是它的类别.
#[must_use]
pub fn split_categories(input: &str) -> Vec<Lexeme<'_>> {
    let mut lexemes: Vec<Lexeme<'_>> = input
        .lines()
        .enumerate()
        .flat_map(|(ln, line)| {
            line.split_whitespace().map(move |word| {
                // split_whitespace 的结果一定是 line 的子切片.
                let offset = word.as_ptr() as usize - line.as_ptr() as usize;
                let column = line[..offset].chars().count() + 1;
                Lexeme::new(Terminal::from(word))
                    .with_value(word)
                    .at(Position::new(ln + 1, column))
            })
        })
        .collect();
    if lexemes.last().map(|l| l.term()) != Some(EOF) {
        lexemes.push(EOF.into());
    }
    lexemes
}

/// 输入流上的游标, 越过末尾之后读到的总是 [`EOF`].
///
/// 输入的类别按名字解析为文法自己的终结符, 所以输入不需要和文法活得一样久.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'s, 'l, 'a> {
    lexemes: &'s [Lexeme<'l>],
    grammar: &'a Grammar<'a>,
    pos: usize,
}

impl<'s, 'l, 'a> Cursor<'s, 'l, 'a> {
    pub(crate) fn new(lexemes: &'s [Lexeme<'l>], grammar: &'a Grammar<'a>) -> Self {
        Self {
            lexemes,
            grammar,
            pos: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn lexeme(&self) -> Option<&'s Lexeme<'l>> {
        self.lexemes.get(self.pos)
    }

    /// 当前 token 的类别名.
    pub(crate) fn category(&self) -> &'l str {
        self.lexeme().map_or(EOF.as_str(), |l| l.term().as_str())
    }

    /// 当前 token 在文法中对应的终结符, 文法中没有这个类别时为 [`None`].
    pub(crate) fn current(&self) -> Option<Terminal<'a>> {
        self.grammar.terminal(self.category())
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.lexemes.len() {
            self.pos += 1;
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.category() == EOF.as_str()
    }

    /// 当前 token 之后是否还有 token.
    pub(crate) fn has_trailing(&self) -> bool {
        self.pos + 1 < self.lexemes.len()
    }

    /// 以当前 token 为出错位置构造诊断信息.
    pub(crate) fn syntax_error<T: Display>(
        &self,
        expected: impl IntoIterator<Item = Terminal<'a>>,
        stack: impl IntoIterator<Item = T>,
    ) -> SyntaxError {
        let lexeme = self.lexeme();
        let mut expected: Vec<String> = expected.into_iter().map(|t| t.to_string()).collect();
        expected.sort();
        expected.dedup();
        SyntaxError {
            cursor: self.pos,
            found: self.category().to_string(),
            lexeme: lexeme.and_then(|l| l.value()).map(str::to_string),
            position: lexeme.and_then(|l| l.position()),
            expected,
            stack: stack.into_iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use bumpalo::Bump;

    use crate::{
        Grammar, Terminal,
        lexeme::{Cursor, Lexeme, Position, split_categories},
        token::EOF,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn split_with_positions() {
        let lexemes = split_categories("a  b\n  c");
        assert_eq!(
            lexemes,
            vec![
                Lexeme::new("a".into()).with_value("a").at(Position::new(1, 1)),
                Lexeme::new("b".into()).with_value("b").at(Position::new(1, 4)),
                Lexeme::new("c".into()).with_value("c").at(Position::new(2, 3)),
                EOF.into(),
            ]
        );
        // 已经以 $ 结尾的输入不再追加.
        assert_eq!(split_categories("a $").len(), 2);
        assert_eq!(split_categories(""), vec![Lexeme::from(EOF)]);
    }

    #[test]
    fn cursor_reads_eof_past_end() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a", "S".into(), &bump).unwrap();
        let lexemes = [Lexeme::new(Terminal::from("a")), Lexeme::new(Terminal::from("z"))];
        let mut cursor = Cursor::new(&lexemes, &grammar);
        assert_eq!(cursor.current(), Some(Terminal::from("a")));
        assert!(cursor.has_trailing());
        cursor.advance();
        // 文法中没有的类别.
        assert_eq!(cursor.category(), "z");
        assert_eq!(cursor.current(), None);
        assert!(!cursor.has_trailing());
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.pos(), 2);
        assert!(cursor.at_end());
        assert_eq!(cursor.current(), Some(EOF));
        assert_eq!(cursor.lexeme(), None);
    }
}
