use std::fmt::{Debug, Display};

#[derive(PartialEq, Eq, Clone, Hash, Copy, PartialOrd, Ord)]
pub struct Terminal<'a> {
    ident: &'a str,
}

impl Debug for Terminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!(r#"t{:?}"#, self.ident))
    }
}

impl Display for Terminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.ident)
    }
}

impl<'a> From<&'a str> for Terminal<'a> {
    fn from(ident: &'a str) -> Self {
        Terminal { ident }
    }
}

impl<'a> Terminal<'a> {
    pub fn as_str(&self) -> &'a str {
        self.ident
    }
}

#[derive(PartialEq, Eq, Clone, Hash, Copy, PartialOrd, Ord)]
pub struct NonTerminal<'a> {
    ident: &'a str,
}

impl Debug for NonTerminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!(r#"nt{:?}"#, self.ident))
    }
}

impl Display for NonTerminal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.ident)
    }
}

/// 空产生式标记, 只能作为产生式右侧的唯一符号出现.
pub const EPSILON: Terminal<'static> = Terminal { ident: "ε" };
/// 输入结束标记.
pub const EOF: Terminal<'static> = Terminal { ident: "$" };

impl<'a> From<&'a str> for NonTerminal<'a> {
    fn from(ident: &'a str) -> Self {
        Self { ident }
    }
}

impl<'a> NonTerminal<'a> {
    pub fn as_str(&self) -> &'a str {
        self.ident
    }
}

/// 文法符号: 终结符或者非终结符.
///
/// 排序时所有终结符都在非终结符前面, 表格的列顺序依赖这一点.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Token<'a> {
    Terminal(Terminal<'a>),
    NonTerminal(NonTerminal<'a>),
}

impl Debug for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminal(arg0) => f.pad(&format!("{:?}", arg0)),
            Self::NonTerminal(arg0) => f.pad(&format!("{:?}", arg0)),
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminal(arg0) => f.pad(&format!("{}", arg0)),
            Self::NonTerminal(arg0) => f.pad(&format!("{}", arg0)),
        }
    }
}

impl<'a> Token<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Terminal(t) => t.as_str(),
            Self::NonTerminal(nt) => nt.as_str(),
        }
    }

    #[must_use]
    pub fn is_term(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    #[must_use]
    pub fn is_non_term(&self) -> bool {
        matches!(self, Self::NonTerminal(_))
    }

    #[must_use]
    pub fn as_term(&self) -> Option<Terminal<'a>> {
        match self {
            Self::Terminal(t) => Some(*t),
            Self::NonTerminal(_) => None,
        }
    }

    #[must_use]
    pub fn as_non_term(&self) -> Option<NonTerminal<'a>> {
        match self {
            Self::NonTerminal(nt) => Some(*nt),
            Self::Terminal(_) => None,
        }
    }
}

impl<'a> From<Terminal<'a>> for Token<'a> {
    fn from(value: Terminal<'a>) -> Self {
        Self::Terminal(value)
    }
}

impl<'a> From<NonTerminal<'a>> for Token<'a> {
    fn from(value: NonTerminal<'a>) -> Self {
        Self::NonTerminal(value)
    }
}

#[cfg(test)]
mod test {
    use crate::{NonTerminal, Terminal, Token, token::EOF};
    use pretty_assertions::assert_eq;

    #[test]
    fn terminals_sort_before_non_terminals() {
        let mut toks: Vec<Token> = vec![
            NonTerminal::from("A").into(),
            Terminal::from("z").into(),
            EOF.into(),
            NonTerminal::from("B").into(),
        ];
        toks.sort();
        assert_eq!(
            toks.iter().map(|t| t.is_term()).collect::<Vec<_>>(),
            [true, true, false, false]
        );
        assert_eq!(format!("{}", toks[0]), "$");
        assert_eq!(format!("{:?}", toks[2]), r#"nt"A""#);
    }
}
