use std::fmt::Display;

use crate::lexeme::Position;

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("Error parsing productions, line: {line}, cause: {cause:?}.")]
    ParseProductionError {
        line: usize,
        cause: ParseProductionError,
    },
    #[error("Grammar is not augmented, build the parser from `Grammar::augmented`")]
    GrammarNotAugmented,
    #[error("Grammar is not LL(1): M[{non_term}, {term}] is claimed by `{kept}` and `{rejected}`.")]
    Ll1Conflict {
        non_term: String,
        term: String,
        kept: String,
        rejected: String,
    },
    #[error("Grammar is not SLR(1): ACTION[{state}, {term}] is claimed by {kept} and {rejected}.")]
    SlrConflict {
        state: usize,
        term: String,
        kept: String,
        rejected: String,
    },
    /// 无法恢复的语法错误, `recovered` 是在此之前已经恢复过的错误.
    #[error("{cause}")]
    Syntax {
        cause: SyntaxError,
        recovered: Vec<SyntaxError>,
    },
    /// 归约之后 GOTO 表缺失表项, 只可能是建表出了问题, 与输入无关.
    #[error("GOTO[{state}, {non_term}] is missing after a reduce, the parse table is inconsistent.")]
    MissingGoto { state: usize, non_term: String },
    /// 归约要弹出的符号比栈中的还多, 同样只可能是分析表有问题.
    #[error("Reducing `{prod}` in state {state} pops more symbols than the stack holds.")]
    StackUnderflow { state: usize, prod: String },
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ParseProductionError {
    #[error("No arrow in production line")]
    NoArrow,
    #[error("Start symbol not found")]
    StartSymbolNotFound,
    #[error("Production of {0} has no symbols, use ε for the empty production")]
    EmptyTail(String),
    #[error("ε must be the only symbol of a production of {0}")]
    MisplacedEpsilon(String),
    #[error("Reserved symbol used as a production head: {0}")]
    ReservedSymbol(String),
    #[error("Duplicated production: {0}")]
    DuplicateProduction(String),
}

impl Error {
    pub(crate) fn parse_production_error(line: usize, cause: ParseProductionError) -> Self {
        Self::ParseProductionError { line, cause }
    }

    pub(crate) fn syntax(cause: SyntaxError, recovered: Vec<SyntaxError>) -> Self {
        Self::Syntax { cause, recovered }
    }
}

/// 一次语法错误的诊断信息.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 出错 token 在输入流中的下标.
    pub cursor: usize,
    /// 实际读到的终结符类别.
    pub found: String,
    pub lexeme: Option<String>,
    pub position: Option<Position>,
    /// 当前上下文中合法的终结符, 已排序.
    pub expected: Vec<String>,
    /// 出错时的栈内容 (栈底在前).
    pub stack: Vec<String>,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(pos) => write!(f, "syntax error at {pos}")?,
            None => write!(f, "syntax error at token #{}", self.cursor)?,
        }
        write!(f, ": unexpected `{}`", self.found)?;
        if let Some(lexeme) = &self.lexeme {
            write!(f, " ({lexeme:?})")?;
        }
        if self.expected.is_empty() {
            Ok(())
        } else {
            write!(f, ", expected one of: {}", self.expected.join(", "))
        }
    }
}
