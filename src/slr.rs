//! SLR(1) 移入-归约分析.
//!
//! 参考龙书中文第二版 P160
//! ```text
//! 令 a 为 w$ 的第一个符号;
//! while (1) { /* 永远重复 */
//!     令 s 是栈顶的状态;
//!     if (ACTION[s, a] = 移入 t) {
//!         将 t 压入栈中;
//!         令 a 为下一个输入符号;
//!     } else if (ACTION[s, a] = 归约 A -> beta) {
//!         从栈中弹出 | beta | 个符号;
//!         令 t 为当前的栈顶状态;
//!         将 GOTO[t, A] 压入栈中;
//!         输出产生式 A -> beta;
//!     } else if (ACTION[s, a] = 接受) break; /* 语法分析完成 */
//!     else 调用错误恢复例程;
//! }
//! ```
//! 这里没有错误恢复, 遇到空表项直接报错.

use tracing::{debug, error, info};

use crate::{
    Family, Grammar, Production, Terminal, Token,
    error::Error,
    lexeme::{Cursor, Lexeme},
    table::{ActionCell, Table},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlrStep<'a> {
    /// 动作执行前的状态栈.
    pub states: Vec<usize>,
    /// 动作执行前的符号栈.
    pub symbols: Vec<Token<'a>>,
    pub input: Terminal<'a>,
    pub action: ActionCell,
}

/// 一次成功的 SLR(1) 分析.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlrParse<'a> {
    steps: Vec<SlrStep<'a>>,
    /// 按归约顺序记录的产生式.
    reductions: Vec<&'a Production<'a>>,
}

impl<'a> SlrParse<'a> {
    #[must_use]
    pub fn steps(&self) -> &[SlrStep<'a>] {
        &self.steps
    }

    #[must_use]
    pub fn reductions(&self) -> &[&'a Production<'a>] {
        &self.reductions
    }

    /// 归约顺序翻转过来就是最右推导使用产生式的顺序.
    pub fn rightmost_derivation(&self) -> impl Iterator<Item = &'a Production<'a>> + '_ {
        self.reductions.iter().rev().copied()
    }
}

/// 状态栈和符号栈交错排列成 `I_0`, `a I_1`, `S I_3` 的形式, 用于诊断信息.
fn stack_context(states: &[usize], symbols: &[Token<'_>]) -> Vec<String> {
    states
        .iter()
        .enumerate()
        .map(|(i, state)| match i.checked_sub(1).and_then(|j| symbols.get(j)) {
            Some(symbol) => format!("{symbol} I_{state}"),
            None => format!("I_{state}"),
        })
        .collect()
}

/// 移入-归约分析器, 分析表只在创建时构建一次, 之后可以反复 (并发地) 分析不同的输入.
///
/// 与 [`crate::Ll1Parser`] 不同, 这里的文法 **必须** 是增广文法 (见 [`Grammar::augmented`]):
/// 分析器只借用文法, 增广出来的 `S' -> S` 需要分配在调用方的 [`bumpalo::Bump`] 中.
///
/// ```
/// use bumpalo::Bump;
/// use ll_slr_analysis::{Grammar, SlrParser, split_categories};
///
/// let bump = Bump::new();
/// let grammar = Grammar::from_cfg("S -> a S b | ε", "S".into(), &bump)?.augmented(&bump);
/// let parser = SlrParser::new(&grammar)?;
/// assert_eq!(parser.parse(&split_categories("a b"))?.reductions().len(), 2);
/// # Ok::<(), ll_slr_analysis::Error>(())
/// ```
#[derive(Debug)]
pub struct SlrParser<'a> {
    table: Table<'a>,
}

impl<'a> SlrParser<'a> {
    /// `grammar` 需要是增广文法, 见 [`Grammar::augmented`].
    ///
    /// # Errors
    /// - [`Error::GrammarNotAugmented`] 文法没有增广.
    /// - [`Error::SlrConflict`] 文法不是 SLR(1) 的.
    pub fn new(grammar: &'a Grammar<'a>) -> Result<Self, Error> {
        let family = Family::from_grammar(grammar)?;
        Ok(Self {
            table: Table::build_from(family, grammar)?,
        })
    }

    #[must_use]
    pub fn table(&self) -> &Table<'a> {
        &self.table
    }

    /// 当前状态在当前输入下没有动作 (包括输入的类别不在文法中).
    fn reject(
        &self,
        cursor: &Cursor<'_, '_, 'a>,
        top: usize,
        states: &[usize],
        symbols: &[Token<'a>],
    ) -> Error {
        let expected = self
            .table
            .actions(top)
            .into_iter()
            .flatten()
            .map(|(t, _)| t);
        let cause = cursor.syntax_error(expected, stack_context(states, symbols));
        error!("error on I_{top}, {cause}");
        Error::syntax(cause, Vec::new())
    }

    /// 分析一段 token 流, 输入应当以 [`crate::token::EOF`] 结尾, 之后不能再有 token.
    ///
    /// # Errors
    /// - [`Error::Syntax`] 当前状态在输入终结符下没有动作, 或者接受之后还有输入.
    /// - [`Error::MissingGoto`], [`Error::StackUnderflow`] 分析表本身不一致.
    pub fn parse(&self, lexemes: &[Lexeme<'_>]) -> Result<SlrParse<'a>, Error> {
        let grammar = self.table.grammar();
        // 状态栈, 放入初始项集
        let mut states: Vec<usize> = vec![0];
        let mut symbols: Vec<Token<'a>> = Vec::new();
        let mut cursor = Cursor::new(lexemes, grammar);
        let mut steps = Vec::new();
        let mut reductions = Vec::new();
        loop {
            // 状态栈不会为空: 归约时弹出的状态数等于弹出的符号数, 而 I_0 没有对应的符号.
            let top = states[states.len() - 1];
            let Some(input) = cursor.current() else {
                return Err(self.reject(&cursor, top, &states, &symbols));
            };
            let action = self
                .table
                .action(top, input)
                .copied()
                .unwrap_or_default();
            info!(
                "top: I_{top}, term: {input}, cursor: {}, action: {action:?}",
                cursor.pos()
            );
            steps.push(SlrStep {
                states: states.clone(),
                symbols: symbols.clone(),
                input,
                action,
            });
            match action {
                ActionCell::Shift(state) => {
                    symbols.push(input.into());
                    states.push(state);
                    cursor.advance();
                }
                ActionCell::Reduce(prod_idx) => {
                    let prod = grammar.prods()[prod_idx];
                    info!("reduce production: {prod}");
                    let keep = symbols.len().checked_sub(prod.len()).ok_or_else(|| {
                        Error::StackUnderflow {
                            state: top,
                            prod: prod.to_string(),
                        }
                    })?;
                    symbols.truncate(keep);
                    states.truncate(keep + 1);
                    let top = states[keep];
                    let to = self.table.goto(top, prod.head()).ok_or_else(|| {
                        Error::MissingGoto {
                            state: top,
                            non_term: prod.head().to_string(),
                        }
                    })?;
                    debug!("goto I_{top} -- {} --> I_{to}", prod.head());
                    symbols.push(prod.head().into());
                    states.push(to);
                    reductions.push(prod);
                }
                // EOF 之后不能再有输入.
                ActionCell::Accept if cursor.has_trailing() => {
                    cursor.advance();
                    let cause = cursor.syntax_error(
                        std::iter::empty(),
                        stack_context(&states, &symbols),
                    );
                    error!("input continues after {input}, {cause}");
                    return Err(Error::syntax(cause, Vec::new()));
                }
                ActionCell::Accept => {
                    info!("accept");
                    return Ok(SlrParse { steps, reductions });
                }
                ActionCell::Empty => return Err(self.reject(&cursor, top, &states, &symbols)),
            }
        }
    }
}
