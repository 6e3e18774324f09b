//! LL(1) 预测分析: 分析表的构建和基于栈的自顶向下分析.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::{
    Grammar, NonTerminal, Production, Terminal, Token,
    error::{Error, SyntaxError},
    lexeme::{Cursor, Lexeme},
    token::{EOF, EPSILON},
};

/// LL(1) 分析表 M[A, t], 每个格子最多一个产生式.
#[derive(Debug, Clone)]
pub struct Ll1Table<'a> {
    cells: BTreeMap<(NonTerminal<'a>, Terminal<'a>), &'a Production<'a>>,
    grammar: &'a Grammar<'a>,
}

impl<'a> Ll1Table<'a> {
    /// 对每个产生式 A -> alpha:
    /// - first(alpha) 中的每个终结符 t, M[A, t] = alpha;
    /// - 如果 alpha 能推导出空串, follow(A) 中的每个终结符 t, M[A, t] = alpha.
    ///
    /// # Errors
    /// 同一个格子需要放入两个不同的产生式时返回 [`Error::Ll1Conflict`].
    pub fn build_from(grammar: &'a Grammar<'a>) -> Result<Self, Error> {
        let mut table = Self {
            cells: BTreeMap::new(),
            grammar,
        };
        let follow_sets = grammar.follow_sets();
        for &prod in grammar.prods() {
            let mut first = grammar.first_set(prod.tail().iter().copied());
            if first.remove(&EPSILON) {
                first.extend(follow_sets.get(prod.head()).into_iter().flatten().copied());
            }
            for t in first {
                table.insert(prod.head(), t, prod)?;
            }
        }
        debug!("LL(1) table built with {} cells", table.cells.len());
        Ok(table)
    }

    fn insert(
        &mut self,
        nt: NonTerminal<'a>,
        t: Terminal<'a>,
        prod: &'a Production<'a>,
    ) -> Result<(), Error> {
        match self.cells.get(&(nt, t)) {
            Some(&kept) if kept != prod => Err(Error::Ll1Conflict {
                non_term: nt.to_string(),
                term: t.to_string(),
                kept: kept.to_string(),
                rejected: prod.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.cells.insert((nt, t), prod);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, nt: NonTerminal<'a>, t: Terminal<'a>) -> Option<&'a Production<'a>> {
        self.cells.get(&(nt, t)).copied()
    }

    /// 非终结符所在行中有表项的终结符, 也就是该非终结符期望看到的终结符.
    pub fn expected(&self, nt: NonTerminal<'a>) -> impl Iterator<Item = Terminal<'a>> + '_ {
        self.cells
            .range((nt, Terminal::from(""))..)
            .take_while(move |((head, _), _)| *head == nt)
            .map(|((_, t), _)| *t)
    }

    /// 遍历所有表项 (非终结符, 终结符, 产生式).
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (NonTerminal<'a>, Terminal<'a>, &'a Production<'a>)> + '_ {
        self.cells.iter().map(|(&(nt, t), &prod)| (nt, t, prod))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn grammar(&self) -> &'a Grammar<'a> {
        self.grammar
    }

    /// 使用 markdown 形式输出表格.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let terms: Vec<_> = self.grammar.terminals().collect();
        let header_line = "| |".to_string()
            + &terms
                .iter()
                .map(|t| format!(" `{}` |", t.as_str()))
                .collect::<String>();
        let sep_line: String =
            String::from("| - |") + &std::iter::repeat_n(" - |", terms.len()).collect::<String>();
        let mut data_lines = String::new();
        for nt in self.grammar.non_terminals() {
            let line = format!("| `{nt}` |")
                + &terms
                    .iter()
                    .map(|&t| match self.get(nt, t) {
                        Some(prod) => format!(" {} |", prod.tail_str()),
                        None => "  |".to_string(),
                    })
                    .collect::<String>();
            data_lines += &line;
            data_lines += "\n";
        }
        format!("{header_line}\n{sep_line}\n{}", data_lines.trim_end())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ll1Action<'a> {
    /// 栈顶终结符与输入匹配, 消耗输入.
    Match(Terminal<'a>),
    /// 栈顶非终结符按产生式展开.
    Expand(&'a Production<'a>),
    /// 恐慌模式: 丢弃栈顶非终结符, 跳过 `skipped` 个输入.
    Recover {
        non_term: NonTerminal<'a>,
        skipped: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ll1Step<'a> {
    /// 动作执行前的栈, 栈顶在最后.
    pub stack: Vec<Token<'a>>,
    /// 当前输入, 输入的类别不在文法中时为 [`None`].
    pub input: Option<Terminal<'a>>,
    pub action: Ll1Action<'a>,
}

/// 一次 LL(1) 分析的结果: 步骤记录, 以及恐慌模式下恢复过的错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ll1Parse<'a> {
    steps: Vec<Ll1Step<'a>>,
    errors: Vec<SyntaxError>,
}

impl<'a> Ll1Parse<'a> {
    #[must_use]
    pub fn steps(&self) -> &[Ll1Step<'a>] {
        &self.steps
    }

    #[must_use]
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// 没有任何语法错误时才算接受.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 预测分析器, 分析表只在创建时构建一次, 之后可以反复 (并发地) 分析不同的输入.
#[derive(Debug, Clone)]
pub struct Ll1Parser<'a> {
    table: Ll1Table<'a>,
}

impl<'a> Ll1Parser<'a> {
    /// 增广与否都可以, 增广文法只是多出一次 `S' -> S` 的展开.
    ///
    /// # Errors
    /// 见 [`Ll1Table::build_from`].
    pub fn new(grammar: &'a Grammar<'a>) -> Result<Self, Error> {
        Ok(Self {
            table: Ll1Table::build_from(grammar)?,
        })
    }

    #[must_use]
    pub fn table(&self) -> &Ll1Table<'a> {
        &self.table
    }

    /// 分析一段 token 流, 输入应当以 [`EOF`] 结尾, 之后不能再有 token.
    ///
    /// 非终结符遇到没有表项的输入时记录错误, 然后跳过输入直到遇到它的 follow 集中的终结符
    /// (或者输入结束), 丢弃该非终结符继续分析. 这可能掩盖后续的连锁错误.
    ///
    /// # Errors
    /// - 栈顶终结符与输入不匹配时返回 [`Error::Syntax`], 其中包含之前已经恢复过的错误.
    /// - 栈清空之后 [`EOF`] 后面还有输入时同样返回 [`Error::Syntax`].
    pub fn parse(&self, lexemes: &[Lexeme<'_>]) -> Result<Ll1Parse<'a>, Error> {
        let grammar = self.table.grammar();
        let mut stack: Vec<Token<'a>> = vec![EOF.into(), grammar.symbol_start().into()];
        let mut cursor = Cursor::new(lexemes, grammar);
        let mut steps = Vec::new();
        let mut errors = Vec::new();
        while let Some(top) = stack.pop() {
            let input = cursor.current();
            let snapshot = || {
                let mut s = stack.clone();
                s.push(top);
                s
            };
            info!(
                "top: {top}, term: {}, cursor: {}",
                cursor.category(),
                cursor.pos()
            );
            match top {
                // 空产生式不会入栈, 为了完整性仍然跳过.
                Token::Terminal(EPSILON) => {}
                Token::Terminal(t) if input == Some(t) => {
                    steps.push(Ll1Step {
                        stack: snapshot(),
                        input,
                        action: Ll1Action::Match(t),
                    });
                    cursor.advance();
                }
                Token::Terminal(t) => {
                    let cause = cursor.syntax_error([t], snapshot());
                    error!("{cause}");
                    return Err(Error::syntax(cause, errors));
                }
                Token::NonTerminal(nt) => match input.and_then(|t| self.table.get(nt, t)) {
                    Some(prod) => {
                        debug!("expand: {prod}");
                        steps.push(Ll1Step {
                            stack: snapshot(),
                            input,
                            action: Ll1Action::Expand(prod),
                        });
                        stack.extend(prod.tail().iter().rev().copied());
                    }
                    None => {
                        let err = cursor.syntax_error(self.table.expected(nt), snapshot());
                        error!("{err}");
                        errors.push(err);
                        let follow = grammar.follow_sets().get(nt);
                        let mut skipped = 0;
                        while !cursor.at_end()
                            && !cursor
                                .current()
                                .is_some_and(|t| follow.is_some_and(|f| f.contains(&t)))
                        {
                            cursor.advance();
                            skipped += 1;
                        }
                        warn!("panic recover on {nt}, {skipped} token(s) skipped");
                        steps.push(Ll1Step {
                            stack: snapshot(),
                            input,
                            action: Ll1Action::Recover {
                                non_term: nt,
                                skipped,
                            },
                        });
                    }
                },
            }
        }
        // 栈已经清空, EOF 之后还有输入.
        if cursor.lexeme().is_some() {
            let cause = cursor.syntax_error(
                std::iter::empty(),
                std::iter::empty::<Token<'a>>(),
            );
            error!("input continues after {EOF}, {cause}");
            return Err(Error::syntax(cause, errors));
        }
        Ok(Ll1Parse { steps, errors })
    }
}
