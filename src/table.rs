use std::{collections::HashMap, fmt::Display};

use tracing::debug;

use crate::{Family, Grammar, NonTerminal, Terminal, Token, error::Error, token::EOF};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionCell {
    /// 移入项集状态编号.
    Shift(usize),
    /// 规约产生式编号.
    Reduce(usize),
    /// 接受
    Accept,
    #[default]
    Empty,
}

impl Display for ActionCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&match self {
            Self::Shift(s) => format!("s{s}"),
            Self::Reduce(r) => format!("r{r}"),
            Self::Accept => "acc".to_string(),
            Self::Empty => "".to_string(),
        })
    }
}

impl ActionCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// 放入新的 cell 内容, 与已有的不同内容冲突时保持原样并返回已有内容.
    fn update(&mut self, cell: ActionCell) -> Result<(), ActionCell> {
        match *self {
            Self::Empty => {
                *self = cell;
                Ok(())
            }
            existing if existing == cell => Ok(()),
            existing => Err(existing),
        }
    }

    /// 给人看的描述, 归约动作展开为产生式.
    #[must_use]
    pub fn describe(&self, grammar: &Grammar) -> String {
        match self {
            Self::Shift(s) => format!("shift {s}"),
            Self::Reduce(r) => match grammar.prods().get(*r) {
                Some(prod) => format!("reduce {prod}"),
                None => format!("reduce #{r}"),
            },
            Self::Accept => "accept".to_string(),
            Self::Empty => "error".to_string(),
        }
    }
}

/// SLR(1) 分析表.
#[derive(Debug)]
pub struct Table<'a> {
    /// ACTION 表
    action: Vec<Vec<ActionCell>>,
    /// GOTO 表, 每个格子表示 GOTO 到的项集状态编号.
    goto: Vec<Vec<Option<usize>>>,
    /// [`Family::item_sets`] 中的顺序就是 GOTO 和 ACTION 表的状态顺序.
    family: Family<'a>,
    grammar: &'a Grammar<'a>,
    /// ACTION 表中的终结符, 下标即为 ACTION 表中的列.
    terms: Vec<Terminal<'a>>,
    /// GOTO 表中的非终结符 (不含增广起始符), 下标即为 GOTO 表中的列.
    non_terms: Vec<NonTerminal<'a>>,
    term_idxes: HashMap<Terminal<'a>, usize>,
    non_term_idxes: HashMap<NonTerminal<'a>, usize>,
}

impl<'a> Table<'a> {
    /// 由 LR(0) 项集族和 follow 集构建 SLR(1) 分析表.
    ///
    /// # Errors
    /// - [`Error::GrammarNotAugmented`] 文法没有增广.
    /// - [`Error::SlrConflict`] 同一个格子有两个不同的动作, 文法不是 SLR(1) 的.
    pub fn build_from(family: Family<'a>, grammar: &'a Grammar<'a>) -> Result<Self, Error> {
        if !grammar.is_augmented() {
            Err(Error::GrammarNotAugmented)?
        }
        let start = grammar.symbol_start();
        let terms: Vec<_> = grammar.terminals().collect();
        let non_terms: Vec<_> = grammar.non_terminals().filter(|nt| *nt != start).collect();
        let term_idxes: HashMap<Terminal<'a>, usize> =
            terms.iter().enumerate().map(|(a, b)| (*b, a)).collect();
        let non_term_idxes: HashMap<NonTerminal<'a>, usize> =
            non_terms.iter().enumerate().map(|(a, b)| (*b, a)).collect();
        let rows = family.len();
        let mut action = vec![vec![ActionCell::Empty; terms.len()]; rows];
        let mut goto = vec![vec![None; non_terms.len()]; rows];
        let follow_sets = grammar.follow_sets();

        let mut put = |row: usize, t: Terminal<'a>, cell: ActionCell| -> Result<(), Error> {
            let Some(&term_idx) = term_idxes.get(&t) else {
                return Ok(());
            };
            action[row][term_idx]
                .update(cell)
                .map_err(|kept| Error::SlrConflict {
                    state: row,
                    term: t.to_string(),
                    kept: kept.describe(grammar),
                    rejected: cell.describe(grammar),
                })
        };
        for (row, is) in family.item_sets().iter().enumerate() {
            for (tok, to) in family.gotos_of(row).into_iter().flatten() {
                match tok {
                    Token::Terminal(t) => put(row, t, ActionCell::Shift(to))?,
                    Token::NonTerminal(nt) => {
                        if let Some(&non_term_idx) = non_term_idxes.get(&nt) {
                            goto[row][non_term_idx] = Some(to);
                        }
                    }
                }
            }
            for item in is.reduces() {
                let prod = item.prod();
                if prod.head() == start {
                    // startprime -> start dot, EOF 也就是 acc 状态.
                    put(row, EOF, ActionCell::Accept)?;
                    continue;
                }
                // 项集族中的产生式都来自这个文法.
                let Some(prod_idx) = grammar.index_of_prod(prod) else {
                    continue;
                };
                for &t in follow_sets.get(prod.head()).into_iter().flatten() {
                    put(row, t, ActionCell::Reduce(prod_idx))?;
                }
            }
        }
        debug!("SLR(1) table built with {rows} states");
        Ok(Self {
            action,
            goto,
            non_term_idxes,
            family,
            grammar,
            terms,
            non_terms,
            term_idxes,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.family.len()
    }

    #[must_use]
    pub fn action_cols(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn goto_cols(&self) -> usize {
        self.non_terms.len()
    }

    /// 使用 markdown 形式输出表格.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut header_line = "| |".to_string();
        header_line += &self
            .terms
            .iter()
            .map(|t| format!(" `{}` |", t.as_str()))
            .chain(
                self.non_terms
                    .iter()
                    .map(|nt| format!(" `{}` |", nt.as_str())),
            )
            .collect::<String>();
        let sep_line: String = String::from("| - |")
            + &std::iter::repeat_n(" - |", self.terms.len() + self.non_terms.len())
                .collect::<String>();
        let mut data_lines = String::new();
        for (i, (action_row, goto_row)) in self.action.iter().zip(self.goto.iter()).enumerate() {
            let line = format!("| $I_{{{i}}}$ |")
                + &action_row
                    .iter()
                    .map(|act| format!(" {act} |"))
                    .chain(goto_row.iter().map(|to| {
                        if let Some(to) = to {
                            format!(" {to} |")
                        } else {
                            "  |".to_string()
                        }
                    }))
                    .collect::<String>();
            data_lines += &line;
            data_lines += "\n";
        }
        format!("{header_line}\n{sep_line}\n{}", data_lines.trim_end())
    }

    /// 查询 ACTION 表, 获取当前项集状态在某个终结符下的动作.
    /// # Returns
    /// 如果项集族中没有这个状态或者文法中没有这个终结符, 那么返回 [`None`].
    #[must_use]
    pub fn action(&self, state: usize, term: Terminal<'a>) -> Option<&ActionCell> {
        let term_idx = *self.term_idxes.get(&term)?;
        let row = self.action.get(state)?;
        Some(&row[term_idx])
    }

    /// 遍历一个项集状态的所有非 [`ActionCell::Empty`] actions.
    /// 如果这个项集状态不存在, 那么返回 [`None`].
    #[must_use]
    pub fn actions(
        &self,
        state: usize,
    ) -> Option<impl Iterator<Item = (Terminal<'a>, &ActionCell)>> {
        let v = self.action.get(state)?;
        Some(v.iter().enumerate().filter_map(|(i, a)| {
            if a.is_empty() {
                None
            } else {
                Some((self.terms[i], a))
            }
        }))
    }

    /// 查询 GOTO(state, non_term), state 或者 non_term 不存在, 或者没有这条出边时返回 [`None`].
    #[must_use]
    pub fn goto(&self, state: usize, non_term: NonTerminal<'a>) -> Option<usize> {
        let non_term_idx = *self.non_term_idxes.get(&non_term)?;
        let row = self.goto.get(state)?;
        row[non_term_idx]
    }

    #[inline]
    #[must_use]
    pub fn family(&self) -> &Family<'a> {
        &self.family
    }

    #[inline]
    #[must_use]
    pub fn grammar(&self) -> &'a Grammar<'a> {
        self.grammar
    }
}

/// 直接改写表项, 用于构造不一致的分析表.
#[cfg(test)]
impl<'a> Table<'a> {
    pub(crate) fn set_action(&mut self, state: usize, term: Terminal<'a>, cell: ActionCell) {
        let term_idx = self.term_idxes[&term];
        self.action[state][term_idx] = cell;
    }

    pub(crate) fn clear_goto(&mut self, state: usize, non_term: NonTerminal<'a>) {
        let non_term_idx = self.non_term_idxes[&non_term];
        self.goto[state][non_term_idx] = None;
    }
}

#[cfg(test)]
mod test {
    use bumpalo::Bump;

    use crate::{
        Family, Grammar, NonTerminal, Terminal,
        error::Error,
        table::{ActionCell, Table},
        token::EOF,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn balanced_table() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a S b | ε", "S".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        let table = Table::build_from(family, &grammar).unwrap();
        assert_eq!(table.rows(), 5);
        assert_eq!(table.action(0, EOF), Some(&ActionCell::Reduce(2)));
        assert_eq!(grammar.prods()[2].to_string(), "S -> ε");
        assert_eq!(table.action(2, EOF), Some(&ActionCell::Accept));
        assert_eq!(table.action(0, Terminal::from("x")), None);
        assert_eq!(table.goto(1, NonTerminal::from("S")), Some(3));
        assert_eq!(table.goto(3, NonTerminal::from("S")), None);
        assert_eq!(
            table
                .actions(0)
                .map(|it| it.map(|(t, a)| format!("{t} {a}")).collect::<Vec<_>>()),
            Some(vec!["$ r2".to_string(), "a s1".to_string(), "b r2".to_string()])
        );
        assert_eq!(
            table.to_markdown(),
            r#"
| | `$` | `a` | `b` | `S` |
| - | - | - | - | - |
| $I_{0}$ | r2 | s1 | r2 | 2 |
| $I_{1}$ | r2 | s1 | r2 | 3 |
| $I_{2}$ | acc |  |  |  |
| $I_{3}$ |  |  | s4 |  |
| $I_{4}$ | r1 |  | r1 |  |
"#
            .trim()
        );
    }

    #[test]
    fn expression_table_has_no_conflict() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg(
            "E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id",
            "E".into(),
            &bump,
        )
        .unwrap()
        .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        let table = Table::build_from(family, &grammar).unwrap();
        assert_eq!(table.rows(), 12);
        assert_eq!(table.action_cols(), 6);
        assert_eq!(table.goto_cols(), 3);
    }

    #[test]
    fn ambiguous_grammar_conflicts() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("E -> E + E | id", "E".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        assert_eq!(
            Table::build_from(family, &grammar).err(),
            Some(Error::SlrConflict {
                state: 4,
                term: "+".into(),
                kept: "shift 3".into(),
                rejected: "reduce E -> E + E".into(),
            })
        );
    }

    #[test]
    fn not_slr_grammar_conflicts() {
        let bump = Bump::new();
        // 经典的 LR(1) 但不是 SLR(1) 的文法.
        let grammar = Grammar::from_cfg("S -> L = R | R\nL -> * R | id\nR -> L", "S".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        let Err(Error::SlrConflict { term, .. }) = Table::build_from(family, &grammar) else {
            panic!("grammar should not be SLR(1)");
        };
        assert_eq!(term, "=");
    }
}
