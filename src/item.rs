use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{Debug, Display},
};

use tracing::debug;

use crate::{Grammar, Production, Token, error::Error};

// 项集用 BTreeSet 保存, 始终有序, 相等的项集一定有相同的 hash 值,
// 不依赖插入顺序.

/// LR(0) 项
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item<'a> {
    /// 项对应的产生式.
    prod: &'a Production<'a>,
    /// dot 所处的位置, 在 `0..=prod.len()` 范围中.
    dot: usize,
}

impl Item<'_> {
    fn fmt_with(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        sym: impl Fn(&Token<'_>) -> String,
    ) -> std::fmt::Result {
        let tail_s: String = self
            .prod
            .tail()
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}{} ", if i == self.dot { "⋅ " } else { "" }, sym(t)))
            .collect();
        f.pad(&format!(
            "{} -> {}",
            self.prod.head(),
            format!(
                "{}{}",
                tail_s.trim_end(),
                if self.dot == self.prod.len() {
                    " ⋅"
                } else {
                    ""
                }
            )
            .trim(),
        ))
    }
}

impl Debug for Item<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Item(")?;
        self.fmt_with(f, |t| format!("{t:?}"))?;
        f.write_str(")")
    }
}

impl Display for Item<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_with(f, |t| t.to_string())
    }
}

impl<'a> Item<'a> {
    #[must_use]
    pub fn new(prod: &'a Production<'a>, dot: usize) -> Self {
        Self { prod, dot }
    }

    #[must_use]
    pub(crate) fn initial(prod: &'a Production<'a>) -> Self {
        Self::new(prod, 0)
    }

    /// dot 后面的符号, 项已经完整时为 [`None`].
    #[must_use]
    pub fn expected(&self) -> Option<Token<'a>> {
        self.prod.tail().get(self.dot).copied()
    }

    /// 越过 dot 后的 `token`, 不匹配时为 [`None`].
    #[must_use]
    pub fn goto(&self, token: Token<'a>) -> Option<Self> {
        let expected = self.expected()?;
        if expected != token {
            None?
        }
        Some(Self::new(self.prod, self.dot + 1))
    }

    /// dot 已经到达产生式末尾, 可以归约.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.dot == self.prod.len()
    }

    #[must_use]
    pub fn prod(&self) -> &'a Production<'a> {
        self.prod
    }

    #[must_use]
    pub fn dot(&self) -> usize {
        self.dot
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemSet<'a> {
    items: BTreeSet<Item<'a>>,
}

impl Debug for ItemSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemSet")
            .field("items", &self.items)
            .finish()
    }
}

impl<'a> FromIterator<Item<'a>> for ItemSet<'a> {
    fn from_iter<T: IntoIterator<Item = Item<'a>>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> ItemSet<'a> {
    /// 获取 I_0 项集: closure({S' -> ⋅ S}).
    ///
    /// `grammar` 需要是已经增广的文法, 否则返回 [`Error::GrammarNotAugmented`].
    pub(crate) fn initial(grammar: &Grammar<'a>) -> Result<Self, Error> {
        if !grammar.is_augmented() {
            Err(Error::GrammarNotAugmented)?
        }
        let mut start_prods = grammar.prods_of(grammar.symbol_start());
        let (Some(start_prod), None) = (start_prods.next(), start_prods.next()) else {
            return Err(Error::GrammarNotAugmented);
        };
        Ok([Item::initial(start_prod)]
            .into_iter()
            .collect::<Self>()
            .closure(grammar))
    }

    /// 获取当前项集的闭包项集: 对 dot 后是非终结符 B 的项, 加入所有 B -> ⋅ beta, 直到不再变化.
    #[must_use]
    pub fn closure(self, grammar: &Grammar<'a>) -> Self {
        let mut items = self.items;
        let mut pending: Vec<Item<'a>> = items.iter().copied().collect();
        while let Some(item) = pending.pop() {
            let Some(Token::NonTerminal(nt)) = item.expected() else {
                continue;
            };
            for prod in grammar.prods_of(nt) {
                let new_item = Item::initial(prod);
                if items.insert(new_item) {
                    pending.push(new_item);
                }
            }
        }
        Self { items }
    }

    /// GOTO(I, X): 越过 X 之后的项集的闭包, 没有项能越过 X 时为 [`None`].
    #[must_use]
    pub fn goto(&self, token: Token<'a>, grammar: &Grammar<'a>) -> Option<Self> {
        let moved: Self = self.items.iter().filter_map(|i| i.goto(token)).collect();
        if moved.items.is_empty() {
            None
        } else {
            Some(moved.closure(grammar))
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &Item<'a>> {
        self.items.iter()
    }

    /// dot 之后出现的所有符号, 有序.
    #[must_use]
    pub fn expected_tokens(&self) -> BTreeSet<Token<'a>> {
        self.items.iter().filter_map(Item::expected).collect()
    }

    /// 可以归约的项.
    pub fn reduces(&self) -> impl Iterator<Item = &Item<'a>> {
        self.items.iter().filter(|i| i.is_complete())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 规范 LR(0) 项集族, 即 LR(0) 自动机.
#[derive(Debug)]
pub struct Family<'a> {
    item_sets: Vec<ItemSet<'a>>,
    item_sets_idx: HashMap<ItemSet<'a>, usize>,
    /// 描述了 goto 动作.
    /// GOTO(key, value.key) = value.value
    gotos: HashMap<usize, BTreeMap<Token<'a>, usize>>,
}

impl<'a> Family<'a> {
    /// 从增广文法 `grammar` 构建规范 LR(0) 项集族.
    ///
    /// 按编号顺序处理每个项集, 对其中 dot 之后的每个符号 (按符号顺序) 求 GOTO,
    /// 新项集追加到末尾, 所以状态编号是确定的.
    ///
    /// # Errors
    /// - [`Error::GrammarNotAugmented`] 文法没有增广.
    pub fn from_grammar(grammar: &Grammar<'a>) -> Result<Self, Error> {
        let i0 = ItemSet::initial(grammar)?;
        let mut item_sets_idx = HashMap::new();
        let mut item_sets = Vec::new();
        let mut gotos: HashMap<usize, BTreeMap<Token<'a>, usize>> = HashMap::new();
        item_sets_idx.insert(i0.clone(), 0);
        item_sets.push(i0);
        let mut from = 0;
        while from < item_sets.len() {
            for tok in item_sets[from].expected_tokens() {
                let Some(nis) = item_sets[from].goto(tok, grammar) else {
                    continue;
                };
                let to = match item_sets_idx.get(&nis) {
                    Some(&to) => to,
                    None => {
                        // 新加入的项集: nis
                        // GOTO(is, tok) = nis
                        let to = item_sets.len();
                        item_sets_idx.insert(nis.clone(), to);
                        item_sets.push(nis);
                        to
                    }
                };
                gotos.entry(from).or_default().insert(tok, to);
            }
            from += 1;
        }
        debug!("LR(0) automaton built with {} states", item_sets.len());
        Ok(Self {
            item_sets,
            item_sets_idx,
            gotos,
        })
    }

    /// 按照 I_i (i = 0, 1, 2, 3...) 顺序获取项集.
    #[must_use]
    pub fn item_sets(&self) -> &[ItemSet<'a>] {
        &self.item_sets
    }

    /// 项集的编号, 项集不在集族中时返回 [`None`].
    #[must_use]
    pub fn index_of(&self, item_set: &ItemSet<'a>) -> Option<usize> {
        self.item_sets_idx.get(item_set).copied()
    }

    /// 遍历 gotos (起始项集, 转换 Token, 到达项集).
    pub fn gotos(&self) -> impl Iterator<Item = (usize, Token<'a>, usize)> + '_ {
        self.gotos
            .iter()
            .flat_map(|(&from, v)| v.iter().map(move |(&tok, &to)| (from, tok, to)))
    }

    /// 获取一个项集的 gotos: (转换 Token, 到达项集).
    /// 如果 item_set 没有对应项集, 或者项集没有出边, 那么返回 [`None`]
    #[must_use]
    pub fn gotos_of(&self, item_set: usize) -> Option<impl Iterator<Item = (Token<'a>, usize)> + '_> {
        self.gotos
            .get(&item_set)
            .map(|v| v.iter().map(|(&tok, &to)| (tok, to)))
    }

    /// 转移函数 (state, token) -> state.
    #[must_use]
    pub fn goto(&self, item_set: usize, token: Token<'a>) -> Option<usize> {
        self.gotos.get(&item_set)?.get(&token).copied()
    }

    /// 获取项集族数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use bumpalo::Bump;

    use crate::{
        Family, Grammar, NonTerminal, Terminal, Token,
        error::Error,
        item::{Item, ItemSet},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn closure() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("program -> stmts\nstmts -> good", "program".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let prods = grammar.prods();
        let i0 = ItemSet::initial(&grammar).unwrap();
        assert_eq!(
            i0,
            [
                Item::initial(prods[0]),
                Item::initial(prods[1]),
                Item::initial(prods[2])
            ]
            .into_iter()
            .collect()
        );
        assert_eq!(
            i0.items().map(|i| i.to_string()).collect::<Vec<_>>(),
            [
                "program -> ⋅ stmts",
                "program' -> ⋅ program",
                "stmts -> ⋅ good"
            ]
        );
    }

    #[test]
    fn closure_is_idempotent() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg(
            "E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id",
            "E".into(),
            &bump,
        )
        .unwrap()
        .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        for is in family.item_sets() {
            assert_eq!(is.clone().closure(&grammar), *is);
        }
        // 只有核心项的集合, 闭包一次和两次相同.
        let kernel: ItemSet = [Item::new(grammar.prods()[1], 2)].into_iter().collect();
        let once = kernel.closure(&grammar);
        assert_eq!(once.len(), 5);
        assert_eq!(once.clone().closure(&grammar), once);
    }

    #[test]
    fn goto_basic_transition() {
        let bump = Bump::new();
        // 增广后:
        // S' -> S
        // S -> E
        // E -> a
        let grammar = Grammar::from_cfg("S -> E\nE -> a", "S".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let prods = grammar.prods();
        let i0 = ItemSet::initial(&grammar).unwrap();

        let token_s = Token::from(NonTerminal::from("S"));
        assert_eq!(
            i0.goto(token_s, &grammar),
            Some([Item::new(prods[0], 1)].into_iter().collect())
        );
        let token_e = Token::from(NonTerminal::from("E"));
        assert_eq!(
            i0.goto(token_e, &grammar),
            Some([Item::new(prods[1], 1)].into_iter().collect())
        );
        let token_a = Token::from(Terminal::from("a"));
        assert_eq!(
            i0.goto(token_a, &grammar),
            Some([Item::new(prods[2], 1)].into_iter().collect())
        );
        assert_eq!(i0.goto(Terminal::from("b").into(), &grammar), None);
    }

    #[test]
    fn balanced_family() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a S b | ε", "S".into(), &bump)
            .unwrap()
            .augmented(&bump);
        let family = Family::from_grammar(&grammar).unwrap();
        assert_eq!(family.len(), 5);
        let states: Vec<Vec<String>> = family
            .item_sets()
            .iter()
            .map(|is| is.items().map(|i| i.to_string()).collect())
            .collect();
        assert_eq!(
            states,
            [
                vec!["S -> ⋅", "S -> ⋅ a S b", "S' -> ⋅ S"],
                vec!["S -> ⋅", "S -> ⋅ a S b", "S -> a ⋅ S b"],
                vec!["S' -> S ⋅"],
                vec!["S -> a S ⋅ b"],
                vec!["S -> a S b ⋅"],
            ]
        );
        let a = Token::from(Terminal::from("a"));
        let b = Token::from(Terminal::from("b"));
        let s = Token::from(NonTerminal::from("S"));
        assert_eq!(
            family.gotos_of(0).map(|it| it.collect::<Vec<_>>()),
            Some(vec![(a, 1), (s, 2)])
        );
        assert_eq!(
            family.gotos_of(1).map(|it| it.collect::<Vec<_>>()),
            Some(vec![(a, 1), (s, 3)])
        );
        assert_eq!(family.goto(3, b), Some(4));
        assert_eq!(family.gotos_of(4).map(|it| it.count()), None);
        assert_eq!(family.gotos().count(), 5);
        assert_eq!(family.index_of(&family.item_sets()[3]), Some(3));
    }

    #[test]
    fn state_numbering_is_stable() {
        let build = || {
            let bump = Bump::new();
            let grammar = Grammar::from_cfg(
                "E -> E + T | T\nT -> T * F | F\nF -> ( E ) | id",
                "E".into(),
                &bump,
            )
            .unwrap()
            .augmented(&bump);
            let family = Family::from_grammar(&grammar).unwrap();
            family
                .item_sets()
                .iter()
                .map(|is| is.items().map(|i| i.to_string()).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        let first = build();
        // 经典表达式文法有 12 个 LR(0) 状态.
        assert_eq!(first.len(), 12);
        (0..10).for_each(|_| assert_eq!(build(), first));
    }

    #[test]
    fn requires_augmented_grammar() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a", "S".into(), &bump).unwrap();
        assert_eq!(
            Family::from_grammar(&grammar).err(),
            Some(Error::GrammarNotAugmented)
        );
    }

    #[test]
    fn epsilon_item_is_complete() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> ε", "S".into(), &bump).unwrap();
        let item = Item::initial(grammar.prods()[0]);
        assert!(item.is_complete());
        assert_eq!(item.expected(), None);
        assert_eq!(format!("{}", item), "S -> ⋅");
    }
}
