use bumpalo::Bump;
use std::{
    collections::{BTreeSet, HashMap},
    fmt::{Debug, Display},
    sync::OnceLock,
};

use crate::{
    NonTerminal, Terminal, Token,
    error::{Error, ParseProductionError},
    first_follow::{FirstSets, FollowSets},
    token::{EOF, EPSILON},
};

#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Production<'a> {
    // 产生式 `->` 左侧内容.
    head: NonTerminal<'a>,
    // 产生式 `->` 右侧内容, 空产生式为空序列.
    tail: Vec<Token<'a>>,
}

impl Debug for Production<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Production")
            .field(&format_args!(
                "{:?} -> {}",
                self.head,
                if self.is_empty() {
                    format!("{:?}", EPSILON)
                } else {
                    self.tail
                        .iter()
                        .map(|t| format!("{:?} ", t))
                        .collect::<String>()
                        .trim_end()
                        .to_string()
                }
            ))
            .finish()
    }
}

impl Display for Production<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{} -> {}", self.head, self.tail_str()))
    }
}

impl<'a> Production<'a> {
    #[must_use]
    pub fn new(head: NonTerminal<'a>, tail: Vec<Token<'a>>) -> Self {
        Self { head, tail }
    }

    #[must_use]
    pub fn head(&self) -> NonTerminal<'a> {
        self.head
    }

    #[must_use]
    pub fn tail(&self) -> &[Token<'a>] {
        &self.tail
    }

    /// 产生式右侧的符号数量, 空产生式为 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tail.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    /// 右侧内容的文本形式, 空产生式输出 [`EPSILON`].
    #[must_use]
    pub fn tail_str(&self) -> String {
        if self.is_empty() {
            return EPSILON.to_string();
        }
        self.tail
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct Grammar<'a> {
    prods: Vec<&'a Production<'a>>,
    prod_indexes: HashMap<&'a Production<'a>, usize>,
    /// 文法中出现的所有符号, 包含 [`EOF`], 不包含 [`EPSILON`].
    tokens: BTreeSet<Token<'a>>,
    heads: BTreeSet<&'a str>,
    /// 终结符名字到文法中终结符的映射, 用于解析输入的类别.
    term_names: HashMap<&'a str, Terminal<'a>>,
    start: NonTerminal<'a>,
    augmented: bool,
    /// 第一次使用时计算, 之后复用.
    first_sets: OnceLock<FirstSets<'a>>,
    follow_sets: OnceLock<FollowSets<'a>>,
}

impl PartialEq for Grammar<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.prods == other.prods && self.start == other.start && self.tokens == other.tokens
    }
}

impl Eq for Grammar<'_> {}

/// 一条产生式规则: (行号, 头部, 各个候选式).
type Rule<'a> = (usize, &'a str, Vec<Vec<&'a str>>);

impl<'a> Grammar<'a> {
    /// 按产生式编号遍历产生式.
    pub fn prods(&self) -> &[&'a Production<'a>] {
        &self.prods
    }

    /// 获取产生式的编号, 如果产生式在文法中不存在, 那么返回 [`None`].
    #[must_use]
    pub fn index_of_prod(&self, prod: &Production<'a>) -> Option<usize> {
        self.prod_indexes.get(prod).copied()
    }

    #[must_use]
    pub fn symbol_start(&self) -> NonTerminal<'a> {
        self.start
    }

    #[must_use]
    pub fn tokens(&self) -> &BTreeSet<Token<'a>> {
        &self.tokens
    }

    /// 是否由 [`Grammar::augmented`] 得到, 增广产生式编号为 0.
    #[must_use]
    pub fn is_augmented(&self) -> bool {
        self.augmented
    }

    /// 按顺序遍历所有终结符, 包含 [`EOF`].
    pub fn terminals(&self) -> impl Iterator<Item = Terminal<'a>> + '_ {
        self.tokens.iter().filter_map(Token::as_term)
    }

    pub fn non_terminals(&self) -> impl Iterator<Item = NonTerminal<'a>> + '_ {
        self.tokens.iter().filter_map(Token::as_non_term)
    }

    /// 有产生式的符号才是非终结符, 其余都按终结符处理.
    #[must_use]
    pub fn is_non_term(&self, ident: &str) -> bool {
        self.heads.contains(ident)
    }

    /// 按名字查找文法中的终结符 (包含 [`EOF`]), 不存在时返回 [`None`].
    ///
    /// 返回的终结符借用文法自己的字符串, 与 `ident` 的生命周期无关.
    #[must_use]
    pub fn terminal(&self, ident: &str) -> Option<Terminal<'a>> {
        self.term_names.get(ident).copied()
    }

    /// 按名字对符号分类, 文法中不存在的符号视为终结符.
    #[must_use]
    pub fn get_token<'b>(&self, ident: &'b str) -> Token<'b> {
        if self.is_non_term(ident) {
            NonTerminal::from(ident).into()
        } else {
            Terminal::from(ident).into()
        }
    }

    /// 获取以某个非终结符为头部的所有产生式 (按编号顺序), 结果可能为空.
    pub fn prods_of(&self, nt: NonTerminal<'a>) -> impl Iterator<Item = &'a Production<'a>> + '_ {
        self.prods.iter().copied().filter(move |p| p.head == nt)
    }

    /// 各个非终结符的 first 集.
    pub fn first_sets(&self) -> &FirstSets<'a> {
        self.first_sets.get_or_init(|| FirstSets::new(self))
    }

    /// 各个非终结符的 follow 集.
    pub fn follow_sets(&self) -> &FollowSets<'a> {
        self.follow_sets
            .get_or_init(|| FollowSets::new(self, self.first_sets()))
    }

    /// 计算一个 token 序列的 first 集, 空序列的 first 集为 {[`EPSILON`]}.
    pub fn first_set(&self, seq: impl IntoIterator<Item = Token<'a>>) -> BTreeSet<Terminal<'a>> {
        self.first_sets().of_seq(seq)
    }

    /// 增广文法: 加入新的起始符 `S'` 和编号为 0 的产生式 `S' -> S`.
    #[must_use]
    pub fn augmented(mut self, bump: &'a Bump) -> Self {
        let mut new_start = format!("{}'", self.start);
        while self.tokens.iter().any(|t| t.as_str() == new_start) {
            new_start.push('\'');
        }
        let augmented_start = NonTerminal::from(&*bump.alloc_str(&new_start));
        self.prod_indexes.values_mut().for_each(|x| *x += 1);
        let augmented_prod = &*bump.alloc(Production::new(augmented_start, vec![self.start.into()]));
        self.prods.insert(0, augmented_prod);
        self.prod_indexes.insert(augmented_prod, 0);
        self.tokens.insert(augmented_start.into());
        self.heads.insert(augmented_start.as_str());
        Self {
            prods: self.prods,
            prod_indexes: self.prod_indexes,
            tokens: self.tokens,
            heads: self.heads,
            term_names: self.term_names,
            start: augmented_start,
            augmented: true,
            first_sets: OnceLock::new(),
            follow_sets: OnceLock::new(),
        }
    }

    /// 从文本解析文法, 每行一个头部, 形如 `A -> a B | ε`.
    pub fn from_cfg(s: &'a str, start: NonTerminal<'a>, bump: &'a Bump) -> Result<Self, Error> {
        let mut rules: Vec<Rule<'a>> = Vec::new();
        for (line_num, line) in s
            .lines()
            .enumerate()
            .filter(|(_, s)| s.chars().any(|c| !c.is_whitespace()))
        {
            let (head, tails) = line.split_once("->").ok_or(Error::parse_production_error(
                line_num,
                ParseProductionError::NoArrow,
            ))?;
            let alternatives = tails
                .split('|')
                .map(|tail| tail.split_ascii_whitespace().collect())
                .collect();
            rules.push((line_num, head.trim(), alternatives));
        }
        Self::build(rules, start, bump)
    }

    /// 从字面量映射构建文法: 非终结符 -> 候选式列表, 空产生式写作 `["ε"]`.
    pub fn from_rules(
        rules: &[(&'a str, &[&[&'a str]])],
        start: NonTerminal<'a>,
        bump: &'a Bump,
    ) -> Result<Self, Error> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(idx, (head, alternatives))| {
                (
                    idx,
                    *head,
                    alternatives.iter().map(|alt| alt.to_vec()).collect(),
                )
            })
            .collect();
        Self::build(rules, start, bump)
    }

    fn build(rules: Vec<Rule<'a>>, start: NonTerminal<'a>, bump: &'a Bump) -> Result<Self, Error> {
        let mut tokens: BTreeSet<Token<'a>> = [EOF.into()].into();
        // 找出所有的非终结符.
        let mut heads = BTreeSet::new();
        for &(line_num, head, _) in &rules {
            if head == EPSILON.as_str() || head == EOF.as_str() {
                Err(Error::parse_production_error(
                    line_num,
                    ParseProductionError::ReservedSymbol(head.to_string()),
                ))?
            }
            heads.insert(head);
            tokens.insert(NonTerminal::from(head).into());
        }
        // 验证是否有起始符.
        if !heads.contains(start.as_str()) {
            Err(Error::parse_production_error(
                0,
                ParseProductionError::StartSymbolNotFound,
            ))?
        }
        let mut prods = Vec::new();
        let mut prod_indexes = HashMap::new();
        for (line_num, head, alternatives) in rules {
            for symbols in alternatives {
                let tail = match symbols.as_slice() {
                    [] => Err(Error::parse_production_error(
                        line_num,
                        ParseProductionError::EmptyTail(head.to_string()),
                    ))?,
                    [only] if *only == EPSILON.as_str() => Vec::new(),
                    _ if symbols.contains(&EPSILON.as_str()) => Err(
                        Error::parse_production_error(
                            line_num,
                            ParseProductionError::MisplacedEpsilon(head.to_string()),
                        ),
                    )?,
                    _ => symbols
                        .iter()
                        .map(|&s| {
                            if heads.contains(s) {
                                Token::from(NonTerminal::from(s))
                            } else {
                                Token::from(Terminal::from(s))
                            }
                        })
                        .inspect(|tok| {
                            tokens.insert(*tok);
                        })
                        .collect(),
                };
                let prod = Production::new(NonTerminal::from(head), tail);
                if prod_indexes.contains_key(&prod) {
                    Err(Error::parse_production_error(
                        line_num,
                        ParseProductionError::DuplicateProduction(prod.to_string()),
                    ))?
                }
                let prod = &*bump.alloc(prod);
                prod_indexes.insert(prod, prods.len());
                prods.push(prod);
            }
        }
        let term_names = tokens
            .iter()
            .filter_map(Token::as_term)
            .map(|t| (t.as_str(), t))
            .collect();
        Ok(Grammar {
            prods,
            prod_indexes,
            tokens,
            heads,
            term_names,
            start,
            augmented: false,
            first_sets: OnceLock::new(),
            follow_sets: OnceLock::new(),
        })
    }
}
