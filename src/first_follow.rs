//! first 集与 follow 集的不动点计算.
//!
//! 两者都是全局迭代: 所有集合初始化为空, 反复应用产生式规则直到没有集合发生变化.
//! 集合只增不减, 而终结符有限, 所以一定收敛, 左递归和互相递归也无需特殊处理.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    Grammar, NonTerminal, Terminal, Token,
    token::{EOF, EPSILON},
};

type Sets<'a> = BTreeMap<NonTerminal<'a>, BTreeSet<Terminal<'a>>>;

/// 序列的 first 集: 依次合并每个符号的 first 集, 直到遇到不能推导出空串的符号.
/// 序列中的符号都能推导出空串时才包含 [`EPSILON`].
fn first_of_seq<'a>(sets: &Sets<'a>, seq: impl IntoIterator<Item = Token<'a>>) -> BTreeSet<Terminal<'a>> {
    let mut first = BTreeSet::new();
    for tok in seq {
        match tok {
            Token::Terminal(EPSILON) => {}
            Token::Terminal(t) => {
                first.insert(t);
                return first;
            }
            Token::NonTerminal(nt) => match sets.get(&nt) {
                Some(fs) => {
                    first.extend(fs.iter().copied().filter(|t| *t != EPSILON));
                    if !fs.contains(&EPSILON) {
                        return first;
                    }
                }
                // 未知符号按终结符处理.
                None => {
                    first.insert(Terminal::from(nt.as_str()));
                    return first;
                }
            },
        }
    }
    first.insert(EPSILON);
    first
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstSets<'a> {
    sets: Sets<'a>,
}

impl<'a> FirstSets<'a> {
    pub fn new(grammar: &Grammar<'a>) -> Self {
        let mut sets: Sets<'a> = grammar
            .non_terminals()
            .map(|nt| (nt, BTreeSet::new()))
            .collect();
        let mut rounds = 0;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for prod in grammar.prods() {
                let first = first_of_seq(&sets, prod.tail().iter().copied());
                let set = sets.entry(prod.head()).or_default();
                let before = set.len();
                set.extend(first);
                changed |= set.len() != before;
            }
        }
        debug!("first sets converged after {rounds} rounds");
        Self { sets }
    }

    /// 非终结符的 first 集, 非终结符不在文法中时返回 [`None`].
    #[must_use]
    pub fn get(&self, nt: NonTerminal<'a>) -> Option<&BTreeSet<Terminal<'a>>> {
        self.sets.get(&nt)
    }

    /// 单个符号的 first 集, 终结符 (以及未知符号) 的 first 集就是它自己.
    #[must_use]
    pub fn of(&self, tok: Token<'a>) -> BTreeSet<Terminal<'a>> {
        match tok {
            Token::Terminal(t) => [t].into(),
            Token::NonTerminal(nt) => self
                .sets
                .get(&nt)
                .cloned()
                .unwrap_or_else(|| [Terminal::from(nt.as_str())].into()),
        }
    }

    #[must_use]
    pub fn of_seq(&self, seq: impl IntoIterator<Item = Token<'a>>) -> BTreeSet<Terminal<'a>> {
        first_of_seq(&self.sets, seq)
    }

    /// 非终结符能否推导出空串.
    #[must_use]
    pub fn is_nullable(&self, nt: NonTerminal<'a>) -> bool {
        self.sets.get(&nt).is_some_and(|s| s.contains(&EPSILON))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NonTerminal<'a>, &BTreeSet<Terminal<'a>>)> {
        self.sets.iter().map(|(nt, s)| (*nt, s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowSets<'a> {
    sets: Sets<'a>,
}

impl<'a> FollowSets<'a> {
    pub fn new(grammar: &Grammar<'a>, first: &FirstSets<'a>) -> Self {
        let mut sets: Sets<'a> = grammar
            .non_terminals()
            .map(|nt| (nt, BTreeSet::new()))
            .collect();
        sets.entry(grammar.symbol_start()).or_default().insert(EOF);
        let mut rounds = 0;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for prod in grammar.prods() {
                let tail = prod.tail();
                for (i, tok) in tail.iter().enumerate() {
                    let Token::NonTerminal(nt) = *tok else {
                        continue;
                    };
                    // B -> alpha A beta: follow(A) 包含 first(beta) - {ε},
                    // beta 能推导出空串时还包含 follow(B).
                    let mut follow = first.of_seq(tail[i + 1..].iter().copied());
                    if follow.remove(&EPSILON) {
                        follow.extend(sets.get(&prod.head()).into_iter().flatten().copied());
                    }
                    let set = sets.entry(nt).or_default();
                    let before = set.len();
                    set.extend(follow);
                    changed |= set.len() != before;
                }
            }
        }
        debug!("follow sets converged after {rounds} rounds");
        Self { sets }
    }

    #[must_use]
    pub fn get(&self, nt: NonTerminal<'a>) -> Option<&BTreeSet<Terminal<'a>>> {
        self.sets.get(&nt)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NonTerminal<'a>, &BTreeSet<Terminal<'a>>)> {
        self.sets.iter().map(|(nt, s)| (*nt, s))
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    use crate::{
        Grammar, NonTerminal, Terminal, Token,
        first_follow::{FirstSets, FollowSets},
        token::{EOF, EPSILON},
    };

    const EXPR: &str = "E -> T E'
E' -> + T E' | ε
T -> F T'
T' -> * F T' | ε
F -> ( E ) | id";

    fn terms(idents: &[&'static str]) -> BTreeSet<Terminal<'static>> {
        idents
            .iter()
            .map(|s| match *s {
                "ε" => EPSILON,
                "$" => EOF,
                s => Terminal::from(s),
            })
            .collect()
    }

    #[test]
    fn balanced_first_follow() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg("S -> a S b | ε", "S".into(), &bump).unwrap();
        let s = NonTerminal::from("S");
        assert_eq!(grammar.first_sets().get(s), Some(&terms(&["a", "ε"])));
        assert_eq!(grammar.follow_sets().get(s), Some(&terms(&["b", "$"])));
        assert!(grammar.first_sets().is_nullable(s));
    }

    #[test]
    fn expression_first_follow() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg(EXPR, "E".into(), &bump).unwrap();
        let first = grammar.first_sets();
        let follow = grammar.follow_sets();
        let nt = NonTerminal::from;
        assert_eq!(first.get(nt("E")), Some(&terms(&["(", "id"])));
        assert_eq!(first.get(nt("T")), Some(&terms(&["(", "id"])));
        assert_eq!(first.get(nt("E'")), Some(&terms(&["+", "ε"])));
        assert_eq!(first.get(nt("T'")), Some(&terms(&["*", "ε"])));
        assert_eq!(follow.get(nt("E")), Some(&terms(&[")", "$"])));
        assert_eq!(follow.get(nt("E'")), Some(&terms(&[")", "$"])));
        assert_eq!(follow.get(nt("T")), Some(&terms(&["+", ")", "$"])));
        assert_eq!(follow.get(nt("T'")), Some(&terms(&["+", ")", "$"])));
        assert_eq!(follow.get(nt("F")), Some(&terms(&["*", "+", ")", "$"])));
    }

    #[test]
    fn terminals_and_unknown_symbols() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg(EXPR, "E".into(), &bump).unwrap();
        let first = grammar.first_sets();
        for t in grammar.terminals() {
            assert_eq!(first.of(t.into()), [t].into());
        }
        assert_eq!(
            first.of(NonTerminal::from("missing").into()),
            terms(&["missing"])
        );
        assert_eq!(first.of_seq([]), terms(&["ε"]));
        let seq: [Token; 2] = [NonTerminal::from("T'").into(), NonTerminal::from("E'").into()];
        assert_eq!(grammar.first_set(seq), terms(&["*", "+", "ε"]));
    }

    #[test]
    fn recursion_without_guards() {
        let bump = Bump::new();
        // 左递归, 互相递归, 以及经由两条路径到达同一个非终结符的菱形结构.
        let grammar = Grammar::from_cfg(
            "S -> S a | A B
            A -> B | ε
            B -> A c | C d
            C -> A | e",
            "S".into(),
            &bump,
        )
        .unwrap();
        let first = grammar.first_sets();
        let nt = NonTerminal::from;
        assert_eq!(first.get(nt("A")), Some(&terms(&["c", "d", "e", "ε"])));
        assert_eq!(first.get(nt("B")), Some(&terms(&["c", "d", "e"])));
        assert_eq!(first.get(nt("C")), Some(&terms(&["c", "d", "e", "ε"])));
        assert_eq!(first.get(nt("S")), Some(&terms(&["c", "d", "e"])));
        assert_eq!(grammar.follow_sets().get(nt("S")), Some(&terms(&["a", "$"])));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let bump = Bump::new();
        let grammar = Grammar::from_cfg(EXPR, "E".into(), &bump).unwrap();
        let first = FirstSets::new(&grammar);
        assert_eq!(&first, grammar.first_sets());
        assert_eq!(FirstSets::new(&grammar), first);
        assert_eq!(
            FollowSets::new(&grammar, &first),
            FollowSets::new(&grammar, grammar.first_sets())
        );
        assert!(std::ptr::eq(grammar.first_sets(), grammar.first_sets()));
    }
}
