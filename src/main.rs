use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::Context as _;
use bumpalo::Bump;
use clap::{Parser, ValueEnum};
use ll_slr_analysis::*;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Ll1,
    Slr,
    Both,
}

/// 分析文法, 输出 FIRST/FOLLOW 集和分析表, 再用它们分析标准输入中的 token 类别流.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct AppArgs {
    /// 文法文件, 每行形如 `A -> x y | ε`.
    grammar: PathBuf,
    /// 开始符号.
    #[arg(short, long)]
    start: String,
    #[arg(short, long, value_enum, default_value_t = Method::Both)]
    parser: Method,
    /// 重复以输出更多日志.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, registry, util::SubscriberInitExt};

    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let layer = fmt::layer()
        .without_time()
        .with_writer(io::stderr)
        .with_filter(level);
    registry().with(layer).init();
}

fn print_sets<'s, 'a: 's>(
    title: &str,
    sets: impl Iterator<Item = (NonTerminal<'a>, &'s BTreeSet<Terminal<'a>>)>,
) {
    println!("--- {title} ---");
    for (nt, set) in sets {
        let set: Vec<_> = set.iter().map(|t| t.as_str()).collect();
        println!("{nt}: {{ {} }}", set.join(", "));
    }
    println!();
}

fn run_ll1<'a>(grammar: &'a Grammar<'a>, lexemes: &[Lexeme<'_>]) -> anyhow::Result<()> {
    let parser = Ll1Parser::new(grammar).context("failed to build the LL(1) table")?;
    println!("--- LL(1) Table ---");
    println!("{}", parser.table().to_markdown());
    println!();
    println!("--- LL(1) Parse ---");
    let parse = match parser.parse(lexemes) {
        Ok(parse) => parse,
        Err(Error::Syntax { cause, recovered }) => {
            for err in recovered {
                println!("[recovered] {err}");
            }
            anyhow::bail!("LL(1): {cause}");
        }
        Err(e) => return Err(e.into()),
    };
    for step in parse.steps() {
        let stack: Vec<_> = step.stack.iter().map(|t| t.to_string()).collect();
        let action = match &step.action {
            ll1::Ll1Action::Match(t) => format!("match {t}"),
            ll1::Ll1Action::Expand(prod) => format!("{prod}"),
            ll1::Ll1Action::Recover { non_term, skipped } => {
                format!("recover {non_term}, skip {skipped}")
            }
        };
        // 文法中没有的类别显示为 `?`.
        let input = step.input.map_or("?", |t| t.as_str());
        println!("{:<40} {input:>8}   {action}", stack.join(" "));
    }
    for err in parse.errors() {
        println!("[recovered] {err}");
    }
    println!(
        "{}",
        if parse.is_accepted() {
            "accepted"
        } else {
            "rejected"
        }
    );
    println!();
    Ok(())
}

fn run_slr<'a>(grammar: &'a Grammar<'a>, lexemes: &[Lexeme<'_>]) -> anyhow::Result<()> {
    let parser = SlrParser::new(grammar).context("failed to build the SLR(1) table")?;
    let family = parser.table().family();
    println!("--- LR(0) States ---");
    for (from, is) in family.item_sets().iter().enumerate() {
        println!("I_{from}:");
        for item in is.items() {
            println!("    {item}");
        }
        for (tok, to) in family.gotos_of(from).into_iter().flatten() {
            println!("    I_{from} -- {tok} --> I_{to}");
        }
    }
    println!();
    println!("--- SLR(1) Table ---");
    println!("{}", parser.table().to_markdown());
    println!();
    println!("--- SLR(1) Parse ---");
    let parse = parser.parse(lexemes).context("SLR(1)")?;
    for step in parse.steps() {
        let states: Vec<_> = step.states.iter().map(|s| s.to_string()).collect();
        let symbols: Vec<_> = step.symbols.iter().map(|s| s.to_string()).collect();
        println!(
            "{:<24} {:<24} {:>8}   {}",
            states.join(" "),
            symbols.join(" "),
            step.input,
            step.action.describe(grammar)
        );
    }
    println!("accepted, rightmost derivation:");
    for prod in parse.rightmost_derivation() {
        println!("    {prod}");
    }
    println!();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();
    init_tracing(args.verbose);
    tracing::trace!("CLI args = {:?}", args);

    let cfg = fs::read_to_string(&args.grammar)
        .with_context(|| format!("failed to read {}", args.grammar.display()))?;
    let bump = Bump::new();
    let grammar = Grammar::from_cfg(&cfg, args.start.as_str().into(), &bump)?.augmented(&bump);

    let mut inp = String::new();
    io::stdin()
        .read_to_string(&mut inp)
        .context("failed to read tokens from stdin")?;
    let lexemes = split_categories(&inp);
    println!("--- Productions ---");
    for (idx, prod) in grammar.prods().iter().enumerate() {
        println!("{idx:>4} {prod}");
    }
    println!();
    print_sets("FIRST", grammar.first_sets().iter());
    print_sets("FOLLOW", grammar.follow_sets().iter());

    let mut result = Ok(());
    if matches!(args.parser, Method::Ll1 | Method::Both) {
        result = run_ll1(&grammar, &lexemes);
    }
    if matches!(args.parser, Method::Slr | Method::Both) {
        // 两个分析器互不影响, 保留先出现的错误.
        let slr = run_slr(&grammar, &lexemes);
        result = result.and(slr);
    }
    result
}
