//! Statement grammar shared by elegant and MAD-X input.
//!
//! Both languages write definitions as `NAME: KEYWORD, KEY=value, ...` and
//! beamlines as `NAME: LINE=(...)`. Names and keywords are case-insensitive
//! and come out upper-cased. Comments and statement boundaries are removed
//! before this grammar runs, see [`super::source`].

use std::collections::HashMap;

use winnow::{
    Parser as _,
    ascii::{Caseless, digit0, digit1, multispace0, multispace1},
    combinator::{alt, delimited, not, opt, preceded, repeat, separated, terminated},
    error::{ContextError, ErrMode, ModalResult, ParseError},
    token::{one_of, take_till, take_while},
};

type Input<'a> = &'a str;
type IResult<O> = ModalResult<O>;

/// Variable values by upper-cased name.
pub(crate) type Vars = HashMap<String, f64>;

/// Constants every file can use.
pub(crate) fn builtin_vars() -> Vars {
    Vars::from([
        ("PI".to_string(), std::f64::consts::PI),
        ("TWOPI".to_string(), std::f64::consts::TAU),
        ("E".to_string(), std::f64::consts::E),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    /// `NAME = expr` or `NAME := expr`.
    Assign { name: String, value: Expr },
    /// `NAME: KEYWORD, KEY=value, ...`
    Element {
        name: String,
        keyword: String,
        attributes: Vec<(String, Literal)>,
    },
    /// `NAME: LINE=(...)`
    Line { name: String, items: Vec<Item> },
    /// `KEYWORD, arg, KEY=arg, ...`, e.g. `USE` or `TITLE`.
    Command { keyword: String, args: Vec<Arg> },
}

/// An attribute value as written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Expr(Expr),
    Text(String),
    Array(Vec<Expr>),
}

/// Command arguments are words, never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arg {
    pub key: Option<String>,
    pub value: String,
}

/// One entry of a `LINE`: `[N*][-]name` or `[N*][-](...)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
    pub count: usize,
    pub reversed: bool,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Name(String),
    Group(Vec<Item>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn from_char(c: char) -> Self {
        match c {
            '+' => Op::Add,
            '-' => Op::Sub,
            '*' => Op::Mul,
            _ => Op::Div,
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
        }
    }
}

/// Infix arithmetic. Operator chains are stored flat, so only parentheses
/// and function calls add depth.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Var(String),
    Call(String, Box<Expr>),
    Neg(Box<Expr>),
    /// `x0 op1 x1 op2 x2 ...`, evaluated left to right.
    Chain(Box<Expr>, Vec<(Op, Expr)>),
    /// `x0 ^ x1 ^ ...`, evaluated right to left.
    Power(Vec<Expr>),
}

impl Expr {
    pub(crate) fn eval(&self, vars: &Vars) -> Result<f64, String> {
        match self {
            Expr::Number(x) => Ok(*x),
            Expr::Var(name) => vars
                .get(name)
                .copied()
                .ok_or_else(|| format!("undefined variable '{name}'")),
            Expr::Call(name, arg) => function(name, arg.eval(vars)?),
            Expr::Neg(inner) => Ok(-inner.eval(vars)?),
            Expr::Chain(first, rest) => rest
                .iter()
                .try_fold(first.eval(vars)?, |acc, (op, x)| Ok(op.apply(acc, x.eval(vars)?))),
            Expr::Power(factors) => {
                let mut values = factors.iter().rev().map(|x| x.eval(vars));
                let last = values.next().unwrap_or(Ok(1.0))?;
                values.try_fold(last, |exp, base| Ok(base?.powf(exp)))
            }
        }
    }
}

fn function(name: &str, x: f64) -> Result<f64, String> {
    Ok(match name {
        "SQRT" => x.sqrt(),
        "SIN" => x.sin(),
        "COS" => x.cos(),
        "TAN" => x.tan(),
        "ASIN" => x.asin(),
        "ACOS" => x.acos(),
        "ATAN" => x.atan(),
        "EXP" => x.exp(),
        "LOG" | "LN" => x.ln(),
        "LOG10" => x.log10(),
        "ABS" => x.abs(),
        _ => return Err(format!("unknown function '{name}'")),
    })
}

/// Parse one statement; the whole text must be consumed.
pub(crate) fn parse(text: &str) -> Result<Statement, String> {
    terminated(statement, multispace0)
        .parse(text)
        .map_err(|e| describe(&e))
}

fn describe(err: &ParseError<Input<'_>, ContextError>) -> String {
    let rest = err.input().get(err.offset()..).unwrap_or_default();
    let snippet: String = rest.chars().take(24).collect();
    if snippet.trim().is_empty() {
        "unexpected end of statement".to_string()
    } else {
        format!("unexpected input at '{snippet}'")
    }
}

fn ws<'a, O>(
    inner: impl winnow::Parser<Input<'a>, O, ErrMode<ContextError>>,
) -> impl winnow::Parser<Input<'a>, O, ErrMode<ContextError>> {
    delimited(multispace0, inner, multispace0)
}

fn statement(input: &mut Input<'_>) -> IResult<Statement> {
    alt((assignment, definition, command)).parse_next(input)
}

fn assign_op(input: &mut Input<'_>) -> IResult<()> {
    ws(alt((":=", "="))).void().parse_next(input)
}

fn assignment(input: &mut Input<'_>) -> IResult<Statement> {
    let name = ws(name).parse_next(input)?;
    assign_op.parse_next(input)?;
    let value = expr.parse_next(input)?;
    Ok(Statement::Assign { name, value })
}

fn definition(input: &mut Input<'_>) -> IResult<Statement> {
    let label = terminated(ws(name), ws(':')).parse_next(input)?;
    let keyword = ws(name).parse_next(input)?;
    if keyword == "LINE" {
        let items = preceded(assign_op, delimited(ws('('), items, ws(')'))).parse_next(input)?;
        return Ok(Statement::Line { name: label, items });
    }
    let attributes: Vec<(String, Literal)> =
        repeat(0.., preceded(ws(','), attribute)).parse_next(input)?;
    Ok(Statement::Element {
        name: label,
        keyword,
        attributes,
    })
}

fn attribute(input: &mut Input<'_>) -> IResult<(String, Literal)> {
    (ws(name), preceded(assign_op, literal)).parse_next(input)
}

fn command(input: &mut Input<'_>) -> IResult<Statement> {
    let keyword = ws(name).parse_next(input)?;
    let args: Vec<Arg> = repeat(0.., preceded(ws(','), arg)).parse_next(input)?;
    Ok(Statement::Command { keyword, args })
}

fn arg(input: &mut Input<'_>) -> IResult<Arg> {
    let key = opt(terminated(ws(name), assign_op)).parse_next(input)?;
    let value = ws(alt((
        string,
        take_till(1.., ',').map(|s: &str| s.trim().to_ascii_uppercase()),
    )))
    .parse_next(input)?;
    Ok(Arg { key, value })
}

fn items(input: &mut Input<'_>) -> IResult<Vec<Item>> {
    separated(1.., item, ws(',')).parse_next(input)
}

fn item(input: &mut Input<'_>) -> IResult<Item> {
    let count = opt(terminated(ws(digit1.try_map(str::parse::<usize>)), ws('*')))
        .parse_next(input)?
        .unwrap_or(1);
    let reversed = opt(ws('-')).parse_next(input)?.is_some();
    let target = alt((
        delimited(ws('('), items, ws(')')).map(Target::Group),
        ws(name).map(Target::Name),
    ))
    .parse_next(input)?;
    Ok(Item {
        count,
        reversed,
        target,
    })
}

fn literal(input: &mut Input<'_>) -> IResult<Literal> {
    ws(alt((
        string.map(Literal::Text),
        delimited('{', separated(0.., ws(expr), ','), ws('}')).map(Literal::Array),
        expr.map(Literal::Expr),
    )))
    .parse_next(input)
}

fn string(input: &mut Input<'_>) -> IResult<String> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .map(str::to_string)
    .parse_next(input)
}

fn name(input: &mut Input<'_>) -> IResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')
        }),
    )
        .take()
        .map(str::to_ascii_uppercase)
        .parse_next(input)
}

fn number(input: &mut Input<'_>) -> IResult<f64> {
    (
        alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void())),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .try_map(str::parse::<f64>)
        .parse_next(input)
}

fn expr(input: &mut Input<'_>) -> IResult<Expr> {
    let first = term.parse_next(input)?;
    let rest: Vec<(Op, Expr)> =
        repeat(0.., (ws(one_of(['+', '-'])).map(Op::from_char), term)).parse_next(input)?;
    Ok(chain(first, rest))
}

fn term(input: &mut Input<'_>) -> IResult<Expr> {
    let first = unary.parse_next(input)?;
    let rest: Vec<(Op, Expr)> =
        repeat(0.., (ws(mul_op).map(Op::from_char), unary)).parse_next(input)?;
    Ok(chain(first, rest))
}

/// `*` or `/`, but not the first half of `**`.
fn mul_op(input: &mut Input<'_>) -> IResult<char> {
    alt((terminated('*', not('*')), '/')).parse_next(input)
}

fn chain(first: Expr, rest: Vec<(Op, Expr)>) -> Expr {
    if rest.is_empty() {
        first
    } else {
        Expr::Chain(Box::new(first), rest)
    }
}

/// Leading signs, then a power. `-2^2` is `-(2^2)`.
fn unary(input: &mut Input<'_>) -> IResult<Expr> {
    let signs: Vec<char> = repeat(0.., ws(one_of(['+', '-']))).parse_next(input)?;
    let value = power.parse_next(input)?;
    let negative = signs.iter().filter(|c| **c == '-').count() % 2 == 1;
    Ok(if negative {
        Expr::Neg(Box::new(value))
    } else {
        value
    })
}

fn power(input: &mut Input<'_>) -> IResult<Expr> {
    let first = atom.parse_next(input)?;
    let mut factors: Vec<Expr> = repeat(
        0..,
        preceded(ws(alt(("**", "^"))), (opt(ws('-')), atom)).map(|(neg, x)| match neg {
            Some(_) => Expr::Neg(Box::new(x)),
            None => x,
        }),
    )
    .parse_next(input)?;
    if factors.is_empty() {
        return Ok(first);
    }
    factors.insert(0, first);
    Ok(Expr::Power(factors))
}

fn atom(input: &mut Input<'_>) -> IResult<Expr> {
    ws(alt((
        number.map(Expr::Number),
        delimited(ws('('), expr, ws(')')),
        call_or_var,
    )))
    .parse_next(input)
}

fn call_or_var(input: &mut Input<'_>) -> IResult<Expr> {
    let name = name.parse_next(input)?;
    let arg = opt(delimited(ws('('), expr, ws(')'))).parse_next(input)?;
    Ok(match arg {
        Some(arg) => Expr::Call(name, Box::new(arg)),
        None => Expr::Var(name),
    })
}

/// One token of an elegant RPN expression.
#[derive(Debug, Clone, PartialEq)]
enum Rpn {
    Number(f64),
    Store(String),
    Op(char),
    Word(String),
}

fn rpn_token(input: &mut Input<'_>) -> IResult<Rpn> {
    alt((
        (opt('-'), number)
            .take()
            .try_map(str::parse::<f64>)
            .map(Rpn::Number),
        preceded((Caseless("sto"), multispace1), name).map(Rpn::Store),
        one_of(['+', '-', '*', '/', '^']).map(Rpn::Op),
        name.map(Rpn::Word),
    ))
    .parse_next(input)
}

/// Evaluate an elegant RPN expression such as `"pi 4 /"`. `sto NAME`
/// assigns the value on top of the stack.
pub(crate) fn rpn(text: &str, vars: &mut Vars) -> Result<f64, String> {
    let tokens: Vec<Rpn> = preceded(multispace0, repeat(0.., terminated(rpn_token, multispace0)))
        .parse(text)
        .map_err(|e| describe(&e))?;

    let mut stack: Vec<f64> = Vec::new();
    let underflow = || format!("not enough operands in '{}'", text.trim());
    for token in tokens {
        match token {
            Rpn::Number(x) => stack.push(x),
            Rpn::Store(name) => {
                let top = stack.last().copied().ok_or_else(underflow)?;
                vars.insert(name, top);
            }
            Rpn::Op(op) => {
                let b = stack.pop().ok_or_else(underflow)?;
                let a = stack.pop().ok_or_else(underflow)?;
                stack.push(match op {
                    '^' => a.powf(b),
                    other => Op::from_char(other).apply(a, b),
                });
            }
            Rpn::Word(word) if word == "CHS" => {
                let x = stack.pop().ok_or_else(underflow)?;
                stack.push(-x);
            }
            Rpn::Word(word) => match vars.get(&word) {
                Some(x) => stack.push(*x),
                None => {
                    let x = stack.pop().ok_or_else(|| format!("undefined variable '{word}'"))?;
                    stack.push(function(&word, x)?);
                }
            },
        }
    }
    stack
        .pop()
        .ok_or_else(|| format!("empty expression '{}'", text.trim()))
}
