//! Score assignment.
//!
//! Two schemes: a place-indexed score table (the last entry repeats for
//! every later place), and an arithmetic formula over the variables
//! `time` (the competitor's elapsed seconds) and `leader` (the group
//! leader's elapsed seconds). Formulas are parsed once per
//! recomputation and evaluated per result.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::result::Place;

/// Score for a place from a score table.
///
/// Places are 1-based; places beyond the table repeat its last entry.
/// Unplaced results score zero.
#[must_use]
pub fn score_for_place(scores: &[i64], place: Place) -> i64 {
    let Place::Numbered(place) = place else {
        return 0;
    };
    match scores.get(place as usize - 1) {
        Some(score) => *score,
        None => scores.last().copied().unwrap_or(0),
    }
}

/// Errors from parsing or evaluating a score formula.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormulaError {
    /// A character the grammar does not know.
    #[error("unexpected {0:?} in score formula")]
    UnexpectedToken(String),
    /// The formula ended mid-expression.
    #[error("score formula ended unexpectedly")]
    UnexpectedEnd,
    /// An identifier other than `time` or `leader`.
    #[error("unknown variable {0:?} in score formula")]
    UnknownVariable(String),
    /// Division by zero during evaluation.
    #[error("division by zero in score formula")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    Time,
    Leader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(Var),
    Neg(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
}

/// A parsed score formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    root: Expr,
}

impl Formula {
    /// Parses a formula like `200 - 100 * time / leader`.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let mut parser = Parser {
            chars: source.chars().peekable(),
        };
        let root = parser.expression()?;
        parser.skip_whitespace();
        match parser.chars.next() {
            None => Ok(Self { root }),
            Some(c) => Err(FormulaError::UnexpectedToken(c.to_string())),
        }
    }

    /// Evaluates against a competitor's and the leader's elapsed seconds.
    pub fn eval(&self, time: f64, leader: f64) -> Result<f64, FormulaError> {
        eval(&self.root, time, leader)
    }

    /// Evaluates and rounds half away from zero to a whole score.
    pub fn score(&self, time: f64, leader: f64) -> Result<i64, FormulaError> {
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.eval(time, leader)?.round() as i64)
    }
}

fn eval(expr: &Expr, time: f64, leader: f64) -> Result<f64, FormulaError> {
    Ok(match expr {
        Expr::Num(n) => *n,
        Expr::Var(Var::Time) => time,
        Expr::Var(Var::Leader) => leader,
        Expr::Neg(inner) => -eval(inner, time, leader)?,
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, time, leader)?;
            let rhs = eval(rhs, time, leader)?;
            match op {
                Op::Add => lhs + rhs,
                Op::Sub => lhs - rhs,
                Op::Mul => lhs * rhs,
                Op::Div => {
                    if rhs == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    lhs / rhs
                }
            }
        }
    })
}

/// Recursive-descent parser over the usual precedence levels.
struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            self.skip_whitespace();
            let op = match self.chars.peek() {
                Some('+') => Op::Add,
                Some('-') => Op::Sub,
                _ => return Ok(lhs),
            };
            self.chars.next();
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.factor()?;
        loop {
            self.skip_whitespace();
            let op = match self.chars.peek() {
                Some('*') => Op::Mul,
                Some('/') => Op::Div,
                _ => return Ok(lhs),
            };
            self.chars.next();
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn factor(&mut self) -> Result<Expr, FormulaError> {
        self.skip_whitespace();
        match self.chars.peek() {
            None => Err(FormulaError::UnexpectedEnd),
            Some('-') => {
                self.chars.next();
                Ok(Expr::Neg(Box::new(self.factor()?)))
            }
            Some('(') => {
                self.chars.next();
                let inner = self.expression()?;
                self.skip_whitespace();
                match self.chars.next() {
                    Some(')') => Ok(inner),
                    Some(c) => Err(FormulaError::UnexpectedToken(c.to_string())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.variable(),
            Some(c) => Err(FormulaError::UnexpectedToken(c.to_string())),
        }
    }

    fn number(&mut self) -> Result<Expr, FormulaError> {
        let mut text = String::new();
        while let Some(c) = self.chars.peek() {
            if c.is_ascii_digit() || *c == '.' {
                text.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        text.parse()
            .map(Expr::Num)
            .map_err(|_| FormulaError::UnexpectedToken(text))
    }

    fn variable(&mut self) -> Result<Expr, FormulaError> {
        let mut name = String::new();
        while let Some(c) = self.chars.peek() {
            if c.is_ascii_alphabetic() {
                name.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        match name.as_str() {
            "time" => Ok(Expr::Var(Var::Time)),
            "leader" => Ok(Expr::Var(Var::Leader)),
            _ => Err(FormulaError::UnknownVariable(name)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }
}
