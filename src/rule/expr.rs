//! Rule expressions.
//!
//! An [`Expr`] is the pre-parsed form of a rule condition or of the value
//! side of an assignment. Expressions read facts through the
//! [`FactContext`] and never mutate them.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops;
use std::sync::{OnceLock, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, RuleError, RuleResult, ValidationError};
use crate::fact::{FactContext, FieldPath};
use crate::value::Value;

use super::function::Function;

/// Unary operators.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
        }
    }

    fn apply(self, operand: Value) -> RuleResult<Value> {
        match (self, &operand) {
            (Self::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (Self::Neg, Value::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| overflow(self.symbol())),
            (Self::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            _ => Err(ExecutionError::InvalidOperands {
                op: self.symbol().to_string(),
                lhs: operand.type_name().to_string(),
                rhs: "nothing".to_string(),
            }
            .into()),
        }
    }
}

/// Binary operators.
///
/// `And` and `Or` short-circuit left to right.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    fn invalid(self, lhs: &Value, rhs: &Value) -> RuleError {
        ExecutionError::InvalidOperands {
            op: self.symbol().to_string(),
            lhs: lhs.type_name().to_string(),
            rhs: rhs.type_name().to_string(),
        }
        .into()
    }

    /// Applies a non-short-circuit operator to two evaluated operands.
    fn apply(self, lhs: Value, rhs: Value) -> RuleResult<Value> {
        match self {
            Self::Eq => Ok(Value::Bool(loose_eq(&lhs, &rhs))),
            Self::Ne => Ok(Value::Bool(!loose_eq(&lhs, &rhs))),
            Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                let ord = compare(&lhs, &rhs).ok_or_else(|| self.invalid(&lhs, &rhs))?;
                Ok(Value::Bool(match self {
                    Self::Lt => ord == Ordering::Less,
                    Self::Le => ord != Ordering::Greater,
                    Self::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }))
            }
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod => self.arithmetic(lhs, rhs),
            Self::And | Self::Or => match (&lhs, &rhs) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if self == Self::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(self.invalid(&lhs, &rhs)),
            },
        }
    }

    fn arithmetic(self, lhs: Value, rhs: Value) -> RuleResult<Value> {
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let (a, b) = (*a, *b);
                if matches!(self, Self::Div | Self::Mod) && b == 0 {
                    return Err(ExecutionError::DivisionByZero.into());
                }
                let out = match self {
                    Self::Add => a.checked_add(b),
                    Self::Sub => a.checked_sub(b),
                    Self::Mul => a.checked_mul(b),
                    Self::Div => a.checked_div(b),
                    _ => a.checked_rem(b),
                };
                out.map(Value::Int).ok_or_else(|| overflow(self.symbol()))
            }
            (Value::String(_), _) | (_, Value::String(_)) if self == Self::Add => {
                if lhs.is_list() || rhs.is_list() {
                    return Err(self.invalid(&lhs, &rhs));
                }
                Ok(Value::String(format!("{}{}", plain(&lhs), plain(&rhs))))
            }
            _ => {
                let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
                    return Err(self.invalid(&lhs, &rhs));
                };
                if matches!(self, Self::Div | Self::Mod) && b == 0.0 {
                    return Err(ExecutionError::DivisionByZero.into());
                }
                Ok(Value::Float(match self {
                    Self::Add => a + b,
                    Self::Sub => a - b,
                    Self::Mul => a * b,
                    Self::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }
}

fn overflow(op: &str) -> RuleError {
    ExecutionError::Overflow { op: op.to_string() }.into()
}

/// Renders a value for string concatenation (strings without quotes).
pub(crate) fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality with int/float promotion. Values of unrelated types are unequal.
#[must_use]
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            lhs.as_float() == rhs.as_float()
        }
        _ => lhs == rhs,
    }
}

/// Ordering for numbers, strings and times; `None` for anything else.
#[must_use]
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        _ if lhs.is_number() && rhs.is_number() => lhs.as_float()?.partial_cmp(&rhs.as_float()?),
        _ => None,
    }
}

/// Evaluation environment shared by every expression in one session.
#[derive(Debug, Clone)]
pub struct Evaluator<'k> {
    regexes: Option<&'k HashMap<String, Regex>>,
    now: DateTime<Utc>,
}

impl<'k> Evaluator<'k> {
    /// Creates an evaluator whose `Now()` returns `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self { regexes: None, now }
    }

    /// Uses regexes precompiled by a knowledge base.
    #[must_use]
    pub fn with_regexes(mut self, regexes: &'k HashMap<String, Regex>) -> Self {
        self.regexes = Some(regexes);
        self
    }

    /// The instant `Now()` evaluates to.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub(crate) fn is_match(&self, pattern: &str, text: &str) -> RuleResult<bool> {
        if let Some(re) = self.regexes.and_then(|cache| cache.get(pattern)) {
            return Ok(re.is_match(text));
        }
        Ok(dynamic_regex(pattern)?.is_match(text))
    }
}

const DYNAMIC_REGEX_CACHE_MAX: usize = 1024;

static DYNAMIC_REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Compiles a pattern only known at evaluation time, reusing earlier
/// compilations across sessions.
fn dynamic_regex(pattern: &str) -> RuleResult<Regex> {
    let cache = DYNAMIC_REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache
            .read()
            .map_err(|_| RuleError::internal("regex cache lock poisoned"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern).map_err(|e| ExecutionError::InvalidArguments {
        function: Function::Matches.name().to_string(),
        reason: e.to_string(),
    })?;

    let mut guard = cache
        .write()
        .map_err(|_| RuleError::internal("regex cache lock poisoned"))?;
    if guard.len() >= DYNAMIC_REGEX_CACHE_MAX {
        guard.clear();
    }
    // Another session may have inserted it while we compiled.
    let re = guard
        .entry(pattern.to_string())
        .or_insert(compiled)
        .clone();
    Ok(re)
}

/// A pre-parsed rule expression.
///
/// # Example
/// ```
/// use kyrorules::Expr;
///
/// let manual_review = Expr::field("Payout.LifetimePayoutAmount")
///     .greater_than(500_000)
///     .and(Expr::field("Payout.LifetimePayoutAmount").less_than(1_000_000));
///
/// assert_eq!(
///     manual_review.to_string(),
///     "Payout.LifetimePayoutAmount > 500000 && Payout.LifetimePayoutAmount < 1000000"
/// );
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Field {
        path: FieldPath,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

impl Expr {
    /// A literal value.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// A field reference such as `Payout.Amount`.
    #[must_use]
    pub fn field(path: impl Into<FieldPath>) -> Self {
        Self::Field { path: path.into() }
    }

    /// A built-in function call.
    #[must_use]
    pub fn call(function: Function, args: Vec<Expr>) -> Self {
        Self::Call { function, args }
    }

    /// `Now()`.
    #[must_use]
    pub fn now() -> Self {
        Self::call(Function::Now, Vec::new())
    }

    fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into()),
        }
    }

    /// `self && rhs`.
    #[must_use]
    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    /// `self || rhs`.
    #[must_use]
    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    /// `self == rhs`.
    #[must_use]
    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `self != rhs`.
    #[must_use]
    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// `self < rhs`.
    #[must_use]
    pub fn less_than(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `self <= rhs`.
    #[must_use]
    pub fn less_or_equal(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    /// `self > rhs`.
    #[must_use]
    pub fn greater_than(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `self >= rhs`.
    #[must_use]
    pub fn greater_or_equal(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// Evaluates this expression against `ctx`.
    pub fn evaluate(&self, ctx: &FactContext<'_>, ev: &Evaluator<'_>) -> RuleResult<Value> {
        match self {
            Self::Literal { value } => Ok(value.clone()),
            Self::Field { path } => Ok(ctx.get(path)?),
            Self::Unary { op, operand } => op.apply(operand.evaluate(ctx, ev)?),
            Self::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => {
                let left = lhs.evaluate(ctx, ev)?;
                let Value::Bool(l) = left else {
                    return Err(op.invalid(&left, &Value::Bool(false)));
                };
                // Short-circuit: `false && _` and `true || _` skip the right side.
                if (*op == BinaryOp::And && !l) || (*op == BinaryOp::Or && l) {
                    return Ok(Value::Bool(l));
                }
                let right = rhs.evaluate(ctx, ev)?;
                op.apply(left, right)
            }
            Self::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate(ctx, ev)?;
                let right = rhs.evaluate(ctx, ev)?;
                op.apply(left, right)
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(ctx, ev))
                    .collect::<RuleResult<Vec<_>>>()?;
                function.call(values, ev)
            }
        }
    }

    /// Visits this expression and every sub-expression, parents first.
    pub fn walk<'e>(&'e self, visit: &mut impl FnMut(&'e Expr)) {
        visit(self);
        match self {
            Self::Literal { .. } | Self::Field { .. } => {}
            Self::Unary { operand, .. } => operand.walk(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Checks field paths, function arities and literal regex patterns.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut result = Ok(());
        self.walk(&mut |expr| {
            if result.is_err() {
                return;
            }
            result = match expr {
                Self::Field { path } => path.validate(),
                Self::Call { function, args } => function.validate_call(args),
                _ => Ok(()),
            };
        });
        result
    }

    /// Literal regex patterns passed to `Matches`, for precompilation.
    #[must_use]
    pub fn regex_literals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |expr| {
            if let Self::Call {
                function: Function::Matches,
                args,
            } = expr
            {
                if let Some(Self::Literal {
                    value: Value::String(pattern),
                }) = args.get(1)
                {
                    out.push(pattern.as_str());
                }
            }
        });
        out
    }

    const fn precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => match op {
                BinaryOp::Or => 1,
                BinaryOp::And => 2,
                BinaryOp::Eq | BinaryOp::Ne => 3,
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
                BinaryOp::Add | BinaryOp::Sub => 5,
                BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
            },
            Self::Unary { .. } => 7,
            _ => 8,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        let own = self.precedence();
        if own < parent || (right && own == parent) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => write!(f, "{value}"),
            Self::Field { path } => write!(f, "{path}"),
            Self::Unary { op, operand } => {
                f.write_str(op.symbol())?;
                operand.fmt_operand(f, self.precedence(), false)
            }
            Self::Binary { op, lhs, rhs } => {
                let own = self.precedence();
                lhs.fmt_operand(f, own, false)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, own, true)
            }
            Self::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal { value }
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Self::lit(v)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Self::lit(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Self::lit(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Self::lit(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Self::lit(v)
    }
}

impl From<String> for Expr {
    fn from(v: String) -> Self {
        Self::lit(v)
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

macro_rules! arithmetic_ops {
    ($($trait:ident $method:ident $op:ident),*) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

arithmetic_ops!(Add add Add, Sub sub Sub, Mul mul Mul, Div div Div, Rem rem Mod);
