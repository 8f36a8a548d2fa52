//! Constraint expressions
//!
//! Parameters can be tied to other parameters through arithmetic expressions
//! such as `2.3548200 * sigma` or `max(1e-15, g0_sigma)`. This module parses
//! them into an [`Expression`] tree, evaluates the tree against an
//! [`EvaluationContext`], and renames variables structurally so that a prefix
//! change of a component never touches function names or longer identifiers.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary (('^' | '**') unary)?
//! primary := '(' expr ')' | ident '(' args? ')' | ident | number
//! ```
//!
//! Binary operators are left-associative, `^` is right-associative and binds
//! tighter than unary minus, so `-x^2` is `-(x^2)`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, not, opt, recognize, value},
    multi::{fold_many0, many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression '{input}': {message}")]
    ParseError { input: String, message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),

    /// Reference to another parameter
    Variable(String),

    Unary(UnaryOp, Box<Expression>),

    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Call of a built-in function such as `sqrt` or `max`
    Function(String, Vec<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => " * ",
            BinaryOp::Div => " / ",
            BinaryOp::Pow => "^",
        }
    }
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64>;
}

/// Evaluation context backed by a plain map.
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    variables: HashMap<String, f64>,
}

impl SimpleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }
}

impl EvaluationContext for SimpleContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

/// Names that evaluate to a constant when the context does not define them.
fn builtin_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let f: fn(f64) -> f64 = match name {
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "exp" => f64::exp,
        "log" | "ln" => f64::ln,
        "log10" => f64::log10,
        "sqrt" => f64::sqrt,
        "abs" => f64::abs,
        "max" | "min" => return call_extremum(name, args),
        _ => {
            return Err(ExpressionError::UndefinedFunction {
                name: name.to_string(),
            })
        }
    };

    match args {
        [x] => Ok(f(*x)),
        _ => Err(ExpressionError::InvalidOperation {
            message: format!("{}() requires 1 argument, got {}", name, args.len()),
        }),
    }
}

fn call_extremum(name: &str, args: &[f64]) -> ExprResult<f64> {
    if args.len() < 2 {
        return Err(ExpressionError::InvalidOperation {
            message: format!(
                "{}() requires at least 2 arguments, got {}",
                name,
                args.len()
            ),
        });
    }

    let pick: fn(f64, f64) -> f64 = if name == "max" { f64::max } else { f64::min };
    Ok(args[1..].iter().fold(args[0], |acc, &v| pick(acc, v)))
}

impl Expression {
    /// Parse an expression from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmcompose_rs::parameters::{Expression, SimpleContext};
    ///
    /// let expr = Expression::parse("10 - 4 - 3").unwrap();
    /// assert_eq!(expr.evaluate(&SimpleContext::new()).unwrap(), 3.0);
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        let parse_error = |message: String| ExpressionError::ParseError {
            input: input.to_string(),
            message,
        };

        match expr_parser(input) {
            Ok((remainder, expr)) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(parse_error(format!(
                        "unexpected trailing characters '{}'",
                        remainder.trim()
                    )))
                }
            }
            Err(e) => Err(parse_error(e.to_string())),
        }
    }

    /// Evaluate the expression with the given context.
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => match context.get_variable(name) {
                Ok(value) => Ok(value),
                Err(err) => builtin_constant(name).ok_or(err),
            },

            Self::Unary(UnaryOp::Neg, operand) => Ok(-operand.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
                    BinaryOp::Div => Ok(lhs / rhs),
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<_>>>()?;
                call_function(name, &values)
            }
        }
    }

    /// All variable names referenced, sorted and deduplicated.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => vars.push(name.clone()),
            Self::Unary(_, operand) => operand.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => args.iter().for_each(|arg| arg.collect_variables(vars)),
        }
    }

    /// A copy of the tree with every `Variable` listed in `renames` replaced.
    ///
    /// Function names are never renamed, and an identifier is only replaced
    /// when it matches a key exactly.
    pub fn rename_variables(&self, renames: &BTreeMap<String, String>) -> Expression {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Variable(name) => {
                Self::Variable(renames.get(name).cloned().unwrap_or_else(|| name.clone()))
            }
            Self::Unary(op, operand) => Self::Unary(*op, Box::new(operand.rename_variables(renames))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.rename_variables(renames)),
                Box::new(right.rename_variables(renames)),
            ),
            Self::Function(name, args) => Self::Function(
                name.clone(),
                args.iter().map(|arg| arg.rename_variables(renames)).collect(),
            ),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Number(n) if n.is_sign_negative() => 3,
            Self::Unary(..) => 3,
            Self::Binary(op, ..) => op.precedence(),
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Unary(UnaryOp::Neg, operand) => {
                write!(f, "-")?;
                operand.fmt_operand(f, 3)
            }
            Self::Binary(op, left, right) => {
                let (left_min, right_min) = match op {
                    BinaryOp::Pow => (5, 3),
                    _ => (op.precedence(), op.precedence() + 1),
                };
                left.fmt_operand(f, left_min)?;
                write!(f, "{}", op.symbol())?;
                right.fmt_operand(f, right_min)
            }
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Rewrite the parameter references of an expression string.
///
/// The string is returned untouched when it references none of the renamed
/// names; otherwise the renamed tree is rendered back to text.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use lmcompose_rs::parameters::expression::rewrite_references;
///
/// let renames = BTreeMap::from([("sigma".to_string(), "g0_sigma".to_string())]);
/// let rewritten = rewrite_references("sigma2 + 2*sigma", &renames).unwrap();
/// assert_eq!(rewritten, "sigma2 + 2 * g0_sigma");
/// ```
pub fn rewrite_references(expr: &str, renames: &BTreeMap<String, String>) -> ExprResult<String> {
    let parsed = Expression::parse(expr)?;
    if !parsed.variables().iter().any(|name| renames.contains_key(name)) {
        return Ok(expr.to_string());
    }

    Ok(parsed.rename_variables(renames).to_string())
}

// Parser functions using nom

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |name: &str| name.to_string(),
    )
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Expression> {
    map(double, Expression::Number).parse(input)
}

fn variable(input: &str) -> IResult<&str, Expression> {
    map(identifier, Expression::Variable).parse(input)
}

fn parens(input: &str) -> IResult<&str, Expression> {
    delimited(char('('), expr_parser, preceded(multispace0, char(')'))).parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        preceded(multispace0, char('(')),
        separated_list0(preceded(multispace0, char(',')), expr_parser),
        preceded(multispace0, char(')')),
    )
    .parse(input)?;

    Ok((input, Expression::Function(name, args)))
}

/// Identifiers come before numbers so that names such as `inf_width` are
/// not read as `inf`.
fn primary(input: &str) -> IResult<&str, Expression> {
    preceded(multispace0, alt((parens, function_call, variable, number))).parse(input)
}

fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = primary(input)?;
    let (input, exponent) = opt(preceded(
        preceded(multispace0, alt((tag("**"), tag("^")))),
        unary,
    ))
    .parse(input)?;

    Ok(match exponent {
        Some(exponent) => (
            input,
            Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
        ),
        None => (input, base),
    })
}

fn unary(input: &str) -> IResult<&str, Expression> {
    preceded(
        multispace0,
        alt((
            map(preceded(char('-'), unary), |operand| {
                Expression::Unary(UnaryOp::Neg, Box::new(operand))
            }),
            preceded(char('+'), unary),
            power,
        )),
    )
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOp> {
    preceded(
        multispace0,
        alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-')))),
    )
    .parse(input)
}

/// `*` or `/`, but not the `**` power operator.
fn multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
            value(BinaryOp::Div, char('/')),
        )),
    )
    .parse(input)
}

fn fold_binary(left: Expression, (op, right): (BinaryOp, Expression)) -> Expression {
    Expression::Binary(op, Box::new(left), Box::new(right))
}

fn term(input: &str) -> IResult<&str, Expression> {
    let (input, first) = unary(input)?;
    fold_many0(pair(multiplicative_op, unary), move || first.clone(), fold_binary).parse(input)
}

fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    fold_many0(pair(additive_op, term), move || first.clone(), fold_binary).parse(input)
}
