//! Calculator tool — evaluates mathematical expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `//`, `%`, `**` / `^`, parentheses, unary
//! signs, the constants `pi` and `e`, and a handful of functions (`sqrt`,
//! `abs`, `floor`, `ceil`, `round`, `sin`, `cos`, `tan`, `log`, `log10`,
//! `exp`, `min`, `max`, `pow`). Integers stay integers until an operation
//! forces a float, so `2 + 3` reports `int` and `250 * 0.15` reports `float`.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate math expression"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("expression")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["result"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        match evaluate(expr) {
            Ok(Number::Int(n)) => Ok(ToolOutput::data(serde_json::json!({
                "expression": expr,
                "result": n,
                "type": "int",
            }))),
            Ok(Number::Float(x)) if x.is_finite() => Ok(ToolOutput::data(serde_json::json!({
                "expression": expr,
                "result": x,
                "type": "float",
            }))),
            Ok(Number::Float(_)) => Ok(ToolOutput::failed(format!(
                "Result of '{expr}' is not a finite number"
            ))),
            Err(e) => Ok(ToolOutput::failed(format!("{e} (expression: '{expr}')"))),
        }
    }
}

/// A calculator value: integer until something makes it fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

/// Apply an integer op if both sides are ints and it doesn't overflow,
/// otherwise fall back to the float op.
fn arith(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Number {
    if let (Number::Int(x), Number::Int(y)) = (a, b)
        && let Some(r) = int_op(x, y)
    {
        return Number::Int(r);
    }
    Number::Float(float_op(a.as_f64(), b.as_f64()))
}

fn power(base: Number, exp: Number) -> Number {
    if let (Number::Int(b), Number::Int(e)) = (base, exp)
        && let Ok(e) = u32::try_from(e)
        && let Some(r) = b.checked_pow(e)
    {
        return Number::Int(r);
    }
    Number::Float(base.as_f64().powf(exp.as_f64()))
}

/// Integer division rounding toward negative infinity, like the float path.
fn checked_floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) { Some(q - 1) } else { Some(q) }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<Number, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        ));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Caret,
    Comma,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' if next == Some('*') => { tokens.push(Token::DoubleStar); i += 2; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' if next == Some('/') => { tokens.push(Token::DoubleSlash); i += 2; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '^' => { tokens.push(Token::Caret); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                // Scientific notation: 1e3, 2.5E-4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let num_str: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let is_float = num_str.contains(['.', 'e', 'E']);
                let num = if is_float {
                    num_str
                        .parse::<f64>()
                        .map(Number::Float)
                        .map_err(|_| format!("Invalid number: {}", num_str))?
                } else {
                    match num_str.parse::<i64>() {
                        Ok(n) => Number::Int(n),
                        Err(_) => num_str
                            .parse::<f64>()
                            .map(Number::Float)
                            .map_err(|_| format!("Invalid number: {}", num_str))?,
                    }
                };
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("Unexpected character: '{}'", c)),
        }
    }

    Ok(tokens)
}

/// Nesting allowed through parentheses, signs, exponents and call arguments.
const MAX_DEPTH: usize = 100;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Number, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    let right = self.parse_term()?;
                    left = arith(left, right, i64::checked_add, |a, b| a + b);
                }
                Token::Minus => {
                    self.consume();
                    let right = self.parse_term()?;
                    left = arith(left, right, i64::checked_sub, |a, b| a - b);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Number, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = arith(left, right, i64::checked_mul, |a, b| a * b);
                }
                Token::Slash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.is_zero() {
                        return Err("Division by zero".into());
                    }
                    // True division is always fractional
                    left = Number::Float(left.as_f64() / right.as_f64());
                }
                Token::DoubleSlash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.is_zero() {
                        return Err("Division by zero".into());
                    }
                    left = arith(left, right, checked_floor_div, |a, b| (a / b).floor());
                }
                Token::Percent => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right.is_zero() {
                        return Err("Modulo by zero".into());
                    }
                    // Result takes the sign of the divisor
                    left = arith(
                        left,
                        right,
                        |a, b| a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r }),
                        |a, b| a - b * (a / b).floor(),
                    );
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // Every recursive production passes through here, so this bounds the stack.
    fn parse_unary(&mut self) -> Result<Number, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression too deeply nested".into());
        }
        self.depth += 1;
        let value = self.parse_signed();
        self.depth -= 1;
        value
    }

    // unary = ('-' | '+') unary | power
    fn parse_signed(&mut self) -> Result<Number, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let val = self.parse_unary()?;
                Ok(match val {
                    Number::Int(n) => n.checked_neg().map_or(Number::Float(-(n as f64)), Number::Int),
                    Number::Float(x) => Number::Float(-x),
                })
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power = primary (('**' | '^') unary)?
    fn parse_power(&mut self) -> Result<Number, String> {
        let base = self.parse_primary()?;
        if matches!(self.peek(), Some(Token::DoubleStar | Token::Caret)) {
            self.consume();
            let exp = self.parse_unary()?;
            return Ok(power(base, exp));
        }
        Ok(base)
    }

    // primary = NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Number, String> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.consume();
                    let args = self.parse_args()?;
                    call_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {:?}", tok)),
            None => Err("Unexpected end of expression".into()),
        }
    }

    // args = expr (',' expr)* ')'   (opening paren already consumed)
    fn parse_args(&mut self) -> Result<Vec<Number>, String> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.consume();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.consume() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("Expected ',' or ')' in function call".into()),
            }
        }
    }
}

fn constant(name: &str) -> Result<Number, String> {
    match name {
        "pi" => Ok(Number::Float(std::f64::consts::PI)),
        "e" => Ok(Number::Float(std::f64::consts::E)),
        _ => Err(format!("Unknown name: {name}")),
    }
}

fn call_function(name: &str, args: &[Number]) -> Result<Number, String> {
    let unary = |f: fn(f64) -> f64| -> Result<Number, String> {
        match args {
            [x] => Ok(Number::Float(f(x.as_f64()))),
            _ => Err(format!("{name}() takes exactly one argument")),
        }
    };
    let to_int = |f: fn(f64) -> f64| -> Result<Number, String> {
        match args {
            [Number::Int(n)] => Ok(Number::Int(*n)),
            [x] => {
                let r = f(x.as_f64());
                if r.abs() < 9.0e15 { Ok(Number::Int(r as i64)) } else { Ok(Number::Float(r)) }
            }
            _ => Err(format!("{name}() takes exactly one argument")),
        }
    };

    match name {
        "sqrt" => match args {
            [x] if x.as_f64() < 0.0 => Err("math domain error: sqrt of a negative number".into()),
            _ => unary(f64::sqrt),
        },
        "log" => match args {
            [x] if x.as_f64() <= 0.0 => Err("math domain error: log of a non-positive number".into()),
            [x, base] => Ok(Number::Float(x.as_f64().ln() / base.as_f64().ln())),
            _ => unary(f64::ln),
        },
        "log10" => match args {
            [x] if x.as_f64() <= 0.0 => Err("math domain error: log10 of a non-positive number".into()),
            _ => unary(f64::log10),
        },
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "exp" => unary(f64::exp),
        "floor" => to_int(f64::floor),
        "ceil" => to_int(f64::ceil),
        "round" => match args {
            [x, Number::Int(digits)] => {
                let factor = 10f64.powi(*digits as i32);
                Ok(Number::Float((x.as_f64() * factor).round() / factor))
            }
            _ => to_int(f64::round),
        },
        "abs" => match args {
            [Number::Int(n)] => Ok(n.checked_abs().map_or(Number::Float((*n as f64).abs()), Number::Int)),
            [Number::Float(x)] => Ok(Number::Float(x.abs())),
            _ => Err("abs() takes exactly one argument".into()),
        },
        "pow" => match args {
            [base, exp] => Ok(power(*base, *exp)),
            _ => Err("pow() takes exactly two arguments".into()),
        },
        "min" | "max" => {
            let want_max = name == "max";
            let mut iter = args.iter().copied();
            let first = iter.next().ok_or_else(|| format!("{name}() needs at least one argument"))?;
            Ok(iter.fold(first, |best, x| {
                let better = if want_max { x.as_f64() > best.as_f64() } else { x.as_f64() < best.as_f64() };
                if better { x } else { best }
            }))
        }
        _ => Err(format!("Unknown function: {name}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
