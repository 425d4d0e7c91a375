//! 算式核对 - 业务能力层
//!
//! 从解析文本中抽取 "a = b" 形式的纯数值断言（包括 "simplifies to" / "reduces to" / "equals"），
//! 用精确有理数重新计算，找出算错的地方。含未知数、π、根号、单位的片段直接跳过。
//! 右侧写成小数时，只要求在所写位数内四舍五入一致（"100/3 = 33.33" 成立）。

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn claim_phrases() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(simplifies to|reduces to|is equal to|equals|gives)\b")
            .expect("claim phrase regex is valid")
    })
}

fn clause_breaks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;,\n!?:]|\.(\s|$)").expect("clause regex is valid"))
}

/// 精确有理数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i128;
        let sign = if den < 0 { -1 } else { 1 };
        Some(Self {
            num: sign * num / g,
            den: sign * den / g,
        })
    }

    pub fn integer(n: i128) -> Self {
        Self { num: n, den: 1 }
    }

    fn add(self, rhs: Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(rhs.den)?
            .checked_add(rhs.num.checked_mul(self.den)?)?;
        Self::new(num, self.den.checked_mul(rhs.den)?)
    }

    fn neg(self) -> Self {
        Self {
            num: -self.num,
            den: self.den,
        }
    }

    fn mul(self, rhs: Self) -> Option<Self> {
        Self::new(self.num.checked_mul(rhs.num)?, self.den.checked_mul(rhs.den)?)
    }

    fn div(self, rhs: Self) -> Option<Self> {
        Self::new(self.num.checked_mul(rhs.den)?, self.den.checked_mul(rhs.num)?)
    }

    fn pow(self, exp: Self) -> Option<Self> {
        if exp.den != 1 || !(-20..=20).contains(&exp.num) {
            return None;
        }
        let mut result = Self::integer(1);
        for _ in 0..exp.num.unsigned_abs() {
            result = result.mul(self)?;
        }
        if exp.num < 0 {
            Self::integer(1).div(result)
        } else {
            Some(result)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// 算错的断言
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticError {
    pub expression: String,
    pub claimed: String,
    pub actual: Rational,
}

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{} = {}\" 不成立，{} 实际等于 {}",
            self.expression, self.claimed, self.expression, self.actual
        )
    }
}

// ========== 表达式求值 ==========

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Rational),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_decimal(&literal)?));
            }
            _ => return None,
        }
    }

    Some(tokens)
}

fn parse_decimal(literal: &str) -> Option<Rational> {
    match literal.split_once('.') {
        None => Some(Rational::integer(literal.parse().ok()?)),
        Some((int, frac)) => {
            if frac.contains('.') || (int.is_empty() && frac.is_empty()) || frac.len() > 12 {
                return None;
            }
            let int: i128 = if int.is_empty() { 0 } else { int.parse().ok()? };
            if frac.is_empty() {
                return Some(Rational::integer(int));
            }
            let scale = 10i128.checked_pow(frac.len() as u32)?;
            let frac: i128 = frac.parse().ok()?;
            Rational::new(int.checked_mul(scale)?.checked_add(frac)?, scale)
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Option<Rational> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value.add(rhs)? } else { value.add(rhs.neg())? };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<Rational> {
        let mut value = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' { value.mul(rhs)? } else { value.div(rhs)? };
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<Rational> {
        let base = self.unary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.factor()?;
            return base.pow(exp);
        }
        Some(base)
    }

    fn unary(&mut self) -> Option<Rational> {
        match self.next()? {
            Token::Op('-') => Some(self.unary()?.neg()),
            Token::Num(n) => Some(n),
            Token::LParen => {
                let value = self.expr()?;
                match self.next()? {
                    Token::RParen => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// 求值纯数值表达式（无法求值时为空）
pub fn evaluate(expr: &str) -> Option<Rational> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    (parser.pos == parser.tokens.len()).then_some(value)
}

// ========== 断言抽取 ==========

fn is_expr_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*' | '/' | '^' | '(' | ')' | ' ')
}

/// 紧挨着数字就说明这个数带了未知数、常数或单位
fn is_attached_symbol(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, 'π' | '√' | '°' | '%' | '$' | '²' | '³' | '_')
}

fn has_operator(expr: &str) -> bool {
    expr.trim_start_matches('-')
        .chars()
        .any(|c| matches!(c, '+' | '-' | '*' | '/' | '^'))
}

/// 左侧：取 "=" 前面紧邻的纯数值表达式
fn left_operand(segment: &str) -> Option<&str> {
    let start = segment
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_expr_char(*c))
        .last()
        .map_or(segment.len(), |(i, _)| i);
    let raw = &segment[start..];
    let expr = raw.trim();
    if expr.is_empty() {
        return None;
    }

    let expr_start = start + (raw.len() - raw.trim_start().len());
    let before = segment[..expr_start].chars().last();
    let first = expr.chars().next()?;

    if first.is_ascii_digit() || first == '(' || first == '.' {
        // "is 14/13" 可以，"2x" / "π6" 不行
        if before.is_some_and(is_attached_symbol) {
            return None;
        }
    } else {
        // 以运算符开头，说明前面是未知数，比如 "x + 3"
        let prev = segment[..expr_start].trim_end().chars().last();
        if prev.is_some_and(is_attached_symbol) || first != '-' {
            return None;
        }
    }

    // 没有运算符的单个数字只在片段开头时才算断言
    if !has_operator(expr) && !segment[..expr_start].trim().is_empty() {
        return None;
    }

    Some(expr)
}

/// 右侧：取 "=" 后面紧邻的纯数值表达式
fn right_operand(segment: &str) -> Option<&str> {
    let end = segment
        .char_indices()
        .take_while(|(_, c)| is_expr_char(*c))
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    let raw = &segment[..end];
    let expr = raw.trim();
    if expr.is_empty() {
        return None;
    }

    // "2π" / "25%" / "4x" 不是纯数值
    let expr_end = (raw.len() - raw.trim_start().len()) + expr.len();
    if segment[expr_end..].chars().next().is_some_and(is_attached_symbol) {
        return None;
    }
    Some(expr)
}

fn normalize(text: &str) -> String {
    let text = text
        .replace('×', "*")
        .replace('·', "*")
        .replace('÷', "/")
        .replace('−', "-")
        .replace('–', "-");
    claim_phrases().replace_all(&text, "=").into_owned()
}

/// 右侧是普通小数时返回小数位数
fn decimal_places(claimed: &str) -> Option<u32> {
    let (int, frac) = claimed.trim().trim_start_matches('-').split_once('.')?;
    let plain = !frac.is_empty() && int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit());
    plain.then_some(frac.len() as u32)
}

fn matches_claim(actual: Rational, claimed: Rational, claimed_text: &str) -> bool {
    if actual == claimed {
        return true;
    }
    let Some(places) = decimal_places(claimed_text) else {
        return false;
    };
    // |actual - claimed| ≤ 0.5·10^-k  即  2·|num|·10^k ≤ den
    let Some(diff) = actual.add(claimed.neg()) else {
        return false;
    };
    10i128
        .checked_pow(places)
        .and_then(|scale| diff.num.checked_abs()?.checked_mul(2)?.checked_mul(scale))
        .is_some_and(|bound| bound <= diff.den)
}

/// 核对文本中的全部数值断言，返回算错的部分
pub fn check_arithmetic(text: &str) -> Vec<ArithmeticError> {
    let normalized = normalize(text);
    let mut errors = Vec::new();

    for clause in clause_breaks().split(&normalized) {
        let parts: Vec<&str> = clause.split('=').collect();
        for pair in parts.windows(2) {
            let (Some(lhs), Some(rhs)) = (left_operand(pair[0]), right_operand(pair[1])) else {
                continue;
            };
            let (Some(actual), Some(claimed)) = (evaluate(lhs), evaluate(rhs)) else {
                continue;
            };
            if !matches_claim(actual, claimed, rhs) {
                errors.push(ArithmeticError {
                    expression: lhs.to_string(),
                    claimed: rhs.to_string(),
                    actual,
                });
            }
        }
    }

    errors
}
