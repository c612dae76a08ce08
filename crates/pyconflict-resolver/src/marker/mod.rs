//! PEP 508 environment markers.
//!
//! A marker such as `python_version >= "3.8" and sys_platform != "win32"` is
//! parsed into a [`MarkerTree`] and evaluated against a [`MarkerEnvironment`]
//! derived from the target [`Environment`].
//!
//! [`MarkerEvaluator::evaluate`] never fails: a marker that cannot be parsed
//! or evaluated counts as true, so the dependency it guards is still checked.

use std::fmt;

use pyconflict_core::{Environment, PycError, PycResult, SpecifierSet, Version};
use tracing::{debug, warn};

/// Marker variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerVariable {
    PythonVersion,
    PythonFullVersion,
    OsName,
    SysPlatform,
    PlatformRelease,
    PlatformSystem,
    PlatformVersion,
    PlatformMachine,
    PlatformPythonImplementation,
    ImplementationName,
    ImplementationVersion,
    Extra,
}

impl MarkerVariable {
    fn from_name(name: &str) -> Option<Self> {
        let variable = match name {
            "python_version" => MarkerVariable::PythonVersion,
            "python_full_version" => MarkerVariable::PythonFullVersion,
            "os_name" | "os.name" => MarkerVariable::OsName,
            "sys_platform" | "sys.platform" => MarkerVariable::SysPlatform,
            "platform_release" | "platform.release" => MarkerVariable::PlatformRelease,
            "platform_system" | "platform.system" => MarkerVariable::PlatformSystem,
            "platform_version" | "platform.version" => MarkerVariable::PlatformVersion,
            "platform_machine" | "platform.machine" => MarkerVariable::PlatformMachine,
            "platform_python_implementation" | "platform.python_implementation" => {
                MarkerVariable::PlatformPythonImplementation
            },
            "implementation_name" => MarkerVariable::ImplementationName,
            "implementation_version" => MarkerVariable::ImplementationVersion,
            "extra" => MarkerVariable::Extra,
            _ => return None,
        };
        Some(variable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerVariable::PythonVersion => "python_version",
            MarkerVariable::PythonFullVersion => "python_full_version",
            MarkerVariable::OsName => "os_name",
            MarkerVariable::SysPlatform => "sys_platform",
            MarkerVariable::PlatformRelease => "platform_release",
            MarkerVariable::PlatformSystem => "platform_system",
            MarkerVariable::PlatformVersion => "platform_version",
            MarkerVariable::PlatformMachine => "platform_machine",
            MarkerVariable::PlatformPythonImplementation => "platform_python_implementation",
            MarkerVariable::ImplementationName => "implementation_name",
            MarkerVariable::ImplementationVersion => "implementation_version",
            MarkerVariable::Extra => "extra",
        }
    }
}

/// Either side of a marker comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerValue {
    Variable(MarkerVariable),
    Literal(String),
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerValue::Variable(variable) => f.write_str(variable.as_str()),
            MarkerValue::Literal(value) => write!(f, "\"{}\"", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    TildeEqual,
    ExactEqual,
    In,
    NotIn,
}

impl MarkerOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerOperator::Equal => "==",
            MarkerOperator::NotEqual => "!=",
            MarkerOperator::LessThan => "<",
            MarkerOperator::LessThanEqual => "<=",
            MarkerOperator::GreaterThan => ">",
            MarkerOperator::GreaterThanEqual => ">=",
            MarkerOperator::TildeEqual => "~=",
            MarkerOperator::ExactEqual => "===",
            MarkerOperator::In => "in",
            MarkerOperator::NotIn => "not in",
        }
    }
}

/// Parsed marker expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerTree {
    Expression {
        lhs: MarkerValue,
        op: MarkerOperator,
        rhs: MarkerValue,
    },
    And(Vec<MarkerTree>),
    Or(Vec<MarkerTree>),
}

impl MarkerTree {
    /// Parse a marker string
    pub fn parse(input: &str) -> PycResult<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let tree = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(PycError::invalid_marker(
                input,
                format!("unexpected token {:?}", parser.tokens[parser.pos]),
            ));
        }
        Ok(tree)
    }

    /// Evaluate against a concrete environment
    pub fn evaluate(&self, env: &MarkerEnvironment) -> PycResult<bool> {
        match self {
            MarkerTree::Expression { lhs, op, rhs } => {
                let lhs = env.resolve(lhs)?;
                let rhs = env.resolve(rhs)?;
                eval_op(&lhs, *op, &rhs)
            },
            MarkerTree::And(children) => {
                for child in children {
                    if !child.evaluate(env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            MarkerTree::Or(children) => {
                for child in children {
                    if child.evaluate(env)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
        }
    }
}

impl fmt::Display for MarkerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerTree::Expression { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
            MarkerTree::And(children) => write_joined(f, children, " and "),
            MarkerTree::Or(children) => write_joined(f, children, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[MarkerTree], sep: &str) -> fmt::Result {
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        match child {
            MarkerTree::Expression { .. } => write!(f, "{}", child)?,
            _ => write!(f, "({})", child)?,
        }
    }
    Ok(())
}

/// Compare two resolved marker values.
///
/// Version semantics apply when `op rhs` is a valid specifier; otherwise the
/// values are compared as strings.
fn eval_op(lhs: &str, op: MarkerOperator, rhs: &str) -> PycResult<bool> {
    if !matches!(op, MarkerOperator::In | MarkerOperator::NotIn) {
        if let Ok(spec) = SpecifierSet::parse(&format!("{}{}", op.as_str(), rhs)) {
            if spec.len() == 1 {
                let version = Version::parse(lhs).map_err(|e| {
                    PycError::invalid_marker(
                        format!("{} {} {}", lhs, op.as_str(), rhs),
                        e.to_string(),
                    )
                })?;
                return Ok(spec.contains_with_prereleases(&version, true));
            }
        }
    }

    let result = match op {
        MarkerOperator::Equal => lhs == rhs,
        MarkerOperator::NotEqual => lhs != rhs,
        MarkerOperator::LessThan => lhs < rhs,
        MarkerOperator::LessThanEqual => lhs <= rhs,
        MarkerOperator::GreaterThan => lhs > rhs,
        MarkerOperator::GreaterThanEqual => lhs >= rhs,
        MarkerOperator::In => rhs.contains(lhs),
        MarkerOperator::NotIn => !rhs.contains(lhs),
        MarkerOperator::TildeEqual | MarkerOperator::ExactEqual => {
            return Err(PycError::invalid_marker(
                format!("{} {} {}", lhs, op.as_str(), rhs),
                format!("'{}' needs version operands", op.as_str()),
            ));
        },
    };
    Ok(result)
}

/// Values bound to marker variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerEnvironment {
    pub python_version: Option<String>,
    pub python_full_version: Option<String>,
    pub os_name: Option<String>,
    pub sys_platform: Option<String>,
    pub platform_release: Option<String>,
    pub platform_system: Option<String>,
    pub platform_version: Option<String>,
    pub platform_machine: Option<String>,
    pub platform_python_implementation: Option<String>,
    pub implementation_name: Option<String>,
    pub implementation_version: Option<String>,
    pub extra: Option<String>,
}

impl MarkerEnvironment {
    /// Derive marker values from an environment snapshot. Values the
    /// snapshot cannot provide stay unset.
    pub fn from_environment(env: &Environment) -> Self {
        let interpreter = env.python_version();
        let platform = env.platform();
        let implementation = env.implementation().unwrap_or("cpython").to_ascii_lowercase();

        let platform_system = if platform.starts_with("linux") {
            Some("Linux")
        } else if platform == "darwin" {
            Some("Darwin")
        } else if platform == "win32" {
            Some("Windows")
        } else {
            None
        };

        let python_implementation = match implementation.as_str() {
            "cpython" => "CPython".to_string(),
            "pypy" => "PyPy".to_string(),
            "ironpython" => "IronPython".to_string(),
            "jython" => "Jython".to_string(),
            other => other.to_string(),
        };

        Self {
            python_version: Some(format!("{}.{}", interpreter.major(), interpreter.minor())),
            python_full_version: Some(interpreter.to_string()),
            os_name: Some(if platform == "win32" { "nt" } else { "posix" }.to_string()),
            sys_platform: Some(platform.to_string()),
            platform_release: None,
            platform_system: platform_system.map(str::to_string),
            platform_version: None,
            platform_machine: env.machine().map(str::to_string),
            platform_python_implementation: Some(python_implementation),
            implementation_version: Some(interpreter.to_string()),
            implementation_name: Some(implementation),
            extra: Some(String::new()),
        }
    }

    pub fn get(&self, variable: MarkerVariable) -> Option<&str> {
        let value = match variable {
            MarkerVariable::PythonVersion => &self.python_version,
            MarkerVariable::PythonFullVersion => &self.python_full_version,
            MarkerVariable::OsName => &self.os_name,
            MarkerVariable::SysPlatform => &self.sys_platform,
            MarkerVariable::PlatformRelease => &self.platform_release,
            MarkerVariable::PlatformSystem => &self.platform_system,
            MarkerVariable::PlatformVersion => &self.platform_version,
            MarkerVariable::PlatformMachine => &self.platform_machine,
            MarkerVariable::PlatformPythonImplementation => &self.platform_python_implementation,
            MarkerVariable::ImplementationName => &self.implementation_name,
            MarkerVariable::ImplementationVersion => &self.implementation_version,
            MarkerVariable::Extra => &self.extra,
        };
        value.as_deref()
    }

    fn resolve(&self, value: &MarkerValue) -> PycResult<String> {
        match value {
            MarkerValue::Literal(literal) => Ok(literal.clone()),
            MarkerValue::Variable(variable) => {
                self.get(*variable).map(str::to_string).ok_or_else(|| {
                    PycError::invalid_marker(
                        variable.as_str(),
                        "variable has no value in this environment",
                    )
                })
            },
        }
    }
}

/// Evaluates dependency markers with the fail-open policy
#[derive(Debug, Clone, Default)]
pub struct MarkerEvaluator;

impl MarkerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether a dependency guarded by `marker` applies to `env`.
    ///
    /// Parse and evaluation failures return `true`.
    pub fn evaluate(&self, marker: &str, env: &Environment) -> bool {
        let marker_env = MarkerEnvironment::from_environment(env);
        match MarkerTree::parse(marker).and_then(|tree| tree.evaluate(&marker_env)) {
            Ok(applies) => {
                debug!(marker, applies, "evaluated marker");
                applies
            },
            Err(err) => {
                warn!(marker, error = %err, "marker evaluation failed, treating dependency as applicable");
                true
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Str(String),
    Ident(String),
    Op(&'static str),
}

fn tokenize(input: &str) -> PycResult<Vec<Token>> {
    const OPERATORS: &[&str] = &["===", "==", "!=", "~=", "<=", ">=", "<", ">"];

    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(idx, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            },
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            },
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(PycError::invalid_marker(input, "unterminated string"));
                }
                tokens.push(Token::Str(value));
            },
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            },
            _ => {
                let rest = &input[idx..];
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| {
                        PycError::invalid_marker(input, format!("unexpected character '{}'", c))
                    })?;
                for _ in 0..op.len() {
                    chars.next();
                }
                tokens.push(Token::Op(*op));
            },
        }
    }

    Ok(tokens)
}

/// Recursive descent over the token stream; `and` binds tighter than `or`
struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> PycError {
        PycError::invalid_marker(self.input, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(ident)) if ident == keyword)
    }

    fn parse_or(&mut self) -> PycResult<MarkerTree> {
        let mut children = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            MarkerTree::Or(children)
        })
    }

    fn parse_and(&mut self) -> PycResult<MarkerTree> {
        let mut children = vec![self.parse_atom()?];
        while self.peek_keyword("and") {
            self.pos += 1;
            children.push(self.parse_atom()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            MarkerTree::And(children)
        })
    }

    fn parse_atom(&mut self) -> PycResult<MarkerTree> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(self.error("expected ')'")),
            };
        }

        let lhs = self.parse_value()?;
        let op = self.parse_operator()?;
        let rhs = self.parse_value()?;
        Ok(MarkerTree::Expression { lhs, op, rhs })
    }

    fn parse_value(&mut self) -> PycResult<MarkerValue> {
        match self.next() {
            Some(Token::Str(value)) => Ok(MarkerValue::Literal(value)),
            Some(Token::Ident(name)) => MarkerVariable::from_name(&name)
                .map(MarkerValue::Variable)
                .ok_or_else(|| self.error(format!("unknown marker variable '{}'", name))),
            Some(token) => Err(self.error(format!("expected a value, found {:?}", token))),
            None => Err(self.error("unexpected end of marker")),
        }
    }

    fn parse_operator(&mut self) -> PycResult<MarkerOperator> {
        let op = match self.next() {
            Some(Token::Op(op)) => match op {
                "==" => MarkerOperator::Equal,
                "!=" => MarkerOperator::NotEqual,
                "<" => MarkerOperator::LessThan,
                "<=" => MarkerOperator::LessThanEqual,
                ">" => MarkerOperator::GreaterThan,
                ">=" => MarkerOperator::GreaterThanEqual,
                "~=" => MarkerOperator::TildeEqual,
                _ => MarkerOperator::ExactEqual,
            },
            Some(Token::Ident(ident)) if ident == "in" => MarkerOperator::In,
            Some(Token::Ident(ident)) if ident == "not" => match self.next() {
                Some(Token::Ident(next)) if next == "in" => MarkerOperator::NotIn,
                _ => return Err(self.error("expected 'in' after 'not'")),
            },
            Some(token) => return Err(self.error(format!("expected an operator, found {:?}", token))),
            None => return Err(self.error("unexpected end of marker")),
        };
        Ok(op)
    }
}
