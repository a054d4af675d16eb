//! Configuration management for the monitor daemon.
//!
//! `monitor.conf` uses the platform's template syntax:
//!
//! ```text
//! # comment
//! MANAGER_TIMER = 15
//! LOG = [
//!   SYSTEM      = "file",
//!   DEBUG_LEVEL = 3
//! ]
//! ```
//!
//! Attribute names are case-insensitive and stored upper-cased. Values are
//! either single strings or vectors of `NAME = value` pairs.
use std::{
    fmt, fs,
    iter::Peekable,
    path::{Path, PathBuf},
    sync::LazyLock,
    vec::IntoIter,
};

use regex::Regex;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    constants::{CONFIG_FILE_NAME, LOG_SECTION},
    error::ConfigError,
};

static ATTRIBUTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("attribute name pattern is valid")
});

/// Value of a configuration attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Attribute {
    /// `NAME = value`
    Single(String),
    /// `NAME = [ A = v, B = w ]`
    Vector(VectorAttribute),
}

/// Ordered `NAME = value` pairs of a vector attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorAttribute {
    values: Vec<(String, String)>,
}

impl VectorAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair, upper-casing its name.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.values.push((name.to_ascii_uppercase(), value.into()));
    }

    /// First value stored under `name`, compared case-insensitively.
    pub fn vector_value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for VectorAttribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// An attribute together with its upper-cased name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedAttribute {
    pub name: String,
    pub value: Attribute,
}

/// Requirements a loaded configuration must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Attributes that must be present.
    pub required: &'static [&'static str],
    /// Attributes that must be vector-valued wherever they appear.
    pub vectors: &'static [&'static str],
}

/// Schema enforced on `monitor.conf`.
pub const MONITOR_SCHEMA: Schema = Schema {
    required: &[],
    vectors: &[LOG_SECTION],
};

/// Parsed daemon configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    source: PathBuf,
    attributes: Vec<NamedAttribute>,
}

impl Configuration {
    /// Loads `monitor.conf` from `etc_dir` and validates it against
    /// [`MONITOR_SCHEMA`].
    pub fn load(etc_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&etc_dir.join(CONFIG_FILE_NAME), &MONITOR_SCHEMA)
    }

    /// Loads and validates an arbitrary configuration file.
    pub fn load_file(path: &Path, schema: &Schema) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&content, path)?;
        config.validate(schema)?;
        Ok(config)
    }

    /// Parses template text. `source` is only used for error reporting.
    pub fn parse(text: &str, source: &Path) -> Result<Self, ConfigError> {
        let attributes = tokenize(text)
            .and_then(|tokens| Parser::new(tokens).attributes())
            .map_err(|err| ConfigError::Parse {
                path: source.to_path_buf(),
                line: err.line,
                message: err.message,
            })?;

        Ok(Self {
            source: source.to_path_buf(),
            attributes,
        })
    }

    /// Checks required attributes and vector-only attributes.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        for name in schema.required {
            if self.get(name).is_none() {
                return Err(ConfigError::MissingAttribute((*name).to_string()));
            }
        }

        for name in schema.vectors {
            if self
                .get_all(name)
                .any(|value| matches!(value, Attribute::Single(_)))
            {
                return Err(ConfigError::ExpectedVector((*name).to_string()));
            }
        }

        Ok(())
    }

    /// File this configuration was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// First attribute named `name`.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.get_all(name).next()
    }

    /// Every attribute named `name`, in file order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes
            .iter()
            .filter(move |attribute| attribute.name.eq_ignore_ascii_case(name))
            .map(|attribute| &attribute.value)
    }

    pub fn get_single(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Attribute::Single(value) => Some(value),
            Attribute::Vector(_) => None,
        }
    }

    pub fn get_vector(&self, name: &str) -> Option<&VectorAttribute> {
        match self.get(name)? {
            Attribute::Vector(vector) => Some(vector),
            Attribute::Single(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedAttribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Renders the configuration back in template syntax.
impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attribute in &self.attributes {
            match &attribute.value {
                Attribute::Single(value) => {
                    write!(f, "{}=", attribute.name)?;
                    write_value(f, value)?;
                    writeln!(f)?;
                }
                Attribute::Vector(vector) => {
                    write!(f, "{}=[", attribute.name)?;
                    for (index, (key, value)) in vector.iter().enumerate() {
                        if index > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "\n  {key}=")?;
                        write_value(f, value)?;
                    }
                    writeln!(f, " ]")?;
                }
            }
        }
        Ok(())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if !value.is_empty() && !value.chars().any(is_delimiter) {
        return write!(f, "{value}");
    }

    write!(f, "\"")?;
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, "\"")
}

// ============================================================================
// Template syntax
// ============================================================================

#[derive(Debug)]
struct SyntaxError {
    line: usize,
    message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Equals,
    Comma,
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("'{word}'"),
            Token::Quoted(_) => "quoted string".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Comma => "','".to_string(),
            Token::Open => "'['".to_string(),
            Token::Close => "']'".to_string(),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | ',' | '[' | ']' | '"' | '#')
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while chars.next_if(|next| *next != '\n').is_some() {}
            }
            '=' => tokens.push((Token::Equals, line)),
            ',' => tokens.push((Token::Comma, line)),
            '[' => tokens.push((Token::Open, line)),
            ']' => tokens.push((Token::Close, line)),
            '"' => {
                let start = line;
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(SyntaxError::new(start, "unterminated quoted string"));
                        }
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => value.push(escaped),
                            Some(other) => {
                                if other == '\n' {
                                    line += 1;
                                }
                                value.push('\\');
                                value.push(other);
                            }
                            None => {
                                return Err(SyntaxError::new(
                                    start,
                                    "unterminated quoted string",
                                ));
                            }
                        },
                        Some('\n') => {
                            line += 1;
                            value.push('\n');
                        }
                        Some(other) => value.push(other),
                    }
                }
                tokens.push((Token::Quoted(value), start));
            }
            first => {
                let mut word = String::from(first);
                while let Some(next) = chars.next_if(|next| !is_delimiter(*next)) {
                    word.push(next);
                }
                tokens.push((Token::Word(word), line));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Peekable<IntoIter<(Token, usize)>>,
    line: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            line: 1,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let (token, line) = self.tokens.next()?;
        self.line = line;
        Some(token)
    }

    fn attributes(mut self) -> Result<Vec<NamedAttribute>, SyntaxError> {
        let mut attributes = Vec::new();
        while self.tokens.peek().is_some() {
            attributes.push(self.attribute()?);
        }
        Ok(attributes)
    }

    fn attribute(&mut self) -> Result<NamedAttribute, SyntaxError> {
        let name = self.name()?;
        self.equals(&name)?;

        let value = match self.next() {
            Some(Token::Open) => Attribute::Vector(self.vector(&name)?),
            Some(Token::Word(value) | Token::Quoted(value)) => Attribute::Single(value),
            Some(other) => {
                return Err(SyntaxError::new(
                    self.line,
                    format!("expected value for {name}, found {}", other.describe()),
                ));
            }
            None => {
                return Err(SyntaxError::new(
                    self.line,
                    format!("expected value for {name}"),
                ));
            }
        };

        Ok(NamedAttribute { name, value })
    }

    fn name(&mut self) -> Result<String, SyntaxError> {
        match self.next() {
            Some(Token::Word(word)) if ATTRIBUTE_NAME.is_match(&word) => {
                Ok(word.to_ascii_uppercase())
            }
            Some(Token::Word(word)) => Err(SyntaxError::new(
                self.line,
                format!("invalid attribute name '{word}'"),
            )),
            Some(other) => Err(SyntaxError::new(
                self.line,
                format!("expected attribute name, found {}", other.describe()),
            )),
            None => Err(SyntaxError::new(self.line, "expected attribute name")),
        }
    }

    fn equals(&mut self, name: &str) -> Result<(), SyntaxError> {
        match self.next() {
            Some(Token::Equals) => Ok(()),
            Some(other) => Err(SyntaxError::new(
                self.line,
                format!("expected '=' after {name}, found {}", other.describe()),
            )),
            None => Err(SyntaxError::new(
                self.line,
                format!("expected '=' after {name}"),
            )),
        }
    }

    fn vector(&mut self, name: &str) -> Result<VectorAttribute, SyntaxError> {
        let mut vector = VectorAttribute::new();

        loop {
            if matches!(self.tokens.peek(), Some((Token::Close, _))) {
                self.next();
                return Ok(vector);
            }

            let key = self.name()?;
            self.equals(&key)?;

            let value = match self.next() {
                Some(Token::Word(value) | Token::Quoted(value)) => value,
                Some(other) => {
                    return Err(SyntaxError::new(
                        self.line,
                        format!("expected value for {name}/{key}, found {}", other.describe()),
                    ));
                }
                None => {
                    return Err(SyntaxError::new(
                        self.line,
                        format!("unterminated vector attribute {name}"),
                    ));
                }
            };
            vector.push(&key, value);

            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::Close) => return Ok(vector),
                Some(other) => {
                    return Err(SyntaxError::new(
                        self.line,
                        format!("expected ',' or ']' in {name}, found {}", other.describe()),
                    ));
                }
                None => {
                    return Err(SyntaxError::new(
                        self.line,
                        format!("unterminated vector attribute {name}"),
                    ));
                }
            }
        }
    }
}
