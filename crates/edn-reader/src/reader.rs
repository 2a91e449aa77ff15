use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Keyword, Symbol, Value, ValueKind};
use crate::error::EdnError;
use crate::numbers;
use crate::source::Source;
use crate::tags::{self, DefaultTagReader, TagReader, TagReaderError};

/// Per-call read configuration.
#[derive(Clone, Default)]
pub struct ReadOptions {
    /// Value returned on clean end-of-input; `None` raises instead.
    pub eof: Option<Value>,
    /// Tag readers consulted before the process-wide defaults.
    pub readers: HashMap<Symbol, TagReader>,
    /// Fallback consulted when no tag reader matches.
    pub default_reader: Option<DefaultTagReader>,
}

impl ReadOptions {
    pub fn with_eof_value(mut self, value: Value) -> Self {
        self.eof = Some(value);
        self
    }

    pub fn with_tag_reader(mut self, tag: Symbol, reader: TagReader) -> Self {
        self.readers.insert(tag, reader);
        self
    }

    pub fn with_default_reader(mut self, reader: DefaultTagReader) -> Self {
        self.default_reader = Some(reader);
        self
    }
}

/// Recursive-descent reader over a pushback source. Lives for exactly one
/// top-level read call.
pub(crate) struct Reader<'r> {
    source: &'r mut Source,
    opts: &'r ReadOptions,
}

impl<'r> Reader<'r> {
    pub(crate) fn new(source: &'r mut Source, opts: &'r ReadOptions) -> Self {
        Self { source, opts }
    }

    /// One top-level form, honoring the configured end-of-input value.
    pub(crate) fn read_top(&mut self) -> Result<Value, EdnError> {
        match self.read_top_or_eof()? {
            Some(value) => Ok(value),
            None => match &self.opts.eof {
                Some(value) => Ok(value.clone()),
                None => self.eof_err("EOF while reading"),
            },
        }
    }

    /// One top-level form, or `None` on clean end-of-input.
    pub(crate) fn read_top_or_eof(&mut self) -> Result<Option<Value>, EdnError> {
        loop {
            self.skip_whitespace()?;
            if self.source.peek()?.is_none() {
                return Ok(None);
            }
            if let Some(value) = self.try_read_form()? {
                return Ok(Some(value));
            }
        }
    }

    /// One form; end-of-input is always an error here.
    fn read_form(&mut self) -> Result<Value, EdnError> {
        loop {
            self.skip_whitespace()?;
            if self.source.peek()?.is_none() {
                return self.eof_err("EOF while reading");
            }
            if let Some(value) = self.try_read_form()? {
                return Ok(value);
            }
        }
    }

    /// Reads whatever starts at the current character. `None` means input
    /// was consumed without producing a value (comment, discard).
    fn try_read_form(&mut self) -> Result<Option<Value>, EdnError> {
        let ch = match self.source.read()? {
            Some(ch) => ch,
            None => return self.eof_err("EOF while reading"),
        };
        if is_numeric(ch) {
            return self.read_number(ch).map(Some);
        }
        if (ch == '+' || ch == '-')
            && matches!(self.source.peek()?, Some(next) if is_numeric(next))
        {
            return self.read_number(ch).map(Some);
        }
        match ch {
            '"' => self.read_string_literal().map(Some),
            ':' => self.read_keyword().map(Some),
            ';' => {
                self.skip_line_comment()?;
                Ok(None)
            }
            '^' => self.read_meta().map(Some),
            '(' => self.read_list().map(Some),
            '[' => self.read_vector().map(Some),
            '{' => self.read_map().map(Some),
            ')' | ']' | '}' => Err(self.unmatched(ch)),
            '\\' => self.read_char_literal().map(Some),
            '#' => self.read_dispatch(),
            _ => self.read_symbol(ch).map(Some),
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), EdnError> {
        while matches!(self.source.peek()?, Some(ch) if is_whitespace(ch)) {
            self.source.read()?;
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) -> Result<(), EdnError> {
        while let Some(ch) = self.source.read()? {
            if ch == '\n' {
                break;
            }
        }
        Ok(())
    }

    fn read_number(&mut self, initch: char) -> Result<Value, EdnError> {
        let mut literal = String::new();
        literal.push(initch);
        loop {
            match self.source.peek()? {
                Some(ch) if !is_whitespace(ch) && !is_macro(ch) => {
                    self.source.read()?;
                    literal.push(ch);
                }
                _ => break,
            }
        }
        numbers::match_number(&literal)
            .map(Value::new)
            .map_err(|err| self.locate(err))
    }

    /// Shared loop for every delimited collection.
    fn read_delimited(&mut self, kind: &str, delim: char) -> Result<Vec<Value>, EdnError> {
        let start_line = self.source.line();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.source.peek()? {
                None => {
                    let message = match start_line {
                        Some(line) => {
                            format!("Unexpected EOF while reading {kind}, starting at line {line}")
                        }
                        None => format!("Unexpected EOF while reading {kind}"),
                    };
                    return self.eof_err(message);
                }
                Some(ch) if ch == delim => {
                    self.source.read()?;
                    return Ok(items);
                }
                Some(_) => {
                    if let Some(value) = self.try_read_form()? {
                        items.push(value);
                    }
                }
            }
        }
    }

    fn read_list(&mut self) -> Result<Value, EdnError> {
        let items = self.read_delimited("list", ')')?;
        Ok(Value::new(ValueKind::List(items)))
    }

    fn read_vector(&mut self) -> Result<Value, EdnError> {
        let items = self.read_delimited("vector", ']')?;
        Ok(Value::new(ValueKind::Vector(items)))
    }

    fn read_map(&mut self) -> Result<Value, EdnError> {
        let items = self.read_delimited("map", '}')?;
        let pairs = self.pair_up(items)?;
        self.map_value(pairs)
    }

    fn read_set(&mut self) -> Result<Value, EdnError> {
        let items = self.read_delimited("set", '}')?;
        ValueKind::set_from_items(items)
            .map(Value::new)
            .map_err(|err| self.locate(err))
    }

    fn pair_up(&self, items: Vec<Value>) -> Result<Vec<(Value, Value)>, EdnError> {
        if items.len() % 2 != 0 {
            return self.lex_err("Map literal must contain an even number of forms");
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn map_value(&self, pairs: Vec<(Value, Value)>) -> Result<Value, EdnError> {
        ValueKind::map_from_pairs(pairs)
            .map(Value::new)
            .map_err(|err| self.locate(err))
    }

    fn read_string_literal(&mut self) -> Result<Value, EdnError> {
        let mut text = String::new();
        loop {
            match self.source.read()? {
                None => return self.eof_err("Unexpected EOF while reading string"),
                Some('"') => return Ok(Value::new(ValueKind::String(text))),
                Some('\\') => text.push(self.read_string_escape()?),
                Some(ch) => text.push(ch),
            }
        }
    }

    fn read_string_escape(&mut self) -> Result<char, EdnError> {
        let ch = match self.source.read()? {
            Some(ch) => ch,
            None => return self.eof_err("Unexpected EOF while reading string"),
        };
        match ch {
            't' => Ok('\t'),
            'r' => Ok('\r'),
            'n' => Ok('\n'),
            '\\' => Ok('\\'),
            '"' => Ok('"'),
            'b' => Ok('\u{0008}'),
            'f' => Ok('\u{000C}'),
            'u' => self.read_unicode_escape(),
            ch if is_numeric(ch) => self.read_octal_escape(ch),
            ch => self.lex_err(format!("Unsupported escape character: \\{ch}")),
        }
    }

    fn read_unicode_escape(&mut self) -> Result<char, EdnError> {
        let mut digits = String::new();
        for _ in 0..4 {
            match self.source.read()? {
                None => return self.eof_err(format!("Invalid unicode escape: \\u{digits}")),
                Some(ch) if ch.is_ascii_hexdigit() => digits.push(ch),
                Some(ch) => return self.lex_err(format!("Invalid digit: {ch}")),
            }
        }
        let code = match u32::from_str_radix(&digits, 16) {
            Ok(code) => code,
            Err(_) => return self.lex_err(format!("Invalid unicode escape: \\u{digits}")),
        };
        self.scalar_from_code(code, &format!("\\u{digits}"))
    }

    fn read_octal_escape(&mut self, initch: char) -> Result<char, EdnError> {
        let mut digits = String::new();
        let mut ch = initch;
        loop {
            if !('0'..='7').contains(&ch) {
                return self.lex_err(format!("Invalid digit: {ch}"));
            }
            digits.push(ch);
            if digits.len() == 3 {
                break;
            }
            match self.source.peek()? {
                Some(next) if is_numeric(next) => {
                    self.source.read()?;
                    ch = next;
                }
                _ => break,
            }
        }
        let code = match u32::from_str_radix(&digits, 8) {
            Ok(code) => code,
            Err(_) => return self.lex_err(format!("Invalid octal escape: \\{digits}")),
        };
        if code > 0o377 {
            return self.lex_err("Octal escape sequence must be in range [0, 377]");
        }
        self.scalar_from_code(code, &format!("\\{digits}"))
    }

    fn scalar_from_code(&self, code: u32, literal: &str) -> Result<char, EdnError> {
        if (0xD800..=0xDFFF).contains(&code) {
            return self.lex_err(format!("Invalid character constant: {literal}"));
        }
        match char::from_u32(code) {
            Some(ch) => Ok(ch),
            None => self.lex_err(format!("Invalid character constant: {literal}")),
        }
    }

    fn read_char_literal(&mut self) -> Result<Value, EdnError> {
        let ch = match self.source.read()? {
            Some(ch) => ch,
            None => return self.eof_err("Unexpected EOF while reading character"),
        };
        // A terminating or whitespace character after the backslash is
        // itself the literal, so \space-the-character and \) are valid.
        let token = if is_macro_terminating(ch) || is_not_constituent(ch) || is_whitespace(ch) {
            ch.to_string()
        } else {
            self.read_token("character", ch, false)?
        };
        let mut chars = token.chars();
        if let (Some(only), None) = (chars.next(), chars.next()) {
            return Ok(Value::new(ValueKind::Char(only)));
        }
        let ch = match token.as_str() {
            "newline" => '\n',
            "space" => ' ',
            "tab" => '\t',
            "backspace" => '\u{0008}',
            "formfeed" => '\u{000C}',
            "return" => '\r',
            _ if token.starts_with('u') => self.char_from_unicode_token(&token)?,
            _ if token.starts_with('o') => self.char_from_octal_token(&token)?,
            _ => return self.lex_err(format!("Unsupported character: \\{token}")),
        };
        Ok(Value::new(ValueKind::Char(ch)))
    }

    fn char_from_unicode_token(&self, token: &str) -> Result<char, EdnError> {
        let digits = &token[1..];
        if digits.len() != 4 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return self.lex_err(format!("Invalid unicode character: \\{token}"));
        }
        let code = match u32::from_str_radix(digits, 16) {
            Ok(code) => code,
            Err(_) => return self.lex_err(format!("Invalid unicode character: \\{token}")),
        };
        self.scalar_from_code(code, &format!("\\{token}"))
    }

    fn char_from_octal_token(&self, token: &str) -> Result<char, EdnError> {
        let digits = &token[1..];
        if digits.is_empty() || digits.len() > 3 {
            return self.lex_err(format!(
                "Invalid octal escape sequence length: {}",
                digits.len()
            ));
        }
        if !digits.chars().all(|ch| ('0'..='7').contains(&ch)) {
            return self.lex_err(format!("Invalid octal escape: \\{token}"));
        }
        let code = match u32::from_str_radix(digits, 8) {
            Ok(code) => code,
            Err(_) => return self.lex_err(format!("Invalid octal escape: \\{token}")),
        };
        if code > 0o377 {
            return self.lex_err("Octal escape sequence must be in range [0, 377]");
        }
        self.scalar_from_code(code, &format!("\\{token}"))
    }

    /// Accumulates a symbolic token. The caller has already consumed
    /// `initch`; the terminating character is pushed back.
    fn read_token(
        &mut self,
        kind: &str,
        initch: char,
        validate_leading: bool,
    ) -> Result<String, EdnError> {
        if validate_leading && is_not_constituent(initch) {
            return self.lex_err(format!("Invalid leading character at the start of a {kind}"));
        }
        let mut token = String::new();
        let mut next = Some(initch);
        loop {
            match next {
                None => return Ok(token),
                Some(ch) if is_whitespace(ch) || is_macro_terminating(ch) => {
                    self.source.unread(ch)?;
                    return Ok(token);
                }
                Some(ch) if is_not_constituent(ch) => {
                    return self.lex_err(format!(
                        "Invalid character [{ch}] in {kind} starting with [{token}]"
                    ));
                }
                Some(ch) => token.push(ch),
            }
            next = self.source.read()?;
        }
    }

    fn read_keyword(&mut self) -> Result<Value, EdnError> {
        let ch = match self.source.read()? {
            Some(ch) => ch,
            None => return self.eof_err("Unexpected EOF while reading the start of keyword"),
        };
        if is_whitespace(ch) {
            return self.lex_err("A single colon is not a valid keyword");
        }
        let token = self.read_token("keyword", ch, false)?;
        if token.starts_with(':') {
            return self.lex_err(format!(
                "Invalid keyword :{token}: symbols cannot start with two colons"
            ));
        }
        if token.contains("::") {
            return self.lex_err(format!("Invalid keyword: :{token}"));
        }
        match parse_symbol(&token) {
            Some((namespace, name)) => Ok(Value::new(ValueKind::Keyword(Keyword {
                namespace: namespace.map(str::to_string),
                name: name.to_string(),
            }))),
            None => self.lex_err(format!("Invalid keyword: :{token}")),
        }
    }

    fn read_symbol(&mut self, initch: char) -> Result<Value, EdnError> {
        let token = self.read_token("symbol", initch, true)?;
        let kind = match token.as_str() {
            "nil" => ValueKind::Nil,
            "true" => ValueKind::Bool(true),
            "false" => ValueKind::Bool(false),
            "/" => ValueKind::Symbol(Symbol::simple("/")),
            "NaN" => ValueKind::Float(f64::NAN),
            "-Infinity" => ValueKind::Float(f64::NEG_INFINITY),
            "Infinity" | "+Infinity" => ValueKind::Float(f64::INFINITY),
            _ => match parse_symbol(&token) {
                Some((namespace, name)) => ValueKind::Symbol(Symbol {
                    namespace: namespace.map(str::to_string),
                    name: name.to_string(),
                }),
                None => return self.lex_err(format!("Invalid symbol: {token}")),
            },
        };
        Ok(Value::new(kind))
    }

    fn read_meta(&mut self) -> Result<Value, EdnError> {
        let meta_form = self.read_form()?;
        let pairs = match meta_form.kind {
            ValueKind::Keyword(keyword) => vec![(
                Value::new(ValueKind::Keyword(keyword)),
                Value::new(ValueKind::Bool(true)),
            )],
            kind @ (ValueKind::Symbol(_) | ValueKind::String(_)) => vec![(
                Value::new(ValueKind::Keyword(Keyword::simple("tag"))),
                Value::new(kind),
            )],
            ValueKind::Map(pairs) => pairs,
            kind => {
                return self.lex_err(format!(
                    "Metadata must be a symbol, keyword, string or map, got {}",
                    kind.type_name()
                ))
            }
        };
        let mut target = self.read_form()?;
        if !target.supports_meta() {
            return self.lex_err(format!(
                "Metadata cannot be applied to {}",
                target.kind.type_name()
            ));
        }
        target.attach_meta(pairs);
        Ok(target)
    }

    fn read_dispatch(&mut self) -> Result<Option<Value>, EdnError> {
        let ch = match self.source.read()? {
            Some(ch) => ch,
            None => return self.eof_err("Unexpected EOF while reading dispatch character"),
        };
        match ch {
            // #^ is the deprecated spelling of ^.
            '^' => self.read_meta().map(Some),
            '{' => self.read_set().map(Some),
            '_' => {
                self.read_form()?;
                Ok(None)
            }
            '!' => {
                self.skip_line_comment()?;
                Ok(None)
            }
            '<' => self.lex_err("Unreadable form"),
            ':' => self.read_namespaced_map().map(Some),
            ch if is_macro(ch) => Err(self.locate(EdnError::NoDispatch {
                dispatch: ch,
                context: Default::default(),
            })),
            ch => {
                self.source.unread(ch)?;
                self.read_tagged().map(Some)
            }
        }
    }

    fn read_tagged(&mut self) -> Result<Value, EdnError> {
        let tag_form = self.read_form()?;
        let tag = match tag_form.kind {
            ValueKind::Symbol(symbol) => symbol,
            _ => return self.lex_err("Reader tag must be a symbol"),
        };
        let value = self.read_form()?;
        if let Some(reader) = self.opts.readers.get(&tag) {
            return self.apply_tag_reader(&tag, reader, value);
        }
        if let Some(reader) = tags::default_data_readers().get(&tag) {
            return self.apply_tag_reader(&tag, reader, value);
        }
        if let Some(fallback) = self.opts.default_reader.as_ref() {
            return fallback(tag.clone(), value).map_err(|cause| self.tag_failure(&tag, cause));
        }
        Err(self.locate(EdnError::NoTagReader {
            tag,
            context: Default::default(),
        }))
    }

    fn apply_tag_reader(
        &self,
        tag: &Symbol,
        reader: &TagReader,
        value: Value,
    ) -> Result<Value, EdnError> {
        reader(value).map_err(|cause| self.tag_failure(tag, cause))
    }

    fn tag_failure(&self, tag: &Symbol, cause: TagReaderError) -> EdnError {
        self.locate(EdnError::TagReader {
            tag: tag.clone(),
            message: cause.to_string(),
            cause: Some(Arc::from(cause)),
            context: Default::default(),
        })
    }

    fn read_namespaced_map(&mut self) -> Result<Value, EdnError> {
        let initch = match self.source.read()? {
            Some(ch) => ch,
            None => {
                return self.eof_err("Unexpected EOF while reading the start of namespaced map")
            }
        };
        if initch == ':' {
            return self.lex_err("Auto-qualified namespace is not allowed in a namespaced map");
        }
        let token = self.read_token("namespaced map", initch, false)?;
        let namespace = match parse_symbol(&token) {
            Some((None, name)) if !name.contains(':') => name.to_string(),
            _ => return self.lex_err(format!("Invalid namespace token: {token}")),
        };
        self.skip_whitespace()?;
        match self.source.read()? {
            Some('{') => {}
            _ => {
                return self.lex_err(format!(
                    "Namespaced map with namespace {namespace} does not specify a map"
                ))
            }
        }
        let items = self.read_delimited("namespaced map", '}')?;
        let pairs = self.pair_up(items)?;
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (qualify_key(key, &namespace), value))
            .collect();
        self.map_value(pairs)
    }

    fn lex_err<T>(&self, message: impl Into<String>) -> Result<T, EdnError> {
        Err(self.locate(EdnError::lexical(message)))
    }

    fn eof_err<T>(&self, message: impl Into<String>) -> Result<T, EdnError> {
        Err(self.locate(EdnError::eof(message)))
    }

    fn unmatched(&self, delimiter: char) -> EdnError {
        self.locate(EdnError::UnmatchedDelimiter {
            delimiter,
            context: Default::default(),
        })
    }

    /// Attaches the current position and file to errors from an indexing
    /// source; fills only fields that are still absent.
    fn locate(&self, err: EdnError) -> EdnError {
        let err = match self.source.position() {
            Some(span) => err.with_span(span),
            None => err,
        };
        err.with_file(self.source.file().map(str::to_string))
    }
}

/// Rewrites bare keyword/symbol keys into `namespace`; a `_` namespace
/// strips qualification; anything else passes through untouched.
fn qualify_key(key: Value, namespace: &str) -> Value {
    let Value { kind, meta } = key;
    let kind = match kind {
        ValueKind::Keyword(keyword) => ValueKind::Keyword(Keyword {
            namespace: requalify(keyword.namespace, namespace),
            name: keyword.name,
        }),
        ValueKind::Symbol(symbol) => ValueKind::Symbol(Symbol {
            namespace: requalify(symbol.namespace, namespace),
            name: symbol.name,
        }),
        other => other,
    };
    Value { kind, meta }
}

fn requalify(existing: Option<String>, namespace: &str) -> Option<String> {
    match existing {
        None => Some(namespace.to_string()),
        Some(ns) if ns == "_" => None,
        Some(ns) => Some(ns),
    }
}

/// Splits `[ns/]name`, mirroring the host grammar's symbol rules.
fn parse_symbol(token: &str) -> Option<(Option<&str>, &str)> {
    if token.is_empty() || token.ends_with(':') {
        return None;
    }
    match token.find('/') {
        None => Some((None, token)),
        Some(0) => None,
        Some(idx) => {
            let namespace = &token[..idx];
            let name = &token[idx + 1..];
            if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit()) {
                return None;
            }
            if namespace.ends_with(':') {
                return None;
            }
            if name != "/" && name.contains('/') {
                return None;
            }
            Some((Some(namespace), name))
        }
    }
}

fn is_whitespace(ch: char) -> bool {
    ch.is_whitespace() || ch == ','
}

fn is_numeric(ch: char) -> bool {
    ch.is_ascii_digit()
}

fn is_macro(ch: char) -> bool {
    matches!(
        ch,
        '"' | ':' | ';' | '^' | '(' | ')' | '[' | ']' | '{' | '}' | '\\' | '#'
    )
}

// #, ' and : may appear inside a token; the other macro characters end it.
fn is_macro_terminating(ch: char) -> bool {
    !matches!(ch, '#' | '\'' | ':') && is_macro(ch)
}

fn is_not_constituent(ch: char) -> bool {
    matches!(ch, '@' | '`' | '~')
}
