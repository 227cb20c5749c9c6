//! Template compiler – parses JSX-flavoured source text into an inert
//! [`CompiledTemplate`].
//!
//! This is pure syntax desugaring: markup literals become [`JsxNode`]s and
//! host-language expressions become [`Expr`] trees. Nothing is evaluated
//! here; evaluation (and its sandbox) lives in [`crate::eval`].
//!
//! The supported surface is a deliberately small JS subset: top-level
//! `function Name(props) {…}` / `const Name = (args) => …` definitions,
//! `const`/`let`/`return` statements, and expressions (literals, template
//! literals, member/index access, method calls, arrows, arithmetic,
//! comparison, logic, ternary, JSX).

use std::collections::HashMap;

use crate::ast::*;
use crate::error::CompileError;

/// The entry view every template must define.
pub const ENTRY_VIEW: &str = "Template";

/// Parse template source into a compiled unit.
///
/// Fails when the source is empty, does not parse, defines no view named
/// `Template`, or defines the same name twice.
pub fn compile(source: &str) -> Result<CompiledTemplate, CompileError> {
    let mut parser = Parser::new(source);
    parser.skip_trivia();
    if parser.eof() {
        return Err(parser.err("template source is empty"));
    }

    let mut views: HashMap<String, FnDef> = HashMap::new();
    loop {
        parser.skip_trivia();
        if parser.eof() {
            break;
        }
        let def = parser.parse_definition()?;
        if views.contains_key(&def.name) {
            return Err(parser.err(&format!("duplicate definition of `{}`", def.name)));
        }
        views.insert(def.name.clone(), def);
    }

    if !views.contains_key(ENTRY_VIEW) {
        return Err(CompileError {
            message: format!("no `{ENTRY_VIEW}` view defined"),
            line: 1,
            column: 1,
        });
    }

    Ok(CompiledTemplate::new(views))
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the source text
// ---------------------------------------------------------------------------

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    // ── definitions ────────────────────────────────────────────────────────

    fn parse_definition(&mut self) -> Result<FnDef, CompileError> {
        if self.starts_with_word("function") {
            self.advance_over("function");
            self.skip_trivia();
            let name = self.parse_ident()?;
            self.skip_trivia();
            let params = self.parse_param_list()?;
            self.skip_trivia();
            self.expect("{")?;
            let body = self.parse_block()?;
            return Ok(FnDef {
                name,
                params,
                body: FnBody::Block(body),
            });
        }

        if self.starts_with_word("const") || self.starts_with_word("let") {
            if self.starts_with_word("const") {
                self.advance_over("const");
            } else {
                self.advance_over("let");
            }
            self.skip_trivia();
            let name = self.parse_ident()?;
            self.skip_trivia();
            self.expect("=")?;
            self.skip_trivia();
            let params = if self.starts_with("(") {
                self.parse_param_list()?
            } else {
                vec![self.parse_ident()?]
            };
            self.skip_trivia();
            self.expect("=>")?;
            self.skip_trivia();
            let body = if self.starts_with("{") {
                self.advance(1);
                FnBody::Block(self.parse_block()?)
            } else {
                FnBody::Expr(self.parse_expr()?)
            };
            self.skip_trivia();
            if self.starts_with(";") {
                self.advance(1);
            }
            return Ok(FnDef { name, params, body });
        }

        Err(self.err("expected a `function` or `const` view definition"))
    }

    fn parse_param_list(&mut self) -> Result<Vec<String>, CompileError> {
        self.expect("(")?;
        let mut params = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with(")") {
                self.advance(1);
                break;
            }
            params.push(self.parse_ident()?);
            self.skip_trivia();
            if self.starts_with(",") {
                self.advance(1);
                continue;
            }
            self.expect(")")?;
            break;
        }
        Ok(params)
    }

    /// Parse a `{ … }` body; the opening brace has already been consumed.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with("}") {
                self.advance(1);
                break;
            }
            if self.eof() {
                return Err(self.err("unterminated function body"));
            }
            if self.starts_with_word("const") || self.starts_with_word("let") {
                if self.starts_with_word("const") {
                    self.advance_over("const");
                } else {
                    self.advance_over("let");
                }
                self.skip_trivia();
                let name = self.parse_ident()?;
                self.skip_trivia();
                self.expect("=")?;
                self.skip_trivia();
                let value = self.parse_expr()?;
                self.skip_trivia();
                if self.starts_with(";") {
                    self.advance(1);
                }
                stmts.push(Stmt::Bind(name, value));
            } else if self.starts_with_word("return") {
                self.advance_over("return");
                self.skip_trivia();
                let value = self.parse_expr()?;
                self.skip_trivia();
                if self.starts_with(";") {
                    self.advance(1);
                }
                stmts.push(Stmt::Return(value));
            } else {
                return Err(self.err("expected `const`, `let`, or `return`"));
            }
        }
        if !stmts.iter().any(|s| matches!(s, Stmt::Return(_))) {
            return Err(self.err("function body has no `return` statement"));
        }
        Ok(stmts)
    }

    // ── expressions, by precedence ─────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_or()?;
        self.skip_trivia();
        if self.starts_with("?") {
            self.advance(1);
            let then = self.parse_expr()?;
            self.skip_trivia();
            self.expect(":")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_trivia();
            if self.starts_with("||") {
                self.advance(2);
                let right = self.parse_and()?;
                left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_trivia();
            if self.starts_with("&&") {
                self.advance(2);
                let right = self.parse_equality()?;
                left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_comparison()?;
        loop {
            self.skip_trivia();
            let op = if self.starts_with("===") {
                self.advance(3);
                BinaryOp::Eq
            } else if self.starts_with("!==") {
                self.advance(3);
                BinaryOp::Ne
            } else if self.starts_with("==") {
                self.advance(2);
                BinaryOp::Eq
            } else if self.starts_with("!=") {
                self.advance(2);
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_trivia();
            let op = if self.starts_with("<=") {
                self.advance(2);
                BinaryOp::Le
            } else if self.starts_with(">=") {
                self.advance(2);
                BinaryOp::Ge
            } else if self.starts_with("<") {
                self.advance(1);
                BinaryOp::Lt
            } else if self.starts_with(">") {
                self.advance(1);
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_trivia();
            let op = if self.starts_with("+") {
                self.advance(1);
                BinaryOp::Add
            } else if self.starts_with("-") {
                self.advance(1);
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_trivia();
            let op = if self.starts_with("*") {
                self.advance(1);
                BinaryOp::Mul
            } else if self.starts_with("/") && !self.starts_with("//") && !self.starts_with("/*") {
                self.advance(1);
                BinaryOp::Div
            } else if self.starts_with("%") {
                self.advance(1);
                BinaryOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        self.skip_trivia();
        if self.starts_with("!") && !self.starts_with("!=") {
            self.advance(1);
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        if self.starts_with("-") {
            self.advance(1);
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_trivia();
            if self.starts_with(".") {
                self.advance(1);
                self.skip_trivia();
                let name = self.parse_ident()?;
                self.skip_trivia();
                if self.starts_with("(") {
                    let args = self.parse_args()?;
                    expr = Expr::MethodCall {
                        target: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.starts_with("[") {
                self.advance(1);
                let index = self.parse_expr()?;
                self.skip_trivia();
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.starts_with("(") {
                match &expr {
                    Expr::Ident(name) => {
                        let callee = name.clone();
                        let args = self.parse_args()?;
                        expr = Expr::Call { callee, args };
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        self.skip_trivia();
        if self.eof() {
            return Err(self.err("unexpected end of template source"));
        }
        if self.starts_with("(") {
            if self.arrow_ahead() {
                let params = self.parse_param_list()?;
                self.skip_trivia();
                self.expect("=>")?;
                self.skip_trivia();
                let body = if self.starts_with("{") {
                    self.advance(1);
                    FnBody::Block(self.parse_block()?)
                } else {
                    FnBody::Expr(self.parse_expr()?)
                };
                return Ok(Expr::Arrow {
                    params,
                    body: Box::new(body),
                });
            }
            self.advance(1);
            let inner = self.parse_expr()?;
            self.skip_trivia();
            self.expect(")")?;
            return Ok(inner);
        }
        if self.starts_with("<") {
            return Ok(Expr::Jsx(self.parse_jsx()?));
        }
        if self.starts_with("[") {
            return self.parse_array();
        }
        if self.starts_with("{") {
            return self.parse_object();
        }
        if self.starts_with("`") {
            return self.parse_template_literal();
        }
        if self.starts_with("\"") || self.starts_with("'") {
            return self.parse_js_string().map(Expr::Str);
        }
        let c = self.current_char();
        if c.is_ascii_digit() {
            return self.parse_number();
        }
        if is_ident_start(c) {
            let name = self.parse_ident()?;
            return Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" | "undefined" => Expr::Null,
                _ => {
                    // Single-parameter arrow: `item => …`
                    let saved = self.pos;
                    self.skip_trivia();
                    if self.starts_with("=>") {
                        self.advance(2);
                        self.skip_trivia();
                        let body = if self.starts_with("{") {
                            self.advance(1);
                            FnBody::Block(self.parse_block()?)
                        } else {
                            FnBody::Expr(self.parse_expr()?)
                        };
                        return Ok(Expr::Arrow {
                            params: vec![name],
                            body: Box::new(body),
                        });
                    }
                    self.pos = saved;
                    Expr::Ident(name)
                }
            });
        }
        Err(self.err(&format!("unexpected character `{c}`")))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect("(")?;
        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with(")") {
                self.advance(1);
                break;
            }
            args.push(self.parse_expr()?);
            self.skip_trivia();
            if self.starts_with(",") {
                self.advance(1);
                continue;
            }
            self.expect(")")?;
            break;
        }
        Ok(args)
    }

    fn parse_array(&mut self) -> Result<Expr, CompileError> {
        self.expect("[")?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with("]") {
                self.advance(1);
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_trivia();
            if self.starts_with(",") {
                self.advance(1);
                continue;
            }
            self.expect("]")?;
            break;
        }
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr, CompileError> {
        self.expect("{")?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.starts_with("}") {
                self.advance(1);
                break;
            }
            let key = if self.starts_with("\"") || self.starts_with("'") {
                self.parse_js_string()?
            } else {
                self.parse_ident()?
            };
            self.skip_trivia();
            if self.starts_with(":") {
                self.advance(1);
                let value = self.parse_expr()?;
                entries.push((key, value));
            } else {
                // Shorthand `{ name }`
                entries.push((key.clone(), Expr::Ident(key)));
            }
            self.skip_trivia();
            if self.starts_with(",") {
                self.advance(1);
                continue;
            }
            self.expect("}")?;
            break;
        }
        Ok(Expr::Object(entries))
    }

    fn parse_template_literal(&mut self) -> Result<Expr, CompileError> {
        self.expect("`")?;
        let mut parts = Vec::new();
        let mut lit = String::new();
        loop {
            if self.eof() {
                return Err(self.err("unterminated template literal"));
            }
            if self.starts_with("`") {
                self.advance(1);
                break;
            }
            if self.starts_with("${") {
                self.advance(2);
                if !lit.is_empty() {
                    parts.push(TemplatePart::Lit(std::mem::take(&mut lit)));
                }
                let expr = self.parse_expr()?;
                self.skip_trivia();
                self.expect("}")?;
                parts.push(TemplatePart::Expr(expr));
                continue;
            }
            if self.starts_with("\\") {
                self.advance(1);
                if self.eof() {
                    return Err(self.err("unterminated template literal"));
                }
                lit.push(unescape(self.current_char()));
                self.advance(1);
                continue;
            }
            lit.push(self.current_char());
            self.advance(1);
        }
        if !lit.is_empty() {
            parts.push(TemplatePart::Lit(lit));
        }
        Ok(Expr::TemplateStr(parts))
    }

    fn parse_js_string(&mut self) -> Result<String, CompileError> {
        let quote = self.current_char();
        self.advance(1);
        let mut out = String::new();
        loop {
            if self.eof() {
                return Err(self.err("unterminated string literal"));
            }
            let c = self.current_char();
            if c == quote {
                self.advance(1);
                return Ok(out);
            }
            if c == '\\' {
                self.advance(1);
                if self.eof() {
                    return Err(self.err("unterminated string literal"));
                }
                out.push(unescape(self.current_char()));
                self.advance(1);
                continue;
            }
            out.push(c);
            self.advance(1);
        }
    }

    fn parse_number(&mut self) -> Result<Expr, CompileError> {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_ascii_digit() || c == '.' {
                self.advance(1);
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| self.err(&format!("invalid number literal `{text}`")))
    }

    // ── JSX ────────────────────────────────────────────────────────────────

    fn parse_jsx(&mut self) -> Result<JsxNode, CompileError> {
        self.expect("<")?;
        let tag = self.parse_jsx_name()?;

        let mut attrs = Vec::new();
        loop {
            self.skip_trivia();
            if self.eof() {
                return Err(self.err(&format!("unterminated element <{tag}>")));
            }
            if self.starts_with("/>") || self.starts_with(">") {
                break;
            }
            let name = self.parse_jsx_name()?;
            self.skip_trivia();
            if self.starts_with("=") {
                self.advance(1);
                self.skip_trivia();
                if self.starts_with("\"") || self.starts_with("'") {
                    let value = self.parse_quoted_attr()?;
                    attrs.push((name, JsxAttr::Lit(decode_entities(&value))));
                } else if self.starts_with("{") {
                    self.advance(1);
                    let expr = self.parse_expr()?;
                    self.skip_trivia();
                    self.expect("}")?;
                    attrs.push((name, JsxAttr::Expr(expr)));
                } else {
                    return Err(self.err(&format!("expected a value for attribute `{name}`")));
                }
            } else {
                attrs.push((name, JsxAttr::Bare));
            }
        }

        if self.starts_with("/>") {
            self.advance(2);
            return Ok(JsxNode {
                tag,
                attrs,
                children: Vec::new(),
            });
        }
        self.expect(">")?;

        let mut children = Vec::new();
        loop {
            if self.eof() {
                return Err(self.err(&format!("unterminated element <{tag}>")));
            }
            if self.starts_with("</") {
                self.advance(2);
                let closing = self.parse_jsx_name()?;
                if closing != tag {
                    return Err(self.err(&format!(
                        "mismatched closing tag: expected </{tag}>, found </{closing}>"
                    )));
                }
                self.skip_trivia();
                self.expect(">")?;
                break;
            }
            if self.starts_with("{") {
                self.advance(1);
                let expr = self.parse_expr()?;
                self.skip_trivia();
                self.expect("}")?;
                children.push(JsxChild::Expr(expr));
            } else if self.starts_with("<") {
                children.push(JsxChild::Node(self.parse_jsx()?));
            } else {
                let raw = self.take_text_run();
                if let Some(text) = normalize_jsx_text(&raw) {
                    children.push(JsxChild::Text(decode_entities(&text)));
                }
            }
        }

        Ok(JsxNode {
            tag,
            attrs,
            children,
        })
    }

    fn parse_jsx_name(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a tag or attribute name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Quoted JSX attribute value: no backslash escapes, entities allowed.
    fn parse_quoted_attr(&mut self) -> Result<String, CompileError> {
        let quote = self.current_char();
        self.advance(1);
        let start = self.pos;
        while !self.eof() && self.current_char() != quote {
            self.advance(1);
        }
        if self.eof() {
            return Err(self.err("unterminated attribute value"));
        }
        let value = self.input[start..self.pos].to_string();
        self.advance(1);
        Ok(value)
    }

    /// Consume raw text up to the next `<` or `{`.
    fn take_text_run(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c == '<' || c == '{' {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    // ── low-level scanning ─────────────────────────────────────────────────

    fn parse_ident(&mut self) -> Result<String, CompileError> {
        if self.eof() || !is_ident_start(self.current_char()) {
            return Err(self.err("expected an identifier"));
        }
        let start = self.pos;
        while !self.eof() && is_ident_char(self.current_char()) {
            self.advance(1);
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// True when the next tokens form `( ident, … ) =>`, i.e. an arrow
    /// parameter list rather than a parenthesized expression.
    fn arrow_ahead(&self) -> bool {
        let bytes = self.input.as_bytes();
        let mut p = self.pos + 1;
        let skip_ws = |p: &mut usize| {
            while *p < bytes.len() && bytes[*p].is_ascii_whitespace() {
                *p += 1;
            }
        };
        skip_ws(&mut p);
        if p < bytes.len() && bytes[p] != b')' {
            loop {
                if p >= bytes.len() || !is_ident_start(bytes[p] as char) {
                    return false;
                }
                while p < bytes.len() && is_ident_char(bytes[p] as char) {
                    p += 1;
                }
                skip_ws(&mut p);
                if p < bytes.len() && bytes[p] == b',' {
                    p += 1;
                    skip_ws(&mut p);
                    continue;
                }
                break;
            }
        }
        if p >= bytes.len() || bytes[p] != b')' {
            return false;
        }
        p += 1;
        skip_ws(&mut p);
        self.input[p..].starts_with("=>")
    }

    fn skip_trivia(&mut self) {
        loop {
            while !self.eof() && self.current_char().is_whitespace() {
                self.advance(1);
            }
            if self.starts_with("//") {
                while !self.eof() && self.current_char() != '\n' {
                    self.advance(1);
                }
                continue;
            }
            if self.starts_with("/*") {
                self.advance(2);
                while !self.eof() && !self.starts_with("*/") {
                    self.advance(1);
                }
                if !self.eof() {
                    self.advance(2);
                }
                continue;
            }
            break;
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), CompileError> {
        if self.starts_with(s) {
            self.advance(s.len());
            Ok(())
        } else {
            Err(self.err(&format!("expected `{s}`")))
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn starts_with_word(&self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }
        match self.input[self.pos + word.len()..].chars().next() {
            Some(c) => !is_ident_char(c),
            None => true,
        }
    }

    fn advance_over(&mut self, word: &str) {
        self.advance(word.len());
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }

    fn err(&self, message: &str) -> CompileError {
        let consumed = &self.input[..self.pos.min(self.input.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.chars().rev().take_while(|&c| c != '\n').count() + 1;
        CompileError {
            message: message.to_string(),
            line,
            column,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
}

/// JSX whitespace handling: whitespace runs touching a line break are
/// removed at the edges of a text run and collapse to a single space inside
/// it; same-line whitespace collapses to one space.
fn normalize_jsx_text(raw: &str) -> Option<String> {
    let mut out = String::new();
    let mut ws_run = String::new();
    for c in raw.chars() {
        if c.is_whitespace() {
            ws_run.push(c);
        } else {
            if !ws_run.is_empty() {
                if !out.is_empty() || !ws_run.contains('\n') {
                    out.push(' ');
                }
                ws_run.clear();
            }
            out.push(c);
        }
    }
    if !ws_run.is_empty() && !out.is_empty() && !ws_run.contains('\n') {
        out.push(' ');
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_minimal_template() {
        let compiled =
            compile("function Template(props) { return <div>{props.title}</div>; }").unwrap();
        let def = compiled.view(ENTRY_VIEW).unwrap();
        assert_eq!(def.params, vec!["props"]);
    }

    #[test]
    fn compile_arrow_definition() {
        let compiled = compile("const Template = (props) => <p>hi</p>;").unwrap();
        assert!(compiled.view(ENTRY_VIEW).is_some());
    }

    #[test]
    fn empty_source_is_an_error() {
        assert!(compile("").is_err());
        assert!(compile("   \n  // just a comment\n").is_err());
    }

    #[test]
    fn missing_template_view_is_an_error() {
        let err = compile("function Header(props) { return <h1>x</h1>; }").unwrap_err();
        assert!(err.message.contains("no `Template` view"));
    }

    #[test]
    fn duplicate_definitions_are_an_error() {
        let src = "function Template(p) { return <p>a</p>; }\n\
                   function Template(p) { return <p>b</p>; }";
        let err = compile(src).unwrap_err();
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn unbalanced_tag_is_an_error() {
        let err = compile("function Template(p) { return <div><p>hi</div>; }").unwrap_err();
        assert!(err.message.contains("mismatched closing tag"));
    }

    #[test]
    fn unterminated_element_is_an_error() {
        let err = compile("function Template(p) { return <div>hi").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn body_without_return_is_an_error() {
        let err = compile("function Template(p) { const x = 1; }").unwrap_err();
        assert!(err.message.contains("no `return`"));
    }

    #[test]
    fn jsx_attributes_parse() {
        let compiled = compile(
            r#"function Template(p) {
                return <div className="p-4" hidden style={{color: "red"}}>x</div>;
            }"#,
        )
        .unwrap();
        let def = compiled.view(ENTRY_VIEW).unwrap();
        let FnBody::Block(stmts) = &def.body else {
            panic!("expected block body");
        };
        let Stmt::Return(Expr::Jsx(node)) = &stmts[0] else {
            panic!("expected a jsx return");
        };
        assert_eq!(node.tag, "div");
        assert_eq!(node.attrs[0], ("className".into(), JsxAttr::Lit("p-4".into())));
        assert_eq!(node.attrs[1], ("hidden".into(), JsxAttr::Bare));
        assert!(matches!(node.attrs[2].1, JsxAttr::Expr(Expr::Object(_))));
    }

    #[test]
    fn jsx_text_whitespace_collapses() {
        assert_eq!(normalize_jsx_text(" Hello "), Some(" Hello ".into()));
        assert_eq!(normalize_jsx_text("\n  indented\n"), Some("indented".into()));
        assert_eq!(
            normalize_jsx_text("grew by \n  23%"),
            Some("grew by 23%".into())
        );
        assert_eq!(normalize_jsx_text("\n   \n"), None);
    }

    #[test]
    fn comments_are_trivia() {
        let src = "// header\nfunction Template(p) { /* body */ return <p>x</p>; }";
        assert!(compile(src).is_ok());
    }

    #[test]
    fn error_positions_point_into_the_source() {
        let err = compile("function Template(p) {\n  return <div<;\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.column > 1);
    }
}
