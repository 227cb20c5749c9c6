//! Sandboxed template evaluation.
//!
//! A strict tree-walking interpreter over the compiled AST. The evaluation
//! scope contains exactly one ambient binding (the props value bound to the
//! view's first parameter) plus whatever the template itself defines. There
//! is no file-system, network, process, environment, or clock capability:
//! any identifier the template did not bind (`process`, `require`, `fetch`,
//! …) is an [`RenderError::UnknownBinding`]. Step and depth budgets bound
//! what untrusted input can make the interpreter do.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::ast::*;
use crate::compiler::ENTRY_VIEW;
use crate::element::{fmt_number, AttrValue, Element, ElementNode};
use crate::error::RenderError;

/// Upper bound on evaluation steps for a single render.
const MAX_OPS: usize = 200_000;
/// Upper bound on view/closure call depth and element nesting.
const MAX_DEPTH: usize = 64;

/// Evaluate a compiled template's `Template` view against a props value and
/// return the resulting element tree.
pub fn evaluate(template: &CompiledTemplate, props: &Json) -> Result<Element, RenderError> {
    let entry = template
        .view(ENTRY_VIEW)
        .ok_or_else(|| RenderError::UnknownView(ENTRY_VIEW.to_string()))?;
    let mut interp = Interpreter {
        template,
        ops: 0,
        depth: 0,
    };
    let root = interp.call_view(entry, Value::from_json(props))?;
    match root {
        Value::Element(element) => Ok(element),
        other => Err(RenderError::Type(format!(
            "`{ENTRY_VIEW}` must return an element, got {}",
            other.kind()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Runtime values
// ---------------------------------------------------------------------------

/// A value during template evaluation. Borrows the AST (`'a`) for closures;
/// everything else is owned.
#[derive(Debug, Clone)]
enum Value<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value<'a>>),
    Object(Vec<(String, Value<'a>)>),
    Element(Element),
    Closure(Closure<'a>),
}

#[derive(Debug, Clone)]
struct Closure<'a> {
    params: &'a [String],
    body: &'a FnBody,
    captured: Vec<(String, Value<'a>)>,
}

impl<'a> Value<'a> {
    fn from_json(json: &Json) -> Value<'a> {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::Str(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
            Value::Element(_) => "an element",
            Value::Closure(_) => "a function",
        }
    }
}

fn truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) | Value::Element(_) | Value::Closure(_) => true,
    }
}

fn display_string(value: &Value<'_>) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => fmt_number(*n),
        Value::Str(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Element(_) => "[element]".to_string(),
        Value::Closure(_) => "[function]".to_string(),
    }
}

/// Strict equality. Primitives compare by value; arrays, objects, elements,
/// and closures compare by identity in JS, so separately built values are
/// never equal.
fn strict_eq(a: &Value<'_>, b: &Value<'_>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

type Scope<'a> = Vec<HashMap<String, Value<'a>>>;

struct Interpreter<'a> {
    template: &'a CompiledTemplate,
    ops: usize,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    fn tick(&mut self) -> Result<(), RenderError> {
        self.ops += 1;
        if self.ops > MAX_OPS {
            return Err(RenderError::BudgetExhausted);
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), RenderError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RenderError::DepthExceeded);
        }
        Ok(())
    }

    fn call_view(
        &mut self,
        def: &'a FnDef,
        props: Value<'a>,
    ) -> Result<Value<'a>, RenderError> {
        self.enter()?;
        let mut frame = HashMap::new();
        let mut params = def.params.iter();
        if let Some(first) = params.next() {
            frame.insert(first.clone(), props);
        }
        for extra in params {
            frame.insert(extra.clone(), Value::Null);
        }
        let mut scope = vec![frame];
        let result = self.eval_body(&def.body, &mut scope);
        self.depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        closure: &Closure<'a>,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, RenderError> {
        self.enter()?;
        let mut frame: HashMap<String, Value<'a>> =
            closure.captured.iter().cloned().collect();
        for (i, param) in closure.params.iter().enumerate() {
            frame.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Null));
        }
        let mut scope = vec![frame];
        let result = self.eval_body(closure.body, &mut scope);
        self.depth -= 1;
        result
    }

    fn eval_body(
        &mut self,
        body: &'a FnBody,
        scope: &mut Scope<'a>,
    ) -> Result<Value<'a>, RenderError> {
        match body {
            FnBody::Expr(expr) => self.eval(expr, scope),
            FnBody::Block(stmts) => {
                for stmt in stmts {
                    match stmt {
                        Stmt::Bind(name, expr) => {
                            let value = self.eval(expr, scope)?;
                            if let Some(frame) = scope.last_mut() {
                                frame.insert(name.clone(), value);
                            }
                        }
                        Stmt::Return(expr) => return self.eval(expr, scope),
                    }
                }
                Ok(Value::Null)
            }
        }
    }

    fn eval(&mut self, expr: &'a Expr, scope: &mut Scope<'a>) -> Result<Value<'a>, RenderError> {
        self.tick()?;
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::TemplateStr(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Lit(s) => out.push_str(s),
                        TemplatePart::Expr(e) => {
                            let value = self.eval(e, scope)?;
                            out.push_str(&display_string(&value));
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Ident(name) => lookup(scope, name)
                .ok_or_else(|| RenderError::UnknownBinding(name.clone())),
            Expr::Member(target, key) => {
                let target = self.eval(target, scope)?;
                member(&target, key)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target, scope)?;
                let index = self.eval(index, scope)?;
                match (&target, &index) {
                    (Value::Null, _) => Err(RenderError::NullAccess("[index]".to_string())),
                    (Value::Array(items), Value::Number(n)) => {
                        if *n < 0.0 {
                            return Ok(Value::Null);
                        }
                        Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Object(_), Value::Str(key)) => member(&target, key),
                    (Value::Str(s), Value::Number(n)) => {
                        if *n < 0.0 {
                            return Ok(Value::Null);
                        }
                        Ok(s.chars()
                            .nth(*n as usize)
                            .map(|c| Value::Str(c.to_string()))
                            .unwrap_or(Value::Null))
                    }
                    _ => Err(RenderError::Type(format!(
                        "cannot index {} with {}",
                        target.kind(),
                        index.kind()
                    ))),
                }
            }
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let target = self.eval(target, scope)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, scope)?);
                }
                self.call_method(target, method, evaluated)
            }
            Expr::Call { callee, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, scope)?);
                }
                match callee.as_str() {
                    "String" => Ok(Value::Str(
                        evaluated.first().map(display_string).unwrap_or_default(),
                    )),
                    _ => match lookup(scope, callee) {
                        Some(Value::Closure(closure)) => self.call_closure(&closure, evaluated),
                        Some(other) => Err(RenderError::Type(format!(
                            "`{callee}` is {}, not a function",
                            other.kind()
                        ))),
                        None => Err(RenderError::UnknownBinding(callee.clone())),
                    },
                }
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(RenderError::Type(format!(
                            "cannot negate {}",
                            other.kind()
                        ))),
                    },
                }
            }
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, scope),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond, scope)?;
                if truthy(&cond) {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Arrow { params, body } => {
                let mut captured: HashMap<String, Value<'a>> = HashMap::new();
                for frame in scope.iter() {
                    for (k, v) in frame {
                        captured.insert(k.clone(), v.clone());
                    }
                }
                Ok(Value::Closure(Closure {
                    params,
                    body,
                    captured: captured.into_iter().collect(),
                }))
            }
            Expr::Object(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push((key.clone(), self.eval(value, scope)?));
                }
                Ok(Value::Object(out))
            }
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, scope)?);
                }
                Ok(Value::Array(out))
            }
            Expr::Jsx(node) => self.eval_jsx(node, scope),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &'a Expr,
        rhs: &'a Expr,
        scope: &mut Scope<'a>,
    ) -> Result<Value<'a>, RenderError> {
        // Logical operators short-circuit and yield an operand, JS-style:
        // `cond && <div/>` is the conditional-render idiom.
        if op == BinaryOp::And {
            let left = self.eval(lhs, scope)?;
            if !truthy(&left) {
                return Ok(left);
            }
            return self.eval(rhs, scope);
        }
        if op == BinaryOp::Or {
            let left = self.eval(lhs, scope)?;
            if truthy(&left) {
                return Ok(left);
            }
            return self.eval(rhs, scope);
        }

        let left = self.eval(lhs, scope)?;
        let right = self.eval(rhs, scope)?;
        match op {
            BinaryOp::Add => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), b) => Ok(Value::Str(a + &display_string(&b))),
                (a, Value::Str(b)) => Ok(Value::Str(display_string(&a) + &b)),
                (a, b) => Err(RenderError::Type(format!(
                    "cannot add {} and {}",
                    a.kind(),
                    b.kind()
                ))),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                        BinaryOp::Sub => a - b,
                        BinaryOp::Mul => a * b,
                        BinaryOp::Div => a / b,
                        _ => a % b,
                    })),
                    _ => Err(RenderError::Type(format!(
                        "arithmetic needs numbers, got {} and {}",
                        left.kind(),
                        right.kind()
                    ))),
                }
            }
            BinaryOp::Eq => Ok(Value::Bool(strict_eq(&left, &right))),
            BinaryOp::Ne => Ok(Value::Bool(!strict_eq(&left, &right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(RenderError::Type(format!(
                            "cannot compare {} and {}",
                            left.kind(),
                            right.kind()
                        )))
                    }
                };
                let result = match (op, ordering) {
                    (_, None) => false,
                    (BinaryOp::Lt, Some(o)) => o.is_lt(),
                    (BinaryOp::Le, Some(o)) => o.is_le(),
                    (BinaryOp::Gt, Some(o)) => o.is_gt(),
                    (_, Some(o)) => o.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            // Short-circuited above.
            BinaryOp::And | BinaryOp::Or => Ok(Value::Null),
        }
    }

    fn call_method(
        &mut self,
        target: Value<'a>,
        method: &str,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, RenderError> {
        match (target, method) {
            (Value::Array(items), "map") => {
                let f = expect_closure(&args, "map")?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.call_closure(&f, vec![item, Value::Number(i as f64)])?);
                }
                Ok(Value::Array(out))
            }
            (Value::Array(items), "filter") => {
                let f = expect_closure(&args, "filter")?;
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let keep =
                        self.call_closure(&f, vec![item.clone(), Value::Number(i as f64)])?;
                    if truthy(&keep) {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            (Value::Array(items), "join") => {
                let sep = match args.first() {
                    Some(Value::Str(s)) => s.clone(),
                    _ => ",".to_string(),
                };
                Ok(Value::Str(
                    items
                        .iter()
                        .map(display_string)
                        .collect::<Vec<_>>()
                        .join(&sep),
                ))
            }
            (Value::Number(n), "toFixed") => {
                let digits = match args.first() {
                    Some(Value::Number(d)) if *d >= 0.0 => (*d as usize).min(10),
                    _ => 0,
                };
                Ok(Value::Str(format!("{n:.digits$}")))
            }
            (Value::Str(s), "toUpperCase") => Ok(Value::Str(s.to_uppercase())),
            (Value::Str(s), "toLowerCase") => Ok(Value::Str(s.to_lowercase())),
            (Value::Str(s), "trim") => Ok(Value::Str(s.trim().to_string())),
            (Value::Null, _) => Err(RenderError::NullAccess(method.to_string())),
            (target, _) => Err(RenderError::Type(format!(
                "no method `{method}` on {}",
                target.kind()
            ))),
        }
    }

    // ── JSX evaluation ─────────────────────────────────────────────────────

    fn eval_jsx(
        &mut self,
        node: &'a JsxNode,
        scope: &mut Scope<'a>,
    ) -> Result<Value<'a>, RenderError> {
        self.tick()?;

        // Capitalized tags reference another view in the same source.
        if node.tag.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            let def = self
                .template
                .view(&node.tag)
                .ok_or_else(|| RenderError::UnknownView(node.tag.clone()))?;
            let mut props = Vec::with_capacity(node.attrs.len() + 1);
            for (name, attr) in &node.attrs {
                let value = self.eval_attr(attr, scope)?;
                props.push((name.clone(), value));
            }
            if !node.children.is_empty() {
                let mut kids = Vec::with_capacity(node.children.len());
                for child in &node.children {
                    match child {
                        JsxChild::Text(s) => kids.push(Value::Str(s.clone())),
                        JsxChild::Expr(e) => kids.push(self.eval(e, scope)?),
                        JsxChild::Node(n) => kids.push(self.eval_jsx(n, scope)?),
                    }
                }
                props.push(("children".to_string(), Value::Array(kids)));
            }
            return self.call_view(def, Value::Object(props));
        }

        let mut element = ElementNode::new(node.tag.clone());
        for (name, attr) in &node.attrs {
            let value = self.eval_attr(attr, scope)?;
            match name.as_str() {
                "style" => match value {
                    Value::Object(pairs) => {
                        let mut styles = Vec::with_capacity(pairs.len());
                        for (prop, v) in pairs {
                            match v {
                                Value::Str(s) => styles.push((prop, s)),
                                Value::Number(n) => styles.push((prop, fmt_number(n))),
                                Value::Null => {}
                                other => {
                                    return Err(RenderError::Type(format!(
                                        "style `{prop}` must be a string or number, got {}",
                                        other.kind()
                                    )))
                                }
                            }
                        }
                        element
                            .attrs
                            .push((name.clone(), AttrValue::Style(styles)));
                    }
                    Value::Null => {}
                    other => {
                        return Err(RenderError::Type(format!(
                            "`style` must be an object, got {}",
                            other.kind()
                        )))
                    }
                },
                "dangerouslySetInnerHTML" => match value {
                    Value::Object(pairs) => {
                        let html = pairs
                            .iter()
                            .find(|(k, _)| k == "__html")
                            .map(|(_, v)| display_string(v))
                            .unwrap_or_default();
                        element.attrs.push((name.clone(), AttrValue::RawHtml(html)));
                    }
                    other => {
                        return Err(RenderError::Type(format!(
                            "`dangerouslySetInnerHTML` must be an object with `__html`, got {}",
                            other.kind()
                        )))
                    }
                },
                _ => match value {
                    Value::Str(s) => element.attrs.push((name.clone(), AttrValue::Text(s))),
                    Value::Number(n) => element.attrs.push((name.clone(), AttrValue::Number(n))),
                    Value::Bool(b) => element.attrs.push((name.clone(), AttrValue::Bool(b))),
                    Value::Null => {}
                    other => {
                        return Err(RenderError::Type(format!(
                            "attribute `{name}` must be a primitive, got {}",
                            other.kind()
                        )))
                    }
                },
            }
        }

        for child in &node.children {
            match child {
                JsxChild::Text(s) => element.children.push(Element::Text(s.clone())),
                JsxChild::Expr(e) => {
                    let value = self.eval(e, scope)?;
                    append_child_value(&mut element, value)?;
                }
                JsxChild::Node(n) => {
                    let value = self.eval_jsx(n, scope)?;
                    append_child_value(&mut element, value)?;
                }
            }
        }

        Ok(Value::Element(Element::Node(element)))
    }

    fn eval_attr(
        &mut self,
        attr: &'a JsxAttr,
        scope: &mut Scope<'a>,
    ) -> Result<Value<'a>, RenderError> {
        match attr {
            JsxAttr::Lit(s) => Ok(Value::Str(s.clone())),
            JsxAttr::Bare => Ok(Value::Bool(true)),
            JsxAttr::Expr(e) => self.eval(e, scope),
        }
    }
}

/// Append an evaluated expression to an element's children. Null and
/// booleans render nothing; arrays flatten; numbers and strings become text.
fn append_child_value<'a>(
    element: &mut ElementNode,
    value: Value<'a>,
) -> Result<(), RenderError> {
    match value {
        Value::Null | Value::Bool(_) => {}
        Value::Str(s) => element.children.push(Element::Text(s)),
        Value::Number(n) => element.children.push(Element::Text(fmt_number(n))),
        Value::Element(e) => element.children.push(e),
        Value::Array(items) => {
            for item in items {
                append_child_value(element, item)?;
            }
        }
        other => {
            return Err(RenderError::Type(format!(
                "{} is not a valid element child",
                other.kind()
            )))
        }
    }
    Ok(())
}

fn member<'a>(target: &Value<'a>, key: &str) -> Result<Value<'a>, RenderError> {
    match target {
        Value::Null => Err(RenderError::NullAccess(key.to_string())),
        Value::Object(pairs) => Ok(pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)),
        Value::Array(items) => {
            if key == "length" {
                Ok(Value::Number(items.len() as f64))
            } else {
                Ok(Value::Null)
            }
        }
        Value::Str(s) => {
            if key == "length" {
                Ok(Value::Number(s.chars().count() as f64))
            } else {
                Ok(Value::Null)
            }
        }
        _ => Ok(Value::Null),
    }
}

fn lookup<'a>(scope: &Scope<'a>, name: &str) -> Option<Value<'a>> {
    for frame in scope.iter().rev() {
        if let Some(value) = frame.get(name) {
            return Some(value.clone());
        }
    }
    None
}

fn expect_closure<'a>(
    args: &[Value<'a>],
    method: &str,
) -> Result<Closure<'a>, RenderError> {
    match args.first() {
        Some(Value::Closure(c)) => Ok(c.clone()),
        _ => Err(RenderError::Type(format!("`{method}` expects a function"))),
    }
}
