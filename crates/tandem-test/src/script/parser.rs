//! Recursive-descent parser for the script language.
//!
//! Grammar, informally:
//!
//! ```text
//! unit      := (using | namespace | class)*
//! using     := "using" qname ";"
//! namespace := "namespace" qname "{" (using | namespace | class)* "}"
//! class     := modifier* "class" ident "{" method* "}"
//! method    := modifier* "async"? type ident "(" params ")" block
//! stmt      := "return" expr? ";" | "throw" "new" qname "(" expr? ")" ";"
//!            | "await" expr ";" | "var" ident "=" expr ";" | expr ";"
//! expr      := unary ("+" unary)*
//! unary     := "(" type ")" unary | postfix
//! postfix   := primary ("." ident args? | "[" expr "]")*
//! ```

use std::collections::HashSet;

use tandem_bridge::{Diagnostic, GuestValue};

use super::ast::{Class, Expr, Method, Stmt, TypeRef};
use super::lexer::{Tok, Token, diagnostic};

const MODIFIERS: [&str; 8] = [
    "public",
    "private",
    "protected",
    "internal",
    "static",
    "sealed",
    "override",
    "virtual",
];

const NAMESPACES: [&str; 8] = [
    "System",
    "System.Collections.Generic",
    "System.Dynamic",
    "System.IO",
    "System.Linq",
    "System.Text",
    "System.Threading",
    "System.Threading.Tasks",
];

const EXCEPTIONS: [&str; 8] = [
    "Exception",
    "ArgumentException",
    "ArgumentNullException",
    "InvalidOperationException",
    "NotImplementedException",
    "NotSupportedException",
    "TimeoutException",
    "ApplicationException",
];

/// Members of `System.Data.SqlDbType`.
const SQL_DB_TYPES: [&str; 31] = [
    "BigInt",
    "Binary",
    "Bit",
    "Char",
    "DateTime",
    "Decimal",
    "Float",
    "Image",
    "Int",
    "Money",
    "NChar",
    "NText",
    "NVarChar",
    "Real",
    "UniqueIdentifier",
    "SmallDateTime",
    "SmallInt",
    "SmallMoney",
    "Text",
    "Timestamp",
    "TinyInt",
    "VarBinary",
    "VarChar",
    "Variant",
    "Xml",
    "Udt",
    "Structured",
    "Date",
    "Time",
    "DateTime2",
    "DateTimeOffset",
];

#[derive(Default)]
struct Scope {
    param: Option<String>,
    locals: HashSet<String>,
    is_async: bool,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    system_data: bool,
    usings: HashSet<String>,
    scope: Scope,
}

type PResult<T> = Result<T, Diagnostic>;

/// Parse a compilation unit. `system_data` says whether `System.Data.dll`
/// is referenced.
pub(crate) fn parse(tokens: Vec<Token>, system_data: bool) -> PResult<Vec<Class>> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        system_data,
        usings: HashSet::new(),
        scope: Scope::default(),
    };
    let mut classes = Vec::new();
    parser.parse_declarations(&[], false, &mut classes)?;
    Ok(classes)
}

impl Parser {
    // ----- token helpers -----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Punct(p), .. }) if *p == punct)
    }

    fn is_ident(&self, ident: &str) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Ident(s), .. }) if s == ident)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, ident: &str) -> bool {
        if self.is_ident(ident) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Position of the current token, or just past the last one.
    fn here(&self) -> (usize, usize) {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(token) if self.pos < self.tokens.len() => (token.line, token.col),
            Some(token) => (
                token.line,
                token.col.saturating_add(token.tok.to_string().len()),
            ),
            None => (1, 1),
        }
    }

    fn error_here(&self, code: &str, message: &str) -> Diagnostic {
        let (line, col) = self.here();
        diagnostic(line, col, code, message)
    }

    fn expect_punct(&mut self, punct: &'static str) -> PResult<()> {
        if self.eat_punct(punct) {
            return Ok(());
        }
        Err(match punct {
            ";" => self.error_here("CS1002", "; expected"),
            "{" => self.error_here("CS1514", "{ expected"),
            "}" => self.error_here("CS1513", "} expected"),
            ")" => self.error_here("CS1026", ") expected"),
            _ => self.error_here("CS1003", &format!("Syntax error, '{punct}' expected")),
        })
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.peek() {
            Some(Token {
                tok: Tok::Ident(s), ..
            }) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            },
            _ => Err(self.error_here("CS1001", "Identifier expected")),
        }
    }

    fn qualified_name(&mut self) -> PResult<String> {
        let mut name = self.expect_ident()?;
        while self.is_punct(".") {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    // ----- declarations -----

    fn parse_declarations(
        &mut self,
        namespace: &[String],
        braced: bool,
        classes: &mut Vec<Class>,
    ) -> PResult<()> {
        loop {
            if self.peek().is_none() {
                if braced {
                    return Err(self.error_here("CS1513", "} expected"));
                }
                return Ok(());
            }
            if braced && self.eat_punct("}") {
                return Ok(());
            }
            if self.is_ident("using") {
                self.parse_using()?;
                continue;
            }
            if self.eat_ident("namespace") {
                let name = self.qualified_name()?;
                self.expect_punct("{")?;
                let mut nested = namespace.to_vec();
                nested.push(name);
                self.parse_declarations(&nested, true, classes)?;
                continue;
            }

            while MODIFIERS.iter().any(|m| self.is_ident(m)) {
                self.bump();
            }
            if !self.eat_ident("class") {
                return Err(self.unexpected_declaration());
            }
            let class = self.parse_class(namespace)?;
            if classes.iter().any(|c| c.full_name == class.full_name) {
                let ns = if namespace.is_empty() {
                    "<global namespace>".to_owned()
                } else {
                    namespace.join(".")
                };
                let (line, col) = self.here();
                return Err(diagnostic(
                    line,
                    col,
                    "CS0101",
                    &format!(
                        "The namespace '{ns}' already contains a definition for '{}'",
                        class.full_name.rsplit('.').next().unwrap_or(&class.full_name)
                    ),
                ));
            }
            classes.push(class);
        }
    }

    /// Something other than a type declaration at namespace level. A stray
    /// lambda arrow is reported as such.
    fn unexpected_declaration(&self) -> Diagnostic {
        let arrow = self.tokens[self.pos..]
            .iter()
            .find(|t| t.tok == Tok::Punct("=>"));
        match arrow {
            Some(token) => diagnostic(
                token.line,
                token.col,
                "CS1525",
                "Invalid expression term '=>'",
            ),
            None => self.error_here(
                "CS1518",
                "Expected class, delegate, enum, interface, or struct",
            ),
        }
    }

    fn parse_using(&mut self) -> PResult<()> {
        self.bump();
        let (line, col) = self.here();
        let name = self.qualified_name()?;
        self.expect_punct(";")?;

        let known = NAMESPACES.contains(&name.as_str())
            || (name == "System.Data" && self.system_data);
        if known {
            self.usings.insert(name);
            return Ok(());
        }
        let err = match name.strip_prefix("System.") {
            Some(rest) => {
                let segment = rest.split('.').next().unwrap_or(rest);
                diagnostic(
                    line,
                    col,
                    "CS0234",
                    &format!(
                        "The type or namespace name '{segment}' does not exist in the namespace 'System' (are you missing an assembly reference?)"
                    ),
                )
            },
            None => diagnostic(
                line,
                col,
                "CS0246",
                &format!(
                    "The type or namespace name '{name}' could not be found (are you missing a using directive or an assembly reference?)"
                ),
            ),
        };
        Err(err)
    }

    fn parse_class(&mut self, namespace: &[String]) -> PResult<Class> {
        let name = self.expect_ident()?;
        let full_name = if namespace.is_empty() {
            name
        } else {
            format!("{}.{name}", namespace.join("."))
        };
        self.expect_punct("{")?;

        let mut methods = Vec::new();
        loop {
            if self.eat_punct("}") {
                break;
            }
            if self.peek().is_none() {
                return Err(self.error_here("CS1513", "} expected"));
            }
            methods.push(self.parse_method(&full_name)?);
        }
        Ok(Class { full_name, methods })
    }

    fn invalid_member_token(&self) -> Diagnostic {
        let token = self
            .peek()
            .map_or_else(String::new, |t| t.tok.to_string());
        self.error_here(
            "CS1519",
            &format!("Invalid token '{token}' in class, record, struct, or interface member declaration"),
        )
    }

    fn parse_method(&mut self, class_name: &str) -> PResult<Method> {
        while MODIFIERS.iter().any(|m| self.is_ident(m)) {
            self.bump();
        }
        let is_async = self.eat_ident("async");
        if !matches!(self.peek(), Some(Token { tok: Tok::Ident(_), .. })) {
            return Err(self.invalid_member_token());
        }

        let (line, col) = self.here();
        let returns = self.parse_type()?;
        self.check_type(&returns, line, col)?;
        if is_async && !returns.is_task() && !returns.is_void() {
            return Err(diagnostic(
                line,
                col,
                "CS1983",
                "The return type of an async method must be void, Task or Task<T>",
            ));
        }

        let name = self.expect_ident()?;
        if !self.is_punct("(") {
            return Err(self.invalid_member_token());
        }
        let params = self.parse_params()?;

        self.scope = Scope {
            param: params.first().map(|(_, name)| name.clone()),
            locals: params.iter().skip(1).map(|(_, n)| n.clone()).collect(),
            is_async,
        };
        let body = self.parse_block()?;

        let method = Method {
            name,
            params,
            returns,
            is_async,
            body,
        };
        self.check_return_paths(class_name, &method)?;
        Ok(method)
    }

    fn parse_params(&mut self) -> PResult<Vec<(TypeRef, String)>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        loop {
            let (line, col) = self.here();
            let ty = self.parse_type()?;
            self.check_type(&ty, line, col)?;
            let name = self.expect_ident()?;
            params.push((ty, name));
            if self.eat_punct(")") {
                return Ok(params);
            }
            self.expect_punct(",")?;
        }
    }

    fn check_return_paths(&self, class_name: &str, method: &Method) -> PResult<()> {
        let returns_value = !method.returns.is_void()
            && !(method.returns.is_task() && method.returns.args.is_empty());
        let terminated = matches!(
            method.body.last(),
            Some(Stmt::Return(_) | Stmt::Throw { .. })
        );
        if returns_value && !terminated {
            let params = method
                .params
                .iter()
                .map(|(ty, _)| ty.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let (line, col) = self.here();
            return Err(diagnostic(
                line,
                col,
                "CS0161",
                &format!(
                    "'{class_name}.{}({params})': not all code paths return a value",
                    method.name
                ),
            ));
        }
        Ok(())
    }

    // ----- types -----

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let name = self.qualified_name()?;
        let mut args = Vec::new();
        if self.eat_punct("<") {
            loop {
                args.push(self.parse_type()?);
                if self.eat_punct(">") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        Ok(TypeRef { name, args })
    }

    /// Whether the type is visible given the current usings.
    fn check_type(&self, ty: &TypeRef, line: usize, col: usize) -> PResult<()> {
        for arg in &ty.args {
            self.check_type(arg, line, col)?;
        }
        let not_found = || {
            diagnostic(
                line,
                col,
                "CS0246",
                &format!(
                    "The type or namespace name '{}' could not be found (are you missing a using directive or an assembly reference?)",
                    ty.arity_name()
                ),
            )
        };
        if ty.name.contains('.') {
            return if ty.name.starts_with("System.") {
                Ok(())
            } else {
                Err(not_found())
            };
        }
        let required = match (ty.name.as_str(), ty.args.len()) {
            (
                "object" | "string" | "dynamic" | "int" | "long" | "bool" | "double" | "char"
                | "byte" | "void",
                0,
            ) => None,
            ("Task", 0 | 1) => Some("System.Threading.Tasks"),
            ("IDictionary" | "Dictionary", 2) | ("List" | "IList" | "IEnumerable", 1) => {
                Some("System.Collections.Generic")
            },
            ("Object" | "String" | "Int32" | "Int64" | "Boolean" | "Double" | "Guid", 0) => {
                Some("System")
            },
            ("SqlDbType", 0) => Some("System.Data"),
            (name, 0) if EXCEPTIONS.contains(&name) => Some("System"),
            _ => return Err(not_found()),
        };
        match required {
            Some(ns) if !self.usings.contains(ns) => Err(not_found()),
            _ => Ok(()),
        }
    }

    // ----- statements -----

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(body);
            }
            if self.peek().is_none() {
                return Err(self.error_here("CS1513", "} expected"));
            }
            body.push(self.parse_stmt()?);
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        if self.eat_ident("return") {
            if self.eat_punct(";") {
                return Ok(Stmt::Return(None));
            }
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Return(Some(expr)));
        }

        if self.eat_ident("throw") {
            if !self.eat_ident("new") {
                return Err(self.error_here("CS1525", "Invalid expression term 'throw'"));
            }
            let (line, col) = self.here();
            let ty = self.parse_type()?;
            self.check_type(&ty, line, col)?;
            let type_name = if ty.name.contains('.') {
                ty.name
            } else {
                format!("System.{}", ty.name)
            };
            self.expect_punct("(")?;
            let message = if self.is_punct(")") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(Stmt::Throw { type_name, message });
        }

        if self.is_ident("await") {
            if !self.scope.is_async {
                return Err(self.error_here(
                    "CS4032",
                    "The 'await' operator can only be used within an async method.",
                ));
            }
            self.bump();
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Await(expr));
        }

        if self.eat_ident("var") {
            let name = self.expect_ident()?;
            self.expect_punct("=")?;
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            self.scope.locals.insert(name.clone());
            return Ok(Stmt::Let(name, expr));
        }

        let expr = self.parse_expr()?;
        self.expect_punct(";")?;
        Ok(Stmt::Expr(expr))
    }

    // ----- expressions -----

    fn parse_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat_punct("+") {
            let rhs = self.parse_unary()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if let Some((ty, line, col)) = self.try_cast_prefix() {
            self.check_type(&ty, line, col)?;
            let operand = self.parse_unary()?;
            return Ok(Expr::Cast(ty, Box::new(operand)));
        }
        self.parse_postfix()
    }

    /// `( type )` followed by the start of an operand. Restores the position
    /// if the parenthesis is not a cast.
    fn try_cast_prefix(&mut self) -> Option<(TypeRef, usize, usize)> {
        if !self.is_punct("(") {
            return None;
        }
        let start = self.pos;
        self.bump();
        let (line, col) = self.here();
        let is_cast = match self.parse_type() {
            Ok(ty) if self.eat_punct(")") => {
                let operand_follows = matches!(
                    self.peek(),
                    Some(Token {
                        tok: Tok::Ident(_) | Tok::Str(_) | Tok::Int(_) | Tok::Punct("("),
                        ..
                    })
                );
                operand_follows.then_some(ty)
            },
            _ => None,
        };
        if is_cast.is_none() {
            self.pos = start;
        }
        is_cast.map(|ty| (ty, line, col))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                if self.is_punct("(") {
                    let args = self.parse_args()?;
                    expr = Expr::Call(Box::new(expr), name, args);
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let (line, col) = self.here();
        let Some(token) = self.bump() else {
            return Err(diagnostic(line, col, "CS1733", "Expected expression"));
        };
        let ident = match token.tok {
            Tok::Str(s) => return Ok(Expr::Const(GuestValue::String(s))),
            Tok::Int(n) => {
                return Ok(Expr::Const(
                    i32::try_from(n).map_or(GuestValue::Long(n), GuestValue::Int),
                ));
            },
            Tok::Punct("(") => {
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                return Ok(expr);
            },
            Tok::Punct(p) => {
                return Err(diagnostic(
                    line,
                    col,
                    "CS1525",
                    &format!("Invalid expression term '{p}'"),
                ));
            },
            Tok::Ident(ident) => ident,
        };

        match ident.as_str() {
            "null" => Ok(Expr::Const(GuestValue::Null)),
            "true" => Ok(Expr::Const(GuestValue::Bool(true))),
            "false" => Ok(Expr::Const(GuestValue::Bool(false))),
            "new" => {
                let (line, col) = self.here();
                let ty = self.parse_type()?;
                self.check_type(&ty, line, col)?;
                self.parse_args()?;
                let name = match ty.name.as_str() {
                    "object" | "Object" => "System.Object".to_owned(),
                    other if other.contains('.') => other.to_owned(),
                    other => format!("System.{other}"),
                };
                Ok(Expr::NewObject(name))
            },
            "await" => Err(diagnostic(
                line,
                col,
                "CS1525",
                "Invalid expression term 'await'",
            )),
            "Task" if self.usings.contains("System.Threading.Tasks") => self.parse_task_call(),
            "SqlDbType" if self.usings.contains("System.Data") => {
                self.expect_punct(".")?;
                let (line, col) = self.here();
                let member = self.expect_ident()?;
                if !SQL_DB_TYPES.contains(&member.as_str()) {
                    return Err(diagnostic(
                        line,
                        col,
                        "CS0117",
                        &format!("'SqlDbType' does not contain a definition for '{member}'"),
                    ));
                }
                Ok(Expr::Const(GuestValue::Enum {
                    type_name: "System.Data.SqlDbType".to_owned(),
                    member,
                }))
            },
            name if self.scope.param.as_deref() == Some(name) => Ok(Expr::Param),
            name if self.scope.locals.contains(name) => Ok(Expr::Local(name.to_owned())),
            name => Err(diagnostic(
                line,
                col,
                "CS0103",
                &format!("The name '{name}' does not exist in the current context"),
            )),
        }
    }

    fn parse_task_call(&mut self) -> PResult<Expr> {
        self.expect_punct(".")?;
        let (line, col) = self.here();
        let name = self.expect_ident()?;
        let mut args = self.parse_args()?;
        let (Some(arg), true) = (args.pop(), args.is_empty()) else {
            return Err(diagnostic(
                line,
                col,
                "CS1501",
                &format!("No overload for method '{name}' takes the given number of arguments"),
            ));
        };
        match name.as_str() {
            "FromResult" => Ok(Expr::FromResult(Box::new(arg))),
            "Delay" => Ok(Expr::Delay(Box::new(arg))),
            _ => Err(diagnostic(
                line,
                col,
                "CS0117",
                &format!("'Task' does not contain a definition for '{name}'"),
            )),
        }
    }
}
