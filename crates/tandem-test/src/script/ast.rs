//! Syntax tree of the script language.

use tandem_bridge::{GuestValue, ParamKind, ReturnKind};

/// A type reference such as `IDictionary<string,object>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeRef {
    pub(crate) name: String,
    pub(crate) args: Vec<TypeRef>,
}

impl TypeRef {
    /// Last segment of the name.
    pub(crate) fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub(crate) fn param_kind(&self) -> ParamKind {
        match self.simple_name() {
            "dynamic" => ParamKind::Dynamic,
            "IDictionary" | "Dictionary" => ParamKind::Dictionary,
            _ => ParamKind::Object,
        }
    }

    pub(crate) fn is_task(&self) -> bool {
        self.simple_name() == "Task"
    }

    pub(crate) fn is_void(&self) -> bool {
        self.name == "void"
    }

    /// Display form used in diagnostics, with generic arity only:
    /// `IDictionary<,>`.
    pub(crate) fn arity_name(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, ",".repeat(self.args.len().saturating_sub(1)))
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Const(GuestValue),
    Param,
    Local(String),
    NewObject(String),
    Member(Box<Expr>, String),
    Call(Box<Expr>, String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Cast(TypeRef, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    /// `Task.FromResult(x)`
    FromResult(Box<Expr>),
    /// `Task.Delay(ms)`
    Delay(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Return(Option<Expr>),
    Throw {
        type_name: String,
        message: Option<Expr>,
    },
    Await(Expr),
    Let(String, Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Method {
    pub(crate) name: String,
    pub(crate) params: Vec<(TypeRef, String)>,
    pub(crate) returns: TypeRef,
    pub(crate) is_async: bool,
    pub(crate) body: Vec<Stmt>,
}

impl Method {
    pub(crate) fn return_kind(&self) -> ReturnKind {
        if self.is_async || self.returns.is_task() {
            ReturnKind::Deferred
        } else {
            ReturnKind::Value
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Class {
    pub(crate) full_name: String,
    pub(crate) methods: Vec<Method>,
}
