//! Tree-walking evaluator for parsed method bodies.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tandem_bridge::{GuestException, GuestResult, GuestValue};

use super::ast::{Expr, Stmt, TypeRef};

const BINDER: &str = "Microsoft.CSharp.RuntimeBinder.RuntimeBinderException";

struct Frame {
    input: GuestValue,
    locals: HashMap<String, GuestValue>,
}

/// Execute `body` with `input` bound to the parameter.
pub(crate) async fn execute(body: &[Stmt], input: GuestValue) -> GuestResult {
    let mut frame = Frame {
        input,
        locals: HashMap::new(),
    };
    for stmt in body {
        match stmt {
            Stmt::Return(None) => return Ok(GuestValue::Null),
            Stmt::Return(Some(expr)) => return eval(expr, &frame),
            Stmt::Throw { type_name, message } => {
                let message = match message {
                    Some(expr) => eval(expr, &frame)?.to_string(),
                    None => format!("Exception of type '{type_name}' was thrown."),
                };
                return Err(GuestException::new(type_name.as_str(), message));
            },
            Stmt::Await(Expr::Delay(ms)) => {
                let ms = delay_millis(&eval(ms, &frame)?)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
            },
            Stmt::Await(expr) | Stmt::Expr(expr) => {
                eval(expr, &frame)?;
            },
            Stmt::Let(name, expr) => {
                let value = eval(expr, &frame)?;
                frame.locals.insert(name.clone(), value);
            },
        }
    }
    Ok(GuestValue::Null)
}

fn delay_millis(value: &GuestValue) -> Result<u64, GuestException> {
    let ms = match value {
        GuestValue::Int(n) => i64::from(*n),
        GuestValue::Long(n) => *n,
        other => {
            return Err(GuestException::new(
                "System.ArgumentException",
                format!("Cannot convert '{}' to a delay", other.type_name()),
            ));
        },
    };
    u64::try_from(ms).map_err(|_| {
        GuestException::new(
            "System.ArgumentOutOfRangeException",
            "The value needs to be either -1 (signifying an infinite timeout), 0 or a positive integer.",
        )
    })
}

fn eval(expr: &Expr, frame: &Frame) -> GuestResult {
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Param => Ok(frame.input.clone()),
        Expr::Local(name) => frame
            .locals
            .get(name)
            .cloned()
            .ok_or_else(|| GuestException::new(BINDER, format!("Use of unassigned local variable '{name}'"))),
        Expr::NewObject(type_name) => Ok(GuestValue::Opaque(type_name.clone())),
        Expr::Member(target, name) => member(eval(target, frame)?, name),
        Expr::Call(target, name, args) => {
            let target = eval(target, frame)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, frame))
                .collect::<Result<Vec<_>, _>>()?;
            call(target, name, &args)
        },
        Expr::Index(target, key) => index(eval(target, frame)?, &eval(key, frame)?),
        Expr::Cast(ty, operand) => cast(ty, eval(operand, frame)?),
        Expr::Add(lhs, rhs) => add(eval(lhs, frame)?, eval(rhs, frame)?),
        Expr::FromResult(inner) => eval(inner, frame),
        Expr::Delay(_) => Ok(GuestValue::Opaque("System.Threading.Tasks.Task".to_owned())),
    }
}

fn null_reference() -> GuestException {
    GuestException::new(
        "System.NullReferenceException",
        "Object reference not set to an instance of an object.",
    )
}

fn clr_name(value: &GuestValue) -> String {
    match value {
        GuestValue::Dynamic(_) => "System.Dynamic.ExpandoObject".to_owned(),
        GuestValue::Dictionary(_) => {
            "System.Collections.Generic.Dictionary<string,object>".to_owned()
        },
        GuestValue::List(_) => "object[]".to_owned(),
        other => other.type_name().to_owned(),
    }
}

fn member(target: GuestValue, name: &str) -> GuestResult {
    if let Some(value) = match &target {
        GuestValue::Dynamic(object) => object.get(name),
        _ => None,
    } {
        return Ok(value.clone());
    }
    match (&target, name) {
        (GuestValue::Null, _) => Err(GuestException::new(
            BINDER,
            "Cannot perform runtime binding on a null reference",
        )),
        (GuestValue::String(s), "Length") => {
            Ok(GuestValue::Int(i32::try_from(s.chars().count()).unwrap_or(i32::MAX)))
        },
        (GuestValue::List(items), "Length" | "Count") => {
            Ok(GuestValue::Int(i32::try_from(items.len()).unwrap_or(i32::MAX)))
        },
        (GuestValue::Dictionary(map), "Count") => {
            Ok(GuestValue::Int(i32::try_from(map.len()).unwrap_or(i32::MAX)))
        },
        _ => Err(GuestException::new(
            BINDER,
            format!(
                "'{}' does not contain a definition for '{name}'",
                clr_name(&target)
            ),
        )),
    }
}

fn call(target: GuestValue, name: &str, args: &[GuestValue]) -> GuestResult {
    match (&target, name, args) {
        (GuestValue::Null, _, _) => Err(null_reference()),
        (_, "ToString", []) => Ok(GuestValue::String(target.to_string())),
        (GuestValue::String(s), "ToUpper", []) => Ok(GuestValue::String(s.to_uppercase())),
        (GuestValue::String(s), "ToLower", []) => Ok(GuestValue::String(s.to_lowercase())),
        _ => Err(GuestException::new(
            BINDER,
            format!(
                "'{}' does not contain a definition for '{name}'",
                clr_name(&target)
            ),
        )),
    }
}

fn index(target: GuestValue, key: &GuestValue) -> GuestResult {
    let missing_key = |k: &str| {
        GuestException::new(
            "System.Collections.Generic.KeyNotFoundException",
            format!("The given key '{k}' was not present in the dictionary."),
        )
    };
    let out_of_range = || {
        GuestException::new(
            "System.ArgumentOutOfRangeException",
            "Index was out of range. Must be non-negative and less than the size of the collection.",
        )
    };

    match (&target, key) {
        (GuestValue::Null, _) => Err(null_reference()),
        (GuestValue::Dictionary(map), GuestValue::String(k)) => {
            map.get(k).cloned().ok_or_else(|| missing_key(k))
        },
        (GuestValue::Dynamic(object), GuestValue::String(k)) => {
            object.get(k).cloned().ok_or_else(|| missing_key(k))
        },
        (GuestValue::List(items), GuestValue::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(out_of_range),
        (GuestValue::String(s), GuestValue::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(GuestValue::Char)
            .ok_or_else(out_of_range),
        _ => Err(GuestException::new(
            BINDER,
            format!(
                "Cannot apply indexing with [] to an expression of type '{}'",
                clr_name(&target)
            ),
        )),
    }
}

fn cast(ty: &TypeRef, value: GuestValue) -> GuestResult {
    let invalid = |value: &GuestValue| {
        GuestException::new(
            "System.InvalidCastException",
            format!(
                "Unable to cast object of type '{}' to type '{ty}'.",
                clr_name(value)
            ),
        )
    };
    match (ty.simple_name(), value) {
        (_, GuestValue::Null) => Ok(GuestValue::Null),
        ("IDictionary" | "Dictionary", value @ GuestValue::Dictionary(_)) => Ok(value),
        ("IDictionary" | "Dictionary", GuestValue::Dynamic(object)) => Ok(GuestValue::Dictionary(
            object.into_members().into_iter().collect::<BTreeMap<_, _>>(),
        )),
        ("IDictionary" | "Dictionary", other) => Err(invalid(&other)),
        ("string" | "String", value @ GuestValue::String(_)) => Ok(value),
        ("string" | "String", other) => Err(invalid(&other)),
        ("int" | "Int32", value @ GuestValue::Int(_)) => Ok(value),
        ("int" | "Int32", other) => Err(invalid(&other)),
        (_, value) => Ok(value),
    }
}

/// `+`: string concatenation if either side is a string, integer addition
/// if both are integers.
fn add(lhs: GuestValue, rhs: GuestValue) -> GuestResult {
    match (&lhs, &rhs) {
        (GuestValue::String(_), _) | (_, GuestValue::String(_)) => {
            Ok(GuestValue::String(format!("{lhs}{rhs}")))
        },
        (GuestValue::Int(a), GuestValue::Int(b)) => Ok(GuestValue::Int(a.wrapping_add(*b))),
        (GuestValue::Int(a), GuestValue::Long(b)) => {
            Ok(GuestValue::Long(i64::from(*a).wrapping_add(*b)))
        },
        (GuestValue::Long(a), GuestValue::Int(b)) => {
            Ok(GuestValue::Long(a.wrapping_add(i64::from(*b))))
        },
        (GuestValue::Long(a), GuestValue::Long(b)) => Ok(GuestValue::Long(a.wrapping_add(*b))),
        _ => Err(GuestException::new(
            BINDER,
            format!(
                "Operator '+' cannot be applied to operands of type '{}' and '{}'",
                clr_name(&lhs),
                clr_name(&rhs)
            ),
        )),
    }
}
