//! A compilation service for a small C#-flavored script language.
//!
//! Enough of the language to exercise the bridge end to end: `using`
//! directives, namespaces, classes, methods taking one `object`, `dynamic` or
//! `IDictionary<string,object>` argument and returning `object` or
//! `Task<object>`, string concatenation, member paths, indexers, casts,
//! `ToString()`, `throw`, `var` locals and `await Task.Delay(n)`.
//!
//! Referencing `System.Data.dll` makes `using System.Data;` and the
//! `SqlDbType` enum available; without it both fail to compile.
//!
//! Diagnostics follow the `(line,col): error CSxxxx: message` shape.

mod ast;
mod interp;
mod lexer;
mod parser;

use std::sync::Arc;

use tandem_bridge::{
    CompileRequest, CompiledUnit, Compiler, Diagnostic, GuestCall, GuestType, MethodHandle,
    ReturnKind,
};
use tracing::debug;

/// Assemblies the compiler can resolve.
const KNOWN_REFERENCES: [&str; 7] = [
    "mscorlib",
    "System",
    "System.Core",
    "System.Data",
    "System.Collections",
    "System.Runtime",
    "Microsoft.CSharp",
];

/// Compiles script source into executable units.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    /// Create a compiler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn assembly_name(reference: &str) -> &str {
    let file = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
    file.strip_suffix(".dll")
        .or_else(|| file.strip_suffix(".DLL"))
        .unwrap_or(file)
}

impl Compiler for ScriptCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, Diagnostic> {
        let mut system_data = false;
        for reference in &request.references {
            let name = assembly_name(reference);
            if !KNOWN_REFERENCES.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                return Err(Diagnostic::new(format!(
                    "error CS0006: Metadata file '{reference}' could not be found"
                )));
            }
            system_data |= name.eq_ignore_ascii_case("System.Data");
        }

        let tokens = lexer::tokenize(&request.source)?;
        let classes = parser::parse(tokens, system_data)?;

        let mut unit = CompiledUnit::new();
        for class in classes {
            let mut guest_type = GuestType::new(class.full_name.as_str());
            for method in class.methods {
                // Only single-argument methods can be bound.
                let [(param_type, _)] = method.params.as_slice() else {
                    continue;
                };
                let param = param_type.param_kind();
                let returns = method.return_kind();
                let body = Arc::new(method.body);
                guest_type.add_method(MethodHandle::new(
                    method.name,
                    param,
                    returns,
                    move |input| {
                        let body = Arc::clone(&body);
                        match returns {
                            ReturnKind::Deferred => GuestCall::pending(async move {
                                interp::execute(&body, input).await
                            }),
                            ReturnKind::Value => GuestCall::ready(futures::executor::block_on(
                                interp::execute(&body, input),
                            )),
                        }
                    },
                ));
            }
            debug!(type_name = %guest_type.name, "compiled script type");
            unit.add_type(guest_type);
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use tandem_bridge::{GuestValue, ParamKind};

    use super::*;

    fn compile(source: &str, references: &[&str]) -> Result<CompiledUnit, Diagnostic> {
        ScriptCompiler.compile(&CompileRequest::new(
            source,
            references.iter().map(|r| (*r).to_owned()).collect(),
        ))
    }

    #[tokio::test]
    async fn test_compile_and_call() {
        let unit = compile(
            "using System.Threading.Tasks;\npublic class Startup { public async Task<object> Invoke(object input) { return \"Hello, \" + input.ToString(); } }",
            &[],
        )
        .unwrap();
        let method = unit.find_type("Startup").unwrap().method("Invoke").unwrap();
        assert!(method.is_deferred());
        assert_eq!(method.param, ParamKind::Object);
        let GuestCall::Pending(future) = method.call(GuestValue::from("JavaScript")) else {
            panic!("async method should be pending");
        };
        assert_eq!(future.await.unwrap(), GuestValue::from("Hello, JavaScript"));
    }

    #[test]
    fn test_sync_method_is_ready() {
        let unit = compile(
            "public class Startup { public object Invoke(dynamic input) { return input.text + \" works\"; } }",
            &[],
        )
        .unwrap();
        let method = unit.find_type("Startup").unwrap().method("Invoke").unwrap();
        assert_eq!(method.param, ParamKind::Dynamic);
        let input = GuestValue::Dynamic(
            [("text".to_owned(), GuestValue::from("Dynamic"))]
                .into_iter()
                .collect(),
        );
        let GuestCall::Ready(result) = method.call(input) else {
            panic!("sync method should be ready");
        };
        assert_eq!(result.unwrap(), GuestValue::from("Dynamic works"));
    }

    #[test]
    fn test_multi_argument_methods_are_not_bound() {
        let unit = compile(
            "public class Startup { public object Invoke(object a, object b) { return a; } }",
            &[],
        )
        .unwrap();
        assert!(unit.find_type("Startup").unwrap().method("Invoke").is_none());
    }

    #[test]
    fn test_references() {
        assert_eq!(assembly_name("System.Data.dll"), "System.Data");
        assert_eq!(assembly_name("/opt/lib/System.Data.dll"), "System.Data");
        let err = compile("", &["Missing.dll"]).unwrap_err();
        assert_eq!(
            err.message,
            "error CS0006: Metadata file 'Missing.dll' could not be found"
        );
        assert!(compile("using System.Data;", &["System.Data.dll"]).is_ok());
        assert!(compile("using System.Data;", &[]).is_err());
    }
}
