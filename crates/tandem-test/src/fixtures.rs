//! Guest source fixtures.
//!
//! Each greeter fixture returns `"Hello, " + input` for the default entry
//! point `Startup.Invoke` unless noted otherwise.

use std::path::{Path, PathBuf};

/// Asynchronous greeter lambda.
pub const ASYNC_LAMBDA: &str = r#"async (input) => "Hello, " + input.ToString();"#;

/// Synchronous greeter lambda.
pub const SYNC_LAMBDA: &str = r#"(input) => "Hello, " + input.ToString()"#;

/// Asynchronous greeter lambda with a block body.
pub const BLOCK_LAMBDA: &str = r#"async (input) => {
    var greeting = "Hello, ";
    return greeting + input.ToString();
}"#;

/// Greeter class at the default entry point.
pub const STARTUP_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        return "Hello, " + input.ToString();
    }
}
"#;

/// Synchronous greeter class at the default entry point.
pub const SYNC_STARTUP_CLASS: &str = r#"public class Startup
{
    public object Invoke(object input)
    {
        return "Hello, " + input.ToString();
    }
}
"#;

/// Greeter at `Foo.Bar.InvokeMe`.
pub const CUSTOM_ENTRY_CLASS: &str = r#"using System.Threading.Tasks;

namespace Foo
{
    public class Bar
    {
        public async Task<object> InvokeMe(object input)
        {
            return "Hello, " + input.ToString();
        }
    }
}
"#;

/// Class that does not compile: `class` is misspelled.
pub const MALFORMED_CLASS: &str = r#"using System.Threading.Tasks;

public clss Startup
{
    public async Task<object> Invoke(object input)
    {
        return "Hello, " + input.ToString();
    }
}
"#;

/// Lambda that does not compile: a statement is missing its semicolon.
pub const MALFORMED_LAMBDA: &str = r#"async (input) => { return "Hello, " + input.ToString() }"#;

/// `Startup` without an `Invoke` method.
pub const MISSING_INVOKE_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke_Foo(object input)
    {
        return "Hello, " + input.ToString();
    }
}
"#;

/// `Invoke` on a type other than `Startup`.
pub const MISSING_STARTUP_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup_Foo
{
    public async Task<object> Invoke(object input)
    {
        return "Hello, " + input.ToString();
    }
}
"#;

/// Class that only compiles with `System.Data.dll`, referenced through the
/// commented directive form. Returns `input + " is Real"`.
pub const SYSTEM_DATA_CLASS_COMMENTED: &str = r#"//#r "System.Data.dll"

using System.Data;
using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        return input.ToString() + " is " + SqlDbType.Real.ToString();
    }
}
"#;

/// As [`SYSTEM_DATA_CLASS_COMMENTED`] with the bare directive form.
pub const SYSTEM_DATA_CLASS_BARE: &str = r#"#r "System.Data.dll"

using System.Data;
using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        return input.ToString() + " is " + SqlDbType.Real.ToString();
    }
}
"#;

/// As [`SYSTEM_DATA_CLASS_COMMENTED`] without any directive.
pub const SYSTEM_DATA_CLASS_UNREFERENCED: &str = r#"using System.Data;
using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        return input.ToString() + " is " + SqlDbType.Real.ToString();
    }
}
"#;

/// Lambda that only compiles with `System.Data.dll`, commented directive.
pub const SYSTEM_DATA_LAMBDA_COMMENTED: &str = r#"//#r "System.Data.dll"
using System.Data;

async (input) => input.ToString() + " is " + SqlDbType.Real.ToString();
"#;

/// As [`SYSTEM_DATA_LAMBDA_COMMENTED`] with the bare directive form.
pub const SYSTEM_DATA_LAMBDA_BARE: &str = r#"#r "System.Data.dll"
using System.Data;

async (input) => input.ToString() + " is " + SqlDbType.Real.ToString();
"#;

/// Reads `input.nested.text` through a dynamic parameter.
pub const DYNAMIC_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(dynamic input)
    {
        return input.nested.text + " works";
    }
}
"#;

/// Reads `input["nested"]["text"]` through a dictionary parameter.
pub const DICTIONARY_CLASS: &str = r#"using System.Collections.Generic;
using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(IDictionary<string,object> input)
    {
        return ((IDictionary<string,object>)input["nested"])["text"] + " works";
    }
}
"#;

/// Reads `input.nested.text` through a dynamic lambda parameter.
pub const DYNAMIC_LAMBDA: &str = r#"async (dynamic input) => input.nested.text + " works""#;

/// Throws `System.Exception("Test error")` when invoked.
pub const THROWING_CLASS: &str = r#"using System;
using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        throw new Exception("Test error");
    }
}
"#;

/// Synchronous method that throws `System.InvalidOperationException`.
pub const THROWING_SYNC_CLASS: &str = r#"using System;

public class Startup
{
    public object Invoke(object input)
    {
        throw new InvalidOperationException("Sync error");
    }
}
"#;

/// Waits 50 ms, then greets.
pub const DELAYED_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        await Task.Delay(50);
        return "Hello, " + input.ToString();
    }
}
"#;

/// Returns a guest object with no host mapping.
pub const OPAQUE_RESULT_CLASS: &str = r#"using System.Threading.Tasks;

public class Startup
{
    public async Task<object> Invoke(object input)
    {
        return new object();
    }
}
"#;

/// Returns its input unchanged.
pub const ECHO_LAMBDA: &str = "async (input) => input";

/// A host function's textual form carrying `source` in its comment body.
#[must_use]
pub fn embedded(source: &str) -> String {
    format!("function () {{/*\n{source}\n*/}}")
}

/// Write `text` to `dir/name` and return the path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
#[allow(clippy::expect_used)]
pub fn write_source_file(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("failed to write source fixture");
    path
}

/// A temporary directory for source fixtures.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
#[allow(clippy::expect_used)]
pub fn source_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create source fixture directory")
}
