//! Code generation for each target language.
//!
//! The pipeline prepares everything that is target-independent once, in [`Context`]:
//! callback checks, identifier resolution, ABI lowering and type mapping. Emitters only turn
//! that into text, in manifest declaration order, and return a [`Files`] map.
//!
//! # Supported Targets
//!
//! | Target | Files | Callback registry |
//! |--------|-------|-------------------|
//! | C | `pkg.h`, `pkg.c` | static slot array, caller serializes |
//! | C++ | `pkg.hpp` | `std::mutex` |
//! | D | `pkg.d` | `synchronized` |
//! | C# | `Pkg.cs` | `lock` |
//! | Go | `pkg.h`, `pkg.go`, `pkg_export.go` | `sync.Mutex` |
//! | Lua | `pkg.lua` | single-threaded |
//! | Python | `pkg.py` | `threading.Lock` |
//! | Rust | `pkg.rs` | `std::sync::Mutex` |

mod c;
mod cpp;
mod dlang;
mod dotnet;
mod golang;
mod lua;
mod python;
mod rust;

use crate::abi::{self, AbiSignature};
use crate::callbacks;
use crate::classes::ClassModel;
use crate::error::GenResult;
use crate::options::GeneratorOptions;
use crate::symbols::{SignatureNames, Symbols};
use crate::target::Target;
use crate::types::{self, MappedType, Position, Strategy};
use plugify_gen_manifest::{
    CallbackId, ClassAlias, FunctionDescriptor, Package, ParamDescriptor, TypeRef,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Generated files keyed by file name.
pub type Files = BTreeMap<String, String>;

/// Generator version stamped into every file header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything an emitter needs, prepared once per conversion.
pub(crate) struct Context<'a> {
    pub pkg: &'a Package,
    pub target: Target,
    pub symbols: Symbols,
    pub classes: &'a [ClassModel],
    pub slots: usize,
    pub callback_order: Vec<CallbackId>,
    pub function_abi: Vec<AbiSignature>,
    pub callback_abi: Vec<AbiSignature>,
    /// Marshalling strategies used by any function or callback signature.
    pub strategies: BTreeSet<Strategy>,
}

impl<'a> Context<'a> {
    pub fn new(
        pkg: &'a Package,
        classes: &'a [ClassModel],
        target: Target,
        options: &GeneratorOptions,
    ) -> GenResult<Self> {
        callbacks::check(pkg, target)?;
        let symbols = Symbols::resolve(pkg, classes, target)?;

        let mut strategies = BTreeSet::new();
        let mut callback_abi = Vec::with_capacity(pkg.callbacks.len());
        for cb in &pkg.callbacks {
            check_types(&symbols, &cb.params, &cb.ret.ty, &cb.name, &mut strategies)?;
            callback_abi.push(abi::lower(&cb.params, &cb.ret.ty, target, &cb.name)?);
        }
        let mut function_abi = Vec::with_capacity(pkg.functions.len());
        for f in &pkg.functions {
            check_types(&symbols, &f.params, &f.ret.ty, &f.name, &mut strategies)?;
            function_abi.push(abi::lower(&f.params, &f.ret.ty, target, &f.name)?);
        }
        debug!(target = %target, ?strategies, "mapped signatures");

        Ok(Self {
            pkg,
            target,
            symbols,
            classes,
            slots: options.callback_slots,
            callback_order: callbacks::emission_order(pkg),
            function_abi,
            callback_abi,
            strategies,
        })
    }

    /// Whether some signature of the package marshals a value with `strategy`.
    pub fn uses(&self, strategy: Strategy) -> bool {
        self.strategies.contains(&strategy)
    }

    /// Map `ty` for this target. Types were validated in [`Context::new`].
    pub fn map(&self, ty: &TypeRef, by_ref: bool, position: Position) -> GenResult<MappedType> {
        types::map_type(&self.symbols, ty, by_ref, position, &self.pkg.name)
    }

    /// Parameter-passing form of `param`.
    pub fn param_type(&self, param: &ParamDescriptor) -> GenResult<String> {
        Ok(self.map(&param.ty, param.by_ref, Position::Param)?.param)
    }

    /// Declaration form of `ty`, used for returns, fields and sequence elements.
    pub fn decl_type(&self, ty: &TypeRef) -> GenResult<String> {
        Ok(self.map(ty, false, Position::Return)?.decl)
    }

    /// Target-level name of the class an alias refers to.
    pub fn alias_class(&self, alias: ClassAlias) -> &str {
        &self.symbols.classes[alias.class].name
    }

    pub fn module(&self) -> &str {
        &self.symbols.module
    }

    /// Resolver key of `f`.
    pub fn symbol(&self, f: &FunctionDescriptor) -> String {
        format!("{}.{}", self.pkg.name, f.name)
    }

    /// Resolver key of the package's release function.
    pub fn free_symbol(&self) -> String {
        format!("{}.Free", self.pkg.name)
    }

    /// Resolver keys in table order: every function, then `Free` when some function returns
    /// plugin-allocated memory.
    pub fn table_symbols(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pkg.functions.iter().map(|f| self.symbol(f)).collect();
        if self.pkg.needs_free() {
            keys.push(self.free_symbol());
        }
        keys
    }

    /// Table index of the release function.
    pub fn free_index(&self) -> usize {
        self.pkg.functions.len()
    }

    pub fn function_names(&self, index: usize) -> &SignatureNames {
        &self.symbols.functions[index]
    }

    pub fn callback_names(&self, id: CallbackId) -> &SignatureNames {
        &self.symbols.callbacks[id.0]
    }

    /// File header lines, without comment markers.
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Generated by plugify-gen {VERSION} from {} {}. Do not edit.",
            self.pkg.name, self.pkg.version
        )];
        if let Some(description) = &self.pkg.description {
            lines.push(String::new());
            lines.extend(description.lines().map(str::to_string));
        }
        lines
    }

    /// File header as line comments starting with `marker`.
    pub fn header(&self, marker: &str) -> String {
        let mut code = String::new();
        for line in self.header_lines() {
            push_comment_line(&mut code, "", marker, &line);
        }
        code
    }

    /// Description lines of `f`: its doc, then its group and, when `deprecation` is set, its
    /// deprecation note.
    pub fn function_doc(&self, f: &FunctionDescriptor, deprecation: bool) -> Vec<String> {
        let mut lines = doc_lines(f.doc.as_deref());
        if let Some(group) = &f.group {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("Group: {group}"));
        }
        if deprecation && let Some(note) = &f.deprecated {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("Deprecated: {note}"));
        }
        lines
    }
}

/// Map every type of one signature, recording the marshalling strategies it needs.
fn check_types(
    symbols: &Symbols,
    params: &[ParamDescriptor],
    ret: &TypeRef,
    symbol: &str,
    strategies: &mut BTreeSet<Strategy>,
) -> GenResult<()> {
    for p in params {
        strategies.insert(types::map_type(symbols, &p.ty, p.by_ref, Position::Param, symbol)?.strategy);
    }
    if !ret.is_void() {
        strategies.insert(types::map_type(symbols, ret, false, Position::Return, symbol)?.strategy);
    }
    Ok(())
}

/// Split an optional doc string into lines.
pub(crate) fn doc_lines(doc: Option<&str>) -> Vec<String> {
    doc.map(|d| d.lines().map(|l| l.trim_end().to_string()).collect())
        .unwrap_or_default()
}

/// Push `{indent}{marker} {line}`, without trailing whitespace for empty lines.
pub(crate) fn push_comment_line(code: &mut String, indent: &str, marker: &str, line: &str) {
    if line.is_empty() {
        code.push_str(&format!("{indent}{marker}\n"));
    } else {
        code.push_str(&format!("{indent}{marker} {line}\n"));
    }
}

/// Push every line of `lines` as a line comment.
pub(crate) fn push_comment(code: &mut String, indent: &str, marker: &str, lines: &[String]) {
    for line in lines {
        push_comment_line(code, indent, marker, line);
    }
}

/// Text for the inside of a `/* */` comment. A `*/` in `line` would end the comment early.
pub(crate) fn block_comment_text(line: &str) -> String {
    line.replace("*/", "*\\/")
}

/// Push a `/** ... */` block. Nothing is written for an empty doc.
pub(crate) fn push_block_doc(code: &mut String, indent: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    code.push_str(&format!("{indent}/**\n"));
    for line in lines {
        push_comment_line(code, indent, " *", &block_comment_text(line));
    }
    code.push_str(&format!("{indent} */\n"));
}

/// Quote `s` as a double-quoted literal valid in C, C++, C#, D, Go, Lua and Python.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render every file of `pkg` for `target`.
pub fn generate(
    pkg: &Package,
    classes: &[ClassModel],
    target: Target,
    options: &GeneratorOptions,
) -> GenResult<Files> {
    let ctx = Context::new(pkg, classes, target, options)?;
    let files = match target {
        Target::C => c::generate(&ctx)?,
        Target::Cpp => cpp::generate(&ctx)?,
        Target::DLang => dlang::generate(&ctx)?,
        Target::DotNet => dotnet::generate(&ctx)?,
        Target::Golang => golang::generate(&ctx)?,
        Target::Lua => lua::generate(&ctx)?,
        Target::Python => python::generate(&ctx)?,
        Target::Rust => rust::generate(&ctx)?,
    };
    debug!(
        target = %target,
        package = %pkg.name,
        files = files.len(),
        bytes = files.values().map(String::len).sum::<usize>(),
        "emitted bindings"
    );
    Ok(files)
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod codegen_tests;
