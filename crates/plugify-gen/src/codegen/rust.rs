//! Rust emitter: one module file with no dependencies beyond `std`.
//!
//! The module embeds [`crate::runtime::registry`] verbatim as its callback registry, so the
//! registry shipped in generated code is the one this crate tests.

use super::{Context, Files};
use crate::abi::{AbiSignature, AbiType, Slot};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::naming::to_snake_case;
use crate::runtime::REGISTRY_SOURCE;
use crate::symbols::SignatureNames;
use crate::types;
use plugify_gen_manifest::{CallbackId, FloatWidth, Ownership, SharedType, TypeRef};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut code = ctx.header("//");

    code.push_str(
        "\n#![allow(dead_code, deprecated, non_camel_case_types, non_upper_case_globals)]\n\n",
    );
    code.push_str("use std::ffi::{CStr, CString, c_char, c_void};\n");
    code.push_str("use std::sync::atomic::{AtomicPtr, Ordering};\n");

    for shared in &pkg.shared_types {
        code.push('\n');
        code.push_str(&shared_struct(*shared));
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        let repr = types::table(ctx.target).ints[e.repr.table_index()];
        code.push('\n');
        push_doc(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str("#[repr(transparent)]\n");
        code.push_str("#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]\n");
        code.push_str(&format!("pub struct {}(pub {repr});\n\n", names.name));
        code.push_str(&format!("impl {} {{\n", names.name));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            push_doc(&mut code, "    ", &super::doc_lines(member.doc.as_deref()));
            code.push_str(&format!("    pub const {member_name}: Self = Self({});\n", member.value));
        }
        code.push_str("}\n");
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        code.push('\n');
        push_doc(&mut code, "", &super::doc_lines(cb.doc.as_deref()));
        code.push_str(&format!(
            "pub type {} = Option<{}>;\n",
            names.name,
            fn_pointer(ctx, &ctx.callback_abi[id.0], names)
        ));
    }

    entry_points(ctx, &mut code);

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    if !pkg.callbacks.is_empty() {
        code.push_str("\nmod callback_registry {\n");
        for line in REGISTRY_SOURCE.lines() {
            if line.is_empty() {
                code.push('\n');
            } else {
                code.push_str(&format!("    {line}\n"));
            }
        }
        code.push_str("}\n");
        for id in &ctx.callback_order {
            registry(ctx, *id, &mut code)?;
        }
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }

    let mut files = Files::new();
    files.insert(format!("{module}.rs"), code);
    Ok(files)
}

fn push_doc(code: &mut String, indent: &str, lines: &[String]) {
    super::push_comment(code, indent, "///", lines);
}

fn shared_struct(shared: SharedType) -> String {
    let fields = match shared {
        SharedType::Mat4x4 => "pub m: [f32; 16]".to_string(),
        other => other
            .fields()
            .iter()
            .map(|f| format!("pub {f}: f32"))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!(
        "#[repr(C)]\n#[derive(Debug, Clone, Copy, Default, PartialEq)]\npub struct {} {{ {fields} }}\n",
        shared.name()
    )
}

/// Rust spelling of a lowered C type.
fn abi_type(ctx: &Context<'_>, ty: &AbiType) -> String {
    let table = types::table(ctx.target);
    match ty {
        AbiType::Void => "()".to_string(),
        AbiType::Bool => "bool".to_string(),
        AbiType::Int(repr) => table.ints[repr.table_index()].to_string(),
        AbiType::Float(FloatWidth::F32) => "f32".to_string(),
        AbiType::Float(FloatWidth::F64) => "f64".to_string(),
        AbiType::Size => "usize".to_string(),
        AbiType::CStr => "*const c_char".to_string(),
        AbiType::Shared(shared) => shared.name().to_string(),
        AbiType::Enum(id) => ctx.symbols.enum_name(*id).to_string(),
        AbiType::Callback(id) => ctx.symbols.callback_name(*id).to_string(),
        AbiType::Ptr(inner) => format!("*const {}", abi_type(ctx, inner)),
        AbiType::PtrMut(inner) => format!("*mut {}", abi_type(ctx, inner)),
    }
}

fn fn_pointer(ctx: &Context<'_>, sig: &AbiSignature, names: &SignatureNames) -> String {
    let params = sig
        .params
        .iter()
        .map(|p| format!("{}: {}", p.slot.name(names), abi_type(ctx, &p.ty)))
        .collect::<Vec<_>>()
        .join(", ");
    match sig.ret {
        AbiType::Void => format!("unsafe extern \"C\" fn({params})"),
        ref ret => format!("unsafe extern \"C\" fn({params}) -> {}", abi_type(ctx, ret)),
    }
}

fn entry_points(ctx: &Context<'_>, code: &mut String) {
    let pkg = ctx.pkg;
    let symbols = ctx.table_symbols();
    let count = symbols.len();

    code.push_str(&format!("\nconst SYMBOLS: [&str; {count}] = [\n"));
    for symbol in &symbols {
        code.push_str(&format!("    {},\n", super::quote(symbol)));
    }
    code.push_str("];\n\n");
    code.push_str(&format!(
        "static TABLE: [AtomicPtr<c_void>; {count}] =\n    [const {{ AtomicPtr::new(std::ptr::null_mut()) }}; {count}];\n"
    ));
    if pkg.needs_free() {
        code.push_str(&format!("\nconst FREE: usize = {};\n", ctx.free_index()));
    }

    code.push_str(
        "\n/// Resolve every entry point through `resolve`.\n\
         ///\n\
         /// Returns the symbols that could not be resolved. Calling a wrapper whose symbol is\n\
         /// missing panics.\n",
    );
    code.push_str("pub fn init(mut resolve: impl FnMut(&str) -> *mut c_void) -> Vec<&'static str> {\n");
    code.push_str("    let mut missing = Vec::new();\n");
    code.push_str("    for (slot, symbol) in TABLE.iter().zip(SYMBOLS) {\n");
    code.push_str("        let ptr = resolve(symbol);\n");
    code.push_str("        if ptr.is_null() {\n            missing.push(symbol);\n        }\n");
    code.push_str("        slot.store(ptr, Ordering::Release);\n    }\n    missing\n}\n\n");

    code.push_str("fn entry(index: usize) -> *mut c_void {\n");
    code.push_str("    let ptr = TABLE[index].load(Ordering::Acquire);\n");
    code.push_str(
        "    assert!(!ptr.is_null(), \"`{}` is not resolved; call init first\", SYMBOLS[index]);\n",
    );
    code.push_str("    ptr\n}\n");

    if pkg.needs_free() {
        code.push_str("\nfn free(ptr: *mut c_void) {\n");
        code.push_str(
            "    let f: unsafe extern \"C\" fn(ptr: *mut c_void) = unsafe { std::mem::transmute(entry(FREE)) };\n",
        );
        code.push_str("    unsafe { f(ptr) }\n}\n");
    }

    let takes_string = pkg.functions.iter().flat_map(|f| &f.params).any(|p| {
        !p.by_ref && p.ty == TypeRef::Str(Ownership::Owned)
    });
    if takes_string {
        code.push_str("\n/// Text before the first NUL; C reads no further.\n");
        code.push_str("fn c_string(text: &str) -> CString {\n");
        code.push_str("    let end = text.find('\\0').unwrap_or(text.len());\n");
        code.push_str("    CString::new(&text[..end]).unwrap_or_default()\n}\n");
    }

    let returns_string = pkg
        .functions
        .iter()
        .any(|f| matches!(f.ret.ty, TypeRef::Str(_)));
    if returns_string {
        code.push_str("\nunsafe fn copy_string(raw: *const c_char) -> String {\n");
        code.push_str("    if raw.is_null() {\n        return String::new();\n    }\n");
        code.push_str("    unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()\n}\n");
    }
    if ctx.function_abi.iter().any(AbiSignature::returns_array) {
        code.push_str("\nunsafe fn copy_vec<T: Copy>(raw: *const T, len: usize) -> Vec<T> {\n");
        code.push_str("    if raw.is_null() || len == 0 {\n        return Vec::new();\n    }\n");
        code.push_str("    unsafe { std::slice::from_raw_parts(raw, len) }.to_vec()\n}\n");
    }
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let f = &ctx.pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];

    let mut doc = ctx.function_doc(f, false);
    let param_docs: Vec<String> = f
        .params
        .iter()
        .zip(&names.params)
        .filter_map(|(p, n)| p.doc.as_ref().map(|d| format!("- `{n}`: {d}")))
        .collect();
    if !param_docs.is_empty() {
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push("# Parameters".to_string());
        doc.push(String::new());
        doc.extend(param_docs);
    }
    if let Some(ret) = &f.ret.doc {
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push(format!("Returns {ret}"));
    }

    let mut params = Vec::with_capacity(f.params.len());
    for (p, name) in f.params.iter().zip(&names.params) {
        params.push(format!("{name}: {}", ctx.param_type(p)?));
    }
    let ret = match &f.ret.ty {
        TypeRef::Void => String::new(),
        other => format!(" -> {}", ctx.decl_type(other)?),
    };

    code.push('\n');
    push_doc(code, "", &doc);
    if let Some(note) = &f.deprecated {
        code.push_str(&format!("#[deprecated(note = {})]\n", super::quote(note)));
    }
    code.push_str(&format!("pub fn {}({}){ret} {{\n", names.name, params.join(", ")));
    code.push_str(&format!(
        "    let f: {} = unsafe {{ std::mem::transmute(entry({index})) }};\n",
        fn_pointer(ctx, sig, names)
    ));

    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    _ if p.by_ref => name.clone(),
                    TypeRef::Str(Ownership::Owned) => {
                        code.push_str(&format!(
                            "    let {name} = c_string({name});\n"
                        ));
                        format!("{name}.as_ptr()")
                    }
                    TypeRef::Str(Ownership::Borrowed) => format!("{name}.as_ptr()"),
                    _ => name.clone(),
                }
            }
            Slot::Data(i) => format!("{}.as_ptr()", names.params[i]),
            Slot::Len(i) => format!("{}.len()", names.params[i]),
            Slot::OutLen => format!("&mut {}", abi.slot.name(names)),
        });
    }
    let call = format!("unsafe {{ f({}) }}", args.join(", "));

    match &f.ret.ty {
        TypeRef::Str(ownership) => {
            code.push_str(&format!("    let raw = {call};\n"));
            code.push_str("    let result = unsafe { copy_string(raw) };\n");
            if *ownership == Ownership::Owned {
                code.push_str("    if !raw.is_null() {\n        free(raw.cast_mut().cast());\n    }\n");
            }
            code.push_str("    result\n");
        }
        TypeRef::Array(_) => {
            let out_len = names.out_len.as_deref().unwrap_or("out_len");
            code.push_str(&format!("    let mut {out_len} = 0usize;\n"));
            code.push_str(&format!("    let raw = {call};\n"));
            code.push_str(&format!("    let result = unsafe {{ copy_vec(raw, {out_len}) }};\n"));
            code.push_str("    if !raw.is_null() {\n        free(raw.cast());\n    }\n");
            code.push_str("    result\n");
        }
        _ => code.push_str(&format!("    {call}\n")),
    }
    code.push_str("}\n");
    Ok(())
}

/// Closure parameter type seen by a registered handler.
fn handler_param(ctx: &Context<'_>, ty: &TypeRef, by_ref: bool) -> GenResult<String> {
    Ok(match ty {
        _ if by_ref => format!("&mut {}", ctx.decl_type(ty)?),
        TypeRef::Str(_) => "&str".to_string(),
        TypeRef::Array(inner) => format!("&[{}]", ctx.decl_type(inner)?),
        other => ctx.decl_type(other)?,
    })
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) -> GenResult<()> {
    let cb = ctx.pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let module = format!("{}_registry", to_snake_case(&cb.name));
    let zero = if sig.ret == AbiType::CStr {
        "std::ptr::null()"
    } else {
        "Default::default()"
    };

    let mut handler_params = Vec::with_capacity(cb.params.len());
    for p in &cb.params {
        handler_params.push(handler_param(ctx, &p.ty, p.by_ref)?);
    }
    let handler_ret = match &cb.ret.ty {
        TypeRef::Void => String::new(),
        TypeRef::Str(_) => " -> &'static CStr".to_string(),
        other => format!(" -> {}", ctx.decl_type(other)?),
    };
    let handler_sig = format!("Fn({}){handler_ret}", handler_params.join(", "));

    code.push_str(&format!("\n/// Binds closures to native [`{name}`] pointers.\n"));
    code.push_str(&format!("pub mod {module} {{\n    use super::*;\n\n"));
    code.push_str(&format!("    pub type Handler = dyn {handler_sig} + Send + Sync;\n\n"));
    code.push_str(&format!("    pub const SLOTS: usize = {};\n\n", ctx.slots));
    code.push_str(
        "    static REGISTRY: callback_registry::CallbackRegistry<Handler> =\n        callback_registry::CallbackRegistry::new(SLOTS);\n\n",
    );

    let params = sig
        .params
        .iter()
        .map(|p| format!("{}: {}", p.slot.name(names), abi_type(ctx, &p.ty)))
        .collect::<Vec<_>>()
        .join(", ");
    let ret = match sig.ret {
        AbiType::Void => String::new(),
        ref other => format!(" -> {}", abi_type(ctx, other)),
    };
    code.push_str(&format!(
        "    unsafe extern \"C\" fn trampoline<const N: usize>({params}){ret} {{\n"
    ));
    code.push_str(&format!(
        "        let Some(handler) = REGISTRY.get(N) else {{\n            return {zero};\n        }};\n"
    ));

    let mut args = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        match &p.ty {
            _ if p.by_ref => {
                code.push_str(&format!(
                    "        let Some({pname}) = (unsafe {{ {pname}.as_mut() }}) else {{\n            return {zero};\n        }};\n"
                ));
                args.push(pname.clone());
            }
            TypeRef::Str(_) => {
                code.push_str(&format!(
                    "        let {pname} = if {pname}.is_null() {{\n            Default::default()\n        }} else {{\n            unsafe {{ CStr::from_ptr({pname}) }}.to_string_lossy()\n        }};\n"
                ));
                args.push(format!("&*{pname}"));
            }
            TypeRef::Array(inner) => {
                let len = names.lens[i].as_deref().unwrap_or("len");
                let element = ctx.decl_type(inner)?;
                code.push_str(&format!(
                    "        let {pname}: &[{element}] = if {pname}.is_null() {{\n            &[]\n        }} else {{\n            unsafe {{ std::slice::from_raw_parts({pname}, {len}) }}\n        }};\n"
                ));
                args.push(pname.clone());
            }
            _ => args.push(pname.clone()),
        }
    }
    let call = if sig.ret == AbiType::CStr {
        format!("handler({}).as_ptr()", args.join(", "))
    } else {
        format!("handler({})", args.join(", "))
    };
    code.push_str(&format!(
        "        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {call})).unwrap_or_else(|_| {zero})\n    }}\n\n"
    ));

    code.push_str(&format!("    const TRAMPOLINES: [{name}; SLOTS] = [\n"));
    for slot in 0..ctx.slots {
        code.push_str(&format!("        Some(trampoline::<{slot}>),\n"));
    }
    code.push_str("    ];\n\n");

    code.push_str(
        "    /// Bind `handler` to a free slot.\n    ///\n    \
         /// Returns the slot and its native pointer, or `None` when every slot is taken.\n",
    );
    code.push_str(&format!(
        "    pub fn register(handler: impl {handler_sig} + Send + Sync + 'static) -> Option<(usize, {name})> {{\n"
    ));
    code.push_str("        let slot = REGISTRY.register(std::sync::Arc::new(handler))?;\n");
    code.push_str("        Some((slot, TRAMPOLINES[slot]))\n    }\n\n");
    code.push_str("    /// Release `slot`. Returns `false` if it was not registered.\n");
    code.push_str("    pub fn unregister(slot: usize) -> bool {\n        REGISTRY.unregister(slot)\n    }\n}\n");
    Ok(())
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let handle = ctx.decl_type(&model.handle)?;
    let owned = model.receiver == Receiver::Owned;
    let invalid = model.invalid_value;

    code.push('\n');
    push_doc(code, "", &super::doc_lines(model.doc.as_deref()));
    if owned {
        code.push_str("#[derive(Debug)]\n");
    } else {
        code.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    }
    code.push_str(&format!("pub struct {name} {{\n    handle: {handle},\n}}\n\n"));
    code.push_str(&format!("impl {name} {{\n"));
    if owned {
        code.push_str("    /// Take ownership of `handle`; it is destroyed when the wrapper is dropped.\n");
    }
    code.push_str(&format!(
        "    pub fn from_handle(handle: {handle}) -> Self {{\n        Self {{ handle }}\n    }}\n\n"
    ));
    code.push_str(&format!(
        "    pub fn handle(&self) -> {handle} {{\n        self.handle\n    }}\n\n"
    ));
    code.push_str(&format!(
        "    pub fn is_valid(&self) -> bool {{\n        self.handle != {invalid}\n    }}\n"
    ));
    if owned {
        code.push_str("\n    /// Give up ownership without destroying the handle.\n");
        code.push_str(&format!(
            "    pub fn into_handle(self) -> {handle} {{\n        let handle = self.handle;\n        std::mem::forget(self);\n        handle\n    }}\n"
        ));
    }

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = Vec::new();
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(format!("{pname}: {}", ctx.param_type(p)?));
        }
        code.push('\n');
        push_doc(code, "    ", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "    pub fn {ctor_name}({}) -> Self {{\n        Self::from_handle({}({}))\n    }}\n",
            params.join(", "),
            fnames.name,
            fnames.params.join(", ")
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        let mut params = Vec::new();
        if method.bind_self {
            params.push("&self".to_string());
        }
        let mut args = Vec::new();
        if method.bind_self {
            args.push("self.handle".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            match method.param_alias(j) {
                Some(alias) if alias.owner => {
                    params.push(format!("{pname}: {}", ctx.alias_class(alias)));
                    args.push(format!("{pname}.into_handle()"));
                }
                Some(alias) => {
                    params.push(format!("{pname}: &{}", ctx.alias_class(alias)));
                    args.push(format!("{pname}.handle()"));
                }
                None => {
                    params.push(format!("{pname}: {}", ctx.param_type(p)?));
                    args.push(pname.clone());
                }
            }
        }
        let call = format!("{}({})", fnames.name, args.join(", "));
        let (ret, body) = match (method.ret_alias, &f.ret.ty) {
            (Some(alias), _) => {
                let class = ctx.alias_class(alias);
                (format!(" -> {class}"), format!("{class}::from_handle({call})"))
            }
            (None, TypeRef::Void) => (String::new(), call),
            (None, other) => (format!(" -> {}", ctx.decl_type(other)?), call),
        };

        code.push('\n');
        push_doc(code, "    ", &super::doc_lines(f.doc.as_deref()));
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    #[deprecated(note = {})]\n", super::quote(note)));
        }
        code.push_str(&format!(
            "    pub fn {method_name}({}){ret} {{\n        {body}\n    }}\n",
            params.join(", ")
        ));
    }
    code.push_str("}\n");

    if owned && let Some(dtor) = model.destructor {
        code.push_str(&format!(
            "\nimpl Drop for {name} {{\n    fn drop(&mut self) {{\n        if self.is_valid() {{\n            {}(self.handle);\n        }}\n    }}\n}}\n",
            ctx.function_names(dtor).name
        ));
    }
    Ok(())
}
