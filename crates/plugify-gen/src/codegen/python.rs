//! Python emitter: a ctypes module.

use super::{Context, Files, quote};
use crate::abi::{AbiType, Slot};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::naming::to_snake_case;
use plugify_gen_manifest::{
    CallbackId, FloatWidth, Ownership, ParamDescriptor, SharedType, TypeRef,
};

const CTYPES_INTS: [&str; 8] = [
    "ctypes.c_int8",
    "ctypes.c_int16",
    "ctypes.c_int32",
    "ctypes.c_int64",
    "ctypes.c_uint8",
    "ctypes.c_uint16",
    "ctypes.c_uint32",
    "ctypes.c_uint64",
];

/// Native code may hand back values the manifest never listed; they decode to a
/// pseudo-member instead of raising `ValueError`.
const UNKNOWN_ENUM_VALUE: &str = "
    @classmethod
    def _missing_(cls, value):
        if not isinstance(value, int):
            return None
        member = int.__new__(cls, value)
        member._name_ = f\"UNKNOWN_{value}\"
        member._value_ = value
        return member
";

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut code = ctx.header("#");

    let summary = pkg
        .description
        .as_deref()
        .and_then(|d| d.lines().next())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Bindings for the {} plugin.", pkg.name));
    code.push_str(&format!("\n\"\"\"{}\"\"\"\n\n", escape_docstring(&summary)));
    code.push_str("from __future__ import annotations\n\n");
    code.push_str("import ctypes\nimport enum\nimport threading\n");
    if !pkg.callbacks.is_empty() {
        code.push_str("import traceback\n");
    }
    if pkg.functions.iter().any(|f| f.deprecated.is_some()) {
        code.push_str("import warnings\n");
    }
    code.push_str("from collections.abc import Callable, Sequence\n");

    for shared in &pkg.shared_types {
        code.push_str("\n\n");
        code.push_str(&shared_struct(*shared));
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        code.push_str(&format!("\n\nclass {}(enum.IntEnum):\n", names.name));
        push_docstring(&mut code, "    ", &super::doc_lines(e.doc.as_deref()));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            code.push_str(&format!("    {member_name} = {}\n", member.value));
            for line in super::doc_lines(member.doc.as_deref()) {
                super::push_comment_line(&mut code, "    ", "#", &line);
            }
        }
        code.push_str(UNKNOWN_ENUM_VALUE);
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let sig = &ctx.callback_abi[id.0];
        let mut types = vec![ctype(ctx, &sig.ret, false)];
        types.extend(sig.params.iter().map(|p| ctype(ctx, &p.ty, false)));
        code.push_str("\n\n");
        for line in super::doc_lines(cb.doc.as_deref()) {
            super::push_comment_line(&mut code, "", "#", &line);
        }
        code.push_str(&format!("{} = ctypes.CFUNCTYPE({})\n", names.name, types.join(", ")));
    }

    entry_points(ctx, &mut code);

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code)?;
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }

    let mut files = Files::new();
    files.insert(format!("{module}.py"), code);
    Ok(files)
}

fn push_docstring(code: &mut String, indent: &str, lines: &[String]) {
    match lines {
        [] => {}
        [line] => code.push_str(&format!("{indent}\"\"\"{}\"\"\"\n", escape_docstring(line))),
        _ => {
            code.push_str(&format!("{indent}\"\"\"{}\n", escape_docstring(&lines[0])));
            for line in &lines[1..] {
                if line.is_empty() {
                    code.push('\n');
                } else {
                    code.push_str(&format!("{indent}{}\n", escape_docstring(line)));
                }
            }
            code.push_str(&format!("{indent}\"\"\"\n"));
        }
    }
}

/// Escape `line` for a triple-quoted docstring. A trailing quote would merge with the
/// closing delimiter.
fn escape_docstring(line: &str) -> String {
    let escaped = line.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    match escaped.strip_suffix('"') {
        Some(head) => format!("{head}\\\""),
        None => escaped,
    }
}

fn shared_struct(shared: SharedType) -> String {
    let fields = match shared {
        SharedType::Mat4x4 => "(\"m\", ctypes.c_float * 16)".to_string(),
        other => other
            .fields()
            .iter()
            .map(|f| format!("(\"{f}\", ctypes.c_float)"))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!(
        "class {}(ctypes.Structure):\n    _fields_ = [{fields}]\n",
        shared.name()
    )
}

/// ctypes spelling of a lowered C type. Returned strings use `c_void_p` so the address
/// survives for `Free`.
fn ctype(ctx: &Context<'_>, ty: &AbiType, returned: bool) -> String {
    match ty {
        AbiType::Void => "None".to_string(),
        AbiType::Bool => "ctypes.c_bool".to_string(),
        AbiType::Int(repr) => CTYPES_INTS[repr.table_index()].to_string(),
        AbiType::Float(FloatWidth::F32) => "ctypes.c_float".to_string(),
        AbiType::Float(FloatWidth::F64) => "ctypes.c_double".to_string(),
        AbiType::Size => "ctypes.c_size_t".to_string(),
        AbiType::CStr if returned => "ctypes.c_void_p".to_string(),
        AbiType::CStr => "ctypes.c_char_p".to_string(),
        AbiType::Shared(shared) => shared.name().to_string(),
        AbiType::Enum(id) => CTYPES_INTS[ctx.pkg.enum_type(*id).repr.table_index()].to_string(),
        AbiType::Callback(id) => ctx.symbols.callback_name(*id).to_string(),
        AbiType::Ptr(inner) | AbiType::PtrMut(inner) => {
            format!("ctypes.POINTER({})", ctype(ctx, inner, false))
        }
    }
}

/// Python expression converting a raw native `value` of type `ty` into its binding type.
fn lift(ctx: &Context<'_>, ty: &TypeRef, value: &str) -> String {
    match ty {
        TypeRef::Enum(id) => format!("{}({value})", ctx.symbols.enum_name(*id)),
        TypeRef::Shared(shared) => format!("{}.from_buffer_copy({value})", shared.name()),
        _ => value.to_string(),
    }
}

fn entry_points(ctx: &Context<'_>, code: &mut String) {
    let pkg = ctx.pkg;
    code.push_str("\n\n_SIGNATURES: dict[str, tuple[object, list[object]]] = {\n");
    for (index, f) in pkg.functions.iter().enumerate() {
        let sig = &ctx.function_abi[index];
        let params: Vec<String> = sig.params.iter().map(|p| ctype(ctx, &p.ty, false)).collect();
        code.push_str(&format!(
            "    {}: ({}, [{}]),\n",
            quote(&ctx.symbol(f)),
            ctype(ctx, &sig.ret, true),
            params.join(", ")
        ));
    }
    if pkg.needs_free() {
        code.push_str(&format!(
            "    {}: (None, [ctypes.c_void_p]),\n",
            quote(&ctx.free_symbol())
        ));
    }
    code.push_str("}\n\n_table: dict[str, Callable[..., object]] = {}\n\n\n");

    code.push_str("def init(resolve: Callable[[str], int | None]) -> list[str]:\n");
    code.push_str("    \"\"\"Resolve every entry point through `resolve`, which returns an address or 0.\n\n");
    code.push_str("    Returns the symbols that could not be resolved.\n    \"\"\"\n");
    code.push_str("    missing = []\n");
    code.push_str("    for symbol, (restype, argtypes) in _SIGNATURES.items():\n");
    code.push_str("        address = resolve(symbol)\n");
    code.push_str("        if not address:\n");
    code.push_str("            missing.append(symbol)\n");
    code.push_str("            _table.pop(symbol, None)\n");
    code.push_str("            continue\n");
    code.push_str("        _table[symbol] = ctypes.CFUNCTYPE(restype, *argtypes)(address)\n");
    code.push_str("    return missing\n\n\n");

    code.push_str("def _entry(symbol: str) -> Callable[..., object]:\n");
    code.push_str("    try:\n        return _table[symbol]\n    except KeyError:\n");
    code.push_str(
        "        raise RuntimeError(f\"{symbol} is not resolved; call init first\") from None\n\n\n",
    );
    code.push_str("def _array(ctype: type, values: Sequence[object]) -> ctypes.Array:\n");
    code.push_str("    return (ctype * len(values))(*values)\n");
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let f = &ctx.pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];
    let symbol = quote(&ctx.symbol(f));

    let mut params = Vec::with_capacity(f.params.len());
    for (p, name) in f.params.iter().zip(&names.params) {
        params.push(param_decl(ctx, p, name)?);
    }

    // by-reference values come back as extra results
    let mut results = Vec::new();
    if !f.ret.ty.is_void() {
        results.push(("result".to_string(), ctx.decl_type(&f.ret.ty)?));
    }
    for (p, name) in f.params.iter().zip(&names.params) {
        if p.by_ref {
            results.push((name.clone(), ctx.decl_type(&p.ty)?));
        }
    }
    let ret = match results.as_slice() {
        [] => "None".to_string(),
        [(_, ty)] => ty.clone(),
        many => format!(
            "tuple[{}]",
            many.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join(", ")
        ),
    };

    let mut doc = ctx.function_doc(f, false);
    let param_docs: Vec<String> = f
        .params
        .iter()
        .zip(&names.params)
        .filter_map(|(p, n)| p.doc.as_ref().map(|d| format!("    {n}: {d}")))
        .collect();
    if !param_docs.is_empty() {
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push("Args:".to_string());
        doc.extend(param_docs);
    }
    if let Some(d) = &f.ret.doc {
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push("Returns:".to_string());
        doc.push(format!("    {d}"));
    }

    code.push_str(&format!(
        "\n\ndef {}({}) -> {ret}:\n",
        names.name,
        params.join(", ")
    ));
    push_docstring(code, "    ", &doc);
    if let Some(note) = &f.deprecated {
        code.push_str(&format!(
            "    warnings.warn({}, DeprecationWarning, stacklevel=2)\n",
            quote(&format!("{} is deprecated: {note}", names.name))
        ));
    }

    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    TypeRef::Shared(_) if p.by_ref => format!("ctypes.byref({name})"),
                    _ if p.by_ref => {
                        let AbiType::PtrMut(inner) = &abi.ty else {
                            continue;
                        };
                        code.push_str(&format!(
                            "    {name}_ref = {}({name})\n",
                            ctype(ctx, inner, false)
                        ));
                        format!("ctypes.byref({name}_ref)")
                    }
                    TypeRef::Str(_) => format!("{name}.encode(\"utf-8\")"),
                    _ => name.clone(),
                }
            }
            Slot::Data(i) => {
                let name = &names.params[i];
                let AbiType::Ptr(inner) = &abi.ty else {
                    continue;
                };
                format!("_array({}, {name})", ctype(ctx, inner, false))
            }
            Slot::Len(i) => format!("len({})", names.params[i]),
            Slot::OutLen => {
                let out_len = abi.slot.name(names);
                code.push_str(&format!("    {out_len} = ctypes.c_size_t()\n"));
                format!("ctypes.byref({out_len})")
            }
        });
    }
    let call = format!("_entry({symbol})({})", args.join(", "));

    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("    {call}\n")),
        TypeRef::Str(ownership) => {
            code.push_str(&format!("    raw = {call}\n"));
            code.push_str(
                "    result = ctypes.string_at(raw).decode(\"utf-8\", \"replace\") if raw else \"\"\n",
            );
            if *ownership == Ownership::Owned {
                code.push_str(&format!(
                    "    if raw:\n        _entry({})(raw)\n",
                    quote(&ctx.free_symbol())
                ));
            }
        }
        TypeRef::Array(inner) => {
            let out_len = names.out_len.as_deref().unwrap_or("out_len");
            code.push_str(&format!("    raw = {call}\n"));
            code.push_str(&format!(
                "    result = [{} for i in range({out_len}.value)] if raw else []\n",
                lift(ctx, inner, "raw[i]")
            ));
            code.push_str(&format!(
                "    if raw:\n        _entry({})(raw)\n",
                quote(&ctx.free_symbol())
            ));
        }
        other => code.push_str(&format!("    result = {}\n", lift_return(ctx, other, &call))),
    }

    let mut returned = Vec::new();
    for (name, _) in &results {
        if name == "result" {
            returned.push(name.clone());
            continue;
        }
        let Some(i) = names.params.iter().position(|n| n == name) else {
            continue;
        };
        let p = &f.params[i];
        returned.push(match &p.ty {
            TypeRef::Shared(_) => name.clone(),
            other => lift(ctx, other, &format!("{name}_ref.value")),
        });
    }
    if !returned.is_empty() {
        code.push_str(&format!("    return {}\n", returned.join(", ")));
    }
    Ok(())
}

fn lift_return(ctx: &Context<'_>, ty: &TypeRef, call: &str) -> String {
    match ty {
        TypeRef::Enum(id) => format!("{}({call})", ctx.symbols.enum_name(*id)),
        _ => call.to_string(),
    }
}

/// Zero value returned by an empty registry slot.
fn zero(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Void => "None".to_string(),
        TypeRef::Bool => "False".to_string(),
        TypeRef::Float(_) => "0.0".to_string(),
        TypeRef::Shared(shared) => format!("{}()", shared.name()),
        _ => "0".to_string(),
    }
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) -> GenResult<()> {
    let cb = ctx.pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let class_name = format!("_{name}Registry");
    let instance = format!("{}_registry", to_snake_case(&cb.name));

    let mut handler_params = Vec::with_capacity(cb.params.len());
    for p in &cb.params {
        handler_params.push(match &p.ty {
            TypeRef::Str(_) => "str".to_string(),
            TypeRef::Array(inner) => format!("list[{}]", ctx.decl_type(inner)?),
            other => ctx.decl_type(other)?,
        });
    }
    let handler_ret = ctx.decl_type(&cb.ret.ty)?;
    let handler = format!("Callable[[{}], {handler_ret}]", handler_params.join(", "));

    let abi_names: Vec<&str> = sig.params.iter().map(|p| p.slot.name(names)).collect();
    let mut decoded = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        decoded.push(match &p.ty {
            TypeRef::Str(_) => {
                format!("{pname}.decode(\"utf-8\", \"replace\") if {pname} is not None else \"\"")
            }
            TypeRef::Array(inner) => {
                let len = names.lens[i].as_deref().unwrap_or("len");
                format!(
                    "[{} for i in range({len})] if {pname} else []",
                    lift(ctx, inner, &format!("{pname}[i]"))
                )
            }
            TypeRef::Enum(id) => format!("{}({pname})", ctx.symbols.enum_name(*id)),
            _ => pname.clone(),
        });
    }

    code.push_str(&format!("\n\nclass {class_name}:\n"));
    code.push_str(&format!(
        "    \"\"\"Binds callables to native `{name}` pointers, one trampoline per slot.\"\"\"\n\n"
    ));
    code.push_str(&format!("    SLOTS = {}\n\n", ctx.slots));
    code.push_str("    def __init__(self) -> None:\n");
    code.push_str("        self._lock = threading.Lock()\n");
    code.push_str(&format!(
        "        self._entries: list[{handler} | None] = [None] * self.SLOTS\n"
    ));
    code.push_str("        self._free = list(range(self.SLOTS - 1, -1, -1))\n");
    code.push_str(&format!(
        "        self._thunks = [{name}(self._trampoline(slot)) for slot in range(self.SLOTS)]\n\n"
    ));
    code.push_str("    def _trampoline(self, slot: int) -> Callable[..., object]:\n");
    code.push_str(&format!("        def trampoline({}):\n", abi_names.join(", ")));
    code.push_str("            with self._lock:\n");
    code.push_str("                handler = self._entries[slot]\n");
    code.push_str("            if handler is None:\n");
    code.push_str(&format!("                return {}\n", zero(&cb.ret.ty)));
    code.push_str("            try:\n");
    code.push_str(&format!("                return handler({})\n", decoded.join(", ")));
    code.push_str("            except Exception:\n");
    code.push_str("                # exceptions must not unwind into native frames\n");
    code.push_str("                traceback.print_exc()\n");
    code.push_str(&format!("                return {}\n\n", zero(&cb.ret.ty)));
    code.push_str("        return trampoline\n\n");

    code.push_str(&format!(
        "    def register(self, handler: {handler}) -> tuple[int, {name}] | None:\n"
    ));
    code.push_str("        \"\"\"Bind `handler` to a free slot.\n\n");
    code.push_str(
        "        Returns the slot and its native pointer, or None when every slot is taken.\n        \"\"\"\n",
    );
    code.push_str("        with self._lock:\n");
    code.push_str("            if not self._free:\n                return None\n");
    code.push_str("            slot = self._free.pop()\n");
    code.push_str("            self._entries[slot] = handler\n");
    code.push_str("            return slot, self._thunks[slot]\n\n");
    code.push_str("    def unregister(self, slot: int) -> bool:\n");
    code.push_str("        \"\"\"Release `slot`. Returns False if it was not registered.\"\"\"\n");
    code.push_str("        with self._lock:\n");
    code.push_str(
        "            if not 0 <= slot < self.SLOTS or self._entries[slot] is None:\n                return False\n",
    );
    code.push_str("            self._entries[slot] = None\n");
    code.push_str("            self._free.append(slot)\n");
    code.push_str("            return True\n\n\n");
    code.push_str(&format!("{instance} = {class_name}()\n"));
    Ok(())
}

fn param_decl(ctx: &Context<'_>, p: &ParamDescriptor, name: &str) -> GenResult<String> {
    let ty = ctx.param_type(p)?;
    Ok(match (p.default, &p.ty) {
        (None, _) => format!("{name}: {ty}"),
        (Some(0), TypeRef::Bool) => format!("{name}: {ty} = False"),
        (Some(_), TypeRef::Bool) => format!("{name}: {ty} = True"),
        (Some(value), TypeRef::Enum(id)) => {
            format!("{name}: {ty} = {}({value})", ctx.symbols.enum_name(*id))
        }
        (Some(value), _) => format!("{name}: {ty} = {value}"),
    })
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let handle = ctx.decl_type(&model.handle)?;
    let invalid = model.invalid_value;

    code.push_str(&format!("\n\nclass {name}:\n"));
    push_docstring(code, "    ", &super::doc_lines(model.doc.as_deref()));
    code.push('\n');
    code.push_str(&format!(
        "    def __init__(self, handle: {handle}) -> None:\n        self._handle = handle\n\n"
    ));
    code.push_str("    @classmethod\n");
    code.push_str(&format!(
        "    def from_handle(cls, handle: {handle}) -> {name}:\n        return cls(handle)\n\n"
    ));
    code.push_str("    @property\n");
    code.push_str(&format!(
        "    def handle(self) -> {handle}:\n        return self._handle\n\n"
    ));
    code.push_str(&format!(
        "    def __bool__(self) -> bool:\n        return self._handle != {invalid}\n"
    ));

    if model.receiver == Receiver::Owned
        && let Some(dtor) = model.destructor
    {
        code.push_str("\n    def close(self) -> None:\n");
        code.push_str("        \"\"\"Destroy the handle. Further calls do nothing.\"\"\"\n");
        code.push_str(&format!(
            "        if self._handle != {invalid}:\n            {}(self._handle)\n            self._handle = {invalid}\n\n",
            ctx.function_names(dtor).name
        ));
        code.push_str(&format!("    def release(self) -> {handle}:\n"));
        code.push_str("        \"\"\"Give up ownership of the handle without destroying it.\"\"\"\n");
        code.push_str(&format!(
            "        released = self._handle\n        self._handle = {invalid}\n        return released\n\n"
        ));
        code.push_str(&format!(
            "    def __enter__(self) -> {name}:\n        return self\n\n"
        ));
        code.push_str("    def __exit__(self, *exc: object) -> None:\n        self.close()\n\n");
        code.push_str("    def __del__(self) -> None:\n        self.close()\n");
    }

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = vec!["cls".to_string()];
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(param_decl(ctx, p, pname)?);
        }
        code.push_str("\n    @classmethod\n");
        code.push_str(&format!(
            "    def {ctor_name}({}) -> {name}:\n",
            params.join(", ")
        ));
        push_docstring(code, "        ", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "        return cls({}({}))\n",
            fnames.name,
            fnames.params.join(", ")
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        let mut params = Vec::new();
        let mut args = Vec::new();
        if method.bind_self {
            params.push("self".to_string());
            args.push("self._handle".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            match method.param_alias(j) {
                Some(alias) => {
                    params.push(format!("{pname}: {}", ctx.alias_class(alias)));
                    let member = if alias.owner { "release()" } else { "handle" };
                    args.push(format!("{pname}.{member}"));
                }
                None => {
                    params.push(param_decl(ctx, p, pname)?);
                    args.push(pname.clone());
                }
            }
        }
        let call = format!("{}({})", fnames.name, args.join(", "));
        let body = match method.ret_alias {
            Some(alias) => format!("{}({call})", ctx.alias_class(alias)),
            None => call,
        };

        code.push('\n');
        if !method.bind_self {
            code.push_str("    @staticmethod\n");
        }
        code.push_str(&format!("    def {method_name}({}):\n", params.join(", ")));
        push_docstring(code, "        ", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!("        return {body}\n"));
    }
    Ok(())
}
