//! Reserved identifiers per target.
//!
//! Each table holds the language keywords plus the identifiers the generated scaffolding
//! itself declares (locals, helpers, module-level tables), so user symbols never shadow them.

use crate::target::Target;

const C_KEYWORDS: &[&str] = &[
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary",
    "_Noreturn", "_Static_assert", "_Thread_local", "alignas", "alignof", "auto", "bool",
    "break", "case", "char", "const", "constexpr", "continue", "default", "do", "double",
    "else", "enum", "extern", "false", "float", "for", "goto", "if", "inline", "int", "long",
    "nullptr", "register", "restrict", "return", "short", "signed", "sizeof", "static",
    "static_assert", "struct", "switch", "thread_local", "true", "typedef", "typeof",
    "union", "unsigned", "void", "volatile", "while", "NULL", "size_t", "int8_t", "int16_t",
    "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
];

const C_SCAFFOLDING: &[&str] = &[
    "resolve", "missing", "raw", "slot", "handler", "user_data", "out_fn", "Free", "unused",
];

const CPP_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char8_t", "char16_t", "char32_t", "class", "compl", "concept",
    "const", "consteval", "constexpr", "constinit", "const_cast", "continue", "co_await",
    "co_return", "co_yield", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not",
    "not_eq", "nullptr", "operator", "or", "or_eq", "private", "protected", "public",
    "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof",
    "static", "static_assert", "static_cast", "struct", "switch", "template", "this",
    "thread_local", "throw", "true", "try", "typedef", "typeid", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
    "NULL", "std",
];

const CPP_SCAFFOLDING: &[&str] = &[
    "detail", "Init", "Free", "Resolver", "resolve", "missing", "raw", "result", "table", "state",
    "handle_", "fn", "handler", "lock", "s", "instance", "other", "Handler", "Slots",
    "Trampoline", "Trampolines", "MakeTrampolines", "Lookup", "State", "Register", "Unregister",
    "Release",
];

const DLANG_KEYWORDS: &[&str] = &[
    "abstract", "alias", "align", "asm", "assert", "auto", "body", "bool", "break", "byte",
    "case", "cast", "catch", "cdouble", "cent", "cfloat", "char", "class", "const",
    "continue", "creal", "dchar", "debug", "default", "delegate", "delete", "deprecated",
    "do", "double", "else", "enum", "export", "extern", "false", "final", "finally", "float",
    "for", "foreach", "foreach_reverse", "function", "goto", "idouble", "if", "ifloat",
    "immutable", "import", "in", "inout", "int", "interface", "invariant", "ireal", "is",
    "lazy", "long", "macro", "mixin", "module", "new", "nothrow", "null", "out", "override",
    "package", "pragma", "private", "protected", "public", "pure", "real", "ref", "return",
    "scope", "shared", "short", "static", "struct", "super", "switch", "synchronized",
    "template", "this", "throw", "true", "try", "typeid", "typeof", "ubyte", "ucent",
    "uint", "ulong", "union", "unittest", "ushort", "version", "void", "wchar", "while",
    "with", "init", "sizeof", "alignof", "mangleof", "stringof", "string",
];

const DLANG_SCAFFOLDING: &[&str] = &[
    "initialize", "entry", "table", "symbols", "symbol", "raw", "Fn", "fn", "releaseNative",
    "missing", "ptr", "i", "Handler", "slots", "entries", "freeSlots", "ready", "gate",
    "trampolines", "trampoline", "register", "unregister", "prepare", "lookup", "handler",
    "slot", "native", "handle", "fromHandle", "Mutex", "fromStringz", "toStringz", "N",
];

const DOTNET_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed",
    "short", "sizeof", "stackalloc", "static", "string", "struct", "switch", "this",
    "throw", "true", "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort",
    "using", "virtual", "void", "volatile", "while", "nint", "nuint", "record", "var",
    "dynamic", "System",
];

const DOTNET_SCAFFOLDING: &[&str] = &[
    "Api", "Init", "Entry", "Free", "Utf8", "Symbols", "Table", "fn", "raw", "result", "native",
    "missing", "resolve", "ptr", "i", "handler", "slot", "Gate", "Entries", "FreeSlots",
    "Pointers", "Lookup", "Dispatch", "Register", "Unregister", "Slots", "CreateFreeSlots",
    "Handle", "FromHandle", "Dispose",
];

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "bool", "byte", "complex64",
    "complex128", "error", "float32", "float64", "int", "int8", "int16", "int32", "int64",
    "rune", "string", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr", "true",
    "false", "iota", "nil", "append", "cap", "clear", "close", "complex", "copy", "delete",
    "imag", "len", "make", "max", "min", "new", "panic", "print", "println", "real",
    "recover", "any", "C", "unsafe", "fmt", "sync",
];

const GO_SCAFFOLDING: &[&str] = &[
    "Init", "table", "symbols", "raw", "result", "slot", "fn", "r", "resolved", "mustResolve",
    "missing", "ptr", "index", "native", "ok", "zero", "fmt", "os", "recovered",
];

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    "self",
];

const LUA_SCAFFOLDING: &[&str] = &[
    "ffi", "M", "init", "entry", "entries", "symbols", "signatures", "raw", "result", "buf",
    "fn", "handlers", "free", "thunks", "thunk", "handler", "slot", "missing", "address", "i",
    "copy_array", "values", "out_len", "ok",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield", "match", "case", "type", "self", "cls",
    "ctypes", "enum", "threading", "list", "str", "int", "float", "bool", "object", "len",
    "range",
];

const PYTHON_SCAFFOLDING: &[&str] = &[
    "init", "result", "raw", "native", "handler", "slot", "trampoline", "missing", "i",
    "warnings", "address", "traceback", "_missing_",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
    "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box",
    "do", "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual",
    "yield", "union", "std", "core", "alloc",
];

const RUST_SCAFFOLDING: &[&str] = &[
    "init", "entry", "free", "TABLE", "SYMBOLS", "FREE", "callback_registry", "raw", "result",
    "f", "copy_string", "copy_vec", "Handler", "SLOTS", "REGISTRY", "TRAMPOLINES", "trampoline",
    "handler", "register", "unregister", "missing", "ptr", "CStr", "CString", "c_char",
    "c_void", "AtomicPtr", "Ordering", "c_string",
];

/// Language keywords for `target`.
pub fn keywords(target: Target) -> &'static [&'static str] {
    match target {
        Target::C => C_KEYWORDS,
        Target::Cpp => CPP_KEYWORDS,
        Target::DLang => DLANG_KEYWORDS,
        Target::DotNet => DOTNET_KEYWORDS,
        Target::Golang => GO_KEYWORDS,
        Target::Lua => LUA_KEYWORDS,
        Target::Python => PYTHON_KEYWORDS,
        Target::Rust => RUST_KEYWORDS,
    }
}

/// Identifiers declared by the emitted scaffolding for `target`.
pub fn scaffolding(target: Target) -> &'static [&'static str] {
    match target {
        Target::C => C_SCAFFOLDING,
        Target::Cpp => CPP_SCAFFOLDING,
        Target::DLang => DLANG_SCAFFOLDING,
        Target::DotNet => DOTNET_SCAFFOLDING,
        Target::Golang => GO_SCAFFOLDING,
        Target::Lua => LUA_SCAFFOLDING,
        Target::Python => PYTHON_SCAFFOLDING,
        Target::Rust => RUST_SCAFFOLDING,
    }
}

/// True when `name` may not be used verbatim as an identifier in `target`.
///
/// C headers are also included from C++ translation units, so C++ keywords count for C.
pub fn is_reserved(target: Target, name: &str) -> bool {
    let cpp_header = target == Target::C && CPP_KEYWORDS.contains(&name);
    cpp_header || keywords(target).contains(&name) || scaffolding(target).contains(&name)
}
