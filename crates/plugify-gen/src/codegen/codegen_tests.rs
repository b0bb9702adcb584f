#![allow(non_snake_case)]

use super::*;
use crate::classes::synthesize;
use plugify_gen_manifest::{IntRepr, load};
use test_case::test_case;

const GAME: &str = r#"{
    "name": "game",
    "version": "1.2.0",
    "description": "Game plugin API",
    "enums": [{ "name": "Team", "type": "int32", "members": [
        { "name": "Red", "value": 0 }, { "name": "Blue", "value": 1 }
    ]}],
    "callbacks": [{ "name": "OnTick", "params": [{ "name": "dt", "type": "float" }],
        "return": { "type": "bool" } }],
    "functions": [
        { "name": "CreateEntity", "params": [{ "name": "name", "type": "string" }],
          "return": { "type": "ptr64" } },
        { "name": "GetEntityName", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "string" } },
        { "name": "GetEntityTeam", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "Team" } },
        { "name": "GetEntityPosition", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "vec3" } },
        { "name": "DestroyEntity", "params": [{ "name": "entity", "type": "ptr64" }] },
        { "name": "Sum", "params": [{ "name": "values", "type": "int32[]" }],
          "return": { "type": "int64" } },
        { "name": "SetTickCallback", "params": [{ "name": "callback", "type": "OnTick" }] },
        { "name": "GetScores", "params": [], "return": { "type": "int32[]" },
          "deprecated": "use GetScoreboard" }
    ]
}"#;

const PLAIN: &str = r#"{
    "name": "math",
    "functions": [
        { "name": "Add", "params": [{ "name": "a", "type": "int32" }, { "name": "b", "type": "int32" }],
          "return": { "type": "int32" } }
    ]
}"#;

fn render(text: &str, target: Target, options: &GeneratorOptions) -> GenResult<Files> {
    let pkg = load(text).unwrap();
    let classes = if target.supports_classes() {
        synthesize(&pkg).classes
    } else {
        Vec::new()
    };
    generate(&pkg, &classes, target, options)
}

fn render_default(text: &str, target: Target) -> Files {
    render(text, target, &GeneratorOptions::default()).unwrap()
}

fn file_names(files: &Files) -> Vec<&str> {
    files.keys().map(String::as_str).collect()
}

// ============================================================================
// File sets and headers
// ============================================================================

#[test_case(Target::C, &["game.c", "game.h"])]
#[test_case(Target::Cpp, &["game.hpp"])]
#[test_case(Target::DLang, &["game.d"])]
#[test_case(Target::DotNet, &["Game.cs"])]
#[test_case(Target::Golang, &["game.go", "game.h", "game_export.go"])]
#[test_case(Target::Lua, &["game.lua"])]
#[test_case(Target::Python, &["game.py"])]
#[test_case(Target::Rust, &["game.rs"])]
fn generate___game_manifest___emits_target_file_set(target: Target, expected: &[&str]) {
    let files = render_default(GAME, target);

    assert_eq!(file_names(&files), expected);
}

#[test]
fn generate___go_without_callbacks___skips_export_file() {
    let files = render_default(PLAIN, Target::Golang);

    assert_eq!(file_names(&files), ["math.go", "math.h"]);
}

#[test_case(Target::C)]
#[test_case(Target::Cpp)]
#[test_case(Target::DLang)]
#[test_case(Target::DotNet)]
#[test_case(Target::Golang)]
#[test_case(Target::Lua)]
#[test_case(Target::Python)]
#[test_case(Target::Rust)]
fn generate___every_file___carries_generated_banner(target: Target) {
    let files = render_default(GAME, target);

    for (name, code) in &files {
        let banner = code
            .lines()
            .take(3)
            .map(str::to_lowercase)
            .find(|line| line.contains("generated by plugify-gen"));
        let banner = banner.unwrap_or_else(|| panic!("{name} has no banner"));
        assert!(banner.contains(VERSION), "{name}: {banner}");
        assert!(banner.contains("game 1.2.0"), "{name}: {banner}");
        assert!(banner.contains("do not edit"), "{name}: {banner}");
    }
}

#[test_case(Target::C)]
#[test_case(Target::Cpp)]
#[test_case(Target::DLang)]
#[test_case(Target::DotNet)]
#[test_case(Target::Golang)]
#[test_case(Target::Lua)]
#[test_case(Target::Python)]
#[test_case(Target::Rust)]
fn generate___same_input___is_byte_identical(target: Target) {
    let first = render_default(GAME, target);
    let second = render_default(GAME, target);

    assert_eq!(first, second);
}

// ============================================================================
// Entry-point table
// ============================================================================

#[test_case(Target::C)]
#[test_case(Target::Cpp)]
#[test_case(Target::DLang)]
#[test_case(Target::DotNet)]
#[test_case(Target::Golang)]
#[test_case(Target::Lua)]
#[test_case(Target::Python)]
#[test_case(Target::Rust)]
fn generate___plugin_allocated_returns___resolve_free(target: Target) {
    let files = render_default(GAME, target);

    let all: String = files.values().cloned().collect();
    assert!(all.contains("\"game.Free\""));
    assert!(all.contains("\"game.CreateEntity\""));
    assert!(all.contains("\"game.GetScores\""));
}

#[test_case(Target::C)]
#[test_case(Target::Cpp)]
#[test_case(Target::DLang)]
#[test_case(Target::DotNet)]
#[test_case(Target::Golang)]
#[test_case(Target::Lua)]
#[test_case(Target::Python)]
#[test_case(Target::Rust)]
fn generate___no_plugin_allocated_returns___omits_free(target: Target) {
    let files = render_default(PLAIN, target);

    let all: String = files.values().cloned().collect();
    assert!(all.contains("\"math.Add\""));
    assert!(!all.contains("\"math.Free\""));
}

#[test]
fn Context___table_symbols___lists_functions_then_free() {
    let pkg = load(GAME).unwrap();
    let ctx = Context::new(&pkg, &[], Target::C, &GeneratorOptions::default()).unwrap();

    let symbols = ctx.table_symbols();

    assert_eq!(symbols.len(), pkg.functions.len() + 1);
    assert_eq!(symbols[0], "game.CreateEntity");
    assert_eq!(symbols[ctx.free_index()], "game.Free");
}

// ============================================================================
// Callback registries
// ============================================================================

#[test_case(Target::C, "game.c", "static bool OnTick_Trampoline")]
#[test_case(Target::Golang, "game.h", "static bool game_OnTick_trampoline")]
#[test_case(Target::DotNet, "Game.cs", "private static byte Trampoline")]
#[test_case(Target::Rust, "game.rs", "Some(trampoline::<")]
fn generate___callback___emits_one_trampoline_per_slot(target: Target, file: &str, marker: &str) {
    let options = GeneratorOptions::default().with_callback_slots(5);
    let files = render(GAME, target, &options).unwrap();

    let code = &files[file];
    let definitions = code.lines().filter(|line| line.contains(marker)).count();
    assert_eq!(definitions, 5, "{code}");
}

#[test_case(Target::Cpp, "game.hpp", "Slots = 3")]
#[test_case(Target::DLang, "game.d", "enum size_t slots = 3;")]
#[test_case(Target::Lua, "game.lua", "SLOTS = 3")]
#[test_case(Target::Python, "game.py", "SLOTS = 3")]
#[test_case(Target::Golang, "game.go", "OnTickSlots = 3")]
fn generate___callback___declares_slot_count(target: Target, file: &str, expected: &str) {
    let options = GeneratorOptions::default().with_callback_slots(3);
    let files = render(GAME, target, &options).unwrap();

    assert!(files[file].contains(expected), "{}", files[file]);
}

#[test]
fn generate___go_exports___are_declared_for_cgo() {
    let files = render_default(GAME, Target::Golang);

    let exports = &files["game_export.go"];
    assert!(exports.contains("//export game_OnTick_dispatch"));
    assert!(exports.contains("#define GAME_DECLARATIONS_ONLY"));
}

#[test_case(Target::Python)]
#[test_case(Target::Lua)]
fn generate___by_ref_callback_param_in_scripted_target___is_rejected(target: Target) {
    let text = r#"{ "name": "pkg",
        "callbacks": [{ "name": "OnHit", "params": [{ "name": "hp", "type": "int32", "ref": true }] }],
        "functions": [{ "name": "Listen", "params": [{ "name": "cb", "type": "OnHit" }] }] }"#;

    let err = render(text, target, &GeneratorOptions::default()).unwrap_err();

    assert_eq!(err.error_code(), 4);
    assert!(err.to_string().contains("OnHit"));
}

#[test]
fn generate___by_ref_callback_param_in_rust___is_accepted() {
    let text = r#"{ "name": "pkg",
        "callbacks": [{ "name": "OnHit", "params": [{ "name": "hp", "type": "int32", "ref": true }] }],
        "functions": [{ "name": "Listen", "params": [{ "name": "cb", "type": "OnHit" }] }] }"#;

    let files = render(text, Target::Rust, &GeneratorOptions::default()).unwrap();

    assert!(files["pkg.rs"].contains("pub mod on_hit_registry"));
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn generate___rust___renders_enum_as_transparent_newtype() {
    let files = render_default(GAME, Target::Rust);

    let code = &files["game.rs"];
    assert!(code.contains("pub struct Team(pub i32);"));
    assert!(code.contains("pub const RED: Self = Self(0);"));
    assert!(code.contains("pub const BLUE: Self = Self(1);"));
}

#[test]
fn generate___dotnet___marks_deprecated_functions_obsolete() {
    let files = render_default(GAME, Target::DotNet);

    assert!(files["Game.cs"].contains("[Obsolete(\"use GetScoreboard\")]"));
}

#[test]
fn generate___dlang___marks_deprecated_functions() {
    let files = render_default(GAME, Target::DLang);

    assert!(files["game.d"].contains("deprecated(\"use GetScoreboard\")"));
}

#[test_case(Target::Cpp, "class Entity")]
#[test_case(Target::DLang, "struct Entity")]
#[test_case(Target::DotNet, "public sealed class Entity : IDisposable")]
#[test_case(Target::Golang, "type Entity struct")]
#[test_case(Target::Lua, "local Entity")]
#[test_case(Target::Python, "class Entity")]
#[test_case(Target::Rust, "pub struct Entity")]
fn generate___handle_family___emits_class(target: Target, expected: &str) {
    let files = render_default(GAME, target);

    let all: String = files.values().cloned().collect();
    assert!(all.contains(expected), "{all}");
}

#[test]
fn generate___without_classes___emits_no_wrappers() {
    let pkg = load(GAME).unwrap();

    let files = generate(&pkg, &[], Target::DotNet, &GeneratorOptions::default()).unwrap();

    assert!(!files["Game.cs"].contains("class Entity"));
}

#[test]
fn generate___c___never_emits_classes() {
    let files = render_default(GAME, Target::C);

    assert!(!files["game.h"].contains("Entity_GetName"));
}

// ============================================================================
// Helpers
// ============================================================================

#[test_case(0, IntRepr::new(32, true), "0")]
#[test_case(7, IntRepr::new(32, false), "7U")]
#[test_case(-3, IntRepr::new(64, true), "-3LL")]
#[test_case(i64::MIN, IntRepr::new(64, true), "(-9223372036854775807LL - 1)")]
#[test_case(42, IntRepr::new(64, false), "42ULL")]
fn c_int_literal___suffixes_by_width(value: i64, repr: IntRepr, expected: &str) {
    assert_eq!(super::c::c_int_literal(value, repr), expected);
}

#[test]
fn quote___escapes_control_and_quote_characters() {
    assert_eq!(quote("a \"b\"\n\\"), r#""a \"b\"\n\\""#);
}

#[test]
fn doc_lines___trims_trailing_whitespace() {
    assert_eq!(doc_lines(Some("first  \nsecond")), ["first", "second"]);
    assert!(doc_lines(None).is_empty());
}

const HEAL: &str = r#"{
    "name": "med",
    "functions": [{ "name": "Heal", "params": [{ "name": "hp", "type": "int32", "ref": true }] }]
}"#;

#[test_case(Target::Cpp, "med.hpp", "int32_t& hp")]
#[test_case(Target::DLang, "med.d", "ref int hp")]
#[test_case(Target::DotNet, "Med.cs", "ref int hp")]
#[test_case(Target::Golang, "med.go", "hp *int32")]
#[test_case(Target::Rust, "med.rs", "hp: &mut i32")]
fn generate___by_ref_param___uses_target_reference_form(target: Target, file: &str, expected: &str) {
    let files = render_default(HEAL, target);

    assert!(files[file].contains(expected), "{target}: {expected}");
}

const HOSTILE_DOCS: &str = r#"{
    "name": "docs",
    "description": "Package */ int header_broken;",
    "enums": [{ "name": "Mode", "doc": "Enum */ int enum_broken;", "members": [
        { "name": "Off", "value": 0, "doc": "Member */ int member_broken;" }
    ]}],
    "functions": [
        { "name": "Greet", "doc": "Say \"hi\"", "params": [] },
        { "name": "Pick", "params": [{ "name": "mode", "type": "Mode", "doc": "Param */ int param_broken;" }] }
    ]
}"#;

#[test_case(Target::C, "docs.h")]
#[test_case(Target::C, "docs.c")]
#[test_case(Target::Cpp, "docs.hpp")]
fn generate___comment_terminator_in_docs___stays_inside_comment(target: Target, file: &str) {
    let files = render_default(HOSTILE_DOCS, target);

    let code = &files[file];
    for line in code.lines() {
        if let Some(end) = line.find("*/") {
            assert!(!line[end..].contains("broken"), "{file}: {line}");
        }
    }
    assert!(code.contains("*\\/ int "), "{file}");
}

#[test]
fn generate___python_docstring_ending_in_quote___is_escaped() {
    let files = render_default(HOSTILE_DOCS, Target::Python);

    assert!(files["docs.py"].contains(r##"    """Say "hi\"""""##));
}

#[test]
fn block_comment_text___breaks_comment_terminator() {
    assert_eq!(block_comment_text("a */ b"), "a *\\/ b");
    assert_eq!(block_comment_text("plain"), "plain");
}

#[test_case(Target::Cpp, "game.hpp", "catch (...)")]
#[test_case(Target::Python, "game.py", "except Exception:")]
#[test_case(Target::Lua, "game.lua", "pcall(function()")]
#[test_case(Target::Golang, "game_export.go", "recover()")]
#[test_case(Target::Rust, "game.rs", "catch_unwind")]
fn generate___callback_trampoline___guards_against_unwinding(target: Target, file: &str, guard: &str) {
    let files = render_default(GAME, target);

    assert!(files[file].contains(guard), "{file} lacks {guard}");
}

#[test]
fn generate___lua_failing_handler___returns_zero_value() {
    let files = render_default(GAME, Target::Lua);

    let code = &files["game.lua"];
    let guard = code.find("if not ok then").unwrap();
    assert!(code[guard..].contains("io.stderr:write(tostring(result)"));
    assert!(code[guard..].contains("return false"));
}

#[test]
fn generate___python_enum___decodes_unlisted_values() {
    let files = render_default(GAME, Target::Python);

    let code = &files["game.py"];
    let team = code.find("class Team(enum.IntEnum):").unwrap();
    let body = &code[team..];
    assert!(body.contains("    def _missing_(cls, value):"));
    assert!(body.contains("member = int.__new__(cls, value)"));
    assert!(code.contains("Team(_entry("));
}

const WRAPPED: &str = r#"{
    "name": "timers",
    "enums": [{ "name": "Tone", "type": "uint8", "members": [{ "name": "Soft" }, { "name": "Loud" }] }],
    "functions": [
        { "name": "CreateTimer", "params": [{ "name": "delay", "type": "double" }], "return": { "type": "int64" } },
        { "name": "KillTimer", "params": [{ "name": "timer", "type": "int64" }] },
        { "name": "GetTimerGroup", "params": [{ "name": "timer", "type": "int64" }], "return": { "type": "int64" } },
        { "name": "AdoptTimer", "params": [{ "name": "group", "type": "int64" }, { "name": "timer", "type": "int64" }] },
        { "name": "Beep", "params": [
            { "name": "amount", "type": "int32" },
            { "name": "tone", "type": "Tone", "default": 1 },
            { "name": "quiet", "type": "bool", "default": 0 }
        ] }
    ],
    "classes": [
        { "name": "Timer", "handleType": "int64", "invalidValue": -1, "constructors": ["CreateTimer"], "destructor": "KillTimer",
          "bindings": [{ "name": "GetGroup", "method": "GetTimerGroup", "bindSelf": true, "retAlias": { "name": "Group" } }] },
        { "name": "Group", "handleType": "int64",
          "bindings": [{ "name": "Adopt", "method": "AdoptTimer", "bindSelf": true,
                         "paramAliases": [{ "name": "Timer", "owner": true }] }] }
    ]
}"#;

#[test_case(Target::Cpp, "timers.hpp", &["handle_ != -1", "timer.Release()", "return Group(::timers::GetTimerGroup(handle_));"])]
#[test_case(Target::DLang, "timers.d", &["handle != -1", "timer.release()", "return Group("])]
#[test_case(Target::DotNet, "Timers.cs", &["Handle != -1", "timer.Release()", "=> new(Api."])]
#[test_case(Target::Golang, "timers.go", &["r.handle != -1", "timer.Release()", "return &Group{handle: "])]
#[test_case(Target::Lua, "timers.lua", &["self.handle ~= -1", "timer:release()", "M.Group.new(M."])]
#[test_case(Target::Python, "timers.py", &["self._handle != -1", "timer.release()", "return Group("])]
#[test_case(Target::Rust, "timers.rs", &["self.handle != -1", "timer.into_handle()", "Group::from_handle("])]
fn generate___declared_class_options___reach_wrappers(target: Target, file: &str, expected: &[&str]) {
    let files = render_default(WRAPPED, target);

    let code = &files[file];
    for fragment in expected {
        assert!(code.contains(fragment), "{file} lacks {fragment}");
    }
}

#[test]
fn generate___cpp_aliased_method___is_defined_after_every_class() {
    let files = render_default(WRAPPED, Target::Cpp);

    let code = &files["timers.hpp"];
    let forward = code.find("class Group;").unwrap();
    let group = code.find("class Group {").unwrap();
    let definition = code.find("inline Group Timer::GetGroup() const {").unwrap();
    assert!(forward < group && group < definition);
}

#[test_case(Target::Cpp, "timers.hpp", "Tone tone = static_cast<Tone>(1), bool quiet = false)")]
#[test_case(Target::DLang, "timers.d", "Tone tone = cast(Tone) 1, bool quiet = false)")]
#[test_case(Target::DotNet, "Timers.cs", "Tone tone = (Tone)1, bool quiet = false)")]
#[test_case(Target::Python, "timers.py", "tone: Tone = Tone(1), quiet: bool = False)")]
#[test_case(Target::Lua, "timers.lua", "    if quiet == nil then\n        quiet = false\n    end\n")]
fn generate___trailing_defaults___are_rendered(target: Target, file: &str, expected: &str) {
    let files = render_default(WRAPPED, target);

    assert!(files[file].contains(expected), "{file}");
}

#[test]
fn context___collects_strategies_of_every_signature() {
    let pkg = load(GAME).unwrap();
    let ctx = Context::new(&pkg, &[], Target::Cpp, &GeneratorOptions::default()).unwrap();

    for strategy in [
        Strategy::ByValue,
        Strategy::OwnedString,
        Strategy::Sequence,
        Strategy::Callback,
        Strategy::OpaqueHandle,
    ] {
        assert!(ctx.uses(strategy), "{strategy:?}");
    }
    assert!(!ctx.uses(Strategy::ByReference));
    assert!(!ctx.uses(Strategy::BorrowedString));
}

#[test_case(PLAIN, "math.hpp", &[], &["<string>", "<vector>", "<functional>"] ; "scalars only")]
#[test_case(GAME, "game.hpp", &["<string>", "<vector>", "<functional>", "<mutex>"], &[] ; "strings arrays and callbacks")]
fn generate___cpp_includes___follow_used_strategies(text: &str, file: &str, present: &[&str], absent: &[&str]) {
    let files = render_default(text, Target::Cpp);

    let code = &files[file];
    for include in present {
        assert!(code.contains(&format!("#include {include}")), "missing {include}");
    }
    for include in absent {
        assert!(!code.contains(&format!("#include {include}")), "unexpected {include}");
    }
}

#[test]
fn generate___c_header_with_cpp_keywords___renames_them() {
    let text = r#"{ "name": "kw", "enums": [{ "name": "class", "members": [{ "name": "A" }] }],
        "functions": [{ "name": "delete", "params": [{ "name": "template", "type": "class" }] }] }"#;

    let files = render_default(text, Target::C);

    let header = &files["kw.h"];
    assert!(header.contains("typedef int32_t class_;"));
    assert!(header.contains("void delete_(class_ template_);"));
    assert!(!header.contains(" class;"));
}

#[test]
fn generate___rust_owned_string_param___truncates_at_first_nul() {
    let files = render_default(GAME, Target::Rust);

    let code = &files["game.rs"];
    assert!(code.contains("fn c_string(text: &str) -> CString {"));
    assert!(code.contains("let end = text.find('\\0').unwrap_or(text.len());"));
    assert!(code.contains("let name = c_string(name);"));
    assert!(!code.contains("CString::new(name)"));
}

#[test]
fn generate___rust_without_string_params___omits_c_string_helper() {
    let files = render_default(PLAIN, Target::Rust);

    assert!(!files["math.rs"].contains("fn c_string"));
}
