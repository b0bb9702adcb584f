//! Callback marshalling rules.
//!
//! A callback parameter hands the plugin a native function pointer that it may call at any
//! later time. Each emitter builds a registry per callback type: a fixed array of slots, a
//! LIFO free list and one trampoline per slot. Trampoline `N` forwards to the closure most
//! recently registered in slot `N`; an empty slot returns the zero value of the return type.
//!
//! This module decides which callback signatures each target can trampoline safely and in
//! which order callback types must be declared.

use crate::error::{GenError, GenResult};
use crate::target::Target;
use plugify_gen_manifest::{CallbackId, CallbackType, Ownership, Package, TypeRef};
use std::collections::BTreeSet;

/// Reject callback signatures `target` cannot trampoline.
pub fn check(pkg: &Package, target: Target) -> GenResult<()> {
    for callback in &pkg.callbacks {
        check_callback(callback, target)?;
    }
    Ok(())
}

fn check_callback(callback: &CallbackType, target: Target) -> GenResult<()> {
    let fail = |reason: &str| Err(GenError::mapping(target, &callback.name, reason));
    let native = target.has_native_pointers();
    let scripted = matches!(target, Target::Python | Target::Lua);

    match &callback.ret.ty {
        TypeRef::Array(_) => {
            return fail("callbacks cannot return arrays: no allocator contract for the result");
        }
        TypeRef::Str(Ownership::Owned) => {
            return fail("callbacks cannot return owned strings: no allocator contract for the result");
        }
        TypeRef::Str(Ownership::Borrowed) if !native => {
            return fail("borrowed string returns need a target with native pointers");
        }
        TypeRef::Shared(_) if scripted => {
            return fail("shared value types cannot be returned from callbacks in this target");
        }
        TypeRef::Callback(_) if !native => {
            return fail("callback types cannot be returned from callbacks in this target");
        }
        _ => {}
    }

    for param in &callback.params {
        let mut has_callback = false;
        param.ty.walk(&mut |t| has_callback |= matches!(t, TypeRef::Callback(_)));
        if has_callback && !native {
            return fail("callback types cannot be passed to callbacks in this target");
        }
        if target == Target::Lua && matches!(param.ty, TypeRef::Shared(_)) {
            return fail("LuaJIT callbacks cannot take structs by value");
        }
        if param.by_ref && scripted {
            return fail("by-reference callback parameters are not supported in this target");
        }
    }
    Ok(())
}

fn references(callback: &CallbackType) -> BTreeSet<CallbackId> {
    let mut refs = BTreeSet::new();
    for ty in callback
        .params
        .iter()
        .map(|p| &p.ty)
        .chain(std::iter::once(&callback.ret.ty))
    {
        ty.walk(&mut |t| {
            if let TypeRef::Callback(id) = t {
                refs.insert(*id);
            }
        });
    }
    refs
}

/// Callback declaration order: every callback after the callbacks it references, ties broken
/// by manifest order. The loader rejects cycles, so every callback is placed.
pub fn emission_order(pkg: &Package) -> Vec<CallbackId> {
    let count = pkg.callbacks.len();
    let refs: Vec<BTreeSet<CallbackId>> = pkg.callbacks.iter().map(references).collect();
    let mut remaining: Vec<usize> = refs.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..count).filter(|i| remaining[*i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(next) = ready.pop_first() {
        order.push(CallbackId(next));
        for (i, deps) in refs.iter().enumerate() {
            if deps.contains(&CallbackId(next)) {
                remaining[i] -= 1;
                if remaining[i] == 0 {
                    ready.insert(i);
                }
            }
        }
    }
    order
}

#[cfg(test)]
#[path = "callbacks/callbacks_tests.rs"]
mod callbacks_tests;
