use alloy_dyn_abi::DynSolType;

use crate::codec::entry::{NamedArg, TypeDescriptor};

/// Worst-case on-chain byte size for an argument list, with `n` bounding
/// the element count of every dynamic-length member.
///
/// Top-level params are laid out exactly like a tuple of the arguments,
/// so the walk is the struct walk: each member contributes its own bound
/// plus one 32-byte offset slot when it is dynamic (dynamic members are
/// encoded out-of-line behind an offset pointer).
pub(crate) fn max_size_of_args(args: &[NamedArg], n: usize) -> usize {
    let (size, _) = members_size(args.iter().map(|arg| &arg.ty), n);
    size
}

fn max_size(ty: &TypeDescriptor, n: usize) -> (usize, bool) {
    match ty {
        // length slot plus the payload padded to full words
        TypeDescriptor::Scalar(DynSolType::Bytes | DynSolType::String) => {
            (32 + 32 * n.div_ceil(32), true)
        }
        TypeDescriptor::Scalar(_) => (32, false),
        TypeDescriptor::FixedArray(elem, count) => {
            let (size, dynamic) = max_size(elem, n);
            let per_element = size + if dynamic { 32 } else { 0 };
            (per_element * count, dynamic)
        }
        TypeDescriptor::Array(elem) => {
            let (size, dynamic) = max_size(elem, n);
            let per_element = size + if dynamic { 32 } else { 0 };
            (32 + n * per_element, true)
        }
        TypeDescriptor::Struct(fields) => members_size(fields.iter().map(|(_, ty)| ty), n),
    }
}

fn members_size<'a>(
    members: impl Iterator<Item = &'a TypeDescriptor>,
    n: usize,
) -> (usize, bool) {
    let mut total = 0;
    let mut dynamic = false;
    for ty in members {
        let (size, member_dynamic) = max_size(ty, n);
        total += size + if member_dynamic { 32 } else { 0 };
        dynamic |= member_dynamic;
    }
    (total, dynamic)
}
