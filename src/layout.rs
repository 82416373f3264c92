use crate::ast::{Field, StructTable, FUNCTION_PTR};
use crate::catalog::{TypeCatalog, TypeInfo};
use crate::error::{Error, Result};
use crate::resolver::Resolver;
use serde::Serialize;
use std::num::NonZeroU64;
use tracing::trace;

/// Upper bound on member alignment, as set by `#pragma pack(N)`.
pub type Pack = NonZeroU64;

/// Reads a pack value the way the tool accepts it from users: `0`, empty and
/// non-numeric input all mean natural alignment.
pub fn parse_pack(value: &str) -> Option<Pack> {
    value.trim().parse::<u64>().ok().and_then(NonZeroU64::new)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BitField {
    pub name: String,
    pub bits: u64,
}

/// One placed member, or one storage unit shared by a run of bit-fields.
/// For a run, `name` lists the members separated by `", "` and `bit_fields`
/// holds each member's width in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LayoutEntry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub padding_before: u64,
    #[serde(rename = "type")]
    pub ty: String,
    pub is_array: bool,
    pub count: u64,
    pub is_pointer: bool,
    pub bit_fields: Option<Vec<BitField>>,
}

impl LayoutEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_function_ptr(&self) -> bool {
        self.ty == FUNCTION_PTR
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructLayout {
    pub fields: Vec<LayoutEntry>,
    pub total_size: u64,
    pub max_align: u64,
}

impl StructLayout {
    /// The size and alignment the struct has when used as a member.
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::new(self.total_size, self.max_align)
    }
}

/// Rounds `offset` up to a multiple of `align`. `None` when the result does
/// not fit in a `u64`.
pub fn align_up(offset: u64, align: u64) -> Option<u64> {
    if align <= 1 {
        return Some(offset);
    }

    offset.checked_add(align - 1).map(|end| end / align * align)
}

fn effective_align(natural: u64, pack: Option<Pack>) -> u64 {
    match pack {
        Some(pack) => natural.min(pack.get()),
        None => natural,
    }
}

/// Lays out the struct `name` from `structs`.
///
/// Fails with `StructNotFound` when `name` was never parsed, `UnknownType`
/// when any member type cannot be resolved and `CyclicType` when the struct
/// contains itself by value, and `LayoutTooLarge` when an offset or size
/// does not fit in a `u64`. No partial layout is ever returned.
pub fn compute_layout(
    name: &str,
    catalog: &TypeCatalog,
    structs: &StructTable,
    pack: Option<Pack>,
) -> Result<StructLayout> {
    Resolver::new(catalog, structs).layout_of(name, pack)
}

pub(crate) fn lay_out_fields(
    name: &str,
    fields: &[Field],
    resolver: &mut Resolver<'_>,
    pack: Option<Pack>,
) -> Result<StructLayout> {
    let too_large = || Error::LayoutTooLarge(name.to_string());

    let mut entries = Vec::with_capacity(fields.len());
    let mut current_offset: u64 = 0;
    let mut max_align: u64 = 1;

    let mut i = 0;
    while i < fields.len() {
        let field = &fields[i];
        let ty = field.ty.as_str();

        if let Some(first_bits) = field.bit_size {
            let storage = resolver.resolve(ty)?;
            max_align = max_align.max(storage.align);

            let offset = align_up(current_offset, effective_align(storage.align, pack))
                .ok_or_else(too_large)?;
            let capacity = storage.size.saturating_mul(8);

            // The first bit-field always opens the unit, even when it is
            // wider than the unit itself.
            let mut bit_fields = vec![BitField {
                name: field.name.clone(),
                bits: first_bits,
            }];
            let mut bits_used = first_bits;
            let mut next = i + 1;
            while let Some(candidate) = fields.get(next) {
                let Some(bits) = candidate.bit_size else {
                    break;
                };

                if candidate.ty != field.ty || bits_used.saturating_add(bits) > capacity {
                    break;
                }

                bit_fields.push(BitField {
                    name: candidate.name.clone(),
                    bits,
                });
                bits_used += bits;
                next += 1;
            }

            let run_name = bit_fields
                .iter()
                .map(|bit_field| bit_field.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");

            trace!(
                name = run_name.as_str(),
                offset,
                size = storage.size,
                bits_used,
                "placed bit-field run"
            );

            entries.push(LayoutEntry {
                name: run_name,
                offset,
                size: storage.size,
                padding_before: offset - current_offset,
                ty: ty.to_string(),
                is_array: false,
                count: 1,
                is_pointer: false,
                bit_fields: Some(bit_fields),
            });

            current_offset = offset.checked_add(storage.size).ok_or_else(too_large)?;
            i = next;
            continue;
        }

        let unit = if field.is_pointer && ty != FUNCTION_PTR {
            resolver.check_pointee(ty)?;
            resolver.pointer()
        } else {
            resolver.resolve(ty)?
        };

        let size = unit
            .size
            .checked_mul(field.array_size)
            .ok_or_else(too_large)?;
        let offset = align_up(current_offset, effective_align(unit.align, pack))
            .ok_or_else(too_large)?;

        trace!(name = field.name.as_str(), offset, size, "placed field");

        entries.push(LayoutEntry {
            name: field.name.clone(),
            offset,
            size,
            padding_before: offset - current_offset,
            ty: ty.to_string(),
            is_array: field.array_size > 1,
            count: field.array_size,
            is_pointer: field.is_pointer,
            bit_fields: None,
        });

        current_offset = offset.checked_add(size).ok_or_else(too_large)?;
        max_align = max_align.max(unit.align);
        i += 1;
    }

    // Packed structs get no tail padding.
    let total_size = match pack {
        Some(_) => current_offset,
        None => align_up(current_offset, max_align).ok_or_else(too_large)?,
    };

    Ok(StructLayout {
        fields: entries,
        total_size,
        max_align,
    })
}
