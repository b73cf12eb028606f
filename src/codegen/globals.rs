//! Global storage layout: zero page, data, RAM, and memory-mapped
//! allocation (spec.md §4.7).

use crate::codegen::target::TargetDescriptor;
use crate::ir::{Global, InitialValue, StorageClass};
use rustc_hash::FxHashMap;

/// Where a global ended up, and whether that placement is zero page
/// (cheaper addressing).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalAddress {
    pub address: u16,
    pub is_zero_page: bool,
}

/// A single data-section or RAM-section layout entry, used by the assembly
/// writer to emit `!byte`/`!word`/reserve directives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutEntry {
    Data {
        name: String,
        address: u16,
        bytes: Vec<u8>,
    },
    Reserve {
        name: String,
        address: u16,
        size: u16,
    },
}

/// Lays out every module global into zero page, data, or RAM, in
/// declaration order, and remembers each address for later lookup.
#[derive(Default)]
pub struct GlobalAllocator {
    addresses: FxHashMap<String, GlobalAddress>,
    zero_page_entries: Vec<(String, u16, u16)>,
    data_entries: Vec<LayoutEntry>,
    ram_entries: Vec<LayoutEntry>,
    zp_bytes_used: u16,
    data_size: u32,
    warnings: Vec<String>,
}

impl GlobalAllocator {
    pub fn new() -> Self {
        GlobalAllocator::default()
    }

    pub fn reset(&mut self) {
        *self = GlobalAllocator::default();
    }

    /// Allocate every global in `globals`, in order, against `target`'s
    /// zero-page range.
    pub fn allocate_all(&mut self, globals: &[Global], target: &TargetDescriptor) {
        let mut zp_cursor = target.zero_page_range.0;
        let zp_end = target.zero_page_range.1;
        let mut ram_cursor: u32 = target.ram_start as u32;
        let mut data_cursor: u32 = target.data_start as u32;

        for g in globals {
            match g.storage {
                StorageClass::ZeroPage => {
                    let size = g.ty.size_in_bytes() as u16;
                    if zp_cursor as u32 + size as u32 - 1 > zp_end as u32 {
                        self.warnings.push(format!(
                            "zero page exhausted: cannot place `{}` ({} bytes)",
                            g.name, size
                        ));
                        continue;
                    }
                    let addr = zp_cursor;
                    self.addresses.insert(
                        g.name.clone(),
                        GlobalAddress {
                            address: addr,
                            is_zero_page: true,
                        },
                    );
                    self.zero_page_entries.push((g.name.clone(), addr, size));
                    self.zp_bytes_used += size;
                    zp_cursor += size;
                }
                StorageClass::Data => {
                    let bytes = match &g.initial_value {
                        Some(init) => flatten_initial_value(init),
                        None => {
                            self.warnings.push(format!(
                                "global `{}` declared Data but has no initial value",
                                g.name
                            ));
                            vec![0u8; g.ty.size_in_bytes() as usize]
                        }
                    };
                    let addr = data_cursor as u16;
                    self.addresses.insert(
                        g.name.clone(),
                        GlobalAddress {
                            address: addr,
                            is_zero_page: false,
                        },
                    );
                    self.data_size += bytes.len() as u32;
                    data_cursor += bytes.len() as u32;
                    self.data_entries.push(LayoutEntry::Data {
                        name: g.name.clone(),
                        address: addr,
                        bytes,
                    });
                }
                StorageClass::Ram => {
                    let size = g.ty.size_in_bytes();
                    let addr = ram_cursor as u16;
                    self.addresses.insert(
                        g.name.clone(),
                        GlobalAddress {
                            address: addr,
                            is_zero_page: false,
                        },
                    );
                    self.data_size += size;
                    ram_cursor += size;
                    self.ram_entries.push(LayoutEntry::Reserve {
                        name: g.name.clone(),
                        address: addr,
                        size: size as u16,
                    });
                }
                StorageClass::Map(address) => {
                    self.addresses.insert(
                        g.name.clone(),
                        GlobalAddress {
                            address,
                            is_zero_page: address <= target.zero_page_range.1,
                        },
                    );
                }
            }
        }
    }

    pub fn address_of(&self, name: &str) -> Option<GlobalAddress> {
        self.addresses.get(name).copied()
    }

    pub fn zero_page_entries(&self) -> &[(String, u16, u16)] {
        &self.zero_page_entries
    }

    pub fn data_entries(&self) -> &[LayoutEntry] {
        &self.data_entries
    }

    pub fn ram_entries(&self) -> &[LayoutEntry] {
        &self.ram_entries
    }

    pub fn zp_bytes_used(&self) -> u16 {
        self.zp_bytes_used
    }

    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn flatten_initial_value(init: &InitialValue) -> Vec<u8> {
    match init {
        InitialValue::Byte(b) => vec![*b],
        InitialValue::Word(w) => vec![(*w & 0xFF) as u8, (*w >> 8) as u8],
        InitialValue::Array(items) => items.iter().flat_map(flatten_initial_value).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn zp_global(name: &str, ty: Type) -> Global {
        Global {
            name: name.to_string(),
            ty,
            storage: StorageClass::ZeroPage,
            initial_value: None,
            address: None,
            is_constant: false,
        }
    }

    /// spec.md §8, scenario S2.
    #[test]
    fn zero_page_allocation_is_sequential_by_declaration_order() {
        let target = TargetDescriptor::c64();
        let globals = vec![
            zp_global("counter", Type::Byte),
            zp_global("score", Type::Word),
            zp_global("flag", Type::Byte),
        ];
        let mut alloc = GlobalAllocator::new();
        alloc.allocate_all(&globals, &target);
        assert_eq!(alloc.address_of("counter").unwrap().address, target.zero_page_range.0);
        assert_eq!(alloc.address_of("score").unwrap().address, target.zero_page_range.0 + 1);
        assert_eq!(alloc.address_of("flag").unwrap().address, target.zero_page_range.0 + 3);
        assert_eq!(alloc.zp_bytes_used(), 4);
    }

    #[test]
    fn zero_page_overflow_warns_and_continues() {
        let target = TargetDescriptor::c64();
        let huge = zp_global("huge", Type::array(Type::Byte, 1000));
        let after = zp_global("after", Type::Byte);
        let mut alloc = GlobalAllocator::new();
        alloc.allocate_all(&[huge, after], &target);
        assert!(alloc.address_of("huge").is_none());
        assert!(alloc.address_of("after").is_some());
        assert_eq!(alloc.warnings().len(), 1);
    }

    #[test]
    fn map_global_is_not_allocated_but_is_looked_up() {
        let target = TargetDescriptor::c64();
        let g = Global {
            name: "borderColor".to_string(),
            ty: Type::Byte,
            storage: StorageClass::Map(0xD020),
            initial_value: None,
            address: None,
            is_constant: false,
        };
        let mut alloc = GlobalAllocator::new();
        alloc.allocate_all(&[g], &target);
        assert_eq!(alloc.address_of("borderColor").unwrap().address, 0xD020);
        assert_eq!(alloc.data_size(), 0);
    }
}
