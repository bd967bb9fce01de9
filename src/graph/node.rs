//! Uniform attribute access over graph nodes.
//!
//! Each node kind exposes a fixed table of derived attributes through
//! `Node::resolve`. Any other name is looked up as a field of the raw
//! structure the node wraps; nodes that wrap no raw structure (files and
//! sections) reject such names with `NotAddressable`.

use crate::error::{ElfGraphError, Result};
use crate::formats::elf::{
    RawArchiveHeader, RawDataBlock, RawFileHeader, RawRelocation, RawSectionHeader, RawSymbol,
};
use crate::graph::cache::{NodeKey, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Read-only projection of a raw structure's fields by name.
pub trait FieldProjection {
    fn field_names(&self) -> &'static [&'static str];
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldProjection for RawFileHeader {
    fn field_names(&self) -> &'static [&'static str] {
        &[
            "e_type",
            "e_machine",
            "e_version",
            "e_entry",
            "e_phoff",
            "e_shoff",
            "e_flags",
            "e_ehsize",
            "e_phentsize",
            "e_phnum",
            "e_shentsize",
            "e_shnum",
            "e_shstrndx",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let v = match name {
            "e_type" => self.e_type as u64,
            "e_machine" => self.e_machine as u64,
            "e_version" => self.e_version as u64,
            "e_entry" => self.e_entry,
            "e_phoff" => self.e_phoff,
            "e_shoff" => self.e_shoff,
            "e_flags" => self.e_flags as u64,
            "e_ehsize" => self.e_ehsize as u64,
            "e_phentsize" => self.e_phentsize as u64,
            "e_phnum" => self.e_phnum as u64,
            "e_shentsize" => self.e_shentsize as u64,
            "e_shnum" => self.e_shnum as u64,
            "e_shstrndx" => self.e_shstrndx as u64,
            _ => return None,
        };
        Some(Value::Int(v))
    }
}

impl FieldProjection for RawSectionHeader {
    fn field_names(&self) -> &'static [&'static str] {
        &[
            "sh_name",
            "sh_type",
            "sh_flags",
            "sh_addr",
            "sh_offset",
            "sh_size",
            "sh_link",
            "sh_info",
            "sh_addralign",
            "sh_entsize",
        ]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let v = match name {
            "sh_name" => self.sh_name as u64,
            "sh_type" => self.sh_type as u64,
            "sh_flags" => self.sh_flags,
            "sh_addr" => self.sh_addr,
            "sh_offset" => self.sh_offset,
            "sh_size" => self.sh_size,
            "sh_link" => self.sh_link as u64,
            "sh_info" => self.sh_info as u64,
            "sh_addralign" => self.sh_addralign,
            "sh_entsize" => self.sh_entsize,
            _ => return None,
        };
        Some(Value::Int(v))
    }
}

impl FieldProjection for RawSymbol {
    fn field_names(&self) -> &'static [&'static str] {
        &["st_name", "st_value", "st_size", "st_info", "st_other", "st_shndx"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        let v = match name {
            "st_name" => self.st_name as u64,
            "st_value" => self.st_value,
            "st_size" => self.st_size,
            "st_info" => self.st_info as u64,
            "st_other" => self.st_other as u64,
            "st_shndx" => self.st_shndx as u64,
            _ => return None,
        };
        Some(Value::Int(v))
    }
}

impl FieldProjection for RawRelocation {
    fn field_names(&self) -> &'static [&'static str] {
        if self.r_addend.is_some() {
            &["r_offset", "r_info", "r_addend"]
        } else {
            &["r_offset", "r_info"]
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "r_offset" => Some(Value::Int(self.r_offset)),
            "r_info" => Some(Value::Int(self.r_info)),
            "r_addend" => self.r_addend.map(Value::Signed),
            _ => None,
        }
    }
}

impl FieldProjection for RawDataBlock {
    fn field_names(&self) -> &'static [&'static str] {
        &["d_off", "d_size", "d_buf"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "d_off" => Some(Value::Int(self.offset)),
            "d_size" => Some(Value::Int(self.size())),
            "d_buf" => Some(Value::Bytes(self.bytes.clone())),
            _ => None,
        }
    }
}

impl FieldProjection for RawArchiveHeader {
    fn field_names(&self) -> &'static [&'static str] {
        &["ar_name", "ar_date", "ar_uid", "ar_gid", "ar_mode", "ar_size"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "ar_name" => Some(Value::Text(Rc::from(self.name.as_str()))),
            "ar_date" => Some(Value::Int(self.date)),
            "ar_uid" => Some(Value::Int(self.uid)),
            "ar_gid" => Some(Value::Int(self.gid)),
            "ar_mode" => Some(Value::Int(self.mode)),
            "ar_size" => Some(Value::Int(self.size)),
            _ => None,
        }
    }
}

/// The raw structure behind a node, by value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStruct {
    FileHeader(RawFileHeader),
    SectionHeader(RawSectionHeader),
    Symbol(RawSymbol),
    Relocation(RawRelocation),
    DataBlock(RawDataBlock),
    ArchiveHeader(RawArchiveHeader),
}

impl RawStruct {
    fn projection(&self) -> &dyn FieldProjection {
        match self {
            RawStruct::FileHeader(r) => r,
            RawStruct::SectionHeader(r) => r,
            RawStruct::Symbol(r) => r,
            RawStruct::Relocation(r) => r,
            RawStruct::DataBlock(r) => r,
            RawStruct::ArchiveHeader(r) => r,
        }
    }
}

impl FieldProjection for RawStruct {
    fn field_names(&self) -> &'static [&'static str] {
        self.projection().field_names()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.projection().field(name)
    }
}

/// A node of the object graph.
pub trait Node {
    /// Structural identity within the owning file
    fn key(&self) -> NodeKey;

    /// Names of the derived attributes `resolve` recognizes
    fn attr_names(&self) -> &'static [&'static str];

    /// Compute a derived attribute; `None` if the name is not one of them.
    fn resolve(&self, name: &str) -> Option<Result<Value>>;

    /// The wrapped raw structure, if any
    fn raw_struct(&self) -> Result<Option<RawStruct>>;

    /// Look up an attribute by name.
    ///
    /// Derived attributes take precedence over raw fields of the same name.
    fn get(&self, name: &str) -> Result<Value> {
        if let Some(resolved) = self.resolve(name) {
            return resolved;
        }
        match self.raw_struct()? {
            Some(raw) => raw
                .field(name)
                .ok_or_else(|| ElfGraphError::UnknownAttribute {
                    node: self.key().to_string(),
                    name: name.to_string(),
                }),
            None => Err(ElfGraphError::NotAddressable {
                node: self.key().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Every attribute name: derived attributes, then raw fields.
    fn dir(&self) -> Result<Vec<&'static str>> {
        let mut names = self.attr_names().to_vec();
        if let Some(raw) = self.raw_struct()? {
            names.extend_from_slice(raw.field_names());
        }
        Ok(names)
    }

    /// Map of raw field name to value.
    fn to_map(&self) -> Result<BTreeMap<&'static str, Value>> {
        let raw = self.raw_struct()?.ok_or_else(|| ElfGraphError::NotAddressable {
            node: self.key().to_string(),
            name: "to_map".to_string(),
        })?;
        Ok(raw
            .field_names()
            .iter()
            .filter_map(|name| raw.field(name).map(|v| (*name, v)))
            .collect())
    }
}
