//! Unified view over all dex containers of one application package.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use dexemu_dex::dex::ClassItem;
use dexemu_dex::{AccessFlags, Dex};
use dexemu_zip::ZipEntry;

use crate::errors::EmuError;

/// One method defined by the program (an entry in some class-data item).
#[derive(Debug, Clone)]
pub struct MethodRecord {
    /// Which container defines the method
    pub dex_index: usize,
    /// Index into that container's `method_ids`
    pub local_index: u32,
    /// Class descriptor, `Lpkg/Class;` form
    pub class: String,
    pub name: String,
    /// Textual prototype, `(param types)return` with space-separated params
    pub descriptor: String,
    pub access_flags: AccessFlags,
    /// Offset of the code item inside the container, 0 when bytecode-less
    pub code_off: u32,
}

impl MethodRecord {
    pub fn signature(&self) -> String {
        format!("{}->{}", self.class, self.name)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.is_static()
    }
}

/// All parsed containers plus the unified method index.
#[derive(Debug, Default)]
pub struct Program {
    pub dexes: Vec<Dex>,
    /// Cumulative method counts of the preceding containers
    method_offsets: Vec<usize>,
    /// Every method that appears in some class-data item, encounter order
    pub methods: Vec<MethodRecord>,
}

impl Program {
    /// Load an archive from disk and parse every `classes*.dex` member.
    pub fn from_apk_path(path: &Path) -> Result<Program, EmuError> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;

        let zip = ZipEntry::new(input)?;

        let mut names: Vec<String> = zip
            .namelist()
            .filter(|name| is_classes_dex(name))
            .map(str::to_string)
            .collect();
        names.sort();

        if names.is_empty() {
            return Err(EmuError::NoDexEntries);
        }

        let mut buffers = Vec::with_capacity(names.len());
        for name in &names {
            buffers.push(zip.read(name)?);
        }

        Self::from_containers(buffers)
    }

    /// Build a program from already-extracted container buffers.
    pub fn from_containers(buffers: Vec<Vec<u8>>) -> Result<Program, EmuError> {
        let mut dexes = Vec::with_capacity(buffers.len());
        for buffer in buffers {
            dexes.push(Dex::new(buffer)?);
        }

        let mut program = Program {
            dexes,
            method_offsets: Vec::new(),
            methods: Vec::new(),
        };
        program.build_index();

        Ok(program)
    }

    /// A program with no containers, useful for driving the interpreter
    /// over hand-assembled bytecode.
    pub fn empty() -> Program {
        Program::default()
    }

    fn build_index(&mut self) {
        let mut offset = 0usize;
        for dex in &self.dexes {
            self.method_offsets.push(offset);
            offset += dex.method_ids.len();
        }

        for dex_index in 0..self.dexes.len() {
            let dex = &self.dexes[dex_index];
            for class_def in &dex.class_defs {
                let Some(class_data) = dex.class_data(class_def.class_data_off) else {
                    continue;
                };
                let class = class_def
                    .get_name(dex)
                    .map(|name| name.into_owned())
                    .unwrap_or_default();

                for method in class_data
                    .direct_methods
                    .iter()
                    .chain(class_data.virtual_methods.iter())
                {
                    let Some(item) = dex.method_ids.get(method.method_idx as usize) else {
                        continue;
                    };
                    let name = item
                        .get_name(dex)
                        .map(|name| name.into_owned())
                        .unwrap_or_default();
                    let descriptor = item
                        .get_prototype(dex)
                        .map(|proto| proto.text(dex))
                        .unwrap_or_else(|| "()V".to_string());

                    self.methods.push(MethodRecord {
                        dex_index,
                        local_index: method.method_idx,
                        class: class.clone(),
                        name,
                        descriptor,
                        access_flags: method.access_flags,
                        code_off: method.code_off,
                    });
                }
            }
        }
    }

    pub fn dex_count(&self) -> usize {
        self.dexes.len()
    }

    /// Total method-id entries across all containers.
    pub fn global_method_count(&self) -> usize {
        self.method_offsets
            .last()
            .map(|&off| off + self.dexes.last().map(|d| d.method_ids.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Map a global method index to its `(container, local index)` pair.
    pub fn resolve_global(&self, global: usize) -> Option<(usize, usize)> {
        if global >= self.global_method_count() {
            return None;
        }
        let dex_index = self
            .method_offsets
            .partition_point(|&offset| offset <= global)
            .saturating_sub(1);
        Some((dex_index, global - self.method_offsets[dex_index]))
    }

    /// Map a `(container, local index)` pair back to its global index.
    pub fn global_index(&self, dex_index: usize, local: usize) -> Option<usize> {
        let offset = self.method_offsets.get(dex_index)?;
        Some(offset + local)
    }

    /// Full textual reference for a method id: `LClass;->name(params)ret`.
    pub fn method_ref_text(&self, dex_index: usize, local: usize) -> Option<String> {
        let dex = self.dexes.get(dex_index)?;
        let item = dex.method_ids.get(local)?;
        let class = item.get_class(dex)?;
        let name = item.get_name(dex)?;
        let proto = item.get_prototype(dex)?.text(dex);
        Some(format!("{class}->{name}{proto}"))
    }

    /// Every defined method that carries bytecode, in encounter order.
    pub fn iter_code_methods(&self) -> impl Iterator<Item = (usize, &MethodRecord)> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, record)| record.code_off != 0)
    }

    /// Locate the class definition for a descriptor, if the program has one.
    pub fn find_class_def(&self, class: &str) -> Option<(usize, &ClassItem)> {
        for (dex_index, dex) in self.dexes.iter().enumerate() {
            for class_def in &dex.class_defs {
                if class_def.get_name(dex).as_deref() == Some(class) {
                    return Some((dex_index, class_def));
                }
            }
        }
        None
    }
}

/// Match `classes.dex`, `classes2.dex`, ... without reaching for a regex.
fn is_classes_dex(name: &str) -> bool {
    if !name.starts_with("classes") || !name.ends_with(".dex") {
        return false;
    }

    let middle = &name["classes".len()..name.len() - ".dex".len()];
    middle.is_empty() || middle.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_dex_matcher() {
        assert!(is_classes_dex("classes.dex"));
        assert!(is_classes_dex("classes2.dex"));
        assert!(is_classes_dex("classes15.dex"));
        assert!(!is_classes_dex("classesx.dex"));
        assert!(!is_classes_dex("lib/classes.dex"));
        assert!(!is_classes_dex("classes.dex.bak"));
    }

    #[test]
    fn empty_program_resolves_nothing() {
        let program = Program::empty();
        assert_eq!(program.global_method_count(), 0);
        assert!(program.resolve_global(0).is_none());
    }
}
