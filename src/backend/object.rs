// Wraps emitted machine code in a relocatable ELF64 object with a .text section and
// one global symbol per function, ready for a system linker. All calls inside the
// module were resolved to relative branches during emission, so no relocations are
// needed here.

//! ELF object emission via the `object` crate.

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

use super::x64::CompiledModule;
use crate::core::error::CompileResult;

/// Serialize a compiled module as a relocatable ELF object.
pub fn write_object(module: &CompiledModule) -> CompileResult<Vec<u8>> {
    let mut object = Object::new(
        BinaryFormat::Elf,
        Architecture::X86_64,
        Endianness::Little,
    );

    let text = object.section_id(StandardSection::Text);
    object.append_section_data(text, &module.code, 16);

    for function in &module.functions {
        object.add_symbol(Symbol {
            name: function.name.as_bytes().to_vec(),
            value: function.offset,
            size: function.size,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    Ok(object.write()?)
}
