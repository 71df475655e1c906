//! Symbols and symbol flags.

use molt_common::FileId;
use molt_parser::NodeId;
use rustc_hash::FxHashMap;

/// Symbol classification bits, const-module style.
pub mod symbol_flags {
    pub const FUNCTION_SCOPED_VARIABLE: u32 = 1 << 0;
    pub const BLOCK_SCOPED_VARIABLE: u32 = 1 << 1;
    pub const FUNCTION: u32 = 1 << 2;
    pub const CLASS: u32 = 1 << 3;
    pub const INTERFACE: u32 = 1 << 4;
    pub const ENUM: u32 = 1 << 5;
    pub const ENUM_MEMBER: u32 = 1 << 6;
    pub const TYPE_ALIAS: u32 = 1 << 7;
    /// A `namespace`/`module` declaration symbol.
    pub const NAMESPACE_MODULE: u32 = 1 << 8;
    /// A source file that is an external module.
    pub const MODULE: u32 = 1 << 9;
    /// An import binding (or re-export) pointing at another symbol.
    pub const ALIAS: u32 = 1 << 10;
    pub const TYPE_PARAMETER: u32 = 1 << 11;
    /// An ambient global from the default library (Symbol, Map, Node, ...).
    pub const GLOBAL_BUILTIN: u32 = 1 << 12;

    pub const VARIABLE: u32 = FUNCTION_SCOPED_VARIABLE | BLOCK_SCOPED_VARIABLE;
}

/// Reference meaning bits for name resolution, combined as a bitset.
pub mod meaning {
    pub const VALUE: u32 = 1 << 0;
    pub const TYPE: u32 = 1 << 1;
    pub const NAMESPACE: u32 = 1 << 2;
    pub const ALL: u32 = VALUE | TYPE | NAMESPACE;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One declaration site of a symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeclRef {
    pub file: FileId,
    pub node: NodeId,
}

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub flags: u32,
    pub declarations: Vec<DeclRef>,
    /// The namespace/module/enum symbol whose export table contains this one.
    pub parent: Option<SymbolId>,
    /// Exported members, for namespace/module/enum symbols.
    pub exports: FxHashMap<String, SymbolId>,
    /// Resolved alias target, for import/re-export bindings.
    pub alias_target: Option<SymbolId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, flags: u32) -> Symbol {
        Symbol {
            name: name.into(),
            flags,
            declarations: Vec::new(),
            parent: None,
            exports: FxHashMap::default(),
            alias_target: None,
        }
    }

    pub fn is_namespace_like(&self) -> bool {
        self.flags
            & (symbol_flags::NAMESPACE_MODULE | symbol_flags::MODULE | symbol_flags::ENUM)
            != 0
    }
}

#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> SymbolArena {
        SymbolArena::default()
    }

    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The meaning bits a reference to this symbol can have. Aliases take the
    /// meaning of their target.
    pub fn meaning_of(&self, id: SymbolId) -> u32 {
        use symbol_flags as sf;
        let symbol = self.get(id);
        if symbol.flags & sf::ALIAS != 0 {
            return match symbol.alias_target {
                Some(target) if target != id => self.meaning_of(target),
                _ => meaning::ALL,
            };
        }
        let mut result = 0;
        if symbol.flags
            & (sf::VARIABLE | sf::FUNCTION | sf::CLASS | sf::ENUM | sf::ENUM_MEMBER
                | sf::NAMESPACE_MODULE | sf::MODULE)
            != 0
        {
            result |= meaning::VALUE;
        }
        if symbol.flags
            & (sf::CLASS | sf::INTERFACE | sf::ENUM | sf::TYPE_ALIAS | sf::TYPE_PARAMETER)
            != 0
        {
            result |= meaning::TYPE;
        }
        if symbol.flags & (sf::NAMESPACE_MODULE | sf::MODULE | sf::ENUM) != 0 {
            result |= meaning::NAMESPACE;
        }
        if symbol.flags & sf::GLOBAL_BUILTIN != 0 {
            result |= meaning::VALUE | meaning::TYPE;
        }
        result
    }

    /// Dereference export/import aliases down to the underlying symbol.
    pub fn skip_alias(&self, mut id: SymbolId) -> SymbolId {
        let mut hops = 0;
        while let Some(target) = self.get(id).alias_target {
            if target == id || hops > 100 {
                break;
            }
            id = target;
            hops += 1;
        }
        id
    }
}
