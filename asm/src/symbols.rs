use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    pub data: bool,
    /// File that defined the symbol.
    pub file: Arc<str>,
}

/// Name to address map for one file, or the program-wide global table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    owner: String,
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            symbols: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Fails with the existing entry when the name is taken.
    pub fn add(&mut self, symbol: Symbol) -> Result<(), &Symbol> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(&self.symbols[&symbol.name]);
        }
        trace!("{}: {} = 0x{:08x}", self.owner, symbol.name, symbol.address);
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn address(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).map(|s| s.address)
    }

    pub fn remove(&mut self, name: &str) -> Option<Symbol> {
        self.symbols.shift_remove(name)
    }

    /// Moves data labels recorded at `old` to `new`, after alignment padding
    /// slid the item they name.
    pub fn fix_address(&mut self, old: u32, new: u32) {
        for symbol in self.symbols.values_mut().filter(|s| s.data && s.address == old) {
            symbol.address = new;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Looks `name` up locally, then globally.
pub fn local_or_global(local: &SymbolTable, global: &SymbolTable, name: &str) -> Option<u32> {
    local.address(name).or_else(|| global.address(name))
}

#[test]
fn test() {
    let file: Arc<str> = Arc::from("a.s");
    let symbol = |name: &str, address: u32| Symbol {
        name: name.to_string(),
        address,
        data: true,
        file: file.clone(),
    };
    let mut local = SymbolTable::new("a.s");
    let mut global = SymbolTable::new("(global)");
    local.add(symbol("x", 0x1001_0001)).unwrap();
    assert_eq!(local.add(symbol("x", 4)).unwrap_err().address, 0x1001_0001);
    local.fix_address(0x1001_0001, 0x1001_0004);
    assert_eq!(local.address("x"), Some(0x1001_0004));

    global.add(symbol("main", 0x0040_0000)).unwrap();
    assert_eq!(local_or_global(&local, &global, "main"), Some(0x0040_0000));
    assert_eq!(local_or_global(&local, &global, "x"), Some(0x1001_0004));
    let moved = local.remove("x").unwrap();
    global.add(moved).unwrap();
    assert!(local.is_empty());
    assert_eq!(global.len(), 2);
}
