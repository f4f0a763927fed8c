use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::error;

use super::pattern::Pattern;
use super::{basic, example_tokens, fpu, pseudo, BasicDef, BasicInstruction, Instruction};

pub static INSTRUCTION_SET: Lazy<InstructionSet> = Lazy::new(InstructionSet::new);

/// Operator names only. Token classification needs these before the full
/// set, which itself classifies example tokens, can be built.
static MNEMONICS: Lazy<HashSet<String>> = Lazy::new(|| {
    basic::catalog()
        .iter()
        .chain(fpu::catalog().iter())
        .filter_map(|def| def.example.split_whitespace().next())
        .chain(pseudo::mnemonics())
        .map(str::to_string)
        .collect()
});

pub fn is_mnemonic(value: &str) -> bool {
    MNEMONICS.contains(&value.to_lowercase())
}

/// Words sharing one mask, keyed by their fixed bits.
#[derive(Debug)]
struct MatchMap {
    mask: u32,
    matches: HashMap<u32, usize>,
}

#[derive(Debug)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
    by_mnemonic: IndexMap<String, Vec<usize>>,
    /// Most specific mask first.
    decode: Vec<MatchMap>,
}

impl InstructionSet {
    fn new() -> Self {
        let mut instructions: Vec<Instruction> = basic::catalog()
            .into_iter()
            .chain(fpu::catalog())
            .filter_map(Self::build_basic)
            .map(Instruction::Basic)
            .collect();
        instructions.extend(pseudo::catalog().into_iter().map(Instruction::Extended));

        let mut by_mnemonic: IndexMap<String, Vec<usize>> = IndexMap::new();
        let mut groups: IndexMap<u32, HashMap<u32, usize>> = IndexMap::new();
        for (index, inst) in instructions.iter().enumerate() {
            by_mnemonic.entry(inst.mnemonic().to_string()).or_default().push(index);
            if let Instruction::Basic(b) = inst {
                groups
                    .entry(b.pattern.mask)
                    .or_default()
                    .entry(b.pattern.matches)
                    .or_insert(index);
            }
        }
        let mut decode: Vec<MatchMap> = groups
            .into_iter()
            .map(|(mask, matches)| MatchMap { mask, matches })
            .collect();
        decode.sort_by_key(|m| std::cmp::Reverse(m.mask.count_ones()));

        Self {
            instructions,
            by_mnemonic,
            decode,
        }
    }

    fn build_basic(def: BasicDef) -> Option<BasicInstruction> {
        let pattern = match Pattern::parse(def.encoding) {
            Ok(pattern) => pattern,
            Err(e) => {
                error!("skipping `{}`: {}", def.example, e);
                return None;
            }
        };
        let tokens = example_tokens(def.example);
        let mnemonic = def.example.split_whitespace().next()?.to_string();
        Some(BasicInstruction {
            mnemonic,
            example: def.example,
            description: def.description,
            format: def.format,
            pattern,
            tokens,
            action: def.action,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Every instruction spelled `mnemonic`, basic ones first.
    pub fn matching(&self, mnemonic: &str) -> Vec<&Instruction> {
        self.by_mnemonic
            .get(&mnemonic.to_lowercase())
            .map(|indices| indices.iter().map(|i| &self.instructions[*i]).collect())
            .unwrap_or_default()
    }

    /// Basic instruction by its example syntax, e.g. `addiu $t1,$t2,-100`.
    pub fn basic(&self, example: &str) -> Option<&BasicInstruction> {
        self.instructions
            .iter()
            .filter_map(Instruction::as_basic)
            .find(|b| b.example == example)
    }

    /// Decodes a machine word; the most specific matching pattern wins.
    pub fn find_by_binary(&self, word: u32) -> Option<&BasicInstruction> {
        self.decode
            .iter()
            .find_map(|map| map.matches.get(&(word & map.mask)))
            .and_then(|i| self.instructions[*i].as_basic())
    }

    /// Instructions whose mnemonic starts with `prefix`, for help listings.
    pub fn prefix_matches(&self, prefix: &str) -> Vec<&Instruction> {
        let prefix = prefix.to_lowercase();
        self.by_mnemonic
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .flat_map(|(_, indices)| indices.iter().map(|i| &self.instructions[*i]))
            .collect()
    }
}
