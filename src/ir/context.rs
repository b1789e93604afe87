use generational_arena::Arena;

use super::*;

/// The owner of every IR entity.  All handles (`Value`, `Block`, `Function`,
/// `Reg`, `RegClass`) are indices into the arenas held here and are only
/// meaningful together with their context.
pub struct Context {
    pub(crate) functions: Arena<FunctionContent>,
    pub(crate) blocks: Arena<BlockContent>,
    pub(crate) values: Arena<ValueContent>,
    pub(crate) reg_classes: Arena<RegClassContent>,
    pub(crate) regs: Arena<RegContent>,

    next_global_reg: usize,
    next_label_tag: u64,
}

impl Context {
    pub fn new() -> Context {
        Context {
            functions: Arena::new(),
            blocks: Arena::new(),
            values: Arena::new(),
            reg_classes: Arena::new(),
            regs: Arena::new(),

            next_global_reg: 0,
            next_label_tag: 0,
        }
    }

    pub(crate) fn next_global_reg_index(&mut self) -> usize {
        let idx = self.next_global_reg;
        self.next_global_reg += 1;
        idx
    }

    pub(crate) fn get_unique_label(&mut self, hint: Option<String>) -> String {
        match hint {
            Some(hint) => hint,
            None => {
                let tag = self.next_label_tag;
                self.next_label_tag += 1;
                format!("block{}", tag)
            }
        }
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::new()
    }
}
