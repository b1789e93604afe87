use rustc_hash::FxHashSet;

use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Function(pub(crate) generational_arena::Index);

pub struct FunctionContent {
    pub name: String,
    pub blocks: Vec<Block>,
    pub allocatable: FxHashSet<Reg>,
}

impl Function {
    pub fn new(context: &mut Context, name: impl Into<String>) -> Function {
        let content = FunctionContent {
            name: name.into(),
            blocks: Vec::new(),
            allocatable: FxHashSet::default(),
        };
        let func = Function(context.functions.insert(content));

        let entry_block = Block::new(context, func, Some("entry".to_owned()));
        context
            .functions
            .get_mut(func.0)
            .unwrap()
            .blocks
            .push(entry_block);

        func
    }

    pub fn name<'a>(&self, context: &'a Context) -> &'a str {
        &context.functions[self.0].name
    }

    pub fn entry_block(&self, context: &Context) -> Block {
        context.functions[self.0].blocks[0]
    }

    pub fn create_block(&self, context: &mut Context, label: Option<String>) -> Block {
        let block = Block::new(context, *self, label);
        context.functions.get_mut(self.0).unwrap().blocks.push(block);
        block
    }

    /// The function's allocatable bitmap: registers the allocator may hand
    /// out, and hence the pool the free-register oracle draws from.
    pub fn mark_allocatable(&self, context: &mut Context, regs: &[Reg]) {
        let set = &mut context.functions.get_mut(self.0).unwrap().allocatable;
        for reg in regs {
            set.insert(*reg);
        }
    }

    pub fn is_allocatable(&self, context: &Context, reg: Reg) -> bool {
        context.functions[self.0].allocatable.contains(&reg)
    }

    pub fn block_iter(&self, context: &Context) -> BlockIterator {
        BlockIterator::new(context, self)
    }
}

pub struct BlockIterator {
    blocks: Vec<generational_arena::Index>,
    next: usize,
}

impl BlockIterator {
    pub(crate) fn new(context: &Context, function: &Function) -> Self {
        // Copy the block indices so the context may be mutated during
        // iteration.
        BlockIterator {
            blocks: context.functions[function.0]
                .blocks
                .iter()
                .map(|block| block.0)
                .collect(),
            next: 0,
        }
    }
}

impl Iterator for BlockIterator {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.next < self.blocks.len() {
            let idx = self.next;
            self.next += 1;
            Some(Block(self.blocks[idx]))
        } else {
            None
        }
    }
}
