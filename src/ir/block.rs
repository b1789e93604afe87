use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Block(pub(crate) generational_arena::Index);

pub struct BlockContent {
    pub label: String,
    pub function: Function,
    pub sched: Schedule,
    pub preds: Vec<Block>,
    pub succs: Vec<Block>,
}

impl Block {
    pub(crate) fn new(context: &mut Context, function: Function, label: Option<String>) -> Block {
        let label = context.get_unique_label(label);
        let content = BlockContent {
            label,
            function,
            sched: Schedule::new(),
            preds: Vec::new(),
            succs: Vec::new(),
        };
        Block(context.blocks.insert(content))
    }

    pub fn label(&self, context: &Context) -> String {
        context.blocks[self.0].label.clone()
    }

    pub fn function(&self, context: &Context) -> Function {
        context.blocks[self.0].function
    }

    pub fn add_successor(&self, context: &mut Context, succ: Block) {
        context.blocks.get_mut(self.0).unwrap().succs.push(succ);
        context.blocks.get_mut(succ.0).unwrap().preds.push(*self);
    }

    pub fn successors(&self, context: &Context) -> Vec<Block> {
        context.blocks[self.0].succs.clone()
    }

    pub fn predecessors(&self, context: &Context) -> Vec<Block> {
        context.blocks[self.0].preds.clone()
    }

    //
    // Schedule facade.  Appending or inserting also records the value's
    // containing block.
    //

    pub fn append(&self, context: &mut Context, value: Value) {
        value.set_block(context, *self);
        context.blocks.get_mut(self.0).unwrap().sched.push_back(value);
    }

    pub fn insert_before(&self, context: &mut Context, anchor: Value, value: Value) {
        value.set_block(context, *self);
        context
            .blocks
            .get_mut(self.0)
            .unwrap()
            .sched
            .insert_before(anchor, value);
    }

    pub fn insert_after(&self, context: &mut Context, anchor: Value, value: Value) {
        value.set_block(context, *self);
        context
            .blocks
            .get_mut(self.0)
            .unwrap()
            .sched
            .insert_after(anchor, value);
    }

    /// Insert after `point`, or at the very front of the block when `point`
    /// is `None`.
    pub fn insert_after_point(&self, context: &mut Context, point: Option<Value>, value: Value) {
        match point {
            Some(anchor) => self.insert_after(context, anchor, value),
            None => {
                value.set_block(context, *self);
                context.blocks.get_mut(self.0).unwrap().sched.push_front(value);
            }
        }
    }

    pub fn sched_remove(&self, context: &mut Context, value: Value) {
        context.blocks.get_mut(self.0).unwrap().sched.remove(value);
    }

    /// Put `new` in `old`'s schedule slot and drop `old` from the schedule.
    pub fn sched_replace(&self, context: &mut Context, old: Value, new: Value) {
        self.insert_after(context, old, new);
        self.sched_remove(context, old);
    }

    pub fn is_scheduled(&self, context: &Context, value: Value) -> bool {
        context.blocks[self.0].sched.contains(value)
    }

    pub fn sched_prev(&self, context: &Context, value: Value) -> Option<Value> {
        context.blocks[self.0].sched.prev(value)
    }

    pub fn sched_next(&self, context: &Context, value: Value) -> Option<Value> {
        context.blocks[self.0].sched.next(value)
    }

    pub fn sched_first(&self, context: &Context) -> Option<Value> {
        context.blocks[self.0].sched.first()
    }

    pub fn sched_last(&self, context: &Context) -> Option<Value> {
        context.blocks[self.0].sched.last()
    }

    pub fn sched_vec(&self, context: &Context) -> Vec<Value> {
        context.blocks[self.0].sched.to_vec()
    }
}
