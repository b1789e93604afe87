use rustc_hash::FxHashMap;

use super::*;

/// Per-block instruction order.  A doubly-linked list keyed by value so
/// insertion and removal next to an arbitrary node are O(1); projections are
/// never scheduled, only "real" nodes are.
#[derive(Default)]
pub struct Schedule {
    head: Option<Value>,
    tail: Option<Value>,
    links: FxHashMap<Value, Links>,
}

#[derive(Clone, Copy, Default)]
struct Links {
    prev: Option<Value>,
    next: Option<Value>,
}

impl Schedule {
    pub fn new() -> Schedule {
        Schedule::default()
    }

    pub fn first(&self) -> Option<Value> {
        self.head
    }

    pub fn last(&self) -> Option<Value> {
        self.tail
    }

    pub fn contains(&self, value: Value) -> bool {
        self.links.contains_key(&value)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn prev(&self, value: Value) -> Option<Value> {
        self.links.get(&value).and_then(|l| l.prev)
    }

    pub fn next(&self, value: Value) -> Option<Value> {
        self.links.get(&value).and_then(|l| l.next)
    }

    pub fn push_back(&mut self, value: Value) {
        assert!(!self.contains(value), "value scheduled twice");
        let prev = self.tail;
        self.links.insert(value, Links { prev, next: None });
        match prev {
            Some(prev) => self.links.get_mut(&prev).unwrap().next = Some(value),
            None => self.head = Some(value),
        }
        self.tail = Some(value);
    }

    pub fn push_front(&mut self, value: Value) {
        assert!(!self.contains(value), "value scheduled twice");
        let next = self.head;
        self.links.insert(value, Links { prev: None, next });
        match next {
            Some(next) => self.links.get_mut(&next).unwrap().prev = Some(value),
            None => self.tail = Some(value),
        }
        self.head = Some(value);
    }

    pub fn insert_before(&mut self, anchor: Value, value: Value) {
        assert!(!self.contains(value), "value scheduled twice");
        let prev = self.links.get(&anchor).expect("anchor not scheduled").prev;
        self.links.insert(value, Links { prev, next: Some(anchor) });
        self.links.get_mut(&anchor).unwrap().prev = Some(value);
        match prev {
            Some(prev) => self.links.get_mut(&prev).unwrap().next = Some(value),
            None => self.head = Some(value),
        }
    }

    pub fn insert_after(&mut self, anchor: Value, value: Value) {
        assert!(!self.contains(value), "value scheduled twice");
        let next = self.links.get(&anchor).expect("anchor not scheduled").next;
        self.links.insert(value, Links { prev: Some(anchor), next });
        self.links.get_mut(&anchor).unwrap().next = Some(value);
        match next {
            Some(next) => self.links.get_mut(&next).unwrap().prev = Some(value),
            None => self.tail = Some(value),
        }
    }

    pub fn remove(&mut self, value: Value) {
        let links = self.links.remove(&value).expect("value not scheduled");
        match links.prev {
            Some(prev) => self.links.get_mut(&prev).unwrap().next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => self.links.get_mut(&next).unwrap().prev = links.prev,
            None => self.tail = links.prev,
        }
    }

    /// Snapshot of the current order, so the schedule may be mutated while
    /// walking.
    pub fn to_vec(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.links.len());
        let mut cursor = self.head;
        while let Some(value) = cursor {
            out.push(value);
            cursor = self.links[&value].next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, Context, Function, InstrInfo, Mode, Value};

    fn fixture() -> (Context, Block, Vec<Value>) {
        let mut ctx = Context::new();
        let func = Function::new(&mut ctx, "f");
        let block = func.entry_block(&ctx);
        let vals: Vec<Value> = (0..4)
            .map(|i| {
                Value::new_instr(
                    &mut ctx,
                    block,
                    InstrInfo::simple(format!("n{}", i)),
                    Mode::Data,
                    vec![],
                )
            })
            .collect();
        (ctx, block, vals)
    }

    #[test]
    fn push_and_order() {
        let (mut ctx, block, vals) = fixture();
        for v in &vals {
            block.append(&mut ctx, *v);
        }
        let sched = block.sched_vec(&ctx);
        assert_eq!(sched, vals);
        assert_eq!(block.sched_first(&ctx), Some(vals[0]));
        assert_eq!(block.sched_last(&ctx), Some(vals[3]));
        assert_eq!(block.sched_prev(&ctx, vals[2]), Some(vals[1]));
        assert_eq!(block.sched_next(&ctx, vals[2]), Some(vals[3]));
    }

    #[test]
    fn insert_and_remove() {
        let (mut ctx, block, vals) = fixture();
        block.append(&mut ctx, vals[0]);
        block.append(&mut ctx, vals[3]);
        block.insert_after(&mut ctx, vals[0], vals[1]);
        block.insert_before(&mut ctx, vals[3], vals[2]);
        assert_eq!(block.sched_vec(&ctx), vals);

        block.sched_remove(&mut ctx, vals[0]);
        block.sched_remove(&mut ctx, vals[3]);
        assert_eq!(block.sched_vec(&ctx), vec![vals[1], vals[2]]);
    }

    #[test]
    fn insert_after_point_at_front() {
        let (mut ctx, block, vals) = fixture();
        block.append(&mut ctx, vals[0]);
        block.insert_after_point(&mut ctx, None, vals[1]);
        assert_eq!(block.sched_vec(&ctx), vec![vals[1], vals[0]]);
        block.insert_after_point(&mut ctx, Some(vals[1]), vals[2]);
        assert_eq!(block.sched_vec(&ctx), vec![vals[1], vals[2], vals[0]]);
    }
}
