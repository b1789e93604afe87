use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Value(pub(crate) generational_arena::Index);

/// What a value is in the machine-level graph: an ordinary instruction, a
/// register permutation, a projection selecting one output of a tuple node,
/// a copy, or one of the artificial keep nodes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Instr(InstrInfo),
    Perm,
    Proj(usize),
    Copy { unspillable: bool },
    Keep,
    CopyKeep,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    Data,
    Control,
    Tuple,
}

impl Mode {
    pub fn is_data(&self) -> bool {
        matches!(self, Mode::Data)
    }
}

/// Static description of an ordinary instruction: its mnemonic, whether it
/// clobbers the processor flags, and the register requirements of its
/// outputs (one entry per output; tuple instructions have one per
/// projection index).
#[derive(Debug, Clone)]
pub struct InstrInfo {
    pub name: String,
    pub modifies_flags: bool,
    pub out_reqs: Vec<OutputReq>,
}

impl InstrInfo {
    pub fn simple(name: impl Into<String>) -> InstrInfo {
        InstrInfo {
            name: name.into(),
            modifies_flags: false,
            out_reqs: vec![OutputReq::default()],
        }
    }
}

/// Register requirement of one output.  `must_differ` and `should_be_same`
/// are bitmasks over the input positions of the unprojected node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputReq {
    pub limited: bool,
    pub must_differ: u32,
    pub should_be_same: u32,
}

impl OutputReq {
    pub fn is_normal(&self) -> bool {
        !self.limited && self.must_differ == 0 && self.should_be_same == 0
    }
}

pub struct ValueContent {
    pub kind: NodeKind,
    pub mode: Mode,
    pub block: Block,
    pub operands: Vec<Value>,
    pub users: Vec<(Value, usize)>,
    pub reg: Option<Reg>,
}

impl Value {
    fn new(
        context: &mut Context,
        kind: NodeKind,
        mode: Mode,
        block: Block,
        operands: Vec<Value>,
    ) -> Value {
        let content = ValueContent {
            kind,
            mode,
            block,
            operands: Vec::new(),
            users: Vec::new(),
            reg: None,
        };
        let value = Value(context.values.insert(content));
        value.set_operands(context, operands);
        value
    }

    pub fn new_instr(
        context: &mut Context,
        block: Block,
        info: InstrInfo,
        mode: Mode,
        operands: Vec<Value>,
    ) -> Value {
        Value::new(context, NodeKind::Instr(info), mode, block, operands)
    }

    pub fn new_perm(context: &mut Context, block: Block, operands: Vec<Value>) -> Value {
        Value::new(context, NodeKind::Perm, Mode::Tuple, block, operands)
    }

    pub fn new_proj(context: &mut Context, parent: Value, index: usize) -> Value {
        let block = parent.block(context);
        Value::new(context, NodeKind::Proj(index), Mode::Data, block, vec![parent])
    }

    pub fn new_copy(context: &mut Context, block: Block, src: Value, unspillable: bool) -> Value {
        Value::new(context, NodeKind::Copy { unspillable }, Mode::Data, block, vec![src])
    }

    pub fn new_keep(context: &mut Context, block: Block, kept: Vec<Value>) -> Value {
        Value::new(context, NodeKind::Keep, Mode::Control, block, kept)
    }

    /// A copy of `src` which additionally keeps `kept` alive.  Operand 0 is
    /// the copied value; the remaining operands are keep edges.
    pub fn new_copy_keep(
        context: &mut Context,
        block: Block,
        src: Value,
        kept: Vec<Value>,
    ) -> Value {
        let mut operands = vec![src];
        operands.extend(kept);
        Value::new(context, NodeKind::CopyKeep, Mode::Data, block, operands)
    }

    pub fn kind<'a>(&self, context: &'a Context) -> &'a NodeKind {
        &context.values[self.0].kind
    }

    pub fn mode(&self, context: &Context) -> Mode {
        context.values[self.0].mode
    }

    pub fn block(&self, context: &Context) -> Block {
        context.values[self.0].block
    }

    pub fn set_block(&self, context: &mut Context, block: Block) {
        context.values.get_mut(self.0).unwrap().block = block;
    }

    pub fn arity(&self, context: &Context) -> usize {
        context.values[self.0].operands.len()
    }

    pub fn operand(&self, context: &Context, pos: usize) -> Option<Value> {
        context.values[self.0].operands.get(pos).copied()
    }

    pub fn operands(&self, context: &Context) -> Vec<Value> {
        context.values[self.0].operands.clone()
    }

    pub fn users(&self, context: &Context) -> Vec<(Value, usize)> {
        context.values[self.0].users.clone()
    }

    pub fn has_users(&self, context: &Context) -> bool {
        !context.values[self.0].users.is_empty()
    }

    pub fn register(&self, context: &Context) -> Option<Reg> {
        context.values[self.0].reg
    }

    pub fn set_register(&self, context: &mut Context, reg: Reg) {
        context.values.get_mut(self.0).unwrap().reg = Some(reg);
    }

    pub fn is_perm(&self, context: &Context) -> bool {
        matches!(context.values[self.0].kind, NodeKind::Perm)
    }

    pub fn is_proj(&self, context: &Context) -> bool {
        matches!(context.values[self.0].kind, NodeKind::Proj(_))
    }

    pub fn is_copy(&self, context: &Context) -> bool {
        matches!(context.values[self.0].kind, NodeKind::Copy { .. })
    }

    pub fn is_unspillable_copy(&self, context: &Context) -> bool {
        matches!(
            context.values[self.0].kind,
            NodeKind::Copy { unspillable: true }
        )
    }

    pub fn is_keep(&self, context: &Context) -> bool {
        matches!(context.values[self.0].kind, NodeKind::Keep)
    }

    pub fn is_copy_keep(&self, context: &Context) -> bool {
        matches!(context.values[self.0].kind, NodeKind::CopyKeep)
    }

    pub fn proj_index(&self, context: &Context) -> Option<usize> {
        match context.values[self.0].kind {
            NodeKind::Proj(index) => Some(index),
            _ => None,
        }
    }

    pub fn set_proj_index(&self, context: &mut Context, index: usize) {
        let content = context.values.get_mut(self.0).unwrap();
        match &mut content.kind {
            NodeKind::Proj(old) => *old = index,
            _ => unreachable!("set_proj_index on a non-projection"),
        }
    }

    /// The node behind a projection, or the value itself otherwise.
    pub fn skip_proj(&self, context: &Context) -> Value {
        match context.values[self.0].kind {
            NodeKind::Proj(_) => context.values[self.0].operands[0],
            _ => *self,
        }
    }

    /// All projections hanging off this value, in ascending index order.
    pub fn projections(&self, context: &Context) -> Vec<Value> {
        let mut projs: Vec<Value> = context.values[self.0]
            .users
            .iter()
            .map(|(user, _)| *user)
            .filter(|user| user.is_proj(context))
            .collect();
        projs.sort_by_key(|p| p.proj_index(context));
        projs.dedup();
        projs
    }

    /// The register requirement of this output (the default requirement for
    /// anything that is not an instruction output).
    pub fn output_req(&self, context: &Context) -> OutputReq {
        let (node, index) = match context.values[self.0].kind {
            NodeKind::Proj(index) => (context.values[self.0].operands[0], index),
            _ => (*self, 0),
        };
        match &context.values[node.0].kind {
            NodeKind::Instr(info) => info.out_reqs.get(index).cloned().unwrap_or_default(),
            _ => OutputReq::default(),
        }
    }

    pub fn instr_info<'a>(&self, context: &'a Context) -> Option<&'a InstrInfo> {
        match &context.values[self.0].kind {
            NodeKind::Instr(info) => Some(info),
            _ => None,
        }
    }

    /// Point operand `pos` at `target`, keeping the user lists of both the
    /// old and the new operand coherent.
    pub fn set_operand(&self, context: &mut Context, pos: usize, target: Value) {
        let old = context.values[self.0].operands[pos];
        remove_user_edge(context, old, *self, pos);
        context.values.get_mut(self.0).unwrap().operands[pos] = target;
        context.values.get_mut(target.0).unwrap().users.push((*self, pos));
    }

    /// Replace the whole operand list, rewiring user edges.
    pub fn set_operands(&self, context: &mut Context, operands: Vec<Value>) {
        let old = std::mem::take(&mut context.values.get_mut(self.0).unwrap().operands);
        for (pos, op) in old.iter().enumerate() {
            remove_user_edge(context, *op, *self, pos);
        }
        for (pos, op) in operands.iter().enumerate() {
            context.values.get_mut(op.0).unwrap().users.push((*self, pos));
        }
        context.values.get_mut(self.0).unwrap().operands = operands;
    }

    /// Splice every user of this value onto `replacement`.
    pub fn replace_uses(&self, context: &mut Context, replacement: Value) {
        let users = self.users(context);
        for (user, pos) in users {
            user.set_operand(context, pos, replacement);
        }
    }

    /// Remove the value from the graph.  The caller must have detached or
    /// replaced all users first.
    pub fn kill(&self, context: &mut Context) {
        debug_assert!(
            context.values[self.0].users.is_empty(),
            "killing a value that still has users"
        );
        let operands = self.operands(context);
        for (pos, op) in operands.iter().enumerate() {
            remove_user_edge(context, *op, *self, pos);
        }
        context.values.remove(self.0);
    }

    pub fn is_alive(&self, context: &Context) -> bool {
        context.values.get(self.0).is_some()
    }

    /// Short description for diagnostics.
    pub fn describe(&self, context: &Context) -> String {
        let kind = match &context.values[self.0].kind {
            NodeKind::Instr(info) => format!("instr {}", info.name),
            NodeKind::Perm => "perm".to_owned(),
            NodeKind::Proj(index) => format!("proj {}", index),
            NodeKind::Copy { unspillable: true } => "unspillable copy".to_owned(),
            NodeKind::Copy { unspillable: false } => "copy".to_owned(),
            NodeKind::Keep => "keep".to_owned(),
            NodeKind::CopyKeep => "copykeep".to_owned(),
        };
        format!("{} ({:?})", kind, self.0)
    }
}

fn remove_user_edge(context: &mut Context, target: Value, user: Value, pos: usize) {
    if let Some(content) = context.values.get_mut(target.0) {
        if let Some(at) = content
            .users
            .iter()
            .position(|&(u, p)| u == user && p == pos)
        {
            content.users.swap_remove(at);
        }
    }
}
