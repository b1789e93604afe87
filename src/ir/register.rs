use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RegClass(pub(crate) generational_arena::Index);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Reg(pub(crate) generational_arena::Index);

pub struct RegClassContent {
    pub name: String,
    pub regs: Vec<Reg>,
}

pub struct RegContent {
    pub class: RegClass,
    pub index: usize,
    pub global_index: usize,
    pub name: String,
    pub is_virtual: bool,
}

impl RegClass {
    /// A class of physical registers.  Class-local indices follow the order
    /// of `reg_names`; global indices are allocated context-wide.
    pub fn new(context: &mut Context, name: impl Into<String>, reg_names: &[&str]) -> RegClass {
        let class = RegClass(context.reg_classes.insert(RegClassContent {
            name: name.into(),
            regs: Vec::new(),
        }));
        for (index, reg_name) in reg_names.iter().enumerate() {
            let global_index = context.next_global_reg_index();
            let reg = Reg(context.regs.insert(RegContent {
                class,
                index,
                global_index,
                name: (*reg_name).to_owned(),
                is_virtual: false,
            }));
            context.reg_classes.get_mut(class.0).unwrap().regs.push(reg);
        }
        class
    }

    /// Append a virtual register to the class.  Virtual registers are never
    /// allocatable and are ignored by the physical-liveness bookkeeping.
    pub fn new_virtual_reg(&self, context: &mut Context, name: impl Into<String>) -> Reg {
        let index = context.reg_classes[self.0].regs.len();
        let global_index = context.next_global_reg_index();
        let reg = Reg(context.regs.insert(RegContent {
            class: *self,
            index,
            global_index,
            name: name.into(),
            is_virtual: true,
        }));
        context.reg_classes.get_mut(self.0).unwrap().regs.push(reg);
        reg
    }

    pub fn name<'a>(&self, context: &'a Context) -> &'a str {
        &context.reg_classes[self.0].name
    }

    pub fn regs(&self, context: &Context) -> Vec<Reg> {
        context.reg_classes[self.0].regs.clone()
    }

    pub fn n_regs(&self, context: &Context) -> usize {
        context.reg_classes[self.0].regs.len()
    }

    pub fn reg(&self, context: &Context, index: usize) -> Option<Reg> {
        context.reg_classes[self.0].regs.get(index).copied()
    }
}

impl Reg {
    pub fn class(&self, context: &Context) -> RegClass {
        context.regs[self.0].class
    }

    pub fn index(&self, context: &Context) -> usize {
        context.regs[self.0].index
    }

    pub fn global_index(&self, context: &Context) -> usize {
        context.regs[self.0].global_index
    }

    pub fn name<'a>(&self, context: &'a Context) -> &'a str {
        &context.regs[self.0].name
    }

    pub fn is_virtual(&self, context: &Context) -> bool {
        context.regs[self.0].is_virtual
    }
}
