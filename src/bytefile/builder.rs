use super::{
    ConstantIndex, FieldIndex, FunctionIndex, FunctionTarget, LabelIndex, LocalVariableIndex,
    MappedFunctionIndex, TypeIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Local(FunctionIndex),
    Mapped(MappedFunctionIndex),
}

/// One recorded instruction. Operands are already resolved indices; the
/// textual operand forms never survive past the parser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Nop,
    Push(ConstantIndex),
    PushType(TypeIndex),
    Pop,
    Load(LocalVariableIndex),
    Store(LocalVariableIndex),
    Lea(LocalVariableIndex),
    FLea(FieldIndex),
    TLoad,
    TStore,
    Copy,
    Swap,

    Add,
    Sub,
    Mul,
    IMul,
    Div,
    IDiv,
    Mod,
    IMod,
    Neg,
    Inc,
    Dec,

    And,
    Or,
    Xor,
    Not,
    Shl,
    Sal,
    Shr,
    Sar,

    Cmp,
    ICmp,
    Jmp(LabelIndex),
    Je(LabelIndex),
    Jne(LabelIndex),
    Ja(LabelIndex),
    Jae(LabelIndex),
    Jb(LabelIndex),
    Jbe(LabelIndex),
    Call(CallTarget),
    Ret,

    ToI,
    ToL,
    ToD,
    ToP,

    Null,
    New(TypeIndex),
    Delete,
    GcNull,
    GcNew(TypeIndex),
    APush(TypeIndex),
    ANew(TypeIndex),
    AGcNew(TypeIndex),
    ALea,
    Count,
}

#[derive(Debug)]
struct LabelSlot {
    name: String,
    offset: Option<u32>,
}

/// Per-function instruction sink. Created once all prototypes of a unit are
/// known; labels are reserved by name up front and bound to an instruction
/// offset when the defining line is reached, so jumps can be recorded before
/// their target exists.
#[derive(Debug)]
pub struct Builder {
    target: FunctionTarget,
    argument_count: u16,
    local_count: u32,
    labels: Vec<LabelSlot>,
    code: Vec<Instruction>,
}

/// Everything the byte file keeps of a finished function body.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub argument_count: u16,
    pub local_count: u32,
    pub label_offsets: Vec<Option<u32>>,
    pub code: Vec<Instruction>,
}

impl Builder {
    pub fn new(target: FunctionTarget, argument_count: u16) -> Self {
        Builder {
            target,
            argument_count,
            local_count: 0,
            labels: Vec::new(),
            code: Vec::new(),
        }
    }

    pub fn target(&self) -> FunctionTarget {
        self.target
    }

    /// Allocates an index for a label name without binding an offset yet.
    pub fn reserve_label(&mut self, name: &str) -> LabelIndex {
        let index = LabelIndex(self.labels.len() as u32);
        self.labels.push(LabelSlot {
            name: name.to_owned(),
            offset: None,
        });
        index
    }

    /// Binds a previously reserved label to the current instruction offset.
    pub fn add_label(&mut self, name: &str) -> Option<LabelIndex> {
        let offset = self.code.len() as u32;
        let position = self.labels.iter().position(|label| label.name == name)?;

        debug_assert!(
            self.labels[position].offset.is_none(),
            "label '{name}' bound twice"
        );
        self.labels[position].offset = Some(offset);
        Some(LabelIndex(position as u32))
    }

    /// Arguments occupy the first local variable slots.
    pub fn get_argument(&self, index: u16) -> LocalVariableIndex {
        debug_assert!(index < self.argument_count);
        LocalVariableIndex(index as u32)
    }

    pub fn add_local_variable(&mut self) -> LocalVariableIndex {
        let index = LocalVariableIndex(self.argument_count as u32 + self.local_count);
        self.local_count += 1;
        index
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn finish(self) -> FunctionBody {
        FunctionBody {
            argument_count: self.argument_count,
            local_count: self.local_count,
            label_offsets: self.labels.iter().map(|label| label.offset).collect(),
            code: self.code,
        }
    }

    pub fn nop(&mut self) {
        self.code.push(Instruction::Nop);
    }

    pub fn push_constant(&mut self, constant: ConstantIndex) {
        self.code.push(Instruction::Push(constant));
    }

    pub fn push_type(&mut self, type_index: TypeIndex) {
        self.code.push(Instruction::PushType(type_index));
    }

    pub fn pop(&mut self) {
        self.code.push(Instruction::Pop);
    }

    pub fn load(&mut self, variable: LocalVariableIndex) {
        self.code.push(Instruction::Load(variable));
    }

    pub fn store(&mut self, variable: LocalVariableIndex) {
        self.code.push(Instruction::Store(variable));
    }

    pub fn lea(&mut self, variable: LocalVariableIndex) {
        self.code.push(Instruction::Lea(variable));
    }

    pub fn flea(&mut self, field: FieldIndex) {
        self.code.push(Instruction::FLea(field));
    }

    pub fn tload(&mut self) {
        self.code.push(Instruction::TLoad);
    }

    pub fn tstore(&mut self) {
        self.code.push(Instruction::TStore);
    }

    pub fn copy(&mut self) {
        self.code.push(Instruction::Copy);
    }

    pub fn swap(&mut self) {
        self.code.push(Instruction::Swap);
    }

    pub fn add(&mut self) {
        self.code.push(Instruction::Add);
    }

    pub fn sub(&mut self) {
        self.code.push(Instruction::Sub);
    }

    pub fn mul(&mut self) {
        self.code.push(Instruction::Mul);
    }

    pub fn imul(&mut self) {
        self.code.push(Instruction::IMul);
    }

    pub fn div(&mut self) {
        self.code.push(Instruction::Div);
    }

    pub fn idiv(&mut self) {
        self.code.push(Instruction::IDiv);
    }

    pub fn modulo(&mut self) {
        self.code.push(Instruction::Mod);
    }

    pub fn imodulo(&mut self) {
        self.code.push(Instruction::IMod);
    }

    pub fn neg(&mut self) {
        self.code.push(Instruction::Neg);
    }

    pub fn inc(&mut self) {
        self.code.push(Instruction::Inc);
    }

    pub fn dec(&mut self) {
        self.code.push(Instruction::Dec);
    }

    pub fn and(&mut self) {
        self.code.push(Instruction::And);
    }

    pub fn or(&mut self) {
        self.code.push(Instruction::Or);
    }

    pub fn xor(&mut self) {
        self.code.push(Instruction::Xor);
    }

    pub fn not(&mut self) {
        self.code.push(Instruction::Not);
    }

    pub fn shl(&mut self) {
        self.code.push(Instruction::Shl);
    }

    pub fn sal(&mut self) {
        self.code.push(Instruction::Sal);
    }

    pub fn shr(&mut self) {
        self.code.push(Instruction::Shr);
    }

    pub fn sar(&mut self) {
        self.code.push(Instruction::Sar);
    }

    pub fn cmp(&mut self) {
        self.code.push(Instruction::Cmp);
    }

    pub fn icmp(&mut self) {
        self.code.push(Instruction::ICmp);
    }

    pub fn jmp(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Jmp(label));
    }

    pub fn je(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Je(label));
    }

    pub fn jne(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Jne(label));
    }

    pub fn ja(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Ja(label));
    }

    pub fn jae(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Jae(label));
    }

    pub fn jb(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Jb(label));
    }

    pub fn jbe(&mut self, label: LabelIndex) {
        self.code.push(Instruction::Jbe(label));
    }

    pub fn call(&mut self, target: CallTarget) {
        self.code.push(Instruction::Call(target));
    }

    pub fn ret(&mut self) {
        self.code.push(Instruction::Ret);
    }

    pub fn toi(&mut self) {
        self.code.push(Instruction::ToI);
    }

    pub fn tol(&mut self) {
        self.code.push(Instruction::ToL);
    }

    pub fn tod(&mut self) {
        self.code.push(Instruction::ToD);
    }

    pub fn top(&mut self) {
        self.code.push(Instruction::ToP);
    }

    pub fn null(&mut self) {
        self.code.push(Instruction::Null);
    }

    pub fn new_object(&mut self, type_index: TypeIndex) {
        self.code.push(Instruction::New(type_index));
    }

    pub fn delete(&mut self) {
        self.code.push(Instruction::Delete);
    }

    pub fn gc_null(&mut self) {
        self.code.push(Instruction::GcNull);
    }

    pub fn gc_new(&mut self, type_index: TypeIndex) {
        self.code.push(Instruction::GcNew(type_index));
    }

    pub fn a_push(&mut self, array_type: TypeIndex) {
        self.code.push(Instruction::APush(array_type));
    }

    pub fn a_new(&mut self, array_type: TypeIndex) {
        self.code.push(Instruction::ANew(array_type));
    }

    pub fn agc_new(&mut self, array_type: TypeIndex) {
        self.code.push(Instruction::AGcNew(array_type));
    }

    pub fn a_lea(&mut self) {
        self.code.push(Instruction::ALea);
    }

    pub fn count(&mut self) {
        self.code.push(Instruction::Count);
    }
}
