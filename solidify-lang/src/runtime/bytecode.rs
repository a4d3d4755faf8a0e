//! Host instruction words.
//!
//! ```text
//!  31     26 25        18 17         9 8          0
//! +---------+------------+------------+------------+
//! |   op    |     A      |     B      |     C      |
//! +---------+------------+------------+------------+
//! |   op    |     A      |          Bx / sBx       |
//! +---------+------------+-------------------------+
//! ```
use std::fmt;

const OP_POS: u32 = 26;
const RA_POS: u32 = 18;
const RKB_POS: u32 = 9;
const OP_MASK: u32 = 0x3F;
const RA_MASK: u32 = 0xFF;
const RK_MASK: u32 = 0x1FF;
const BX_MASK: u32 = 0x3FFFF;
/// Bias of signed Bx operands.
pub const SBX_MAX: i32 = (1 << 17) - 1;
/// Constant-table flag on B and C operands.
pub const K_FLAG: u32 = 1 << 8;
const KR_MASK: u32 = 0xFF;

macro_rules! opcodes {
    ($($name:ident => $text:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Opcode {
            $($name),*
        }
        impl Opcode {
            const ALL: &'static [Opcode] = &[$(Opcode::$name),*];
            pub fn from_u8(v: u8) -> Option<Self> {
                Self::ALL.get(v as usize).copied()
            }
            pub fn name(&self) -> &'static str {
                match self {
                    $(Opcode::$name => $text),*
                }
            }
        }
    };
}

opcodes! {
    Add => "ADD", Sub => "SUB", Mul => "MUL", Div => "DIV", Mod => "MOD",
    Lt => "LT", Le => "LE", Eq => "EQ", Ne => "NE", Gt => "GT", Ge => "GE",
    And => "AND", Or => "OR", Xor => "XOR", Shl => "SHL", Shr => "SHR",
    Connect => "CONNECT", Neg => "NEG", Flip => "FLIP",
    LdNil => "LDNIL", LdBool => "LDBOOL", LdInt => "LDINT", LdConst => "LDCONST",
    Move => "MOVE", GetGbl => "GETGBL", SetGbl => "SETGBL",
    GetUpv => "GETUPV", SetUpv => "SETUPV",
    Jmp => "JMP", JmpT => "JMPT", JmpF => "JMPF",
    Call => "CALL", Ret => "RET", Closure => "CLOSURE",
    GetMbr => "GETMBR", GetMet => "GETMET", SetMbr => "SETMBR",
    GetIdx => "GETIDX", SetIdx => "SETIDX", SetSuper => "SETSUPER",
    Close => "CLOSE", Import => "IMPORT", ExBlk => "EXBLK", Catch => "CATCH",
    Raise => "RAISE", Class => "CLASS", GetNgbl => "GETNGBL", SetNgbl => "SETNGBL",
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    pub fn abc(op: Opcode, a: u8, b: u32, c: u32) -> Self {
        Self(
            ((op as u32) << OP_POS)
                | ((a as u32) << RA_POS)
                | ((b & RK_MASK) << RKB_POS)
                | (c & RK_MASK),
        )
    }
    pub fn abx(op: Opcode, a: u8, bx: u32) -> Self {
        Self(((op as u32) << OP_POS) | ((a as u32) << RA_POS) | (bx & BX_MASK))
    }
    pub fn asbx(op: Opcode, a: u8, sbx: i32) -> Self {
        Self::abx(op, a, (sbx + SBX_MAX) as u32)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_u8(((self.0 >> OP_POS) & OP_MASK) as u8)
    }
    pub fn ra(&self) -> u32 {
        (self.0 >> RA_POS) & RA_MASK
    }
    pub fn rkb(&self) -> u32 {
        (self.0 >> RKB_POS) & RK_MASK
    }
    pub fn rkc(&self) -> u32 {
        self.0 & RK_MASK
    }
    pub fn bx(&self) -> u32 {
        self.0 & BX_MASK
    }
    pub fn sbx(&self) -> i32 {
        self.bx() as i32 - SBX_MAX
    }

    /// Index of the global slot read or written by GETGBL / SETGBL.
    pub fn global_access(&self) -> Option<u32> {
        match self.op() {
            Some(Opcode::GetGbl | Opcode::SetGbl) => Some(self.bx()),
            _ => None,
        }
    }

    /// Disassembly view of this instruction at program counter `pc`.
    pub fn disasm(&self, pc: usize) -> Disasm {
        Disasm { ins: *self, pc }
    }
}

impl From<u32> for Instruction {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

pub struct Disasm {
    ins: Instruction,
    pc: usize,
}

fn rk(v: u32) -> (char, u32) {
    let c = if v & K_FLAG != 0 { 'K' } else { 'R' };
    (c, v & KR_MASK)
}

impl fmt::Display for Disasm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ins = &self.ins;
        write!(f, "  {:04X}  ", self.pc)?;
        let Some(op) = ins.op() else {
            return write!(f, "??");
        };
        let name = op.name();
        let (a, b, c) = (ins.ra(), rk(ins.rkb()), rk(ins.rkc()));
        let target = self.pc as i64 + ins.sbx() as i64 + 1;
        use Opcode::*;
        match op {
            Add | Sub | Mul | Div | Mod | Lt | Le | Eq | Ne | Gt | Ge | Connect | GetMbr
            | SetMbr | GetMet | GetIdx | SetIdx | And | Or | Xor | Shl | Shr => {
                write!(f, "{name}\tR{a}\t{}{}\t{}{}", b.0, b.1, c.0, c.1)
            }
            GetNgbl | SetNgbl | Move | SetSuper | Neg | Flip | Import => {
                write!(f, "{name}\tR{a}\t{}{}", b.0, b.1)
            }
            GetGbl | SetGbl => write!(f, "{name}\tR{a}\tG{}", ins.bx()),
            Jmp => write!(f, "{name}\t\t#{target:04X}"),
            JmpT | JmpF => write!(f, "{name}\tR{a}\t#{target:04X}"),
            LdInt => write!(f, "{name}\tR{a}\t{}", ins.sbx()),
            LdBool | Catch => write!(f, "{name}\tR{a}\t{}\t{}", ins.rkb(), ins.rkc()),
            Ret if a != 0 => write!(f, "{name}\t{a}\t{}{}", b.0, b.1),
            Ret => write!(f, "{name}\t{a}"),
            GetUpv | SetUpv => write!(f, "{name}\tR{a}\tU{}", ins.rkb()),
            LdConst => write!(f, "{name}\tR{a}\tK{}", ins.bx()),
            Call => write!(f, "{name}\tR{a}\t{}", ins.rkb()),
            Closure => write!(f, "{name}\tR{a}\tP{}", ins.bx()),
            Class => write!(f, "{name}\tK{}", ins.bx()),
            Close | LdNil => write!(f, "{name}\tR{a}"),
            Raise => write!(f, "{name}\t{a}\t{}{}\t{}{}", b.0, b.1, c.0, c.1),
            ExBlk if a != 0 => write!(f, "{name}\t{a}\t{}", ins.bx()),
            ExBlk => write!(f, "{name}\t{a}\t#{target:04X}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn opcode_table_order() {
        assert_eq!(Opcode::from_u8(0), Some(Opcode::Add));
        assert_eq!(Opcode::from_u8(24), Some(Opcode::GetGbl));
        assert_eq!(Opcode::from_u8(25), Some(Opcode::SetGbl));
        assert_eq!(Opcode::from_u8(47), Some(Opcode::SetNgbl));
        assert_eq!(Opcode::from_u8(48), None);
    }

    #[test]
    fn field_roundtrip() {
        let ins = Instruction::abc(Opcode::Add, 3, 1 | K_FLAG, 2);
        assert_eq!(ins.op(), Some(Opcode::Add));
        assert_eq!(ins.ra(), 3);
        assert_eq!(ins.rkb(), 0x101);
        assert_eq!(ins.rkc(), 2);
        let jmp = Instruction::asbx(Opcode::Jmp, 0, -3);
        assert_eq!(jmp.sbx(), -3);
        assert_eq!(Instruction::abx(Opcode::GetGbl, 1, 7).global_access(), Some(7));
        assert_eq!(Instruction::abx(Opcode::LdConst, 1, 7).global_access(), None);
    }

    #[test]
    fn known_words() {
        // GETGBL R2 G27, as emitted by the host compiler
        let ins = Instruction(0x6008001B);
        assert_eq!(ins.op(), Some(Opcode::GetGbl));
        assert_eq!(ins.disasm(0).to_string(), "  0000  GETGBL\tR2\tG27");
        // RET 0
        assert_eq!(Instruction(0x80000000).disasm(5).to_string(), "  0005  RET\t0");
    }

    #[test]
    fn disasm_operands() {
        let add = Instruction::abc(Opcode::Add, 3, 1 | K_FLAG, 2);
        assert_eq!(add.disasm(1).to_string(), "  0001  ADD\tR3\tK1\tR2");
        let jmpf = Instruction::asbx(Opcode::JmpF, 4, 2);
        assert_eq!(jmpf.disasm(16).to_string(), "  0010  JMPF\tR4\t#0013");
        assert_eq!(Instruction(0xFC000000).disasm(0).to_string(), "  0000  ??");
    }
}
