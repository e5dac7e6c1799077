use std::fmt;

use crate::modules::{body::MethodBody, instructions::Instr};

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.op().mnemonic();
        match self {
            Instr::LoadArg(index) | Instr::LoadLocal(index) | Instr::StoreLocal(index) => {
                write!(f, "{} {}", mnemonic, index)
            }
            Instr::LoadInt(value) => write!(f, "{} {}", mnemonic, value),
            Instr::LoadStr(value) => write!(f, "{} {:?}", mnemonic, value),
            Instr::LoadField(field) | Instr::StoreField(field) => {
                write!(f, "{} {}", mnemonic, field)
            }
            Instr::NewObj(method) | Instr::Call(method) | Instr::CallVirt(method) => {
                write!(f, "{} {}", mnemonic, method)
            }
            Instr::Br(target) | Instr::BrTrue(target) | Instr::BrFalse(target) => {
                write!(f, "{} {:?}", mnemonic, target)
            }
            Instr::Nop | Instr::LoadNull | Instr::Dup | Instr::Pop | Instr::Ret | Instr::Throw => {
                write!(f, "{}", mnemonic)
            }
        }
    }
}

/// Listing with one instruction per line, branch targets rendered as labels.
impl fmt::Display for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, (_, instr)) in self.iter().enumerate() {
            write!(f, "IL_{:04}: ", position)?;
            match instr.branch_target() {
                Some(target) => match self.position(target) {
                    Some(label) => writeln!(f, "{} IL_{:04}", instr.op().mnemonic(), label)?,
                    None => writeln!(f, "{} <dangling>", instr.op().mnemonic())?,
                },
                None => writeln!(f, "{}", instr)?,
            }
        }
        Ok(())
    }
}
