//! Serializes a [`Module`] back to bytes, per the layout in `format`.

use std::collections::HashMap;

use zerocopy::{AsBytes, U32};

use crate::body::MethodBody;
use crate::cursor::Writer as Cursor;
use crate::format::{ModuleHeaderFixed, MAGIC, NO_TYPE};
use crate::ids::InstrId;
use crate::instr::{Compare, Instruction, OpCode, Operand};
use crate::module::Module;

/// Writes `module` to its on-disk representation.
pub fn write_module(module: &Module) -> Vec<u8> {
    let header = ModuleHeaderFixed {
        magic: MAGIC,
        type_count: U32::new(module.types.len() as u32),
        method_count: U32::new(module.methods.len() as u32),
        field_count: U32::new(module.fields.len() as u32),
    };

    let mut out = header.as_bytes().to_vec();

    let mut w = Cursor::new();
    w.string(&module.name);

    for t in &module.types {
        w.string(&t.namespace);
        w.string(&t.name);
        w.u32(t.declaring_type.map(|id| id.0).unwrap_or(NO_TYPE));
        w.string_list(&t.attributes);
        w.u32(t.methods.len() as u32);
        for m in &t.methods {
            w.u32(m.0);
        }
        w.u32(t.fields.len() as u32);
        for f in &t.fields {
            w.u32(f.0);
        }
    }

    for m in &module.methods {
        w.string(&m.name);
        w.u32(m.declaring_type.0);
        w.string_list(&m.attributes);
        w.bool(m.is_native);
        w.bool(m.is_static_constructor);
        w.u32(m.return_type.map(|id| id.0).unwrap_or(NO_TYPE));
        w.bool(m.body.is_some());
        if let Some(body) = &m.body {
            write_body(&mut w, body);
        }
    }

    for f in &module.fields {
        w.string(&f.name);
        w.u32(f.declaring_type.0);
        w.u32(f.type_ref.0);
    }

    out.extend(w.into_bytes());
    out
}

fn write_body(w: &mut Cursor, body: &MethodBody) {
    w.u32(body.locals.len() as u32);
    for l in &body.locals {
        w.u32(l.type_ref.0);
    }

    let offsets = body.final_offsets();

    w.u32(body.instructions.len() as u32);
    for instr in &body.instructions {
        write_instruction(w, instr, &offsets);
    }

    w.u32(body.exception_handlers.len() as u32);
    for eh in &body.exception_handlers {
        w.u32(offsets[&eh.try_start]);
        w.u32(offsets[&eh.try_end]);
        w.u32(offsets[&eh.handler_start]);
        w.u32(offsets[&eh.handler_end]);
        write_optional_offset(w, eh.filter_start, &offsets);
        write_optional_offset(w, eh.filter_end, &offsets);
    }
}

fn write_optional_offset(w: &mut Cursor, id: Option<InstrId>, offsets: &HashMap<InstrId, u32>) {
    match id {
        Some(id) => {
            w.bool(true);
            w.u32(offsets[&id]);
        }
        None => w.bool(false),
    }
}

fn write_instruction(w: &mut Cursor, instr: &Instruction, offsets: &HashMap<InstrId, u32>) {
    write_opcode(w, &instr.opcode);
    write_operand(w, &instr.operand, offsets);
}

fn write_opcode(w: &mut Cursor, opcode: &OpCode) {
    match opcode {
        OpCode::Nop => w.u8(0),
        OpCode::Dup => w.u8(1),
        OpCode::Pop => w.u8(2),
        OpCode::Ret => w.u8(3),
        OpCode::LdcI4 => w.u8(4),
        OpCode::LdStr => w.u8(5),
        OpCode::LdArg(n) => {
            w.u8(6);
            w.u16(*n);
        }
        OpCode::LdLoc(n) => {
            w.u8(7);
            w.u16(*n);
        }
        OpCode::StLoc(n) => {
            w.u8(8);
            w.u16(*n);
        }
        OpCode::LdSFld => w.u8(9),
        OpCode::StSFld => w.u8(10),
        OpCode::LdElemA => w.u8(11),
        OpCode::NewArr => w.u8(12),
        OpCode::Call => w.u8(13),
        OpCode::CallVirt => w.u8(14),
        OpCode::Br => w.u8(15),
        OpCode::BrCond { branch_if_true } => {
            w.u8(16);
            w.bool(*branch_if_true);
        }
        OpCode::BrCompare(cmp) => {
            w.u8(17);
            w.u8(compare_tag(*cmp));
        }
        OpCode::Switch => w.u8(18),
        OpCode::ShortForm(inner) => {
            w.u8(19);
            write_opcode(w, inner);
        }
    }
}

fn compare_tag(cmp: Compare) -> u8 {
    match cmp {
        Compare::Eq => 0,
        Compare::Ne => 1,
        Compare::Lt => 2,
        Compare::Le => 3,
        Compare::Gt => 4,
        Compare::Ge => 5,
    }
}

fn write_operand(w: &mut Cursor, operand: &Operand, offsets: &HashMap<InstrId, u32>) {
    match operand {
        Operand::None => w.u8(0),
        Operand::I32(v) => {
            w.u8(1);
            w.i32(*v);
        }
        Operand::String(s) => {
            w.u8(2);
            w.string(s);
        }
        Operand::Field(id) => {
            w.u8(3);
            w.u32(id.0);
        }
        Operand::Method(id) => {
            w.u8(4);
            w.u32(id.0);
        }
        Operand::Type(id) => {
            w.u8(5);
            w.u32(id.0);
        }
        Operand::Instr(id) => {
            w.u8(6);
            w.u32(offsets[id]);
        }
        Operand::InstrList(ids) => {
            w.u8(7);
            w.u32(ids.len() as u32);
            for id in ids {
                w.u32(offsets[id]);
            }
        }
    }
}
