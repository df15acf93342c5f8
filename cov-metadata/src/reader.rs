//! Parses a [`Module`] from its on-disk representation, per the layout in `format`.

use std::collections::HashMap;

use anyhow::{bail, Result};
use zerocopy::FromBytes;

use crate::body::{ExceptionHandler, Local, MethodBody};
use crate::cursor::Reader as Cursor;
use crate::format::{ModuleHeaderFixed, MAGIC, NO_TYPE};
use crate::ids::{FieldId, InstrId, MethodId, TypeId};
use crate::instr::{encoded_size_of, Compare, Instruction, OpCode, Operand};
use crate::module::{FieldDef, MethodDef, Module, TypeDef};

/// Raw operand as read from disk: instruction-reference payloads are
/// still byte offsets at this point, not yet resolved to `InstrId`.
enum RawOperand {
    Resolved(Operand),
    Instr(u32),
    InstrList(Vec<u32>),
}

/// Parses `bytes` as a module container.
pub fn parse_module(bytes: &[u8]) -> Result<Module> {
    let Some(header) = ModuleHeaderFixed::ref_from_prefix(bytes) else {
        bail!("module data is too short to contain a header");
    };
    let rest = &bytes[std::mem::size_of::<ModuleHeaderFixed>()..];
    if header.magic != MAGIC {
        bail!("not a recognized module container (bad magic)");
    }
    let type_count = header.type_count.get();
    let method_count = header.method_count.get();
    let field_count = header.field_count.get();

    let mut r = Cursor::new(rest);
    let name = r.string()?;

    let mut types = Vec::with_capacity(type_count as usize);
    for _ in 0..type_count {
        let namespace = r.string()?;
        let tname = r.string()?;
        let declaring_type_raw = r.u32()?;
        let declaring_type = if declaring_type_raw == NO_TYPE {
            None
        } else {
            Some(TypeId(declaring_type_raw))
        };
        let attributes = r.string_list()?;
        let method_ids = read_id_list(&mut r)?;
        let field_ids = read_id_list(&mut r)?;
        types.push(TypeDef {
            namespace,
            name: tname,
            declaring_type,
            attributes,
            methods: method_ids.into_iter().map(MethodId).collect(),
            fields: field_ids.into_iter().map(FieldId).collect(),
        });
    }

    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        let mname = r.string()?;
        let declaring_type = TypeId(r.u32()?);
        let attributes = r.string_list()?;
        let is_native = r.bool()?;
        let is_static_constructor = r.bool()?;
        let return_type_raw = r.u32()?;
        let return_type = if return_type_raw == NO_TYPE { None } else { Some(TypeId(return_type_raw)) };
        let has_body = r.bool()?;
        let body = if has_body { Some(read_body(&mut r)?) } else { None };
        methods.push(MethodDef {
            name: mname,
            declaring_type,
            attributes,
            is_native,
            is_static_constructor,
            return_type,
            body,
        });
    }

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let fname = r.string()?;
        let declaring_type = TypeId(r.u32()?);
        let type_ref = TypeId(r.u32()?);
        fields.push(FieldDef {
            name: fname,
            declaring_type,
            type_ref,
        });
    }

    if !r.is_empty() {
        bail!("trailing data after module container");
    }

    Ok(Module {
        name,
        types,
        methods,
        fields,
    })
}

fn read_id_list(r: &mut Cursor) -> Result<Vec<u32>> {
    let count = r.u32()?;
    (0..count).map(|_| r.u32()).collect()
}

fn read_body(r: &mut Cursor) -> Result<MethodBody> {
    let local_count = r.u32()?;
    let mut locals = Vec::with_capacity(local_count as usize);
    for _ in 0..local_count {
        locals.push(Local {
            type_ref: TypeId(r.u32()?),
        });
    }

    let instr_count = r.u32()?;
    let mut raw_instructions = Vec::with_capacity(instr_count as usize);
    let mut offset_to_id: HashMap<u32, InstrId> = HashMap::with_capacity(instr_count as usize);
    let mut offset = 0u32;
    for pos in 0..instr_count {
        let id = InstrId(pos as u64);
        offset_to_id.insert(offset, id);
        let opcode = read_opcode(r)?;
        let raw_operand = read_raw_operand(r)?;
        let switch_case_count = match &raw_operand {
            RawOperand::InstrList(offsets) => offsets.len() as u32,
            _ => 0,
        };
        let mut instr = Instruction::new(id, opcode, Operand::None);
        instr.source_offset = offset;
        offset += encoded_size_of(&instr.opcode, switch_case_count);
        raw_instructions.push((instr, raw_operand));
    }

    let instructions = raw_instructions
        .into_iter()
        .map(|(mut instr, raw)| -> Result<Instruction> {
            instr.operand = resolve_operand(raw, &offset_to_id)?;
            Ok(instr)
        })
        .collect::<Result<Vec<_>>>()?;

    let handler_count = r.u32()?;
    let mut exception_handlers = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let try_start = resolve_offset(r.u32()?, &offset_to_id)?;
        let try_end = resolve_offset(r.u32()?, &offset_to_id)?;
        let handler_start = resolve_offset(r.u32()?, &offset_to_id)?;
        let handler_end = resolve_offset(r.u32()?, &offset_to_id)?;
        let filter_start = read_optional_offset(r, &offset_to_id)?;
        let filter_end = read_optional_offset(r, &offset_to_id)?;
        exception_handlers.push(ExceptionHandler {
            try_start,
            try_end,
            handler_start,
            handler_end,
            filter_start,
            filter_end,
        });
    }

    Ok(MethodBody::new(locals, instructions, exception_handlers))
}

fn read_optional_offset(r: &mut Cursor, offset_to_id: &HashMap<u32, InstrId>) -> Result<Option<InstrId>> {
    if r.bool()? {
        Ok(Some(resolve_offset(r.u32()?, offset_to_id)?))
    } else {
        Ok(None)
    }
}

fn resolve_offset(offset: u32, offset_to_id: &HashMap<u32, InstrId>) -> Result<InstrId> {
    offset_to_id
        .get(&offset)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("instruction operand references offset {offset} which is not an instruction boundary"))
}

fn resolve_operand(raw: RawOperand, offset_to_id: &HashMap<u32, InstrId>) -> Result<Operand> {
    match raw {
        RawOperand::Resolved(op) => Ok(op),
        RawOperand::Instr(offset) => Ok(Operand::Instr(resolve_offset(offset, offset_to_id)?)),
        RawOperand::InstrList(offsets) => offsets
            .into_iter()
            .map(|o| resolve_offset(o, offset_to_id))
            .collect::<Result<Vec<_>>>()
            .map(Operand::InstrList),
    }
}

fn read_opcode(r: &mut Cursor) -> Result<OpCode> {
    Ok(match r.u8()? {
        0 => OpCode::Nop,
        1 => OpCode::Dup,
        2 => OpCode::Pop,
        3 => OpCode::Ret,
        4 => OpCode::LdcI4,
        5 => OpCode::LdStr,
        6 => OpCode::LdArg(r.u16()?),
        7 => OpCode::LdLoc(r.u16()?),
        8 => OpCode::StLoc(r.u16()?),
        9 => OpCode::LdSFld,
        10 => OpCode::StSFld,
        11 => OpCode::LdElemA,
        12 => OpCode::NewArr,
        13 => OpCode::Call,
        14 => OpCode::CallVirt,
        15 => OpCode::Br,
        16 => OpCode::BrCond {
            branch_if_true: r.bool()?,
        },
        17 => OpCode::BrCompare(read_compare(r.u8()?)?),
        18 => OpCode::Switch,
        19 => OpCode::ShortForm(Box::new(read_opcode(r)?)),
        other => bail!("unknown opcode tag {other}"),
    })
}

fn read_compare(tag: u8) -> Result<Compare> {
    Ok(match tag {
        0 => Compare::Eq,
        1 => Compare::Ne,
        2 => Compare::Lt,
        3 => Compare::Le,
        4 => Compare::Gt,
        5 => Compare::Ge,
        other => bail!("unknown compare tag {other}"),
    })
}

fn read_raw_operand(r: &mut Cursor) -> Result<RawOperand> {
    Ok(match r.u8()? {
        0 => RawOperand::Resolved(Operand::None),
        1 => RawOperand::Resolved(Operand::I32(r.i32()?)),
        2 => RawOperand::Resolved(Operand::String(r.string()?)),
        3 => RawOperand::Resolved(Operand::Field(FieldId(r.u32()?))),
        4 => RawOperand::Resolved(Operand::Method(MethodId(r.u32()?))),
        5 => RawOperand::Resolved(Operand::Type(TypeId(r.u32()?))),
        6 => RawOperand::Instr(r.u32()?),
        7 => {
            let count = r.u32()?;
            let mut offsets = Vec::with_capacity(count as usize);
            for _ in 0..count {
                offsets.push(r.u32()?);
            }
            RawOperand::InstrList(offsets)
        }
        other => bail!("unknown operand tag {other}"),
    })
}
