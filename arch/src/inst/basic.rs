//! Integer, memory, control and coprocessor 0 instructions.

use super::{basic_def, BasicDef};
use crate::bits;
use crate::error::SimError;
use crate::machine::Machine;

/// Sign-extended 16-bit immediate field.
fn simm(field: i32) -> i32 {
    field as i16 as i32
}

/// Zero-extended 16-bit immediate field.
fn uimm(field: i32) -> i32 {
    field & 0xFFFF
}

/// Effective address `base + offset` of a load or store.
fn address(m: &Machine, base: i32, offset: i32) -> u32 {
    m.gpr(base).wrapping_add(simm(offset)) as u32
}

fn add_checked(a: i32, b: i32) -> Result<i32, SimError> {
    a.checked_add(b).ok_or(SimError::Overflow)
}

fn sub_checked(a: i32, b: i32) -> Result<i32, SimError> {
    a.checked_sub(b).ok_or(SimError::Overflow)
}

fn hilo(m: &Machine) -> i64 {
    ((m.regs.hi() as i64) << 32) | (m.regs.lo() as u32 as i64)
}

fn set_hilo(m: &mut Machine, value: i64) {
    m.regs.set_hi((value >> 32) as i32);
    m.regs.set_lo(value as i32);
}

fn jump_target(m: &Machine, field: i32) -> u32 {
    (m.regs.pc() & 0xF000_0000) | ((field as u32) << 2)
}

fn trap_if(cond: bool) -> Result<(), SimError> {
    if cond {
        Err(SimError::Trap)
    } else {
        Ok(())
    }
}

pub(crate) fn catalog() -> Vec<BasicDef> {
    vec![
        basic_def!("nop", "Null operation : machine code is all zeroes", R,
            "000000 00000 00000 00000 00000 000000",
            |_, _| Ok(())),
        basic_def!("add $t1,$t2,$t3", "Addition with overflow : set $t1 to ($t2 plus $t3)", R,
            "000000 sssss ttttt fffff 00000 100000",
            |m, ops| {
                let sum = add_checked(m.gpr(ops[1]), m.gpr(ops[2]))?;
                m.set_gpr(ops[0], sum);
                Ok(())
            }),
        basic_def!("sub $t1,$t2,$t3", "Subtraction with overflow : set $t1 to ($t2 minus $t3)", R,
            "000000 sssss ttttt fffff 00000 100010",
            |m, ops| {
                let diff = sub_checked(m.gpr(ops[1]), m.gpr(ops[2]))?;
                m.set_gpr(ops[0], diff);
                Ok(())
            }),
        basic_def!("addi $t1,$t2,-100", "Addition immediate with overflow : set $t1 to ($t2 plus signed 16-bit immediate)", I,
            "001000 sssss fffff tttttttttttttttt",
            |m, ops| {
                let sum = add_checked(m.gpr(ops[1]), simm(ops[2]))?;
                m.set_gpr(ops[0], sum);
                Ok(())
            }),
        basic_def!("addu $t1,$t2,$t3", "Addition unsigned without overflow : set $t1 to ($t2 plus $t3), no overflow", R,
            "000000 sssss ttttt fffff 00000 100001",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]).wrapping_add(m.gpr(ops[2])));
                Ok(())
            }),
        basic_def!("subu $t1,$t2,$t3", "Subtraction unsigned without overflow : set $t1 to ($t2 minus $t3), no overflow", R,
            "000000 sssss ttttt fffff 00000 100011",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]).wrapping_sub(m.gpr(ops[2])));
                Ok(())
            }),
        basic_def!("addiu $t1,$t2,-100", "Addition immediate unsigned without overflow : set $t1 to ($t2 plus signed 16-bit immediate), no overflow", I,
            "001001 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]).wrapping_add(simm(ops[2])));
                Ok(())
            }),
        basic_def!("mult $t1,$t2", "Multiplication : Set hi to high-order 32 bits, lo to low-order 32 bits of the product of $t1 and $t2", R,
            "000000 fffff sssss 00000 00000 011000",
            |m, ops| {
                let product = m.gpr(ops[0]) as i64 * m.gpr(ops[1]) as i64;
                set_hilo(m, product);
                Ok(())
            }),
        basic_def!("multu $t1,$t2", "Multiplication unsigned : Set HI to high-order 32 bits, LO to low-order 32 bits of the product of unsigned $t1 and $t2", R,
            "000000 fffff sssss 00000 00000 011001",
            |m, ops| {
                let product = m.gpr(ops[0]) as u32 as u64 * m.gpr(ops[1]) as u32 as u64;
                set_hilo(m, product as i64);
                Ok(())
            }),
        basic_def!("mul $t1,$t2,$t3", "Multiplication without overflow : Set HI to high-order 32 bits, LO and $t1 to low-order 32 bits of the product of $t2 and $t3", R,
            "011100 sssss ttttt fffff 00000 000010",
            |m, ops| {
                let product = m.gpr(ops[1]) as i64 * m.gpr(ops[2]) as i64;
                set_hilo(m, product);
                m.set_gpr(ops[0], product as i32);
                Ok(())
            }),
        basic_def!("madd $t1,$t2", "Multiply add : Multiply $t1 by $t2 then increment HI by high-order 32 bits of product, increment LO by low-order 32 bits of product", R,
            "011100 fffff sssss 00000 00000 000000",
            |m, ops| {
                let product = m.gpr(ops[0]) as i64 * m.gpr(ops[1]) as i64;
                let acc = hilo(m).wrapping_add(product);
                set_hilo(m, acc);
                Ok(())
            }),
        basic_def!("maddu $t1,$t2", "Multiply add unsigned : Multiply $t1 by $t2 then increment HI by high-order 32 bits of product, increment LO by low-order 32 bits of product, unsigned", R,
            "011100 fffff sssss 00000 00000 000001",
            |m, ops| {
                let product = m.gpr(ops[0]) as u32 as u64 * m.gpr(ops[1]) as u32 as u64;
                let acc = (hilo(m) as u64).wrapping_add(product) as i64;
                set_hilo(m, acc);
                Ok(())
            }),
        basic_def!("msub $t1,$t2", "Multiply subtract : Multiply $t1 by $t2 then decrement HI by high-order 32 bits of product, decrement LO by low-order 32 bits of product", R,
            "011100 fffff sssss 00000 00000 000100",
            |m, ops| {
                let product = m.gpr(ops[0]) as i64 * m.gpr(ops[1]) as i64;
                let acc = hilo(m).wrapping_sub(product);
                set_hilo(m, acc);
                Ok(())
            }),
        basic_def!("msubu $t1,$t2", "Multiply subtract unsigned : Multiply $t1 by $t2 then decrement HI by high-order 32 bits of product, decement LO by low-order 32 bits of product, unsigned", R,
            "011100 fffff sssss 00000 00000 000101",
            |m, ops| {
                let product = m.gpr(ops[0]) as u32 as u64 * m.gpr(ops[1]) as u32 as u64;
                let acc = (hilo(m) as u64).wrapping_sub(product) as i64;
                set_hilo(m, acc);
                Ok(())
            }),
        basic_def!("div $t1,$t2", "Division with overflow : Divide $t1 by $t2 then set LO to quotient and HI to remainder", R,
            "000000 fffff sssss 00000 00000 011010",
            |m, ops| {
                let (a, b) = (m.gpr(ops[0]), m.gpr(ops[1]));
                // Division by zero leaves HI and LO undefined; they are untouched here.
                if b != 0 {
                    m.regs.set_lo(a.wrapping_div(b));
                    m.regs.set_hi(a.wrapping_rem(b));
                }
                Ok(())
            }),
        basic_def!("divu $t1,$t2", "Division unsigned without overflow : Divide unsigned $t1 by $t2 then set LO to quotient and HI to remainder", R,
            "000000 fffff sssss 00000 00000 011011",
            |m, ops| {
                let (a, b) = (m.gpr(ops[0]) as u32, m.gpr(ops[1]) as u32);
                if b != 0 {
                    m.regs.set_lo((a / b) as i32);
                    m.regs.set_hi((a % b) as i32);
                }
                Ok(())
            }),
        basic_def!("mfhi $t1", "Move from HI register : Set $t1 to contents of HI", R,
            "000000 00000 00000 fffff 00000 010000",
            |m, ops| {
                m.set_gpr(ops[0], m.regs.hi());
                Ok(())
            }),
        basic_def!("mflo $t1", "Move from LO register : Set $t1 to contents of LO", R,
            "000000 00000 00000 fffff 00000 010010",
            |m, ops| {
                m.set_gpr(ops[0], m.regs.lo());
                Ok(())
            }),
        basic_def!("mthi $t1", "Move to HI registerr : Set HI to contents of $t1", R,
            "000000 fffff 00000 00000 00000 010001",
            |m, ops| {
                m.regs.set_hi(m.gpr(ops[0]));
                Ok(())
            }),
        basic_def!("mtlo $t1", "Move to LO register : Set LO to contents of $t1", R,
            "000000 fffff 00000 00000 00000 010011",
            |m, ops| {
                m.regs.set_lo(m.gpr(ops[0]));
                Ok(())
            }),
        basic_def!("and $t1,$t2,$t3", "Bitwise AND : Set $t1 to bitwise AND of $t2 and $t3", R,
            "000000 sssss ttttt fffff 00000 100100",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) & m.gpr(ops[2]));
                Ok(())
            }),
        basic_def!("or $t1,$t2,$t3", "Bitwise OR : Set $t1 to bitwise OR of $t2 and $t3", R,
            "000000 sssss ttttt fffff 00000 100101",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) | m.gpr(ops[2]));
                Ok(())
            }),
        basic_def!("andi $t1,$t2,100", "Bitwise AND immediate : Set $t1 to bitwise AND of $t2 and zero-extended 16-bit immediate", I,
            "001100 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) & uimm(ops[2]));
                Ok(())
            }),
        basic_def!("ori $t1,$t2,100", "Bitwise OR immediate : Set $t1 to bitwise OR of $t2 and zero-extended 16-bit immediate", I,
            "001101 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) | uimm(ops[2]));
                Ok(())
            }),
        basic_def!("nor $t1,$t2,$t3", "Bitwise NOR : Set $t1 to bitwise NOR of $t2 and $t3", R,
            "000000 sssss ttttt fffff 00000 100111",
            |m, ops| {
                m.set_gpr(ops[0], !(m.gpr(ops[1]) | m.gpr(ops[2])));
                Ok(())
            }),
        basic_def!("xor $t1,$t2,$t3", "Bitwise XOR (exclusive OR) : Set $t1 to bitwise XOR of $t2 and $t3", R,
            "000000 sssss ttttt fffff 00000 100110",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) ^ m.gpr(ops[2]));
                Ok(())
            }),
        basic_def!("xori $t1,$t2,100", "Bitwise XOR immediate : Set $t1 to bitwise XOR of $t2 and zero-extended 16-bit immediate", I,
            "001110 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) ^ uimm(ops[2]));
                Ok(())
            }),
        basic_def!("sll $t1,$t2,10", "Shift left logical : Set $t1 to result of shifting $t2 left by number of bits specified by immediate", R,
            "000000 00000 sssss fffff ttttt 000000",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]).wrapping_shl(ops[2] as u32 & 0x1F));
                Ok(())
            }),
        basic_def!("sllv $t1,$t2,$t3", "Shift left logical variable : Set $t1 to result of shifting $t2 left by number of bits specified by value in low-order 5 bits of $t3", R,
            "000000 ttttt sssss fffff 00000 000100",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]).wrapping_shl(m.gpr(ops[2]) as u32 & 0x1F));
                Ok(())
            }),
        basic_def!("srl $t1,$t2,10", "Shift right logical : Set $t1 to result of shifting $t2 right by number of bits specified by immediate", R,
            "000000 00000 sssss fffff ttttt 000010",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) as u32 >> (ops[2] as u32 & 0x1F)) as i32);
                Ok(())
            }),
        basic_def!("sra $t1,$t2,10", "Shift right arithmetic : Set $t1 to result of sign-extended shifting $t2 right by number of bits specified by immediate", R,
            "000000 00000 sssss fffff ttttt 000011",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) >> (ops[2] as u32 & 0x1F));
                Ok(())
            }),
        basic_def!("srav $t1,$t2,$t3", "Shift right arithmetic variable : Set $t1 to result of sign-extended shifting $t2 right by number of bits specified by value in low-order 5 bits of $t3", R,
            "000000 ttttt sssss fffff 00000 000111",
            |m, ops| {
                m.set_gpr(ops[0], m.gpr(ops[1]) >> (m.gpr(ops[2]) as u32 & 0x1F));
                Ok(())
            }),
        basic_def!("srlv $t1,$t2,$t3", "Shift right logical variable : Set $t1 to result of shifting $t2 right by number of bits specified by value in low-order 5 bits of $t3", R,
            "000000 ttttt sssss fffff 00000 000110",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) as u32 >> (m.gpr(ops[2]) as u32 & 0x1F)) as i32);
                Ok(())
            }),
        basic_def!("lw $t1,-100($t2)", "Load word : Set $t1 to contents of effective memory word address", I,
            "100011 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_word(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value);
                Ok(())
            }),
        basic_def!("ll $t1,-100($t2)", "Load linked : Paired with Store Conditional (sc) to perform atomic read-modify-write.  Treated as equivalent to Load Word (lw) because MIPS is not multi-processor.", I,
            "110000 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_word(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value);
                Ok(())
            }),
        basic_def!("lwl $t1,-100($t2)", "Load word left : Load from 1 to 4 bytes left-justified into $t1, starting with effective memory byte address and continuing through the low-order byte of its word", I,
            "100010 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let addr = address(m, ops[2], ops[1]);
                let mut result = m.gpr(ops[0]);
                for i in 0..=(addr & 3) {
                    let byte = m.memory.get_byte(addr.wrapping_sub(i))?;
                    result = bits::set_byte(result, 3 - i, byte);
                }
                m.set_gpr(ops[0], result);
                Ok(())
            }),
        basic_def!("lwr $t1,-100($t2)", "Load word right : Load from 1 to 4 bytes right-justified into $t1, starting with effective memory byte address and continuing through the high-order byte of its word", I,
            "100110 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let addr = address(m, ops[2], ops[1]);
                let mut result = m.gpr(ops[0]);
                for i in 0..=(3 - (addr & 3)) {
                    let byte = m.memory.get_byte(addr.wrapping_add(i))?;
                    result = bits::set_byte(result, i, byte);
                }
                m.set_gpr(ops[0], result);
                Ok(())
            }),
        basic_def!("sw $t1,-100($t2)", "Store word : Store contents of $t1 into effective memory word address", I,
            "101011 ttttt fffff ssssssssssssssss",
            |m, ops| {
                m.memory.set_word(address(m, ops[2], ops[1]), m.gpr(ops[0]))?;
                Ok(())
            }),
        basic_def!("sc $t1,-100($t2)", "Store conditional : Paired with Load Linked (ll) to perform atomic read-modify-write.  Stores $t1 value into effective address, then sets $t1 to 1 for success.  Always succeeds because MIPS is not multi-processor.", I,
            "111000 ttttt fffff ssssssssssssssss",
            |m, ops| {
                m.memory.set_word(address(m, ops[2], ops[1]), m.gpr(ops[0]))?;
                m.set_gpr(ops[0], 1);
                Ok(())
            }),
        basic_def!("swl $t1,-100($t2)", "Store word left : Store high-order 1 to 4 bytes of $t1 into memory, starting with effective byte address and continuing through the low-order byte of its word", I,
            "101010 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let addr = address(m, ops[2], ops[1]);
                let source = m.gpr(ops[0]);
                for i in 0..=(addr & 3) {
                    m.memory.set_byte(addr.wrapping_sub(i), bits::get_byte(source, 3 - i))?;
                }
                Ok(())
            }),
        basic_def!("swr $t1,-100($t2)", "Store word right : Store low-order 1 to 4 bytes of $t1 into memory, starting with high-order byte of word containing effective byte address and continuing through that byte address", I,
            "101110 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let addr = address(m, ops[2], ops[1]);
                let source = m.gpr(ops[0]);
                for i in 0..=(3 - (addr & 3)) {
                    m.memory.set_byte(addr.wrapping_add(i), bits::get_byte(source, i))?;
                }
                Ok(())
            }),
        basic_def!("lui $t1,100", "Load upper immediate : Set high-order 16 bits of $t1 to 16-bit immediate and low-order 16 bits to 0", I,
            "001111 00000 fffff ssssssssssssssss",
            |m, ops| {
                m.set_gpr(ops[0], uimm(ops[1]) << 16);
                Ok(())
            }),
        basic_def!("beq $t1,$t2,label", "Branch if equal : Branch to statement at label's address if $t1 and $t2 are equal", IBranch,
            "000100 fffff sssss tttttttttttttttt",
            |m, ops| {
                if m.gpr(ops[0]) == m.gpr(ops[1]) {
                    m.process_branch(simm(ops[2]));
                }
                Ok(())
            }),
        basic_def!("bne $t1,$t2,label", "Branch if not equal : Branch to statement at label's address if $t1 and $t2 are not equal", IBranch,
            "000101 fffff sssss tttttttttttttttt",
            |m, ops| {
                if m.gpr(ops[0]) != m.gpr(ops[1]) {
                    m.process_branch(simm(ops[2]));
                }
                Ok(())
            }),
        basic_def!("bgez $t1,label", "Branch if greater than or equal to zero : Branch to statement at label's address if $t1 is greater than or equal to zero", IBranch,
            "000001 fffff 00001 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) >= 0 {
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("bgezal $t1,label", "Branch if greater then or equal to zero and link : If $t1 is greater than or equal to zero, then set $ra to the Program Counter and branch to statement at label's address", IBranch,
            "000001 fffff 10001 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) >= 0 {
                    m.process_return_address(31);
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("bgtz $t1,label", "Branch if greater than zero : Branch to statement at label's address if $t1 is greater than zero", IBranch,
            "000111 fffff 00000 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) > 0 {
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("blez $t1,label", "Branch if less than or equal to zero : Branch to statement at label's address if $t1 is less than or equal to zero", IBranch,
            "000110 fffff 00000 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) <= 0 {
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("bltz $t1,label", "Branch if less than zero : Branch to statement at label's address if $t1 is less than zero", IBranch,
            "000001 fffff 00000 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) < 0 {
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("bltzal $t1,label", "Branch if less than zero and link : If $t1 is less than or equal to zero, then set $ra to the Program Counter and branch to statement at label's address", IBranch,
            "000001 fffff 10000 ssssssssssssssss",
            |m, ops| {
                if m.gpr(ops[0]) < 0 {
                    m.process_return_address(31);
                    m.process_branch(simm(ops[1]));
                }
                Ok(())
            }),
        basic_def!("slt $t1,$t2,$t3", "Set less than : If $t2 is less than $t3, then set $t1 to 1 else set $t1 to 0", R,
            "000000 sssss ttttt fffff 00000 101010",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) < m.gpr(ops[2])) as i32);
                Ok(())
            }),
        basic_def!("sltu $t1,$t2,$t3", "Set less than unsigned : If $t2 is less than $t3 using unsigned comparision, then set $t1 to 1 else set $t1 to 0", R,
            "000000 sssss ttttt fffff 00000 101011",
            |m, ops| {
                m.set_gpr(ops[0], ((m.gpr(ops[1]) as u32) < (m.gpr(ops[2]) as u32)) as i32);
                Ok(())
            }),
        basic_def!("slti $t1,$t2,-100", "Set less than immediate : If $t2 is less than sign-extended 16-bit immediate, then set $t1 to 1 else set $t1 to 0", I,
            "001010 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) < simm(ops[2])) as i32);
                Ok(())
            }),
        basic_def!("sltiu $t1,$t2,-100", "Set less than immediate unsigned : If $t2 is less than  sign-extended 16-bit immediate using unsigned comparison, then set $t1 to 1 else set $t1 to 0", I,
            "001011 sssss fffff tttttttttttttttt",
            |m, ops| {
                m.set_gpr(ops[0], ((m.gpr(ops[1]) as u32) < (simm(ops[2]) as u32)) as i32);
                Ok(())
            }),
        basic_def!("movn $t1,$t2,$t3", "Move conditional not zero : Set $t1 to $t2 if $t3 is not zero", R,
            "000000 sssss ttttt fffff 00000 001011",
            |m, ops| {
                if m.gpr(ops[2]) != 0 {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("movz $t1,$t2,$t3", "Move conditional zero : Set $t1 to $t2 if $t3 is zero", R,
            "000000 sssss ttttt fffff 00000 001010",
            |m, ops| {
                if m.gpr(ops[2]) == 0 {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("movf $t1,$t2", "Move if FP condition flag 0 false : Set $t1 to $t2 if FPU (Coprocessor 1) condition flag 0 is false (zero)", R,
            "000000 sssss 000 00 fffff 00000 000001",
            |m, ops| {
                if !m.cop1.flag(0) {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("movf $t1,$t2,1", "Move if specified FP condition flag false : Set $t1 to $t2 if FPU (Coprocessor 1) condition flag specified by the immediate is false (zero)", R,
            "000000 sssss ttt 00 fffff 00000 000001",
            |m, ops| {
                if !m.cop1.flag(ops[2] as usize) {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("movt $t1,$t2", "Move if FP condition flag 0 true : Set $t1 to $t2 if FPU (Coprocessor 1) condition flag 0 is true (one)", R,
            "000000 sssss 000 01 fffff 00000 000001",
            |m, ops| {
                if m.cop1.flag(0) {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("movt $t1,$t2,1", "Move if specfied FP condition flag true : Set $t1 to $t2 if FPU (Coprocessor 1) condition flag specified by the immediate is true (one)", R,
            "000000 sssss ttt 01 fffff 00000 000001",
            |m, ops| {
                if m.cop1.flag(ops[2] as usize) {
                    m.set_gpr(ops[0], m.gpr(ops[1]));
                }
                Ok(())
            }),
        basic_def!("break 100", "Break execution with code : Terminate program execution with specified exception code", R,
            "000000 ffffffffffffffffffff 001101",
            |_, ops| Err(SimError::Break(ops[0]))),
        basic_def!("break", "Break execution : Terminate program execution with exception", R,
            "000000 00000 00000 00000 00000 001101",
            |_, _| Err(SimError::Break(0))),
        basic_def!("syscall", "Issue a system call : Execute the system call specified by value in $v0", R,
            "000000 00000 00000 00000 00000 001100",
            |m, _| m.syscall()),
        basic_def!("j target", "Jump unconditionally : Jump to statement at target address", J,
            "000010 ffffffffffffffffffffffffff",
            |m, ops| {
                let target = jump_target(m, ops[0]);
                m.process_jump(target);
                Ok(())
            }),
        basic_def!("jr $t1", "Jump register unconditionally : Jump to statement whose address is in $t1", R,
            "000000 fffff 00000 00000 00000 001000",
            |m, ops| {
                m.process_jump(m.gpr(ops[0]) as u32);
                Ok(())
            }),
        basic_def!("jal target", "Jump and link : Set $ra to Program Counter (return address) then jump to statement at target address", J,
            "000011 ffffffffffffffffffffffffff",
            |m, ops| {
                let target = jump_target(m, ops[0]);
                m.process_return_address(31);
                m.process_jump(target);
                Ok(())
            }),
        basic_def!("jalr $t1,$t2", "Jump and link register : Set $t1 to Program Counter (return address) then jump to statement whose address is in $t2", R,
            "000000 sssss 00000 fffff 00000 001001",
            |m, ops| {
                let target = m.gpr(ops[1]) as u32;
                m.process_return_address(ops[0]);
                m.process_jump(target);
                Ok(())
            }),
        basic_def!("jalr $t1", "Jump and link register : Set $ra to Program Counter (return address) then jump to statement whose address is in $t1", R,
            "000000 fffff 00000 11111 00000 001001",
            |m, ops| {
                let target = m.gpr(ops[0]) as u32;
                m.process_return_address(31);
                m.process_jump(target);
                Ok(())
            }),
        basic_def!("lb $t1,-100($t2)", "Load byte : Set $t1 to sign-extended 8-bit value from effective memory byte address", I,
            "100000 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_byte(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value as i8 as i32);
                Ok(())
            }),
        basic_def!("lh $t1,-100($t2)", "Load halfword : Set $t1 to sign-extended 16-bit value from effective memory halfword address", I,
            "100001 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_half(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value as i16 as i32);
                Ok(())
            }),
        basic_def!("lhu $t1,-100($t2)", "Load halfword unsigned : Set $t1 to zero-extended 16-bit value from effective memory halfword address", I,
            "100101 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_half(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value);
                Ok(())
            }),
        basic_def!("lbu $t1,-100($t2)", "Load byte unsigned : Set $t1 to zero-extended 8-bit value from effective memory byte address", I,
            "100100 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_byte(address(m, ops[2], ops[1]))?;
                m.set_gpr(ops[0], value);
                Ok(())
            }),
        basic_def!("sb $t1,-100($t2)", "Store byte : Store the low-order 8 bits of $t1 into the effective memory byte address", I,
            "101000 ttttt fffff ssssssssssssssss",
            |m, ops| {
                m.memory.set_byte(address(m, ops[2], ops[1]), m.gpr(ops[0]) & 0xFF)?;
                Ok(())
            }),
        basic_def!("sh $t1,-100($t2)", "Store halfword : Store the low-order 16 bits of $t1 into the effective memory halfword address", I,
            "101001 ttttt fffff ssssssssssssssss",
            |m, ops| {
                m.memory.set_half(address(m, ops[2], ops[1]), m.gpr(ops[0]) & 0xFFFF)?;
                Ok(())
            }),
        basic_def!("clo $t1,$t2", "Count number of leading ones : Set $t1 to the count of leading one bits in $t2 starting at most significant bit position", R,
            "011100 sssss 00000 fffff 00000 100001",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) as u32).leading_ones() as i32);
                Ok(())
            }),
        basic_def!("clz $t1,$t2", "Count number of leading zeroes : Set $t1 to the count of leading zero bits in $t2 starting at most significant bit positio", R,
            "011100 sssss 00000 fffff 00000 100000",
            |m, ops| {
                m.set_gpr(ops[0], (m.gpr(ops[1]) as u32).leading_zeros() as i32);
                Ok(())
            }),
        basic_def!("mfc0 $t1,$8", "Move from Coprocessor 0 : Set $t1 to the value stored in Coprocessor 0 register $8", R,
            "010000 00000 fffff sssss 00000 000000",
            |m, ops| {
                m.set_gpr(ops[0], m.cop0.get(ops[1] as usize));
                Ok(())
            }),
        basic_def!("mtc0 $t1,$8", "Move to Coprocessor 0 : Set Coprocessor 0 register $8 to value stored in $t1", R,
            "010000 00100 fffff sssss 00000 000000",
            |m, ops| {
                m.cop0.set(ops[1] as usize, m.gpr(ops[0]));
                Ok(())
            }),
        basic_def!("teq $t1,$t2", "Trap if equal : Trap if $t1 is equal to $t2", R,
            "000000 fffff sssss 00000 00000 110100",
            |m, ops| trap_if(m.gpr(ops[0]) == m.gpr(ops[1]))),
        basic_def!("teqi $t1,-100", "Trap if equal to immediate : Trap if $t1 is equal to sign-extended 16 bit immediate", I,
            "000001 fffff 01100 ssssssssssssssss",
            |m, ops| trap_if(m.gpr(ops[0]) == simm(ops[1]))),
        basic_def!("tne $t1,$t2", "Trap if not equal : Trap if $t1 is not equal to $t2", R,
            "000000 fffff sssss 00000 00000 110110",
            |m, ops| trap_if(m.gpr(ops[0]) != m.gpr(ops[1]))),
        basic_def!("tnei $t1,-100", "Trap if not equal to immediate : Trap if $t1 is not equal to sign-extended 16 bit immediate", I,
            "000001 fffff 01110 ssssssssssssssss",
            |m, ops| trap_if(m.gpr(ops[0]) != simm(ops[1]))),
        basic_def!("tge $t1,$t2", "Trap if greater or equal : Trap if $t1 is greater than or equal to $t2", R,
            "000000 fffff sssss 00000 00000 110000",
            |m, ops| trap_if(m.gpr(ops[0]) >= m.gpr(ops[1]))),
        basic_def!("tgeu $t1,$t2", "Trap if greater or equal unsigned : Trap if $t1 is greater than or equal to $t2 using unsigned comparision", R,
            "000000 fffff sssss 00000 00000 110001",
            |m, ops| trap_if(m.gpr(ops[0]) as u32 >= m.gpr(ops[1]) as u32)),
        basic_def!("tgei $t1,-100", "Trap if greater than or equal to immediate : Trap if $t1 greater than or equal to sign-extended 16 bit immediate", I,
            "000001 fffff 01000 ssssssssssssssss",
            |m, ops| trap_if(m.gpr(ops[0]) >= simm(ops[1]))),
        basic_def!("tgeiu $t1,-100", "Trap if greater or equal to immediate unsigned : Trap if $t1 greater than or equal to sign-extended 16 bit immediate, unsigned comparison", I,
            "000001 fffff 01001 ssssssssssssssss",
            |m, ops| trap_if(m.gpr(ops[0]) as u32 >= simm(ops[1]) as u32)),
        basic_def!("tlt $t1,$t2", "Trap if less than: Trap if $t1 less than $t2", R,
            "000000 fffff sssss 00000 00000 110010",
            |m, ops| trap_if(m.gpr(ops[0]) < m.gpr(ops[1]))),
        basic_def!("tltu $t1,$t2", "Trap if less than unsigned : Trap if $t1 less than $t2, unsigned comparison", R,
            "000000 fffff sssss 00000 00000 110011",
            |m, ops| trap_if((m.gpr(ops[0]) as u32) < (m.gpr(ops[1]) as u32))),
        basic_def!("tlti $t1,-100", "Trap if less than immediate : Trap if $t1 less than sign-extended 16-bit immediate", I,
            "000001 fffff 01010 ssssssssssssssss",
            |m, ops| trap_if(m.gpr(ops[0]) < simm(ops[1]))),
        basic_def!("tltiu $t1,-100", "Trap if less than immediate unsigned : Trap if $t1 less than sign-extended 16-bit immediate, unsigned comparison", I,
            "000001 fffff 01011 ssssssssssssssss",
            |m, ops| trap_if((m.gpr(ops[0]) as u32) < (simm(ops[1]) as u32))),
        basic_def!("eret", "Exception return : Set Program Counter to Coprocessor 0 EPC register value, set Coprocessor Status register bit 1 (exception level) to zero", R,
            "010000 1 0000000000000000000 011000",
            |m, _| {
                m.eret();
                Ok(())
            }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, MemoryConfiguration};

    fn run(example: &str, m: &mut Machine, ops: &[i32]) -> Result<(), SimError> {
        let def = catalog().into_iter().find(|d| d.example == example).unwrap();
        (def.action)(m, ops)
    }

    fn machine() -> Machine {
        Machine::new(Memory::new(MemoryConfiguration::default()))
    }

    macro_rules! alu_cases {
        ($($name:ident: $example:expr, $a:expr, $b:expr => $expect:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let mut m = machine();
                    m.set_gpr(10, $a);
                    m.set_gpr(11, $b);
                    run($example, &mut m, &[9, 10, 11]).unwrap();
                    assert_eq!(m.gpr(9), $expect);
                }
            )*
        }
    }

    alu_cases! {
        add: "add $t1,$t2,$t3", 2, 3 => 5,
        addu_wraps: "addu $t1,$t2,$t3", i32::MAX, 1 => i32::MIN,
        subu: "subu $t1,$t2,$t3", 2, 3 => -1,
        and: "and $t1,$t2,$t3", 0b1100, 0b1010 => 0b1000,
        nor: "nor $t1,$t2,$t3", 0, 0 => -1,
        slt: "slt $t1,$t2,$t3", -1, 0 => 1,
        sltu: "sltu $t1,$t2,$t3", -1, 0 => 0,
        sllv: "sllv $t1,$t2,$t3", 1, 33 => 2,
        srav: "srav $t1,$t2,$t3", -8, 1 => -4,
        srlv: "srlv $t1,$t2,$t3", -8, 28 => 0xF,
        mul: "mul $t1,$t2,$t3", -3, 4 => -12,
        movz: "movz $t1,$t2,$t3", 7, 0 => 7,
    }

    #[test]
    fn add_overflow() {
        let mut m = machine();
        m.set_gpr(10, i32::MAX);
        m.set_gpr(11, 1);
        assert_eq!(run("add $t1,$t2,$t3", &mut m, &[9, 10, 11]), Err(SimError::Overflow));
        assert_eq!(run("addi $t1,$t2,-100", &mut m, &[9, 10, 1]), Err(SimError::Overflow));
    }

    #[test]
    fn immediates_extend() {
        let mut m = machine();
        run("addiu $t1,$t2,-100", &mut m, &[9, 0, 0xFF9C]).unwrap();
        assert_eq!(m.gpr(9), -100);
        run("ori $t1,$t2,100", &mut m, &[9, 0, 0xFF9C]).unwrap();
        assert_eq!(m.gpr(9), 0xFF9C);
        run("lui $t1,100", &mut m, &[9, 0x1001]).unwrap();
        assert_eq!(m.gpr(9), 0x1001_0000);
        run("sltiu $t1,$t2,-100", &mut m, &[9, 0, 0xFFFF]).unwrap();
        assert_eq!(m.gpr(9), 1);
    }

    #[test]
    fn mult_and_div() {
        let mut m = machine();
        m.set_gpr(8, -2);
        m.set_gpr(9, 3);
        run("mult $t1,$t2", &mut m, &[8, 9]).unwrap();
        assert_eq!((m.regs.hi(), m.regs.lo()), (-1, -6));
        run("multu $t1,$t2", &mut m, &[8, 9]).unwrap();
        assert_eq!((m.regs.hi(), m.regs.lo()), (2, -6));
        m.set_gpr(8, 7);
        run("div $t1,$t2", &mut m, &[8, 9]).unwrap();
        assert_eq!((m.regs.hi(), m.regs.lo()), (1, 2));
        m.set_gpr(9, 0);
        run("div $t1,$t2", &mut m, &[8, 9]).unwrap();
        assert_eq!((m.regs.hi(), m.regs.lo()), (1, 2));
    }

    #[test]
    fn loads_and_stores() {
        let mut m = machine();
        m.set_gpr(10, 0x1001_0000);
        m.set_gpr(9, -2);
        run("sw $t1,-100($t2)", &mut m, &[9, 4, 10]).unwrap();
        run("lb $t1,-100($t2)", &mut m, &[8, 4, 10]).unwrap();
        assert_eq!(m.gpr(8), -2);
        run("lbu $t1,-100($t2)", &mut m, &[8, 4, 10]).unwrap();
        assert_eq!(m.gpr(8), 0xFE);
        run("lhu $t1,-100($t2)", &mut m, &[8, 4, 10]).unwrap();
        assert_eq!(m.gpr(8), 0xFFFE);
        assert_eq!(
            run("lw $t1,-100($t2)", &mut m, &[8, 2, 10]),
            Err(SimError::AddressLoad(0x1001_0002))
        );
    }

    #[test]
    fn unaligned_word_pairs() {
        let mut m = machine();
        m.set_gpr(10, 0x1001_0000);
        m.memory.set_word(0x1001_0000, 0x4433_2211).unwrap();
        m.memory.set_word(0x1001_0004, 0x8877_6655u32 as i32).unwrap();
        // lwr then lwl assemble the word starting at byte 1.
        m.set_gpr(8, 0);
        run("lwr $t1,-100($t2)", &mut m, &[8, 1, 10]).unwrap();
        run("lwl $t1,-100($t2)", &mut m, &[8, 4, 10]).unwrap();
        assert_eq!(m.gpr(8) as u32, 0x5544_3322);
    }

    #[test]
    fn branches_and_links() {
        let mut m = machine();
        m.regs.set_pc(0x0040_0008);
        run("beq $t1,$t2,label", &mut m, &[0, 0, 0xFFFE]).unwrap();
        assert_eq!(m.regs.pc(), 0x0040_0000);
        run("jal target", &mut m, &[0x0010_0010]).unwrap();
        assert_eq!(m.regs.pc(), 0x0040_0040);
        assert_eq!(m.gpr(31), 0x0040_0000);
    }

    #[test]
    fn traps_and_breaks() {
        let mut m = machine();
        assert_eq!(run("teq $t1,$t2", &mut m, &[0, 0]), Err(SimError::Trap));
        assert_eq!(run("tne $t1,$t2", &mut m, &[0, 0]), Ok(()));
        assert_eq!(run("break 100", &mut m, &[100]), Err(SimError::Break(100)));
    }
}
