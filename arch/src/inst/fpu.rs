//! Coprocessor 1 (floating point) instructions.

use super::{basic_def, BasicDef};
use crate::error::SimError;
use crate::machine::Machine;

fn reg(op: i32) -> usize {
    op as usize
}

fn single3(m: &mut Machine, ops: &[i32], f: fn(f32, f32) -> f32) -> Result<(), SimError> {
    let value = f(m.cop1.get_float(reg(ops[1])), m.cop1.get_float(reg(ops[2])));
    m.cop1.set_float(reg(ops[0]), value);
    Ok(())
}

fn double3(m: &mut Machine, ops: &[i32], f: fn(f64, f64) -> f64) -> Result<(), SimError> {
    let value = f(m.cop1.get_double(reg(ops[1]))?, m.cop1.get_double(reg(ops[2]))?);
    m.cop1.set_double(reg(ops[0]), value)
}

fn single2(m: &mut Machine, ops: &[i32], f: fn(f32) -> f32) -> Result<(), SimError> {
    let value = f(m.cop1.get_float(reg(ops[1])));
    m.cop1.set_float(reg(ops[0]), value);
    Ok(())
}

fn double2(m: &mut Machine, ops: &[i32], f: fn(f64) -> f64) -> Result<(), SimError> {
    let value = f(m.cop1.get_double(reg(ops[1]))?);
    m.cop1.set_double(reg(ops[0]), value)
}

/// Converts to a word; NaN, infinities and out-of-range values give
/// `i32::MAX`.
fn to_word(value: f64, round: fn(f64) -> f64) -> i32 {
    if value.is_nan() || value.is_infinite() || value < i32::MIN as f64 || value > i32::MAX as f64 {
        i32::MAX
    } else {
        round(value) as i32
    }
}

fn single_to_word(m: &mut Machine, ops: &[i32], round: fn(f64) -> f64) -> Result<(), SimError> {
    let value = to_word(m.cop1.get_float(reg(ops[1])) as f64, round);
    m.cop1.set_bits(reg(ops[0]), value);
    Ok(())
}

fn double_to_word(m: &mut Machine, ops: &[i32], round: fn(f64) -> f64) -> Result<(), SimError> {
    let value = to_word(m.cop1.get_double(reg(ops[1]))?, round);
    m.cop1.set_bits(reg(ops[0]), value);
    Ok(())
}

fn compare_single(m: &mut Machine, cc: i32, a: i32, b: i32, f: fn(f32, f32) -> bool) -> Result<(), SimError> {
    let result = f(m.cop1.get_float(reg(a)), m.cop1.get_float(reg(b)));
    m.cop1.set_flag(cc as usize, result);
    Ok(())
}

fn compare_double(m: &mut Machine, cc: i32, a: i32, b: i32, f: fn(f64, f64) -> bool) -> Result<(), SimError> {
    let result = f(m.cop1.get_double(reg(a))?, m.cop1.get_double(reg(b))?);
    m.cop1.set_flag(cc as usize, result);
    Ok(())
}

fn branch_if(m: &mut Machine, cond: bool, displacement: i32) -> Result<(), SimError> {
    if cond {
        m.process_branch(displacement as i16 as i32);
    }
    Ok(())
}

fn move_single_if(m: &mut Machine, ops: &[i32], cond: bool) -> Result<(), SimError> {
    if cond {
        m.cop1.set_bits(reg(ops[0]), m.cop1.get_bits(reg(ops[1])));
    }
    Ok(())
}

fn move_double_if(m: &mut Machine, ops: &[i32], cond: bool) -> Result<(), SimError> {
    let value = m.cop1.get_double(reg(ops[1]))?;
    // Both operands are checked even when nothing moves.
    let current = m.cop1.get_double(reg(ops[0]))?;
    m.cop1.set_double(reg(ops[0]), if cond { value } else { current })
}

fn effective_address(m: &Machine, ops: &[i32]) -> u32 {
    m.gpr(ops[2]).wrapping_add(ops[1] as i16 as i32) as u32
}

fn even(n: i32) -> Result<usize, SimError> {
    if n % 2 != 0 {
        return Err(SimError::InvalidRegister(format!(
            "$f{n}: double precision operands must be even-numbered registers"
        )));
    }
    Ok(n as usize)
}

pub(crate) fn catalog() -> Vec<BasicDef> {
    vec![
        basic_def!("add.s $f0,$f1,$f3", "Floating point addition single precision : Set $f0 to single-precision floating point value of $f1 plus $f3", R,
            "010001 10000 ttttt sssss fffff 000000",
            |m, ops| single3(m, ops, |a, b| a + b)),
        basic_def!("sub.s $f0,$f1,$f3", "Floating point subtraction single precision : Set $f0 to single-precision floating point value of $f1  minus $f3", R,
            "010001 10000 ttttt sssss fffff 000001",
            |m, ops| single3(m, ops, |a, b| a - b)),
        basic_def!("mul.s $f0,$f1,$f3", "Floating point multiplication single precision : Set $f0 to single-precision floating point value of $f1 times $f3", R,
            "010001 10000 ttttt sssss fffff 000010",
            |m, ops| single3(m, ops, |a, b| a * b)),
        basic_def!("div.s $f0,$f1,$f3", "Floating point division single precision : Set $f0 to single-precision floating point value of $f1 divided by $f3", R,
            "010001 10000 ttttt sssss fffff 000011",
            |m, ops| single3(m, ops, |a, b| a / b)),
        basic_def!("sqrt.s $f0,$f1", "Square root single precision : Set $f0 to single-precision floating point square root of $f1", R,
            "010001 10000 00000 sssss fffff 000100",
            |m, ops| single2(m, ops, f32::sqrt)),
        basic_def!("floor.w.s $f0,$f1", "Floor single precision to word : Set $f0 to 32-bit integer floor of single-precision float in $f1", R,
            "010001 10000 00000 sssss fffff 001111",
            |m, ops| single_to_word(m, ops, f64::floor)),
        basic_def!("ceil.w.s $f0,$f1", "Ceiling single precision to word : Set $f0 to 32-bit integer ceiling of single-precision float in $f1", R,
            "010001 10000 00000 sssss fffff 001110",
            |m, ops| single_to_word(m, ops, f64::ceil)),
        basic_def!("round.w.s $f0,$f1", "Round single precision to word : Set $f0 to 32-bit integer round of single-precision float in $f1", R,
            "010001 10000 00000 sssss fffff 001100",
            |m, ops| single_to_word(m, ops, f64::round_ties_even)),
        basic_def!("trunc.w.s $f0,$f1", "Truncate single precision to word : Set $f0 to 32-bit integer truncation of single-precision float in $f1", R,
            "010001 10000 00000 sssss fffff 001101",
            |m, ops| single_to_word(m, ops, f64::trunc)),
        basic_def!("add.d $f2,$f4,$f6", "Floating point addition double precision : Set $f2 to double-precision floating point value of $f4 plus $f6", R,
            "010001 10001 ttttt sssss fffff 000000",
            |m, ops| double3(m, ops, |a, b| a + b)),
        basic_def!("sub.d $f2,$f4,$f6", "Floating point subtraction double precision : Set $f2 to double-precision floating point value of $f4 minus $f6", R,
            "010001 10001 ttttt sssss fffff 000001",
            |m, ops| double3(m, ops, |a, b| a - b)),
        basic_def!("mul.d $f2,$f4,$f6", "Floating point multiplication double precision : Set $f2 to double-precision floating point value of $f4 times $f6", R,
            "010001 10001 ttttt sssss fffff 000010",
            |m, ops| double3(m, ops, |a, b| a * b)),
        basic_def!("div.d $f2,$f4,$f6", "Floating point division double precision : Set $f2 to double-precision floating point value of $f4 divided by $f6", R,
            "010001 10001 ttttt sssss fffff 000011",
            |m, ops| double3(m, ops, |a, b| a / b)),
        basic_def!("sqrt.d $f2,$f4", "Square root double precision : Set $f2 to double-precision floating point square root of $f4", R,
            "010001 10001 00000 sssss fffff 000100",
            |m, ops| double2(m, ops, f64::sqrt)),
        basic_def!("floor.w.d $f1,$f2", "Floor double precision to word : Set $f1 to 32-bit integer floor of double-precision float in $f2", R,
            "010001 10001 00000 sssss fffff 001111",
            |m, ops| double_to_word(m, ops, f64::floor)),
        basic_def!("ceil.w.d $f1,$f2", "Ceiling double precision to word : Set $f1 to 32-bit integer ceiling of double-precision float in $f2", R,
            "010001 10001 00000 sssss fffff 001110",
            |m, ops| double_to_word(m, ops, f64::ceil)),
        basic_def!("round.w.d $f1,$f2", "Round double precision to word : Set $f1 to 32-bit integer round of double-precision float in $f2", R,
            "010001 10001 00000 sssss fffff 001100",
            |m, ops| double_to_word(m, ops, f64::round_ties_even)),
        basic_def!("trunc.w.d $f1,$f2", "Truncate double precision to word : Set $f1 to 32-bit integer truncation of double-precision float in $f2", R,
            "010001 10001 00000 sssss fffff 001101",
            |m, ops| double_to_word(m, ops, f64::trunc)),
        basic_def!("bc1t label", "Branch if FP condition flag 0 true (BC1T, not BCLT) : If Coprocessor 1 condition flag 0 is true (one) then branch to statement at label's address", IBranch,
            "010001 01000 00001 ffffffffffffffff",
            |m, ops| {
                let cond = m.cop1.flag(0);
                branch_if(m, cond, ops[0])
            }),
        basic_def!("bc1t 1,label", "Branch if specified FP condition flag true (BC1T, not BCLT) : If Coprocessor 1 condition flag specified by immediate is true (one) then branch to statement at label's address", IBranch,
            "010001 01000 fff 01 ssssssssssssssss",
            |m, ops| {
                let cond = m.cop1.flag(ops[0] as usize);
                branch_if(m, cond, ops[1])
            }),
        basic_def!("bc1f label", "Branch if FP condition flag 0 false (BC1F, not BCLF) : If Coprocessor 1 condition flag 0 is false (zero) then branch to statement at label's address", IBranch,
            "010001 01000 00000 ffffffffffffffff",
            |m, ops| {
                let cond = !m.cop1.flag(0);
                branch_if(m, cond, ops[0])
            }),
        basic_def!("bc1f 1,label", "Branch if specified FP condition flag false (BC1F, not BCLF) : If Coprocessor 1 condition flag specified by immediate is false (zero) then branch to statement at label's address", IBranch,
            "010001 01000 fff 00 ssssssssssssssss",
            |m, ops| {
                let cond = !m.cop1.flag(ops[0] as usize);
                branch_if(m, cond, ops[1])
            }),
        basic_def!("c.eq.s $f0,$f1", "Compare equal single precision : If $f0 is equal to $f1, set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10000 sssss fffff 00000 110010",
            |m, ops| compare_single(m, 0, ops[0], ops[1], |a, b| a == b)),
        basic_def!("c.eq.s 1,$f0,$f1", "Compare equal single precision : If $f0 is equal to $f1, set Coprocessor 1 condition flag specied by immediate to true else set it to false", R,
            "010001 10000 ttttt sssss fff 00 110010",
            |m, ops| compare_single(m, ops[0], ops[1], ops[2], |a, b| a == b)),
        basic_def!("c.le.s $f0,$f1", "Compare less or equal single precision : If $f0 is less than or equal to $f1, set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10000 sssss fffff 00000 111110",
            |m, ops| compare_single(m, 0, ops[0], ops[1], |a, b| a <= b)),
        basic_def!("c.le.s 1,$f0,$f1", "Compare less or equal single precision : If $f0 is less than or equal to $f1, set Coprocessor 1 condition flag specified by immediate to true else set it to false", R,
            "010001 10000 ttttt sssss fff 00 111110",
            |m, ops| compare_single(m, ops[0], ops[1], ops[2], |a, b| a <= b)),
        basic_def!("c.lt.s $f0,$f1", "Compare less than single precision : If $f0 is less than $f1, set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10000 sssss fffff 00000 111100",
            |m, ops| compare_single(m, 0, ops[0], ops[1], |a, b| a < b)),
        basic_def!("c.lt.s 1,$f0,$f1", "Compare less than single precision : If $f0 is less than $f1, set Coprocessor 1 condition flag specified by immediate to true else set it to false", R,
            "010001 10000 ttttt sssss fff 00 111100",
            |m, ops| compare_single(m, ops[0], ops[1], ops[2], |a, b| a < b)),
        basic_def!("c.eq.d $f2,$f4", "Compare equal double precision : If $f2 is equal to $f4 (double-precision), set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10001 sssss fffff 00000 110010",
            |m, ops| compare_double(m, 0, ops[0], ops[1], |a, b| a == b)),
        basic_def!("c.eq.d 1,$f2,$f4", "Compare equal double precision : If $f2 is equal to $f4 (double-precision), set Coprocessor 1 condition flag specified by immediate to true else set it to false", R,
            "010001 10001 ttttt sssss fff 00 110010",
            |m, ops| compare_double(m, ops[0], ops[1], ops[2], |a, b| a == b)),
        basic_def!("c.le.d $f2,$f4", "Compare less or equal double precision : If $f2 is less than or equal to $f4 (double-precision), set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10001 sssss fffff 00000 111110",
            |m, ops| compare_double(m, 0, ops[0], ops[1], |a, b| a <= b)),
        basic_def!("c.le.d 1,$f2,$f4", "Compare less or equal double precision : If $f2 is less than or equal to $f4 (double-precision), set Coprocessor 1 condition flag specfied by immediate true else set it false", R,
            "010001 10001 ttttt sssss fff 00 111110",
            |m, ops| compare_double(m, ops[0], ops[1], ops[2], |a, b| a <= b)),
        basic_def!("c.lt.d $f2,$f4", "Compare less than double precision : If $f2 is less than $f4 (double-precision), set Coprocessor 1 condition flag 0 true else set it false", R,
            "010001 10001 sssss fffff 00000 111100",
            |m, ops| compare_double(m, 0, ops[0], ops[1], |a, b| a < b)),
        basic_def!("c.lt.d 1,$f2,$f4", "Compare less than double precision : If $f2 is less than $f4 (double-precision), set Coprocessor 1 condition flag specified by immediate to true else set it to false", R,
            "010001 10001 ttttt sssss fff 00 111100",
            |m, ops| compare_double(m, ops[0], ops[1], ops[2], |a, b| a < b)),
        basic_def!("abs.s $f0,$f1", "Floating point absolute value single precision : Set $f0 to absolute value of $f1, single precision", R,
            "010001 10000 00000 sssss fffff 000101",
            |m, ops| {
                // Clears the sign bit, so NaN payloads survive.
                m.cop1.set_bits(reg(ops[0]), m.cop1.get_bits(reg(ops[1])) & i32::MAX);
                Ok(())
            }),
        basic_def!("abs.d $f2,$f4", "Floating point absolute value double precision : Set $f2 to absolute value of $f4, double precision", R,
            "010001 10001 00000 sssss fffff 000101",
            |m, ops| double2(m, ops, f64::abs)),
        basic_def!("cvt.d.s $f2,$f1", "Convert from single precision to double precision : Set $f2 to double precision equivalent of single precision value in $f1", R,
            "010001 10000 00000 sssss fffff 100001",
            |m, ops| {
                let value = m.cop1.get_float(reg(ops[1])) as f64;
                m.cop1.set_double(reg(ops[0]), value)
            }),
        basic_def!("cvt.d.w $f2,$f1", "Convert from word to double precision : Set $f2 to double precision equivalent of 32-bit integer value in $f1", R,
            "010001 10100 00000 sssss fffff 100001",
            |m, ops| {
                let value = m.cop1.get_bits(reg(ops[1])) as f64;
                m.cop1.set_double(reg(ops[0]), value)
            }),
        basic_def!("cvt.s.d $f1,$f2", "Convert from double precision to single precision : Set $f1 to single precision equivalent of double precision value in $f2", R,
            "010001 10001 00000 sssss fffff 100000",
            |m, ops| {
                let value = m.cop1.get_double(reg(ops[1]))? as f32;
                m.cop1.set_float(reg(ops[0]), value);
                Ok(())
            }),
        basic_def!("cvt.s.w $f0,$f1", "Convert from word to single precision : Set $f0 to single precision equivalent of 32-bit integer value in $f2", R,
            "010001 10100 00000 sssss fffff 100000",
            |m, ops| {
                let value = m.cop1.get_bits(reg(ops[1])) as f32;
                m.cop1.set_float(reg(ops[0]), value);
                Ok(())
            }),
        basic_def!("cvt.w.d $f1,$f2", "Convert from double precision to word : Set $f1 to 32-bit integer equivalent of double precision value in $f2", R,
            "010001 10001 00000 sssss fffff 100100",
            |m, ops| double_to_word(m, ops, f64::trunc)),
        basic_def!("cvt.w.s $f0,$f1", "Convert from single precision to word : Set $f0 to 32-bit integer equivalent of single precision value in $f1", R,
            "010001 10000 00000 sssss fffff 100100",
            |m, ops| single_to_word(m, ops, f64::trunc)),
        basic_def!("mov.d $f2,$f4", "Move floating point double precision : Set double precision $f2 to double precision value in $f4", R,
            "010001 10001 00000 sssss fffff 000110",
            |m, ops| move_double_if(m, ops, true)),
        basic_def!("movf.d $f2,$f4", "Move floating point double precision : If condition flag 0 false, set double precision $f2 to double precision value in $f4", R,
            "010001 10001 000 00 sssss fffff 010001",
            |m, ops| {
                let cond = !m.cop1.flag(0);
                move_double_if(m, ops, cond)
            }),
        basic_def!("movf.d $f2,$f4,1", "Move floating point double precision : If condition flag specified by immediate is false, set double precision $f2 to double precision value in $f4", R,
            "010001 10001 ttt 00 sssss fffff 010001",
            |m, ops| {
                let cond = !m.cop1.flag(ops[2] as usize);
                move_double_if(m, ops, cond)
            }),
        basic_def!("movt.d $f2,$f4", "Move floating point double precision : If condition flag 0 true, set double precision $f2 to double precision value in $f4", R,
            "010001 10001 000 01 sssss fffff 010001",
            |m, ops| {
                let cond = m.cop1.flag(0);
                move_double_if(m, ops, cond)
            }),
        basic_def!("movt.d $f2,$f4,1", "Move floating point double precision : If condition flag specified by immediate is true, set double precision $f2 to double precision value in $f4e", R,
            "010001 10001 ttt 01 sssss fffff 010001",
            |m, ops| {
                let cond = m.cop1.flag(ops[2] as usize);
                move_double_if(m, ops, cond)
            }),
        basic_def!("movn.d $f2,$f4,$t3", "Move floating point double precision : If $t3 is not zero, set double precision $f2 to double precision value in $f4", R,
            "010001 10001 ttttt sssss fffff 010011",
            |m, ops| {
                let cond = m.gpr(ops[2]) != 0;
                move_double_if(m, ops, cond)
            }),
        basic_def!("movz.d $f2,$f4,$t3", "Move floating point double precision : If $t3 is zero, set double precision $f2 to double precision value in $f4", R,
            "010001 10001 ttttt sssss fffff 010010",
            |m, ops| {
                let cond = m.gpr(ops[2]) == 0;
                move_double_if(m, ops, cond)
            }),
        basic_def!("mov.s $f0,$f1", "Move floating point single precision : Set single precision $f0 to single precision value in $f1", R,
            "010001 10000 00000 sssss fffff 000110",
            |m, ops| move_single_if(m, ops, true)),
        basic_def!("movf.s $f0,$f1", "Move floating point single precision : If condition flag 0 is false, set single precision $f0 to single precision value in $f1", R,
            "010001 10000 000 00 sssss fffff 010001",
            |m, ops| {
                let cond = !m.cop1.flag(0);
                move_single_if(m, ops, cond)
            }),
        basic_def!("movf.s $f0,$f1,1", "Move floating point single precision : If condition flag specified by immediate is false, set single precision $f0 to single precision value in $f1e", R,
            "010001 10000 ttt 00 sssss fffff 010001",
            |m, ops| {
                let cond = !m.cop1.flag(ops[2] as usize);
                move_single_if(m, ops, cond)
            }),
        basic_def!("movt.s $f0,$f1", "Move floating point single precision : If condition flag 0 is true, set single precision $f0 to single precision value in $f1e", R,
            "010001 10000 000 01 sssss fffff 010001",
            |m, ops| {
                let cond = m.cop1.flag(0);
                move_single_if(m, ops, cond)
            }),
        basic_def!("movt.s $f0,$f1,1", "Move floating point single precision : If condition flag specified by immediate is true, set single precision $f0 to single precision value in $f1e", R,
            "010001 10000 ttt 01 sssss fffff 010001",
            |m, ops| {
                let cond = m.cop1.flag(ops[2] as usize);
                move_single_if(m, ops, cond)
            }),
        basic_def!("movn.s $f0,$f1,$t3", "Move floating point single precision : If $t3 is not zero, set single precision $f0 to single precision value in $f1", R,
            "010001 10000 ttttt sssss fffff 010011",
            |m, ops| {
                let cond = m.gpr(ops[2]) != 0;
                move_single_if(m, ops, cond)
            }),
        basic_def!("movz.s $f0,$f1,$t3", "Move floating point single precision : If $t3 is zero, set single precision $f0 to single precision value in $f1", R,
            "010001 10000 ttttt sssss fffff 010010",
            |m, ops| {
                let cond = m.gpr(ops[2]) == 0;
                move_single_if(m, ops, cond)
            }),
        basic_def!("mfc1 $t1,$f1", "Move from Coprocessor 1 (FPU) : Set $t1 to value in Coprocessor 1 register $f1", R,
            "010001 00000 fffff sssss 00000 000000",
            |m, ops| {
                m.set_gpr(ops[0], m.cop1.get_bits(reg(ops[1])));
                Ok(())
            }),
        basic_def!("mtc1 $t1,$f1", "Move to Coprocessor 1 (FPU) : Set Coprocessor 1 register $f1 to value in $t1", R,
            "010001 00100 fffff sssss 00000 000000",
            |m, ops| {
                m.cop1.set_bits(reg(ops[1]), m.gpr(ops[0]));
                Ok(())
            }),
        basic_def!("neg.d $f2,$f4", "Floating point negate double precision : Set double precision $f2 to negation of double precision value in $f4", R,
            "010001 10001 00000 sssss fffff 000111",
            |m, ops| double2(m, ops, |a| -a)),
        basic_def!("neg.s $f0,$f1", "Floating point negate single precision : Set single precision $f0 to negation of single precision value in $f1", R,
            "010001 10000 00000 sssss fffff 000111",
            |m, ops| {
                m.cop1.set_bits(reg(ops[0]), m.cop1.get_bits(reg(ops[1])) ^ i32::MIN);
                Ok(())
            }),
        basic_def!("lwc1 $f1,-100($t2)", "Load word into Coprocessor 1 (FPU) : Set $f1 to 32-bit value from effective memory word address", I,
            "110001 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let value = m.memory.get_word(effective_address(m, ops))?;
                m.cop1.set_bits(reg(ops[0]), value);
                Ok(())
            }),
        basic_def!("ldc1 $f2,-100($t2)", "Load double word Coprocessor 1 (FPU)) : Set $f2 to 64-bit value from effective memory doubleword address", I,
            "110101 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let n = even(ops[0])?;
                let addr = effective_address(m, ops);
                let low = m.memory.get_word(addr)?;
                let high = m.memory.get_word(addr.wrapping_add(4))?;
                m.cop1.set_bits(n, low);
                m.cop1.set_bits(n + 1, high);
                Ok(())
            }),
        basic_def!("swc1 $f1,-100($t2)", "Store word from Coprocesor 1 (FPU) : Store 32 bit value in $f1 to effective memory word address", I,
            "111001 ttttt fffff ssssssssssssssss",
            |m, ops| {
                m.memory.set_word(effective_address(m, ops), m.cop1.get_bits(reg(ops[0])))?;
                Ok(())
            }),
        basic_def!("sdc1 $f2,-100($t2)", "Store double word from Coprocessor 1 (FPU)) : Store 64 bit value in $f2 to effective memory doubleword address", I,
            "111101 ttttt fffff ssssssssssssssss",
            |m, ops| {
                let n = even(ops[0])?;
                let addr = effective_address(m, ops);
                m.memory.set_word(addr, m.cop1.get_bits(n))?;
                m.memory.set_word(addr.wrapping_add(4), m.cop1.get_bits(n + 1))?;
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

    #[test]
    fn single_arithmetic() {
        let mut m = machine();
        m.cop1.set_float(1, 1.5);
        m.cop1.set_float(3, 2.25);
        run("add.s $f0,$f1,$f3", &mut m, &[0, 1, 3]).unwrap();
        assert_eq!(m.cop1.get_float(0), 3.75);
        run("neg.s $f0,$f1", &mut m, &[0, 1]).unwrap();
        assert_eq!(m.cop1.get_float(0), -1.5);
    }

    #[test]
    fn double_needs_even_registers() {
        let mut m = machine();
        m.cop1.set_double(4, 2.0).unwrap();
        m.cop1.set_double(6, 0.5).unwrap();
        run("mul.d $f2,$f4,$f6", &mut m, &[2, 4, 6]).unwrap();
        assert_eq!(m.cop1.get_double(2).unwrap(), 1.0);
        assert!(matches!(
            run("add.d $f2,$f4,$f6", &mut m, &[3, 4, 6]),
            Err(SimError::InvalidRegister(_))
        ));
    }

    #[test]
    fn conversions() {
        let mut m = machine();
        m.cop1.set_float(1, 2.5);
        run("round.w.s $f0,$f1", &mut m, &[0, 1]).unwrap();
        assert_eq!(m.cop1.get_bits(0), 2);
        m.cop1.set_float(1, -2.5);
        run("floor.w.s $f0,$f1", &mut m, &[0, 1]).unwrap();
        assert_eq!(m.cop1.get_bits(0), -3);
        m.cop1.set_float(1, f32::NAN);
        run("trunc.w.s $f0,$f1", &mut m, &[0, 1]).unwrap();
        assert_eq!(m.cop1.get_bits(0), i32::MAX);
        m.cop1.set_bits(1, 7);
        run("cvt.s.w $f0,$f1", &mut m, &[0, 1]).unwrap();
        assert_eq!(m.cop1.get_float(0), 7.0);
    }

    #[test]
    fn compare_sets_flag() {
        let mut m = machine();
        m.cop1.set_float(0, 1.0);
        m.cop1.set_float(1, 2.0);
        run("c.lt.s 1,$f0,$f1", &mut m, &[3, 0, 1]).unwrap();
        assert!(m.cop1.flag(3));
        assert!(!m.cop1.flag(0));
        m.regs.set_pc(0x0040_0004);
        run("bc1t 1,label", &mut m, &[3, 2]).unwrap();
        assert_eq!(m.regs.pc(), 0x0040_000C);
    }

    #[test]
    fn double_memory_word_order() {
        let mut m = machine();
        m.set_gpr(10, 0x1001_0000);
        m.cop1.set_double(2, 1.0).unwrap();
        run("sdc1 $f2,-100($t2)", &mut m, &[2, 0, 10]).unwrap();
        assert_eq!(m.memory.get_word(0x1001_0000).unwrap(), 0);
        assert_eq!(m.memory.get_word(0x1001_0004).unwrap(), 0x3FF0_0000);
        run("ldc1 $f2,-100($t2)", &mut m, &[4, 0, 10]).unwrap();
        assert_eq!(m.cop1.get_double(4).unwrap(), 1.0);
    }
}
