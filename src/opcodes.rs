use AddressMode::*;
use OpFamily::*;

/// One row of the 256-entry decode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub code: u8,
    pub family: OpFamily,
    pub mode: AddressMode,
    pub len: u8,
    pub cycles: u8,
    pub page_cycles: u8,
    pub mnemonic: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    // Official
    ADC,
    AND,
    ASL,
    BCC,
    BCS,
    BEQ,
    BIT,
    BMI,
    BNE,
    BPL,
    BRK,
    BVC,
    BVS,
    CLC,
    CLD,
    CLI,
    CLV,
    CMP,
    CPX,
    CPY,
    DEC,
    DEX,
    DEY,
    EOR,
    INC,
    INX,
    INY,
    JMP,
    JSR,
    LDA,
    LDX,
    LDY,
    LSR,
    NOP,
    ORA,
    PHA,
    PHP,
    PLA,
    PLP,
    ROL,
    ROR,
    RTI,
    RTS,
    SBC,
    SEC,
    SED,
    SEI,
    STA,
    STX,
    STY,
    TAX,
    TAY,
    TSX,
    TXA,
    TXS,
    TYA,
    // Unofficial
    AHX,
    ALR,
    ANC,
    ARR,
    AXS,
    DCP,
    ISB,
    KIL,
    LAS,
    LAX,
    RLA,
    RRA,
    SAX,
    SHX,
    SHY,
    SLO,
    SRE,
    TAS,
    XAA,
}

/// Addressing modes. The `*W` variants are the write/RMW forms of the indexed
/// modes: they always perform the dummy read at the partially-carried address,
/// where the read forms only do so on a page cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ACC,
    IMP,
    IMM,
    ZP,
    ZPX,
    ZPY,
    REL,
    ABS,
    ABSX,
    ABSXW,
    ABSY,
    ABSYW,
    IND,
    INDX,
    INDY,
    INDYW,
}

macro_rules! op {
    ($code:expr, $family:ident, $mode:ident, $len:expr, $cycles:expr, +1, $mnemonic:expr) => {
        Op {
            code: $code,
            family: $family,
            mode: $mode,
            len: $len,
            cycles: $cycles,
            page_cycles: 1,
            mnemonic: $mnemonic,
        }
    };
    ($code:expr, $family:ident, $mode:ident, $len:expr, $cycles:expr, $mnemonic:expr) => {
        Op {
            code: $code,
            family: $family,
            mode: $mode,
            len: $len,
            cycles: $cycles,
            page_cycles: 0,
            mnemonic: $mnemonic,
        }
    };
}

pub const OPS: [Op; 256] = [
    op!(0x00, BRK, IMP, 1, 7, "BRK"),
    op!(0x01, ORA, INDX, 2, 6, "ORA"),
    op!(0x02, KIL, IMP, 1, 2, "*KIL"),
    op!(0x03, SLO, INDX, 2, 8, "*SLO"),
    op!(0x04, NOP, ZP, 2, 3, "*NOP"),
    op!(0x05, ORA, ZP, 2, 3, "ORA"),
    op!(0x06, ASL, ZP, 2, 5, "ASL"),
    op!(0x07, SLO, ZP, 2, 5, "*SLO"),
    op!(0x08, PHP, IMP, 1, 3, "PHP"),
    op!(0x09, ORA, IMM, 2, 2, "ORA"),
    op!(0x0A, ASL, ACC, 1, 2, "ASL"),
    op!(0x0B, ANC, IMM, 2, 2, "*ANC"),
    op!(0x0C, NOP, ABS, 3, 4, "*NOP"),
    op!(0x0D, ORA, ABS, 3, 4, "ORA"),
    op!(0x0E, ASL, ABS, 3, 6, "ASL"),
    op!(0x0F, SLO, ABS, 3, 6, "*SLO"),
    op!(0x10, BPL, REL, 2, 2, +1, "BPL"),
    op!(0x11, ORA, INDY, 2, 5, +1, "ORA"),
    op!(0x12, KIL, IMP, 1, 2, "*KIL"),
    op!(0x13, SLO, INDYW, 2, 8, "*SLO"),
    op!(0x14, NOP, ZPX, 2, 4, "*NOP"),
    op!(0x15, ORA, ZPX, 2, 4, "ORA"),
    op!(0x16, ASL, ZPX, 2, 6, "ASL"),
    op!(0x17, SLO, ZPX, 2, 6, "*SLO"),
    op!(0x18, CLC, IMP, 1, 2, "CLC"),
    op!(0x19, ORA, ABSY, 3, 4, +1, "ORA"),
    op!(0x1A, NOP, IMP, 1, 2, "*NOP"),
    op!(0x1B, SLO, ABSYW, 3, 7, "*SLO"),
    op!(0x1C, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0x1D, ORA, ABSX, 3, 4, +1, "ORA"),
    op!(0x1E, ASL, ABSXW, 3, 7, "ASL"),
    op!(0x1F, SLO, ABSXW, 3, 7, "*SLO"),
    op!(0x20, JSR, ABS, 3, 6, "JSR"),
    op!(0x21, AND, INDX, 2, 6, "AND"),
    op!(0x22, KIL, IMP, 1, 2, "*KIL"),
    op!(0x23, RLA, INDX, 2, 8, "*RLA"),
    op!(0x24, BIT, ZP, 2, 3, "BIT"),
    op!(0x25, AND, ZP, 2, 3, "AND"),
    op!(0x26, ROL, ZP, 2, 5, "ROL"),
    op!(0x27, RLA, ZP, 2, 5, "*RLA"),
    op!(0x28, PLP, IMP, 1, 4, "PLP"),
    op!(0x29, AND, IMM, 2, 2, "AND"),
    op!(0x2A, ROL, ACC, 1, 2, "ROL"),
    op!(0x2B, ANC, IMM, 2, 2, "*ANC"),
    op!(0x2C, BIT, ABS, 3, 4, "BIT"),
    op!(0x2D, AND, ABS, 3, 4, "AND"),
    op!(0x2E, ROL, ABS, 3, 6, "ROL"),
    op!(0x2F, RLA, ABS, 3, 6, "*RLA"),
    op!(0x30, BMI, REL, 2, 2, +1, "BMI"),
    op!(0x31, AND, INDY, 2, 5, +1, "AND"),
    op!(0x32, KIL, IMP, 1, 2, "*KIL"),
    op!(0x33, RLA, INDYW, 2, 8, "*RLA"),
    op!(0x34, NOP, ZPX, 2, 4, "*NOP"),
    op!(0x35, AND, ZPX, 2, 4, "AND"),
    op!(0x36, ROL, ZPX, 2, 6, "ROL"),
    op!(0x37, RLA, ZPX, 2, 6, "*RLA"),
    op!(0x38, SEC, IMP, 1, 2, "SEC"),
    op!(0x39, AND, ABSY, 3, 4, +1, "AND"),
    op!(0x3A, NOP, IMP, 1, 2, "*NOP"),
    op!(0x3B, RLA, ABSYW, 3, 7, "*RLA"),
    op!(0x3C, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0x3D, AND, ABSX, 3, 4, +1, "AND"),
    op!(0x3E, ROL, ABSXW, 3, 7, "ROL"),
    op!(0x3F, RLA, ABSXW, 3, 7, "*RLA"),
    op!(0x40, RTI, IMP, 1, 6, "RTI"),
    op!(0x41, EOR, INDX, 2, 6, "EOR"),
    op!(0x42, KIL, IMP, 1, 2, "*KIL"),
    op!(0x43, SRE, INDX, 2, 8, "*SRE"),
    op!(0x44, NOP, ZP, 2, 3, "*NOP"),
    op!(0x45, EOR, ZP, 2, 3, "EOR"),
    op!(0x46, LSR, ZP, 2, 5, "LSR"),
    op!(0x47, SRE, ZP, 2, 5, "*SRE"),
    op!(0x48, PHA, IMP, 1, 3, "PHA"),
    op!(0x49, EOR, IMM, 2, 2, "EOR"),
    op!(0x4A, LSR, ACC, 1, 2, "LSR"),
    op!(0x4B, ALR, IMM, 2, 2, "*ALR"),
    op!(0x4C, JMP, ABS, 3, 3, "JMP"),
    op!(0x4D, EOR, ABS, 3, 4, "EOR"),
    op!(0x4E, LSR, ABS, 3, 6, "LSR"),
    op!(0x4F, SRE, ABS, 3, 6, "*SRE"),
    op!(0x50, BVC, REL, 2, 2, +1, "BVC"),
    op!(0x51, EOR, INDY, 2, 5, +1, "EOR"),
    op!(0x52, KIL, IMP, 1, 2, "*KIL"),
    op!(0x53, SRE, INDYW, 2, 8, "*SRE"),
    op!(0x54, NOP, ZPX, 2, 4, "*NOP"),
    op!(0x55, EOR, ZPX, 2, 4, "EOR"),
    op!(0x56, LSR, ZPX, 2, 6, "LSR"),
    op!(0x57, SRE, ZPX, 2, 6, "*SRE"),
    op!(0x58, CLI, IMP, 1, 2, "CLI"),
    op!(0x59, EOR, ABSY, 3, 4, +1, "EOR"),
    op!(0x5A, NOP, IMP, 1, 2, "*NOP"),
    op!(0x5B, SRE, ABSYW, 3, 7, "*SRE"),
    op!(0x5C, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0x5D, EOR, ABSX, 3, 4, +1, "EOR"),
    op!(0x5E, LSR, ABSXW, 3, 7, "LSR"),
    op!(0x5F, SRE, ABSXW, 3, 7, "*SRE"),
    op!(0x60, RTS, IMP, 1, 6, "RTS"),
    op!(0x61, ADC, INDX, 2, 6, "ADC"),
    op!(0x62, KIL, IMP, 1, 2, "*KIL"),
    op!(0x63, RRA, INDX, 2, 8, "*RRA"),
    op!(0x64, NOP, ZP, 2, 3, "*NOP"),
    op!(0x65, ADC, ZP, 2, 3, "ADC"),
    op!(0x66, ROR, ZP, 2, 5, "ROR"),
    op!(0x67, RRA, ZP, 2, 5, "*RRA"),
    op!(0x68, PLA, IMP, 1, 4, "PLA"),
    op!(0x69, ADC, IMM, 2, 2, "ADC"),
    op!(0x6A, ROR, ACC, 1, 2, "ROR"),
    op!(0x6B, ARR, IMM, 2, 2, "*ARR"),
    op!(0x6C, JMP, IND, 3, 5, "JMP"),
    op!(0x6D, ADC, ABS, 3, 4, "ADC"),
    op!(0x6E, ROR, ABS, 3, 6, "ROR"),
    op!(0x6F, RRA, ABS, 3, 6, "*RRA"),
    op!(0x70, BVS, REL, 2, 2, +1, "BVS"),
    op!(0x71, ADC, INDY, 2, 5, +1, "ADC"),
    op!(0x72, KIL, IMP, 1, 2, "*KIL"),
    op!(0x73, RRA, INDYW, 2, 8, "*RRA"),
    op!(0x74, NOP, ZPX, 2, 4, "*NOP"),
    op!(0x75, ADC, ZPX, 2, 4, "ADC"),
    op!(0x76, ROR, ZPX, 2, 6, "ROR"),
    op!(0x77, RRA, ZPX, 2, 6, "*RRA"),
    op!(0x78, SEI, IMP, 1, 2, "SEI"),
    op!(0x79, ADC, ABSY, 3, 4, +1, "ADC"),
    op!(0x7A, NOP, IMP, 1, 2, "*NOP"),
    op!(0x7B, RRA, ABSYW, 3, 7, "*RRA"),
    op!(0x7C, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0x7D, ADC, ABSX, 3, 4, +1, "ADC"),
    op!(0x7E, ROR, ABSXW, 3, 7, "ROR"),
    op!(0x7F, RRA, ABSXW, 3, 7, "*RRA"),
    op!(0x80, NOP, IMM, 2, 2, "*NOP"),
    op!(0x81, STA, INDX, 2, 6, "STA"),
    op!(0x82, NOP, IMM, 2, 2, "*NOP"),
    op!(0x83, SAX, INDX, 2, 6, "*SAX"),
    op!(0x84, STY, ZP, 2, 3, "STY"),
    op!(0x85, STA, ZP, 2, 3, "STA"),
    op!(0x86, STX, ZP, 2, 3, "STX"),
    op!(0x87, SAX, ZP, 2, 3, "*SAX"),
    op!(0x88, DEY, IMP, 1, 2, "DEY"),
    op!(0x89, NOP, IMM, 2, 2, "*NOP"),
    op!(0x8A, TXA, IMP, 1, 2, "TXA"),
    op!(0x8B, XAA, IMM, 2, 2, "*XAA"),
    op!(0x8C, STY, ABS, 3, 4, "STY"),
    op!(0x8D, STA, ABS, 3, 4, "STA"),
    op!(0x8E, STX, ABS, 3, 4, "STX"),
    op!(0x8F, SAX, ABS, 3, 4, "*SAX"),
    op!(0x90, BCC, REL, 2, 2, +1, "BCC"),
    op!(0x91, STA, INDYW, 2, 6, "STA"),
    op!(0x92, KIL, IMP, 1, 2, "*KIL"),
    op!(0x93, AHX, INDYW, 2, 6, "*AHX"),
    op!(0x94, STY, ZPX, 2, 4, "STY"),
    op!(0x95, STA, ZPX, 2, 4, "STA"),
    op!(0x96, STX, ZPY, 2, 4, "STX"),
    op!(0x97, SAX, ZPY, 2, 4, "*SAX"),
    op!(0x98, TYA, IMP, 1, 2, "TYA"),
    op!(0x99, STA, ABSYW, 3, 5, "STA"),
    op!(0x9A, TXS, IMP, 1, 2, "TXS"),
    op!(0x9B, TAS, ABSYW, 3, 5, "*TAS"),
    op!(0x9C, SHY, ABSXW, 3, 5, "*SHY"),
    op!(0x9D, STA, ABSXW, 3, 5, "STA"),
    op!(0x9E, SHX, ABSYW, 3, 5, "*SHX"),
    op!(0x9F, AHX, ABSYW, 3, 5, "*AHX"),
    op!(0xA0, LDY, IMM, 2, 2, "LDY"),
    op!(0xA1, LDA, INDX, 2, 6, "LDA"),
    op!(0xA2, LDX, IMM, 2, 2, "LDX"),
    op!(0xA3, LAX, INDX, 2, 6, "*LAX"),
    op!(0xA4, LDY, ZP, 2, 3, "LDY"),
    op!(0xA5, LDA, ZP, 2, 3, "LDA"),
    op!(0xA6, LDX, ZP, 2, 3, "LDX"),
    op!(0xA7, LAX, ZP, 2, 3, "*LAX"),
    op!(0xA8, TAY, IMP, 1, 2, "TAY"),
    op!(0xA9, LDA, IMM, 2, 2, "LDA"),
    op!(0xAA, TAX, IMP, 1, 2, "TAX"),
    op!(0xAB, LAX, IMM, 2, 2, "*LAX"),
    op!(0xAC, LDY, ABS, 3, 4, "LDY"),
    op!(0xAD, LDA, ABS, 3, 4, "LDA"),
    op!(0xAE, LDX, ABS, 3, 4, "LDX"),
    op!(0xAF, LAX, ABS, 3, 4, "*LAX"),
    op!(0xB0, BCS, REL, 2, 2, +1, "BCS"),
    op!(0xB1, LDA, INDY, 2, 5, +1, "LDA"),
    op!(0xB2, KIL, IMP, 1, 2, "*KIL"),
    op!(0xB3, LAX, INDY, 2, 5, +1, "*LAX"),
    op!(0xB4, LDY, ZPX, 2, 4, "LDY"),
    op!(0xB5, LDA, ZPX, 2, 4, "LDA"),
    op!(0xB6, LDX, ZPY, 2, 4, "LDX"),
    op!(0xB7, LAX, ZPY, 2, 4, "*LAX"),
    op!(0xB8, CLV, IMP, 1, 2, "CLV"),
    op!(0xB9, LDA, ABSY, 3, 4, +1, "LDA"),
    op!(0xBA, TSX, IMP, 1, 2, "TSX"),
    op!(0xBB, LAS, ABSY, 3, 4, +1, "*LAS"),
    op!(0xBC, LDY, ABSX, 3, 4, +1, "LDY"),
    op!(0xBD, LDA, ABSX, 3, 4, +1, "LDA"),
    op!(0xBE, LDX, ABSY, 3, 4, +1, "LDX"),
    op!(0xBF, LAX, ABSY, 3, 4, +1, "*LAX"),
    op!(0xC0, CPY, IMM, 2, 2, "CPY"),
    op!(0xC1, CMP, INDX, 2, 6, "CMP"),
    op!(0xC2, NOP, IMM, 2, 2, "*NOP"),
    op!(0xC3, DCP, INDX, 2, 8, "*DCP"),
    op!(0xC4, CPY, ZP, 2, 3, "CPY"),
    op!(0xC5, CMP, ZP, 2, 3, "CMP"),
    op!(0xC6, DEC, ZP, 2, 5, "DEC"),
    op!(0xC7, DCP, ZP, 2, 5, "*DCP"),
    op!(0xC8, INY, IMP, 1, 2, "INY"),
    op!(0xC9, CMP, IMM, 2, 2, "CMP"),
    op!(0xCA, DEX, IMP, 1, 2, "DEX"),
    op!(0xCB, AXS, IMM, 2, 2, "*AXS"),
    op!(0xCC, CPY, ABS, 3, 4, "CPY"),
    op!(0xCD, CMP, ABS, 3, 4, "CMP"),
    op!(0xCE, DEC, ABS, 3, 6, "DEC"),
    op!(0xCF, DCP, ABS, 3, 6, "*DCP"),
    op!(0xD0, BNE, REL, 2, 2, +1, "BNE"),
    op!(0xD1, CMP, INDY, 2, 5, +1, "CMP"),
    op!(0xD2, KIL, IMP, 1, 2, "*KIL"),
    op!(0xD3, DCP, INDYW, 2, 8, "*DCP"),
    op!(0xD4, NOP, ZPX, 2, 4, "*NOP"),
    op!(0xD5, CMP, ZPX, 2, 4, "CMP"),
    op!(0xD6, DEC, ZPX, 2, 6, "DEC"),
    op!(0xD7, DCP, ZPX, 2, 6, "*DCP"),
    op!(0xD8, CLD, IMP, 1, 2, "CLD"),
    op!(0xD9, CMP, ABSY, 3, 4, +1, "CMP"),
    op!(0xDA, NOP, IMP, 1, 2, "*NOP"),
    op!(0xDB, DCP, ABSYW, 3, 7, "*DCP"),
    op!(0xDC, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0xDD, CMP, ABSX, 3, 4, +1, "CMP"),
    op!(0xDE, DEC, ABSXW, 3, 7, "DEC"),
    op!(0xDF, DCP, ABSXW, 3, 7, "*DCP"),
    op!(0xE0, CPX, IMM, 2, 2, "CPX"),
    op!(0xE1, SBC, INDX, 2, 6, "SBC"),
    op!(0xE2, NOP, IMM, 2, 2, "*NOP"),
    op!(0xE3, ISB, INDX, 2, 8, "*ISB"),
    op!(0xE4, CPX, ZP, 2, 3, "CPX"),
    op!(0xE5, SBC, ZP, 2, 3, "SBC"),
    op!(0xE6, INC, ZP, 2, 5, "INC"),
    op!(0xE7, ISB, ZP, 2, 5, "*ISB"),
    op!(0xE8, INX, IMP, 1, 2, "INX"),
    op!(0xE9, SBC, IMM, 2, 2, "SBC"),
    op!(0xEA, NOP, IMP, 1, 2, "NOP"),
    op!(0xEB, SBC, IMM, 2, 2, "*SBC"),
    op!(0xEC, CPX, ABS, 3, 4, "CPX"),
    op!(0xED, SBC, ABS, 3, 4, "SBC"),
    op!(0xEE, INC, ABS, 3, 6, "INC"),
    op!(0xEF, ISB, ABS, 3, 6, "*ISB"),
    op!(0xF0, BEQ, REL, 2, 2, +1, "BEQ"),
    op!(0xF1, SBC, INDY, 2, 5, +1, "SBC"),
    op!(0xF2, KIL, IMP, 1, 2, "*KIL"),
    op!(0xF3, ISB, INDYW, 2, 8, "*ISB"),
    op!(0xF4, NOP, ZPX, 2, 4, "*NOP"),
    op!(0xF5, SBC, ZPX, 2, 4, "SBC"),
    op!(0xF6, INC, ZPX, 2, 6, "INC"),
    op!(0xF7, ISB, ZPX, 2, 6, "*ISB"),
    op!(0xF8, SED, IMP, 1, 2, "SED"),
    op!(0xF9, SBC, ABSY, 3, 4, +1, "SBC"),
    op!(0xFA, NOP, IMP, 1, 2, "*NOP"),
    op!(0xFB, ISB, ABSYW, 3, 7, "*ISB"),
    op!(0xFC, NOP, ABSX, 3, 4, +1, "*NOP"),
    op!(0xFD, SBC, ABSX, 3, 4, +1, "SBC"),
    op!(0xFE, INC, ABSXW, 3, 7, "INC"),
    op!(0xFF, ISB, ABSXW, 3, 7, "*ISB"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_self_consistent() {
        for (i, op) in OPS.iter().enumerate() {
            assert_eq!(op.code as usize, i);
            assert!(op.len >= 1 && op.len <= 3);
            assert!(op.cycles >= 2 && op.cycles <= 8);
        }
    }

    #[test]
    fn known_entries() {
        assert_eq!(OPS[0xA9].family, LDA);
        assert_eq!(OPS[0xA9].mode, IMM);
        assert_eq!(OPS[0xA9].cycles, 2);

        assert_eq!(OPS[0x9D].mode, ABSXW);
        assert_eq!(OPS[0x9D].cycles, 5);

        assert_eq!(OPS[0xBD].mode, ABSX);
        assert_eq!(OPS[0xBD].page_cycles, 1);

        assert_eq!(OPS[0x6C].family, JMP);
        assert_eq!(OPS[0x6C].mode, IND);
    }
}
