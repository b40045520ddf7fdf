//! Raster-operation evaluation.
//!
//! A ternary ROP code is its own truth table: bit `(P << 2) | (S << 1) | D`
//! of the code holds the result for that operand combination, so the 256
//! MS-RDPEGDI operations reduce to a sum of minterms evaluated bitwise over
//! whole pixels. Binary (R2) codes work the same way over `(P << 1) | D`.

/// Evaluates a ternary raster operation over destination, source and pattern
/// words.
#[inline]
pub fn rop3(code: u8, dst: u32, src: u32, pat: u32) -> u32 {
    let mut result = 0;

    for minterm in 0..8u8 {
        if code >> minterm & 1 != 0 {
            let p = if minterm & 0b100 != 0 { pat } else { !pat };
            let s = if minterm & 0b010 != 0 { src } else { !src };
            let d = if minterm & 0b001 != 0 { dst } else { !dst };
            result |= p & s & d;
        }
    }

    result
}

/// Evaluates a binary raster operation (R2 code, 1..=16) over destination and
/// pen words.
#[inline]
pub fn rop2(code: u8, dst: u32, pen: u32) -> u32 {
    let table = code.wrapping_sub(1) & 0x0F;
    let mut result = 0;

    for minterm in 0..4u8 {
        if table >> minterm & 1 != 0 {
            let p = if minterm & 0b10 != 0 { pen } else { !pen };
            let d = if minterm & 0b01 != 0 { dst } else { !dst };
            result |= p & d;
        }
    }

    result
}

/// The well-known ROP3 codes the order dispatcher meets most often.
pub mod codes {
    pub const BLACKNESS: u8 = 0x00;
    pub const NOTSRCERASE: u8 = 0x11;
    pub const NOTSRCCOPY: u8 = 0x33;
    pub const SRCERASE: u8 = 0x44;
    pub const DSTINVERT: u8 = 0x55;
    pub const PATINVERT: u8 = 0x5A;
    pub const SRCINVERT: u8 = 0x66;
    pub const SRCAND: u8 = 0x88;
    pub const MERGEPAINT: u8 = 0xBB;
    pub const SRCCOPY: u8 = 0xCC;
    pub const SRCPAINT: u8 = 0xEE;
    pub const PATCOPY: u8 = 0xF0;
    pub const PATPAINT: u8 = 0xFB;
    pub const WHITENESS: u8 = 0xFF;
}

/// R2 codes used by LineTo and Polyline.
pub mod rop2_codes {
    pub const R2_BLACK: u8 = 0x01;
    pub const R2_NOTCOPYPEN: u8 = 0x04;
    pub const R2_NOT: u8 = 0x06;
    pub const R2_XORPEN: u8 = 0x07;
    pub const R2_NOP: u8 = 0x0B;
    pub const R2_COPYPEN: u8 = 0x0D;
    pub const R2_WHITE: u8 = 0x10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_codes_match_their_algebra() {
        let d = 0x00FF_00FF;
        let s = 0x0F0F_0F0F;
        let p = 0x3333_3333;

        assert_eq!(rop3(codes::BLACKNESS, d, s, p), 0);
        assert_eq!(rop3(codes::WHITENESS, d, s, p), !0);
        assert_eq!(rop3(codes::SRCCOPY, d, s, p), s);
        assert_eq!(rop3(codes::NOTSRCCOPY, d, s, p), !s);
        assert_eq!(rop3(codes::PATCOPY, d, s, p), p);
        assert_eq!(rop3(codes::SRCAND, d, s, p), s & d);
        assert_eq!(rop3(codes::SRCPAINT, d, s, p), s | d);
        assert_eq!(rop3(codes::SRCINVERT, d, s, p), s ^ d);
        assert_eq!(rop3(codes::DSTINVERT, d, s, p), !d);
        assert_eq!(rop3(codes::PATINVERT, d, s, p), p ^ d);
        assert_eq!(rop3(codes::MERGEPAINT, d, s, p), !s | d);
        assert_eq!(rop3(codes::SRCERASE, d, s, p), s & !d);
        assert_eq!(rop3(codes::NOTSRCERASE, d, s, p), !(s | d));
        assert_eq!(rop3(codes::PATPAINT, d, s, p), d | p | !s);
    }

    #[test]
    fn every_code_is_consistent_with_its_truth_table() {
        for code in 0..=255u8 {
            for bits in 0..8u32 {
                let p = if bits & 4 != 0 { !0u32 } else { 0 };
                let s = if bits & 2 != 0 { !0u32 } else { 0 };
                let d = if bits & 1 != 0 { !0u32 } else { 0 };

                let expected = if code >> bits & 1 != 0 { !0u32 } else { 0 };
                assert_eq!(rop3(code, d, s, p), expected, "code {code:#04x}, operands {bits:03b}");
            }
        }
    }

    #[test]
    fn rop2_copy_and_xor() {
        let d = 0xAAAA_5555;
        let p = 0x0F0F_F0F0;

        assert_eq!(rop2(rop2_codes::R2_COPYPEN, d, p), p);
        assert_eq!(rop2(rop2_codes::R2_XORPEN, d, p), d ^ p);
        assert_eq!(rop2(rop2_codes::R2_NOP, d, p), d);
        assert_eq!(rop2(rop2_codes::R2_BLACK, d, p), 0);
        assert_eq!(rop2(rop2_codes::R2_WHITE, d, p), !0);
    }
}
