//! Reed-Solomon error correction parity for Mode 2 Form 1 sectors.
//!
//! Form 1 sectors carry 276 bytes of parity split into a P block (86
//! codewords of 24 bytes, 172 parity bytes) and a Q block (52 diagonal
//! codewords of 43 bytes, 104 parity bytes) over GF(2⁸) with the
//! CD-ROM generator polynomial. The Q block also covers the P parity,
//! so P must be generated first.
//!
//! On CD-ROM XA the parity is computed with the 4-byte address field
//! zeroed out, which lets a drive regenerate the header from the
//! subchannel without breaking the codes.

/// GF(2⁸) multiply-by-2 table for the polynomial 0x11d
static GF8_MUL2: [u8; 256] = {
    let mut lut = [0u8; 256];

    let mut i = 0;
    while i < 256 {
        let d = (i as u16) << 1;

        lut[i] = if d & 0x100 != 0 {
            (d ^ 0x11d) as u8
        } else {
            d as u8
        };
        i += 1;
    }

    lut
};

/// Inverse table: GF8_DIV3[x ^ GF8_MUL2[x]] == x, i.e. division by 3
/// (the product of the two error locator roots)
static GF8_DIV3: [u8; 256] = {
    let mut lut = [0u8; 256];

    let mut i = 0;
    while i < 256 {
        let d = (i as u16) << 1;
        let m2 = if d & 0x100 != 0 {
            (d ^ 0x11d) as u8
        } else {
            d as u8
        };

        lut[(i as u8 ^ m2) as usize] = i as u8;
        i += 1;
    }

    lut
};

/// Offset of the region covered by the parity codes (the address field
/// and everything after it, up to the parity itself)
const ECC_BASE: usize = 12;
/// Offset of the P parity block
const P_PARITY: usize = 2076;
/// Offset of the Q parity block
const Q_PARITY: usize = 2248;

/// Generate the P and Q parity for a Form 1 sector in place. The
/// address field (bytes 12..16) is treated as zero per the XA scheme;
/// its actual content doesn't matter.
pub fn generate(sector: &mut [u8; 2352]) {
    let header = *array_ref![sector, ECC_BASE, 4];
    sector[ECC_BASE..ECC_BASE + 4].fill(0);

    // P: 86 columns of 24 bytes
    compute_block(sector, 86, 24, 2, 86, P_PARITY);
    // Q: 52 diagonals of 43 bytes, spanning the P parity as well
    compute_block(sector, 52, 43, 86, 88, Q_PARITY);

    sector[ECC_BASE..ECC_BASE + 4].copy_from_slice(&header);
}

/// Compute one parity block. Codeword `major` starts at byte
/// `(major / 2) * major_mult + (major % 2)` relative to `ECC_BASE` and
/// steps by `minor_inc`, wrapping at `major_count * minor_count`. Each
/// codeword contributes one byte to each of the block's two parity
/// rows.
fn compute_block(
    sector: &mut [u8; 2352],
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
    parity: usize,
) {
    let size = major_count * minor_count;

    for major in 0..major_count {
        let mut index = (major >> 1) * major_mult + (major & 1);

        let mut ecc_a = 0u8;
        let mut ecc_b = 0u8;

        for _ in 0..minor_count {
            let b = sector[ECC_BASE + index];

            index += minor_inc;
            if index >= size {
                index -= size;
            }

            ecc_a ^= b;
            ecc_b ^= b;
            ecc_a = GF8_MUL2[ecc_a as usize];
        }

        let ecc_a = GF8_DIV3[(GF8_MUL2[ecc_a as usize] ^ ecc_b) as usize];

        sector[parity + major] = ecc_a;
        sector[parity + major_count + major] = ecc_a ^ ecc_b;
    }
}

#[cfg(test)]
mod test {
    use super::{generate, GF8_DIV3, GF8_MUL2};

    #[test]
    fn mul2_is_linear() {
        for a in 0..=255u8 {
            for b in [0x01u8, 0x53, 0xfe] {
                assert_eq!(
                    GF8_MUL2[(a ^ b) as usize],
                    GF8_MUL2[a as usize] ^ GF8_MUL2[b as usize]
                );
            }
        }
    }

    #[test]
    fn div3_inverts_mul3() {
        for x in 0..=255u8 {
            let mul3 = x ^ GF8_MUL2[x as usize];

            assert_eq!(GF8_DIV3[mul3 as usize], x);
        }
    }

    #[test]
    fn all_zero_sector_has_zero_parity() {
        let mut sector = [0u8; 2352];

        generate(&mut sector);

        assert!(sector.iter().all(|&b| b == 0));
    }

    #[test]
    fn address_field_is_ignored() {
        let mut a = [0u8; 2352];
        let mut b = [0u8; 2352];

        a[24] = 0x42;
        b[24] = 0x42;
        b[12] = 0x99;
        b[13] = 0x59;
        b[14] = 0x74;
        b[15] = 0x02;

        generate(&mut a);
        generate(&mut b);

        assert_eq!(a[2076..], b[2076..]);
        // And the address comes back untouched
        assert_eq!(&b[12..16], &[0x99, 0x59, 0x74, 0x02]);
    }

    #[test]
    fn parity_reacts_to_payload() {
        let mut sector = [0u8; 2352];
        sector[100] = 1;

        generate(&mut sector);

        assert!(sector[2076..].iter().any(|&b| b != 0));
    }
}
