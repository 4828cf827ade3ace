// Short human-readable code generation
// 32-character alphabet without O/0/1/I so codes survive handwriting on
// a shop floor. Uniqueness is enforced by UNIQUE columns; a collision
// surfaces as a Duplicate error on insert.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// SKU for a new item: `<TYPE>-<6 chars>`
pub fn gen_sku(type_code: &str) -> String {
    format!("{}-{}", type_code, code(6))
}

/// Batch code: `BTCH-<8 chars>`
pub fn gen_batch_code() -> String {
    format!("BTCH-{}", code(8))
}

/// Product code: `PRD-<6 chars>`
pub fn gen_product_code() -> String {
    format!("PRD-{}", code(6))
}

/// Work order code: `WO-<6 chars>`
pub fn gen_wo_code() -> String {
    format!("WO-{}", code(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_alphabet_excludes_ambiguous_chars() {
        for _ in 0..100 {
            let c = code(8);
            assert_eq!(c.len(), 8);
            for ch in c.chars() {
                assert!(
                    !"O01I".contains(ch),
                    "ambiguous character {} in code {}",
                    ch,
                    c
                );
                assert!(ch.is_ascii_uppercase() || ch.is_ascii_digit());
            }
        }
    }

    #[test]
    fn test_prefixes() {
        assert!(gen_sku("ALU").starts_with("ALU-"));
        assert!(gen_batch_code().starts_with("BTCH-"));
        assert_eq!(gen_batch_code().len(), "BTCH-".len() + 8);
        assert!(gen_product_code().starts_with("PRD-"));
        assert!(gen_wo_code().starts_with("WO-"));
        assert_eq!(gen_wo_code().len(), "WO-".len() + 6);
    }
}
