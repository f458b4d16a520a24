use num_bigint::BigUint;

use crate::sm2::minimal_bytes;
use crate::sm3::Hasher;

/// 密钥派生函数 KDF(Z, klen)
///
/// Z = x2 || y2，坐标使用最短大端编码；计数器 ct 从 1 开始，32位大端。
/// 依次计算 Ha_i = H(Z || ct)，取前 klen 字节。
pub fn kdf<H: Hasher>(hasher: &mut H, x: &BigUint, y: &BigUint, len: usize) -> Vec<u8> {
    let (x, y) = (minimal_bytes(x), minimal_bytes(y));
    let mut out = Vec::with_capacity(len + H::OUTPUT_SIZE);
    let mut ct: u32 = 1;

    while out.len() < len {
        hasher.reset();
        hasher.update(&x);
        hasher.update(&y);
        hasher.update(&ct.to_be_bytes());
        out.extend_from_slice(&hasher.finalize());
        ct = ct.wrapping_add(1);
    }
    out.truncate(len);
    out
}

/// data ^= key
pub(crate) fn xor_in_place(data: &mut [u8], key: &[u8]) {
    data.iter_mut().zip(key).for_each(|(d, k)| *d ^= k);
}

/// 全零的派生密钥不可用于加密
pub(crate) fn is_zero(key: &[u8]) -> bool {
    key.iter().fold(0u8, |acc, b| acc | b) == 0
}
