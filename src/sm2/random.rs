use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;

use crate::error::{Error, Result};

// 拒绝采样的最大次数，每次被拒绝的概率小于 1/2
const MAX_SAMPLES: usize = 128;

/// 密码学安全的随机数源
pub trait RandomSource {
    /// 返回 [0, upper) 内均匀分布的整数
    fn random_below(&mut self, upper: &BigUint) -> Result<BigUint>;
}

/// 任何 `RngCore` 都可作为随机数源，生产环境使用 `rand::rngs::OsRng`
impl<R: RngCore + ?Sized> RandomSource for R {
    fn random_below(&mut self, upper: &BigUint) -> Result<BigUint> {
        if upper.is_zero() {
            return Err(Error::RandomSourceFailure(String::from("empty sampling range")));
        }
        let bits = upper.bits() as usize;
        let mut bytes = vec![0u8; (bits + 7) / 8];
        // 最高字节多余的比特
        let excess = bytes.len() * 8 - bits;

        for _ in 0..MAX_SAMPLES {
            self.try_fill_bytes(&mut bytes)?;
            bytes[0] &= 0xff >> excess;
            let candidate = BigUint::from_bytes_be(&bytes);
            if &candidate < upper {
                return Ok(candidate);
            }
        }
        Err(Error::RandomSourceFailure(String::from("rejection sampling exhausted")))
    }
}

/// 随机选取 k ∈ [1, upper-1]
pub fn pick_k<R: RandomSource + ?Sized>(rng: &mut R, upper: &BigUint) -> Result<BigUint> {
    for _ in 0..MAX_SAMPLES {
        let k = rng.random_below(upper)?;
        if !k.is_zero() {
            return Ok(k);
        }
    }
    Err(Error::RandomSourceFailure(String::from("random source keeps returning zero")))
}
