pub mod core;

pub use self::core::{pad, Crypto, BLOCK_SIZE, DIGEST_SIZE};

/// 杂凑算法的能力接口
pub trait Hasher {
    const OUTPUT_SIZE: usize;
    const BLOCK_SIZE: usize;

    fn reset(&mut self);
    fn update(&mut self, data: &[u8]);
    /// 不改变当前状态，可继续 `update`
    fn finalize(&self) -> [u8; DIGEST_SIZE];

    fn finalize_reset(&mut self) -> [u8; DIGEST_SIZE] {
        let hash = self.finalize();
        self.reset();
        hash
    }
}

impl Hasher for Crypto {
    const OUTPUT_SIZE: usize = DIGEST_SIZE;
    const BLOCK_SIZE: usize = BLOCK_SIZE;

    fn reset(&mut self) {
        Crypto::reset(self)
    }

    fn update(&mut self, data: &[u8]) {
        Crypto::update(self, data)
    }

    fn finalize(&self) -> [u8; DIGEST_SIZE] {
        Crypto::finalize(self)
    }
}

/// 计算字节串的摘要
pub fn hash(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut crypto = Crypto::new();
    crypto.update(data);
    crypto.finalize()
}

/// 计算摘要信息，返回小写十六进制字符串
pub fn digest(data: &str) -> String {
    hex::encode(hash(data.as_bytes()))
}
