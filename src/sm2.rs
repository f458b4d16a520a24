use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::sm2::cipher::{Ciphertext, Mode};
use crate::sm2::key::{HexKey, KeyGenerator, PrivateKey, PublicKey};
use crate::sm2::signature::Signature;

pub use crate::sm2::core::Elliptic;
pub use crate::sm2::ecc::{EllipticProvider, Point};
pub use crate::sm2::random::RandomSource;
pub use crate::sm2::weierstrass::Weierstrass;

pub mod cipher;
pub mod core;
pub mod ecc;
pub mod kdf;
pub mod key;
pub mod random;
pub mod signature;
pub mod weierstrass;


/// 生成秘钥对，返回 (私钥, 公钥) 的十六进制串
pub fn generate_key() -> Result<(String, String)> {
    let generator = KeyGenerator::new(Arc::new(Elliptic::recommended()));
    let pair = generator.gen_key_pair(&mut OsRng)?;
    let (prk, puk) = (pair.private_key(), pair.public_key());
    Ok((prk.encode(), puk.encode()))
}

/// 使用默认用户ID签名，返回 DER 编码签名的十六进制串
pub fn sign(key: &str, plain: &str) -> Result<String> {
    let prk = PrivateKey::decode(Arc::new(Elliptic::recommended()), key)?;
    let signature = prk.sign(&mut OsRng, None, plain.as_bytes())?;
    Ok(hex::encode(signature.to_der()))
}

/// 验证 DER 编码的签名；签名无法解析时返回错误，验证不通过返回 false
pub fn verify(key: &str, plain: &str, signature: &str) -> Result<bool> {
    let puk = PublicKey::decode(Arc::new(Elliptic::recommended()), key)?;
    let signature = Signature::from_der(&hex::decode(signature)?)?;
    Ok(puk.verify(None, plain.as_bytes(), &signature))
}

/// 加密，返回 C1C2C3 排列的密文十六进制串
pub fn encrypt(key: &str, plain: &str) -> Result<String> {
    let puk = PublicKey::decode(Arc::new(Elliptic::recommended()), key)?;
    let cipher = puk.encrypt(&mut OsRng, plain.as_bytes())?;
    Ok(hex::encode(cipher.to_bytes(puk.curve(), Mode::C1C2C3)))
}

pub fn decrypt(key: &str, cipher: &str) -> Result<String> {
    let prk = PrivateKey::decode(Arc::new(Elliptic::recommended()), key)?;
    let cipher = Ciphertext::from_bytes(prk.curve(), &hex::decode(cipher)?, Mode::C1C2C3)?;
    let plain = prk.decrypt(&cipher)?;
    String::from_utf8(plain).map_err(|_| Error::MalformedEncoding(String::from("the plaintext is not valid utf-8")))
}


/// 最短大端字节串，0 编码为空串
pub(crate) fn minimal_bytes(x: &BigUint) -> Vec<u8> {
    if x.is_zero() {
        return Vec::new();
    }
    x.to_bytes_be()
}

/// 定长大端字节串：不足左侧补零，超出截去左侧多余部分
pub(crate) fn fixed_bytes(x: &BigUint, width: usize) -> Vec<u8> {
    let bytes = minimal_bytes(x);
    let mut out = vec![0u8; width];
    if bytes.len() >= width {
        out.copy_from_slice(&bytes[bytes.len() - width..]);
    } else {
        out[width - bytes.len()..].copy_from_slice(&bytes);
    }
    out
}
