use std::sync::atomic::{compiler_fence, Ordering};

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::sm2::core::Elliptic;
use crate::sm2::ecc::{EllipticProvider, Point};
use crate::sm2::kdf::{is_zero, kdf, xor_in_place};
use crate::sm2::key::{decode_point, encode_point, PrivateKey, PublicKey};
use crate::sm2::minimal_bytes;
use crate::sm2::random::{pick_k, RandomSource};
use crate::sm2::weierstrass::Weierstrass;
use crate::sm3::{Crypto, DIGEST_SIZE};

// 选取 k 的最大次数
const MAX_RETRIES: usize = 64;

/// 密文各部分的排列顺序
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// C1 || C2 || C3
    #[default]
    C1C2C3,
    /// C1 || C3 || C2，GM/T 0009 使用的排列
    C1C3C2,
}

/// 密文 C = (C1, C2, C3)
///
/// C1 = kG，C2 为异或后的明文，C3 = SM3(x2 || M || y2)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    c1: Point,
    c2: Vec<u8>,
    c3: [u8; DIGEST_SIZE],
}

impl Ciphertext {
    pub fn new(c1: Point, c2: Vec<u8>, c3: [u8; DIGEST_SIZE]) -> Self {
        Ciphertext { c1, c2, c3 }
    }

    pub fn c1(&self) -> &Point {
        &self.c1
    }

    pub fn c2(&self) -> &[u8] {
        &self.c2
    }

    pub fn c3(&self) -> &[u8; DIGEST_SIZE] {
        &self.c3
    }

    /// 平铺编码，C1 为 0x04 || X || Y
    pub fn to_bytes(&self, curve: &Elliptic, mode: Mode) -> Vec<u8> {
        let mut bytes = encode_point(&self.c1, curve.key_bytes());
        match mode {
            Mode::C1C2C3 => {
                bytes.extend_from_slice(&self.c2);
                bytes.extend_from_slice(&self.c3);
            }
            Mode::C1C3C2 => {
                bytes.extend_from_slice(&self.c3);
                bytes.extend_from_slice(&self.c2);
            }
        }
        bytes
    }

    /// 只检查长度和 C1 的格式，C1 是否在曲线上由解密检查
    pub fn from_bytes(curve: &Elliptic, bytes: &[u8], mode: Mode) -> Result<Self> {
        let c1_len = 1 + 2 * curve.key_bytes();
        if bytes.len() < c1_len + DIGEST_SIZE {
            return Err(Error::MalformedEncoding(format!("the ciphertext must be at least {} bytes", c1_len + DIGEST_SIZE)));
        }
        let c1 = decode_point(&bytes[..c1_len], curve.key_bytes())?;

        let rest = &bytes[c1_len..];
        let (c2, c3) = match mode {
            Mode::C1C2C3 => {
                let (c2, c3) = rest.split_at(rest.len() - DIGEST_SIZE);
                (c2, c3)
            }
            Mode::C1C3C2 => {
                let (c3, c2) = rest.split_at(DIGEST_SIZE);
                (c2, c3)
            }
        };
        let mut tag = [0u8; DIGEST_SIZE];
        tag.copy_from_slice(c3);
        Ok(Ciphertext { c1, c2: c2.to_vec(), c3: tag })
    }

    /// SEQUENCE { x INTEGER, y INTEGER, hash OCTET STRING, cipher OCTET STRING }
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_biguint(self.c1.x());
                writer.next().write_biguint(self.c1.y());
                writer.next().write_bytes(&self.c3);
                writer.next().write_bytes(&self.c2);
            })
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (x, y, c3, c2) = yasna::parse_der(der, |reader| {
            reader.read_sequence(|reader| {
                let x = reader.next().read_biguint()?;
                let y = reader.next().read_biguint()?;
                let c3 = reader.next().read_bytes()?;
                let c2 = reader.next().read_bytes()?;
                Ok((x, y, c3, c2))
            })
        })?;
        if c3.len() != DIGEST_SIZE {
            return Err(Error::MalformedEncoding(format!("the hash must be {} bytes", DIGEST_SIZE)));
        }
        let mut tag = [0u8; DIGEST_SIZE];
        tag.copy_from_slice(&c3);
        Ok(Ciphertext { c1: Point::new(x, y), c2, c3: tag })
    }
}

/// C1C2C3 平铺密文转为 DER 编码
pub fn marshal_der(curve: &Elliptic, flat: &[u8]) -> Result<Vec<u8>> {
    Ok(Ciphertext::from_bytes(curve, flat, Mode::C1C2C3)?.to_der())
}

/// DER 编码转为 C1C2C3 平铺密文，X、Y 左侧补零到定长
///
/// X、Y 超出 key_bytes 时无法还原，返回 `MalformedEncoding`。
pub fn unmarshal_der(curve: &Elliptic, der: &[u8]) -> Result<Vec<u8>> {
    let cipher = Ciphertext::from_der(der)?;
    let bits = 8 * curve.key_bytes() as u64;
    if cipher.c1.x().bits() > bits || cipher.c1.y().bits() > bits {
        return Err(Error::MalformedEncoding(format!("C1 coordinates must fit in {} bytes", curve.key_bytes())));
    }
    Ok(cipher.to_bytes(curve, Mode::C1C2C3))
}


/// 加密
///
/// 1. 随机选取 k ∈ [1, n-1]，C1 = kG
/// 2. (x2, y2) = kP，t = KDF(x2 || y2, klen)，t 全为0则重新选取 k
/// 3. C2 = M ^ t，C3 = SM3(x2 || M || y2)
pub fn encrypt<E, R>(ecc: &E, rng: &mut R, public_key: &PublicKey, msg: &[u8]) -> Result<Ciphertext>
where
    E: EllipticProvider,
    R: RandomSource + ?Sized,
{
    let curve = public_key.curve();
    let mut hasher = Crypto::new();

    for _ in 0..MAX_RETRIES {
        let k = pick_k(rng, curve.n())?;
        let c1 = ecc.scalar_base_multiply(curve, &k);
        let p2 = ecc.scalar_multiply(curve, public_key.point(), &k);
        if ecc.is_infinity(&p2) {
            tracing::debug!("kP is the point at infinity, choosing another k");
            continue;
        }

        let mut c2 = kdf(&mut hasher, p2.x(), p2.y(), msg.len());
        if !msg.is_empty() && is_zero(&c2) {
            tracing::debug!("all-zero key stream, choosing another k");
            continue;
        }
        xor_in_place(&mut c2, msg);
        let c3 = tag(&mut hasher, p2.x(), msg, p2.y());
        return Ok(Ciphertext { c1, c2, c3 });
    }
    Err(Error::RandomSourceFailure(String::from("no usable k after retries")))
}

/// 解密，C3 校验通过之前不返回任何明文
///
/// 1. C1 在曲线上，且 hC1 不是无穷远点
/// 2. (x2, y2) = dC1，t = KDF(x2 || y2, klen)
/// 3. M' = C2 ^ t，u = SM3(x2 || M' || y2)，u = C3 则返回 M'
pub fn decrypt<E: EllipticProvider>(ecc: &E, private_key: &PrivateKey, cipher: &Ciphertext) -> Result<Vec<u8>> {
    let curve = private_key.curve();
    if !curve.is_on_curve(&cipher.c1) {
        tracing::debug!("C1 is not on the curve");
        return Err(Error::IntegrityFailure("C1 is not on the curve"));
    }
    if ecc.is_infinity(&ecc.scalar_multiply(curve, &cipher.c1, &curve.cofactor())) {
        tracing::debug!("hC1 is the point at infinity");
        return Err(Error::IntegrityFailure("hC1 is the point at infinity"));
    }

    let p2 = ecc.scalar_multiply(curve, &cipher.c1, private_key.d());
    let mut hasher = Crypto::new();
    let t = kdf(&mut hasher, p2.x(), p2.y(), cipher.c2.len());
    if !t.is_empty() && is_zero(&t) {
        tracing::debug!("all-zero key stream");
        return Err(Error::IntegrityFailure("all-zero key stream"));
    }

    let mut msg = cipher.c2.clone();
    xor_in_place(&mut msg, &t);
    let u = tag(&mut hasher, p2.x(), &msg, p2.y());
    if !ct_eq(&u, &cipher.c3) {
        tracing::debug!("hash mismatch");
        return Err(Error::IntegrityFailure("hash mismatch"));
    }
    Ok(msg)
}

/// SM3(x2 || M || y2)
fn tag(hasher: &mut Crypto, x: &BigUint, msg: &[u8], y: &BigUint) -> [u8; DIGEST_SIZE] {
    hasher.reset();
    hasher.update(&minimal_bytes(x));
    hasher.update(msg);
    hasher.update(&minimal_bytes(y));
    hasher.finalize()
}

#[inline(never)]
fn ct_eq(a: &[u8; DIGEST_SIZE], b: &[u8; DIGEST_SIZE]) -> bool {
    let mut diff: u8 = 0;
    for i in 0..DIGEST_SIZE {
        diff |= a[i] ^ b[i];
    }
    compiler_fence(Ordering::SeqCst);
    diff == 0
}


impl PublicKey {
    pub fn encrypt<R: RandomSource + ?Sized>(&self, rng: &mut R, msg: &[u8]) -> Result<Ciphertext> {
        encrypt(&Weierstrass, rng, self, msg)
    }
}

impl PrivateKey {
    pub fn decrypt(&self, cipher: &Ciphertext) -> Result<Vec<u8>> {
        decrypt(&Weierstrass, self, cipher)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::sm2::core::tests::{example_curve, small_curve};
    use crate::sm2::key::HexKey;
    use crate::sm2::random::tests::{BrokenRng, FixedSource};

    const PRK: &str = "6aea1ccf610488aaa7fddba3dd6d76d3bdfd50f957d847be3d453defb695f28e";

    fn big(s: &str) -> BigUint {
        BigUint::from_bytes_be(&hex::decode(s).unwrap())
    }

    fn private_key() -> PrivateKey {
        PrivateKey::decode(Arc::new(Elliptic::recommended()), PRK).unwrap()
    }

    #[test]
    fn main() {
        let private_key = private_key();
        let public_key = private_key.public_key();
        let mut rng = StdRng::seed_from_u64(13);

        let msg = "圣光会抛弃你的，英雄，就像抛弃我那样。——巫妖王".as_bytes();
        let cipher = public_key.encrypt(&mut rng, msg).unwrap();
        assert_eq!(cipher.c2().len(), msg.len());
        assert_ne!(cipher.c2(), msg);
        assert_eq!(private_key.decrypt(&cipher).unwrap(), msg);

        // 同一明文两次加密结果不同
        assert_ne!(public_key.encrypt(&mut rng, msg).unwrap(), cipher);
    }

    #[test]
    fn standard_example() {
        let curve = Arc::new(example_curve());
        let private_key = PrivateKey::new(curve.clone(), big("1649ab77a00637bd5e2efe283fbf353534aa7f7cb89463f208ddbc2920bb0da0")).unwrap();
        let public_key = private_key.public_key();
        let k = big("4c62eefd6ecfc2b95b92fd6c3d9575148afa17425546d49018e5388d49dd7b4f");

        let msg = b"encryption standard";
        let cipher = public_key.encrypt(&mut FixedSource(vec![k]), msg).unwrap();
        assert_eq!(hex::encode(cipher.to_bytes(&curve, Mode::C1C2C3)), concat!(
            "04",
            "245c26fb68b1ddddb12c4b6bf9f2b6d5fe60a383b0d18d1c4144abf17f6252e7",
            "76cb9264c2a7e88e52b19903fdc47378f605e36811f5c07423a24b84400f01b8",
            "650053a89b41c418b0c3aad00d886c00286467",
            "9c3d7360c30156fab7c80a0276712da9d8094a634b766d3a285e07480653426d",
        ));
        assert_eq!(private_key.decrypt(&cipher).unwrap(), msg);
    }

    #[test]
    fn layouts() {
        let private_key = private_key();
        let curve = private_key.curve().clone();
        let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(17), b"abc").unwrap();

        let c1c2c3 = cipher.to_bytes(&curve, Mode::C1C2C3);
        let c1c3c2 = cipher.to_bytes(&curve, Mode::C1C3C2);
        assert_eq!(c1c2c3.len(), 65 + 3 + 32);
        assert_eq!(c1c2c3[..65], c1c3c2[..65]);
        assert_eq!(c1c2c3[65..68], c1c3c2[97..]);
        assert_eq!(c1c2c3[68..], c1c3c2[65..97]);
        assert_eq!(Mode::default(), Mode::C1C2C3);

        assert_eq!(Ciphertext::from_bytes(&curve, &c1c2c3, Mode::C1C2C3).unwrap(), cipher);
        assert_eq!(Ciphertext::from_bytes(&curve, &c1c3c2, Mode::C1C3C2).unwrap(), cipher);
        // 顺序不对时校验失败
        let wrong = Ciphertext::from_bytes(&curve, &c1c3c2, Mode::C1C2C3).unwrap();
        assert!(matches!(private_key.decrypt(&wrong), Err(Error::IntegrityFailure(_))));
    }

    #[test]
    fn der() {
        let private_key = private_key();
        let curve = private_key.curve().clone();
        let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(19), b"der").unwrap();

        let der = cipher.to_der();
        assert_eq!(Ciphertext::from_der(&der).unwrap(), cipher);

        let flat = cipher.to_bytes(&curve, Mode::C1C2C3);
        assert_eq!(marshal_der(&curve, &flat).unwrap(), der);
        assert_eq!(unmarshal_der(&curve, &der).unwrap(), flat);

        assert!(matches!(Ciphertext::from_der(&der[..der.len() - 1]), Err(Error::MalformedEncoding(_))));
        let mut trailing = der.clone();
        trailing.push(0);
        assert!(matches!(Ciphertext::from_der(&trailing), Err(Error::MalformedEncoding(_))));
        // hash 不是32字节
        let short = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_u32(1);
                writer.next().write_u32(2);
                writer.next().write_bytes(&[0u8; 31]);
                writer.next().write_bytes(b"x");
            })
        });
        assert!(matches!(Ciphertext::from_der(&short), Err(Error::MalformedEncoding(_))));
    }

    #[test]
    fn der_padding() {
        // 坐标较短时仍按定长还原
        let curve = small_curve();
        let cipher = Ciphertext::new(Point::new(1u32.into(), 4u32.into()), vec![0xab], [7u8; 32]);
        let flat = cipher.to_bytes(&curve, Mode::C1C2C3);
        assert_eq!(flat[..5], [0x04, 0x00, 0x01, 0x00, 0x04]);
        assert_eq!(unmarshal_der(&curve, &cipher.to_der()).unwrap(), flat);
    }

    #[test]
    fn der_oversized() {
        // 坐标超出定长时拒绝，不截断
        let curve = Elliptic::recommended();
        let x = (BigUint::from(1u32) << 256usize) + 5u32;
        let cipher = Ciphertext::new(Point::new(x, 7u32.into()), b"m".to_vec(), [0u8; 32]);
        assert!(matches!(unmarshal_der(&curve, &cipher.to_der()), Err(Error::MalformedEncoding(_))));

        let cipher = Ciphertext::new(Point::new(7u32.into(), BigUint::from(1u32) << 256usize), b"m".to_vec(), [0u8; 32]);
        assert!(matches!(unmarshal_der(&curve, &cipher.to_der()), Err(Error::MalformedEncoding(_))));

        // 恰好占满 key_bytes 时可以还原
        let curve = small_curve();
        let cipher = Ciphertext::new(Point::new(65535u32.into(), 1u32.into()), b"m".to_vec(), [0u8; 32]);
        let der = cipher.to_der();
        let flat = unmarshal_der(&curve, &der).unwrap();
        assert_eq!(marshal_der(&curve, &flat).unwrap(), der);

        let cipher = Ciphertext::new(Point::new(65536u32.into(), 1u32.into()), b"m".to_vec(), [0u8; 32]);
        assert!(matches!(unmarshal_der(&curve, &cipher.to_der()), Err(Error::MalformedEncoding(_))));
    }

    #[test]
    fn malformed() {
        let curve = Elliptic::recommended();
        assert!(matches!(Ciphertext::from_bytes(&curve, &[0x04; 96], Mode::C1C2C3), Err(Error::MalformedEncoding(_))));

        let mut bytes = vec![0u8; 65 + 32 + 1];
        bytes[0] = 0x02;
        assert!(matches!(Ciphertext::from_bytes(&curve, &bytes, Mode::C1C2C3), Err(Error::MalformedEncoding(_))));

        // C1 不在曲线上
        bytes[0] = 0x04;
        let cipher = Ciphertext::from_bytes(&curve, &bytes, Mode::C1C2C3).unwrap();
        assert!(matches!(private_key().decrypt(&cipher), Err(Error::IntegrityFailure(_))));
    }

    #[test]
    fn tampered() {
        let private_key = private_key();
        let curve = private_key.curve().clone();
        let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(23), b"tamper").unwrap();
        let flat = cipher.to_bytes(&curve, Mode::C1C2C3);

        for i in [66, 65 + 5, flat.len() - 1, flat.len() - 32] {
            let mut bytes = flat.clone();
            bytes[i] ^= 0x01;
            let cipher = Ciphertext::from_bytes(&curve, &bytes, Mode::C1C2C3).unwrap();
            assert!(matches!(private_key.decrypt(&cipher), Err(Error::IntegrityFailure(_))), "{}", i);
        }

        // 其它私钥无法解密
        let other = PrivateKey::new(curve.clone(), BigUint::from(2u32)).unwrap();
        assert!(matches!(other.decrypt(&cipher), Err(Error::IntegrityFailure(_))));
    }

    #[test]
    fn empty() {
        let private_key = private_key();
        let curve = private_key.curve().clone();
        let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(29), b"").unwrap();
        assert!(cipher.c2().is_empty());
        assert_eq!(cipher.to_bytes(&curve, Mode::C1C2C3).len(), 97);
        assert!(private_key.decrypt(&cipher).unwrap().is_empty());
    }

    #[test]
    fn random_failure() {
        let public_key = private_key().public_key();
        assert!(matches!(public_key.encrypt(&mut BrokenRng, b"abc"), Err(Error::RandomSourceFailure(_))));
        assert!(matches!(public_key.encrypt(&mut FixedSource(vec![]), b"abc"), Err(Error::RandomSourceFailure(_))));
    }

    #[test]
    fn small_curve_round_trip() {
        let curve = Arc::new(small_curve());
        let private_key = PrivateKey::new(curve.clone(), BigUint::from(4321u32)).unwrap();
        let public_key = private_key.public_key();
        let mut rng = StdRng::seed_from_u64(31);
        for len in [1, 31, 32, 33, 100] {
            let msg = vec![0x5au8; len];
            let cipher = public_key.encrypt(&mut rng, &msg).unwrap();
            let flat = cipher.to_bytes(&curve, Mode::C1C3C2);
            assert_eq!(flat.len(), 5 + 32 + len);
            let cipher = Ciphertext::from_bytes(&curve, &flat, Mode::C1C3C2).unwrap();
            assert_eq!(private_key.decrypt(&cipher).unwrap(), msg);
        }
    }

    #[test]
    fn compare() {
        assert!(ct_eq(&[1u8; 32], &[1u8; 32]));
        let mut other = [1u8; 32];
        other[31] = 0;
        assert!(!ct_eq(&[1u8; 32], &other));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn round_trip(msg in proptest::collection::vec(any::<u8>(), 0..200), seed in any::<u64>()) {
            let private_key = private_key();
            let curve = private_key.curve().clone();
            let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(seed), &msg).unwrap();
            let der = cipher.to_der();
            let flat = unmarshal_der(&curve, &der).unwrap();
            let parsed = Ciphertext::from_bytes(&curve, &flat, Mode::C1C2C3).unwrap();
            prop_assert_eq!(private_key.decrypt(&parsed).unwrap(), msg);
        }

        #[test]
        fn tampered_tag(seed in any::<u64>(), index in 0usize..32, bit in 0u8..8) {
            let private_key = private_key();
            let cipher = private_key.public_key().encrypt(&mut StdRng::seed_from_u64(seed), b"tag").unwrap();
            let mut c3 = *cipher.c3();
            c3[index] ^= 1 << bit;
            let forged = Ciphertext::new(cipher.c1().clone(), cipher.c2().to_vec(), c3);
            prop_assert!(matches!(private_key.decrypt(&forged), Err(Error::IntegrityFailure(_))));
        }
    }
}
