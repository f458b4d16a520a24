use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::sm2::core::Elliptic;
use crate::sm2::ecc::EllipticProvider;
use crate::sm2::key::{PrivateKey, PublicKey};
use crate::sm2::random::{pick_k, RandomSource};
use crate::sm2::weierstrass::Weierstrass;
use crate::sm2::{fixed_bytes, minimal_bytes};
use crate::sm3::Crypto;

/// 未指定用户ID时使用的默认值
pub const DEFAULT_USER_ID: &[u8] = b"1234567812345678";

// ENTL 为16位，ID 最长 8191 字节
const MAX_USER_ID_LEN: usize = (u16::MAX as usize) / 8;

// 选取 k 的最大次数
const MAX_RETRIES: usize = 64;

/// 签名 (r, s)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Signature { r, s }
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// SEQUENCE { r INTEGER, s INTEGER }
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_biguint(&self.r);
                writer.next().write_biguint(&self.s);
            })
        })
    }

    /// 严格 DER 解析：拒绝多余字节、非最短整数、负数以及元素个数不符
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let signature = yasna::parse_der(der, |reader| {
            reader.read_sequence(|reader| {
                let r = reader.next().read_biguint()?;
                let s = reader.next().read_biguint()?;
                Ok(Signature { r, s })
            })
        })?;
        Ok(signature)
    }

    /// r || s，各占 key_bytes 字节
    pub fn to_bytes(&self, curve: &Elliptic) -> Vec<u8> {
        let mut bytes = fixed_bytes(&self.r, curve.key_bytes());
        bytes.extend(fixed_bytes(&self.s, curve.key_bytes()));
        bytes
    }

    pub fn from_bytes(curve: &Elliptic, bytes: &[u8]) -> Result<Self> {
        let width = curve.key_bytes();
        if bytes.len() != 2 * width {
            return Err(Error::MalformedEncoding(format!("the signature must be {} bytes", 2 * width)));
        }
        Ok(Signature {
            r: BigUint::from_bytes_be(&bytes[..width]),
            s: BigUint::from_bytes_be(&bytes[width..]),
        })
    }
}


/// Z = SM3(ENTL || ID || a || b || xG || yG || xA || yA)
pub fn z(curve: &Elliptic, public_key: &PublicKey, user_id: &[u8]) -> Result<[u8; 32]> {
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(Error::InvalidKey(format!("the user id must not exceed {} bytes", MAX_USER_ID_LEN)));
    }
    let entl = (user_id.len() * 8) as u16;

    let mut hasher = Crypto::new();
    hasher.update(&entl.to_be_bytes());
    hasher.update(user_id);
    for v in [curve.a(), curve.b(), curve.gx(), curve.gy(), public_key.x(), public_key.y()] {
        hasher.update(&minimal_bytes(v));
    }
    Ok(hasher.finalize())
}

/// e = SM3(Z || M)
fn e(curve: &Elliptic, public_key: &PublicKey, user_id: &[u8], msg: &[u8]) -> Result<BigUint> {
    let mut hasher = Crypto::new();
    hasher.update(&z(curve, public_key, user_id)?);
    hasher.update(msg);
    Ok(BigUint::from_bytes_be(&hasher.finalize()))
}

/// 签名
///
/// 1. e = SM3(Z || M)
/// 2. 随机选取 k ∈ [1, n-1]，(x1, y1) = kG
/// 3. r = (e + x1) mod n，若 r = 0 或 r + k = n 则重新选取 k
/// 4. s = (1 + d)^-1 * (k - r * d) mod n，若 s = 0 则重新选取 k
pub fn sign<E, R>(ecc: &E, rng: &mut R, private_key: &PrivateKey, user_id: Option<&[u8]>, msg: &[u8]) -> Result<Signature>
where
    E: EllipticProvider,
    R: RandomSource + ?Sized,
{
    let curve = private_key.curve();
    let (n, d) = (curve.n(), private_key.d());

    let d1 = (d + BigUint::one()) % n;
    if d1.is_zero() {
        return Err(Error::InvalidKey(String::from("1 + d is not invertible")));
    }
    // n 为素数，(1 + d)^-1 = (1 + d)^(n-2)
    let d1_inv = d1.modpow(&(n - 2u32), n);

    let public_key = private_key.public_key_with(ecc);
    let e = e(curve, &public_key, user_id.unwrap_or(DEFAULT_USER_ID), msg)?;

    for _ in 0..MAX_RETRIES {
        let k = pick_k(rng, n)?;
        let p1 = ecc.scalar_base_multiply(curve, &k);

        let r = (&e + p1.x()) % n;
        if r.is_zero() || &(&r + &k) == n {
            tracing::debug!("degenerate r, choosing another k");
            continue;
        }

        let rd = (&r * d) % n;
        let s = (&d1_inv * ((&k + n - rd) % n)) % n;
        if s.is_zero() {
            tracing::debug!("degenerate s, choosing another k");
            continue;
        }
        return Ok(Signature { r, s });
    }
    Err(Error::RandomSourceFailure(String::from("no usable k after retries")))
}

/// 验签，任何不通过的情况都返回 false
///
/// 1. r, s ∈ [1, n-1]
/// 2. t = (r + s) mod n，t ≠ 0
/// 3. (x1, y1) = sG + tP
/// 4. R = (e + x1) mod n，R = r 则通过
pub fn verify<E: EllipticProvider>(ecc: &E, public_key: &PublicKey, user_id: Option<&[u8]>, msg: &[u8], signature: &Signature) -> bool {
    let curve = public_key.curve();
    let n = curve.n();
    let (r, s) = (&signature.r, &signature.s);

    if r.is_zero() || r >= n || s.is_zero() || s >= n {
        return false;
    }
    let e = match e(curve, public_key, user_id.unwrap_or(DEFAULT_USER_ID), msg) {
        Ok(e) => e,
        Err(_) => return false,
    };

    let t = (r + s) % n;
    if t.is_zero() {
        return false;
    }

    let sg = ecc.scalar_base_multiply(curve, s);
    let tp = ecc.scalar_multiply(curve, public_key.point(), &t);
    let p1 = ecc.add(curve, &sg, &tp);
    if ecc.is_infinity(&p1) {
        return false;
    }
    &((e + p1.x()) % n) == r
}


impl PrivateKey {
    /// 使用默认的群运算签名，`user_id` 为空时使用默认ID
    pub fn sign<R: RandomSource + ?Sized>(&self, rng: &mut R, user_id: Option<&[u8]>, msg: &[u8]) -> Result<Signature> {
        sign(&Weierstrass, rng, self, user_id, msg)
    }
}

impl PublicKey {
    pub fn verify(&self, user_id: Option<&[u8]>, msg: &[u8], signature: &Signature) -> bool {
        verify(&Weierstrass, self, user_id, msg, signature)
    }

    /// 签名无法解析时返回错误，验证不通过返回 `Ok(false)`
    pub fn verify_der(&self, user_id: Option<&[u8]>, msg: &[u8], der: &[u8]) -> Result<bool> {
        let signature = Signature::from_der(der)?;
        Ok(self.verify(user_id, msg, &signature))
    }
}
