use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::sm2::core::Elliptic;
use crate::sm2::ecc::{EllipticProvider, Point};
use crate::sm2::random::{pick_k, RandomSource};
use crate::sm2::weierstrass::Weierstrass;
use crate::sm2::fixed_bytes;

// 非压缩公钥首字节
pub const UNCOMPRESSED: u8 = 0x04;

pub trait HexKey: Sized {
    fn encode(&self) -> String;
    fn decode(curve: Arc<Elliptic>, key: &str) -> Result<Self>;
}

/// 公钥 P = (x, y)
///
/// 非压缩公钥格式为 0x04 || x || y，x 和 y 各占 key_bytes 字节，推荐曲线下共65字节。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    point: Point,
    curve: Arc<Elliptic>,
}

impl PublicKey {
    /// 校验点在曲线上
    pub fn new(curve: Arc<Elliptic>, point: Point) -> Result<Self> {
        if !curve.is_on_curve(&point) {
            return Err(Error::InvalidKey(String::from("the public key is not on the curve")));
        }
        Ok(PublicKey { point, curve })
    }

    pub fn x(&self) -> &BigUint {
        self.point.x()
    }

    pub fn y(&self) -> &BigUint {
        self.point.y()
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn curve(&self) -> &Arc<Elliptic> {
        &self.curve
    }

    /// 0x04 || x || y
    pub fn to_uncompressed_bytes(&self) -> Vec<u8> {
        encode_point(&self.point, self.curve.key_bytes())
    }

    /// x || y，去掉首字节
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_uncompressed_bytes()[1..].to_vec()
    }

    pub fn from_uncompressed_bytes(curve: Arc<Elliptic>, bytes: &[u8]) -> Result<Self> {
        let point = decode_point(bytes, curve.key_bytes())?;
        PublicKey::new(curve, point)
    }

    pub fn from_bytes(curve: Arc<Elliptic>, bytes: &[u8]) -> Result<Self> {
        let mut key = Vec::with_capacity(bytes.len() + 1);
        key.push(UNCOMPRESSED);
        key.extend_from_slice(bytes);
        PublicKey::from_uncompressed_bytes(curve, &key)
    }
}

impl HexKey for PublicKey {
    fn encode(&self) -> String {
        hex::encode(self.to_uncompressed_bytes())
    }

    fn decode(curve: Arc<Elliptic>, key: &str) -> Result<Self> {
        let bytes = hex::decode(key).map_err(|_| Error::InvalidKey(String::from("the public key must be composed of hex chars")))?;
        PublicKey::from_uncompressed_bytes(curve, &bytes)
    }
}

/// 私钥 d ∈ [1, n-1]
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    d: BigUint,
    curve: Arc<Elliptic>,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("d", &"..").finish()
    }
}

impl PrivateKey {
    pub fn new(curve: Arc<Elliptic>, d: BigUint) -> Result<Self> {
        if d.is_zero() || &d >= curve.n() {
            return Err(Error::InvalidKey(String::from("the private key must be in [1, n-1]")));
        }
        Ok(PrivateKey { d, curve })
    }

    pub fn d(&self) -> &BigUint {
        &self.d
    }

    pub fn curve(&self) -> &Arc<Elliptic> {
        &self.curve
    }

    /// P = (x,y) = dG, G为基点，d为私钥
    pub fn public_key(&self) -> PublicKey {
        self.public_key_with(&Weierstrass)
    }

    pub fn public_key_with<E: EllipticProvider>(&self, ecc: &E) -> PublicKey {
        PublicKey {
            point: ecc.scalar_base_multiply(&self.curve, &self.d),
            curve: self.curve.clone(),
        }
    }

    /// 定长大端字节串
    pub fn to_bytes(&self) -> Vec<u8> {
        fixed_bytes(&self.d, self.curve.key_bytes())
    }

    pub fn from_bytes(curve: Arc<Elliptic>, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != curve.key_bytes() {
            return Err(Error::InvalidKey(format!("the private key must be {} bytes", curve.key_bytes())));
        }
        PrivateKey::new(curve, BigUint::from_bytes_be(bytes))
    }
}

impl HexKey for PrivateKey {
    fn encode(&self) -> String {
        hex::encode(self.to_bytes())
    }

    fn decode(curve: Arc<Elliptic>, key: &str) -> Result<Self> {
        let bytes = hex::decode(key).map_err(|_| Error::InvalidKey(String::from("the private key must be composed of hex chars")))?;
        PrivateKey::from_bytes(curve, &bytes)
    }
}


/// 秘钥对（d, P）d:私钥 P:公钥
#[derive(Clone, Debug)]
pub struct KeyPair(PrivateKey, PublicKey);

impl KeyPair {
    pub fn private_key(&self) -> &PrivateKey {
        &self.0
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.1
    }
}

impl From<PrivateKey> for KeyPair {
    fn from(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        KeyPair(private_key, public_key)
    }
}

/// 秘钥生成器
pub struct KeyGenerator<E: EllipticProvider = Weierstrass> {
    ecc: E,
    curve: Arc<Elliptic>,
}

impl KeyGenerator<Weierstrass> {
    pub fn new(curve: Arc<Elliptic>) -> Self {
        KeyGenerator { ecc: Weierstrass, curve }
    }
}

impl<E: EllipticProvider> KeyGenerator<E> {
    pub fn with_provider(ecc: E, curve: Arc<Elliptic>) -> Self {
        KeyGenerator { ecc, curve }
    }

    pub fn gen_key_pair<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Result<KeyPair> {
        let private_key = self.gen_private_key(rng)?;
        let public_key = private_key.public_key_with(&self.ecc);
        Ok(KeyPair(private_key, public_key))
    }

    /// 生成私钥
    ///
    /// d ∈ [1, n-2]，保证签名时 1+d 在模 n 下可逆
    fn gen_private_key<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Result<PrivateKey> {
        let upper = self.curve.n() - BigUint::one();
        let d = pick_k(rng, &upper)?;
        PrivateKey::new(self.curve.clone(), d)
    }
}


/// 0x04 || x || y
pub(crate) fn encode_point(point: &Point, width: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + 2 * width);
    bytes.push(UNCOMPRESSED);
    bytes.extend(fixed_bytes(point.x(), width));
    bytes.extend(fixed_bytes(point.y(), width));
    bytes
}

/// 解析非压缩点，只检查格式，不检查是否在曲线上
pub(crate) fn decode_point(bytes: &[u8], width: usize) -> Result<Point> {
    if bytes.len() != 1 + 2 * width {
        return Err(Error::MalformedEncoding(format!("an uncompressed point must be {} bytes", 1 + 2 * width)));
    }
    if bytes[0] != UNCOMPRESSED {
        return Err(Error::MalformedEncoding(String::from("only uncompressed points are supported")));
    }
    Ok(Point::new(
        BigUint::from_bytes_be(&bytes[1..1 + width]),
        BigUint::from_bytes_be(&bytes[1 + width..]),
    ))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::sm2::core::tests::small_curve;
    use crate::sm2::random::tests::BrokenRng;

    const PRK: &str = "6aea1ccf610488aaa7fddba3dd6d76d3bdfd50f957d847be3d453defb695f28e";
    const PUK: &str = "04a8af64e38eea41c254df769b5b41fbaa2d77b226b301a2636d463c52b46c777230ad1714e686dd641b9e04596530b38f6a64215b0ed3b081f8641724c5443a6e";

    #[test]
    fn main() {
        let generator = KeyGenerator::new(Arc::new(Elliptic::recommended()));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5 {
            let pair = generator.gen_key_pair(&mut rng).unwrap();
            let d = pair.private_key().d();
            assert!(!d.is_zero() && d < &(pair.private_key().curve().n() - 1u32));
            assert_eq!(pair.private_key().public_key(), *pair.public_key());
            assert!(pair.public_key().curve().is_on_curve(pair.public_key().point()));
        }
    }

    #[test]
    fn generator() {
        let curve = Arc::new(Elliptic::recommended());
        let private_key = PrivateKey::decode(curve.clone(), PRK).unwrap();
        let public_key = private_key.public_key();

        assert_eq!(private_key.d().to_string(), "48358803002808206747871163666773640956067045543241775523137833706911222329998");
        assert_eq!(public_key.x().to_string(), "76298453107918256108319614943154283626396976993715724710320433578462434588530");
        assert_eq!(public_key.y().to_string(), "22016840577845663905050918262284081863871275223913804750000840645022838962798");

        assert_eq!(private_key.encode(), PRK);
        assert_eq!(public_key.encode(), PUK);
        assert_eq!(public_key.to_bytes(), hex::decode(&PUK[2..]).unwrap());

        let pair = KeyPair::from(private_key.clone());
        assert_eq!(pair.public_key(), &public_key);
        assert_eq!(pair.private_key(), &private_key);
    }

    #[test]
    fn key() {
        let curve = Arc::new(Elliptic::recommended());
        let public_key = PublicKey::decode(curve.clone(), PUK).unwrap();
        assert_eq!(public_key.x().to_string(), "76298453107918256108319614943154283626396976993715724710320433578462434588530");
        assert_eq!(PublicKey::from_bytes(curve.clone(), &public_key.to_bytes()).unwrap(), public_key);

        // 格式错误
        assert!(PublicKey::decode(curve.clone(), &PUK[2..]).is_err());
        assert!(PublicKey::decode(curve.clone(), &format!("05{}", &PUK[2..])).is_err());
        assert!(PublicKey::decode(curve.clone(), "zz").is_err());
        // 不在曲线上
        let mut bad = PUK.to_string();
        bad.replace_range(128.., "6f");
        assert!(matches!(PublicKey::decode(curve.clone(), &bad), Err(Error::InvalidKey(_))));

        assert!(PrivateKey::decode(curve.clone(), &PRK[2..]).is_err());
        assert!(PrivateKey::new(curve.clone(), BigUint::zero()).is_err());
        assert!(PrivateKey::new(curve.clone(), curve.n().clone()).is_err());
        assert!(PrivateKey::new(curve.clone(), curve.n() - 1u32).is_ok());
    }

    #[test]
    fn padding() {
        // 坐标不足 key_bytes 时左侧补零
        let curve = Arc::new(small_curve());
        let private_key = PrivateKey::new(curve.clone(), BigUint::from(1u32)).unwrap();
        let public_key = private_key.public_key();
        assert_eq!(public_key.to_uncompressed_bytes(), vec![0x04, 0x00, 0x01, 0x00, 0x04]);
        assert_eq!(private_key.to_bytes(), vec![0x00, 0x01]);
        assert_eq!(PrivateKey::from_bytes(curve, &[0x00, 0x01]).unwrap(), private_key);
    }

    #[test]
    fn debug_hides_secret() {
        let curve = Arc::new(Elliptic::recommended());
        let private_key = PrivateKey::decode(curve, PRK).unwrap();
        assert!(!format!("{:?}", private_key).contains("48358803"));
    }

    #[test]
    fn broken_rng() {
        let generator = KeyGenerator::new(Arc::new(Elliptic::recommended()));
        assert!(matches!(generator.gen_key_pair(&mut BrokenRng), Err(Error::RandomSourceFailure(_))));
    }
}
