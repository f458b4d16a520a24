use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::sm2::ecc::{EllipticProvider, Point};
use crate::sm2::weierstrass::Weierstrass;

// SM2椭圆曲线公钥密码算法推荐曲线参数
const EC_P: [u8; 32] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];
const EC_A: [u8; 32] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfc,
];
const EC_B: [u8; 32] = [
    0x28, 0xe9, 0xfa, 0x9e, 0x9d, 0x9f, 0x5e, 0x34,
    0x4d, 0x5a, 0x9e, 0x4b, 0xcf, 0x65, 0x09, 0xa7,
    0xf3, 0x97, 0x89, 0xf5, 0x15, 0xab, 0x8f, 0x92,
    0xdd, 0xbc, 0xbd, 0x41, 0x4d, 0x94, 0x0e, 0x93,
];
const EC_GX: [u8; 32] = [
    0x32, 0xc4, 0xae, 0x2c, 0x1f, 0x19, 0x81, 0x19,
    0x5f, 0x99, 0x04, 0x46, 0x6a, 0x39, 0xc9, 0x94,
    0x8f, 0xe3, 0x0b, 0xbf, 0xf2, 0x66, 0x0b, 0xe1,
    0x71, 0x5a, 0x45, 0x89, 0x33, 0x4c, 0x74, 0xc7,
];
const EC_GY: [u8; 32] = [
    0xbc, 0x37, 0x36, 0xa2, 0xf4, 0xf6, 0x77, 0x9c,
    0x59, 0xbd, 0xce, 0xe3, 0x6b, 0x69, 0x21, 0x53,
    0xd0, 0xa9, 0x87, 0x7c, 0xc6, 0x2a, 0x47, 0x40,
    0x02, 0xdf, 0x32, 0xe5, 0x21, 0x39, 0xf0, 0xa0,
];
const EC_N: [u8; 32] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x72, 0x03, 0xdf, 0x6b, 0x21, 0xc6, 0x05, 0x2b,
    0x53, 0xbb, 0xf4, 0x09, 0x39, 0xd5, 0x41, 0x23,
];

// Miller-Rabin 的固定底数
const WITNESSES: [u32; 20] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71];

/// 椭圆曲线参数
///
/// y^2 = x^3 + ax + b (mod p)，基点 G(gx, gy)，阶 n，余因子 h = 1。
/// 构造之后不可修改，通过 `Arc` 在秘钥和线程间共享。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Elliptic {
    // the order of the finite field
    p: BigUint,
    // the constant a and b of the curve equation
    a: BigUint,
    b: BigUint,
    // the base point g(gx, gy) and its order n
    gx: BigUint,
    gy: BigUint,
    n: BigUint,
    bits: usize,
}

impl Elliptic {
    /// 使用推荐参数，参数已知有效，不再校验
    pub fn recommended() -> Self {
        Elliptic {
            p: BigUint::from_bytes_be(&EC_P),
            a: BigUint::from_bytes_be(&EC_A),
            b: BigUint::from_bytes_be(&EC_B),
            gx: BigUint::from_bytes_be(&EC_GX),
            gy: BigUint::from_bytes_be(&EC_GY),
            n: BigUint::from_bytes_be(&EC_N),
            bits: 256,
        }
    }

    /// 使用给定参数构造曲线并校验
    pub fn new(p: BigUint, a: BigUint, b: BigUint, gx: BigUint, gy: BigUint, n: BigUint, bits: usize) -> Result<Self> {
        let elliptic = Elliptic { p, a, b, gx, gy, n, bits };
        elliptic.validate()?;
        Ok(elliptic)
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn a(&self) -> &BigUint {
        &self.a
    }

    pub fn b(&self) -> &BigUint {
        &self.b
    }

    pub fn gx(&self) -> &BigUint {
        &self.gx
    }

    pub fn gy(&self) -> &BigUint {
        &self.gy
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// 基点 G
    pub fn base(&self) -> Point {
        Point::new(self.gx.clone(), self.gy.clone())
    }

    /// 余因子 h
    pub fn cofactor(&self) -> BigUint {
        BigUint::one()
    }

    /// 坐标和私钥的定长字节数
    pub fn key_bytes(&self) -> usize {
        (self.bits + 7) / 8
    }

    /// y^2 = x^3 + ax + b (mod p)，无穷远点不在曲线上
    pub fn is_on_curve(&self, point: &Point) -> bool {
        if point.is_infinity() {
            return false;
        }
        let (x, y) = (point.x(), point.y());
        if x >= &self.p || y >= &self.p {
            return false;
        }
        let left = (y * y).mod_floor(&self.p);
        let right = (x * x * x + &self.a * x + &self.b).mod_floor(&self.p);
        left == right
    }

    /// 校验曲线参数：p、n 为素数，曲线非奇异，G 在曲线上且 nG = O
    pub fn validate(&self) -> Result<()> {
        ensure(is_probable_prime(&self.p), "field modulus is not prime")?;
        ensure(self.bits == self.p.bits() as usize, "bit size does not match the field modulus")?;
        ensure(is_probable_prime(&self.n), "group order is not prime")?;
        ensure(self.a < self.p && self.b < self.p, "curve coefficients are not reduced")?;
        ensure(!self.is_singular(), "curve is singular")?;
        ensure(self.is_on_curve(&self.base()), "base point is not on the curve")?;
        ensure(
            Weierstrass.scalar_multiply(self, &self.base(), &self.n).is_infinity(),
            "base point order does not match",
        )
    }

    /// 4a^3 + 27b^2 = 0 (mod p)
    fn is_singular(&self) -> bool {
        let a3 = &self.a * &self.a * &self.a;
        let b2 = &self.b * &self.b;
        (a3 * 4u32 + b2 * 27u32).mod_floor(&self.p).is_zero()
    }
}

fn ensure(ok: bool, reason: &'static str) -> Result<()> {
    if ok {
        return Ok(());
    }
    tracing::debug!(reason, "domain parameters rejected");
    Err(Error::InvalidDomainParameters(reason))
}

/// Miller-Rabin 素性检测
fn is_probable_prime(n: &BigUint) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for w in WITNESSES {
        let w = BigUint::from(w);
        if n == &w {
            return true;
        }
        if (n % &w).is_zero() {
            return false;
        }
    }

    // n - 1 = d * 2^s
    let n1 = n - 1u32;
    let s = n1.trailing_zeros().unwrap_or(0);
    let d = &n1 >> s;

    'witness: for w in WITNESSES {
        let mut x = BigUint::from(w).modpow(&d, n);
        if x.is_one() || x == n1 {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
