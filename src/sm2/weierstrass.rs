use num_bigint::BigUint;
use num_traits::Zero;

use crate::sm2::core::Elliptic;
use crate::sm2::ecc::{EllipticProvider, Point};
use crate::sm2::weierstrass::field::Field;
use crate::sm2::weierstrass::point::JacobianPoint;

mod field;
mod point;

/// 短 Weierstrass 曲线 y^2 = x^3 + ax + b 上的通用群运算
///
/// 使用 Jacobian 坐标，系数 a 任意（不要求 a = -3）。
#[derive(Clone, Copy, Debug, Default)]
pub struct Weierstrass;

impl EllipticProvider for Weierstrass {
    fn add(&self, curve: &Elliptic, p: &Point, q: &Point) -> Point {
        let field = Field::new(curve.p());
        let p = JacobianPoint::from_affine(p, &field);
        let q = JacobianPoint::from_affine(q, &field);
        p.add(&q, &field, curve.a()).to_affine(&field)
    }

    fn scalar_multiply(&self, curve: &Elliptic, point: &Point, scalar: &BigUint) -> Point {
        if point.is_infinity() || scalar.is_zero() {
            return Point::infinity();
        }
        let field = Field::new(curve.p());
        let bits = scalar.bits().max(curve.n().bits());
        JacobianPoint::from_affine(point, &field)
            .multiply(scalar, bits, &field, curve.a())
            .to_affine(&field)
    }
}
