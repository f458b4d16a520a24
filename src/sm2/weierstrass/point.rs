use std::mem;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::sm2::ecc::Point;
use crate::sm2::weierstrass::field::Field;

/// Jacobian coordinates: (x, y, z)  y^2 = x^3 + axz^4 + bz^6
/// Affine coordinates: (X = x/z^2, Y = y/z^3)  Y^2 = X^3 + aX +b
///
/// 无穷远点: z = 0
#[derive(Clone, Debug)]
pub(crate) struct JacobianPoint(BigUint, BigUint, BigUint);

impl JacobianPoint {
    pub(crate) fn infinity() -> Self {
        JacobianPoint(BigUint::one(), BigUint::one(), BigUint::zero())
    }

    pub(crate) fn from_affine(point: &Point, field: &Field) -> Self {
        if point.is_infinity() {
            return JacobianPoint::infinity();
        }
        JacobianPoint(field.reduce(point.x()), field.reduce(point.y()), BigUint::one())
    }

    pub(crate) fn is_infinity(&self) -> bool {
        self.2.is_zero()
    }

    /// (x, y, z) => 2 * (x, y, z)，a 为任意系数
    /// [Formulas](https://www.hyperelliptic.org/EFD/g1p/auto-shortw-jacobian.html#doubling-dbl-1998-cmo-2)
    pub(crate) fn double(&self, field: &Field, a: &BigUint) -> Self {
        let (x, y, z) = (&self.0, &self.1, &self.2);
        if self.is_infinity() || y.is_zero() {
            return JacobianPoint::infinity();
        }

        let (alpha, beta) = (field.square(z), field.square(y));
        // delta = 4xy^2
        let delta = field.scalar_multiply(&field.multiply(x, &beta), 4);
        // t1 = az^4
        let t1 = field.multiply(a, &field.square(&alpha));
        // t2 = 8y^4
        let t2 = field.scalar_multiply(&field.square(&beta), 8);
        // gama = 3x^2 + az^4
        let gama = field.add(&field.scalar_multiply(&field.square(x), 3), &t1);
        // rx = (3x^2 + az^4)^2 - 8xy^2
        let rx = field.subtract(&field.subtract(&field.square(&gama), &delta), &delta);
        // ry = gama(delta - rx) - 8y^4
        let ry = field.subtract(&field.multiply(&field.subtract(&delta, &rx), &gama), &t2);
        // rz = (y+z)^2 - z^2 - y^2
        let rz = field.subtract(&field.subtract(&field.square(&field.add(y, z)), &alpha), &beta);

        JacobianPoint(rx, ry, rz)
    }

    /// {x1,y1,z1} + {x2,y2,z2}
    ///
    /// See https://www.hyperelliptic.org/EFD/g1p/auto-shortw-jacobian.html#addition-add-2007-bl
    ///
    /// 处理 P+P、P+(-P)、O+P 和 P+O。
    pub(crate) fn add(&self, other: &JacobianPoint, field: &Field, a: &BigUint) -> Self {
        if self.is_infinity() {
            return other.clone();
        }
        if other.is_infinity() {
            return self.clone();
        }
        let (x1, y1, z1) = (&self.0, &self.1, &self.2);
        let (x2, y2, z2) = (&other.0, &other.1, &other.2);

        let z1z1 = field.square(z1);
        let z2z2 = field.square(z2);
        let u1 = field.multiply(x1, &z2z2);
        let u2 = field.multiply(x2, &z1z1);
        let s1 = field.multiply(y1, &field.multiply(z2, &z2z2));
        let s2 = field.multiply(y2, &field.multiply(z1, &z1z1));

        let h = field.subtract(&u2, &u1);
        let r = field.subtract(&s2, &s1);
        if h.is_zero() {
            if r.is_zero() {
                return self.double(field, a);
            }
            return JacobianPoint::infinity();
        }

        let i = field.square(&field.scalar_multiply(&h, 2));
        let j = field.multiply(&h, &i);
        let r = field.scalar_multiply(&r, 2);
        let v = field.multiply(&u1, &i);

        // x3 = r^2 - j - 2v
        let x3 = field.subtract(&field.subtract(&field.square(&r), &j), &field.scalar_multiply(&v, 2));
        // y3 = r(v - x3) - 2 s1 j
        let y3 = field.subtract(
            &field.multiply(&r, &field.subtract(&v, &x3)),
            &field.scalar_multiply(&field.multiply(&s1, &j), 2),
        );
        // z3 = ((z1 + z2)^2 - z1z1 - z2z2) h
        let z3 = field.multiply(
            &field.subtract(&field.subtract(&field.square(&field.add(z1, z2)), &z1z1), &z2z2),
            &h,
        );

        JacobianPoint(x3, y3, z3)
    }

    /// Montgomery ladder，迭代次数只取决于 bits
    pub(crate) fn multiply(&self, scalar: &BigUint, bits: u64, field: &Field, a: &BigUint) -> Self {
        let digits = scalar.to_radix_le(2);
        let mut r0 = JacobianPoint::infinity();
        let mut r1 = self.clone();
        for i in (0..bits as usize).rev() {
            let bit = digits.get(i).map_or(false, |d| *d == 1);
            conditional_swap(&mut r0, &mut r1, bit);
            r1 = r0.add(&r1, field, a);
            r0 = r0.double(field, a);
            conditional_swap(&mut r0, &mut r1, bit);
        }
        r0
    }

    /// Jacobian coordinates: (x, y, z)  y^2 = x^3 + axz^4 + bz^6
    /// Affine coordinates: (X = x/z^2, Y = y/z^3)  Y^2 = X^3 + aX +b
    pub(crate) fn to_affine(&self, field: &Field) -> Point {
        if self.is_infinity() {
            return Point::infinity();
        }
        let alpha = field.invert(&self.2);
        let beta = field.square(&alpha);
        let gama = field.multiply(&alpha, &beta);

        Point::new(field.multiply(&self.0, &beta), field.multiply(&self.1, &gama))
    }
}

fn conditional_swap(r0: &mut JacobianPoint, r1: &mut JacobianPoint, swap: bool) {
    if swap {
        mem::swap(r0, r1);
    }
}
