use std::cmp::Ordering;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;

use crate::sm2::core::Elliptic;

/// 仿射坐标下的点，无穷远点记为 (0, 0)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point(BigUint, BigUint);

impl Point {
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Point(x, y)
    }

    pub fn infinity() -> Self {
        Point(BigUint::zero(), BigUint::zero())
    }

    pub fn x(&self) -> &BigUint {
        &self.0
    }

    pub fn y(&self) -> &BigUint {
        &self.1
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_zero() && self.1.is_zero()
    }
}

/// 椭圆曲线群运算
///
/// 曲线参数由调用方显式传入，实现本身不持有状态。
pub trait EllipticProvider {
    /// 点加 P + Q
    fn add(&self, curve: &Elliptic, p: &Point, q: &Point) -> Point;
    /// 标量乘法 kP
    fn scalar_multiply(&self, curve: &Elliptic, point: &Point, scalar: &BigUint) -> Point;
    /// 基点标量乘法 kG
    fn scalar_base_multiply(&self, curve: &Elliptic, scalar: &BigUint) -> Point {
        self.scalar_multiply(curve, &curve.base(), &self.scalar_reduce(curve, scalar))
    }

    fn is_infinity(&self, point: &Point) -> bool {
        point.is_infinity()
    }

    /// 标量缩小：小于循环子群的阶
    fn scalar_reduce(&self, curve: &Elliptic, scalar: &BigUint) -> BigUint {
        // compare scalar and order, n = (scalar mod order) if scalar >= order else scalar
        match scalar.cmp(curve.n()) {
            Ordering::Less => scalar.clone(),
            _ => scalar.mod_floor(curve.n()),
        }
    }
}
