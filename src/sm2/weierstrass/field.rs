use num_bigint::BigUint;

/// 素域 F(p) 上的运算，输入输出都在 [0, p) 内
#[derive(Clone, Copy, Debug)]
pub(crate) struct Field<'a> {
    p: &'a BigUint,
}

impl<'a> Field<'a> {
    pub(crate) fn new(p: &'a BigUint) -> Self {
        Field { p }
    }

    pub(crate) fn reduce(&self, x: &BigUint) -> BigUint {
        x % self.p
    }

    /// x + y
    pub(crate) fn add(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x + y) % self.p
    }

    /// x - y
    ///
    /// On entry: y < p.
    pub(crate) fn subtract(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x + self.p - y) % self.p
    }

    /// x * y
    pub(crate) fn multiply(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x * y) % self.p
    }

    /// x^2
    pub(crate) fn square(&self, x: &BigUint) -> BigUint {
        self.multiply(x, x)
    }

    /// k * x，k 为小整数
    pub(crate) fn scalar_multiply(&self, x: &BigUint, k: u32) -> BigUint {
        (x * k) % self.p
    }

    /// x^-1 = x^(p-2)，p 为素数
    pub(crate) fn invert(&self, x: &BigUint) -> BigUint {
        x.modpow(&(self.p - 2u32), self.p)
    }
}
