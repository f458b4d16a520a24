// 初始值，用于确定压缩函数寄存器的初态
pub(crate) const IV: [u32; 8] = [0x7380_166f, 0x4914_b2b9, 0x1724_42d7, 0xda8a_0600, 0xa96f_30bc, 0x1631_38aa, 0xe38d_ee4d, 0xb0fb_0e4e];

pub const BLOCK_SIZE: usize = 64;
pub const DIGEST_SIZE: usize = 32;

const T0: u32 = 0x79cc_4519;
const T1: u32 = 0x7a87_9d8a;

fn ff0(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

fn ff1(x: u32, y: u32, z: u32) -> u32 {
    (x | y) & (x | z) & (y | z)
}

fn gg0(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

fn gg1(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

/// 压缩函数中的置换函数
fn p0(x: u32) -> u32 {
    x ^ x.rotate_left(9) ^ x.rotate_left(17)
}

/// 消息扩展中的置换函数
fn p1(x: u32) -> u32 {
    x ^ x.rotate_left(15) ^ x.rotate_left(23)
}


/// 假设消息m的长度为l 比特。首先将比特“1”添加到消息的末尾，再添加k 个“0”，
/// k是满足l + 1 + k ≡ 448mod512 的最小的非负整数。然后再添加一个64位比特串，该比特串是长度l的二进制表示。
/// 填充后的消息m′的比特长度为512的倍数。
/// 例如:对消息01100001 01100010 01100011，其长度l=24，经填充得到比特串:
/// 01100001 01100010 01100011 1 {00 · · · 00}(423比特) {00 · · · 011000}(64比特，l的二进制表示)
pub fn pad(data: &[u8]) -> Vec<u8> {
    let l = (data.len() as u64).wrapping_shl(3);
    let mut padded = Vec::with_capacity(data.len() + 72);
    padded.extend_from_slice(data);
    // 将'10000000'添加到数据的末尾
    padded.push(0x80);
    // l + 8 + k = 448 mod 512
    while padded.len() % BLOCK_SIZE != 56 {
        padded.push(0x00);
    }
    // 填充l的二进制表示，长度64位；填充后的数据总长度为512 * N位。
    padded.extend_from_slice(&l.to_be_bytes());
    padded
}

/// 消息扩展
///
/// 将消息分组B(i)按以下方法扩展生成132个字W0, W1, · · · , W67, W0′, W1′, · · · , W63′:
///     a)将消息分组B(i)划分为16个字W0, W1, · · · , W15。
///     b)FOR j=16 TO 67
///         Wj ← P1(Wj−16 ⊕Wj−9 ⊕(Wj−3 ≪ 15))⊕(Wj−13 ≪ 7)⊕Wj−6
///     c)FOR j=0 TO 63
///         Wj′ =Wj ⊕Wj+4
///
/// On entry: block.len() == 64.
pub(crate) fn expand(block: &[u8]) -> ([u32; 68], [u32; 64]) {
    let mut w1: [u32; 68] = [0; 68];
    let mut w2: [u32; 64] = [0; 64];
    for (i, word) in block.chunks_exact(4).take(16).enumerate() {
        w1[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
    for i in 16..68 {
        w1[i] = p1(w1[i - 16] ^ w1[i - 9] ^ w1[i - 3].rotate_left(15))
            ^ w1[i - 13].rotate_left(7)
            ^ w1[i - 6];
    }
    for i in 0..64 {
        w2[i] = w1[i] ^ w1[i + 4];
    }
    (w1, w2)
}

/// 压缩函数 V(i+1) = CF(V(i), B(i))
///
/// ```text
///     ABCDEFGH ← V (i)
///     FOR j=0 TO 63
///         SS1←((A≪12)+E+(Tj ≪j))≪7 SS2 ← SS1⊕(A ≪ 12)
///         TT1 ← FFj (A, B, C) + D + SS2 + Wj′
///         TT2 ← GGj (E, F, G) + H + SS1 + Wj
///         D←C, C←B≪9, B←A, A←TT1
///         H←G, G ← F ≪ 19, F←E, E ← P0(TT2)
///     V(i+1) ← ABCDEFGH⊕V(i)
/// ```
pub(crate) fn compress(registers: &mut [u32; 8], block: &[u8]) {
    let (w1, w2) = expand(block);

    let [mut ra, mut rb, mut rc, mut rd, mut re, mut rf, mut rg, mut rh] = *registers;

    for j in 0..64 {
        let (t, ff, gg): (u32, fn(u32, u32, u32) -> u32, fn(u32, u32, u32) -> u32) = if j < 16 {
            (T0, ff0, gg0)
        } else {
            (T1, ff1, gg1)
        };
        // rotate_left takes the amount mod 32
        let ss1 = ra.rotate_left(12)
            .wrapping_add(re)
            .wrapping_add(t.rotate_left(j as u32))
            .rotate_left(7);
        let ss2 = ss1 ^ ra.rotate_left(12);
        let tt1 = ff(ra, rb, rc)
            .wrapping_add(rd)
            .wrapping_add(ss2)
            .wrapping_add(w2[j]);
        let tt2 = gg(re, rf, rg)
            .wrapping_add(rh)
            .wrapping_add(ss1)
            .wrapping_add(w1[j]);
        rd = rc;
        rc = rb.rotate_left(9);
        rb = ra;
        ra = tt1;
        rh = rg;
        rg = rf.rotate_left(19);
        rf = re;
        re = p0(tt2);
    }

    for (v, r) in registers.iter_mut().zip([ra, rb, rc, rd, re, rf, rg, rh]) {
        *v ^= r;
    }
}


/// SM3 杂凑上下文
///
/// 每个实例独立持有状态，可以在多个线程中各自使用。
#[derive(Clone, Debug)]
pub struct Crypto {
    registers: [u32; 8],
    // 不足一个分组的待处理数据
    buffer: [u8; BLOCK_SIZE],
    offset: usize,
    // 已输入的字节数
    length: u64,
}

impl Default for Crypto {
    fn default() -> Self {
        Crypto::new()
    }
}

impl Crypto {
    pub fn new() -> Self {
        Crypto {
            registers: IV,
            buffer: [0; BLOCK_SIZE],
            offset: 0,
            length: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Crypto::new();
    }

    /// 追加任意长度的数据，满一个分组立即压缩，剩余部分缓存
    pub fn update(&mut self, data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        let mut data = data;

        if self.offset > 0 {
            let take = (BLOCK_SIZE - self.offset).min(data.len());
            self.buffer[self.offset..self.offset + take].copy_from_slice(&data[..take]);
            self.offset += take;
            data = &data[take..];
            if self.offset < BLOCK_SIZE {
                return;
            }
            compress(&mut self.registers, &self.buffer);
            self.offset = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            compress(&mut self.registers, block);
        }
        let rest = blocks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.offset = rest.len();
    }

    /// 输出256比特的哈希值，作用在状态的副本上，不影响后续的 `update`
    pub fn finalize(&self) -> [u8; DIGEST_SIZE] {
        self.clone().finish()
    }

    /// 输出哈希值并重置上下文
    pub fn finalize_reset(&mut self) -> [u8; DIGEST_SIZE] {
        let hash = self.finalize();
        self.reset();
        hash
    }

    fn finish(mut self) -> [u8; DIGEST_SIZE] {
        let l = self.length.wrapping_shl(3);
        // 填充后的尾部最多两个分组
        let mut tail = [0u8; BLOCK_SIZE * 2];
        tail[..self.offset].copy_from_slice(&self.buffer[..self.offset]);
        tail[self.offset] = 0x80;
        let size = if self.offset < 56 { BLOCK_SIZE } else { BLOCK_SIZE * 2 };
        tail[size - 8..size].copy_from_slice(&l.to_be_bytes());

        for block in tail[..size].chunks_exact(BLOCK_SIZE) {
            compress(&mut self.registers, block);
        }
        self.output()
    }

    /// 大端模式：[u32; 8] -> [u8; 32]
    fn output(&self) -> [u8; DIGEST_SIZE] {
        let mut hash = [0u8; DIGEST_SIZE];
        for (dst, e) in hash.chunks_exact_mut(4).zip(self.registers.iter()) {
            dst.copy_from_slice(&e.to_be_bytes());
        }
        hash
    }
}
