use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 错误类型
///
/// 签名验证不通过不是错误，`verify` 返回 `false`；
/// 只有无法解析的输入才会得到 `MalformedEncoding`。
#[derive(Error, Debug)]
pub enum Error {
    /// 随机数源无法产生随机数，或者重试次数耗尽
    #[error("random source failure: {0}")]
    RandomSourceFailure(String),

    /// 曲线参数校验失败
    #[error("invalid domain parameters: {0}")]
    InvalidDomainParameters(&'static str),

    /// 签名、密文或十六进制串无法解析
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// 解密时杂凑值不匹配或C1无效，不返回任何明文
    #[error("decryption failed: {0}")]
    IntegrityFailure(&'static str),

    /// 秘钥格式或取值范围错误
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<yasna::ASN1Error> for Error {
    fn from(e: yasna::ASN1Error) -> Self {
        Error::MalformedEncoding(format!("der: {}", e))
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::MalformedEncoding(format!("hex: {}", e))
    }
}

impl From<rand::Error> for Error {
    fn from(e: rand::Error) -> Self {
        Error::RandomSourceFailure(e.to_string())
    }
}
