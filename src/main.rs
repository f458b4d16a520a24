use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

use yarism::error::{Error, Result};
use yarism::sm2::cipher::{Ciphertext, Mode};
use yarism::sm2::key::{HexKey, KeyGenerator, PrivateKey, PublicKey};
use yarism::sm2::Elliptic;
use yarism::sm3;

#[derive(Parser, Debug)]
#[command(name = "yarism", version, about = "SM2 签名和加解密，SM3 杂凑")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SM3 杂凑
    #[command(subcommand)]
    Sm3(Sm3Command),
    /// SM2 秘钥、签名和加解密
    #[command(subcommand)]
    Sm2(Sm2Command),
}

#[derive(Subcommand, Debug)]
enum Sm3Command {
    /// 输出每个输入的摘要
    Compute {
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum Sm2Command {
    /// 在推荐曲线上生成秘钥对
    Keygen,
    /// 签名，输出 DER 编码签名的十六进制串
    Sign {
        /// 十六进制私钥
        #[arg(short, long)]
        key: String,
        /// 用户ID，默认为 1234567812345678
        #[arg(long)]
        id: Option<String>,
        message: String,
    },
    /// 验证 DER 编码的签名
    Verify {
        /// 十六进制公钥，04 || x || y
        #[arg(short, long)]
        key: String,
        #[arg(long)]
        id: Option<String>,
        /// 十六进制 DER 签名
        #[arg(short, long)]
        signature: String,
        message: String,
    },
    /// 加密，输出密文的十六进制串
    Encrypt {
        #[arg(short, long)]
        key: String,
        #[arg(long, value_enum, default_value_t = Layout::C1c2c3)]
        mode: Layout,
        /// 输出 DER 编码而不是平铺密文
        #[arg(long)]
        der: bool,
        message: String,
    },
    /// 解密十六进制密文
    Decrypt {
        #[arg(short, long)]
        key: String,
        #[arg(long, value_enum, default_value_t = Layout::C1c2c3)]
        mode: Layout,
        #[arg(long)]
        der: bool,
        /// 以十六进制输出明文，用于非 UTF-8 的明文
        #[arg(long)]
        hex: bool,
        cipher: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Layout {
    C1c2c3,
    C1c3c2,
}

impl From<Layout> for Mode {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::C1c2c3 => Mode::C1C2C3,
            Layout::C1c3c2 => Mode::C1C3C2,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Sm3(Sm3Command::Compute { inputs }) => {
            for input in inputs {
                println!("{}* {}", sm3::digest(&input), input);
            }
            Ok(())
        }
        Command::Sm2(command) => run_sm2(command),
    }
}

fn run_sm2(command: Sm2Command) -> Result<()> {
    let curve = Arc::new(Elliptic::recommended());
    match command {
        Sm2Command::Keygen => {
            let pair = KeyGenerator::new(curve).gen_key_pair(&mut OsRng)?;
            println!("private key: {}", pair.private_key().encode());
            println!("public key:  {}", pair.public_key().encode());
        }
        Sm2Command::Sign { key, id, message } => {
            let private_key = PrivateKey::decode(curve, &key)?;
            let signature = private_key.sign(&mut OsRng, id.as_deref().map(str::as_bytes), message.as_bytes())?;
            println!("{}", hex::encode(signature.to_der()));
        }
        Sm2Command::Verify { key, id, signature, message } => {
            let public_key = PublicKey::decode(curve, &key)?;
            let ok = public_key.verify_der(id.as_deref().map(str::as_bytes), message.as_bytes(), &hex::decode(signature)?)?;
            tracing::info!(ok, "signature checked");
            println!("{}", ok);
        }
        Sm2Command::Encrypt { key, mode, der, message } => {
            let public_key = PublicKey::decode(curve.clone(), &key)?;
            let cipher = public_key.encrypt(&mut OsRng, message.as_bytes())?;
            let bytes = if der { cipher.to_der() } else { cipher.to_bytes(&curve, mode.into()) };
            println!("{}", hex::encode(bytes));
        }
        Sm2Command::Decrypt { key, mode, der, hex: as_hex, cipher } => {
            let private_key = PrivateKey::decode(curve.clone(), &key)?;
            let bytes = hex::decode(cipher)?;
            let cipher = if der {
                Ciphertext::from_der(&bytes)?
            } else {
                Ciphertext::from_bytes(&curve, &bytes, mode.into())?
            };
            let plain = private_key.decrypt(&cipher)?;
            println!("{}", render(plain, as_hex)?);
        }
    }
    Ok(())
}

/// 明文不是 UTF-8 时报错，除非要求十六进制输出
fn render(plain: Vec<u8>, as_hex: bool) -> Result<String> {
    if as_hex {
        return Ok(hex::encode(plain));
    }
    String::from_utf8(plain).map_err(|_| Error::MalformedEncoding(String::from("the plaintext is not valid utf-8, use --hex")))
}
