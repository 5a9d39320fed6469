//! 產生傳給遠端代理的工作階段識別碼。
//!
//! 識別碼只用來在遠端服務中區分一次對話交換，不是憑證。

use rand::Rng;
use rand::rngs::OsRng;

/// 識別碼的固定長度。
pub const SESSION_ID_LEN: usize = 15;

/// 以作業系統的密碼學亂數來源產生一個 15 位數的十進位字串。
/// 每一位數都均勻取自 0–9，允許以 0 開頭。
pub fn generate() -> String {
    let mut rng = OsRng;
    (0..SESSION_ID_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
