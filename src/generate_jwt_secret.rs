// generate_jwt_secret.rs
// Utility to generate a new JWT signing secret

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;

fn main() {
    println!("Generating new JWT signing secret...\n");

    let mut bytes = [0u8; 48];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let secret = BASE64.encode(bytes);

    println!("✅ Secret generated successfully!\n");
    println!("Add this to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("JWT_SECRET={}", secret);
    println!("─────────────────────────────────────────────────");
    println!("\n⚠️  IMPORTANT:");
    println!("  • Keep this secret out of version control");
    println!("  • Rotating it invalidates every token issued so far");
}
