fn main() {
    // Stamp the binary with its build date (exposed as cncaction::BUILD_DATE)
    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", stamp);
}
