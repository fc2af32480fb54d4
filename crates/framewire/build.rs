fn main() {
    for (var, exported) in [
        ("TARGET", "FRAMEWIRE_BUILD_TARGET"),
        ("PROFILE", "FRAMEWIRE_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
