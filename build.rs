// Build script to capture the build timestamp shown by `redeploy --version`

fn main() {
    let build_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_time);

    // No rerun-if-changed: the script runs on every build so the timestamp stays current
}
