use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Only the FT232H transport needs the vendor libraries
    if env::var_os("CARGO_FEATURE_FT232H").is_none() {
        return;
    }

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return,
    };

    // Vendor drop location can be overridden for non-standard checkouts
    let vendor_root = env::var("FTDI_VENDOR_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| manifest_dir.join("vendor-ftdi"));

    let mpsse_lib_path = vendor_root.join("FTDI MPSSE").join("build").join("Win32").join("DLL");
    let d2xx_lib_path = vendor_root.join("FTDI-D2XX-Drivers-Win-2.12.36.20U").join("x86");

    println!("cargo:rustc-link-search=native={}", mpsse_lib_path.display());
    println!("cargo:rustc-link-search=native={}", d2xx_lib_path.display());
    println!("cargo:rerun-if-env-changed=FTDI_VENDOR_DIR");

    // libmpsse.dll loads FTD2XX.dll at runtime, so both go next to the binary
    if let Ok(profile) = env::var("PROFILE") {
        let target_dir = manifest_dir
            .join("target")
            .join("i686-pc-windows-msvc")
            .join(&profile);

        if target_dir.exists() {
            let _ = fs::copy(mpsse_lib_path.join("libmpsse.dll"), target_dir.join("libmpsse.dll"));
            let _ = fs::copy(d2xx_lib_path.join("FTD2XX.dll"), target_dir.join("FTD2XX.dll"));
            println!("cargo:warning=Copied runtime DLLs to {}", target_dir.display());
        }
    }
}
