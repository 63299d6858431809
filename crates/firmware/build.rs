fn main() {
    // Only run linker script setup for hardware builds
    #[cfg(feature = "hardware")]
    {
        use std::env;
        use std::fs::File;
        use std::io::Write;
        use std::path::PathBuf;

        // Put `memory.x` in our output directory and ensure it's on the linker search path.
        let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
        let memory_x = include_bytes!("memory.x");

        File::create(out.join("memory.x"))
            .unwrap()
            .write_all(memory_x)
            .unwrap();

        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rerun-if-changed=memory.x");

        // defmt's linker script places the .defmt section and its markers.
        #[cfg(feature = "defmt-logging")]
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

        // The LiteX BSP (console, DRAM training) is built by the SoC generator.
        // Point LITEX_BSP_DIR at the directory holding libbase.a and liblitedram.a.
        println!("cargo:rerun-if-env-changed=LITEX_BSP_DIR");
        if let Some(bsp) = env::var_os("LITEX_BSP_DIR") {
            println!("cargo:rustc-link-search={}", PathBuf::from(bsp).display());
            println!("cargo:rustc-link-lib=static=litedram");
            println!("cargo:rustc-link-lib=static=base");
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
