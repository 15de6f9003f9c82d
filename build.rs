fn main() {
    println!("cargo:rerun-if-env-changed=WHENPRESS_DEVICE_NAME");
    println!("cargo:rerun-if-env-changed=WHENPRESS_PASSWORD");
    println!("cargo:rerun-if-env-changed=WHENPRESS_BASE_URL");

    // Host builds (tests, fuzzing) never link against ESP-IDF.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
