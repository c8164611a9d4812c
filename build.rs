fn main() {
    // Exposes PKG_VERSION and friends to src/lib.rs through OUT_DIR/built.rs
    built::write_built_file().expect("Failed to generate build info");
}
